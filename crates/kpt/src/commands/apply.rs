use std::time::Duration;

use camino::Utf8Path;
use kpt_apply::ApplyConfig;
use kpt_inventory::InventoryStore;
use kpt_krm::PackageRevisionId;
use kpt_porch_core::OrchestratorConfig;
use tokio_util::sync::CancellationToken;

use crate::cli::ApplyArgs;
use crate::repositories;

pub async fn run(args: ApplyArgs, repositories_file: &Utf8Path, config: &OrchestratorConfig) -> anyhow::Result<()> {
    let store = repositories::store_from_file(repositories_file, &config.cache_directory)?;
    let mut id = PackageRevisionId::new(args.repository, args.package, args.workspace);
    if let Some(revision) = args.revision {
        id = id.published(revision);
    }

    let client = kube::Client::try_default().await?;
    let inventory = InventoryStore::new(client.clone());
    inventory.ensure_crd_installed().await?;

    let cancel = CancellationToken::new();
    let apply_config = ApplyConfig {
        reconcile_timeout: Duration::from_secs(config.reconcile_timeout_secs),
        ..ApplyConfig::default()
    };

    let outcome = kpt_porch_core::command::apply::apply_revision(
        &store,
        &id,
        &client,
        &inventory,
        &args.inventory_namespace,
        &args.inventory_name,
        &cancel,
        &apply_config,
    )
    .await?;

    for event in &outcome.events {
        println!("{event:?}");
    }
    println!("inventory now tracks {} objects", outcome.final_inventory.len());
    Ok(())
}
