use kpt_inventory::InventoryStore;

use crate::cli::{InventoryCommand, InventoryMigrate};

pub async fn run(command: InventoryCommand) -> anyhow::Result<()> {
    match command {
        InventoryCommand::Migrate(args) => migrate(args).await,
    }
}

async fn migrate(args: InventoryMigrate) -> anyhow::Result<()> {
    let client = kube::Client::try_default().await?;
    let store = InventoryStore::new(client.clone());
    store.ensure_crd_installed().await?;

    let outcome =
        kpt_inventory::migrate_legacy_inventory(&client, &store, &args.namespace, &args.name, &args.local_path).await?;
    if outcome.migrated {
        println!("migrated {} tracked objects", outcome.objects.len());
    } else {
        println!("no legacy inventory found; nothing to migrate");
    }
    Ok(())
}
