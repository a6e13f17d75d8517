//! Applies a package revision's resources to a target cluster, with
//! pruning driven by the revision's inventory.

use kpt_apply::{apply as apply_resources, ApplyConfig, ApplyOutcome};
use kpt_errors::Error;
use kpt_inventory::InventoryStore;
use kpt_krm::PackageRevisionId;
use kube::Client;
use tokio_util::sync::CancellationToken;

use crate::store::PackageRevisionStore;

#[allow(clippy::too_many_arguments)]
pub async fn apply_revision(
    store: &PackageRevisionStore,
    id: &PackageRevisionId,
    client: &Client,
    inventory: &InventoryStore,
    inventory_namespace: &str,
    inventory_name: &str,
    cancel: &CancellationToken,
    config: &ApplyConfig,
) -> Result<ApplyOutcome, Error> {
    let resources = store.open_revision(id).await?;
    let desired: Vec<_> = resources.package.documents()?.into_iter().map(|doc| doc.resource).collect();
    apply_resources(client, inventory, inventory_namespace, inventory_name, &desired, cancel, config).await
}
