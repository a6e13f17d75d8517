use async_trait::async_trait;
use kpt_errors::Error;

use crate::revision::{PackageRevisionId, PackageRevisionMetadata, PackageRevisionResources, Task};

/// The contract both the git and OCI repository drivers implement.
/// `kpt_porch_core` dispatches through this trait rather than matching on a
/// driver enum at every call site.
#[async_trait]
pub trait RepositoryDriver: Send + Sync {
    async fn list_revisions(&self) -> Result<Vec<PackageRevisionMetadata>, Error>;

    async fn open_revision(&self, id: &PackageRevisionId) -> Result<PackageRevisionResources, Error>;

    async fn create_draft(
        &self,
        package_name: &str,
        workspace_name: &str,
        tasks: Vec<Task>,
    ) -> Result<PackageRevisionMetadata, Error>;

    async fn update_draft(
        &self,
        id: &PackageRevisionId,
        resources: PackageRevisionResources,
    ) -> Result<PackageRevisionMetadata, Error>;

    /// Publishes `id`, assigning `revision` atomically: either the published
    /// artifact becomes visible and addressable, or no change is observable.
    async fn publish(
        &self,
        id: &PackageRevisionId,
        revision: &str,
    ) -> Result<PackageRevisionMetadata, Error>;

    async fn delete(&self, id: &PackageRevisionId) -> Result<(), Error>;
}
