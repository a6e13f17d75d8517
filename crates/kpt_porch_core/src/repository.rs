//! Repository registration: the `Git(..) | Oci(..)` driver dispatch and the
//! registry keyed by repository name.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use kpt_errors::{Error, ErrorKind};
use kpt_git::GitDriver;
use kpt_krm::{PackageRevisionId, PackageRevisionMetadata, PackageRevisionResources, RepositoryDriver, Task};
use kpt_oci::OciDriver;

/// What a repository's content is expected to hold; a function repository
/// is only used for discovery, never as a package-revision backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Package,
    Function,
}

/// Dispatches `RepositoryDriver` calls to whichever backend a repository is
/// registered with, so `kpt_porch_core` never matches on a driver enum at
/// call sites outside this module.
pub enum Repository {
    Git(GitDriver),
    Oci(OciDriver),
    /// Test-only: an in-memory driver, so `PackageRevisionStore` can be
    /// exercised without a real git remote or OCI registry.
    #[cfg(test)]
    Fake(Arc<dyn RepositoryDriver>),
}

#[async_trait]
impl RepositoryDriver for Repository {
    async fn list_revisions(&self) -> Result<Vec<PackageRevisionMetadata>, Error> {
        match self {
            Repository::Git(driver) => driver.list_revisions().await,
            Repository::Oci(driver) => driver.list_revisions().await,
            #[cfg(test)]
            Repository::Fake(driver) => driver.list_revisions().await,
        }
    }

    async fn open_revision(&self, id: &PackageRevisionId) -> Result<PackageRevisionResources, Error> {
        match self {
            Repository::Git(driver) => driver.open_revision(id).await,
            Repository::Oci(driver) => driver.open_revision(id).await,
            #[cfg(test)]
            Repository::Fake(driver) => driver.open_revision(id).await,
        }
    }

    async fn create_draft(
        &self,
        package_name: &str,
        workspace_name: &str,
        tasks: Vec<Task>,
    ) -> Result<PackageRevisionMetadata, Error> {
        match self {
            Repository::Git(driver) => driver.create_draft(package_name, workspace_name, tasks).await,
            Repository::Oci(driver) => driver.create_draft(package_name, workspace_name, tasks).await,
            #[cfg(test)]
            Repository::Fake(driver) => driver.create_draft(package_name, workspace_name, tasks).await,
        }
    }

    async fn update_draft(
        &self,
        id: &PackageRevisionId,
        resources: PackageRevisionResources,
    ) -> Result<PackageRevisionMetadata, Error> {
        match self {
            Repository::Git(driver) => driver.update_draft(id, resources).await,
            Repository::Oci(driver) => driver.update_draft(id, resources).await,
            #[cfg(test)]
            Repository::Fake(driver) => driver.update_draft(id, resources).await,
        }
    }

    async fn publish(&self, id: &PackageRevisionId, revision: &str) -> Result<PackageRevisionMetadata, Error> {
        match self {
            Repository::Git(driver) => driver.publish(id, revision).await,
            Repository::Oci(driver) => driver.publish(id, revision).await,
            #[cfg(test)]
            Repository::Fake(driver) => driver.publish(id, revision).await,
        }
    }

    async fn delete(&self, id: &PackageRevisionId) -> Result<(), Error> {
        match self {
            Repository::Git(driver) => driver.delete(id).await,
            Repository::Oci(driver) => driver.delete(id).await,
            #[cfg(test)]
            Repository::Fake(driver) => driver.delete(id).await,
        }
    }
}

/// Registered-repository metadata kept alongside the driver: type, content
/// flag, deployment flag, description.
pub struct RepositoryEntry {
    pub driver: Repository,
    pub content: ContentKind,
    pub deployment: bool,
    pub description: String,
}

/// The live set of registered repositories, keyed by name.
#[derive(Default)]
pub struct RepositoryRegistry {
    entries: DashMap<String, Arc<RepositoryEntry>>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, entry: RepositoryEntry) {
        self.entries.insert(name.into(), Arc::new(entry));
    }

    /// Deregisters `name`, failing if any live revision still references it.
    /// The caller is expected to have already confirmed via
    /// `PackageRevisionStore::list_revisions` that no revision remains.
    pub fn deregister(&self, name: &str) -> Result<(), Error> {
        self.entries
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("repository not registered: {name}")))
    }

    pub fn get(&self, name: &str) -> Result<Arc<RepositoryEntry>, Error> {
        self.entries
            .get(name)
            .map(|e| e.clone())
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("repository not registered: {name}")))
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyDriver;

    #[async_trait]
    impl RepositoryDriver for EmptyDriver {
        async fn list_revisions(&self) -> Result<Vec<PackageRevisionMetadata>, Error> {
            Ok(Vec::new())
        }
        async fn open_revision(&self, id: &PackageRevisionId) -> Result<PackageRevisionResources, Error> {
            Err(Error::new(ErrorKind::NotFound, format!("{id:?} not found")))
        }
        async fn create_draft(&self, _: &str, _: &str, _: Vec<Task>) -> Result<PackageRevisionMetadata, Error> {
            unimplemented!()
        }
        async fn update_draft(&self, _: &PackageRevisionId, _: PackageRevisionResources) -> Result<PackageRevisionMetadata, Error> {
            unimplemented!()
        }
        async fn publish(&self, _: &PackageRevisionId, _: &str) -> Result<PackageRevisionMetadata, Error> {
            unimplemented!()
        }
        async fn delete(&self, _: &PackageRevisionId) -> Result<(), Error> {
            unimplemented!()
        }
    }

    fn entry() -> RepositoryEntry {
        RepositoryEntry {
            driver: Repository::Fake(Arc::new(EmptyDriver)),
            content: ContentKind::Package,
            deployment: false,
            description: String::new(),
        }
    }

    #[test]
    fn get_unregistered_repository_fails() {
        let registry = RepositoryRegistry::new();
        let err = registry.get("blueprints").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn register_then_get_returns_the_same_entry() {
        let registry = RepositoryRegistry::new();
        registry.register("blueprints", entry());
        assert!(registry.get("blueprints").is_ok());
        assert_eq!(registry.names(), vec!["blueprints".to_owned()]);
    }

    #[test]
    fn deregister_removes_a_registered_repository() {
        let registry = RepositoryRegistry::new();
        registry.register("blueprints", entry());
        registry.deregister("blueprints").unwrap();
        assert!(registry.get("blueprints").is_err());
    }

    #[test]
    fn deregister_unregistered_repository_fails() {
        let registry = RepositoryRegistry::new();
        let err = registry.deregister("ghost").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
