//! Test-only fakes shared by this crate's unit tests: an in-memory
//! `RepositoryDriver` so the store, lifecycle, and command wiring can be
//! exercised without a real git remote or OCI registry.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use kpt_errors::{Error, ErrorKind};
use kpt_krm::{
    Lifecycle, Package, PackageRevisionId, PackageRevisionMetadata, PackageRevisionResources, RepositoryDriver, Task,
};

use crate::repository::{ContentKind, Repository, RepositoryEntry, RepositoryRegistry};
use crate::store::PackageRevisionStore;

pub struct FakeDriver {
    repository: String,
    revisions: DashMap<PackageRevisionId, (Lifecycle, Package, Vec<Task>)>,
}

impl FakeDriver {
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            revisions: DashMap::new(),
        }
    }
}

#[async_trait]
impl RepositoryDriver for FakeDriver {
    async fn list_revisions(&self) -> Result<Vec<PackageRevisionMetadata>, Error> {
        Ok(self
            .revisions
            .iter()
            .map(|entry| PackageRevisionMetadata {
                id: entry.key().clone(),
                lifecycle: entry.value().0,
                tasks: entry.value().2.clone(),
                latest: false,
            })
            .collect())
    }

    async fn open_revision(&self, id: &PackageRevisionId) -> Result<PackageRevisionResources, Error> {
        self.revisions
            .get(id)
            .map(|entry| PackageRevisionResources { id: id.clone(), package: entry.value().1.clone() })
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("{id:?} not found")))
    }

    async fn create_draft(
        &self,
        package_name: &str,
        workspace_name: &str,
        tasks: Vec<Task>,
    ) -> Result<PackageRevisionMetadata, Error> {
        let id = PackageRevisionId::new(self.repository.clone(), package_name, workspace_name);
        if self.revisions.contains_key(&id) {
            return Err(Error::new(ErrorKind::Conflict, format!("{id:?} already exists")));
        }
        self.revisions.insert(id.clone(), (Lifecycle::Draft, Package::new(), tasks.clone()));
        Ok(PackageRevisionMetadata { id, lifecycle: Lifecycle::Draft, tasks, latest: false })
    }

    async fn update_draft(
        &self,
        id: &PackageRevisionId,
        resources: PackageRevisionResources,
    ) -> Result<PackageRevisionMetadata, Error> {
        let mut entry = self
            .revisions
            .get_mut(id)
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("{id:?} not found")))?;
        entry.value_mut().1 = resources.package;
        Ok(PackageRevisionMetadata {
            id: id.clone(),
            lifecycle: entry.value().0,
            tasks: entry.value().2.clone(),
            latest: false,
        })
    }

    async fn publish(&self, id: &PackageRevisionId, revision: &str) -> Result<PackageRevisionMetadata, Error> {
        let (_, (_, package, tasks)) = self
            .revisions
            .remove(id)
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("{id:?} not found")))?;
        let published_id =
            PackageRevisionId::new(self.repository.clone(), id.package_name.clone(), String::new()).published(revision);
        self.revisions.insert(published_id.clone(), (Lifecycle::Published, package, tasks.clone()));
        Ok(PackageRevisionMetadata { id: published_id, lifecycle: Lifecycle::Published, tasks, latest: true })
    }

    async fn delete(&self, id: &PackageRevisionId) -> Result<(), Error> {
        self.revisions
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("{id:?} not found")))
    }
}

/// Registers a single [`FakeDriver`] under `name` and wraps it in a fresh
/// store, for tests that only need one repository.
pub fn store_with_fake(name: &str) -> PackageRevisionStore {
    let registry = RepositoryRegistry::new();
    registry.register(
        name,
        RepositoryEntry {
            driver: Repository::Fake(Arc::new(FakeDriver::new(name))),
            content: ContentKind::Package,
            deployment: false,
            description: String::new(),
        },
    );
    PackageRevisionStore::new(Arc::new(registry))
}
