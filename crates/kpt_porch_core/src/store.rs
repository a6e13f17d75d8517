//! The package-revision store: lifecycle authority, per-workspace
//! serialization, and the only code allowed to call
//! [`crate::lifecycle::transition`].

use std::sync::Arc;

use dashmap::DashMap;
use kpt_errors::{Error, ErrorKind};
use kpt_krm::{
    compare_revisions, next_revision, Lifecycle, Package, PackageRevisionId, PackageRevisionMetadata,
    PackageRevisionResources, RepositoryDriver, Task,
};
use tokio::sync::Mutex;
use tracing::instrument;

use crate::lifecycle::{self, LifecycleEvent};
use crate::repository::RepositoryRegistry;

/// Identifies the per-draft serialization lock: `(repository, packageName,
/// workspaceName)`. Cross-revision reads never take this lock.
type WorkspaceKey = (String, String, String);

pub struct PackageRevisionStore {
    registry: Arc<RepositoryRegistry>,
    locks: DashMap<WorkspaceKey, Arc<Mutex<()>>>,
    /// Lifecycle state this store has moved a revision to beyond what the
    /// backend natively encodes (Proposed and DeletionProposed have no
    /// durable ref of their own; Draft/Published come straight from the
    /// driver).
    lifecycle_overrides: DashMap<PackageRevisionId, Lifecycle>,
    /// Task history per revision, kept here because the drivers' `list_revisions`
    /// doesn't retain it; used to enforce the "no downstream dependents" delete
    /// rule.
    tasks: DashMap<PackageRevisionId, Vec<Task>>,
}

impl PackageRevisionStore {
    pub fn new(registry: Arc<RepositoryRegistry>) -> Self {
        Self {
            registry,
            locks: DashMap::new(),
            lifecycle_overrides: DashMap::new(),
            tasks: DashMap::new(),
        }
    }

    fn workspace_lock(&self, key: WorkspaceKey) -> Arc<Mutex<()>> {
        self.locks.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    #[instrument(skip(self))]
    pub async fn list_revisions(&self, repository: &str) -> Result<Vec<PackageRevisionMetadata>, Error> {
        let entry = self.registry.get(repository)?;
        let mut metadata = entry.driver.list_revisions().await?;
        for m in &mut metadata {
            if let Some(overridden) = self.lifecycle_overrides.get(&m.id) {
                m.lifecycle = *overridden;
            }
        }
        Ok(metadata)
    }

    pub async fn open_revision(&self, id: &PackageRevisionId) -> Result<PackageRevisionResources, Error> {
        self.registry.get(&id.repository)?.driver.open_revision(id).await
    }

    async fn find(&self, id: &PackageRevisionId) -> Result<PackageRevisionMetadata, Error> {
        self.list_revisions(&id.repository)
            .await?
            .into_iter()
            .find(|m| &m.id == id)
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("revision not found: {}/{}/{}", id.repository, id.package_name, id.workspace_name)))
    }

    #[instrument(skip(self))]
    pub async fn init_draft(
        &self,
        repository: &str,
        package_name: &str,
        workspace_name: &str,
    ) -> Result<PackageRevisionMetadata, Error> {
        let _guard = self
            .workspace_lock((repository.to_owned(), package_name.to_owned(), workspace_name.to_owned()))
            .lock_owned()
            .await;
        let entry = self.registry.get(repository)?;
        let metadata = entry.driver.create_draft(package_name, workspace_name, vec![Task::Init]).await?;
        self.tasks.insert(metadata.id.clone(), vec![Task::Init]);
        Ok(metadata)
    }

    /// Clones a Published source into a new Draft.
    #[instrument(skip(self))]
    pub async fn clone_revision(
        &self,
        source: &PackageRevisionId,
        target_repository: &str,
        target_package_name: &str,
        target_workspace_name: &str,
    ) -> Result<PackageRevisionMetadata, Error> {
        let source_meta = self.find(source).await?;
        if source_meta.lifecycle != Lifecycle::Published {
            return Err(Error::new(ErrorKind::InvalidInput, "clone source must be Published"));
        }
        if source.workspace_name == target_workspace_name && source.repository == target_repository {
            return Err(Error::new(ErrorKind::InvalidInput, "clone target must use a different workspaceName"));
        }
        let resources = self.open_revision(source).await?;

        let _guard = self
            .workspace_lock((target_repository.to_owned(), target_package_name.to_owned(), target_workspace_name.to_owned()))
            .lock_owned()
            .await;
        let target = self.registry.get(target_repository)?;
        let task = Task::Clone { source: source.clone() };
        let created = target
            .driver
            .create_draft(target_package_name, target_workspace_name, vec![task.clone()])
            .await?;
        let updated = target
            .driver
            .update_draft(&created.id, PackageRevisionResources { id: created.id.clone(), package: resources.package })
            .await?;
        self.tasks.insert(updated.id.clone(), vec![task]);
        Ok(updated)
    }

    /// Replaces `id`'s file map. Fails closed (content untouched) unless
    /// `id` is currently a Draft.
    #[instrument(skip(self, package))]
    pub async fn update_draft(&self, id: &PackageRevisionId, package: Package) -> Result<PackageRevisionMetadata, Error> {
        let current = self.find(id).await?;
        if current.lifecycle != Lifecycle::Draft {
            return Err(Error::new(ErrorKind::InvalidInput, format!("{id:?} is not a Draft; content is frozen")));
        }
        let _guard = self
            .workspace_lock((id.repository.clone(), id.package_name.clone(), id.workspace_name.clone()))
            .lock_owned()
            .await;
        self.registry
            .get(&id.repository)?
            .driver
            .update_draft(id, PackageRevisionResources { id: id.clone(), package })
            .await
    }

    pub async fn propose(&self, id: &PackageRevisionId) -> Result<PackageRevisionMetadata, Error> {
        self.apply_event(id, LifecycleEvent::Propose).await
    }

    pub async fn reject(&self, id: &PackageRevisionId) -> Result<PackageRevisionMetadata, Error> {
        self.apply_event(id, LifecycleEvent::Reject).await
    }

    pub async fn propose_delete(&self, id: &PackageRevisionId) -> Result<PackageRevisionMetadata, Error> {
        self.apply_event(id, LifecycleEvent::ProposeDelete).await
    }

    pub async fn reject_delete(&self, id: &PackageRevisionId) -> Result<PackageRevisionMetadata, Error> {
        self.apply_event(id, LifecycleEvent::RejectDelete).await
    }

    async fn apply_event(&self, id: &PackageRevisionId, event: LifecycleEvent) -> Result<PackageRevisionMetadata, Error> {
        let mut current = self.find(id).await?;
        let next = lifecycle::transition(current.lifecycle, event)?
            .ok_or_else(|| Error::new(ErrorKind::InvalidInput, "transition does not yield a live state here"))?;
        self.lifecycle_overrides.insert(id.clone(), next);
        current.lifecycle = next;
        Ok(current)
    }

    /// Publishes a Proposed revision, assigning the next monotonic revision
    /// number and moving the "latest" marker atomically under the
    /// per-`(repository, packageName)` publish lock.
    #[instrument(skip(self))]
    pub async fn approve(&self, id: &PackageRevisionId) -> Result<PackageRevisionMetadata, Error> {
        let _guard = self
            .workspace_lock((id.repository.clone(), id.package_name.clone(), String::new()))
            .lock_owned()
            .await;

        let current = self.find(id).await?;
        if current.lifecycle != Lifecycle::Proposed {
            // A Draft override means this revision was Proposed and someone
            // rejected it back out from under the caller, not that it never
            // entered the propose workflow.
            let moved_back_to_draft = matches!(self.lifecycle_overrides.get(id).map(|o| *o), Some(Lifecycle::Draft));
            return Err(if moved_back_to_draft {
                Error::new(ErrorKind::Conflict, format!("{id:?} was proposed but has since been rejected back to Draft"))
            } else {
                Error::new(ErrorKind::InvalidInput, format!("{id:?} is not Proposed"))
            });
        }

        let entry = self.registry.get(&id.repository)?;
        let all = entry.driver.list_revisions().await?;
        let mut published_revisions: Vec<String> = all
            .iter()
            .filter(|m| m.id.package_name == id.package_name && m.lifecycle == Lifecycle::Published)
            .filter_map(|m| m.id.revision.clone())
            .collect();
        published_revisions.sort_by(|a, b| compare_revisions(a, b));
        let revision = next_revision(&published_revisions);

        let published = entry.driver.publish(id, &revision).await?;
        self.lifecycle_overrides.remove(id);
        self.lifecycle_overrides.insert(published.id.clone(), Lifecycle::Published);
        if let Some((_, task)) = self.tasks.remove(id) {
            self.tasks.insert(published.id.clone(), task);
        }
        Ok(published)
    }

    /// Finalizes a DeletionProposed revision's deletion: refuses if another
    /// live revision's task history clones from it.
    #[instrument(skip(self))]
    pub async fn approve_delete(&self, id: &PackageRevisionId) -> Result<(), Error> {
        let current = self.find(id).await?;
        if current.lifecycle != Lifecycle::DeletionProposed {
            return Err(Error::new(ErrorKind::InvalidInput, format!("{id:?} is not DeletionProposed")));
        }
        if self.has_dependents(id) {
            return Err(Error::new(
                ErrorKind::Conflict,
                format!("{id:?} has downstream dependents tracked in this repository"),
            ));
        }
        self.registry.get(&id.repository)?.driver.delete(id).await?;
        self.lifecycle_overrides.remove(id);
        self.tasks.remove(id);
        Ok(())
    }

    fn has_dependents(&self, id: &PackageRevisionId) -> bool {
        self.tasks
            .iter()
            .any(|entry| entry.value().iter().any(|t| matches!(t, Task::Clone { source } if source == id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::store_with_fake;

    #[tokio::test]
    async fn init_draft_creates_a_draft_revision() {
        let store = store_with_fake("blueprints");
        let metadata = store.init_draft("blueprints", "nginx", "staging").await.unwrap();
        assert_eq!(metadata.lifecycle, Lifecycle::Draft);
        assert_eq!(metadata.tasks, vec![Task::Init]);
    }

    #[tokio::test]
    async fn update_draft_rejects_non_draft_revisions() {
        let store = store_with_fake("blueprints");
        let metadata = store.init_draft("blueprints", "nginx", "staging").await.unwrap();
        store.propose(&metadata.id).await.unwrap();

        let err = store.update_draft(&metadata.id, Package::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn full_propose_approve_cycle_publishes_a_revision() {
        let store = store_with_fake("blueprints");
        let draft = store.init_draft("blueprints", "nginx", "staging").await.unwrap();

        let mut package = Package::new();
        package.insert_file("Kptfile", "apiVersion: kpt.dev/v1\n").unwrap();
        store.update_draft(&draft.id, package).await.unwrap();

        let proposed = store.propose(&draft.id).await.unwrap();
        assert_eq!(proposed.lifecycle, Lifecycle::Proposed);

        let published = store.approve(&proposed.id).await.unwrap();
        assert_eq!(published.lifecycle, Lifecycle::Published);
        assert_eq!(published.id.revision.as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn approve_rejects_revisions_that_are_not_proposed() {
        let store = store_with_fake("blueprints");
        let draft = store.init_draft("blueprints", "nginx", "staging").await.unwrap();
        let err = store.approve(&draft.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn approve_conflicts_on_a_revision_rejected_back_to_draft() {
        let store = store_with_fake("blueprints");
        let draft = store.init_draft("blueprints", "nginx", "staging").await.unwrap();
        let proposed = store.propose(&draft.id).await.unwrap();
        store.reject(&proposed.id).await.unwrap();

        let err = store.approve(&draft.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn clone_revision_requires_a_published_source() {
        let store = store_with_fake("blueprints");
        let draft = store.init_draft("blueprints", "nginx", "staging").await.unwrap();

        let err = store.clone_revision(&draft.id, "blueprints", "nginx", "staging-2").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn clone_revision_copies_content_into_a_new_draft() {
        let store = store_with_fake("blueprints");
        let draft = store.init_draft("blueprints", "nginx", "staging").await.unwrap();
        let mut package = Package::new();
        package.insert_file("Kptfile", "apiVersion: kpt.dev/v1\n").unwrap();
        store.update_draft(&draft.id, package).await.unwrap();
        let proposed = store.propose(&draft.id).await.unwrap();
        let published = store.approve(&proposed.id).await.unwrap();

        let cloned = store.clone_revision(&published.id, "blueprints", "nginx", "staging-2").await.unwrap();
        assert_eq!(cloned.lifecycle, Lifecycle::Draft);

        let resources = store.open_revision(&cloned.id).await.unwrap();
        assert!(resources.package.files.contains_key("Kptfile"));
    }

    #[tokio::test]
    async fn approve_delete_refuses_a_revision_with_a_cloned_dependent() {
        let store = store_with_fake("blueprints");
        let draft = store.init_draft("blueprints", "nginx", "staging").await.unwrap();
        let proposed = store.propose(&draft.id).await.unwrap();
        let published = store.approve(&proposed.id).await.unwrap();

        store.clone_revision(&published.id, "blueprints", "nginx", "staging-2").await.unwrap();

        store.propose_delete(&published.id).await.unwrap();
        let err = store.approve_delete(&published.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
}
