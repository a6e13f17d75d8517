use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use async_trait::async_trait;
use camino::Utf8PathBuf;
use indexmap::IndexMap;
use kpt_errors::{retry, Error, ErrorKind, RetryConfig};
use kpt_krm::{
    next_revision, Lifecycle, Package, PackageRevisionId, PackageRevisionMetadata,
    PackageRevisionResources, RepositoryDriver, Task,
};
use tracing::instrument;

use crate::auth::GitAuth;
use crate::cache::{RepoCache, RepoHandle};
use crate::refs;

/// A registered git repository: URL, default branch, directory prefix the
/// packages live under, and optional basic-auth credentials.
#[derive(Clone)]
pub struct GitDriver {
    url: String,
    default_branch: String,
    directory_prefix: String,
    auth: Option<GitAuth>,
    cache: Arc<RepoCache>,
    retry: RetryConfig,
}

impl GitDriver {
    pub fn new(url: impl Into<String>, cache_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            url: url.into(),
            default_branch: "main".to_owned(),
            directory_prefix: String::new(),
            auth: None,
            cache: Arc::new(RepoCache::new(cache_dir)),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = branch.into();
        self
    }

    pub fn with_directory_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.directory_prefix = prefix.into();
        self
    }

    pub fn with_auth(mut self, auth: GitAuth) -> Self {
        self.auth = Some(auth);
        self
    }

    fn handle(&self) -> Arc<RepoHandle> {
        self.cache.handle_for(&self.url)
    }

    fn remote_callbacks(&self) -> git2::RemoteCallbacks<'_> {
        let mut callbacks = git2::RemoteCallbacks::new();
        if let Some(auth) = &self.auth {
            callbacks.credentials(auth.credentials_callback());
        }
        callbacks
    }

    /// Like [`Self::remote_callbacks`], but also wires `push_update_reference`,
    /// the only way libgit2 exposes a per-ref rejection (a non-fast-forward
    /// push, or a rejecting pre-receive hook): `push()` itself returns `Ok(())`
    /// even when an individual ref update was refused. Returns the shared cell
    /// the callback records the first rejection into.
    fn push_callbacks(&self) -> (git2::RemoteCallbacks<'_>, Rc<RefCell<Option<String>>>) {
        let mut callbacks = self.remote_callbacks();
        let rejected = Rc::new(RefCell::new(None));
        let rejected_in_callback = Rc::clone(&rejected);
        callbacks.push_update_reference(move |refname, status| {
            if let Some(status) = status {
                *rejected_in_callback.borrow_mut() = Some(format!("{refname}: {status}"));
            }
            Ok(())
        });
        (callbacks, rejected)
    }

    /// Opens the cached clone, cloning it first if it doesn't exist yet.
    fn open_or_clone(&self) -> Result<git2::Repository, Error> {
        let path = self.handle().path.clone();
        if path.exists() {
            return git2::Repository::open(&path)
                .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to open cached clone", e));
        }
        let mut fetch_options = git2::FetchOptions::new();
        fetch_options.remote_callbacks(self.remote_callbacks());
        let mut builder = git2::build::RepoBuilder::new();
        builder.fetch_options(fetch_options);
        builder
            .clone(&self.url, path.as_std_path())
            .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to clone repository", e))
    }

    fn fetch(&self, repo: &git2::Repository) -> Result<(), Error> {
        let mut remote = repo
            .find_remote("origin")
            .map_err(|e| Error::with_source(ErrorKind::Upstream, "origin remote missing", e))?;
        let mut fetch_options = git2::FetchOptions::new();
        fetch_options.remote_callbacks(self.remote_callbacks());
        remote
            .fetch(
                &["+refs/heads/*:refs/remotes/origin/*", "+refs/tags/*:refs/tags/*"],
                Some(&mut fetch_options),
                None,
            )
            .map_err(|e| Error::with_source(ErrorKind::Upstream, "fetch failed", e))
    }

    fn signature(&self) -> Result<git2::Signature<'static>, Error> {
        git2::Signature::now("kpt", "kpt@kpt.dev")
            .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to build commit signature", e))
    }
}

#[async_trait]
impl RepositoryDriver for GitDriver {
    #[instrument(skip_all, fields(url = %self.url))]
    async fn list_revisions(&self) -> Result<Vec<PackageRevisionMetadata>, Error> {
        let this = self.clone();
        retry(this.retry, |e| e.kind() == ErrorKind::Upstream, || {
            let this = this.clone();
            async move { tokio::task::spawn_blocking(move || this.list_revisions_blocking()).await.unwrap() }
        })
        .await
    }

    #[instrument(skip_all, fields(url = %self.url, revision = %id.revision.as_deref().unwrap_or(&id.workspace_name)))]
    async fn open_revision(&self, id: &PackageRevisionId) -> Result<PackageRevisionResources, Error> {
        let this = self.clone();
        let id = id.clone();
        retry(this.retry, |e| e.kind() == ErrorKind::Upstream, || {
            let this = this.clone();
            let id = id.clone();
            async move { tokio::task::spawn_blocking(move || this.open_revision_blocking(&id)).await.unwrap() }
        })
        .await
    }

    #[instrument(skip_all, fields(url = %self.url, package = %package_name, workspace = %workspace_name))]
    async fn create_draft(
        &self,
        package_name: &str,
        workspace_name: &str,
        tasks: Vec<Task>,
    ) -> Result<PackageRevisionMetadata, Error> {
        if !refs::is_valid_ref_component(package_name) || !refs::is_valid_ref_component(workspace_name) {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("invalid package or workspace name: {package_name}/{workspace_name}"),
            ));
        }
        let this = self.clone();
        let package_name = package_name.to_owned();
        let workspace_name = workspace_name.to_owned();
        tokio::task::spawn_blocking(move || this.create_draft_blocking(&package_name, &workspace_name, tasks))
            .await
            .unwrap()
    }

    #[instrument(skip_all, fields(url = %self.url, workspace = %id.workspace_name))]
    async fn update_draft(
        &self,
        id: &PackageRevisionId,
        resources: PackageRevisionResources,
    ) -> Result<PackageRevisionMetadata, Error> {
        let this = self.clone();
        let id = id.clone();
        tokio::task::spawn_blocking(move || this.update_draft_blocking(&id, resources))
            .await
            .unwrap()
    }

    #[instrument(skip_all, fields(url = %self.url, workspace = %id.workspace_name, revision = %revision))]
    async fn publish(&self, id: &PackageRevisionId, revision: &str) -> Result<PackageRevisionMetadata, Error> {
        let this = self.clone();
        let id = id.clone();
        let revision = revision.to_owned();
        tokio::task::spawn_blocking(move || this.publish_blocking(&id, &revision))
            .await
            .unwrap()
    }

    #[instrument(skip_all, fields(url = %self.url, workspace = %id.workspace_name))]
    async fn delete(&self, id: &PackageRevisionId) -> Result<(), Error> {
        let this = self.clone();
        let id = id.clone();
        tokio::task::spawn_blocking(move || this.delete_blocking(&id)).await.unwrap()
    }
}

impl GitDriver {
    fn list_revisions_blocking(&self) -> Result<Vec<PackageRevisionMetadata>, Error> {
        let _guard = self.handle().lock.blocking_read();
        let repo = self.open_or_clone()?;
        self.fetch(&repo)?;

        let mut metadata = Vec::new();
        let mut published_by_package: IndexMap<String, Vec<String>> = IndexMap::new();

        let branches = repo
            .branches(Some(git2::BranchType::Remote))
            .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to list branches", e))?;
        for branch in branches {
            let (branch, _) = branch.map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to read branch", e))?;
            let Some(name) = branch.name().ok().flatten() else { continue };
            let Some(name) = name.strip_prefix("origin/") else { continue };
            if let Some((package, workspace)) = refs::parse_draft_branch(name) {
                metadata.push(PackageRevisionMetadata {
                    id: PackageRevisionId::new(&self.url, package, workspace),
                    lifecycle: Lifecycle::Draft,
                    tasks: Vec::new(),
                    latest: false,
                });
            } else if let Some((package, workspace)) = refs::parse_proposed_branch(name) {
                metadata.push(PackageRevisionMetadata {
                    id: PackageRevisionId::new(&self.url, package, workspace),
                    lifecycle: Lifecycle::Proposed,
                    tasks: Vec::new(),
                    latest: false,
                });
            }
        }

        let tags = repo
            .tag_names(None)
            .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to list tags", e))?;
        for tag in tags.iter().flatten() {
            if let Some((package, revision)) = refs::parse_published_tag(tag) {
                published_by_package.entry(package).or_default().push(revision);
            }
        }

        for (package, revisions) in &published_by_package {
            let latest = revisions
                .iter()
                .max_by(|a, b| kpt_krm::compare_revisions(a, b))
                .cloned();
            for revision in revisions {
                metadata.push(PackageRevisionMetadata {
                    id: PackageRevisionId::new(&self.url, package.clone(), String::new()).published(revision.clone()),
                    lifecycle: Lifecycle::Published,
                    tasks: Vec::new(),
                    latest: Some(revision) == latest.as_ref(),
                });
            }
        }

        Ok(metadata)
    }

    fn resolve_ref_name(&self, id: &PackageRevisionId) -> String {
        if let Some(revision) = &id.revision {
            refs::tag_ref(&refs::published_tag(&id.package_name, revision))
        } else {
            refs::remote_tracking_ref(&refs::draft_branch(&id.package_name, &id.workspace_name))
        }
    }

    fn open_revision_blocking(&self, id: &PackageRevisionId) -> Result<PackageRevisionResources, Error> {
        let _guard = self.handle().lock.blocking_read();
        let repo = self.open_or_clone()?;
        self.fetch(&repo)?;

        let reference_name = self.resolve_ref_name(id);
        let reference = repo
            .find_reference(&reference_name)
            .map_err(|e| Error::with_source(ErrorKind::NotFound, format!("revision ref not found: {reference_name}"), e))?;
        let commit = reference
            .peel_to_commit()
            .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to peel to commit", e))?;
        let tree = commit
            .tree()
            .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to read tree", e))?;

        let mut package = Package::new();
        read_tree_into_package(&repo, &tree, &self.directory_prefix, &mut package)?;

        Ok(PackageRevisionResources { id: id.clone(), package })
    }

    fn create_draft_blocking(
        &self,
        package_name: &str,
        workspace_name: &str,
        tasks: Vec<Task>,
    ) -> Result<PackageRevisionMetadata, Error> {
        let _guard = self.handle().lock.blocking_write();
        let repo = self.open_or_clone()?;
        self.fetch(&repo)?;

        let branch_name = refs::draft_branch(package_name, workspace_name);
        let remote_ref = refs::remote_tracking_ref(&branch_name);
        if repo.find_reference(&remote_ref).is_ok() {
            return Err(Error::new(
                ErrorKind::Conflict,
                format!("draft already exists: {package_name}/{workspace_name}"),
            ));
        }

        let default_ref = refs::remote_tracking_ref(&self.default_branch);
        let base_commit = repo
            .find_reference(&default_ref)
            .and_then(|r| r.peel_to_commit())
            .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to resolve default branch", e))?;

        let signature = self.signature()?;
        let commit_oid = repo
            .commit(None, &signature, &signature, "kpt: init draft", &base_commit.tree().unwrap(), &[&base_commit])
            .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to create draft commit", e))?;

        repo.reference(&refs::local_branch_ref(&branch_name), commit_oid, true, "kpt: create draft")
            .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to create draft branch", e))?;

        push_refspecs(&repo, self, &[format!("refs/heads/{branch_name}:refs/heads/{branch_name}")])?;

        Ok(PackageRevisionMetadata {
            id: PackageRevisionId::new(&self.url, package_name, workspace_name),
            lifecycle: Lifecycle::Draft,
            tasks,
            latest: false,
        })
    }

    fn update_draft_blocking(
        &self,
        id: &PackageRevisionId,
        resources: PackageRevisionResources,
    ) -> Result<PackageRevisionMetadata, Error> {
        let _guard = self.handle().lock.blocking_write();
        let repo = self.open_or_clone()?;
        self.fetch(&repo)?;

        let branch_name = refs::draft_branch(&id.package_name, &id.workspace_name);
        let remote_ref = refs::remote_tracking_ref(&branch_name);
        let parent = repo
            .find_reference(&remote_ref)
            .and_then(|r| r.peel_to_commit())
            .map_err(|e| Error::with_source(ErrorKind::NotFound, format!("draft not found: {branch_name}"), e))?;

        let tree_oid = write_package_tree(&repo, &resources.package, &self.directory_prefix)?;
        let tree = repo
            .find_tree(tree_oid)
            .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to read new tree", e))?;

        let signature = self.signature()?;
        let commit_oid = repo
            .commit(None, &signature, &signature, "kpt: update draft", &tree, &[&parent])
            .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to create update commit", e))?;

        push_refspecs(
            &repo,
            self,
            &[format!("{commit_oid}:refs/heads/{branch_name}")],
        )?;

        Ok(PackageRevisionMetadata {
            id: id.clone(),
            lifecycle: Lifecycle::Draft,
            tasks: Vec::new(),
            latest: false,
        })
    }

    fn publish_blocking(&self, id: &PackageRevisionId, revision: &str) -> Result<PackageRevisionMetadata, Error> {
        let _guard = self.handle().lock.blocking_write();
        let repo = self.open_or_clone()?;
        self.fetch(&repo)?;

        let proposed_branch = refs::proposed_branch(&id.package_name, &id.workspace_name);
        let proposed_remote_ref = refs::remote_tracking_ref(&proposed_branch);
        let draft_commit = repo
            .find_reference(&proposed_remote_ref)
            .and_then(|r| r.peel_to_commit())
            .map_err(|e| Error::with_source(ErrorKind::NotFound, format!("proposed revision not found: {proposed_branch}"), e))?;

        let default_ref = refs::remote_tracking_ref(&self.default_branch);
        let default_commit = repo
            .find_reference(&default_ref)
            .and_then(|r| r.peel_to_commit())
            .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to resolve default branch", e))?;

        let signature = self.signature()?;
        let publish_commit_oid = repo
            .commit(
                None,
                &signature,
                &signature,
                &format!("kpt: publish {}/{revision}", id.package_name),
                &draft_commit.tree().map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to read draft tree", e))?,
                &[&default_commit],
            )
            .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to create publish commit", e))?;

        let tag_name = refs::published_tag(&id.package_name, revision);
        let publish_commit = repo
            .find_commit(publish_commit_oid)
            .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to read publish commit", e))?;
        let tag_oid = repo
            .tag(&tag_name, publish_commit.as_object(), &signature, &format!("kpt: {tag_name}"), false)
            .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to create annotated tag", e))?;
        let _ = tag_oid;

        push_refspecs(
            &repo,
            self,
            &[
                format!("{publish_commit_oid}:refs/heads/{}", self.default_branch),
                format!("refs/tags/{tag_name}:refs/tags/{tag_name}"),
            ],
        )?;

        Ok(PackageRevisionMetadata {
            id: id.clone().published(revision),
            lifecycle: Lifecycle::Published,
            tasks: Vec::new(),
            latest: true,
        })
    }

    fn delete_blocking(&self, id: &PackageRevisionId) -> Result<(), Error> {
        let _guard = self.handle().lock.blocking_write();
        let repo = self.open_or_clone()?;
        self.fetch(&repo)?;

        let refspec = if let Some(revision) = &id.revision {
            let tag = refs::published_tag(&id.package_name, revision);
            format!(":refs/tags/{tag}")
        } else {
            let branch = refs::draft_branch(&id.package_name, &id.workspace_name);
            format!(":refs/heads/{branch}")
        };
        push_refspecs(&repo, self, &[refspec])
    }
}

fn push_refspecs(repo: &git2::Repository, driver: &GitDriver, refspecs: &[String]) -> Result<(), Error> {
    let mut remote = repo
        .find_remote("origin")
        .map_err(|e| Error::with_source(ErrorKind::Upstream, "origin remote missing", e))?;
    let (callbacks, rejected) = driver.push_callbacks();
    let mut push_options = git2::PushOptions::new();
    push_options.remote_callbacks(callbacks);
    let specs: Vec<&str> = refspecs.iter().map(String::as_str).collect();
    remote
        .push(&specs, Some(&mut push_options))
        .map_err(|e| Error::with_source(ErrorKind::Upstream, format!("push failed for {refspecs:?}"), e))?;

    if let Some(reason) = rejected.borrow_mut().take() {
        return Err(Error::new(ErrorKind::Conflict, format!("push rejected for {refspecs:?}: {reason}")));
    }
    Ok(())
}

fn read_tree_into_package(
    repo: &git2::Repository,
    tree: &git2::Tree<'_>,
    directory_prefix: &str,
    package: &mut Package,
) -> Result<(), Error> {
    let mut error = None;
    tree.walk(git2::TreeWalkMode::PreOrder, |root, entry| {
        if entry.kind() != Some(git2::ObjectType::Blob) {
            return git2::TreeWalkResult::Ok;
        }
        let Some(name) = entry.name() else { return git2::TreeWalkResult::Ok };
        let path = format!("{root}{name}");
        let relative = path.strip_prefix(directory_prefix).unwrap_or(&path).trim_start_matches('/');
        let Ok(object) = entry.to_object(repo) else { return git2::TreeWalkResult::Ok };
        let Some(blob) = object.as_blob() else { return git2::TreeWalkResult::Ok };
        let Ok(contents) = std::str::from_utf8(blob.content()) else { return git2::TreeWalkResult::Ok };
        if let Err(e) = package.insert_file(relative, contents) {
            error = Some(e);
            return git2::TreeWalkResult::Abort;
        }
        git2::TreeWalkResult::Ok
    })
    .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to walk tree", e))?;
    if let Some(e) = error {
        return Err(e);
    }
    Ok(())
}

fn write_package_tree(repo: &git2::Repository, package: &Package, directory_prefix: &str) -> Result<git2::Oid, Error> {
    let mut root = repo.treebuilder(None).map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to create tree builder", e))?;

    // Group files by their full path (with directory_prefix applied) and
    // build the tree bottom-up via nested treebuilders.
    let mut by_dir: IndexMap<String, Vec<(String, String)>> = IndexMap::new();
    for (path, contents) in &package.files {
        let full_path = if directory_prefix.is_empty() {
            path.clone()
        } else {
            format!("{directory_prefix}/{path}")
        };
        let (dir, file_name) = match full_path.rsplit_once('/') {
            Some((dir, name)) => (dir.to_owned(), name.to_owned()),
            None => (String::new(), full_path.clone()),
        };
        by_dir.entry(dir).or_default().push((file_name, contents.clone()));
    }

    for (dir, files) in &by_dir {
        if !dir.is_empty() {
            continue;
        }
        for (name, contents) in files {
            let blob_oid = repo
                .blob(contents.as_bytes())
                .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to write blob", e))?;
            root.insert(name, blob_oid, 0o100644)
                .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to insert tree entry", e))?;
        }
    }

    // Non-root directories are written by inserting each blob at its full
    // relative path via repeated treebuilder descent handled by libgit2's
    // `TreeUpdateBuilder`, which accepts full paths directly.
    let mut updater = git2::TreeUpdateBuilder::new();
    for (dir, files) in &by_dir {
        if dir.is_empty() {
            continue;
        }
        for (name, contents) in files {
            let blob_oid = repo
                .blob(contents.as_bytes())
                .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to write blob", e))?;
            updater.upsert(format!("{dir}/{name}"), blob_oid, git2::FileMode::Blob);
        }
    }
    let base_tree_oid = root
        .write()
        .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to write base tree", e))?;
    let base_tree = repo
        .find_tree(base_tree_oid)
        .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to read base tree", e))?;
    updater
        .create_updated(repo, &base_tree)
        .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to apply nested tree updates", e))
}
