use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use kpt_errors::{retry, Error, ErrorKind, RetryConfig};
use kpt_krm::{
    next_revision, Lifecycle, PackageRevisionId, PackageRevisionMetadata, PackageRevisionResources,
    RepositoryDriver, Task,
};
use oci_distribution::client::{ClientConfig, Config as OciConfig, ImageLayer};
use oci_distribution::manifest::OciImageManifest;
use oci_distribution::secrets::RegistryAuth;
use oci_distribution::{Client, Reference};
use sha2::{Digest, Sha256};
use tracing::instrument;

use crate::tag_ordering::published_revisions;
use crate::tagging::{self, draft_tag, published_tag};
use crate::tar_layer::{self, LAYER_MEDIA_TYPE};

/// An OCI-backed repository driver: one image per revision, digest-as-truth
/// with a digest cache used to detect concurrent draft writers.
#[derive(Clone)]
pub struct OciDriver {
    registry: String,
    repository: String,
    auth: RegistryAuth,
    retry: RetryConfig,
    digest_cache: Arc<DashMap<String, String>>,
}

impl OciDriver {
    pub fn new(registry: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            registry: registry.into(),
            repository: repository.into(),
            auth: RegistryAuth::Anonymous,
            retry: RetryConfig::default(),
            digest_cache: Arc::new(DashMap::new()),
        }
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = RegistryAuth::Basic(username.into(), password.into());
        self
    }

    fn reference(&self, tag: &str) -> Result<Reference, Error> {
        format!("{}/{}:{tag}", self.registry, self.repository)
            .parse()
            .map_err(|e| Error::with_source(ErrorKind::InvalidInput, format!("invalid OCI reference for tag {tag}"), e))
    }

    fn client(&self) -> Client {
        Client::new(ClientConfig::default())
    }
}

#[async_trait]
impl RepositoryDriver for OciDriver {
    #[instrument(skip_all, fields(registry = %self.registry, repository = %self.repository))]
    async fn list_revisions(&self) -> Result<Vec<PackageRevisionMetadata>, Error> {
        let this = self.clone();
        retry(this.retry, |e| e.kind() == ErrorKind::Upstream, || {
            let this = this.clone();
            async move { this.list_revisions_once().await }
        })
        .await
    }

    #[instrument(skip_all, fields(registry = %self.registry, repository = %self.repository))]
    async fn open_revision(&self, id: &PackageRevisionId) -> Result<PackageRevisionResources, Error> {
        let this = self.clone();
        let id = id.clone();
        retry(this.retry, |e| e.kind() == ErrorKind::Upstream, || {
            let this = this.clone();
            let id = id.clone();
            async move { this.open_revision_once(&id).await }
        })
        .await
    }

    #[instrument(skip_all, fields(registry = %self.registry, repository = %self.repository, package = %package_name))]
    async fn create_draft(
        &self,
        package_name: &str,
        workspace_name: &str,
        tasks: Vec<Task>,
    ) -> Result<PackageRevisionMetadata, Error> {
        let tag = draft_tag(workspace_name);
        let reference = self.reference(&tag)?;
        let digest = self
            .push_package(&reference, &kpt_krm::Package::new(), workspace_name)
            .await?;
        self.digest_cache.insert(tag, digest);

        Ok(PackageRevisionMetadata {
            id: PackageRevisionId::new(format!("{}/{}", self.registry, self.repository), package_name, workspace_name),
            lifecycle: Lifecycle::Draft,
            tasks,
            latest: false,
        })
    }

    #[instrument(skip_all, fields(registry = %self.registry, workspace = %id.workspace_name))]
    async fn update_draft(
        &self,
        id: &PackageRevisionId,
        resources: PackageRevisionResources,
    ) -> Result<PackageRevisionMetadata, Error> {
        let tag = draft_tag(&id.workspace_name);
        let reference = self.reference(&tag)?;

        // Refuse to move the tag if a concurrent writer already moved it
        // away from the digest we last observed.
        if let Some(expected) = self.digest_cache.get(&tag).map(|d| d.clone()) {
            let current = self.current_digest(&reference).await?;
            if let Some(current) = current {
                if current != expected {
                    return Err(Error::new(
                        ErrorKind::Conflict,
                        format!("draft {tag} was updated concurrently"),
                    ));
                }
            }
        }

        let digest = self.push_package(&reference, &resources.package, &id.workspace_name).await?;
        self.digest_cache.insert(tag, digest);

        Ok(PackageRevisionMetadata {
            id: id.clone(),
            lifecycle: Lifecycle::Draft,
            tasks: Vec::new(),
            latest: false,
        })
    }

    #[instrument(skip_all, fields(registry = %self.registry, workspace = %id.workspace_name, revision = %revision))]
    async fn publish(&self, id: &PackageRevisionId, revision: &str) -> Result<PackageRevisionMetadata, Error> {
        let draft_resources = self.open_revision_once(id).await?;

        let published_tag_name = published_tag(revision);
        let reference = self.reference(&published_tag_name)?;
        let digest = self
            .push_package(&reference, &draft_resources.package, &id.workspace_name)
            .await?;
        self.digest_cache.insert(published_tag_name, digest);

        Ok(PackageRevisionMetadata {
            id: id.clone().published(revision),
            lifecycle: Lifecycle::Published,
            tasks: Vec::new(),
            latest: true,
        })
    }

    #[instrument(skip_all, fields(registry = %self.registry, workspace = %id.workspace_name))]
    async fn delete(&self, id: &PackageRevisionId) -> Result<(), Error> {
        let tag = match &id.revision {
            Some(revision) => published_tag(revision),
            None => draft_tag(&id.workspace_name),
        };
        let reference = self.reference(&tag)?;
        self.client()
            .delete_manifest(&reference, &self.auth)
            .await
            .map_err(|e| Error::with_source(ErrorKind::Upstream, format!("failed to delete tag {tag}"), e))?;
        self.digest_cache.remove(&tag);
        Ok(())
    }
}

impl OciDriver {
    async fn list_revisions_once(&self) -> Result<Vec<PackageRevisionMetadata>, Error> {
        let reference = self.reference("latest")?;
        let tags = self
            .client()
            .list_tags(&reference, &self.auth, None, None)
            .await
            .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to list tags", e))?;

        let mut metadata = Vec::new();
        let repository = format!("{}/{}", self.registry, self.repository);
        let published = published_revisions(&tags.tags);
        let latest = published.iter().max_by(|a, b| kpt_krm::compare_revisions(a, b)).cloned();

        for revision in &published {
            metadata.push(PackageRevisionMetadata {
                id: PackageRevisionId::new(&repository, &self.repository, String::new()).published(revision.clone()),
                lifecycle: Lifecycle::Published,
                tasks: Vec::new(),
                latest: Some(revision) == latest.as_ref(),
            });
        }
        for tag in tags.tags.iter().filter_map(|t| t.strip_prefix("drafts-")) {
            metadata.push(PackageRevisionMetadata {
                id: PackageRevisionId::new(&repository, &self.repository, tag),
                lifecycle: Lifecycle::Draft,
                tasks: Vec::new(),
                latest: false,
            });
        }
        Ok(metadata)
    }

    async fn open_revision_once(&self, id: &PackageRevisionId) -> Result<PackageRevisionResources, Error> {
        let tag = match &id.revision {
            Some(revision) => published_tag(revision),
            None => draft_tag(&id.workspace_name),
        };
        let reference = self.reference(&tag)?;

        let image = self
            .client()
            .pull(&reference, &self.auth, vec![LAYER_MEDIA_TYPE])
            .await
            .map_err(|e| Error::with_source(ErrorKind::NotFound, format!("failed to pull {tag}"), e))?;

        let layer = image
            .layers
            .first()
            .ok_or_else(|| Error::new(ErrorKind::Upstream, format!("{tag} has no resource layer")))?;
        let package = tar_layer::unpack(&layer.data)?;

        Ok(PackageRevisionResources { id: id.clone(), package })
    }

    async fn current_digest(&self, reference: &Reference) -> Result<Option<String>, Error> {
        match self.client().fetch_manifest_digest(reference, &self.auth).await {
            Ok(digest) => Ok(Some(digest)),
            Err(_) => Ok(None),
        }
    }

    async fn push_package(
        &self,
        reference: &Reference,
        package: &kpt_krm::Package,
        workspace_name: &str,
    ) -> Result<String, Error> {
        let layer_bytes = tar_layer::pack(package)?;
        let layer_digest = format!("sha256:{:x}", Sha256::digest(&layer_bytes));
        let layer = ImageLayer::new(layer_bytes, LAYER_MEDIA_TYPE.to_owned(), None);

        let config = OciConfig::oci_v1(b"{}".to_vec(), None);

        let mut manifest = OciImageManifest::build(&[layer.clone()], &config, None);
        manifest
            .annotations
            .get_or_insert_with(std::collections::BTreeMap::new)
            .insert(tagging::workspace_annotation_key().to_owned(), workspace_name.to_owned());

        self.client()
            .push(reference, &[layer], config, &self.auth, Some(manifest))
            .await
            .map_err(|e| Error::with_source(ErrorKind::Upstream, format!("failed to push {reference}"), e))?;

        Ok(layer_digest)
    }
}
