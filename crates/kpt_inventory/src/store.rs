//! Persistence for the live [`ResourceGroup`] inventory: CRD install,
//! optimistic-concurrency read/update, and legacy migration.

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::{Client, CustomResourceExt, ResourceExt};
use kpt_errors::{retry, Error, ErrorKind, OperationContext as _, RetryConfig};

use crate::resource_group::{ObjectReference, ResourceGroup, ResourceGroupSpec};

const FIELD_MANAGER: &str = "kpt";

pub struct InventoryStore {
    client: Client,
}

impl InventoryStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Installs the `ResourceGroup` CRD if absent, or updates it if the
    /// stored version set differs from the compiled-in schema. An update to
    /// an older, cluster-admin-owned CRD without permission surfaces as
    /// `Unauthorized`.
    pub async fn ensure_crd_installed(&self) -> Result<(), Error> {
        let crds: Api<CustomResourceDefinition> = Api::all(self.client.clone());
        let desired = ResourceGroup::crd();
        let name = desired.name_any();

        match crds.get(&name).await {
            Ok(existing) => {
                if crd_versions(&existing) == crd_versions(&desired) {
                    return Ok(());
                }
                crds.replace(&name, &PostParams::default(), &desired)
                    .await
                    .map_err(|e| {
                        if is_forbidden(&e) {
                            Error::with_source(ErrorKind::Unauthorized, "insufficient permissions to update ResourceGroup CRD", e)
                        } else {
                            Error::with_source(ErrorKind::Upstream, "failed to update ResourceGroup CRD", e)
                        }
                    })
                    .op("ensure_crd_installed")?;
                Ok(())
            }
            Err(kube::Error::Api(status)) if status.code == 404 => {
                crds.create(&PostParams::default(), &desired)
                    .await
                    .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to install ResourceGroup CRD", e))
                    .op("ensure_crd_installed")?;
                Ok(())
            }
            Err(e) => Err(Error::with_source(ErrorKind::Upstream, "failed to read ResourceGroup CRD", e)).op("ensure_crd_installed"),
        }
    }

    pub async fn get(&self, namespace: &str, name: &str) -> Result<Option<ResourceGroup>, Error> {
        let api: Api<ResourceGroup> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(rg) => Ok(Some(rg)),
            Err(kube::Error::Api(status)) if status.code == 404 => Ok(None),
            Err(e) => Err(Error::with_source(ErrorKind::Upstream, "failed to read inventory", e)),
        }
    }

    pub async fn create(&self, namespace: &str, name: &str, id: String) -> Result<ResourceGroup, Error> {
        let api: Api<ResourceGroup> = Api::namespaced(self.client.clone(), namespace);
        let mut rg = ResourceGroup::new(name, ResourceGroupSpec { id: id.clone(), resources: vec![] });
        rg.meta_mut().labels = Some(crate::policy::owned_labels(&id));
        api.create(&PostParams::default(), &rg)
            .await
            .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to create inventory", e))
    }

    /// Applies `mutate` to the inventory's resource list and writes it back
    /// with the resourceVersion it was read at, so a concurrent writer's
    /// update in between surfaces as a 409 the apiserver itself detects
    /// rather than a silent overwrite. On that conflict, rereads and retries
    /// the whole compute-then-write step from scratch.
    pub async fn update_resources(
        &self,
        namespace: &str,
        name: &str,
        mutate: impl Fn(&mut Vec<ObjectReference>),
    ) -> Result<ResourceGroup, Error> {
        let api: Api<ResourceGroup> = Api::namespaced(self.client.clone(), namespace);
        retry(RetryConfig::default(), |e| e.kind() == ErrorKind::Conflict, || {
            let api = api.clone();
            async move {
                let mut current = api
                    .get(name)
                    .await
                    .map_err(|e| Error::with_source(ErrorKind::NotFound, "inventory not found", e))?;
                let resource_version = current
                    .resource_version()
                    .ok_or_else(|| Error::new(ErrorKind::Upstream, "inventory has no resourceVersion"))?;
                mutate(&mut current.spec.resources);

                let patch = serde_json::json!({
                    "metadata": { "resourceVersion": resource_version },
                    "spec": { "resources": current.spec.resources },
                });
                api.patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
                    .await
                    .map_err(|e| match e {
                        kube::Error::Api(status) if status.code == 409 => {
                            Error::with_source(ErrorKind::Conflict, "inventory was updated concurrently", status)
                        }
                        e => Error::with_source(ErrorKind::Upstream, "failed to update inventory", e),
                    })
            }
        })
        .await
    }

    /// Removes `identity` from the inventory's tracked set without issuing
    /// any write to the cluster object it names.
    pub async fn abandon(&self, namespace: &str, name: &str, identity: &ObjectReference) -> Result<(), Error> {
        self.update_resources(namespace, name, |resources| {
            resources.retain(|r| r != identity);
        })
        .await
        .op("abandon")?;
        Ok(())
    }
}

fn crd_versions(crd: &CustomResourceDefinition) -> Vec<String> {
    crd.spec.versions.iter().map(|v| v.name.clone()).collect()
}

fn is_forbidden(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(status) if status.code == 403)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crd_versions_lists_declared_names() {
        let crd = ResourceGroup::crd();
        let versions = crd_versions(&crd);
        assert!(versions.contains(&"v1alpha1".to_owned()));
    }
}
