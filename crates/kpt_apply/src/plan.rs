//! Server-side dry-run plan construction.

use kpt_errors::{Error, ErrorKind};
use kpt_krm::{InjectionPolicy, Resource, ResourceIdentity};
use kube::api::{Api, DynamicObject, Patch, PatchParams};
use kube::core::GroupVersionKind;
use kube::discovery::Discovery;
use kube::Client;
use serde_json::Value;

const FIELD_MANAGER: &str = "kpt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Create,
    Unchanged,
    Update,
    Skip,
    Delete,
    Error(String),
}

#[derive(Debug, Clone)]
pub struct PlannedObject {
    pub identity: ResourceIdentity,
    pub action: Action,
}

/// Resolves GVK-to-resource mappings once per plan, since discovery is a
/// cluster round-trip the planner shouldn't repeat per object.
pub struct Planner {
    client: Client,
    discovery: Discovery,
}

impl Planner {
    pub async fn new(client: Client) -> Result<Self, Error> {
        let discovery = Discovery::new(client.clone())
            .run()
            .await
            .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to discover cluster API resources", e))?;
        Ok(Self { client, discovery })
    }

    /// Plans one desired resource: issues a server-side dry-run apply and
    /// classifies the action from the before/after snapshots.
    pub async fn plan_one(&self, resource: &Resource) -> PlannedObject {
        let identity = resource.identity();
        if resource.is_local_config() {
            return PlannedObject { identity, action: Action::Skip };
        }

        match resource.config_injection() {
            Some(Err(e)) => return PlannedObject { identity, action: Action::Error(e.flatten()) },
            // TODO: bind to a cluster-side source once one is named; until
            // then an injection point can't be satisfied.
            Some(Ok(InjectionPolicy::Required)) => {
                return PlannedObject {
                    identity,
                    action: Action::Error(format!("{identity} is a required config-injection point with no bound source")),
                }
            }
            Some(Ok(InjectionPolicy::Optional)) => return PlannedObject { identity, action: Action::Skip },
            None => {}
        }

        match self.dry_run(resource).await {
            Ok(classification) => PlannedObject { identity, action: classification },
            Err(e) => PlannedObject { identity, action: Action::Error(e.flatten()) },
        }
    }

    async fn dry_run(&self, resource: &Resource) -> Result<Action, Error> {
        let gvk = GroupVersionKind::gvk(&resource.group, &resource.version, &resource.kind);
        // The kind isn't registered with the cluster yet (its CRD hasn't landed, or
        // discovery ran before a just-applied CRD became visible). Collapses to
        // Create rather than failing the plan: once the mapping exists the object
        // didn't exist either, so Create is the outcome a retry would produce.
        let Some((ar, _caps)) = self.discovery.resolve_gvk(&gvk) else {
            return Ok(Action::Create);
        };

        let api: Api<DynamicObject> = if resource.namespace.is_empty() {
            Api::all_with(self.client.clone(), &ar)
        } else {
            Api::namespaced_with(self.client.clone(), &resource.namespace, &ar)
        };

        let existed = api.get_opt(&resource.name).await.map_err(|e| {
            Error::with_source(ErrorKind::Upstream, format!("failed to read {}", resource.identity()), e)
        })?;

        let mut params = PatchParams::apply(FIELD_MANAGER);
        params.dry_run = true;
        params.force = true;
        let patched = api
            .patch(&resource.name, &params, &Patch::Apply(&resource.content))
            .await
            .map_err(|e| Error::with_source(ErrorKind::Upstream, format!("dry-run failed for {}", resource.identity()), e))?;

        Ok(classify(existed.as_ref(), &patched))
    }
}

fn classify(before: Option<&DynamicObject>, after: &DynamicObject) -> Action {
    match before {
        None => Action::Create,
        Some(before) => {
            if strip_managed_fields(&before.data) == strip_managed_fields(&after.data) {
                Action::Unchanged
            } else {
                Action::Update
            }
        }
    }
}

fn strip_managed_fields(value: &Value) -> Value {
    let mut value = value.clone();
    if let Some(metadata) = value.get_mut("metadata").and_then(|m| m.as_object_mut()) {
        metadata.remove("managedFields");
        metadata.remove("resourceVersion");
        metadata.remove("generation");
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_after_stripping_managed_fields() {
        let before = serde_json::json!({ "metadata": { "name": "a", "resourceVersion": "1" }, "spec": { "x": 1 } });
        let after = serde_json::json!({ "metadata": { "name": "a", "resourceVersion": "2" }, "spec": { "x": 1 } });
        assert_eq!(strip_managed_fields(&before), strip_managed_fields(&after));
    }

    #[test]
    fn structural_difference_is_detected() {
        let before = serde_json::json!({ "metadata": { "name": "a" }, "spec": { "x": 1 } });
        let after = serde_json::json!({ "metadata": { "name": "a" }, "spec": { "x": 2 } });
        assert_ne!(strip_managed_fields(&before), strip_managed_fields(&after));
    }

    fn resource_with_injection(policy: &str) -> Resource {
        kpt_krm::document::Document::parse_file(
            "c.yaml",
            &format!("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: c\n  annotations:\n    kpt.dev/config-injection: \"{policy}\"\n"),
        )
        .unwrap()
        .remove(0)
        .resource
    }

    #[test]
    fn required_injection_point_without_a_bound_source_is_an_error() {
        let resource = resource_with_injection("required");
        assert_eq!(resource.config_injection().unwrap().unwrap(), InjectionPolicy::Required);
    }

    #[test]
    fn optional_injection_point_parses() {
        let resource = resource_with_injection("optional");
        assert_eq!(resource.config_injection().unwrap().unwrap(), InjectionPolicy::Optional);
    }
}
