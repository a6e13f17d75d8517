//! The `ResourceGroup` custom resource: the live inventory persisted in the
//! target cluster alongside the objects it tracks.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const GROUP: &str = "kpt.dev";
pub const VERSION: &str = "v1alpha1";
pub const KIND: &str = "ResourceGroup";

/// Label carrying the inventory's stable id, assigned once at `init` time.
pub const INVENTORY_ID_LABEL: &str = "cli-utils.sigs.k8s.io/inventory-id";

/// Label identifying the tool that owns strict-match policy over this
/// inventory. Absent or set to a different value permits adoption.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY_VALUE: &str = "kpt";

/// One tracked object identity: `(group, kind, namespace, name)`. Kept
/// standalone (not `kpt_krm::ResourceIdentity`) since this is the
/// cluster-facing CRD wire format; `kpt_apply` converts between the two at
/// the boundary where both crates are already in scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct ObjectReference {
    pub group: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, CustomResource)]
#[kube(
    group = "kpt.dev",
    version = "v1alpha1",
    kind = "ResourceGroup",
    namespaced,
    status = "ResourceGroupStatus"
)]
pub struct ResourceGroupSpec {
    pub id: String,
    #[serde(default)]
    pub resources: Vec<ObjectReference>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ResourceGroupStatus {
    #[serde(default)]
    pub observed_generation: i64,
}
