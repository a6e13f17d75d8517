//! Kind-specific reconcile-status rules.

use kube::api::DynamicObject;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileStatus {
    InProgress,
    Current,
    Failed,
    Terminating,
}

/// Computes the reconcile status of a live object. Deployment, PVC, and CRD
/// get kind-specific rules; everything else falls back to a generic
/// `status.conditions[type=Ready]` check with an observed-generation
/// fallback.
pub fn compute(object: &DynamicObject) -> ReconcileStatus {
    if object.metadata.deletion_timestamp.is_some() {
        return ReconcileStatus::Terminating;
    }

    let kind = object.types.as_ref().map(|t| t.kind.as_str()).unwrap_or_default();
    match kind {
        "Deployment" => deployment_status(object),
        "PersistentVolumeClaim" => pvc_status(object),
        "CustomResourceDefinition" => crd_status(object),
        _ => generic_status(object),
    }
}

fn deployment_status(object: &DynamicObject) -> ReconcileStatus {
    let status = object.data.get("status");
    let spec = object.data.get("spec");
    let desired = spec.and_then(|s| s.get("replicas")).and_then(Value::as_i64).unwrap_or(1);
    let available = status.and_then(|s| s.get("availableReplicas")).and_then(Value::as_i64).unwrap_or(0);
    let observed_generation_matches = generation_matches(object);

    if available >= desired && observed_generation_matches {
        ReconcileStatus::Current
    } else {
        ReconcileStatus::InProgress
    }
}

fn pvc_status(object: &DynamicObject) -> ReconcileStatus {
    let phase = object
        .data
        .get("status")
        .and_then(|s| s.get("phase"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    match phase {
        "Bound" => ReconcileStatus::Current,
        "Lost" => ReconcileStatus::Failed,
        _ => ReconcileStatus::InProgress,
    }
}

fn crd_status(object: &DynamicObject) -> ReconcileStatus {
    let established = condition_status(object, "Established");
    match established.as_deref() {
        Some("True") => ReconcileStatus::Current,
        Some("False") => ReconcileStatus::Failed,
        _ => ReconcileStatus::InProgress,
    }
}

fn generic_status(object: &DynamicObject) -> ReconcileStatus {
    match condition_status(object, "Ready").as_deref() {
        Some("True") => ReconcileStatus::Current,
        Some("False") => ReconcileStatus::Failed,
        _ if generation_matches(object) => ReconcileStatus::Current,
        _ => ReconcileStatus::InProgress,
    }
}

fn condition_status(object: &DynamicObject, condition_type: &str) -> Option<String> {
    object
        .data
        .get("status")?
        .get("conditions")?
        .as_array()?
        .iter()
        .find(|c| c.get("type").and_then(Value::as_str) == Some(condition_type))
        .and_then(|c| c.get("status"))
        .and_then(Value::as_str)
        .map(str::to_owned)
}

fn generation_matches(object: &DynamicObject) -> bool {
    let generation = object.metadata.generation;
    let observed = object
        .data
        .get("status")
        .and_then(|s| s.get("observedGeneration"))
        .and_then(Value::as_i64);
    match (generation, observed) {
        (Some(g), Some(o)) => g == o,
        (None, _) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use kube::core::{ObjectMeta, TypeMeta};

    use super::*;

    fn object_with(kind: &str, data: Value) -> DynamicObject {
        DynamicObject {
            types: Some(TypeMeta { api_version: "v1".into(), kind: kind.into() }),
            metadata: ObjectMeta::default(),
            data,
        }
    }

    #[test]
    fn deployment_is_current_when_replicas_available() {
        let object = object_with(
            "Deployment",
            serde_json::json!({ "spec": { "replicas": 2 }, "status": { "availableReplicas": 2 } }),
        );
        assert_eq!(compute(&object), ReconcileStatus::Current);
    }

    #[test]
    fn deployment_is_in_progress_when_replicas_short() {
        let object = object_with(
            "Deployment",
            serde_json::json!({ "spec": { "replicas": 3 }, "status": { "availableReplicas": 1 } }),
        );
        assert_eq!(compute(&object), ReconcileStatus::InProgress);
    }

    #[test]
    fn pvc_bound_is_current() {
        let object = object_with("PersistentVolumeClaim", serde_json::json!({ "status": { "phase": "Bound" } }));
        assert_eq!(compute(&object), ReconcileStatus::Current);
    }

    #[test]
    fn generic_ready_condition_true_is_current() {
        let object = object_with(
            "Widget",
            serde_json::json!({ "status": { "conditions": [{ "type": "Ready", "status": "True" }] } }),
        );
        assert_eq!(compute(&object), ReconcileStatus::Current);
    }
}
