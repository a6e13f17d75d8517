use indexmap::IndexMap;
use kpt_errors::{Error, ErrorKind};
use serde_yaml::Value;

use crate::identity::ResourceIdentity;

/// Where a resource came from within its package, so the render engine and
/// the planner can report failures against a file a user can open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub path: String,
    pub index: usize,
}

/// `kpt.dev/config-injection` policy: whether the planner must bind the
/// resource to a cluster-side source before apply, or may leave it as-is
/// when no source is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionPolicy {
    Required,
    Optional,
}

/// A single KRM document: the parsed content plus the identity fields
/// extracted from it. `content` is the full document including
/// `apiVersion`/`kind`/`metadata`/spec, so a function that doesn't touch a
/// resource can round-trip it byte-for-byte once re-serialized through
/// [`crate::document`].
#[derive(Debug, Clone)]
pub struct Resource {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub annotations: IndexMap<String, String>,
    pub content: Value,
    pub provenance: Provenance,
}

impl Resource {
    pub fn identity(&self) -> ResourceIdentity {
        ResourceIdentity::new(&self.group, &self.kind, &self.namespace, &self.name)
    }

    pub fn is_local_config(&self) -> bool {
        self.annotations
            .get("config.kubernetes.io/local-config")
            .is_some_and(|v| v == "true")
    }

    pub fn depends_on(&self) -> Option<Result<ResourceIdentity, Error>> {
        self.annotations
            .get("config.kubernetes.io/depends-on")
            .map(|v| ResourceIdentity::parse_depends_on(v))
    }

    /// Parses `kpt.dev/config-injection`, if present. `Some(Err(_))` means
    /// the annotation value isn't `required` or `optional`.
    pub fn config_injection(&self) -> Option<Result<InjectionPolicy, Error>> {
        self.annotations.get("kpt.dev/config-injection").map(|v| match v.as_str() {
            "required" => Ok(InjectionPolicy::Required),
            "optional" => Ok(InjectionPolicy::Optional),
            other => Err(Error::new(ErrorKind::InvalidInput, format!("invalid config-injection policy: {other}"))),
        })
    }

    /// Parses a document's `apiVersion`/`kind`/`metadata` into a [`Resource`].
    /// `apiVersion` is either `<version>` (core group) or `<group>/<version>`.
    pub fn from_value(content: Value, provenance: Provenance) -> Result<Self, Error> {
        let api_version = content
            .get("apiVersion")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::new(ErrorKind::InvalidInput, "resource has no apiVersion"))?
            .to_owned();
        let kind = content
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::new(ErrorKind::InvalidInput, "resource has no kind"))?
            .to_owned();

        let (group, version) = match api_version.split_once('/') {
            Some((group, version)) => (group.to_owned(), version.to_owned()),
            None => (String::new(), api_version),
        };

        let metadata = content.get("metadata");
        let name = metadata
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let namespace = metadata
            .and_then(|m| m.get("namespace"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        let mut annotations = IndexMap::new();
        if let Some(Value::Mapping(map)) = metadata.and_then(|m| m.get("annotations")) {
            for (k, v) in map {
                if let (Some(k), Some(v)) = (k.as_str(), v.as_str()) {
                    annotations.insert(k.to_owned(), v.to_owned());
                }
            }
        }

        Ok(Self {
            group,
            version,
            kind,
            namespace,
            name,
            annotations,
            content,
            provenance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource_from(yaml: &str) -> Resource {
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        Resource::from_value(value, Provenance { path: "a.yaml".into(), index: 0 }).unwrap()
    }

    #[test]
    fn splits_group_and_version() {
        let r = resource_from(
            "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: api\n  namespace: prod\n",
        );
        assert_eq!(r.group, "apps");
        assert_eq!(r.version, "v1");
        assert_eq!(r.identity(), ResourceIdentity::new("apps", "Deployment", "prod", "api"));
    }

    #[test]
    fn core_group_has_no_group_segment() {
        let r = resource_from("apiVersion: v1\nkind: Namespace\nmetadata:\n  name: prod\n");
        assert_eq!(r.group, "");
        assert_eq!(r.version, "v1");
    }

    #[test]
    fn local_config_annotation_is_detected() {
        let r = resource_from(
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: c\n  annotations:\n    config.kubernetes.io/local-config: \"true\"\n",
        );
        assert!(r.is_local_config());
    }

    #[test]
    fn missing_api_version_is_invalid_input() {
        let value: Value = serde_yaml::from_str("kind: ConfigMap\n").unwrap();
        let err = Resource::from_value(value, Provenance { path: "a.yaml".into(), index: 0 }).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
