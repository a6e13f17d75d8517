use std::fmt;

use kpt_errors::{Error, ErrorKind};

/// A resource's identity: `(group, kind, namespace, name)`. `group` is the
/// empty string for the core API group, matching Kubernetes' own
/// convention, so comparisons never special-case it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceIdentity {
    pub group: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl ResourceIdentity {
    pub fn new(
        group: impl Into<String>,
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn is_namespaced(&self) -> bool {
        !self.namespace.is_empty()
    }

    /// Parses a `config.kubernetes.io/depends-on` annotation value:
    /// `<group>/namespaces/<ns>/<kind>/<name>` for namespaced objects or
    /// `<group>/<kind>/<name>` for cluster-scoped ones.
    pub fn parse_depends_on(value: &str) -> Result<Self, Error> {
        let parts: Vec<&str> = value.split('/').collect();
        match parts.as_slice() {
            [group, "namespaces", namespace, kind, name] => {
                Ok(Self::new(*group, *kind, *namespace, *name))
            }
            [group, kind, name] => Ok(Self::new(*group, *kind, "", *name)),
            _ => Err(Error::new(
                ErrorKind::InvalidInput,
                format!("malformed depends-on reference: {value}"),
            )),
        }
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_namespaced() {
            write!(
                f,
                "{}/namespaces/{}/{}/{}",
                self.group, self.namespace, self.kind, self.name
            )
        } else {
            write!(f, "{}/{}/{}", self.group, self.kind, self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_namespaced_reference() {
        let id = ResourceIdentity::parse_depends_on("apps/namespaces/prod/Deployment/api").unwrap();
        assert_eq!(id, ResourceIdentity::new("apps", "Deployment", "prod", "api"));
    }

    #[test]
    fn parses_cluster_scoped_reference() {
        let id = ResourceIdentity::parse_depends_on("rbac.authorization.k8s.io/ClusterRole/admin").unwrap();
        assert_eq!(
            id,
            ResourceIdentity::new("rbac.authorization.k8s.io", "ClusterRole", "", "admin")
        );
    }

    #[test]
    fn rejects_malformed_reference() {
        let err = ResourceIdentity::parse_depends_on("not-a-reference").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn display_round_trips_namespaced() {
        let id = ResourceIdentity::new("apps", "Deployment", "prod", "api");
        assert_eq!(id.to_string(), "apps/namespaces/prod/Deployment/api");
    }
}
