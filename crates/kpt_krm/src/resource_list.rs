use kpt_errors::Error;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::resource::{Provenance, Resource};

/// Severity of a [`FunctionResult`]. `Error` fails the render; `Warning` is
/// reported but non-fatal; `Info` is purely informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRef {
    #[serde(rename = "apiVersion", skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRef {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionResult {
    pub message: String,
    pub severity: Severity,
    #[serde(rename = "resourceRef", skip_serializing_if = "Option::is_none")]
    pub resource_ref: Option<ResourceRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<FileRef>,
}

/// The wire format every function reads from stdin and writes to stdout:
/// a single document carrying the resource stream, the function's own
/// configuration, and any results it reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceList {
    #[serde(rename = "apiVersion", default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    pub items: Vec<Value>,
    #[serde(rename = "functionConfig", skip_serializing_if = "Option::is_none")]
    pub function_config: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<FunctionResult>,
}

fn default_api_version() -> String {
    "config.kubernetes.io/v1".to_owned()
}

fn default_kind() -> String {
    "ResourceList".to_owned()
}

impl ResourceList {
    pub fn from_resources(resources: &[Resource], function_config: Option<Value>) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            items: resources.iter().map(|r| r.content.clone()).collect(),
            function_config,
            results: Vec::new(),
        }
    }

    /// Parses `items` back into [`Resource`]s, assigning provenance as
    /// "function-output" since a function is free to reorder or add items
    /// and the original file/index no longer applies until the pipeline
    /// writes the stream back to disk.
    pub fn into_resources(self) -> Result<Vec<Resource>, Error> {
        self.items
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                Resource::from_value(
                    value,
                    Provenance {
                        path: "function-output".to_owned(),
                        index,
                    },
                )
            })
            .collect()
    }

    pub fn has_fatal_results(&self) -> bool {
        self.results.iter().any(|r| r.severity == Severity::Error)
    }

    pub fn to_wire(&self) -> Result<String, Error> {
        serde_yaml::to_string(self).map_err(|e| {
            kpt_errors::Error::with_source(
                kpt_errors::ErrorKind::InvalidInput,
                "failed to encode ResourceList",
                e,
            )
        })
    }

    pub fn from_wire(text: &str) -> Result<Self, Error> {
        serde_yaml::from_str(text).map_err(|e| {
            kpt_errors::Error::with_source(
                kpt_errors::ErrorKind::FunctionFailed,
                "function emitted a malformed ResourceList",
                e,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_wire_format() {
        let list = ResourceList {
            api_version: default_api_version(),
            kind: default_kind(),
            items: vec![serde_yaml::from_str("apiVersion: v1\nkind: Namespace\nmetadata:\n  name: a\n").unwrap()],
            function_config: None,
            results: vec![],
        };
        let wire = list.to_wire().unwrap();
        let parsed = ResourceList::from_wire(&wire).unwrap();
        assert_eq!(parsed.items.len(), 1);
    }

    #[test]
    fn fatal_results_require_error_severity() {
        let mut list = ResourceList {
            api_version: default_api_version(),
            kind: default_kind(),
            items: vec![],
            function_config: None,
            results: vec![FunctionResult {
                message: "heads up".into(),
                severity: Severity::Warning,
                resource_ref: None,
                file: None,
            }],
        };
        assert!(!list.has_fatal_results());
        list.results.push(FunctionResult {
            message: "bad config".into(),
            severity: Severity::Error,
            resource_ref: None,
            file: None,
        });
        assert!(list.has_fatal_results());
    }
}
