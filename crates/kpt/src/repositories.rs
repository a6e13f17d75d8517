//! Bootstraps a [`RepositoryRegistry`] from a local YAML file, since this
//! thin CLI has no apiserver-backed `Repository` resource to read from.
//! Every invocation rebuilds the registry from this file; it is the CLI's
//! only persisted state.

use std::sync::Arc;

use camino::Utf8Path;
use kpt_errors::{Error, ErrorKind, OperationContext as _};
use kpt_git::GitDriver;
use kpt_oci::OciDriver;
use kpt_porch_core::{ContentKind, Repository, RepositoryEntry, RepositoryRegistry};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(default)]
pub struct RepositoriesFile {
    pub repositories: Vec<RepositoryConfigEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RepositoryConfigEntry {
    pub name: String,
    pub kind: RepositoryKindConfig,
    #[serde(default)]
    pub content: ContentKindConfig,
    pub url: Option<String>,
    pub registry: Option<String>,
    pub repository: Option<String>,
    #[serde(default)]
    pub deployment: bool,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryKindConfig {
    Git,
    Oci,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentKindConfig {
    #[default]
    Package,
    Function,
}

impl RepositoriesFile {
    pub fn load(path: &Utf8Path) -> Result<Self, Error> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs_err::read_to_string(path)
            .map_err(|e| Error::with_source(ErrorKind::Upstream, format!("failed to read repositories file at {path}"), e))
            .op("load repositories file")?;
        serde_yaml::from_str(&contents)
            .map_err(|e| Error::with_source(ErrorKind::InvalidInput, format!("malformed repositories file at {path}"), e))
            .op("load repositories file")
    }

    pub fn save(&self, path: &Utf8Path) -> Result<(), Error> {
        let yaml = serde_yaml::to_string(self)
            .map_err(|e| Error::with_source(ErrorKind::InvalidInput, "failed to serialize repositories file", e))?;
        fs_err::write(path, yaml)
            .map_err(|e| Error::with_source(ErrorKind::Upstream, format!("failed to write repositories file at {path}"), e))
            .op("save repositories file")
    }

    /// Builds the live registry a [`kpt_porch_core::PackageRevisionStore`]
    /// dispatches against, cloning repository caches/drivers fresh each run.
    pub fn build_registry(&self, cache_directory: &str) -> Result<RepositoryRegistry, Error> {
        let registry = RepositoryRegistry::new();
        for entry in &self.repositories {
            let driver = match entry.kind {
                RepositoryKindConfig::Git => {
                    let url = entry.url.as_deref().ok_or_else(|| {
                        Error::new(ErrorKind::InvalidInput, format!("repository {} is kind git but has no url", entry.name))
                    })?;
                    Repository::Git(GitDriver::new(url, cache_directory))
                }
                RepositoryKindConfig::Oci => {
                    let registry_host = entry.registry.as_deref().ok_or_else(|| {
                        Error::new(ErrorKind::InvalidInput, format!("repository {} is kind oci but has no registry", entry.name))
                    })?;
                    let repository_path = entry.repository.as_deref().ok_or_else(|| {
                        Error::new(ErrorKind::InvalidInput, format!("repository {} is kind oci but has no repository", entry.name))
                    })?;
                    Repository::Oci(OciDriver::new(registry_host, repository_path))
                }
            };
            registry.register(
                entry.name.clone(),
                RepositoryEntry {
                    driver,
                    content: match entry.content {
                        ContentKindConfig::Package => ContentKind::Package,
                        ContentKindConfig::Function => ContentKind::Function,
                    },
                    deployment: entry.deployment,
                    description: entry.description.clone(),
                },
            );
        }
        Ok(registry)
    }
}

pub fn store_from_file(path: &Utf8Path, cache_directory: &str) -> Result<kpt_porch_core::PackageRevisionStore, Error> {
    let file = RepositoriesFile::load(path)?;
    let registry = file.build_registry(cache_directory)?;
    Ok(kpt_porch_core::PackageRevisionStore::new(Arc::new(registry)))
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::*;

    fn temp_path(name: &str) -> Utf8PathBuf {
        let dir = Utf8PathBuf::try_from(std::env::temp_dir()).unwrap();
        dir.join(format!("kpt-repositories-test-{name}-{}.yaml", std::process::id()))
    }

    #[test]
    fn load_missing_file_returns_default() {
        let path = temp_path("missing");
        let file = RepositoriesFile::load(&path).unwrap();
        assert!(file.repositories.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let path = temp_path("roundtrip");
        let file = RepositoriesFile {
            repositories: vec![RepositoryConfigEntry {
                name: "blueprints".to_owned(),
                kind: RepositoryKindConfig::Git,
                content: ContentKindConfig::Package,
                url: Some("https://example.com/blueprints.git".to_owned()),
                registry: None,
                repository: None,
                deployment: false,
                description: "example blueprints".to_owned(),
            }],
        };
        file.save(&path).unwrap();

        let loaded = RepositoriesFile::load(&path).unwrap();
        fs_err::remove_file(&path).unwrap();

        assert_eq!(loaded.repositories.len(), 1);
        assert_eq!(loaded.repositories[0].name, "blueprints");
        assert_eq!(loaded.repositories[0].kind, RepositoryKindConfig::Git);
    }

    #[test]
    fn build_registry_registers_git_and_oci_entries() {
        let file = RepositoriesFile {
            repositories: vec![
                RepositoryConfigEntry {
                    name: "blueprints".to_owned(),
                    kind: RepositoryKindConfig::Git,
                    content: ContentKindConfig::Package,
                    url: Some("https://example.com/blueprints.git".to_owned()),
                    registry: None,
                    repository: None,
                    deployment: false,
                    description: String::new(),
                },
                RepositoryConfigEntry {
                    name: "deploy".to_owned(),
                    kind: RepositoryKindConfig::Oci,
                    content: ContentKindConfig::Function,
                    url: None,
                    registry: Some("registry.example.com".to_owned()),
                    repository: Some("packages/deploy".to_owned()),
                    deployment: true,
                    description: String::new(),
                },
            ],
        };

        let registry = file.build_registry("/tmp/kpt-repo-cache").unwrap();
        let mut names = registry.names();
        names.sort();
        assert_eq!(names, vec!["blueprints".to_owned(), "deploy".to_owned()]);
    }

    #[test]
    fn build_registry_rejects_git_entry_without_url() {
        let file = RepositoriesFile {
            repositories: vec![RepositoryConfigEntry {
                name: "broken".to_owned(),
                kind: RepositoryKindConfig::Git,
                content: ContentKindConfig::Package,
                url: None,
                registry: None,
                repository: None,
                deployment: false,
                description: String::new(),
            }],
        };

        let err = file.build_registry("/tmp/kpt-repo-cache").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
