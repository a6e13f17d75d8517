use indexmap::IndexMap;
use kpt_errors::{Error, ErrorKind};

use crate::document::Document;
use crate::resource::Resource;

/// The file name of a package's manifest, declaring upstream lineage,
/// readiness gates, and render pipeline.
pub const MANIFEST_FILE_NAME: &str = "Kptfile";

/// An ordered directory tree of KRM resources: a flat map from
/// forward-slash-normalized relative path to file contents. Subpackages are
/// just paths whose directory also contains a `Kptfile`; [`Package::split_subpackages`]
/// partitions them out.
#[derive(Debug, Clone, Default)]
pub struct Package {
    pub files: IndexMap<String, String>,
}

impl Package {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a file, rejecting paths that aren't relative or that escape
    /// the package root.
    pub fn insert_file(&mut self, path: impl Into<String>, contents: impl Into<String>) -> Result<(), Error> {
        let path = normalize_relative_path(&path.into())?;
        self.files.insert(path, contents.into());
        Ok(())
    }

    pub fn manifest(&self) -> Result<Option<Resource>, Error> {
        let Some(raw) = self.files.get(MANIFEST_FILE_NAME) else {
            return Ok(None);
        };
        let docs = Document::parse_file(MANIFEST_FILE_NAME, raw)?;
        Ok(docs.into_iter().next().map(|d| d.resource))
    }

    /// Parses every YAML file in the package into [`Document`]s, in file-path
    /// order. Non-YAML files (READMEs, licenses) are not resources and are
    /// carried by [`Package::files`] alone.
    pub fn documents(&self) -> Result<Vec<Document>, Error> {
        let mut docs = Vec::new();
        for (path, contents) in &self.files {
            if !is_yaml_path(path) {
                continue;
            }
            docs.extend(Document::parse_file(path, contents)?);
        }
        Ok(docs)
    }

    /// Splits this package into (itself, with subpackage files removed) and
    /// its direct subpackages, keyed by the subpackage's root directory.
    /// Only the *direct* children are returned; recursing into a returned
    /// subpackage's own subpackages is the caller's job (the render engine
    /// walks depth-first).
    pub fn split_subpackages(&self) -> (Package, IndexMap<String, Package>) {
        let subpackage_roots = self.direct_subpackage_roots();

        let mut parent = Package::new();
        let mut children: IndexMap<String, Package> = IndexMap::new();
        for (path, contents) in &self.files {
            if let Some(root) = subpackage_roots.iter().find(|r| is_under(path, r)) {
                let relative = path.strip_prefix(&format!("{root}/")).unwrap_or(path);
                children
                    .entry(root.clone())
                    .or_default()
                    .files
                    .insert(relative.to_owned(), contents.clone());
            } else {
                parent.files.insert(path.clone(), contents.clone());
            }
        }
        (parent, children)
    }

    fn direct_subpackage_roots(&self) -> Vec<String> {
        let mut roots: Vec<String> = self
            .files
            .keys()
            .filter(|p| p.ends_with(&format!("/{MANIFEST_FILE_NAME}")))
            .map(|p| p[..p.len() - MANIFEST_FILE_NAME.len() - 1].to_owned())
            .collect();
        roots.sort();
        // Drop any root nested inside an already-collected root: only
        // direct children are subpackages at this level.
        let mut direct = Vec::new();
        for root in roots {
            if !direct.iter().any(|d: &String| is_under(&root, d)) {
                direct.push(root);
            }
        }
        direct
    }
}

fn is_under(path: &str, root: &str) -> bool {
    path.starts_with(&format!("{root}/"))
}

fn is_yaml_path(path: &str) -> bool {
    path.ends_with(".yaml") || path.ends_with(".yml") || path.ends_with(MANIFEST_FILE_NAME)
}

fn normalize_relative_path(path: &str) -> Result<String, Error> {
    let normalized = path.replace('\\', "/");
    let normalized = normalized.trim_start_matches("./").to_owned();
    if normalized.starts_with('/') || normalized.split('/').any(|seg| seg == "..") {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            format!("path escapes package root: {path}"),
        ));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_upward_traversal() {
        let mut pkg = Package::new();
        let err = pkg.insert_file("../escape.yaml", "x: 1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn rejects_absolute_path() {
        let mut pkg = Package::new();
        let err = pkg.insert_file("/etc/passwd", "x: 1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn splits_direct_subpackage_only() {
        let mut pkg = Package::new();
        pkg.insert_file(MANIFEST_FILE_NAME, "apiVersion: kpt.dev/v1\nkind: Kptfile\nmetadata:\n  name: parent\n").unwrap();
        pkg.insert_file("deployment.yaml", "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: a\n").unwrap();
        pkg.insert_file(
            "child/Kptfile",
            "apiVersion: kpt.dev/v1\nkind: Kptfile\nmetadata:\n  name: child\n",
        )
        .unwrap();
        pkg.insert_file(
            "child/grandchild/Kptfile",
            "apiVersion: kpt.dev/v1\nkind: Kptfile\nmetadata:\n  name: grandchild\n",
        )
        .unwrap();

        let (parent, children) = pkg.split_subpackages();
        assert_eq!(parent.files.len(), 2);
        assert_eq!(children.len(), 1);
        assert!(children.contains_key("child"));
        // grandchild stays nested inside the "child" subpackage's own file map
        assert!(children["child"].files.contains_key("grandchild/Kptfile"));
    }
}
