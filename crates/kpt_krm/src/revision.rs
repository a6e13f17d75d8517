use crate::package::Package;

/// Where a package revision lives: which repository, under what package
/// name, and (while unpublished) which workspace. `revision` is assigned
/// only on publish.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageRevisionId {
    pub repository: String,
    pub package_name: String,
    pub workspace_name: String,
    pub revision: Option<String>,
}

impl PackageRevisionId {
    pub fn new(
        repository: impl Into<String>,
        package_name: impl Into<String>,
        workspace_name: impl Into<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            package_name: package_name.into(),
            workspace_name: workspace_name.into(),
            revision: None,
        }
    }

    pub fn published(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }
}

/// The four states a package revision moves through. Transitions live in
/// `kpt_porch_core::lifecycle`, the only code permitted to construct a new
/// value of this type from an existing one; every other
/// consumer treats it as read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Draft,
    Proposed,
    Published,
    DeletionProposed,
}

/// One entry in a revision's construction history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    Init,
    Clone { source: PackageRevisionId },
    Edit,
    Eval { function_image: String },
    Patch,
}

/// The metadata view of a revision: everything but its file contents.
#[derive(Debug, Clone)]
pub struct PackageRevisionMetadata {
    pub id: PackageRevisionId,
    pub lifecycle: Lifecycle,
    pub tasks: Vec<Task>,
    pub latest: bool,
}

/// The content view of the same revision, sharing identity with its
/// [`PackageRevisionMetadata`].
#[derive(Debug, Clone)]
pub struct PackageRevisionResources {
    pub id: PackageRevisionId,
    pub package: Package,
}

/// Parses a revision string (`v1`, `v2.1`, ...) into a numeric major
/// component and the trailing suffix, for ordering. kpt revisions are not
/// semver, so this is deliberately simpler: the plain
/// `vN` case compares numerically, anything else compares lexically after
/// the numeric prefix.
fn parse_revision(revision: &str) -> (u64, String) {
    let digits = revision
        .strip_prefix('v')
        .unwrap_or(revision)
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>();
    let major = digits.parse().unwrap_or(0);
    let suffix = revision.strip_prefix('v').unwrap_or(revision)[digits.len()..].to_owned();
    (major, suffix)
}

/// The next revision number given every revision already published for a
/// package: `v1` if none exist, otherwise the greatest revision's major
/// component plus one, dropping any non-numeric suffix.
pub fn next_revision(existing: &[String]) -> String {
    let max_major = existing.iter().map(|r| parse_revision(r).0).max().unwrap_or(0);
    format!("v{}", max_major + 1)
}

/// Orders revisions the way "latest" selection does: by numeric major
/// component, then lexically by suffix.
pub fn compare_revisions(a: &str, b: &str) -> std::cmp::Ordering {
    parse_revision(a).cmp(&parse_revision(b))
}

#[cfg(test)]
mod revision_number_tests {
    use super::*;

    #[test]
    fn first_revision_is_v1() {
        assert_eq!(next_revision(&[]), "v1");
    }

    #[test]
    fn next_revision_increments_numeric_major() {
        let existing = vec!["v1".to_owned(), "v2".to_owned()];
        assert_eq!(next_revision(&existing), "v3");
    }

    #[test]
    fn suffix_is_ignored_for_next_revision_but_used_for_ordering() {
        assert_eq!(next_revision(&["v2.1".to_owned()]), "v3");
        assert_eq!(compare_revisions("v2", "v2.1"), std::cmp::Ordering::Less);
        assert_eq!(compare_revisions("v1", "v2"), std::cmp::Ordering::Less);
    }
}
