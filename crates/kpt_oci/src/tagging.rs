//! Tag scheme for the OCI driver: `<packageName>:<revision>` for published
//! revisions, `<packageName>:drafts-<slug>` otherwise. `workspaceName` is
//! not guaranteed to be a valid OCI tag component, so non-published tags
//! carry a derived slug and the original name is kept in the image's
//! annotations instead.

const WORKSPACE_ANNOTATION: &str = "dev.kpt.workspace-name";

pub fn published_tag(revision: &str) -> String {
    revision.to_owned()
}

pub fn draft_tag(workspace_name: &str) -> String {
    format!("drafts-{}", slug(workspace_name))
}

pub fn workspace_annotation_key() -> &'static str {
    WORKSPACE_ANNOTATION
}

/// Lowercases and replaces any character outside `[a-z0-9._-]` with `-`,
/// the subset every OCI registry accepts in a tag.
fn slug(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.to_ascii_lowercase().chars() {
        if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
            out.push(c);
        } else {
            out.push('-');
        }
    }
    if out.is_empty() {
        "workspace".to_owned()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_replaces_unsafe_characters() {
        assert_eq!(draft_tag("v1/feature"), "drafts-v1-feature");
        assert_eq!(draft_tag("Release Candidate"), "drafts-release-candidate");
    }

    #[test]
    fn published_tag_is_revision_verbatim() {
        assert_eq!(published_tag("v2"), "v2");
    }
}
