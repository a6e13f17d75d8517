//! Ref naming and the translation between local and remote-tracking refs.
//! Kept as free functions so the driver never builds a ref name by hand.

pub fn draft_branch(package_name: &str, workspace_name: &str) -> String {
    format!("drafts/{package_name}/{workspace_name}")
}

pub fn proposed_branch(package_name: &str, workspace_name: &str) -> String {
    format!("proposed/{package_name}/{workspace_name}")
}

pub fn published_tag(package_name: &str, revision: &str) -> String {
    format!("{package_name}/{revision}")
}

pub fn local_branch_ref(branch: &str) -> String {
    format!("refs/heads/{branch}")
}

pub fn remote_tracking_ref(branch: &str) -> String {
    format!("refs/remotes/origin/{branch}")
}

pub fn tag_ref(tag: &str) -> String {
    format!("refs/tags/{tag}")
}

pub fn parse_draft_branch(branch: &str) -> Option<(String, String)> {
    branch.strip_prefix("drafts/").and_then(split_package_workspace)
}

pub fn parse_proposed_branch(branch: &str) -> Option<(String, String)> {
    branch.strip_prefix("proposed/").and_then(split_package_workspace)
}

/// `<packageName>/<revision>`: packageName may itself contain `/`, so the
/// revision is always the final path segment.
pub fn parse_published_tag(tag: &str) -> Option<(String, String)> {
    tag.rsplit_once('/').map(|(pkg, rev)| (pkg.to_owned(), rev.to_owned()))
}

fn split_package_workspace(rest: &str) -> Option<(String, String)> {
    rest.rsplit_once('/').map(|(pkg, ws)| (pkg.to_owned(), ws.to_owned()))
}

/// Rejects workspace/package-name components that would not be valid git
/// branch-name segments.
pub fn is_valid_ref_component(component: &str) -> bool {
    !component.is_empty()
        && !component.starts_with('/')
        && !component.contains("..")
        && !component.ends_with('/')
        && component.chars().all(|c| !c.is_whitespace() && c != '~' && c != '^' && c != ':')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_and_proposed_branches_round_trip() {
        let branch = draft_branch("basens", "v1");
        assert_eq!(branch, "drafts/basens/v1");
        assert_eq!(parse_draft_branch(&branch), Some(("basens".to_owned(), "v1".to_owned())));

        let branch = proposed_branch("basens", "v1");
        assert_eq!(parse_proposed_branch(&branch), Some(("basens".to_owned(), "v1".to_owned())));
    }

    #[test]
    fn published_tag_round_trips_with_slashes_in_package_name() {
        let tag = published_tag("team/basens", "v2");
        assert_eq!(tag, "team/basens/v2");
        assert_eq!(parse_published_tag(&tag), Some(("team/basens".to_owned(), "v2".to_owned())));
    }

    #[test]
    fn rejects_unsafe_ref_components() {
        assert!(!is_valid_ref_component(".."));
        assert!(!is_valid_ref_component("/leading"));
        assert!(!is_valid_ref_component("has space"));
        assert!(is_valid_ref_component("v1"));
    }
}
