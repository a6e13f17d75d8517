/// Picks the published-revision tags out of a repository's full tag list,
/// i.e. every tag that isn't a `drafts-*` tag.
pub fn published_revisions(tags: &[String]) -> Vec<String> {
    tags.iter()
        .filter(|t| !t.starts_with("drafts-"))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_out_draft_tags() {
        let tags = vec!["v1".to_owned(), "drafts-v2".to_owned(), "v2".to_owned()];
        assert_eq!(published_revisions(&tags), vec!["v1".to_owned(), "v2".to_owned()]);
    }
}
