//! A local clone cache keyed by repository URL, shared across workers. All
//! reads go through this cache; a write lock is required for fetch/push, a
//! read lock for tree reads.

use std::sync::Arc;

use camino::Utf8PathBuf;
use dashmap::DashMap;
use tokio::sync::RwLock;

/// A cached clone's on-disk location plus the lock guarding it. `git2`
/// objects aren't held across await points: every operation reopens the
/// repository at `path` inside a `spawn_blocking` closure.
pub struct RepoHandle {
    pub path: Utf8PathBuf,
    pub lock: RwLock<()>,
}

pub struct RepoCache {
    repos: DashMap<String, Arc<RepoHandle>>,
    cache_dir: Utf8PathBuf,
}

impl RepoCache {
    pub fn new(cache_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            repos: DashMap::new(),
            cache_dir: cache_dir.into(),
        }
    }

    pub fn handle_for(&self, url: &str) -> Arc<RepoHandle> {
        let key = canonicalize_url(url);
        self.repos
            .entry(key.clone())
            .or_insert_with(|| {
                Arc::new(RepoHandle {
                    path: self.cache_dir.join(slug_for(&key)),
                    lock: RwLock::new(()),
                })
            })
            .clone()
    }
}

fn canonicalize_url(url: &str) -> String {
    url.trim_end_matches('/').trim_end_matches(".git").to_lowercase()
}

fn slug_for(canonical_url: &str) -> String {
    canonical_url
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_url_variants_share_a_handle() {
        let cache = RepoCache::new("/tmp/kpt-repos");
        let a = cache.handle_for("https://example.com/org/repo.git");
        let b = cache.handle_for("https://example.com/org/repo/");
        assert_eq!(a.path, b.path);
    }

    #[test]
    fn different_urls_get_different_paths() {
        let cache = RepoCache::new("/tmp/kpt-repos");
        let a = cache.handle_for("https://example.com/org/repo-a.git");
        let b = cache.handle_for("https://example.com/org/repo-b.git");
        assert_ne!(a.path, b.path);
    }
}
