//! Seen-value cache: source paths already claimed by a target field.

use std::collections::HashSet;

/// Set of source paths matched during one mapping call.
///
/// A source value enters the cache the moment it is matched, so no later
/// target field in the same call can claim it again.
#[derive(Debug, Clone, Default)]
pub struct SeenCache {
    paths: HashSet<String>,
}

impl SeenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    /// Claim `path`. Returns `false` if it was already claimed.
    pub fn insert(&mut self, path: impl Into<String>) -> bool {
        self.paths.insert(path.into())
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Claimed paths, sorted.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let mut paths: Vec<&str> = self.paths.iter().map(String::as_str).collect();
        paths.sort_unstable();
        paths.into_iter()
    }
}
