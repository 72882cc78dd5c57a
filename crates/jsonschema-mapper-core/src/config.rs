//! Configuration for model mapping.

use serde::{Deserialize, Serialize};

/// Default bound on the number of elements built for one collection from
/// scattered source fields.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Options for a [`Mapper`](crate::Mapper).
///
/// ## Serialization Format
///
/// Fields are serialized in `kebab-case` (e.g., `match-by-alias`, `max-iterations`).
/// This naming convention is part of the public API contract for config files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct MapOptions {
    /// Accepted for compatibility with alias-aware schemas. Field resolution
    /// currently matches on declared names only.
    pub match_by_alias: bool,
    /// Maximum number of elements built from scattered fields for a single
    /// collection before `LIST_BUILD_LIMIT_REACHED` is recorded. Default: 100.
    pub max_iterations: usize,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            match_by_alias: true,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl MapOptions {
    /// Options with a custom scattered-collection bound.
    pub fn with_max_iterations(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ..Self::default()
        }
    }
}
