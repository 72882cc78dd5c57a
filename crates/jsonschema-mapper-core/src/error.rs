//! Error types for schema loading and model mapping.
//!
//! Only two situations abort a mapping call: arguments that are not
//! structured models ([`MapError::InvalidArguments`]) and a source that
//! yields nothing for the target ([`MapError::NoMappableData`]). Everything
//! else that can go wrong while resolving individual fields is recorded in
//! the [`ErrorRegistry`](crate::registry::ErrorRegistry) instead.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::path::PathError;
use crate::schema::ValidationError;

/// Stable, machine-readable error codes.
///
/// Variant names and their serialized `snake_case` strings are part of the
/// public contract and must not change across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorCode {
    /// JSON (de)serialization error.
    JsonParseError,
    /// Schema structure error (invalid or unsupported schema construct).
    SchemaError,
    /// A model reference could not be resolved within the model set.
    UnresolvableRef,
    /// The source or target passed to the mapper is not a structured model.
    InvalidArguments,
    /// Nothing in the source could be mapped onto the target.
    NoMappableData,
    /// A target model would have to be rebuilt inside itself.
    RecursiveModel,
    /// A path tracker invariant was violated.
    PathError,
    /// A value could not be validated against a model.
    ValidationError,
}

#[derive(Debug, Error)]
pub enum MapError {
    #[error("JSON (de)serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Schema error at {path}: {message}")]
    SchemaError { path: String, message: String },

    #[error("Unresolvable model reference at {path}: {reference}")]
    UnresolvableRef { path: String, reference: String },

    #[error("Invalid mapping argument '{name}': {reason}")]
    InvalidArguments { name: String, reason: String },

    #[error("No mappable data found between '{source_name}' and '{target_name}'")]
    NoMappableData {
        source_name: String,
        target_name: String,
    },

    #[error("Cannot rebuild model '{model}' inside itself at {path}")]
    RecursiveModel { path: String, model: String },

    #[error("Path tracking error: {0}")]
    Path(#[from] PathError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl MapError {
    /// Returns the stable error code for this error variant.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            MapError::JsonError(_) => ErrorCode::JsonParseError,
            MapError::SchemaError { .. } => ErrorCode::SchemaError,
            MapError::UnresolvableRef { .. } => ErrorCode::UnresolvableRef,
            MapError::InvalidArguments { .. } => ErrorCode::InvalidArguments,
            MapError::NoMappableData { .. } => ErrorCode::NoMappableData,
            MapError::RecursiveModel { .. } => ErrorCode::RecursiveModel,
            MapError::Path(_) => ErrorCode::PathError,
            MapError::Validation(_) => ErrorCode::ValidationError,
        }
    }

    /// Returns the schema or data path context, if available.
    pub fn path(&self) -> Option<&str> {
        match self {
            MapError::SchemaError { path, .. } => Some(path),
            MapError::UnresolvableRef { path, .. } => Some(path),
            MapError::RecursiveModel { path, .. } => Some(path),
            MapError::Validation(err) => Some(&err.path),
            MapError::JsonError(_)
            | MapError::InvalidArguments { .. }
            | MapError::NoMappableData { .. }
            | MapError::Path(_) => None,
        }
    }

    /// Produces a structured JSON error for machine consumers.
    ///
    /// Format: `{"code": "...", "message": "...", "path": "..." | null}`
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.error_code(),
            "message": self.to_string(),
            "path": self.path(),
        })
    }

    pub(crate) fn invalid_arguments(name: impl Into<String>, reason: impl Into<String>) -> Self {
        MapError::InvalidArguments {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
