//! The schema collaborator: typed models loaded from JSON Schema, lenient
//! coercion, and the record view the mapper searches.

use serde::Serialize;
use thiserror::Error;

pub mod coercion;
pub mod model;
mod parse;
pub mod record;

pub use coercion::{coerce, is_assignable, json_type_name};
pub use model::{FieldDef, FieldType, Model, ModelSet, StringFormat};
pub use record::{Instance, ModelInstance, Record};

/// A value rejected by a declared type.
///
/// `path` is a JSON Pointer into the data being validated (`""` for the
/// value itself).
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message} (at '{}')", display_path(.path))]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}
