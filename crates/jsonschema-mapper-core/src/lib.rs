//! Map data between independently defined JSON Schema models.
//!
//! A source document, typed by one schema, is mapped onto a model of
//! another schema by field name. Target fields are looked up directly, then
//! anywhere in the source's nested models and collections; nested target
//! models and lists of models are rebuilt from scattered source fields when
//! the source has no ready-made counterpart. Field-level failures are
//! recorded in an [`ErrorRegistry`] and the mapping continues; the caller
//! receives either a validated instance or the partial mapping.
//!
//! ```
//! use jsonschema_mapper_core::{map_json, MapOptions};
//! use serde_json::json;
//!
//! let source_schema = json!({
//!     "title": "CustomerDetails",
//!     "type": "object",
//!     "properties": {
//!         "address_name": { "type": "string" },
//!         "city": { "type": "string" },
//!         "state": { "type": "string" }
//!     },
//!     "required": ["address_name", "city", "state"]
//! });
//! let target_schema = json!({
//!     "title": "Address",
//!     "type": "object",
//!     "properties": {
//!         "city": { "type": "string" },
//!         "state": { "type": "string" }
//!     },
//!     "required": ["city", "state"]
//! });
//! let data = json!({ "address_name": "Home", "city": "Springfield", "state": "IL" });
//!
//! let report = map_json(&source_schema, &data, &target_schema, &MapOptions::default()).unwrap();
//! assert!(report.is_complete());
//! assert_eq!(report.output.into_value(), json!({ "city": "Springfield", "state": "IL" }));
//! ```

pub mod cache;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod mapper;
pub mod path;
pub mod registry;
pub mod schema;
pub mod schema_utils;

pub use cache::SeenCache;
pub use config::MapOptions;
pub use descriptor::FieldDescriptor;
pub use error::{ErrorCode, MapError};
pub use mapper::{MapOutput, Mapper};
pub use path::{PathError, PathTracker};
pub use registry::{ErrorKind, ErrorRecord, ErrorRegistry, RetractScope};
pub use schema::{
    FieldDef, FieldType, Instance, Model, ModelInstance, ModelSet, Record, StringFormat,
    ValidationError,
};
pub use schema_utils::{build_path, split_path};

use serde::Serialize;
use serde_json::Value;

/// Outcome of [`map_json`]: the mapped output plus every recorded error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapReport {
    pub output: MapOutput,
    pub errors: Vec<ErrorRecord>,
}

impl MapReport {
    /// Whether the output is a validated instance of the target model.
    pub fn is_complete(&self) -> bool {
        self.output.is_instance()
    }
}

/// Map `source_data` (an instance of the root model of `source_schema`)
/// onto the root model of `target_schema`.
pub fn map_json(
    source_schema: &Value,
    source_data: &Value,
    target_schema: &Value,
    options: &MapOptions,
) -> Result<MapReport, MapError> {
    map_json_models(source_schema, None, source_data, target_schema, None, options)
}

/// Like [`map_json`], with explicit source and target model names. `None`
/// selects the schema's root model.
pub fn map_json_models(
    source_schema: &Value,
    source_model: Option<&str>,
    source_data: &Value,
    target_schema: &Value,
    target_model: Option<&str>,
    options: &MapOptions,
) -> Result<MapReport, MapError> {
    let sources = ModelSet::from_schema(source_schema)?;
    let targets = ModelSet::from_schema(target_schema)?;

    let source = match source_model {
        Some(name) => Instance::new(&sources, name, source_data)?,
        None => Instance::root(&sources, source_data)?,
    };
    let target_name = match target_model {
        Some(name) => name.to_string(),
        None => targets
            .root()
            .map(|model| model.name.clone())
            .ok_or_else(|| MapError::invalid_arguments("<root>", "the target schema has no root model"))?,
    };

    let mut mapper = Mapper::new(options.clone());
    let output = mapper.map_models(source, &targets, &target_name, false)?;
    Ok(MapReport {
        output,
        errors: mapper.errors().iter().cloned().collect(),
    })
}
