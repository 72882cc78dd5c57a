//! The mapping orchestrator.
//!
//! A [`Mapper`] owns the session state of a mapping call: the path tracker,
//! the seen-value cache and the error registry. All three are reset at the
//! start of every [`Mapper::map_models`] call and stay readable afterwards.

mod context;
mod matcher;
mod reconstruct;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::cache::SeenCache;
use crate::config::MapOptions;
use crate::error::MapError;
use crate::path::{PathTracker, SOURCE, TARGET};
use crate::registry::ErrorRegistry;
use crate::schema::{ModelInstance, ModelSet, Record};

use context::MappingContext;

/// Result of a mapping call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MapOutput {
    /// Every field resolved and the target validated.
    Instance(ModelInstance),
    /// The raw gathered values; some fields are missing or invalid.
    Partial(Map<String, Value>),
    /// The partial values rendered as pretty JSON (`serialize = true`).
    Serialized(String),
}

impl MapOutput {
    pub fn is_instance(&self) -> bool {
        matches!(self, MapOutput::Instance(_))
    }

    pub fn is_partial(&self) -> bool {
        !self.is_instance()
    }

    pub fn as_instance(&self) -> Option<&ModelInstance> {
        match self {
            MapOutput::Instance(instance) => Some(instance),
            _ => None,
        }
    }

    /// The output as a JSON value. Serialized output becomes a JSON string.
    pub fn into_value(self) -> Value {
        match self {
            MapOutput::Instance(instance) => instance.into_value(),
            MapOutput::Partial(values) => Value::Object(values),
            MapOutput::Serialized(text) => Value::String(text),
        }
    }
}

/// Maps source records onto target models.
///
/// One mapper serves one call at a time; `map_models` takes `&mut self`.
#[derive(Debug, Default)]
pub struct Mapper {
    options: MapOptions,
    paths: PathTracker,
    cache: SeenCache,
    errors: ErrorRegistry,
}

impl Mapper {
    pub fn new(options: MapOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &MapOptions {
        &self.options
    }

    /// Errors recorded by the last call.
    pub fn errors(&self) -> &ErrorRegistry {
        &self.errors
    }

    /// Source paths claimed by the last call.
    pub fn cache(&self) -> &SeenCache {
        &self.cache
    }

    /// Map `source` onto the model `target_name` of `target`.
    ///
    /// Returns an [`MapOutput::Instance`] only when no error was recorded.
    /// Any recorded error yields the gathered values instead
    /// ([`MapOutput::Partial`], or [`MapOutput::Serialized`] when
    /// `serialize` is set) and the error report is logged at `warn`.
    ///
    /// # Errors
    ///
    /// - [`MapError::InvalidArguments`] if `target_name` is not a model of
    ///   `target`.
    /// - [`MapError::UnresolvableRef`] if `target` references unknown models.
    /// - [`MapError::NoMappableData`] if no target field could be resolved.
    pub fn map_models<'s, R: Record<'s>>(
        &mut self,
        source: R,
        target: &ModelSet,
        target_name: &str,
        serialize: bool,
    ) -> Result<MapOutput, MapError> {
        let model = target
            .get(target_name)
            .ok_or_else(|| MapError::invalid_arguments(target_name, "no such model in the target schema"))?;
        target.resolve()?;

        let source_name = source.type_name();
        self.start(source_name, target_name)?;
        tracing::debug!(source_model = source_name, target_model = target_name, "starting mapping");

        let collected = {
            let mut ctx = MappingContext {
                paths: &mut self.paths,
                cache: &mut self.cache,
                errors: &mut self.errors,
                targets: target,
                source_name,
                max_iterations: self.options.max_iterations,
                building: vec![target_name.to_string()],
            };
            reconstruct::collect_fields(&mut ctx, source, model)?
        };

        if collected.resolved == 0 {
            return Err(MapError::NoMappableData {
                source_name: source_name.to_string(),
                target_name: target_name.to_string(),
            });
        }

        if self.errors.has_errors() {
            tracing::warn!("{}", self.errors.report(target_name));
            return partial(collected.values, serialize);
        }

        match target.instantiate(target_name, &collected.values) {
            Ok(instance) => {
                tracing::debug!(target_model = target_name, "data successfully mapped");
                Ok(MapOutput::Instance(instance))
            }
            Err(err) => {
                tracing::warn!(
                    target_model = target_name,
                    error = %err,
                    "cannot create the target model, returning the mapped data"
                );
                partial(collected.values, serialize)
            }
        }
    }

    fn start(&mut self, source_name: &str, target_name: &str) -> Result<(), MapError> {
        self.cache.clear();
        self.errors.clear();
        self.paths.clear();
        self.paths.create_axis(SOURCE, source_name)?;
        self.paths.create_axis(TARGET, target_name)?;
        Ok(())
    }
}

fn partial(values: Map<String, Value>, serialize: bool) -> Result<MapOutput, MapError> {
    if serialize {
        Ok(MapOutput::Serialized(serde_json::to_string_pretty(&values)?))
    } else {
        Ok(MapOutput::Partial(values))
    }
}
