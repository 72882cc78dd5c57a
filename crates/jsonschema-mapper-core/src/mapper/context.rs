//! Session state threaded through one mapping call.

use serde_json::Value;

use crate::cache::SeenCache;
use crate::descriptor::FieldDescriptor;
use crate::error::MapError;
use crate::path::{PathTracker, SOURCE, TARGET};
use crate::registry::{self, ErrorKind, ErrorRecord, ErrorRegistry, RetractScope};
use crate::schema::{is_assignable, json_type_name, ModelSet};

/// Mutable session of one mapping call plus the read-only target models.
///
/// Every traversal step borrows the context explicitly; nothing is global.
pub(crate) struct MappingContext<'m> {
    pub(crate) paths: &'m mut PathTracker,
    pub(crate) cache: &'m mut SeenCache,
    pub(crate) errors: &'m mut ErrorRegistry,
    pub(crate) targets: &'m ModelSet,
    pub(crate) source_name: &'m str,
    pub(crate) max_iterations: usize,
    /// Target models currently being built, outermost first.
    pub(crate) building: Vec<String>,
}

impl MappingContext<'_> {
    /// Run `f` with `segment` pushed on `axis`. The segment is popped
    /// afterwards whether `f` succeeds or fails.
    pub(crate) fn with_segment<T>(
        &mut self,
        axis: &str,
        segment: &str,
        f: impl FnOnce(&mut Self) -> Result<T, MapError>,
    ) -> Result<T, MapError> {
        self.paths.push(axis, segment)?;
        let result = f(self);
        self.paths.pop(axis, segment)?;
        result
    }

    pub(crate) fn target_path(&self) -> Result<String, MapError> {
        Ok(self.paths.current_path(TARGET)?)
    }

    pub(crate) fn source_path(&self) -> Result<String, MapError> {
        Ok(self.paths.current_path(SOURCE)?)
    }

    /// Record `TYPE_MISMATCH` when `value` would not be accepted by the
    /// descriptor's declared type. The value is still used by the caller.
    pub(crate) fn check_type(&mut self, descriptor: &FieldDescriptor<'_>, value: &Value) -> bool {
        if is_assignable(value, descriptor.declared_type, self.targets) {
            return true;
        }
        let rendered = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let message = registry::type_mismatch_message(
            descriptor.field_name,
            &descriptor.declared_type.to_string(),
            &rendered,
            json_type_name(value),
        );
        self.errors.add(ErrorRecord::new(
            descriptor.declared_path.as_str(),
            ErrorKind::TypeMismatch,
            message,
        ));
        false
    }

    pub(crate) fn required_field(&mut self, descriptor: &FieldDescriptor<'_>) {
        let message = registry::required_field_message(
            descriptor.field_name,
            descriptor.owning_schema_name,
            self.source_name,
        );
        self.errors.add(ErrorRecord::new(
            descriptor.declared_path.as_str(),
            ErrorKind::RequiredFieldMissing,
            message,
        ));
    }

    pub(crate) fn field_creation_failure(&mut self, descriptor: &FieldDescriptor<'_>, err: &MapError) {
        tracing::warn!(target_path = %descriptor.declared_path, error = %err, "failed to create field");
        self.errors.add(ErrorRecord::new(
            descriptor.declared_path.as_str(),
            ErrorKind::FieldCreationFailure,
            err.to_string(),
        ));
    }

    pub(crate) fn partial_model(&mut self, path: &str, model: &str) {
        self.errors.add(ErrorRecord::new(
            path,
            ErrorKind::PartialModelBuilt,
            registry::partial_model_message(model),
        ));
    }

    /// Record `EMPTY_MODEL` at `path`, first retracting the
    /// `REQUIRED_FIELD_MISSING` records of the container's own fields.
    pub(crate) fn empty_model(&mut self, path: &str, model: &str) {
        self.errors
            .retract(ErrorKind::RequiredFieldMissing, RetractScope::Descendants, path);
        self.errors.add(ErrorRecord::new(
            path,
            ErrorKind::EmptyModel,
            registry::empty_model_message(model),
        ));
    }

    pub(crate) fn limit_reached(&mut self, path: &str, model: &str) {
        tracing::warn!(target_path = %path, limit = self.max_iterations, "reached max iterations building list");
        self.errors.add(ErrorRecord::new(
            path,
            ErrorKind::ListBuildLimitReached,
            registry::limit_reached_message(self.max_iterations, model),
        ));
    }
}
