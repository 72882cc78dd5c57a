//! Rebuilding target models field by field.

use serde_json::{Map, Value};

use super::context::MappingContext;
use super::matcher;
use crate::descriptor::FieldDescriptor;
use crate::error::MapError;
use crate::path::TARGET;
use crate::schema::{Model, Record};

/// Values gathered for one target model.
#[derive(Debug, Default)]
pub(crate) struct Collected {
    pub(crate) values: Map<String, Value>,
    /// Fields that received a value from the source. Unresolved optional
    /// fields are stored as `null` but not counted.
    pub(crate) resolved: usize,
}

/// Resolve every field of `model` from `source`, in declaration order.
///
/// Missing required fields and per-field failures are recorded in the
/// registry; the walk always continues with the next field.
pub(crate) fn collect_fields<'s, R: Record<'s>>(
    ctx: &mut MappingContext<'_>,
    source: R,
    model: &Model,
) -> Result<Collected, MapError> {
    let mut collected = Collected::default();

    for field in &model.fields {
        ctx.with_segment(TARGET, &field.name, |ctx| {
            let descriptor = FieldDescriptor::resolve(field, &model.name, ctx.target_path()?);
            match map_field(ctx, source, &descriptor) {
                Ok(Some(value)) => {
                    collected.values.insert(field.name.clone(), value);
                    collected.resolved += 1;
                }
                Ok(None) if !field.required => {
                    collected.values.insert(field.name.clone(), Value::Null);
                }
                Ok(None) => ctx.required_field(&descriptor),
                Err(err) => ctx.field_creation_failure(&descriptor, &err),
            }
            Ok(())
        })?;
    }

    Ok(collected)
}

/// Build the target model `model_name` from data scattered across `source`.
///
/// Returns `None` (after recording `EMPTY_MODEL`) when no field could be
/// resolved, the instantiated value when the gathered data validates, and
/// the raw gathered mapping (after recording `PARTIAL_MODEL_BUILT`)
/// otherwise. Fails with [`MapError::RecursiveModel`] when `model_name` is
/// already being built further up; the enclosing field absorbs that as
/// `FIELD_CREATION_FAILURE`.
pub(crate) fn reconstruct<'s, R: Record<'s>>(
    ctx: &mut MappingContext<'_>,
    source: R,
    model_name: &str,
) -> Result<Option<Value>, MapError> {
    let targets = ctx.targets;
    let path = ctx.target_path()?;
    let model = targets.get(model_name).ok_or_else(|| MapError::UnresolvableRef {
        path: path.clone(),
        reference: model_name.to_string(),
    })?;

    // A model is never rebuilt inside itself.
    if ctx.building.iter().any(|name| name == model_name) {
        return Err(MapError::RecursiveModel {
            path,
            model: model_name.to_string(),
        });
    }

    tracing::debug!(target_path = %path, model = model_name, "building new model");
    ctx.building.push(model_name.to_string());
    let collected = collect_fields(ctx, source, model);
    ctx.building.pop();
    let collected = collected?;

    if collected.resolved == 0 {
        ctx.empty_model(&path, model_name);
        return Ok(None);
    }

    match targets.instantiate(model_name, &collected.values) {
        Ok(instance) => {
            tracing::debug!(target_path = %path, model = model_name, "new model created");
            Ok(Some(instance.into_value()))
        }
        Err(err) => {
            tracing::debug!(target_path = %path, model = model_name, error = %err, "new model partially built");
            ctx.partial_model(&path, model_name);
            Ok(Some(Value::Object(collected.values)))
        }
    }
}

/// Resolution order: matcher, nested reconstruction, direct instances,
/// scattered collection.
fn map_field<'s, R: Record<'s>>(
    ctx: &mut MappingContext<'_>,
    source: R,
    descriptor: &FieldDescriptor<'_>,
) -> Result<Option<Value>, MapError> {
    tracing::trace!(target_path = %descriptor.declared_path, "mapping field");

    if let Some(value) = matcher::resolve(ctx, source, descriptor.field_name, descriptor)? {
        return Ok(Some(value));
    }

    if let Some(model) = descriptor.structured_type {
        if let Some(value) = reconstruct(ctx, source, model)? {
            return Ok(Some(value));
        }
    }

    if let Some(element) = descriptor.collection_element_type {
        let instances = matcher::find_all_instances(source, element);
        if !instances.is_empty() {
            tracing::debug!(target_path = %descriptor.declared_path, found = instances.len(), "found direct instances");
            return Ok(Some(nest(instances, descriptor.collection_depth)));
        }

        let built = matcher::build_collection_from_scattered(ctx, source, descriptor, |ctx, source, model| {
            reconstruct(ctx, source, model)
        })?;
        if let Some(items) = built {
            return Ok(Some(nest(items, descriptor.collection_depth)));
        }
    }

    Ok(None)
}

/// Wrap a flat list of elements so it matches a collection nested `depth`
/// levels deep.
fn nest(items: Vec<Value>, depth: usize) -> Value {
    let mut value = Value::Array(items);
    for _ in 1..depth {
        value = Value::Array(vec![value]);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SeenCache;
    use crate::path::{PathTracker, SOURCE};
    use crate::registry::{ErrorKind, ErrorRegistry};
    use crate::schema::{FieldDef, FieldType, Instance, ModelSet};
    use serde_json::json;

    fn flat_models() -> ModelSet {
        ModelSet::new().with_root(
            Model::new("Flat")
                .field(FieldDef::required("name", FieldType::string()))
                .field(FieldDef::required("label", FieldType::string())),
        )
    }

    /// Collect the fields of `target_name` from `data` viewed as `Flat`.
    fn collect(targets: &ModelSet, target_name: &str, data: &Value) -> (Collected, ErrorRegistry) {
        let sources = flat_models();
        let source = Instance::root(&sources, data).unwrap();
        let mut paths = PathTracker::new();
        paths.create_axis(SOURCE, "Flat").unwrap();
        paths.create_axis(TARGET, target_name).unwrap();
        let mut cache = SeenCache::new();
        let mut errors = ErrorRegistry::new();

        let collected = {
            let mut ctx = MappingContext {
                paths: &mut paths,
                cache: &mut cache,
                errors: &mut errors,
                targets,
                source_name: "Flat",
                max_iterations: 10,
                building: vec![target_name.to_string()],
            };
            let model = targets.get(target_name).unwrap();
            collect_fields(&mut ctx, source, model).unwrap()
        };
        assert_eq!(paths.current_path(TARGET).unwrap(), "");
        (collected, errors)
    }

    #[test]
    fn test_field_failure_is_absorbed_and_siblings_continue() {
        // Left unresolved on purpose: `Missing` is never registered.
        let targets = ModelSet::new().with_root(
            Model::new("Card")
                .field(FieldDef::required("name", FieldType::string()))
                .field(FieldDef::required("extra", FieldType::model("Missing")))
                .field(FieldDef::required("label", FieldType::string())),
        );
        let data = json!({ "name": "Ada", "label": "VIP" });

        let (collected, errors) = collect(&targets, "Card", &data);

        assert_eq!(collected.resolved, 2);
        assert_eq!(
            Value::Object(collected.values),
            json!({ "name": "Ada", "label": "VIP" })
        );
        let failures = errors.get(ErrorKind::FieldCreationFailure);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].field_path, "extra");
        assert!(failures[0].message.contains("Missing"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_model_is_not_rebuilt_inside_itself() {
        let targets = ModelSet::new()
            .with_root(
                Model::new("Node")
                    .field(FieldDef::required("name", FieldType::string()))
                    .field(FieldDef::optional("child", FieldType::model("Node")))
                    .field(FieldDef::optional("wrapper", FieldType::model("Wrapper"))),
            )
            .with_model(Model::new("Wrapper").field(FieldDef::optional("node", FieldType::model("Node"))));
        let data = json!({ "name": "root", "label": "x" });

        let (collected, errors) = collect(&targets, "Node", &data);

        assert_eq!(collected.resolved, 1);
        let failures: Vec<&str> = errors
            .get(ErrorKind::FieldCreationFailure)
            .iter()
            .map(|record| record.field_path.as_str())
            .collect();
        assert_eq!(failures, vec!["child", "wrapper.node"]);
        assert_eq!(
            errors.get(ErrorKind::FieldCreationFailure)[0].message,
            "Cannot rebuild model 'Node' inside itself at child"
        );
    }

    #[test]
    fn test_nest_depths() {
        assert_eq!(nest(vec![json!(1), json!(2)], 1), json!([1, 2]));
        assert_eq!(nest(vec![json!(1)], 3), json!([[[1]]]));
    }
}
