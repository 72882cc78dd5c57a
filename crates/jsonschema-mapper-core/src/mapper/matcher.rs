//! Locating source values for target fields.
//!
//! Lookups are depth-first and first-match-wins: a direct field of the
//! record is preferred, then nested models and collections of models are
//! searched in declaration order. A matched source path is claimed in the
//! seen-value cache so no later target field can take it again.

use serde_json::Value;

use super::context::MappingContext;
use crate::descriptor::{unwrap_nullable, FieldDescriptor};
use crate::error::MapError;
use crate::path::{index_segment, SOURCE, TARGET};
use crate::registry::{ErrorKind, RetractScope};
use crate::schema::{FieldType, Record};

/// Find a value for the target field `field_name` anywhere in `source`.
///
/// Absence is not an error at this layer; the caller decides whether a
/// missing field matters.
pub(crate) fn resolve<'s, R: Record<'s>>(
    ctx: &mut MappingContext<'_>,
    source: R,
    field_name: &str,
    descriptor: &FieldDescriptor<'_>,
) -> Result<Option<Value>, MapError> {
    if let Some(value) = source.get(field_name).filter(|v| !v.is_null()) {
        let claimed = ctx.with_segment(SOURCE, field_name, |ctx| {
            let source_path = ctx.source_path()?;
            if ctx.cache.contains(&source_path) {
                tracing::trace!(source_path = %source_path, "source field already claimed");
                return Ok(false);
            }
            ctx.check_type(descriptor, value);
            tracing::debug!(
                source_path = %ctx.paths.qualified_path(SOURCE)?,
                target_path = %ctx.paths.qualified_path(TARGET)?,
                "matched field"
            );
            ctx.cache.insert(source_path);
            Ok(true)
        })?;
        if claimed {
            return Ok(Some(value.clone()));
        }
    }

    for field in source.fields() {
        let Some(value) = source.get(&field.name) else {
            continue;
        };
        let shape = FieldDescriptor::resolve(field, source.type_name(), field.name.as_str());
        if shape.is_scalar() {
            continue;
        }
        let found = ctx.with_segment(SOURCE, &field.name, |ctx| {
            search_value(ctx, source, value, &field.ty, field_name, descriptor)
        })?;
        if found.is_some() {
            return Ok(found);
        }
    }

    Ok(None)
}

/// Recurse into a nested source value according to its declared type.
fn search_value<'s, R: Record<'s>>(
    ctx: &mut MappingContext<'_>,
    record: R,
    value: &'s Value,
    ty: &FieldType,
    field_name: &str,
    descriptor: &FieldDescriptor<'_>,
) -> Result<Option<Value>, MapError> {
    match unwrap_nullable(ty) {
        FieldType::Model(model) => match record.child(model, value) {
            Some(child) => resolve(ctx, child, field_name, descriptor),
            None => Ok(None),
        },
        FieldType::List(inner) | FieldType::Set(inner) => {
            let Some(items) = value.as_array() else {
                return Ok(None);
            };
            for (index, item) in items.iter().enumerate() {
                let found = ctx.with_segment(SOURCE, &index_segment(index), |ctx| {
                    search_value(ctx, record, item, inner, field_name, descriptor)
                })?;
                if found.is_some() {
                    return Ok(found);
                }
            }
            Ok(None)
        }
        FieldType::Tuple(types) => {
            let Some(items) = value.as_array() else {
                return Ok(None);
            };
            for (index, (item, item_ty)) in items.iter().zip(types).enumerate() {
                let found = ctx.with_segment(SOURCE, &index_segment(index), |ctx| {
                    search_value(ctx, record, item, item_ty, field_name, descriptor)
                })?;
                if found.is_some() {
                    return Ok(found);
                }
            }
            Ok(None)
        }
        _ => Ok(None),
    }
}

/// Every value in `source` whose runtime type is `model`, in encounter
/// order. The source itself counts; matches are not descended into.
pub(crate) fn find_all_instances<'s, R: Record<'s>>(source: R, model: &str) -> Vec<Value> {
    let mut found = Vec::new();
    collect_instances(source, model, &mut found);
    tracing::trace!(model, found = found.len(), "searched for direct instances");
    found
}

fn collect_instances<'s, R: Record<'s>>(record: R, model: &str, out: &mut Vec<Value>) {
    if record.type_name() == model {
        out.push(record.to_value());
        return;
    }
    for field in record.fields() {
        if let Some(value) = record.get(&field.name) {
            collect_in_value(record, value, &field.ty, model, out);
        }
    }
}

fn collect_in_value<'s, R: Record<'s>>(
    record: R,
    value: &'s Value,
    ty: &FieldType,
    model: &str,
    out: &mut Vec<Value>,
) {
    match unwrap_nullable(ty) {
        FieldType::Model(name) => {
            if let Some(child) = record.child(name, value) {
                collect_instances(child, model, out);
            }
        }
        FieldType::List(inner) | FieldType::Set(inner) => {
            for item in value.as_array().into_iter().flatten() {
                collect_in_value(record, item, inner, model, out);
            }
        }
        FieldType::Tuple(types) => {
            for (item, item_ty) in value.as_array().into_iter().flatten().zip(types) {
                collect_in_value(record, item, item_ty, model, out);
            }
        }
        _ => {}
    }
}

/// Build a collection of models one element at a time from fields scattered
/// across `source`.
///
/// Each index `0..max_iterations` is pushed on the target axis and `build`
/// is asked for one element; the first index that yields nothing ends the
/// loop. Because every attempt claims the source values it uses, successive
/// attempts pick up successive occurrences of the same field names.
pub(crate) fn build_collection_from_scattered<'s, R, F>(
    ctx: &mut MappingContext<'_>,
    source: R,
    descriptor: &FieldDescriptor<'_>,
    mut build: F,
) -> Result<Option<Vec<Value>>, MapError>
where
    R: Record<'s>,
    F: FnMut(&mut MappingContext<'_>, R, &str) -> Result<Option<Value>, MapError>,
{
    let Some(element) = descriptor.collection_element_type else {
        return Ok(None);
    };

    tracing::debug!(target_path = %descriptor.declared_path, element, "building list from scattered fields");

    let mut items = Vec::new();
    let mut terminated = false;

    for index in 0..ctx.max_iterations {
        let built = ctx.with_segment(TARGET, &index_segment(index), |ctx| {
            let built = build(ctx, source, element)?;
            if built.is_none() && !items.is_empty() {
                // The trailing empty attempt only marks the end of the data.
                let path = ctx.target_path()?;
                ctx.errors
                    .retract(ErrorKind::EmptyModel, RetractScope::Descendants, &path);
            }
            Ok(built)
        })?;

        match built {
            Some(item) => items.push(item),
            None => {
                terminated = true;
                break;
            }
        }
    }

    if !terminated {
        let path = ctx.target_path()?;
        ctx.limit_reached(&path, element);
    }

    if items.is_empty() {
        Ok(None)
    } else {
        tracing::debug!(target_path = %descriptor.declared_path, len = items.len(), "built list from scattered fields");
        Ok(Some(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SeenCache;
    use crate::path::PathTracker;
    use crate::registry::ErrorRegistry;
    use crate::schema::{FieldDef, Instance, Model, ModelSet};
    use serde_json::json;

    fn source_models() -> ModelSet {
        ModelSet::new()
            .with_root(
                Model::new("Order")
                    .field(FieldDef::required("order_id", FieldType::Integer))
                    .field(FieldDef::required("customer", FieldType::model("Customer")))
                    .field(FieldDef::required("lines", FieldType::list(FieldType::model("Line")))),
            )
            .with_model(
                Model::new("Customer")
                    .field(FieldDef::required("name", FieldType::string()))
                    .field(FieldDef::required("city", FieldType::string())),
            )
            .with_model(
                Model::new("Line")
                    .field(FieldDef::required("sku", FieldType::string()))
                    .field(FieldDef::required("qty", FieldType::Integer)),
            )
    }

    fn order_data() -> serde_json::Value {
        json!({
            "order_id": 7,
            "customer": { "name": "Ada", "city": "London" },
            "lines": [
                { "sku": "A-1", "qty": 2 },
                { "sku": "B-2", "qty": 1 }
            ]
        })
    }

    struct Session {
        paths: PathTracker,
        cache: SeenCache,
        errors: ErrorRegistry,
    }

    impl Session {
        fn new() -> Self {
            let mut paths = PathTracker::new();
            paths.create_axis(SOURCE, "Order").unwrap();
            paths.create_axis(TARGET, "Target").unwrap();
            Self {
                paths,
                cache: SeenCache::new(),
                errors: ErrorRegistry::new(),
            }
        }

        fn ctx<'m>(&'m mut self, targets: &'m ModelSet) -> MappingContext<'m> {
            MappingContext {
                paths: &mut self.paths,
                cache: &mut self.cache,
                errors: &mut self.errors,
                targets,
                source_name: "Order",
                max_iterations: 10,
                building: Vec::new(),
            }
        }
    }

    fn string_field(name: &str) -> FieldDef {
        FieldDef::required(name, FieldType::string())
    }

    #[test]
    fn test_direct_then_nested_then_collection() {
        let models = source_models();
        let data = order_data();
        let source = Instance::root(&models, &data).unwrap();
        let mut session = Session::new();
        let mut ctx = session.ctx(&models);

        let city = string_field("city");
        let d = FieldDescriptor::resolve(&city, "Target", "city");
        assert_eq!(resolve(&mut ctx, source, "city", &d).unwrap(), Some(json!("London")));

        let sku = string_field("sku");
        let d = FieldDescriptor::resolve(&sku, "Target", "sku");
        assert_eq!(resolve(&mut ctx, source, "sku", &d).unwrap(), Some(json!("A-1")));
        // The first line's sku is claimed; the next lookup moves on.
        assert_eq!(resolve(&mut ctx, source, "sku", &d).unwrap(), Some(json!("B-2")));
        assert_eq!(resolve(&mut ctx, source, "sku", &d).unwrap(), None);

        let claimed: Vec<&str> = session.cache.iter().collect();
        assert_eq!(claimed, vec!["customer.city", "lines[0].sku", "lines[1].sku"]);
    }

    #[test]
    fn test_type_mismatch_still_returns_value() {
        let models = source_models();
        let data = order_data();
        let source = Instance::root(&models, &data).unwrap();
        let mut session = Session::new();
        let mut ctx = session.ctx(&models);

        let field = FieldDef::required("name", FieldType::Integer);
        let d = FieldDescriptor::resolve(&field, "Target", "name");
        assert_eq!(resolve(&mut ctx, source, "name", &d).unwrap(), Some(json!("Ada")));

        let mismatches = session.errors.get(ErrorKind::TypeMismatch);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(
            mismatches[0].message,
            "The field 'name' of type 'integer' cannot match the value 'Ada' of type 'string'"
        );
    }

    #[test]
    fn test_paths_balanced_after_search() {
        let models = source_models();
        let data = order_data();
        let source = Instance::root(&models, &data).unwrap();
        let mut session = Session::new();
        let mut ctx = session.ctx(&models);

        let field = string_field("missing");
        let d = FieldDescriptor::resolve(&field, "Target", "missing");
        assert_eq!(resolve(&mut ctx, source, "missing", &d).unwrap(), None);
        assert_eq!(session.paths.current_path(SOURCE).unwrap(), "");
    }

    #[test]
    fn test_find_all_instances() {
        let models = source_models();
        let data = order_data();
        let source = Instance::root(&models, &data).unwrap();

        let lines = find_all_instances(source, "Line");
        assert_eq!(lines, vec![json!({ "sku": "A-1", "qty": 2 }), json!({ "sku": "B-2", "qty": 1 })]);

        assert_eq!(find_all_instances(source, "Order").len(), 1);
        assert!(find_all_instances(source, "Invoice").is_empty());
    }

    #[test]
    fn test_scattered_loop_stops_and_retracts_trailing_empty() {
        let models = source_models();
        let data = order_data();
        let source = Instance::root(&models, &data).unwrap();
        let mut session = Session::new();
        session.paths.push(TARGET, "items").unwrap();
        let mut ctx = session.ctx(&models);

        let field = FieldDef::required("items", FieldType::list(FieldType::model("Line")));
        let d = FieldDescriptor::resolve(&field, "Target", "items");

        let mut remaining = 2;
        let built = build_collection_from_scattered(&mut ctx, source, &d, |ctx, _source, model| {
            if remaining == 0 {
                let path = ctx.target_path()?;
                ctx.empty_model(&path, model);
                return Ok(None);
            }
            remaining -= 1;
            Ok(Some(json!({ "n": remaining })))
        })
        .unwrap();

        assert_eq!(built, Some(vec![json!({ "n": 1 }), json!({ "n": 0 })]));
        assert!(!session.errors.has_errors());
        assert_eq!(session.paths.current_path(TARGET).unwrap(), "items");
    }

    #[test]
    fn test_scattered_loop_limit() {
        let models = source_models();
        let data = order_data();
        let source = Instance::root(&models, &data).unwrap();
        let mut session = Session::new();
        session.paths.push(TARGET, "items").unwrap();
        let mut ctx = session.ctx(&models);
        ctx.max_iterations = 3;

        let field = FieldDef::required("items", FieldType::list(FieldType::model("Line")));
        let d = FieldDescriptor::resolve(&field, "Target", "items");

        let built = build_collection_from_scattered(&mut ctx, source, &d, |_ctx, _source, _model| {
            Ok(Some(json!({})))
        })
        .unwrap();

        assert_eq!(built.map(|items| items.len()), Some(3));
        let limit = session.errors.get(ErrorKind::ListBuildLimitReached);
        assert_eq!(limit.len(), 1);
        assert_eq!(limit[0].field_path, "items");
    }
}
