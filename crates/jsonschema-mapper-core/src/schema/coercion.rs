//! Lenient coercion of JSON values to declared field types.
//!
//! Coercion both answers "would this value be accepted as that type" and
//! produces the normalised value stored in an instantiated model: integral
//! floats and numeric strings become integers, `"yes"` becomes `true`, set
//! elements are de-duplicated, nested models are instantiated recursively.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

use super::model::{FieldType, Model, ModelSet, StringFormat};
use super::ValidationError;
use crate::schema_utils::build_path;

const TRUE_STRINGS: &[&str] = &["true", "yes", "on", "t", "y", "1"];
const FALSE_STRINGS: &[&str] = &["false", "no", "off", "f", "n", "0"];

/// Coerce `value` to `ty`, resolving model references in `models`.
pub fn coerce(value: &Value, ty: &FieldType, models: &ModelSet) -> Result<Value, ValidationError> {
    coerce_at(value, ty, models, "")
}

/// Whether `value` would be accepted as `ty` under lenient coercion.
pub fn is_assignable(value: &Value, ty: &FieldType, models: &ModelSet) -> bool {
    coerce(value, ty, models).is_ok()
}

/// Returns the JSON type name for a value.
pub fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn coerce_at(
    value: &Value,
    ty: &FieldType,
    models: &ModelSet,
    path: &str,
) -> Result<Value, ValidationError> {
    match ty {
        FieldType::Any => Ok(value.clone()),
        FieldType::Null => match value {
            Value::Null => Ok(Value::Null),
            other => Err(mismatch(path, ty, other)),
        },
        FieldType::Optional(inner) => match value {
            Value::Null => Ok(Value::Null),
            other => coerce_at(other, inner, models, path),
        },
        FieldType::String(format) => coerce_string(value, *format, path),
        FieldType::Integer => coerce_integer(value).ok_or_else(|| mismatch(path, ty, value)),
        FieldType::Number => coerce_number(value).ok_or_else(|| mismatch(path, ty, value)),
        FieldType::Boolean => coerce_boolean(value).ok_or_else(|| mismatch(path, ty, value)),
        FieldType::Union(arms) => arms
            .iter()
            .find_map(|arm| coerce_at(value, arm, models, path).ok())
            .ok_or_else(|| mismatch(path, ty, value)),
        FieldType::List(inner) => {
            let items = value.as_array().ok_or_else(|| mismatch(path, ty, value))?;
            coerce_items(items, inner, models, path).map(Value::Array)
        }
        FieldType::Set(inner) => {
            let items = value.as_array().ok_or_else(|| mismatch(path, ty, value))?;
            let coerced = coerce_items(items, inner, models, path)?;
            let mut unique: Vec<Value> = Vec::with_capacity(coerced.len());
            for item in coerced {
                if !unique.contains(&item) {
                    unique.push(item);
                }
            }
            Ok(Value::Array(unique))
        }
        FieldType::Tuple(types) => {
            let items = value.as_array().ok_or_else(|| mismatch(path, ty, value))?;
            if items.len() != types.len() {
                return Err(ValidationError::new(
                    path,
                    format!("expected {} items, got {}", types.len(), items.len()),
                ));
            }
            items
                .iter()
                .zip(types)
                .enumerate()
                .map(|(i, (item, item_ty))| {
                    coerce_at(item, item_ty, models, &build_path(path, &[i.to_string().as_str()]))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        FieldType::Map(inner) => {
            let obj = value.as_object().ok_or_else(|| mismatch(path, ty, value))?;
            let mut out = Map::with_capacity(obj.len());
            for (key, item) in obj {
                let item_path = build_path(path, &[key.as_str()]);
                out.insert(key.clone(), coerce_at(item, inner, models, &item_path)?);
            }
            Ok(Value::Object(out))
        }
        FieldType::Model(name) => {
            let model = models
                .get(name)
                .ok_or_else(|| ValidationError::new(path, format!("unknown model '{}'", name)))?;
            let obj = value.as_object().ok_or_else(|| mismatch(path, ty, value))?;
            coerce_model(model, obj, models, path).map(Value::Object)
        }
    }
}

fn coerce_items(
    items: &[Value],
    inner: &FieldType,
    models: &ModelSet,
    path: &str,
) -> Result<Vec<Value>, ValidationError> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| coerce_at(item, inner, models, &build_path(path, &[i.to_string().as_str()])))
        .collect()
}

/// Validate and normalise an object against `model`.
///
/// Every required field must be present. Absent optional fields take their
/// default when one is declared; a `null` on an optional field whose type
/// does not accept null counts as absent. Unknown keys are dropped.
pub(crate) fn coerce_model(
    model: &Model,
    data: &Map<String, Value>,
    models: &ModelSet,
    path: &str,
) -> Result<Map<String, Value>, ValidationError> {
    let mut out = Map::with_capacity(model.fields.len());

    for field in &model.fields {
        let field_path = build_path(path, &[field.name.as_str()]);
        let present = match data.get(&field.name) {
            Some(Value::Null) if !field.required && !field.ty.accepts_null() => None,
            other => other,
        };

        match present {
            Some(value) => {
                out.insert(field.name.clone(), coerce_at(value, &field.ty, models, &field_path)?);
            }
            None if field.required => {
                return Err(ValidationError::new(
                    field_path,
                    format!("required field '{}' is missing", field.name),
                ));
            }
            None => {
                if let Some(default) = &field.default {
                    out.insert(field.name.clone(), default.clone());
                }
            }
        }
    }

    Ok(out)
}

fn coerce_string(value: &Value, format: StringFormat, path: &str) -> Result<Value, ValidationError> {
    let s = value
        .as_str()
        .ok_or_else(|| mismatch(path, &FieldType::String(format), value))?;

    let valid = match format {
        StringFormat::Plain => true,
        StringFormat::Date => NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok(),
        StringFormat::DateTime => {
            DateTime::parse_from_rfc3339(s).is_ok()
                || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        }
    };

    if valid {
        Ok(value.clone())
    } else {
        Err(ValidationError::new(
            path,
            format!("'{}' is not a valid {}", s, FieldType::String(format)),
        ))
    }
}

fn coerce_integer(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
        Value::Number(n) => {
            let f = n.as_f64()?;
            if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                Some(Value::from(f as i64))
            } else {
                None
            }
        }
        Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
        _ => None,
    }
}

fn coerce_number(value: &Value) -> Option<Value> {
    let f = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    serde_json::Number::from_f64(f).map(Value::Number)
}

fn coerce_boolean(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(_) => Some(value.clone()),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(Value::Bool(false)),
            Some(1) => Some(Value::Bool(true)),
            _ => None,
        },
        Value::String(s) => {
            let lowered = s.trim().to_ascii_lowercase();
            if TRUE_STRINGS.contains(&lowered.as_str()) {
                Some(Value::Bool(true))
            } else if FALSE_STRINGS.contains(&lowered.as_str()) {
                Some(Value::Bool(false))
            } else {
                None
            }
        }
        _ => None,
    }
}

fn mismatch(path: &str, expected: &FieldType, value: &Value) -> ValidationError {
    ValidationError::new(
        path,
        format!("expected {}, got {}", expected, json_type_name(value)),
    )
}
