//! Loading a [`ModelSet`] from a JSON Schema document.
//!
//! Every object schema with `properties` becomes a [`Model`]: the root is
//! named by its `title`, `$defs` / `definitions` entries by their key, and
//! inline object schemas by their `title` (falling back to the property
//! name). Non-object definitions (enums, aliases) are inlined where they
//! are referenced.

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::model::{FieldDef, FieldType, Model, ModelSet, StringFormat};
use crate::error::MapError;
use crate::schema_utils::{build_path, split_path};

/// Name given to a root schema without a `title`.
const DEFAULT_ROOT_NAME: &str = "Root";

/// Keywords whose entries are named definitions.
const DEF_KEYWORDS: &[&str] = &["$defs", "definitions"];

impl ModelSet {
    /// Load every model described by a JSON Schema document.
    ///
    /// The returned set is already resolved: all `$ref`s point at registered
    /// models.
    pub fn from_schema(schema: &Value) -> Result<Self, MapError> {
        let root = schema
            .as_object()
            .ok_or_else(|| schema_error("#", "root schema must be an object"))?;

        if !is_model_schema(root) {
            return Err(schema_error("#", "root schema must describe an object with properties"));
        }

        let root_name = root
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_ROOT_NAME)
            .to_string();

        let mut loader = Loader {
            document: root,
            root_name: root_name.clone(),
            models: ModelSet::new(),
            expanding: Vec::new(),
            inlined: HashMap::new(),
            loading: Vec::new(),
        };

        for keyword in DEF_KEYWORDS {
            let Some(defs) = root.get(*keyword) else {
                continue;
            };
            let defs = defs.as_object().ok_or_else(|| {
                schema_error(&build_path("#", &[*keyword]), "definitions must be an object")
            })?;
            for (name, def) in defs {
                if def.as_object().is_some_and(is_model_schema) {
                    loader.load_model(name, def, &build_path("#", &[*keyword, name.as_str()]))?;
                }
            }
        }

        loader.load_model(&root_name, schema, "#")?;
        loader.models.set_root(root_name);
        loader.models.resolve()?;

        tracing::debug!(models = loader.models.len(), "loaded models from schema");
        Ok(loader.models)
    }
}

struct Loader<'a> {
    document: &'a Map<String, Value>,
    root_name: String,
    models: ModelSet,
    /// Non-object definitions currently being inlined (cycle guard).
    expanding: Vec<String>,
    /// Non-object definitions already inlined, by name.
    inlined: HashMap<String, FieldType>,
    /// Models whose fields are being parsed, outermost first.
    loading: Vec<String>,
}

impl Loader<'_> {
    fn load_model(&mut self, name: &str, node: &Value, path: &str) -> Result<(), MapError> {
        if self.models.contains(name) {
            return Err(schema_error(path, &format!("duplicate model name '{}'", name)));
        }

        let obj = node
            .as_object()
            .ok_or_else(|| schema_error(path, "model schema must be an object"))?;

        let required = required_names(obj, path)?;
        let mut model = Model::new(name);
        model.description = obj
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);

        // Register the name before the fields so inline models cannot claim it.
        self.models.insert(Model::new(name));
        self.loading.push(name.to_string());
        let fields = self.load_fields(obj, &required, path);
        self.loading.pop();
        model.fields = fields?;

        tracing::trace!(model = name, fields = model.fields.len(), %path, "loaded model");
        self.models.insert(model);
        Ok(())
    }

    fn load_fields(
        &mut self,
        obj: &Map<String, Value>,
        required: &[&str],
        path: &str,
    ) -> Result<Vec<FieldDef>, MapError> {
        let mut fields = Vec::new();

        if let Some(props) = obj.get("properties") {
            let props = props.as_object().ok_or_else(|| {
                schema_error(&build_path(path, &["properties"]), "properties must be an object")
            })?;
            for (key, prop) in props {
                let prop_path = build_path(path, &["properties", key.as_str()]);
                let ty = self.parse_type(prop, &prop_path, key)?;
                let mut field = if required.contains(&key.as_str()) {
                    FieldDef::required(key.as_str(), ty)
                } else {
                    FieldDef::optional(key.as_str(), ty)
                };
                if let Some(default) = prop.get("default") {
                    field = field.with_default(default.clone());
                }
                fields.push(field);
            }
        }
        Ok(fields)
    }

    /// Name for an untitled inline object. The field name is used as is
    /// unless another model already holds it (or a definition will), in which
    /// case it is qualified by the enclosing model: `Shipping.address`.
    fn inline_model_name(&self, field_name: &str) -> String {
        if !self.is_taken(field_name) {
            return field_name.to_string();
        }
        match self.loading.last() {
            Some(owner) => format!("{}.{}", owner, field_name),
            None => field_name.to_string(),
        }
    }

    fn is_taken(&self, name: &str) -> bool {
        self.models.contains(name)
            || name == self.root_name
            || DEF_KEYWORDS.iter().any(|keyword| {
                self.document
                    .get(*keyword)
                    .and_then(Value::as_object)
                    .and_then(|defs| defs.get(name))
                    .and_then(Value::as_object)
                    .is_some_and(is_model_schema)
            })
    }

    fn parse_type(&mut self, node: &Value, path: &str, field_name: &str) -> Result<FieldType, MapError> {
        let obj = match node {
            Value::Bool(true) => return Ok(FieldType::Any),
            Value::Object(obj) => obj,
            _ => return Err(schema_error(path, "expected a schema object")),
        };

        if let Some(reference) = obj.get("$ref") {
            return self.parse_ref(reference, path);
        }

        for keyword in ["anyOf", "oneOf"] {
            if let Some(arms) = obj.get(keyword) {
                let arms = arms
                    .as_array()
                    .ok_or_else(|| schema_error(path, &format!("{} must be an array", keyword)))?;
                let mut parsed = Vec::with_capacity(arms.len());
                for (i, arm) in arms.iter().enumerate() {
                    let index = i.to_string();
                    let arm_path = build_path(path, &[keyword, index.as_str()]);
                    parsed.push(self.parse_type(arm, &arm_path, field_name)?);
                }
                return Ok(collapse_union(parsed));
            }
        }

        if let Some(all_of) = obj.get("allOf") {
            return match all_of.as_array().map(Vec::as_slice) {
                Some([single]) => self.parse_type(single, &build_path(path, &["allOf", "0"]), field_name),
                _ => Err(schema_error(path, "allOf is only supported with a single schema")),
            };
        }

        match obj.get("type") {
            Some(Value::String(ty)) => self.parse_typed(ty, node, obj, path, field_name),
            Some(Value::Array(types)) => {
                let mut parsed = Vec::with_capacity(types.len());
                for ty in types {
                    let ty = ty
                        .as_str()
                        .ok_or_else(|| schema_error(path, "type array must contain strings"))?;
                    parsed.push(self.parse_typed(ty, node, obj, path, field_name)?);
                }
                Ok(collapse_union(parsed))
            }
            Some(_) => Err(schema_error(path, "type must be a string or an array of strings")),
            None if obj.contains_key("properties") => {
                self.parse_typed("object", node, obj, path, field_name)
            }
            None if obj.contains_key("items") || obj.contains_key("prefixItems") => {
                self.parse_typed("array", node, obj, path, field_name)
            }
            None => Ok(FieldType::Any),
        }
    }

    fn parse_typed(
        &mut self,
        ty: &str,
        node: &Value,
        obj: &Map<String, Value>,
        path: &str,
        field_name: &str,
    ) -> Result<FieldType, MapError> {
        match ty {
            "string" => Ok(FieldType::String(
                match obj.get("format").and_then(Value::as_str) {
                    Some("date") => StringFormat::Date,
                    Some("date-time") => StringFormat::DateTime,
                    _ => StringFormat::Plain,
                },
            )),
            "integer" => Ok(FieldType::Integer),
            "number" => Ok(FieldType::Number),
            "boolean" => Ok(FieldType::Boolean),
            "null" => Ok(FieldType::Null),
            "array" => self.parse_array(obj, path, field_name),
            "object" if obj.contains_key("properties") => {
                let name = match obj.get("title").and_then(Value::as_str) {
                    Some(title) => title.to_string(),
                    None => self.inline_model_name(field_name),
                };
                self.load_model(&name, node, path)?;
                Ok(FieldType::Model(name))
            }
            "object" => match obj.get("additionalProperties") {
                Some(values @ Value::Object(_)) => {
                    let inner = self.parse_type(
                        values,
                        &build_path(path, &["additionalProperties"]),
                        field_name,
                    )?;
                    Ok(FieldType::map(inner))
                }
                _ => Ok(FieldType::map(FieldType::Any)),
            },
            other => Err(schema_error(path, &format!("unsupported type '{}'", other))),
        }
    }

    fn parse_array(
        &mut self,
        obj: &Map<String, Value>,
        path: &str,
        field_name: &str,
    ) -> Result<FieldType, MapError> {
        if let Some(prefix) = obj.get("prefixItems") {
            let prefix = prefix
                .as_array()
                .ok_or_else(|| schema_error(path, "prefixItems must be an array"))?;
            let mut items = Vec::with_capacity(prefix.len());
            for (i, item) in prefix.iter().enumerate() {
                let index = i.to_string();
                let item_path = build_path(path, &["prefixItems", index.as_str()]);
                items.push(self.parse_type(item, &item_path, field_name)?);
            }
            return Ok(FieldType::Tuple(items));
        }

        let inner = match obj.get("items") {
            Some(items) => self.parse_type(items, &build_path(path, &["items"]), field_name)?,
            None => FieldType::Any,
        };

        if obj.get("uniqueItems").and_then(Value::as_bool) == Some(true) {
            Ok(FieldType::set(inner))
        } else {
            Ok(FieldType::list(inner))
        }
    }

    fn parse_ref(&mut self, reference: &Value, path: &str) -> Result<FieldType, MapError> {
        let reference = reference
            .as_str()
            .ok_or_else(|| schema_error(path, "$ref must be a string"))?;

        let unresolvable = || MapError::UnresolvableRef {
            path: path.to_string(),
            reference: reference.to_string(),
        };

        if !reference.starts_with('#') {
            return Err(unresolvable());
        }

        let segments = split_path(reference);
        match segments.as_slice() {
            [] => Ok(FieldType::Model(self.root_name.clone())),
            [keyword, name] if DEF_KEYWORDS.contains(&keyword.as_str()) => {
                let document = self.document;
                let def = document
                    .get(keyword.as_str())
                    .and_then(|defs| defs.get(name.as_str()))
                    .ok_or_else(unresolvable)?;

                if def.as_object().is_some_and(is_model_schema) {
                    return Ok(FieldType::Model(name.clone()));
                }

                if let Some(known) = self.inlined.get(name.as_str()) {
                    return Ok(known.clone());
                }

                if self.expanding.contains(name) {
                    return Err(schema_error(
                        path,
                        &format!("definition '{}' refers to itself without an object", name),
                    ));
                }
                self.expanding.push(name.clone());
                let def_path = build_path("#", &[keyword.as_str(), name.as_str()]);
                let inlined = self.parse_type(def, &def_path, name);
                self.expanding.pop();
                let inlined = inlined?;
                self.inlined.insert(name.clone(), inlined.clone());
                Ok(inlined)
            }
            _ => Err(unresolvable()),
        }
    }
}

/// An object schema that describes a model (as opposed to a map or a scalar).
fn is_model_schema(obj: &Map<String, Value>) -> bool {
    obj.contains_key("properties")
        && matches!(obj.get("type"), None | Some(Value::String(_)))
        && obj.get("type").and_then(Value::as_str).unwrap_or("object") == "object"
}

fn required_names<'a>(obj: &'a Map<String, Value>, path: &str) -> Result<Vec<&'a str>, MapError> {
    let Some(required) = obj.get("required") else {
        return Ok(Vec::new());
    };
    let required_path = build_path(path, &["required"]);
    required
        .as_array()
        .ok_or_else(|| schema_error(&required_path, "required must be an array"))?
        .iter()
        .map(|name| {
            name.as_str()
                .ok_or_else(|| schema_error(&required_path, "required entries must be strings"))
        })
        .collect()
}

/// Fold parsed `anyOf` / type-array arms: null arms become an `Optional`
/// wrapper, a single remaining arm is unwrapped.
fn collapse_union(arms: Vec<FieldType>) -> FieldType {
    let has_null = arms.iter().any(|arm| matches!(arm, FieldType::Null));
    let mut rest: Vec<FieldType> = arms
        .into_iter()
        .filter(|arm| !matches!(arm, FieldType::Null))
        .collect();

    let inner = match rest.len() {
        0 => return FieldType::Null,
        1 => rest.remove(0),
        _ => FieldType::Union(rest),
    };

    match inner {
        already @ FieldType::Optional(_) => already,
        inner if has_null => FieldType::optional(inner),
        inner => inner,
    }
}

fn schema_error(path: &str, message: &str) -> MapError {
    MapError::SchemaError {
        path: path.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn order_schema() -> Value {
        json!({
            "title": "Order",
            "type": "object",
            "$defs": {
                "Address": {
                    "type": "object",
                    "properties": {
                        "city": { "type": "string" },
                        "zip": { "type": ["string", "null"] }
                    },
                    "required": ["city"]
                },
                "Status": { "type": "string", "enum": ["open", "closed"] }
            },
            "properties": {
                "order_id": { "type": "integer" },
                "placed": { "type": "string", "format": "date" },
                "address": { "anyOf": [{ "$ref": "#/$defs/Address" }, { "type": "null" }], "default": null },
                "status": { "$ref": "#/$defs/Status" },
                "tags": { "type": "array", "items": { "type": "string" }, "uniqueItems": true },
                "parent": { "$ref": "#" }
            },
            "required": ["order_id", "placed", "status", "tags"]
        })
    }

    #[test]
    fn test_loads_root_and_defs() {
        let models = ModelSet::from_schema(&order_schema()).unwrap();
        let root = models.root().unwrap();
        assert_eq!(root.name, "Order");

        let names: Vec<&str> = root.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["order_id", "placed", "address", "status", "tags", "parent"]);

        let address = models.get("Address").unwrap();
        assert_eq!(address.get("zip").unwrap().ty, FieldType::optional(FieldType::string()));
        assert!(address.get("city").unwrap().required);
    }

    #[test]
    fn test_field_types() {
        let models = ModelSet::from_schema(&order_schema()).unwrap();
        let root = models.root().unwrap();

        assert_eq!(root.get("order_id").unwrap().ty, FieldType::Integer);
        assert_eq!(root.get("placed").unwrap().ty, FieldType::String(StringFormat::Date));
        assert_eq!(
            root.get("address").unwrap().ty,
            FieldType::optional(FieldType::model("Address"))
        );
        // Non-object definitions are inlined.
        assert_eq!(root.get("status").unwrap().ty, FieldType::string());
        assert_eq!(root.get("tags").unwrap().ty, FieldType::set(FieldType::string()));
        assert_eq!(root.get("parent").unwrap().ty, FieldType::model("Order"));
    }

    #[test]
    fn test_default_clears_required() {
        let models = ModelSet::from_schema(&order_schema()).unwrap();
        let address = models.root().unwrap().get("address").unwrap();
        assert!(!address.required);
        assert_eq!(address.default, Some(json!(null)));
    }

    #[test]
    fn test_inline_object_becomes_model() {
        let schema = json!({
            "title": "Profile",
            "type": "object",
            "properties": {
                "contact": {
                    "type": "object",
                    "properties": { "email": { "type": "string" } }
                },
                "labels": {
                    "type": "object",
                    "additionalProperties": { "type": "integer" }
                }
            }
        });
        let models = ModelSet::from_schema(&schema).unwrap();
        let root = models.root().unwrap();
        assert_eq!(root.get("contact").unwrap().ty, FieldType::model("contact"));
        assert_eq!(root.get("labels").unwrap().ty, FieldType::map(FieldType::Integer));
        assert!(models.get("contact").unwrap().get("email").is_some());
    }

    #[test]
    fn test_untitled_inline_objects_sharing_a_field_name() {
        let schema = json!({
            "title": "Order",
            "type": "object",
            "$defs": {
                "Billing": {
                    "type": "object",
                    "properties": {
                        "address": { "type": "object", "properties": { "street": { "type": "string" } } }
                    }
                },
                "Shipping": {
                    "type": "object",
                    "properties": {
                        "address": { "type": "object", "properties": { "zip": { "type": "string" } } }
                    }
                }
            },
            "properties": {
                "billing": { "$ref": "#/$defs/Billing" },
                "shipping": { "$ref": "#/$defs/Shipping" }
            }
        });
        let models = ModelSet::from_schema(&schema).unwrap();
        let billing = models.get("Billing").unwrap();
        let shipping = models.get("Shipping").unwrap();
        assert_eq!(billing.get("address").unwrap().ty, FieldType::model("address"));
        assert_eq!(shipping.get("address").unwrap().ty, FieldType::model("Shipping.address"));
        assert!(models.get("address").unwrap().get("street").is_some());
        assert!(models.get("Shipping.address").unwrap().get("zip").is_some());
    }

    #[test]
    fn test_inline_object_yields_to_definition_name() {
        let schema = json!({
            "title": "Profile",
            "type": "object",
            "$defs": {
                "Contact": { "type": "object", "properties": { "email": { "type": "string" } } }
            },
            "properties": {
                "Contact": { "type": "object", "properties": { "phone": { "type": "string" } } },
                "primary": { "$ref": "#/$defs/Contact" }
            }
        });
        let models = ModelSet::from_schema(&schema).unwrap();
        let root = models.root().unwrap();
        assert_eq!(root.get("Contact").unwrap().ty, FieldType::model("Profile.Contact"));
        assert_eq!(root.get("primary").unwrap().ty, FieldType::model("Contact"));
    }

    #[test]
    fn test_duplicate_titles_are_rejected() {
        let schema = json!({
            "title": "Order",
            "type": "object",
            "properties": {
                "billing": { "title": "Address", "type": "object", "properties": { "street": { "type": "string" } } },
                "shipping": { "title": "Address", "type": "object", "properties": { "zip": { "type": "string" } } }
            }
        });
        let err = ModelSet::from_schema(&schema).unwrap_err();
        assert!(err.to_string().contains("duplicate model name 'Address'"), "{err}");
    }

    #[test]
    fn test_tuple_and_union() {
        let schema = json!({
            "title": "Point",
            "properties": {
                "coords": { "type": "array", "prefixItems": [{ "type": "number" }, { "type": "number" }] },
                "label": { "anyOf": [{ "type": "string" }, { "type": "integer" }, { "type": "null" }] }
            }
        });
        let models = ModelSet::from_schema(&schema).unwrap();
        let root = models.root().unwrap();
        assert_eq!(
            root.get("coords").unwrap().ty,
            FieldType::Tuple(vec![FieldType::Number, FieldType::Number])
        );
        assert_eq!(
            root.get("label").unwrap().ty,
            FieldType::optional(FieldType::Union(vec![FieldType::string(), FieldType::Integer]))
        );
    }

    #[test]
    fn test_unknown_ref_is_unresolvable() {
        let schema = json!({
            "title": "Broken",
            "properties": { "item": { "$ref": "#/$defs/Missing" } }
        });
        match ModelSet::from_schema(&schema) {
            Err(MapError::UnresolvableRef { path, reference }) => {
                assert_eq!(path, "#/properties/item");
                assert_eq!(reference, "#/$defs/Missing");
            }
            other => panic!("expected UnresolvableRef, got {:?}", other),
        }
    }

    #[test]
    fn test_external_ref_is_unresolvable() {
        let schema = json!({
            "title": "Remote",
            "properties": { "item": { "$ref": "https://example.com/item.json" } }
        });
        assert!(matches!(
            ModelSet::from_schema(&schema),
            Err(MapError::UnresolvableRef { .. })
        ));
    }

    #[test]
    fn test_non_object_root_rejected() {
        let err = ModelSet::from_schema(&json!({ "type": "string" })).unwrap_err();
        assert!(matches!(err, MapError::SchemaError { ref path, .. } if path == "#"));
    }

    #[test]
    fn test_self_referencing_alias_rejected() {
        let schema = json!({
            "title": "Loop",
            "$defs": { "A": { "anyOf": [{ "$ref": "#/$defs/A" }, { "type": "null" }] } },
            "properties": { "a": { "$ref": "#/$defs/A" } }
        });
        assert!(matches!(
            ModelSet::from_schema(&schema),
            Err(MapError::SchemaError { .. })
        ));
    }
}
