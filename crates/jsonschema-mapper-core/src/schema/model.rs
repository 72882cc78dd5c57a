//! Declared types, fields and models.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MapError;

/// Refinement of a string-typed field, taken from the JSON Schema `format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StringFormat {
    Plain,
    /// `YYYY-MM-DD`.
    Date,
    /// RFC 3339 timestamp.
    DateTime,
}

/// The declared type of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String(StringFormat),
    Integer,
    Number,
    Boolean,
    Null,
    /// Unconstrained; accepts any value.
    Any,
    /// Reference to a model in the same [`ModelSet`], by name.
    Model(String),
    List(Box<FieldType>),
    /// Array with `uniqueItems`; duplicates are dropped on coercion.
    Set(Box<FieldType>),
    /// Fixed-arity positional array (`prefixItems`).
    Tuple(Vec<FieldType>),
    /// Object with arbitrary keys and uniformly typed values.
    Map(Box<FieldType>),
    /// Nullable wrapper.
    Optional(Box<FieldType>),
    /// Several non-null alternatives, tried in order.
    Union(Vec<FieldType>),
}

impl FieldType {
    pub fn string() -> Self {
        FieldType::String(StringFormat::Plain)
    }

    pub fn model(name: impl Into<String>) -> Self {
        FieldType::Model(name.into())
    }

    pub fn list(inner: FieldType) -> Self {
        FieldType::List(Box::new(inner))
    }

    pub fn set(inner: FieldType) -> Self {
        FieldType::Set(Box::new(inner))
    }

    pub fn map(inner: FieldType) -> Self {
        FieldType::Map(Box::new(inner))
    }

    pub fn optional(inner: FieldType) -> Self {
        FieldType::Optional(Box::new(inner))
    }

    /// Whether `null` is an acceptable value for this type.
    pub fn accepts_null(&self) -> bool {
        match self {
            FieldType::Null | FieldType::Any | FieldType::Optional(_) => true,
            FieldType::Union(arms) => arms.iter().any(FieldType::accepts_null),
            _ => false,
        }
    }

    /// Push the name of every model referenced anywhere inside this type.
    pub(crate) fn collect_model_refs<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            FieldType::Model(name) => out.push(name),
            FieldType::List(inner)
            | FieldType::Set(inner)
            | FieldType::Map(inner)
            | FieldType::Optional(inner) => inner.collect_model_refs(out),
            FieldType::Tuple(items) | FieldType::Union(items) => {
                for item in items {
                    item.collect_model_refs(out);
                }
            }
            FieldType::String(_)
            | FieldType::Integer
            | FieldType::Number
            | FieldType::Boolean
            | FieldType::Null
            | FieldType::Any => {}
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::String(StringFormat::Plain) => f.write_str("string"),
            FieldType::String(StringFormat::Date) => f.write_str("date"),
            FieldType::String(StringFormat::DateTime) => f.write_str("date-time"),
            FieldType::Integer => f.write_str("integer"),
            FieldType::Number => f.write_str("number"),
            FieldType::Boolean => f.write_str("boolean"),
            FieldType::Null => f.write_str("null"),
            FieldType::Any => f.write_str("any"),
            FieldType::Model(name) => f.write_str(name),
            FieldType::List(inner) => write!(f, "list[{}]", inner),
            FieldType::Set(inner) => write!(f, "set[{}]", inner),
            FieldType::Map(inner) => write!(f, "map[{}]", inner),
            FieldType::Optional(inner) => write!(f, "optional[{}]", inner),
            FieldType::Tuple(items) => {
                f.write_str("tuple[")?;
                write_joined(f, items, ", ")?;
                f.write_str("]")
            }
            FieldType::Union(arms) => {
                f.write_str("union[")?;
                write_joined(f, arms, " | ")?;
                f.write_str("]")
            }
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[FieldType], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// One declared field of a [`Model`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
    pub required: bool,
    /// Value used at instantiation when the field is absent.
    pub default: Option<Value>,
}

impl FieldDef {
    pub fn required(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
            default: None,
        }
    }

    /// Attach a default value. A field with a default is never required.
    pub fn with_default(mut self, default: Value) -> Self {
        self.required = false;
        self.default = Some(default);
        self
    }
}

/// A named structured type with fields in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub name: String,
    pub description: Option<String>,
    pub fields: Vec<FieldDef>,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: Vec::new(),
        }
    }

    /// Append a field (builder style).
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Look up a declared field by name.
    pub fn get(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A registry of models that may reference each other by name.
///
/// Source and target schemas each live in their own `ModelSet`. Two models
/// in different sets are considered the same runtime type when their names
/// are equal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelSet {
    models: BTreeMap<String, Model>,
    root: Option<String>,
}

impl ModelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model (builder style). A model with the same name is replaced.
    pub fn with_model(mut self, model: Model) -> Self {
        self.insert(model);
        self
    }

    /// Register a model and mark it as the root.
    pub fn with_root(mut self, model: Model) -> Self {
        self.root = Some(model.name.clone());
        self.insert(model);
        self
    }

    /// Register a model, returning the one it replaced, if any.
    pub fn insert(&mut self, model: Model) -> Option<Model> {
        self.models.insert(model.name.clone(), model)
    }

    pub(crate) fn set_root(&mut self, name: impl Into<String>) {
        self.root = Some(name.into());
    }

    pub fn get(&self, name: &str) -> Option<&Model> {
        self.models.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// The root model, when the set was loaded from a document or built with
    /// [`with_root`](Self::with_root).
    pub fn root(&self) -> Option<&Model> {
        self.root.as_deref().and_then(|name| self.models.get(name))
    }

    /// All models, ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = &Model> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Force resolution of every model reference.
    ///
    /// Forward and self references are legal; a reference to a name that is
    /// not registered fails with [`MapError::UnresolvableRef`].
    pub fn resolve(&self) -> Result<(), MapError> {
        if let Some(root) = &self.root {
            if !self.models.contains_key(root) {
                return Err(MapError::UnresolvableRef {
                    path: "#".to_string(),
                    reference: root.clone(),
                });
            }
        }

        for model in self.models.values() {
            for field in &model.fields {
                let mut refs = Vec::new();
                field.ty.collect_model_refs(&mut refs);
                if let Some(missing) = refs.into_iter().find(|name| !self.contains(name)) {
                    return Err(MapError::UnresolvableRef {
                        path: format!("{}.{}", model.name, field.name),
                        reference: missing.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
