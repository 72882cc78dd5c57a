//! Structured records: the view of source data the mapper searches, and
//! validated target instances.

use serde::Serialize;
use serde_json::{Map, Value};

use super::coercion::coerce_model;
use super::model::{FieldDef, Model, ModelSet};
use super::ValidationError;
use crate::error::MapError;

/// A structured value the mapper can search.
///
/// A record exposes its runtime type name, its declared fields in order,
/// get-by-name access to its data, and a way to view a nested value as a
/// record of another model from the same family.
pub trait Record<'a>: Copy {
    /// Runtime type identity. Records of different families with equal
    /// type names are treated as the same type.
    fn type_name(&self) -> &'a str;

    /// Declared fields, in declaration order.
    fn fields(&self) -> &'a [FieldDef];

    /// The value stored under `name`, if any.
    fn get(&self, name: &str) -> Option<&'a Value>;

    /// View `value` as a record of `model`. `None` when the model is unknown
    /// or the value is not structured.
    fn child(&self, model: &str, value: &'a Value) -> Option<Self>;

    /// The record's data as a plain JSON value.
    fn to_value(&self) -> Value;
}

/// A JSON object viewed through a [`Model`] of a [`ModelSet`].
#[derive(Debug, Clone, Copy)]
pub struct Instance<'a> {
    models: &'a ModelSet,
    model: &'a Model,
    data: &'a Map<String, Value>,
}

impl<'a> Instance<'a> {
    /// View `data` as an instance of the model called `name`.
    ///
    /// Fails with [`MapError::InvalidArguments`] if the model is unknown or
    /// the data is not a JSON object. The data is not validated.
    pub fn new(models: &'a ModelSet, name: &str, data: &'a Value) -> Result<Self, MapError> {
        let model = models
            .get(name)
            .ok_or_else(|| MapError::invalid_arguments(name, "no such model in the source schema"))?;
        let data = data.as_object().ok_or_else(|| {
            MapError::invalid_arguments(
                name,
                format!("expected a JSON object, got {}", super::json_type_name(data)),
            )
        })?;
        Ok(Self { models, model, data })
    }

    /// View `data` as an instance of the set's root model.
    pub fn root(models: &'a ModelSet, data: &'a Value) -> Result<Self, MapError> {
        let root = models
            .root()
            .ok_or_else(|| MapError::invalid_arguments("<root>", "the source schema has no root model"))?;
        Self::new(models, &root.name, data)
    }

    pub fn model(&self) -> &'a Model {
        self.model
    }

    pub fn data(&self) -> &'a Map<String, Value> {
        self.data
    }
}

impl<'a> Record<'a> for Instance<'a> {
    fn type_name(&self) -> &'a str {
        &self.model.name
    }

    fn fields(&self) -> &'a [FieldDef] {
        &self.model.fields
    }

    fn get(&self, name: &str) -> Option<&'a Value> {
        self.data.get(name)
    }

    fn child(&self, model: &str, value: &'a Value) -> Option<Self> {
        Some(Self {
            models: self.models,
            model: self.models.get(model)?,
            data: value.as_object()?,
        })
    }

    fn to_value(&self) -> Value {
        Value::Object(self.data.clone())
    }
}

/// A validated instance of a target model.
///
/// Serializes as its value alone.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ModelInstance {
    #[serde(skip)]
    model: String,
    value: Map<String, Value>,
}

impl ModelInstance {
    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.value.get(field)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.value
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.value)
    }
}

impl ModelSet {
    /// Instantiate the model called `name` from a value mapping.
    ///
    /// Values are coerced to their declared types; absent optional fields
    /// take their default; unknown keys are ignored.
    pub fn instantiate(
        &self,
        name: &str,
        data: &Map<String, Value>,
    ) -> Result<ModelInstance, ValidationError> {
        let model = self
            .get(name)
            .ok_or_else(|| ValidationError::new("", format!("unknown model '{}'", name)))?;
        let value = coerce_model(model, data, self, "")?;
        Ok(ModelInstance {
            model: model.name.clone(),
            value,
        })
    }
}
