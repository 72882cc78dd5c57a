//! Field descriptors: the shape of a target field as the mapper sees it.
//!
//! A descriptor says whether a field is a plain scalar, a nested model, or a
//! (possibly nested) collection of models. Nullable wrappers are peeled off
//! first; unions with more than one non-null arm are left alone and treated
//! as scalars.

use serde::{Serialize, Serializer};

use crate::schema::{FieldDef, FieldType, Model};

/// Derived, immutable metadata about one target field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor<'a> {
    pub field_name: &'a str,
    pub is_structured: bool,
    pub structured_type: Option<&'a str>,
    pub is_collection_of_structured: bool,
    /// Innermost model of a collection-of-structured field.
    pub collection_element_type: Option<&'a str>,
    /// `1` for `list[M]`, `2` for `list[list[M]]`, `0` otherwise.
    pub collection_depth: usize,
    pub is_required: bool,
    #[serde(serialize_with = "serialize_display")]
    pub declared_type: &'a FieldType,
    pub owning_schema_name: &'a str,
    pub declared_path: String,
}

enum Shape<'a> {
    Scalar,
    Structured(&'a str),
    Collection { element: &'a str, depth: usize },
}

impl<'a> FieldDescriptor<'a> {
    /// Describe `field`, declared on the model `owner`, visited at the
    /// target path `path`.
    pub fn resolve(field: &'a FieldDef, owner: &'a str, path: impl Into<String>) -> Self {
        let mut descriptor = Self {
            field_name: &field.name,
            is_structured: false,
            structured_type: None,
            is_collection_of_structured: false,
            collection_element_type: None,
            collection_depth: 0,
            is_required: field.required,
            declared_type: &field.ty,
            owning_schema_name: owner,
            declared_path: path.into(),
        };

        match classify(&field.ty) {
            Shape::Scalar => {}
            Shape::Structured(name) => {
                descriptor.is_structured = true;
                descriptor.structured_type = Some(name);
            }
            Shape::Collection { element, depth } => {
                descriptor.is_collection_of_structured = true;
                descriptor.collection_element_type = Some(element);
                descriptor.collection_depth = depth;
            }
        }

        descriptor
    }

    /// Descriptors for every field of `model`, with paths relative to it.
    pub fn for_model(model: &'a Model) -> Vec<Self> {
        model
            .fields
            .iter()
            .map(|field| Self::resolve(field, &model.name, field.name.as_str()))
            .collect()
    }

    pub fn is_scalar(&self) -> bool {
        !self.is_structured && !self.is_collection_of_structured
    }
}

fn classify(ty: &FieldType) -> Shape<'_> {
    match unwrap_nullable(ty) {
        FieldType::Model(name) => Shape::Structured(name),
        FieldType::List(inner) | FieldType::Set(inner) => element_shape(inner),
        FieldType::Tuple(items) if items.len() == 1 => element_shape(&items[0]),
        _ => Shape::Scalar,
    }
}

fn element_shape(inner: &FieldType) -> Shape<'_> {
    match classify(inner) {
        Shape::Scalar => Shape::Scalar,
        Shape::Structured(element) => Shape::Collection { element, depth: 1 },
        Shape::Collection { element, depth } => Shape::Collection {
            element,
            depth: depth + 1,
        },
    }
}

/// Peel `Optional` wrappers and unions whose only non-null arm is one type.
pub(crate) fn unwrap_nullable(ty: &FieldType) -> &FieldType {
    match ty {
        FieldType::Optional(inner) => unwrap_nullable(inner),
        FieldType::Union(arms) => {
            let mut non_null = arms.iter().filter(|arm| !matches!(arm, FieldType::Null));
            match (non_null.next(), non_null.next()) {
                (Some(only), None) => unwrap_nullable(only),
                _ => ty,
            }
        }
        _ => ty,
    }
}

fn serialize_display<S: Serializer>(ty: &&FieldType, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(*ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn describe(ty: FieldType) -> (bool, Option<String>, bool, Option<String>, usize) {
        let field = FieldDef::required("f", ty);
        let d = FieldDescriptor::resolve(&field, "Owner", "f");
        (
            d.is_structured,
            d.structured_type.map(str::to_string),
            d.is_collection_of_structured,
            d.collection_element_type.map(str::to_string),
            d.collection_depth,
        )
    }

    #[test]
    fn test_scalar() {
        assert_eq!(describe(FieldType::Integer), (false, None, false, None, 0));
        assert_eq!(describe(FieldType::list(FieldType::string())), (false, None, false, None, 0));
    }

    #[test]
    fn test_optional_model_is_structured() {
        assert_eq!(
            describe(FieldType::optional(FieldType::model("Address"))),
            (true, Some("Address".to_string()), false, None, 0)
        );
        assert_eq!(
            describe(FieldType::Union(vec![FieldType::Null, FieldType::model("Address")])),
            (true, Some("Address".to_string()), false, None, 0)
        );
    }

    #[test]
    fn test_wider_union_stays_scalar() {
        let ty = FieldType::Union(vec![FieldType::model("Address"), FieldType::string()]);
        assert_eq!(describe(ty), (false, None, false, None, 0));
    }

    #[test]
    fn test_nested_collections_count_depth() {
        assert_eq!(
            describe(FieldType::list(FieldType::model("Line"))),
            (false, None, true, Some("Line".to_string()), 1)
        );
        assert_eq!(
            describe(FieldType::optional(FieldType::list(FieldType::set(FieldType::optional(
                FieldType::model("Line")
            ))))),
            (false, None, true, Some("Line".to_string()), 2)
        );
        assert_eq!(
            describe(FieldType::Tuple(vec![FieldType::model("Line")])),
            (false, None, true, Some("Line".to_string()), 1)
        );
    }

    #[test]
    fn test_serializes_declared_type_as_text() {
        let field = FieldDef::optional("lines", FieldType::list(FieldType::model("Line")));
        let d = FieldDescriptor::resolve(&field, "Order", "lines");
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["declared_type"], json!("list[Line]"));
        assert_eq!(json["owning_schema_name"], json!("Order"));
        assert_eq!(json["is_required"], json!(false));
    }
}
