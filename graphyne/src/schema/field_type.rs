use apollo_compiler::ast;
use serde_json_bytes::Value;

use crate::context::Context;
use crate::input::ValidationResult;
use crate::json_ext::PathElement;
use crate::json_ext::ValueExt;
use crate::schema::Schema;

// Primitives are taken from scalars: https://spec.graphql.org/draft/#sec-Scalars
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Named(String),
    List(Box<FieldType>),
    NonNull(Box<FieldType>),
    String,
    Int,
    Float,
    Id,
    Boolean,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::Named(ty) => write!(f, "{ty}"),
            FieldType::List(ty) => write!(f, "[{ty}]"),
            FieldType::NonNull(ty) => write!(f, "{ty}!"),
            FieldType::String => write!(f, "String"),
            FieldType::Int => write!(f, "Int"),
            FieldType::Float => write!(f, "Float"),
            FieldType::Id => write!(f, "ID"),
            FieldType::Boolean => write!(f, "Boolean"),
        }
    }
}

impl FieldType {
    // This function validates input values according to the graphql specification.
    // Each of the values are validated against the "input coercion" rules.
    //
    // Problems are reported with a path into the value, and every problem is
    // collected rather than stopping at the first one.
    pub(crate) fn validate_input_value(
        &self,
        value: &Value,
        context: &Context,
        schema: &Schema,
    ) -> ValidationResult {
        let invalid = || ValidationResult::from_problem(format!("could not coerce value to {self}"));
        match (self, value) {
            (FieldType::String, Value::String(_)) => ValidationResult::valid(),
            // Spec: https://spec.graphql.org/June2018/#sec-Int
            (FieldType::Int, maybe_int) => {
                if maybe_int == &Value::Null || maybe_int.is_valid_int_input() {
                    ValidationResult::valid()
                } else {
                    invalid()
                }
            }
            // Spec: https://spec.graphql.org/draft/#sec-Float.Input-Coercion
            (FieldType::Float, maybe_float) => {
                if maybe_float == &Value::Null || maybe_float.is_valid_float_input() {
                    ValidationResult::valid()
                } else {
                    invalid()
                }
            }
            // "The ID scalar type represents a unique identifier, often used to refetch an object
            // or as the key for a cache. The ID type is serialized in the same way as a String;
            // however, it is not intended to be human-readable. While it is often numeric, it
            // should always serialize as a String."
            //
            // In practice it seems Int works too
            (FieldType::Id, maybe_id) => {
                if maybe_id == &Value::Null || maybe_id.is_valid_id_input() {
                    ValidationResult::valid()
                } else {
                    invalid()
                }
            }
            (FieldType::Boolean, Value::Bool(_)) => ValidationResult::valid(),
            (FieldType::List(inner_ty), Value::Array(vec)) => {
                let mut result = ValidationResult::valid();
                for (index, element) in vec.iter().enumerate() {
                    result.merge_at(
                        PathElement::Index(index),
                        inner_ty.validate_input_value(element, context, schema),
                    );
                }
                result
            }
            // For coercion from single value to list
            (FieldType::List(inner_ty), val) if val != &Value::Null => {
                inner_ty.validate_input_value(val, context, schema)
            }
            (FieldType::NonNull(inner_ty), value) => {
                if value.is_null() {
                    ValidationResult::from_problem("Expected value to not be null")
                } else {
                    inner_ty.validate_input_value(value, context, schema)
                }
            }
            // NOTE: graphql's types are all optional by default
            (_, Value::Null) => ValidationResult::valid(),
            (FieldType::Named(name), value) => {
                if let Some(input_object) = schema.input_object(name) {
                    input_object.validate_non_null_input(value, context, schema)
                } else if let Some(enum_type) = schema.definitions().get_enum(name) {
                    let is_member = value
                        .as_str()
                        .is_some_and(|s| enum_type.values.keys().any(|v| v.as_str() == s));
                    if is_member {
                        ValidationResult::valid()
                    } else {
                        ValidationResult::from_problem(format!(
                            "could not coerce value to enum {name}"
                        ))
                    }
                } else if schema.definitions().get_scalar(name).is_some() {
                    // custom scalars can take any shape
                    ValidationResult::valid()
                } else {
                    ValidationResult::from_problem(format!("{name} is not an input type"))
                }
            }
            _ => invalid(),
        }
    }

    /// Convert a value held under this type's keyword layout back to its
    /// declared, outbound layout.
    ///
    /// Unknown keys are dropped rather than reported.
    pub(crate) fn coerce_result(&self, value: &Value, schema: &Schema) -> Value {
        match (self, value) {
            (_, Value::Null) => Value::Null,
            (FieldType::NonNull(inner_ty), value) => inner_ty.coerce_result(value, schema),
            (FieldType::List(inner_ty), Value::Array(vec)) => Value::Array(
                vec.iter()
                    .map(|element| inner_ty.coerce_result(element, schema))
                    .collect(),
            ),
            (FieldType::List(inner_ty), value) => inner_ty.coerce_result(value, schema),
            (FieldType::Named(name), value) => match schema.input_object(name) {
                Some(input_object) => input_object.coerce_result(value, schema),
                None => value.clone(),
            },
            (_, value) => value.clone(),
        }
    }

    pub(crate) fn is_non_null(&self) -> bool {
        matches!(self, FieldType::NonNull(_))
    }
}

impl From<&'_ ast::Type> for FieldType {
    // Spec: https://spec.graphql.org/draft/#sec-Type-References
    fn from(ty: &'_ ast::Type) -> Self {
        match ty {
            ast::Type::Named(name) => FieldType::named(name.as_str()),
            ast::Type::NonNullNamed(name) => {
                FieldType::NonNull(Box::new(FieldType::named(name.as_str())))
            }
            ast::Type::List(inner) => FieldType::List(Box::new(FieldType::from(inner.as_ref()))),
            ast::Type::NonNullList(inner) => FieldType::NonNull(Box::new(FieldType::List(
                Box::new(FieldType::from(inner.as_ref())),
            ))),
        }
    }
}

impl FieldType {
    fn named(name: &str) -> FieldType {
        match name {
            "String" => FieldType::String,
            "Int" => FieldType::Int,
            "Float" => FieldType::Float,
            "ID" => FieldType::Id,
            "Boolean" => FieldType::Boolean,
            _ => FieldType::Named(name.to_owned()),
        }
    }
}
