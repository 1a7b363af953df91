//! Coerced input values and the typed container that holds them.

pub(crate) mod coercion;
mod validation;

use std::sync::Arc;

use displaydoc::Display;
use indexmap::IndexMap;
use serde_json_bytes::Value;
use thiserror::Error;
pub use validation::Problem;
pub use validation::ValidationResult;

use crate::context::Context;
use crate::execution::lazy::LazyError;
use crate::graphql;
use crate::graphql::ErrorExtension;
use crate::graphql::IntoGraphQLErrors;
use crate::json_ext::Object;
use crate::schema::InputObject;

/// Coerced argument values in declaration order, keyed by snake_case keyword.
pub type ArgumentMap = IndexMap<String, ArgumentValue>;

/// A fully coerced argument value.
#[derive(Clone, Debug)]
pub enum ArgumentValue {
    /// A scalar, enum, or otherwise uninterpreted JSON value.
    Value(Value),

    /// A coerced input object.
    Object(InputContainer),

    /// A list of coerced values.
    List(Vec<ArgumentValue>),
}

impl ArgumentValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ArgumentValue::Value(Value::Null))
    }

    pub fn as_container(&self) -> Option<&InputContainer> {
        match self {
            ArgumentValue::Object(container) => Some(container),
            _ => None,
        }
    }

    /// Recursively unwrap to plain JSON. Containers render under their
    /// keyword keys.
    pub fn to_plain_value(&self) -> Value {
        match self {
            ArgumentValue::Value(value) => value.clone(),
            ArgumentValue::Object(container) => container.to_plain_value(),
            ArgumentValue::List(items) => {
                Value::Array(items.iter().map(ArgumentValue::to_plain_value).collect())
            }
        }
    }
}

/// Errors from coercing raw client input into containers.
#[derive(Clone, Debug, Display, Error)]
#[non_exhaustive]
pub enum CoercionError {
    /// expected a key-value object for input type {0}
    NotAnObject(String),

    /// validation of input type {type_name} failed
    Validation {
        type_name: String,
        messages: Vec<String>,
    },

    /// deferred argument failed: {0}
    Lazy(#[from] LazyError),
}

impl From<CoercionError> for LazyError {
    fn from(error: CoercionError) -> Self {
        match error {
            CoercionError::Lazy(lazy) => lazy,
            other => LazyError::new(other.to_string()),
        }
    }
}

impl ErrorExtension for CoercionError {
    fn extension_code(&self) -> String {
        match self {
            CoercionError::NotAnObject(_) | CoercionError::Validation { .. } => "BAD_USER_INPUT",
            CoercionError::Lazy(_) => "DEFERRED_RESOLUTION_FAILED",
        }
        .to_string()
    }

    fn custom_extension_details(&self) -> Option<Object> {
        match self {
            CoercionError::Validation {
                type_name,
                messages,
            } => {
                let mut details = Object::new();
                details.insert("inputType", Value::String(type_name.as_str().into()));
                details.insert(
                    "problems",
                    Value::Array(
                        messages
                            .iter()
                            .map(|message| Value::String(message.as_str().into()))
                            .collect(),
                    ),
                );
                Some(details)
            }
            _ => None,
        }
    }
}

impl IntoGraphQLErrors for CoercionError {
    fn into_graphql_errors(self) -> Result<Vec<graphql::Error>, Self> {
        let extension_code = self.extension_code();
        let extensions = self.custom_extension_details().unwrap_or_default();
        Ok(vec![
            graphql::Error::builder()
                .message(self.to_string())
                .extensions(extensions)
                .extension_code(extension_code)
                .build(),
        ])
    }
}

/// A coerced input-object instance.
///
/// Holds the coerced argument values keyed by snake_case keyword, a
/// back-reference to the raw client mapping, and the request context it was
/// built under. The coerced mapping is this instance's own: transforms
/// applied during coercion are visible here and never mutate the raw input.
#[derive(Clone, Debug)]
pub struct InputContainer {
    ty: Arc<InputObject>,
    arguments: ArgumentMap,
    raw: Object,
    context: Option<Context>,
}

impl InputContainer {
    pub(crate) fn new(
        ty: Arc<InputObject>,
        arguments: ArgumentMap,
        raw: Object,
        context: Option<Context>,
    ) -> Self {
        Self {
            ty,
            arguments,
            raw,
            context,
        }
    }

    pub fn type_name(&self) -> &str {
        self.ty.name()
    }

    pub(crate) fn ty(&self) -> &Arc<InputObject> {
        &self.ty
    }

    /// The coerced arguments, keyed by keyword, in declaration order.
    pub fn arguments(&self) -> &ArgumentMap {
        &self.arguments
    }

    /// The raw client mapping this container was coerced from.
    pub fn raw(&self) -> &Object {
        &self.raw
    }

    pub fn context(&self) -> Option<&Context> {
        self.context.as_ref()
    }

    /// Look up a value by keyword or raw key.
    ///
    /// A key naming a declared argument, in either its keyword or declared
    /// spelling, resolves to the coerced value. Any other key falls back to
    /// the raw client mapping. Returns `None` if neither side knows the key.
    pub fn get(&self, key: &str) -> Option<ArgumentValue> {
        if let Some(keyword) = self.ty.canonical_keyword(key) {
            if let Some(value) = self.arguments.get(keyword) {
                return Some(value.clone());
            }
        }
        self.raw
            .get(key)
            .map(|value| ArgumentValue::Value(value.clone()))
    }

    /// Whether `key` resolves to a value, through either lookup channel.
    pub fn has(&self, key: &str) -> bool {
        let coerced = self
            .ty
            .canonical_keyword(key)
            .is_some_and(|keyword| self.arguments.contains_key(keyword));
        coerced || self.raw.contains_key(key)
    }

    /// Deep plain-JSON rendering of the coerced arguments.
    pub fn to_plain_value(&self) -> Value {
        let mut map = Object::new();
        for (keyword, value) in &self.arguments {
            map.insert(keyword.as_str(), value.to_plain_value());
        }
        Value::Object(map)
    }

    /// Run the type's registered validators against this instance.
    ///
    /// Returns self unchanged when every validator passes, or when the
    /// container was built without a context. Problems are tagged with the
    /// input type's name.
    pub fn prepare(self) -> Result<Self, CoercionError> {
        let Some(context) = self.context.clone() else {
            return Ok(self);
        };
        let plain = self.to_plain_value();
        let mut messages = Vec::new();
        for validator in self.ty.validators() {
            messages.extend(validator(&plain, &context, &self.arguments));
        }
        if messages.is_empty() {
            Ok(self)
        } else {
            Err(CoercionError::Validation {
                type_name: self.ty.name().to_string(),
                messages,
            })
        }
    }
}
