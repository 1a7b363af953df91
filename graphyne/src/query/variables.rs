//! Coercion of request variables against an operation's declarations.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use itertools::Itertools;

use crate::context::Context;
use crate::graphql;
use crate::graphql::IntoGraphQLErrors;
use crate::input::coercion::coerce_value;
use crate::input::ArgumentValue;
use crate::input::CoercionError;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::PathElement;
use crate::query::document::Operation;
use crate::schema::Schema;

/// Coerced variable values for one operation, in declaration order.
///
/// A declared nullable variable that was neither provided nor defaulted is
/// absent here, which is distinct from one explicitly set to null.
#[derive(Clone, Debug, Default)]
pub struct Variables {
    map: IndexMap<String, ArgumentValue>,
}

impl Variables {
    pub fn get(&self, name: &str) -> Option<&ArgumentValue> {
        self.map.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgumentValue)> {
        self.map.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Validate and coerce the provided values against the operation's
    /// declarations.
    ///
    /// Every declared variable is checked even after one fails, so a request
    /// reports all of its variable problems at once. Provided values that no
    /// declaration mentions are ignored.
    pub(crate) fn coerce(
        schema: &Arc<Schema>,
        operation: &Operation,
        provided: &Object,
        context: &Context,
    ) -> Result<Variables, VariableValidationErrors> {
        let mut map = IndexMap::new();
        let mut errors = Vec::new();
        for (name, (ty, default)) in operation.variables() {
            let value = match provided.get(name.as_str()) {
                Some(value) => value.clone(),
                None => match default {
                    Some(default) => default.clone(),
                    None => {
                        if ty.is_non_null() {
                            errors.push(invalid_variable_error(name));
                        }
                        continue;
                    }
                },
            };
            if !ty.validate_input_value(&value, context, schema).is_valid() {
                errors.push(invalid_variable_error(name));
                continue;
            }
            let coerced = coerce_value(ty, value, context, schema)
                .and_then(|entry| entry.resolve().map_err(CoercionError::from));
            match coerced {
                Ok(coerced) => {
                    map.insert(name.clone(), coerced);
                }
                Err(_) => errors.push(invalid_variable_error(name)),
            }
        }
        if errors.is_empty() {
            Ok(Variables { map })
        } else {
            Err(VariableValidationErrors { errors })
        }
    }
}

fn invalid_variable_error(name: &str) -> graphql::Error {
    graphql::Error::builder()
        .message(format!("invalid type for variable: '{name}'"))
        .path(Path(vec![PathElement::Key(name.to_owned())]))
        .extension_code("VALIDATION_INVALID_TYPE_VARIABLE")
        .build()
}

/// Every variable problem found in one request.
#[derive(Clone, Debug)]
pub struct VariableValidationErrors {
    pub(crate) errors: Vec<graphql::Error>,
}

impl fmt::Display for VariableValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.errors.iter().map(|error| &error.message).join(", ")
        )
    }
}

impl std::error::Error for VariableValidationErrors {}

impl IntoGraphQLErrors for VariableValidationErrors {
    fn into_graphql_errors(self) -> Result<Vec<graphql::Error>, Self> {
        Ok(self.errors)
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;
    use test_log::test;

    use super::*;
    use crate::query::Document;

    const SDL: &str = r#"
        type Query {
            search(filter: SearchFilter): String
        }

        input SearchFilter {
            nameLike: String
            maxResults: Int = 25
        }
    "#;

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::builder()
                .sdl(SDL.to_string())
                .build()
                .expect("schema should build"),
        )
    }

    fn operation(source: &str) -> Operation {
        Document::parse(source).expect("source should parse").operations()[0].clone()
    }

    fn provided(value: serde_json_bytes::Value) -> Object {
        match value {
            serde_json_bytes::Value::Object(map) => map,
            other => panic!("expected an object, got {other:?}"),
        }
    }

    #[test]
    fn test_coerces_in_declaration_order_with_defaults() {
        let operation = operation("query Q($a: Int = 3, $b: String) { search }");
        let variables = Variables::coerce(
            &schema(),
            &operation,
            &provided(json!({"b": "x"})),
            &Context::new(),
        )
        .unwrap();
        let names: Vec<_> = variables.iter().map(|(name, _)| name.to_owned()).collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(
            variables.get("a").map(ArgumentValue::to_plain_value),
            Some(json!(3))
        );
        assert_eq!(
            variables.get("b").map(ArgumentValue::to_plain_value),
            Some(json!("x"))
        );
    }

    #[test]
    fn test_missing_required_variable_is_an_error() {
        let operation = operation("query Q($id: ID!) { search }");
        let errors = Variables::coerce(
            &schema(),
            &operation,
            &provided(json!({})),
            &Context::new(),
        )
        .unwrap_err();
        assert_eq!(errors.errors.len(), 1);
        let error = &errors.errors[0];
        assert_eq!(error.message, "invalid type for variable: 'id'");
        assert_eq!(error.path.as_ref().map(ToString::to_string), Some("/id".to_string()));
        assert_eq!(
            error.extension_code(),
            Some("VALIDATION_INVALID_TYPE_VARIABLE".to_string())
        );
    }

    #[test]
    fn test_every_problem_is_reported() {
        let operation = operation("query Q($a: Int!, $b: Boolean!) { search }");
        let errors = Variables::coerce(
            &schema(),
            &operation,
            &provided(json!({"a": "not an int"})),
            &Context::new(),
        )
        .unwrap_err();
        let messages: Vec<_> = errors.errors.iter().map(|error| error.message.clone()).collect();
        assert_eq!(
            messages,
            vec![
                "invalid type for variable: 'a'".to_string(),
                "invalid type for variable: 'b'".to_string(),
            ]
        );
    }

    #[test]
    fn test_undeclared_values_are_ignored() {
        let operation = operation("query Q { search }");
        let variables = Variables::coerce(
            &schema(),
            &operation,
            &provided(json!({"stray": 1})),
            &Context::new(),
        )
        .unwrap();
        assert!(variables.is_empty());
    }

    #[test]
    fn test_absent_nullable_variable_stays_absent() {
        let operation = operation("query Q($a: Int) { search }");
        let variables = Variables::coerce(
            &schema(),
            &operation,
            &provided(json!({})),
            &Context::new(),
        )
        .unwrap();
        assert!(!variables.contains("a"));
    }

    #[test]
    fn test_explicit_null_is_kept() {
        let operation = operation("query Q($a: Int) { search }");
        let variables = Variables::coerce(
            &schema(),
            &operation,
            &provided(json!({"a": null})),
            &Context::new(),
        )
        .unwrap();
        assert!(variables.get("a").is_some_and(|value| value.is_null()));
    }

    #[test]
    fn test_input_object_variables_become_containers() {
        let operation = operation("query Q($f: SearchFilter) { search }");
        let variables = Variables::coerce(
            &schema(),
            &operation,
            &provided(json!({"f": {"nameLike": "Luke"}})),
            &Context::new(),
        )
        .unwrap();
        let container = variables
            .get("f")
            .and_then(ArgumentValue::as_container)
            .expect("filter should coerce to a container");
        assert_eq!(container.type_name(), "SearchFilter");
        assert_eq!(
            container.get("max_results").map(|value| value.to_plain_value()),
            Some(json!(25))
        );
    }

    #[test]
    fn test_display_joins_messages() {
        let errors = VariableValidationErrors {
            errors: vec![
                graphql::Error::builder().message("first").build(),
                graphql::Error::builder().message("second").build(),
            ],
        };
        assert_eq!(errors.to_string(), "first, second");
    }
}
