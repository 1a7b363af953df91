//! Typed schema: parsed SDL, the input-object registry, and the capability
//! callbacks bound to schema members.

pub mod authorization;
mod field_type;
mod input_object;

use std::fmt;
use std::sync::Arc;

use apollo_compiler::schema::ExtendedType;
use apollo_compiler::validation::Valid;
pub use authorization::Capabilities;
pub use authorization::Warden;
use displaydoc::Display;
pub use field_type::FieldType;
use heck::ToLowerCamelCase;
use indexmap::IndexMap;
pub use input_object::ArgumentDefinition;
pub use input_object::InputObject;
use serde_json_bytes::Value;
use thiserror::Error;

use crate::context::Context;
use crate::error::ParseErrors;
use crate::error::ValidationErrors;
use crate::execution::Executor;
use crate::execution::NullExecutor;
use crate::graphql;
use crate::input::ArgumentMap;
use crate::input::ArgumentValue;
use crate::query::DocumentValidator;
use crate::query::StaticValidator;
use crate::query::analysis::QueryReducer;
use crate::query::document::RECURSION_LIMIT;
use crate::schema::authorization::Unauthorized;
use crate::schema::authorization::UnauthorizedAction;
use crate::schema::authorization::UnauthorizedKind;

/// A parsed and validated schema, ready to execute requests against.
///
/// Holds the type system, the registry of input objects with their coercion
/// and authorization callbacks, and the analysis limits applied to incoming
/// documents.
pub struct Schema {
    raw_sdl: Arc<String>,
    definitions: Valid<apollo_compiler::Schema>,
    input_objects: IndexMap<String, Arc<InputObject>>,
    capabilities: Capabilities,
    max_depth: Option<u32>,
    max_complexity: Option<u32>,
    query_reducers: Vec<Arc<dyn QueryReducer>>,
    static_validator: Arc<dyn StaticValidator>,
    executor: Arc<dyn Executor>,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("raw_sdl", &self.raw_sdl)
            .field(
                "input_objects",
                &self.input_objects.keys().collect::<Vec<_>>(),
            )
            .field("max_depth", &self.max_depth)
            .field("max_complexity", &self.max_complexity)
            .field("query_reducers", &self.query_reducers.len())
            .finish_non_exhaustive()
    }
}

#[buildstructor::buildstructor]
impl Schema {
    /// Parse and validate an SDL document and wire in the application's
    /// capabilities.
    #[builder(visibility = "pub")]
    fn new(
        sdl: String,
        capabilities: Option<Capabilities>,
        max_depth: Option<u32>,
        max_complexity: Option<u32>,
        reducers: Vec<Arc<dyn QueryReducer>>,
        static_validator: Option<Arc<dyn StaticValidator>>,
        executor: Option<Arc<dyn Executor>>,
    ) -> Result<Self, SchemaError> {
        let ast = apollo_compiler::parser::Parser::new()
            .recursion_limit(RECURSION_LIMIT)
            .parse_ast(&sdl, "schema.graphql")
            .map_err(ParseErrors::from)?;
        let definitions = ast.to_schema_validate().map_err(ValidationErrors::from)?;
        let capabilities = capabilities.unwrap_or_default();
        let mut input_objects = IndexMap::new();
        for (name, definition) in &definitions.types {
            if let ExtendedType::InputObject(definition) = definition {
                input_objects.insert(
                    name.as_str().to_owned(),
                    Arc::new(InputObject::from_definition(definition, &capabilities)),
                );
            }
        }
        Ok(Self {
            raw_sdl: Arc::new(sdl),
            definitions,
            input_objects,
            capabilities,
            max_depth,
            max_complexity,
            query_reducers: reducers,
            static_validator: static_validator.unwrap_or_else(|| Arc::new(DocumentValidator)),
            executor: executor.unwrap_or_else(|| Arc::new(NullExecutor)),
        })
    }
}

impl Schema {
    /// The SDL text this schema was built from.
    pub fn raw_sdl(&self) -> &Arc<String> {
        &self.raw_sdl
    }

    /// The validated type system.
    pub fn definitions(&self) -> &Valid<apollo_compiler::Schema> {
        &self.definitions
    }

    /// Look up a registered input object type by name.
    pub fn input_object(&self, name: &str) -> Option<&Arc<InputObject>> {
        self.input_objects.get(name)
    }

    pub(crate) fn max_depth(&self) -> Option<u32> {
        self.max_depth
    }

    pub(crate) fn max_complexity(&self) -> Option<u32> {
        self.max_complexity
    }

    pub(crate) fn query_reducers(&self) -> &[Arc<dyn QueryReducer>] {
        &self.query_reducers
    }

    pub(crate) fn static_validator(&self) -> &Arc<dyn StaticValidator> {
        &self.static_validator
    }

    pub(crate) fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    /// Run the type-level authorization check for an object value.
    ///
    /// `Ok(None)` means the value may be used as is, either because the check
    /// passed or because the type has none. `Ok(Some(replacement))` means the
    /// check failed and the unauthorized-object hook substituted a value. An
    /// error aborts the surrounding operation.
    pub fn authorized_object(
        &self,
        type_name: &str,
        object: &Value,
        context: &Context,
    ) -> Result<Option<Value>, graphql::Error> {
        let Some(authorize) = self.capabilities.type_authorizers.get(type_name) else {
            return Ok(None);
        };
        if authorize(object, context) {
            return Ok(None);
        }
        let unauthorized = Unauthorized {
            kind: UnauthorizedKind::Object,
            type_name: type_name.to_string(),
            field_name: None,
            argument_name: None,
        };
        let action = match &self.capabilities.unauthorized_object {
            Some(hook) => hook(&unauthorized),
            None => UnauthorizedAction::ReplaceValue(Value::Null),
        };
        match action {
            UnauthorizedAction::ReplaceValue(value) => Ok(Some(value)),
            UnauthorizedAction::RaiseError(error) => Err(error),
        }
    }

    /// Run field-level authorization: the field's own check, then the checks
    /// of every argument present on this call, including the per-argument
    /// checks of input-object values. A denied argument denies the whole
    /// field.
    ///
    /// The return contract is the same as [`authorized_object`], with the
    /// unauthorized-field hook choosing the reaction. Without one, the
    /// unauthorized-object hook is consulted instead.
    ///
    /// [`authorized_object`]: Schema::authorized_object
    pub fn authorized_field(
        &self,
        type_name: &str,
        field_name: &str,
        object: &Value,
        arguments: &ArgumentMap,
        context: &Context,
    ) -> Result<Option<Value>, graphql::Error> {
        let coordinate = format!("{type_name}.{field_name}");
        if let Some(authorize) = self.capabilities.field_authorizers.get(&coordinate) {
            if !authorize(object, arguments, context) {
                return self.deny_field(type_name, field_name, None);
            }
        }
        if let Some(argument_name) = self.denied_argument(&coordinate, object, arguments, context)
        {
            return self.deny_field(type_name, field_name, Some(argument_name));
        }
        Ok(None)
    }

    /// The first argument in `arguments` that fails authorization.
    fn denied_argument(
        &self,
        coordinate: &str,
        object: &Value,
        arguments: &ArgumentMap,
        context: &Context,
    ) -> Option<String> {
        for (keyword, value) in arguments {
            let authorize = self
                .capabilities
                .argument_authorizers
                .get(&format!("{coordinate}.{keyword}"))
                .or_else(|| {
                    self.capabilities
                        .argument_authorizers
                        .get(&format!("{coordinate}.{}", keyword.to_lower_camel_case()))
                });
            if let Some(authorize) = authorize {
                if !authorize(object, value, context) {
                    return Some(keyword.clone());
                }
            }
            if !self.argument_value_authorized(object, value, context) {
                return Some(keyword.clone());
            }
        }
        None
    }

    /// Authorization of one argument value, descending through lists and
    /// nested containers. A container type with a prepare override skips its
    /// own per-argument checks.
    fn argument_value_authorized(
        &self,
        object: &Value,
        value: &ArgumentValue,
        context: &Context,
    ) -> bool {
        match value {
            ArgumentValue::Object(container) => {
                let ty = container.ty();
                if !ty.has_prepare_override() && !ty.authorized(object, value, context) {
                    return false;
                }
                container
                    .arguments()
                    .values()
                    .all(|nested| self.argument_value_authorized(object, nested, context))
            }
            ArgumentValue::List(items) => items
                .iter()
                .all(|item| self.argument_value_authorized(object, item, context)),
            ArgumentValue::Value(_) => true,
        }
    }

    fn deny_field(
        &self,
        type_name: &str,
        field_name: &str,
        argument_name: Option<String>,
    ) -> Result<Option<Value>, graphql::Error> {
        let unauthorized = Unauthorized {
            kind: if argument_name.is_some() {
                UnauthorizedKind::Argument
            } else {
                UnauthorizedKind::Field
            },
            type_name: type_name.to_string(),
            field_name: Some(field_name.to_string()),
            argument_name,
        };
        let action = match (
            &self.capabilities.unauthorized_field,
            &self.capabilities.unauthorized_object,
        ) {
            (Some(hook), _) => hook(&unauthorized),
            (None, Some(hook)) => hook(&unauthorized),
            (None, None) => UnauthorizedAction::ReplaceValue(Value::Null),
        };
        match action {
            UnauthorizedAction::ReplaceValue(value) => Ok(Some(value)),
            UnauthorizedAction::RaiseError(error) => Err(error),
        }
    }
}

/// Errors raised while building a schema.
#[derive(Debug, Display, Error)]
#[non_exhaustive]
pub enum SchemaError {
    /// could not parse schema: {0}
    Parse(#[from] ParseErrors),

    /// invalid schema: {0}
    Validate(#[from] ValidationErrors),
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use serde_json_bytes::json;
    use test_log::test;

    use super::*;
    use crate::execution::lazy::MaybeLazy;

    const SDL: &str = r#"
        type Query {
            hero(episode: Episode): Character
            search(filter: SearchFilter): String
        }

        type Character {
            name: String
            secret: String
        }

        enum Episode {
            NEWHOPE
            EMPIRE
            JEDI
        }

        scalar Timestamp

        input SearchFilter {
            nameLike: String
            maxResults: Int = 25
        }
    "#;

    fn build_schema(capabilities: Capabilities) -> Arc<Schema> {
        Arc::new(
            Schema::builder()
                .sdl(SDL)
                .capabilities(capabilities)
                .build()
                .expect("fixture schema is valid"),
        )
    }

    #[test]
    fn test_registers_input_objects() {
        let schema = build_schema(Capabilities::new());
        let filter = schema.input_object("SearchFilter").unwrap();
        assert_eq!(filter.name(), "SearchFilter");
        let argument = filter.arguments().get("max_results").unwrap();
        assert_eq!(argument.name(), "maxResults");
        assert_eq!(argument.keyword(), "max_results");
        assert_eq!(argument.ty(), &FieldType::Int);
        assert_eq!(argument.default_value(), Some(&json!(25)));
        assert!(!argument.is_required());

        assert!(schema.input_object("Character").is_none());
        assert!(schema.input_object("Episode").is_none());
    }

    #[test]
    fn test_scalar_input_validation() {
        let schema = build_schema(Capabilities::new());
        let context = Context::default();
        let valid =
            |ty: &FieldType, value: Value| ty.validate_input_value(&value, &context, &schema).is_valid();

        assert!(valid(&FieldType::Int, json!(7)));
        assert!(valid(&FieldType::Int, json!(null)));
        assert!(!valid(&FieldType::Int, json!(2_147_483_648_i64)));
        assert!(!valid(&FieldType::Int, json!("7")));

        assert!(valid(&FieldType::Float, json!(1.5)));
        assert!(valid(&FieldType::Float, json!(2)));
        assert!(!valid(&FieldType::Float, json!("wat")));

        assert!(valid(&FieldType::Id, json!("user:1")));
        assert!(valid(&FieldType::Id, json!(42)));
        assert!(!valid(&FieldType::Id, json!(1.5)));

        assert!(valid(&FieldType::Boolean, json!(false)));
        assert!(!valid(&FieldType::Boolean, json!(0)));

        assert!(valid(&FieldType::String, json!("hi")));
        assert!(!valid(&FieldType::String, json!(1)));
    }

    #[test]
    fn test_enum_and_custom_scalar_validation() {
        let schema = build_schema(Capabilities::new());
        let context = Context::default();

        let episode = FieldType::Named("Episode".to_string());
        assert!(episode
            .validate_input_value(&json!("JEDI"), &context, &schema)
            .is_valid());
        let result = episode.validate_input_value(&json!("SITH"), &context, &schema);
        assert_eq!(
            result.problems()[0].message,
            "could not coerce value to enum Episode"
        );

        let timestamp = FieldType::Named("Timestamp".to_string());
        assert!(timestamp
            .validate_input_value(&json!({"seconds": 1}), &context, &schema)
            .is_valid());

        let character = FieldType::Named("Character".to_string());
        let result = character.validate_input_value(&json!({}), &context, &schema);
        assert_eq!(
            result.problems()[0].message,
            "Character is not an input type"
        );
    }

    #[test]
    fn test_list_validation_reports_element_paths() {
        let schema = build_schema(Capabilities::new());
        let context = Context::default();
        let ints = FieldType::List(Box::new(FieldType::Int));

        let result = ints.validate_input_value(&json!([1, "x", 3]), &context, &schema);
        let problem = &result.problems()[0];
        assert_eq!(problem.path.to_string(), "/1");
        assert_eq!(problem.message, "could not coerce value to Int");

        // a bare value validates as a single element list
        assert!(ints.validate_input_value(&json!(3), &context, &schema).is_valid());
    }

    #[test]
    fn test_nonnull_validation() {
        let schema = build_schema(Capabilities::new());
        let context = Context::default();
        let required = FieldType::NonNull(Box::new(FieldType::Int));
        let result = required.validate_input_value(&json!(null), &context, &schema);
        assert_eq!(result.problems()[0].message, "Expected value to not be null");
    }

    #[test]
    fn test_authorized_object_defaults_to_null_replacement() {
        let capabilities = Capabilities::new().authorize_type("Character", |object, _context| {
            object
                .as_object()
                .and_then(|map| map.get("secret"))
                .is_none()
        });
        let schema = build_schema(capabilities);
        let context = Context::default();

        let allowed = schema
            .authorized_object("Character", &json!({"name": "Rey"}), &context)
            .unwrap();
        assert!(allowed.is_none());

        let replaced = schema
            .authorized_object("Character", &json!({"name": "Rey", "secret": "s"}), &context)
            .unwrap();
        assert_eq!(replaced, Some(Value::Null));

        // types without a check are authorized
        let unchecked = schema
            .authorized_object("Ghost", &json!({}), &context)
            .unwrap();
        assert!(unchecked.is_none());
    }

    #[test]
    fn test_unauthorized_object_hook_can_raise() {
        let capabilities = Capabilities::new()
            .authorize_type("Character", |_object, _context| false)
            .on_unauthorized_object(|unauthorized| {
                UnauthorizedAction::RaiseError(
                    graphql::Error::builder()
                        .message(format!("access to {} denied", unauthorized.type_name))
                        .extension_code("FORBIDDEN")
                        .build(),
                )
            });
        let schema = build_schema(capabilities);
        let error = schema
            .authorized_object("Character", &json!({}), &Context::default())
            .unwrap_err();
        assert_eq!(error.message, "access to Character denied");
        assert_eq!(error.extension_code(), Some("FORBIDDEN".to_string()));
    }

    #[test]
    fn test_field_denial_reports_the_field() {
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let capture = Arc::clone(&seen);
        let capabilities = Capabilities::new()
            .authorize_field("Character.secret", |_object, _arguments, _context| false)
            .on_unauthorized_field(move |unauthorized| {
                *capture.lock() = Some(unauthorized.clone());
                UnauthorizedAction::ReplaceValue(Value::Null)
            });
        let schema = build_schema(capabilities);
        let outcome = schema
            .authorized_field(
                "Character",
                "secret",
                &json!({}),
                &ArgumentMap::new(),
                &Context::default(),
            )
            .unwrap();
        assert_eq!(outcome, Some(Value::Null));

        let unauthorized = seen.lock().clone().unwrap();
        assert_eq!(unauthorized.kind, UnauthorizedKind::Field);
        assert_eq!(unauthorized.type_name, "Character");
        assert_eq!(unauthorized.field_name.as_deref(), Some("secret"));
        assert_eq!(unauthorized.argument_name, None);
    }

    #[test]
    fn test_argument_denial_denies_the_field() {
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let capture = Arc::clone(&seen);
        let capabilities = Capabilities::new()
            .authorize_argument("Query.search.filter", |_object, _value, _context| false)
            .on_unauthorized_field(move |unauthorized| {
                *capture.lock() = Some(unauthorized.clone());
                UnauthorizedAction::ReplaceValue(Value::Null)
            });
        let schema = build_schema(capabilities);
        let mut arguments = ArgumentMap::new();
        arguments.insert(
            "filter".to_string(),
            ArgumentValue::Value(json!({"nameLike": "x"})),
        );
        let outcome = schema
            .authorized_field(
                "Query",
                "search",
                &Value::Null,
                &arguments,
                &Context::default(),
            )
            .unwrap();
        assert_eq!(outcome, Some(Value::Null));

        let unauthorized = seen.lock().clone().unwrap();
        assert_eq!(unauthorized.kind, UnauthorizedKind::Argument);
        assert_eq!(unauthorized.field_name.as_deref(), Some("search"));
        assert_eq!(unauthorized.argument_name.as_deref(), Some("filter"));
    }

    #[test]
    fn test_container_arguments_run_their_own_checks() {
        let denying = Capabilities::new().authorize_argument(
            "SearchFilter.nameLike",
            |_object, _value, _context| false,
        );
        let schema = build_schema(denying);
        let context = Context::default();
        let filter = schema.input_object("SearchFilter").unwrap();
        let container = filter
            .coerce_input(
                MaybeLazy::Ready(json!({"nameLike": "x"})),
                &context,
                &schema,
            )
            .unwrap()
            .resolve()
            .unwrap()
            .unwrap();
        let mut arguments = ArgumentMap::new();
        arguments.insert("filter".to_string(), ArgumentValue::Object(container));
        let outcome = schema
            .authorized_field("Query", "search", &Value::Null, &arguments, &context)
            .unwrap();
        assert_eq!(outcome, Some(Value::Null));
    }

    #[test]
    fn test_argument_checks_stop_at_the_first_denial() {
        let name_like_calls = Arc::new(AtomicUsize::new(0));
        let max_results_calls = Arc::new(AtomicUsize::new(0));
        let capabilities = Capabilities::new()
            .authorize_argument("SearchFilter.nameLike", {
                let counted = Arc::clone(&name_like_calls);
                move |_object, _value, _context| {
                    counted.fetch_add(1, Ordering::SeqCst);
                    false
                }
            })
            .authorize_argument("SearchFilter.maxResults", {
                let counted = Arc::clone(&max_results_calls);
                move |_object, _value, _context| {
                    counted.fetch_add(1, Ordering::SeqCst);
                    true
                }
            });
        let schema = build_schema(capabilities);
        let context = Context::default();
        let filter = schema.input_object("SearchFilter").unwrap();
        let container = filter
            .coerce_input(
                MaybeLazy::Ready(json!({"nameLike": "x", "maxResults": 3})),
                &context,
                &schema,
            )
            .unwrap()
            .resolve()
            .unwrap()
            .unwrap();
        assert!(!filter.authorized(&Value::Null, &ArgumentValue::Object(container), &context));
        assert_eq!(name_like_calls.load(Ordering::SeqCst), 1);
        assert_eq!(max_results_calls.load(Ordering::SeqCst), 0);

        // non-mapping values are authorized without inspection
        assert!(filter.authorized(&Value::Null, &ArgumentValue::Value(json!([1, 2])), &context));
        assert_eq!(name_like_calls.load(Ordering::SeqCst), 1);
        assert_eq!(max_results_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_prepare_override_bypasses_container_checks() {
        let capabilities = Capabilities::new()
            .authorize_argument("SearchFilter.nameLike", |_object, _value, _context| false)
            .prepare_override("SearchFilter");
        let schema = build_schema(capabilities);
        let context = Context::default();
        let filter = schema.input_object("SearchFilter").unwrap();
        let container = filter
            .coerce_input(
                MaybeLazy::Ready(json!({"nameLike": "x"})),
                &context,
                &schema,
            )
            .unwrap()
            .resolve()
            .unwrap()
            .unwrap();
        let mut arguments = ArgumentMap::new();
        arguments.insert("filter".to_string(), ArgumentValue::Object(container));
        let outcome = schema
            .authorized_field("Query", "search", &Value::Null, &arguments, &context)
            .unwrap();
        assert!(outcome.is_none());
    }

    #[test]
    fn test_invalid_sdl_reports_parse_errors() {
        let error = Schema::builder().sdl("type Query {").build().unwrap_err();
        assert!(matches!(error, SchemaError::Parse(_)));
    }

    #[test]
    fn test_unknown_type_reference_reports_validation_errors() {
        let error = Schema::builder()
            .sdl("type Query { hero: Missing }")
            .build()
            .unwrap_err();
        assert!(matches!(error, SchemaError::Validate(_)));
    }
}
