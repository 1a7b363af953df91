//! Input object types and their declared arguments.

use derivative::Derivative;
use heck::ToSnakeCase;
use indexmap::IndexMap;
use serde_json_bytes::Value;

use crate::context::Context;
use crate::input::ArgumentValue;
use crate::input::ValidationResult;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::PathElement;
use crate::query::document::parse_ast_value;
use crate::schema::FieldType;
use crate::schema::Schema;
use crate::schema::authorization::AuthorizeArgument;
use crate::schema::authorization::Capabilities;
use crate::schema::authorization::InputValidator;
use crate::schema::authorization::Prepare;

/// One declared argument of an input object.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct ArgumentDefinition {
    /// The declared, client-facing name.
    name: String,

    /// The snake_case keyword the coerced value is stored under.
    keyword: String,

    ty: FieldType,

    default_value: Option<Value>,

    prepare: Option<Prepare>,

    #[derivative(Debug = "ignore")]
    authorize: Option<AuthorizeArgument>,
}

impl ArgumentDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn ty(&self) -> &FieldType {
        &self.ty
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }

    /// Required arguments are non-null and have no default.
    pub fn is_required(&self) -> bool {
        self.ty.is_non_null() && self.default_value.is_none()
    }

    pub(crate) fn prepare(&self) -> Option<&Prepare> {
        self.prepare.as_ref()
    }

    pub(crate) fn authorize(&self) -> Option<&AuthorizeArgument> {
        self.authorize.as_ref()
    }
}

/// An input object type: its declared arguments and capabilities.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct InputObject {
    name: String,

    /// Declared arguments in declaration order, keyed by keyword.
    arguments: IndexMap<String, ArgumentDefinition>,

    #[derivative(Debug = "ignore")]
    validators: Vec<InputValidator>,

    /// Set when the application owns preparation for this type, replacing
    /// the per-argument authorization pass.
    prepare_override: bool,
}

impl InputObject {
    pub(crate) fn from_definition(
        definition: &apollo_compiler::schema::InputObjectType,
        capabilities: &Capabilities,
    ) -> Self {
        let name = definition.name.as_str().to_owned();
        let mut arguments = IndexMap::new();
        for (field_name, field) in &definition.fields {
            let declared = field_name.as_str().to_owned();
            let coordinate = format!("{name}.{declared}");
            let argument = ArgumentDefinition {
                keyword: declared.to_snake_case(),
                ty: FieldType::from(&*field.ty),
                default_value: field
                    .default_value
                    .as_ref()
                    .and_then(|value| parse_ast_value(value)),
                prepare: capabilities.prepares.get(&coordinate).cloned(),
                authorize: capabilities.argument_authorizers.get(&coordinate).cloned(),
                name: declared,
            };
            arguments.insert(argument.keyword.clone(), argument);
        }
        Self {
            validators: capabilities
                .input_validators
                .get(&name)
                .cloned()
                .unwrap_or_default(),
            prepare_override: capabilities.prepare_overrides.contains(&name),
            name,
            arguments,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared arguments in declaration order, keyed by keyword.
    pub fn arguments(&self) -> &IndexMap<String, ArgumentDefinition> {
        &self.arguments
    }

    pub(crate) fn validators(&self) -> &[InputValidator] {
        &self.validators
    }

    pub(crate) fn has_prepare_override(&self) -> bool {
        self.prepare_override
    }

    /// Find an argument by keyword or declared name, ignoring visibility.
    fn argument_by_key(&self, key: &str) -> Option<&ArgumentDefinition> {
        self.arguments
            .get(key)
            .or_else(|| self.arguments.values().find(|argument| argument.name == key))
    }

    /// Resolve a keyword or declared name to the canonical keyword.
    pub(crate) fn canonical_keyword(&self, key: &str) -> Option<&str> {
        self.argument_by_key(key)
            .map(|argument| argument.keyword.as_str())
    }

    /// Find an argument by keyword or declared name, if it is visible to
    /// this request.
    pub(crate) fn argument_for(&self, key: &str, context: &Context) -> Option<&ArgumentDefinition> {
        let argument = self.argument_by_key(key)?;
        match context.warden() {
            Some(warden) if !warden.visible_argument(&self.name, &argument.name, context) => None,
            _ => Some(argument),
        }
    }

    /// Arguments visible to this request, in declaration order.
    pub(crate) fn visible_arguments(&self, context: &Context) -> Vec<&ArgumentDefinition> {
        match context.warden() {
            None => self.arguments.values().collect(),
            Some(warden) => self
                .arguments
                .values()
                .filter(|argument| warden.visible_argument(&self.name, &argument.name, context))
                .collect(),
        }
    }

    /// Validate a raw, non-null value against this type's declared arguments.
    ///
    /// Problems for provided keys come first, in the client's key order, then
    /// problems for visible required arguments that were not provided, which
    /// are validated as if a null had been supplied for them.
    pub(crate) fn validate_non_null_input(
        &self,
        value: &Value,
        context: &Context,
        schema: &Schema,
    ) -> ValidationResult {
        let Some(map) = value.as_object() else {
            return ValidationResult::from_problem("expected a key-value object");
        };
        let mut result = ValidationResult::valid();
        for (key, entry) in map {
            match self.argument_for(key.as_str(), context) {
                None => result.add_problem_at(
                    Path(vec![PathElement::Key(key.as_str().to_owned())]),
                    format!("field is not defined on {}", self.name),
                ),
                Some(argument) => result.merge_at(
                    PathElement::Key(key.as_str().to_owned()),
                    argument.ty.validate_input_value(entry, context, schema),
                ),
            }
        }
        for argument in self.visible_arguments(context) {
            if !argument.is_required() {
                continue;
            }
            let provided = map.contains_key(argument.name.as_str())
                || map.contains_key(argument.keyword.as_str());
            if provided {
                continue;
            }
            result.merge_at(
                PathElement::Key(argument.name.clone()),
                argument.ty.validate_input_value(&Value::Null, context, schema),
            );
        }
        result
    }

    /// Run per-argument authorization checks over a mapping-like value.
    ///
    /// Only arguments present in the value are checked, in declaration order,
    /// stopping at the first denial. Non-mapping values are authorized
    /// without inspection.
    pub(crate) fn authorized(
        &self,
        object: &Value,
        value: &ArgumentValue,
        context: &Context,
    ) -> bool {
        match value {
            ArgumentValue::Object(container) => {
                for argument in self.arguments.values() {
                    let Some(entry) = container.arguments().get(&argument.keyword) else {
                        continue;
                    };
                    if let Some(authorize) = argument.authorize() {
                        if !authorize(object, entry, context) {
                            return false;
                        }
                    }
                }
                true
            }
            ArgumentValue::Value(Value::Object(map)) => {
                for argument in self.arguments.values() {
                    let entry = map
                        .get(argument.name.as_str())
                        .or_else(|| map.get(argument.keyword.as_str()));
                    let Some(entry) = entry else {
                        continue;
                    };
                    if let Some(authorize) = argument.authorize() {
                        let wrapped = ArgumentValue::Value(entry.clone());
                        if !authorize(object, &wrapped, context) {
                            return false;
                        }
                    }
                }
                true
            }
            _ => true,
        }
    }

    /// Convert a keyword-keyed mapping back to its declared, outbound layout.
    ///
    /// Explicit nulls pass through. Keys with no declared counterpart are
    /// dropped.
    pub(crate) fn coerce_result(&self, value: &Value, schema: &Schema) -> Value {
        let Some(map) = value.as_object() else {
            return value.clone();
        };
        let mut out = Object::new();
        for (key, entry) in map {
            let Some(argument) = self.argument_by_key(key.as_str()) else {
                continue;
            };
            out.insert(argument.name.as_str(), argument.ty.coerce_result(entry, schema));
        }
        Value::Object(out)
    }
}
