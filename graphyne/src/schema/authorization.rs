//! Per-request authorization and visibility capabilities.

use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde_json_bytes::Value;

use crate::context::Context;
use crate::execution::lazy::LazyError;
use crate::execution::lazy::MaybeLazy;
use crate::graphql;
use crate::input::ArgumentMap;
use crate::input::ArgumentValue;

/// Grants or denies visibility of schema members for one request.
///
/// A warden is installed on the request [`Context`] with
/// [`Context::set_warden`](crate::Context::set_warden). Arguments it hides
/// are treated as undefined: they are not validated, not coerced, and
/// providing one is reported the same way as providing an unknown key.
pub trait Warden: Send + Sync {
    /// Whether `argument_name` on `type_name` is visible to this request.
    fn visible_argument(&self, type_name: &str, argument_name: &str, context: &Context) -> bool;
}

/// Type-level authorization: may `context` see this resolved object at all?
pub type AuthorizeType = Arc<dyn Fn(&Value, &Context) -> bool + Send + Sync>;

/// Field-level authorization, with the field's coerced arguments.
pub type AuthorizeField = Arc<dyn Fn(&Value, &ArgumentMap, &Context) -> bool + Send + Sync>;

/// Argument-level authorization for one provided argument value.
pub type AuthorizeArgument = Arc<dyn Fn(&Value, &ArgumentValue, &Context) -> bool + Send + Sync>;

/// An input-object validator. Returns one message per problem found.
pub type InputValidator = Arc<dyn Fn(&Value, &Context, &ArgumentMap) -> Vec<String> + Send + Sync>;

/// A transform applied to an argument value after coercion.
pub type PrepareFn =
    Arc<dyn Fn(ArgumentValue, &Context) -> Result<MaybeLazy<ArgumentValue>, LazyError> + Send + Sync>;

/// How an argument value is transformed after coercion.
#[derive(Clone)]
pub enum Prepare {
    /// A pure function, applied while the argument set is being coerced. The
    /// transformed value overwrites the coerced one.
    Function(PrepareFn),

    /// The name of a resolver-side method. Recorded on the argument and left
    /// for the executor to apply during resolution.
    ResolverMethod(String),
}

impl fmt::Debug for Prepare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prepare::Function(_) => f.write_str("Function(..)"),
            Prepare::ResolverMethod(name) => write!(f, "ResolverMethod({name:?})"),
        }
    }
}

/// A denial raised by an authorization callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unauthorized {
    pub kind: UnauthorizedKind,
    pub type_name: String,
    pub field_name: Option<String>,
    pub argument_name: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnauthorizedKind {
    Object,
    Field,
    Argument,
}

/// What to do about a denial.
#[derive(Clone, Debug)]
pub enum UnauthorizedAction {
    /// Substitute this value for the denied member and keep going.
    ReplaceValue(Value),

    /// Abort the request with this error.
    RaiseError(graphql::Error),
}

/// Reaction to a denial, chosen by an application hook.
pub type UnauthorizedHook = Arc<dyn Fn(&Unauthorized) -> UnauthorizedAction + Send + Sync>;

/// Registry binding schema members to their capability callbacks.
///
/// Members are addressed by coordinate: `"Type"` for a type, `"Type.field"`
/// for a field, `"Input.argument"` for an input-object argument, and
/// `"Type.field.argument"` for a field argument.
#[derive(Clone, Default)]
pub struct Capabilities {
    pub(crate) type_authorizers: HashMap<String, AuthorizeType>,
    pub(crate) field_authorizers: HashMap<String, AuthorizeField>,
    pub(crate) argument_authorizers: HashMap<String, AuthorizeArgument>,
    pub(crate) prepares: HashMap<String, Prepare>,
    pub(crate) input_validators: HashMap<String, Vec<InputValidator>>,
    pub(crate) prepare_overrides: HashSet<String>,
    pub(crate) unauthorized_object: Option<UnauthorizedHook>,
    pub(crate) unauthorized_field: Option<UnauthorizedHook>,
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type-level authorization check.
    pub fn authorize_type(
        mut self,
        type_name: impl Into<String>,
        callback: impl Fn(&Value, &Context) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.type_authorizers
            .insert(type_name.into(), Arc::new(callback));
        self
    }

    /// Register a field-level authorization check at a `"Type.field"` coordinate.
    pub fn authorize_field(
        mut self,
        coordinate: impl Into<String>,
        callback: impl Fn(&Value, &ArgumentMap, &Context) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.field_authorizers
            .insert(coordinate.into(), Arc::new(callback));
        self
    }

    /// Register an argument-level authorization check at an
    /// `"Input.argument"` or `"Type.field.argument"` coordinate.
    pub fn authorize_argument(
        mut self,
        coordinate: impl Into<String>,
        callback: impl Fn(&Value, &ArgumentValue, &Context) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.argument_authorizers
            .insert(coordinate.into(), Arc::new(callback));
        self
    }

    /// Attach a [`Prepare`] transform to the argument at `coordinate`.
    pub fn prepare_argument(mut self, coordinate: impl Into<String>, prepare: Prepare) -> Self {
        self.prepares.insert(coordinate.into(), prepare);
        self
    }

    /// Add a validator to the input object named `type_name`.
    ///
    /// Validators accumulate: each registered validator runs, and every
    /// message they return becomes a problem tagged with the type name.
    pub fn validate_input(
        mut self,
        type_name: impl Into<String>,
        validator: impl Fn(&Value, &Context, &ArgumentMap) -> Vec<String> + Send + Sync + 'static,
    ) -> Self {
        self.input_validators
            .entry(type_name.into())
            .or_default()
            .push(Arc::new(validator));
        self
    }

    /// Mark the input object named `type_name` as owning its own preparation.
    ///
    /// The per-argument authorization pass is skipped for such types. The
    /// application takes over in its custom preparation instead.
    pub fn prepare_override(mut self, type_name: impl Into<String>) -> Self {
        self.prepare_overrides.insert(type_name.into());
        self
    }

    /// Choose what happens when a type-level authorization check denies an
    /// object. Without a hook the denied object is replaced with null.
    pub fn on_unauthorized_object(
        mut self,
        hook: impl Fn(&Unauthorized) -> UnauthorizedAction + Send + Sync + 'static,
    ) -> Self {
        self.unauthorized_object = Some(Arc::new(hook));
        self
    }

    /// Choose what happens when a field or argument check denies a field.
    /// Without a hook the denied field is replaced with null.
    pub fn on_unauthorized_field(
        mut self,
        hook: impl Fn(&Unauthorized) -> UnauthorizedAction + Send + Sync + 'static,
    ) -> Self {
        self.unauthorized_field = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("type_authorizers", &self.type_authorizers.len())
            .field("field_authorizers", &self.field_authorizers.len())
            .field("argument_authorizers", &self.argument_authorizers.len())
            .field("prepares", &self.prepares.len())
            .field("input_validators", &self.input_validators.len())
            .field("prepare_overrides", &self.prepare_overrides)
            .finish()
    }
}
