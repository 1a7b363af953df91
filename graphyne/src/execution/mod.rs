//! Seam between a prepared request and a resolver backend.

pub mod lazy;

use serde_json_bytes::Value;

use crate::context::Context;
use crate::graphql::Response;
use crate::query::Operation;
use crate::query::Variables;
use crate::schema::Schema;

/// Everything a resolver backend needs to execute one operation.
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub struct ExecutionRequest<'a> {
    pub schema: &'a Schema,

    /// The operation selected from the request's document.
    pub operation: &'a Operation,

    /// Fully coerced variable values.
    pub variables: &'a Variables,

    /// The root value execution starts from.
    pub root_value: &'a Value,

    pub context: &'a Context,
}

impl<'a> ExecutionRequest<'a> {
    pub(crate) fn new(
        schema: &'a Schema,
        operation: &'a Operation,
        variables: &'a Variables,
        root_value: &'a Value,
        context: &'a Context,
    ) -> Self {
        Self {
            schema,
            operation,
            variables,
            root_value,
            context,
        }
    }
}

/// A resolver backend.
///
/// The engine hands over a fully prepared request: operation selected,
/// variables validated and coerced, static checks done. What happens from
/// there is the backend's business.
pub trait Executor: Send + Sync {
    fn execute(&self, request: ExecutionRequest<'_>) -> Response;
}

/// Executor used when a schema has no resolver backend installed.
///
/// Produces an empty `data` payload for any operation.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullExecutor;

impl Executor for NullExecutor {
    fn execute(&self, _request: ExecutionRequest<'_>) -> Response {
        Response::builder().data(Value::Null).build()
    }
}
