//! Request preparation and orchestration.
//!
//! A [`Query`] ties one request to a schema and walks it through parsing,
//! operation selection, validation, analysis, and variable coercion before
//! handing it to the schema's executor. Each of those stages runs at most
//! once per request, however often its accessor is called.

pub mod analysis;
pub mod document;
mod variables;

use std::sync::Arc;

use derivative::Derivative;
use displaydoc::Display;
pub use document::Document;
pub use document::Fragment;
pub use document::Fragments;
pub use document::Operation;
pub use document::OperationKind;
pub use document::Selection;
use once_cell::sync::OnceCell;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map as JsonMap;
use serde_json_bytes::Value;
use thiserror::Error;
pub use variables::VariableValidationErrors;
pub use variables::Variables;

use crate::context::Context;
use crate::error::ParseErrors;
use crate::error::ValidationErrors;
use crate::execution::ExecutionRequest;
use crate::graphql;
use crate::graphql::ErrorExtension;
use crate::graphql::IntoGraphQLErrors;
use crate::graphql::Request;
use crate::graphql::Response;
use crate::json_ext::Object;
use crate::query::analysis::AnalysisContext;
use crate::query::analysis::AnalysisFinding;
use crate::query::analysis::MaxComplexity;
use crate::query::analysis::MaxDepth;
use crate::query::analysis::QueryReducer;
use crate::schema::Schema;

/// One request against a schema.
///
/// Built from either a query string or an already parsed [`Document`],
/// never both. Preparation stages are memoized on the query itself, so a
/// `Query` is meant to live for exactly one request.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Query {
    schema: Arc<Schema>,
    query_string: Option<String>,
    document: Document,
    operation_name: Option<String>,
    context: Context,
    provided_variables: Object,
    root_value: Value,
    validate: bool,
    max_depth: Option<u32>,
    max_complexity: Option<u32>,
    #[derivative(Debug = "ignore")]
    selected_operation: OnceCell<Result<Option<usize>, QueryError>>,
    #[derivative(Debug = "ignore")]
    coerced_variables: OnceCell<Result<Variables, QueryError>>,
    #[derivative(Debug = "ignore")]
    response: OnceCell<Response>,
}

#[buildstructor::buildstructor]
impl Query {
    /// Assemble a request.
    ///
    /// Exactly one of `query` and `document` must be given. A query string
    /// is parsed here, so syntax problems surface as construction errors
    /// rather than poisoning a half-built request.
    #[builder(visibility = "pub")]
    fn new(
        schema: Arc<Schema>,
        query: Option<String>,
        document: Option<Document>,
        operation_name: Option<String>,
        context: Option<Context>,
        // spelled as `JsonMap` rather than the `Object` alias, so that
        // buildstructor applies its map special-casing
        variables: JsonMap<ByteString, Value>,
        root_value: Option<Value>,
        validate: Option<bool>,
        max_depth: Option<u32>,
        max_complexity: Option<u32>,
    ) -> Result<Self, QueryError> {
        let (query_string, document) = match (query, document) {
            (Some(query), None) => {
                let document = Document::parse(&query)?;
                (Some(query), document)
            }
            (None, Some(document)) => (None, document),
            (Some(_), Some(_)) => return Err(QueryError::DocumentConflict),
            (None, None) => return Err(QueryError::DocumentRequired),
        };
        Ok(Self {
            schema,
            query_string,
            document,
            operation_name,
            context: context.unwrap_or_default(),
            provided_variables: variables,
            root_value: root_value.unwrap_or(Value::Null),
            validate: validate.unwrap_or(true),
            max_depth,
            max_complexity,
            selected_operation: OnceCell::new(),
            coerced_variables: OnceCell::new(),
            response: OnceCell::new(),
        })
    }
}

impl Query {
    /// Build a query from a wire request.
    pub fn from_request(schema: Arc<Schema>, request: Request) -> Result<Self, QueryError> {
        Query::builder()
            .schema(schema)
            .and_query(request.query)
            .and_operation_name(request.operation_name)
            .variables(request.variables)
            .build()
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The source this query was parsed from, when it came in as a string.
    pub fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    pub fn operation_name(&self) -> Option<&str> {
        self.operation_name.as_deref()
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn root_value(&self) -> &Value {
        &self.root_value
    }

    /// The operation this request executes, selected at most once.
    ///
    /// A single-operation document is selected whatever name was requested.
    /// With several operations the requested name must match one of them,
    /// and a missing or unmatched name is an error naming what the document
    /// defines. `Ok(None)` means the document has no operations at all.
    pub fn selected_operation(&self) -> Result<Option<&Operation>, QueryError> {
        let selected = self
            .selected_operation
            .get_or_init(|| self.select_operation())
            .clone()?;
        Ok(selected.and_then(|index| self.document.operations().get(index)))
    }

    fn select_operation(&self) -> Result<Option<usize>, QueryError> {
        let operations = self.document.operations();
        match operations.len() {
            0 => Ok(None),
            1 => Ok(Some(0)),
            _ => {
                let requested = self.operation_name.as_deref().filter(|name| !name.is_empty());
                let found = requested.and_then(|name| {
                    operations
                        .iter()
                        .position(|operation| operation.name() == Some(name))
                });
                match found {
                    Some(index) => Ok(Some(index)),
                    None => Err(QueryError::OperationNameMissing {
                        available: operations
                            .iter()
                            .map(|operation| {
                                operation.name().unwrap_or("<anonymous>").to_owned()
                            })
                            .collect(),
                    }),
                }
            }
        }
    }

    /// The coerced variables for the selected operation, built at most once.
    pub fn variables(&self) -> Result<&Variables, QueryError> {
        let result = self.coerced_variables.get_or_init(|| {
            let operation = match self.selected_operation() {
                Ok(Some(operation)) => operation,
                Ok(None) => return Ok(Variables::default()),
                Err(error) => return Err(error),
            };
            Variables::coerce(
                &self.schema,
                operation,
                &self.provided_variables,
                &self.context,
            )
            .map_err(QueryError::from)
        });
        match result {
            Ok(variables) => Ok(variables),
            Err(error) => Err(error.clone()),
        }
    }

    /// Execute the request, producing its response at most once.
    ///
    /// Validation failures, selection failures, and variable problems all
    /// short-circuit into an errors-only response. The executor only ever
    /// sees a fully prepared request.
    pub fn result(&self) -> &Response {
        self.response.get_or_init(|| self.execute())
    }

    fn execute(&self) -> Response {
        if self.validate {
            let mut errors = self.schema.static_validator().validate(self);
            errors.extend(self.analysis_errors());
            if !errors.is_empty() {
                return Response::from_errors(errors);
            }
        }
        let operation = match self.selected_operation() {
            Ok(Some(operation)) => operation,
            Ok(None) => {
                return Response::from_errors(vec![graphql::Error::builder()
                    .message("the request contains no operations")
                    .extension_code("GRAPHQL_VALIDATION_FAILED")
                    .build()]);
            }
            Err(error) => return error_response(error),
        };
        let variables = match self.variables() {
            Ok(variables) => variables,
            Err(error) => return error_response(error),
        };
        tracing::debug!(
            kind = %operation.kind(),
            name = operation.name().unwrap_or("<anonymous>"),
            "executing operation"
        );
        self.schema.executor().execute(ExecutionRequest::new(
            &self.schema,
            operation,
            variables,
            &self.root_value,
            &self.context,
        ))
    }

    fn analysis_errors(&self) -> Vec<graphql::Error> {
        let Ok(Some(operation)) = self.selected_operation() else {
            return Vec::new();
        };
        let analysis = AnalysisContext {
            operation,
            fragments: self.document.fragments(),
            schema: &self.schema,
        };
        let mut errors = Vec::new();
        for reducer in self.reducers() {
            if let AnalysisFinding::Error(error) = reducer.reduce(&analysis) {
                errors.push(error);
            }
        }
        errors
    }

    /// The analyses that apply to this request: the schema's own reducers,
    /// then depth and complexity limits. A limit set on the request wins
    /// over the schema's.
    fn reducers(&self) -> Vec<Arc<dyn QueryReducer>> {
        let mut reducers: Vec<Arc<dyn QueryReducer>> = self.schema.query_reducers().to_vec();
        if let Some(limit) = self.max_depth.or(self.schema.max_depth()) {
            reducers.push(Arc::new(MaxDepth { limit }));
        }
        if let Some(limit) = self.max_complexity.or(self.schema.max_complexity()) {
            reducers.push(Arc::new(MaxComplexity { limit }));
        }
        reducers
    }
}

fn error_response(error: QueryError) -> Response {
    match error.into_graphql_errors() {
        Ok(errors) => Response::from_errors(errors),
        Err(error) => {
            let extension_code = error.extension_code();
            Response::from_errors(vec![graphql::Error::builder()
                .message(error.to_string())
                .extension_code(extension_code)
                .build()])
        }
    }
}

/// Errors raised while assembling or preparing a request.
#[derive(Clone, Debug, Display, Error)]
#[non_exhaustive]
pub enum QueryError {
    /// a query string or a parsed document is required
    DocumentRequired,

    /// a query string and a parsed document are mutually exclusive
    DocumentConflict,

    /// could not parse the request: {0}
    Parse(#[from] ParseErrors),

    /// the requested operation name is missing or unknown; the document defines: {available:?}
    OperationNameMissing { available: Vec<String> },

    /// {0}
    InvalidVariables(#[from] VariableValidationErrors),
}

impl ErrorExtension for QueryError {
    fn extension_code(&self) -> String {
        match self {
            QueryError::DocumentRequired
            | QueryError::DocumentConflict
            | QueryError::OperationNameMissing { .. } => "GRAPHQL_VALIDATION_FAILED",
            QueryError::Parse(_) => "GRAPHQL_PARSING_FAILED",
            QueryError::InvalidVariables(_) => "VALIDATION_INVALID_TYPE_VARIABLE",
        }
        .to_string()
    }

    fn custom_extension_details(&self) -> Option<Object> {
        match self {
            QueryError::OperationNameMissing { available } => {
                let mut details = Object::new();
                details.insert(
                    "availableOperations",
                    Value::Array(
                        available
                            .iter()
                            .map(|name| Value::String(name.as_str().into()))
                            .collect(),
                    ),
                );
                Some(details)
            }
            _ => None,
        }
    }
}

impl IntoGraphQLErrors for QueryError {
    fn into_graphql_errors(self) -> Result<Vec<graphql::Error>, Self> {
        match self {
            QueryError::Parse(errors) => {
                errors.into_graphql_errors().map_err(QueryError::Parse)
            }
            QueryError::InvalidVariables(errors) => errors
                .into_graphql_errors()
                .map_err(QueryError::InvalidVariables),
            other => {
                let extension_code = other.extension_code();
                let extensions = other.custom_extension_details().unwrap_or_default();
                Ok(vec![graphql::Error::builder()
                    .message(other.to_string())
                    .extensions(extensions)
                    .extension_code(extension_code)
                    .build()])
            }
        }
    }
}

/// A document-level validation pass run before execution.
pub trait StaticValidator: Send + Sync {
    fn validate(&self, query: &Query) -> Vec<graphql::Error>;
}

/// Validates the parsed source against the schema's type system.
///
/// Documents assembled from parts carry no source tree and pass through
/// unchecked.
#[derive(Clone, Copy, Debug, Default)]
pub struct DocumentValidator;

impl StaticValidator for DocumentValidator {
    fn validate(&self, query: &Query) -> Vec<graphql::Error> {
        let Some(ast) = query.document().ast() else {
            return Vec::new();
        };
        match ast.to_executable_validate(query.schema().definitions()) {
            Ok(_) => Vec::new(),
            Err(invalid) => ValidationErrors::from(invalid)
                .into_graphql_errors()
                .unwrap_or_default(),
        }
    }
}
