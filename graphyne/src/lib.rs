//! Core request-execution engine for GraphQL schemas: typed input coercion,
//! request preparation, and the seams a resolver backend plugs into.

#![warn(unreachable_pub)]

pub mod context;
pub mod error;
pub mod execution;
pub mod graphql;
pub mod input;
pub mod json_ext;
pub mod query;
pub mod schema;

pub use context::Context;
pub use execution::lazy::after_lazy;
pub use execution::lazy::Lazy;
pub use execution::lazy::LazyError;
pub use execution::lazy::MaybeLazy;
pub use execution::ExecutionRequest;
pub use execution::Executor;
pub use execution::NullExecutor;
pub use input::ArgumentMap;
pub use input::ArgumentValue;
pub use input::CoercionError;
pub use input::InputContainer;
pub use query::Document;
pub use query::Query;
pub use query::QueryError;
pub use schema::Capabilities;
pub use schema::FieldType;
pub use schema::InputObject;
pub use schema::Schema;
pub use schema::SchemaError;
pub use schema::Warden;
