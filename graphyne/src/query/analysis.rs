//! Static analysis over parsed operations.
//!
//! Analyses run after source-level validation and before execution. Each
//! [`QueryReducer`] inspects the selected operation and either computes a
//! value or rejects the request with an error.

use std::collections::HashMap;

use serde_json_bytes::Value;

use crate::graphql;
use crate::query::document::Fragments;
use crate::query::document::Operation;
use crate::query::document::Selection;
use crate::schema::Schema;

/// What one analysis pass produced for an operation.
#[derive(Clone, Debug)]
pub enum AnalysisFinding {
    /// The operation is rejected with this error.
    Error(graphql::Error),

    /// The analysis computed a value. Values are not surfaced in responses.
    Value(Value),
}

/// A per-operation static analysis.
pub trait QueryReducer: Send + Sync {
    fn reduce(&self, analysis: &AnalysisContext<'_>) -> AnalysisFinding;
}

/// Everything an analysis pass can look at.
#[derive(Clone, Copy, Debug)]
pub struct AnalysisContext<'a> {
    pub operation: &'a Operation,
    pub fragments: &'a Fragments,
    pub schema: &'a Schema,
}

/// Depth and complexity of one operation, spread fragments included.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OperationMetrics {
    /// Deepest field nesting. Fragments add no depth of their own.
    pub depth: u32,
    /// Count of field selections, nested fields included.
    pub complexity: u32,
}

enum Computation<T> {
    InProgress,
    Done(T),
}

/// Measure an operation, following fragment spreads.
pub fn operation_metrics(operation: &Operation, fragments: &Fragments) -> OperationMetrics {
    let mut cache = HashMap::new();
    measure_selection_set(operation.selection_set(), fragments, &mut cache)
}

fn measure_selection_set(
    selection_set: &[Selection],
    fragments: &Fragments,
    cache: &mut HashMap<String, Computation<OperationMetrics>>,
) -> OperationMetrics {
    let mut metrics = OperationMetrics::default();
    for selection in selection_set {
        let child = match selection {
            Selection::Field { selection_set, .. } => {
                let nested = measure_selection_set(selection_set, fragments, cache);
                OperationMetrics {
                    depth: 1 + nested.depth,
                    complexity: 1 + nested.complexity,
                }
            }
            Selection::InlineFragment { selection_set, .. } => {
                measure_selection_set(selection_set, fragments, cache)
            }
            Selection::FragmentSpread { name } => measure_fragment(name, fragments, cache),
        };
        metrics.depth = metrics.depth.max(child.depth);
        metrics.complexity += child.complexity;
    }
    metrics
}

fn measure_fragment(
    name: &str,
    fragments: &Fragments,
    cache: &mut HashMap<String, Computation<OperationMetrics>>,
) -> OperationMetrics {
    match cache.get(name) {
        // a cyclic spread contributes nothing further
        Some(Computation::InProgress) => return OperationMetrics::default(),
        Some(Computation::Done(metrics)) => return *metrics,
        None => {}
    }
    let Some(fragment) = fragments.get(name) else {
        return OperationMetrics::default();
    };
    cache.insert(name.to_owned(), Computation::InProgress);
    let metrics = measure_selection_set(&fragment.selection_set, fragments, cache);
    cache.insert(name.to_owned(), Computation::Done(metrics));
    metrics
}

/// Rejects operations nested deeper than a limit.
#[derive(Clone, Copy, Debug)]
pub struct MaxDepth {
    pub limit: u32,
}

impl QueryReducer for MaxDepth {
    fn reduce(&self, analysis: &AnalysisContext<'_>) -> AnalysisFinding {
        let metrics = operation_metrics(analysis.operation, analysis.fragments);
        if metrics.depth > self.limit {
            tracing::warn!(
                depth = metrics.depth,
                limit = self.limit,
                "operation rejected for depth"
            );
            return AnalysisFinding::Error(
                graphql::Error::builder()
                    .message(format!(
                        "Query has depth of {}, which exceeds max depth of {}",
                        metrics.depth, self.limit
                    ))
                    .extension_code("MAX_DEPTH_LIMIT")
                    .build(),
            );
        }
        AnalysisFinding::Value(Value::from(u64::from(metrics.depth)))
    }
}

/// Rejects operations selecting more fields than a limit.
#[derive(Clone, Copy, Debug)]
pub struct MaxComplexity {
    pub limit: u32,
}

impl QueryReducer for MaxComplexity {
    fn reduce(&self, analysis: &AnalysisContext<'_>) -> AnalysisFinding {
        let metrics = operation_metrics(analysis.operation, analysis.fragments);
        if metrics.complexity > self.limit {
            tracing::warn!(
                complexity = metrics.complexity,
                limit = self.limit,
                "operation rejected for complexity"
            );
            return AnalysisFinding::Error(
                graphql::Error::builder()
                    .message(format!(
                        "Query has complexity of {}, which exceeds max complexity of {}",
                        metrics.complexity, self.limit
                    ))
                    .extension_code("MAX_COMPLEXITY_LIMIT")
                    .build(),
            );
        }
        AnalysisFinding::Value(Value::from(u64::from(metrics.complexity)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use test_log::test;

    use super::*;
    use crate::query::Document;

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::builder()
                .sdl("type Query { placeholder: String }".to_string())
                .build()
                .expect("schema should build"),
        )
    }

    fn parse(source: &str) -> Document {
        Document::parse(source).expect("source should parse")
    }

    fn metrics(source: &str) -> OperationMetrics {
        let document = parse(source);
        operation_metrics(&document.operations()[0], document.fragments())
    }

    #[test]
    fn test_counts_depth_and_complexity() {
        assert_eq!(
            metrics("{ a { b { c } } d }"),
            OperationMetrics {
                depth: 3,
                complexity: 4
            }
        );
    }

    #[test]
    fn test_inline_fragments_add_no_depth() {
        assert_eq!(
            metrics("{ ... on Droid { serial } }"),
            OperationMetrics {
                depth: 1,
                complexity: 1
            }
        );
    }

    #[test]
    fn test_spread_fragments_count_their_fields() {
        assert_eq!(
            metrics("{ ...f } fragment f on Query { a { b } c }"),
            OperationMetrics {
                depth: 2,
                complexity: 3
            }
        );
    }

    #[test]
    fn test_cyclic_fragments_terminate() {
        let measured = metrics(
            r#"
            { ...f }
            fragment f on Query { a ...g }
            fragment g on Query { b ...f }
            "#,
        );
        assert_eq!(
            measured,
            OperationMetrics {
                depth: 1,
                complexity: 2
            }
        );
    }

    #[test]
    fn test_unknown_spread_counts_as_nothing() {
        assert_eq!(
            metrics("{ ...missing a }"),
            OperationMetrics {
                depth: 1,
                complexity: 1
            }
        );
    }

    #[test]
    fn test_max_depth_rejects_deep_operations() {
        let schema = schema();
        let document = parse("{ a { b { c } } }");
        let analysis = AnalysisContext {
            operation: &document.operations()[0],
            fragments: document.fragments(),
            schema: &schema,
        };
        let finding = MaxDepth { limit: 2 }.reduce(&analysis);
        match finding {
            AnalysisFinding::Error(error) => {
                assert_eq!(
                    error.message,
                    "Query has depth of 3, which exceeds max depth of 2"
                );
            }
            other => panic!("expected an error, got {other:?}"),
        }
    }

    #[test]
    fn test_max_complexity_allows_within_limit() {
        let schema = schema();
        let document = parse("{ a b }");
        let analysis = AnalysisContext {
            operation: &document.operations()[0],
            fragments: document.fragments(),
            schema: &schema,
        };
        let finding = MaxComplexity { limit: 2 }.reduce(&analysis);
        match finding {
            AnalysisFinding::Value(value) => assert_eq!(value, Value::from(2u64)),
            other => panic!("expected a value, got {other:?}"),
        }
    }
}
