//! Parsed request documents and the pieces they are made of.

use std::collections::HashMap;

use apollo_compiler::ast;
use indexmap::IndexMap;
use serde_json_bytes::ByteString;
use serde_json_bytes::Value;

use crate::error::ParseErrors;
use crate::json_ext::Object;
use crate::schema::FieldType;

/// Maximum nesting the parser accepts before giving up on a source.
pub(crate) const RECURSION_LIMIT: usize = 4_096;

/// A parsed request document: its operations and named fragments.
#[derive(Clone, Debug)]
pub struct Document {
    /// Present when this document was parsed from source.
    ast: Option<ast::Document>,
    operations: Vec<Operation>,
    fragments: Fragments,
}

impl Document {
    /// Parse a query source.
    pub fn parse(source: &str) -> Result<Self, ParseErrors> {
        let mut parser = apollo_compiler::parser::Parser::new().recursion_limit(RECURSION_LIMIT);
        let result = parser.parse_ast(source, "query.graphql");
        let recursion_limit = parser.recursion_reached();
        tracing::trace!(?recursion_limit, "recursion limit data");
        let ast = result.map_err(ParseErrors::from)?;
        Ok(Self::from_ast(ast))
    }

    /// Build a document from an already parsed tree.
    pub fn from_ast(ast: ast::Document) -> Self {
        let operations = ast
            .definitions
            .iter()
            .filter_map(|definition| match definition {
                ast::Definition::OperationDefinition(operation) => {
                    Some(Operation::from_ast(operation))
                }
                _ => None,
            })
            .collect();
        let fragments = Fragments::from_ast(&ast);
        Self {
            ast: Some(ast),
            operations,
            fragments,
        }
    }

    /// Assemble a document from already built parts.
    ///
    /// Documents built this way carry no source tree, so source-level
    /// validation is skipped for them.
    pub fn from_parts(operations: Vec<Operation>, fragments: Fragments) -> Self {
        Self {
            ast: None,
            operations,
            fragments,
        }
    }

    pub(crate) fn ast(&self) -> Option<&ast::Document> {
        self.ast.as_ref()
    }

    /// The document's operations, in source order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn fragments(&self) -> &Fragments {
        &self.fragments
    }
}

/// One executable operation of a document.
#[derive(Clone, Debug)]
pub struct Operation {
    name: Option<String>,
    kind: OperationKind,
    selection_set: Vec<Selection>,
    variables: IndexMap<String, (FieldType, Option<Value>)>,
}

impl Operation {
    fn from_ast(operation: &ast::OperationDefinition) -> Self {
        let name = operation.name.as_ref().map(|name| name.as_str().to_owned());
        let kind = OperationKind::from(operation.operation_type);
        let selection_set = operation
            .selection_set
            .iter()
            .map(Selection::from_ast)
            .collect();
        let variables = operation
            .variables
            .iter()
            .map(|definition| {
                (
                    definition.name.as_str().to_owned(),
                    (
                        FieldType::from(&*definition.ty),
                        definition
                            .default_value
                            .as_ref()
                            .and_then(|value| parse_ast_value(value)),
                    ),
                )
            })
            .collect();
        Self {
            name,
            kind,
            selection_set,
            variables,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn selection_set(&self) -> &[Selection] {
        &self.selection_set
    }

    /// Declared variables in declaration order: type and default value.
    pub fn variables(&self) -> &IndexMap<String, (FieldType, Option<Value>)> {
        &self.variables
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Query => write!(f, "query"),
            OperationKind::Mutation => write!(f, "mutation"),
            OperationKind::Subscription => write!(f, "subscription"),
        }
    }
}

impl OperationKind {
    /// The name of the root type this kind of operation executes against.
    pub fn default_type_name(&self) -> &'static str {
        match self {
            OperationKind::Query => "Query",
            OperationKind::Mutation => "Mutation",
            OperationKind::Subscription => "Subscription",
        }
    }
}

impl From<ast::OperationType> for OperationKind {
    fn from(operation_type: ast::OperationType) -> Self {
        match operation_type {
            ast::OperationType::Query => OperationKind::Query,
            ast::OperationType::Mutation => OperationKind::Mutation,
            ast::OperationType::Subscription => OperationKind::Subscription,
        }
    }
}

/// One node of a selection set, as parsed.
#[derive(Clone, Debug)]
pub enum Selection {
    Field {
        name: String,
        alias: Option<String>,
        selection_set: Vec<Selection>,
    },
    InlineFragment {
        type_condition: Option<String>,
        selection_set: Vec<Selection>,
    },
    FragmentSpread {
        name: String,
    },
}

impl Selection {
    fn from_ast(selection: &ast::Selection) -> Self {
        match selection {
            ast::Selection::Field(field) => Selection::Field {
                name: field.name.as_str().to_owned(),
                alias: field.alias.as_ref().map(|alias| alias.as_str().to_owned()),
                selection_set: field
                    .selection_set
                    .iter()
                    .map(Selection::from_ast)
                    .collect(),
            },
            ast::Selection::InlineFragment(fragment) => Selection::InlineFragment {
                type_condition: fragment
                    .type_condition
                    .as_ref()
                    .map(|condition| condition.as_str().to_owned()),
                selection_set: fragment
                    .selection_set
                    .iter()
                    .map(Selection::from_ast)
                    .collect(),
            },
            ast::Selection::FragmentSpread(spread) => Selection::FragmentSpread {
                name: spread.fragment_name.as_str().to_owned(),
            },
        }
    }
}

/// The named fragments of a document.
#[derive(Clone, Debug, Default)]
pub struct Fragments {
    map: HashMap<String, Fragment>,
}

impl Fragments {
    fn from_ast(document: &ast::Document) -> Self {
        let map = document
            .definitions
            .iter()
            .filter_map(|definition| match definition {
                ast::Definition::FragmentDefinition(fragment) => Some((
                    fragment.name.as_str().to_owned(),
                    Fragment {
                        type_condition: fragment.type_condition.as_str().to_owned(),
                        selection_set: fragment
                            .selection_set
                            .iter()
                            .map(Selection::from_ast)
                            .collect(),
                    },
                )),
                _ => None,
            })
            .collect();
        Self { map }
    }

    pub fn get(&self, name: &str) -> Option<&Fragment> {
        self.map.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, fragment: Fragment) {
        self.map.insert(name.into(), fragment);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// A named fragment: its type condition and selections.
#[derive(Clone, Debug)]
pub struct Fragment {
    pub type_condition: String,
    pub selection_set: Vec<Selection>,
}

/// Convert a literal AST value to JSON.
///
/// Variable references have no literal value and convert to `None`, as does
/// any composite containing one.
pub(crate) fn parse_ast_value(value: &ast::Value) -> Option<Value> {
    match value {
        ast::Value::Variable(_) => None,
        ast::Value::Null => Some(Value::Null),
        ast::Value::Enum(name) => Some(Value::String(name.as_str().into())),
        ast::Value::String(text) => Some(Value::String(text.as_str().into())),
        ast::Value::Boolean(flag) => Some(Value::Bool(*flag)),
        ast::Value::Int(int) => int
            .as_str()
            .parse::<i64>()
            .ok()
            .map(Value::from)
            .or_else(|| int.as_str().parse::<u64>().ok().map(Value::from)),
        ast::Value::Float(float) => float
            .try_to_f64()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        ast::Value::List(items) => items
            .iter()
            .map(|item| parse_ast_value(item))
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        ast::Value::Object(fields) => fields
            .iter()
            .map(|(name, value)| {
                parse_ast_value(value).map(|value| (ByteString::from(name.as_str()), value))
            })
            .collect::<Option<Object>>()
            .map(Value::Object),
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;
    use test_log::test;

    use super::*;

    #[test]
    fn test_parse_splits_operations_and_fragments() {
        let document = Document::parse(
            r#"
            query Hero { hero { ...heroFields } }
            mutation Save { save }
            fragment heroFields on Character { name }
            "#,
        )
        .unwrap();
        assert_eq!(document.operations().len(), 2);
        assert_eq!(document.operations()[0].name(), Some("Hero"));
        assert_eq!(document.operations()[0].kind(), OperationKind::Query);
        assert_eq!(document.operations()[1].kind(), OperationKind::Mutation);
        assert_eq!(document.fragments().len(), 1);
        let fragment = document.fragments().get("heroFields").unwrap();
        assert_eq!(fragment.type_condition, "Character");
        assert_eq!(fragment.selection_set.len(), 1);
    }

    #[test]
    fn test_parse_reports_syntax_errors() {
        let errors = Document::parse("query {").unwrap_err();
        assert!(!errors.to_string().is_empty());
    }

    #[test]
    fn test_variable_declarations_keep_order_and_defaults() {
        let document =
            Document::parse("query Hero($episode: Episode = JEDI, $limit: Int) { hero }").unwrap();
        let operation = &document.operations()[0];
        let declared: Vec<_> = operation.variables().keys().cloned().collect();
        assert_eq!(declared, vec!["episode".to_string(), "limit".to_string()]);

        let (ty, default) = &operation.variables()["episode"];
        assert_eq!(ty, &FieldType::Named("Episode".to_string()));
        assert_eq!(default.as_ref(), Some(&json!("JEDI")));

        let (ty, default) = &operation.variables()["limit"];
        assert_eq!(ty, &FieldType::Int);
        assert!(default.is_none());
    }

    #[test]
    fn test_selection_shapes() {
        let document = Document::parse(
            r#"
            {
                renamed: hero { name }
                ... on Droid { serial }
                ...stats
            }
            "#,
        )
        .unwrap();
        let selections = document.operations()[0].selection_set();
        match &selections[0] {
            Selection::Field {
                name,
                alias,
                selection_set,
            } => {
                assert_eq!(name, "hero");
                assert_eq!(alias.as_deref(), Some("renamed"));
                assert_eq!(selection_set.len(), 1);
            }
            other => panic!("expected a field, got {other:?}"),
        }
        match &selections[1] {
            Selection::InlineFragment { type_condition, .. } => {
                assert_eq!(type_condition.as_deref(), Some("Droid"));
            }
            other => panic!("expected an inline fragment, got {other:?}"),
        }
        match &selections[2] {
            Selection::FragmentSpread { name } => assert_eq!(name, "stats"),
            other => panic!("expected a spread, got {other:?}"),
        }
    }

    #[test]
    fn test_literal_defaults_convert_to_json() {
        let document = Document::parse(
            r#"query Q($filter: SearchFilter = {tags: ["a", 2], flag: true, nested: {x: null}}) {
                hero
            }"#,
        )
        .unwrap();
        let (_, default) = &document.operations()[0].variables()["filter"];
        assert_eq!(
            default.as_ref(),
            Some(&json!({"tags": ["a", 2], "flag": true, "nested": {"x": null}})),
        );
    }

    #[test]
    fn test_operation_kind_names() {
        assert_eq!(OperationKind::Query.to_string(), "query");
        assert_eq!(OperationKind::Mutation.default_type_name(), "Mutation");
        assert_eq!(
            OperationKind::from(ast::OperationType::Subscription),
            OperationKind::Subscription
        );
    }
}
