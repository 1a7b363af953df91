//! Aggregated outcomes of validating input values.

use crate::graphql::Error;
use crate::graphql::IntoGraphQLErrors;
use crate::json_ext::Path;
use crate::json_ext::PathElement;

/// A single problem found in an input value, located by a path into the raw
/// input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Problem {
    pub message: String,
    pub path: Path,
}

/// The outcome of validating one input value.
///
/// Collects every problem found instead of stopping at the first one, in the
/// order they were recorded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationResult {
    problems: Vec<Problem>,
}

impl ValidationResult {
    /// An outcome with no problems.
    pub fn valid() -> Self {
        Self::default()
    }

    /// An outcome with a single problem at the root of the value.
    pub fn from_problem(message: impl Into<String>) -> Self {
        let mut result = Self::default();
        result.add_problem(message);
        result
    }

    pub fn is_valid(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    /// Record a problem at the root of the value being validated.
    pub fn add_problem(&mut self, message: impl Into<String>) {
        self.problems.push(Problem {
            message: message.into(),
            path: Path::empty(),
        });
    }

    /// Record a problem at a path into the value being validated.
    pub fn add_problem_at(&mut self, path: Path, message: impl Into<String>) {
        self.problems.push(Problem {
            message: message.into(),
            path,
        });
    }

    /// Merge the problems of `child` into this outcome unchanged.
    pub fn merge(&mut self, child: ValidationResult) {
        self.problems.extend(child.problems);
    }

    /// Merge the problems of `child`, prefixing each path with `element`.
    pub fn merge_at(&mut self, element: PathElement, child: ValidationResult) {
        for problem in child.problems {
            self.problems.push(Problem {
                path: problem.path.prefixed_with(element.clone()),
                message: problem.message,
            });
        }
    }
}

impl IntoGraphQLErrors for ValidationResult {
    fn into_graphql_errors(self) -> Result<Vec<Error>, Self> {
        Ok(self
            .problems
            .into_iter()
            .map(|problem| {
                Error::builder()
                    .message(problem.message)
                    .and_path((!problem.path.is_empty()).then_some(problem.path))
                    .extension_code("BAD_USER_INPUT")
                    .build()
            })
            .collect())
    }
}
