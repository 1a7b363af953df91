use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map;
use serde_json_bytes::Value;

use crate::graphql::Error;
use crate::json_ext::Object;

/// A GraphQL response.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Response {
    /// The response data.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Value>,

    /// The optional graphql errors encountered.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<Error>,

    /// The optional graphql extensions.
    #[serde(skip_serializing_if = "Object::is_empty", default)]
    pub extensions: Object,
}

#[buildstructor::buildstructor]
impl Response {
    /// Constructor
    #[builder(visibility = "pub")]
    fn new(
        data: Option<Value>,
        errors: Vec<Error>,
        extensions: Map<ByteString, Value>,
    ) -> Self {
        Self {
            data,
            errors,
            extensions,
        }
    }

    /// Build an errors-only response, with no `data` entry.
    ///
    /// This is the shape a request short-circuits to when it cannot be
    /// executed at all, for example on validation or variable errors.
    pub fn from_errors(errors: Vec<Error>) -> Self {
        Self {
            data: None,
            errors,
            extensions: Object::default(),
        }
    }

    /// Move every error in `errors` onto this response.
    pub fn append_errors(&mut self, errors: &mut Vec<Error>) {
        self.errors.append(errors)
    }
}
