//! Manipulate JSON values with GraphQL semantics.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map;
use serde_json_bytes::Value;

/// A JSON object.
pub type Object = Map<ByteString, Value>;

/// Extension trait for [`serde_json_bytes::Value`].
pub(crate) trait ValueExt {
    /// Returns whether this value is a valid GraphQL Int input value.
    ///
    /// Spec: https://spec.graphql.org/draft/#sec-Int.Input-Coercion
    fn is_valid_int_input(&self) -> bool;

    /// Returns whether this value is a valid GraphQL Float input value.
    ///
    /// Spec: https://spec.graphql.org/draft/#sec-Float.Input-Coercion
    fn is_valid_float_input(&self) -> bool;

    /// Returns whether this value is a valid GraphQL ID input value.
    ///
    /// Spec: https://spec.graphql.org/draft/#sec-ID.Input-Coercion
    fn is_valid_id_input(&self) -> bool;
}

impl ValueExt for Value {
    fn is_valid_int_input(&self) -> bool {
        // An Int input is valid if it fits in a signed 32-bit integer.
        // `as_i64` returns None for numbers with a fractional part.
        self.as_i64().is_some_and(|x| i32::try_from(x).is_ok())
    }

    fn is_valid_float_input(&self) -> bool {
        // `as_f64` also accepts integers
        self.as_f64().is_some_and(|x| x.is_finite())
    }

    fn is_valid_id_input(&self) -> bool {
        self.is_string() || self.is_valid_int_input()
    }
}

/// A path into the JSON data of a request or response.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathElement {
    /// An index path element.
    Index(usize),

    /// A key path element.
    Key(String),
}

/// A path into JSON data, as found in the `path` field of a GraphQL error.
///
/// Serializes to the array-of-segments wire form, e.g. `["input", 0, "name"]`.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(pub Vec<PathElement>);

impl Path {
    pub fn empty() -> Path {
        Path(Vec::new())
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathElement> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a copy of this path with `element` prepended.
    pub fn prefixed_with(&self, element: PathElement) -> Path {
        let mut elements = Vec::with_capacity(self.0.len() + 1);
        elements.push(element);
        elements.extend(self.0.iter().cloned());
        Path(elements)
    }
}

impl FromIterator<PathElement> for Path {
    fn from_iter<T: IntoIterator<Item = PathElement>>(iter: T) -> Self {
        Path(iter.into_iter().collect())
    }
}

impl From<Vec<PathElement>> for Path {
    fn from(elements: Vec<PathElement>) -> Self {
        Path(elements)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for element in self.iter() {
            write!(f, "/")?;
            match element {
                PathElement::Index(index) => write!(f, "{index}")?,
                PathElement::Key(key) => write!(f, "{key}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn test_path_display() {
        let path = Path(vec![
            PathElement::Key("input".to_string()),
            PathElement::Index(2),
            PathElement::Key("name".to_string()),
        ]);
        assert_eq!(path.to_string(), "/input/2/name");
    }

    #[test]
    fn test_path_serialization() {
        let path = Path(vec![
            PathElement::Key("input".to_string()),
            PathElement::Index(0),
        ]);
        let serialized = serde_json_bytes::to_value(&path).unwrap();
        assert_eq!(serialized, json!(["input", 0]));

        let deserialized: Path = serde_json_bytes::from_value(json!(["input", 0])).unwrap();
        assert_eq!(deserialized, path);
    }

    #[test]
    fn test_prefixed_with() {
        let path = Path(vec![PathElement::Key("name".to_string())]);
        let prefixed = path.prefixed_with(PathElement::Key("input".to_string()));
        assert_eq!(prefixed.to_string(), "/input/name");
        // the original is untouched
        assert_eq!(path.to_string(), "/name");
    }

    #[test]
    fn test_valid_int_input() {
        assert!(json!(5).is_valid_int_input());
        assert!(json!(-5).is_valid_int_input());
        assert!(json!(i32::MAX).is_valid_int_input());
        assert!(json!(i32::MIN).is_valid_int_input());
        assert!(!json!(i32::MAX as i64 + 1).is_valid_int_input());
        assert!(!json!(5.5).is_valid_int_input());
        assert!(!json!("5").is_valid_int_input());
    }

    #[test]
    fn test_valid_float_input() {
        assert!(json!(5).is_valid_float_input());
        assert!(json!(5.5).is_valid_float_input());
        assert!(!json!("5.5").is_valid_float_input());
    }

    #[test]
    fn test_valid_id_input() {
        assert!(json!("user-1").is_valid_id_input());
        assert!(json!(42).is_valid_id_input());
        assert!(!json!(4.2).is_valid_id_input());
        assert!(!json!(true).is_valid_id_input());
    }
}
