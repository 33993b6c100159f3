use serde_json::Value;

use crate::types::syntax::Notation;
use crate::value::ValueCow;

/// Splits a variable name into the segments of its path.
pub fn segments(name: &str, notation: Notation) -> Vec<&str> {
    match notation {
        Notation::Dot => name.split('.').collect(),
        Notation::Pointer => name.trim_start_matches('/').split('/').collect(),
    }
}

/// Index the value with the given path.
///
/// Objects are indexed by key and arrays by position, anything else cannot
/// be indexed.
pub fn index<'a, S>(mut value: &'a Value, path: &[S]) -> Option<&'a Value>
where
    S: AsRef<str>,
{
    for segment in path {
        let segment = segment.as_ref();
        value = match value {
            Value::Object(map) => map.get(segment)?,
            Value::Array(list) => list.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(value)
}

/// Index the value with the given path, only cloning the edge value if the
/// value is owned.
pub fn index_cow<'a, S>(value: ValueCow<'a>, path: &[S]) -> Option<ValueCow<'a>>
where
    S: AsRef<str>,
{
    if path.is_empty() {
        return Some(value);
    }
    match value {
        ValueCow::Borrowed(v) => index(v, path).map(ValueCow::Borrowed),
        ValueCow::Owned(v) => index(&v, path).cloned().map(ValueCow::Owned),
    }
}
