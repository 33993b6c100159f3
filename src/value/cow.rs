//! Defines a clone-on-write [`Value`].

use std::ops::Deref;

use serde_json::Value;

/// A value on the evaluation stack, borrowed from the render data or the
/// template whenever possible.
#[derive(Clone)]
#[cfg_attr(internal_debug, derive(Debug))]
pub enum ValueCow<'a> {
    Borrowed(&'a Value),
    Owned(Value),
}

impl Deref for ValueCow<'_> {
    type Target = Value;

    fn deref(&self) -> &Self::Target {
        match self {
            Self::Borrowed(v) => v,
            Self::Owned(v) => v,
        }
    }
}

impl ValueCow<'_> {
    pub fn into_owned(self) -> Value {
        match self {
            Self::Borrowed(v) => v.clone(),
            Self::Owned(v) => v,
        }
    }
}

impl From<Value> for ValueCow<'_> {
    fn from(v: Value) -> Self {
        Self::Owned(v)
    }
}
