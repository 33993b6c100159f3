use serde_json::{Map, Value};

use crate::render::value::index_cow;
use crate::types::program::LoopVars;
use crate::types::span::Span;
use crate::value::{self, ValueCow};
use crate::{Error, Result};

/// The state of a single `for` loop.
#[cfg_attr(internal_debug, derive(Debug))]
pub struct LoopFrame<'render> {
    vars: Vars<'render>,

    /// The value being iterated over, either an array or an object.
    iterable: ValueCow<'render>,

    /// The keys of the object in sorted order, empty for arrays.
    keys: Vec<String>,

    /// The current position in the iteration.
    index: usize,

    /// The number of elements in the iterable.
    len: usize,

    /// A snapshot of the enclosing loop's `loop` record.
    parent: Option<Value>,
}

#[derive(Clone, Copy)]
#[cfg_attr(internal_debug, derive(Debug))]
enum Vars<'render> {
    Item(&'render str),
    KeyValue(&'render str, &'render str),
}

impl<'render> Vars<'render> {
    fn new(source: &'render str, vars: LoopVars) -> Self {
        match vars {
            LoopVars::Item(item) => Self::Item(&source[item]),
            LoopVars::KeyValue(k, v) => Self::KeyValue(&source[k], &source[v]),
        }
    }
}

impl<'render> LoopFrame<'render> {
    pub fn new(
        source: &'render str,
        vars: LoopVars,
        iterable: ValueCow<'render>,
        span: Span,
        parent: Option<Value>,
    ) -> Result<Self> {
        let (vars, keys, len) = match (&*iterable, vars) {
            // Empty iterables skip the body whatever the loop variables.
            (Value::Array(list), vars) if list.is_empty() => {
                (Vars::new(source, vars), Vec::new(), 0)
            }
            (Value::Object(map), vars) if map.is_empty() => {
                (Vars::new(source, vars), Vec::new(), 0)
            }
            (Value::Array(list), LoopVars::Item(item)) => {
                (Vars::Item(&source[item]), Vec::new(), list.len())
            }
            (Value::Object(map), LoopVars::KeyValue(k, v)) => {
                let mut keys: Vec<String> = map.keys().cloned().collect();
                keys.sort();
                let len = keys.len();
                (Vars::KeyValue(&source[k], &source[v]), keys, len)
            }
            (Value::Array(_), LoopVars::KeyValue(k, v)) => {
                return Err(Error::render(
                    "cannot unpack array item into two variables",
                    source,
                    k.combine(v),
                ));
            }
            (Value::Object(_), LoopVars::Item(item)) => {
                return Err(Error::render(
                    "cannot unpack object item into one variable",
                    source,
                    item,
                ));
            }
            (v, _) => {
                return Err(Error::render(
                    format!("expected iterable, found {}", value::human(v)),
                    source,
                    span,
                ));
            }
        };
        Ok(Self {
            vars,
            iterable,
            keys,
            index: 0,
            len,
            parent,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Moves on to the next element, returns `false` if there are none left.
    pub fn advance(&mut self) -> bool {
        self.index += 1;
        self.index < self.len
    }

    /// Resolves a path against the loop variables.
    ///
    /// Returns `None` if the first segment is not bound by this loop.
    pub fn resolve(&self, path: &[&str]) -> Option<Option<ValueCow<'render>>> {
        let (first, rest) = path.split_first()?;
        let found = match self.vars {
            Vars::Item(item) if *first == item => self.value(),
            Vars::KeyValue(key, _) if *first == key => self
                .keys
                .get(self.index)
                .map(|k| ValueCow::Owned(Value::String(k.clone()))),
            Vars::KeyValue(_, value) if *first == value => self.value(),
            _ if *first == "loop" => Some(ValueCow::Owned(self.record())),
            _ => return None,
        };
        Some(found.and_then(|v| index_cow(v, rest)))
    }

    /// Builds the `loop` record for the current iteration.
    pub fn record(&self) -> Value {
        let mut record = Map::new();
        record.insert("index".into(), self.index.into());
        record.insert("index1".into(), (self.index + 1).into());
        record.insert("is_first".into(), (self.index == 0).into());
        record.insert("is_last".into(), (self.index + 1 == self.len).into());
        if let Some(parent) = &self.parent {
            record.insert("parent".into(), parent.clone());
        }
        Value::Object(record)
    }

    /// Returns the current element.
    fn value(&self) -> Option<ValueCow<'render>> {
        match &self.iterable {
            ValueCow::Borrowed(v) => self.element(*v).map(ValueCow::Borrowed),
            ValueCow::Owned(v) => self.element(v).cloned().map(ValueCow::Owned),
        }
    }

    fn element<'a>(&self, v: &'a Value) -> Option<&'a Value> {
        match v {
            Value::Array(list) => list.get(self.index),
            Value::Object(map) => map.get(self.keys.get(self.index)?),
            _ => None,
        }
    }
}
