use serde_json::{Map, Value};

use crate::render::iter::LoopFrame;
use crate::render::value::index;
use crate::value::ValueCow;

/// The variables visible while rendering a single template.
///
/// Names are resolved against the loop frames from the innermost outwards,
/// then the locals assigned with `set`, and finally the parent scope. The
/// first scope that binds the first segment of a path decides the result.
#[cfg_attr(internal_debug, derive(Debug))]
pub struct Stack<'render> {
    frames: Vec<LoopFrame<'render>>,
    locals: Map<String, Value>,
    parent: Parent<'render>,
}

#[derive(Clone, Copy)]
#[cfg_attr(internal_debug, derive(Debug))]
pub enum Parent<'render> {
    /// The data passed to the render call.
    Data(&'render Value),
    /// The scope of the template that included this one.
    Outer(&'render Stack<'render>),
}

impl<'render> Stack<'render> {
    pub fn new(data: &'render Value) -> Self {
        Self::with_parent(Parent::Data(data))
    }

    pub fn with_outer(outer: &'render Stack<'render>) -> Self {
        Self::with_parent(Parent::Outer(outer))
    }

    fn with_parent(parent: Parent<'render>) -> Self {
        Self {
            frames: Vec::new(),
            locals: Map::new(),
            parent,
        }
    }

    /// Resolves a path to a variable.
    pub fn lookup(&self, path: &[&str]) -> Option<ValueCow<'render>> {
        let first = *path.first()?;
        for frame in self.frames.iter().rev() {
            if let Some(found) = frame.resolve(path) {
                return found;
            }
        }
        if let Some(local) = self.locals.get(first) {
            return index(local, &path[1..]).cloned().map(ValueCow::Owned);
        }
        match self.parent {
            Parent::Data(data) => index(data, path).map(ValueCow::Borrowed),
            Parent::Outer(outer) => outer.lookup(path),
        }
    }

    /// Assigns a value to a local, creating any intermediate objects.
    ///
    /// A local shadows the variable of the same name in the parent scope, so
    /// assigning to a nested path starts from a copy of the parent's value.
    pub fn set(&mut self, path: &[String], value: Value) {
        if let [first, _, ..] = path {
            if !self.locals.contains_key(first) {
                let seed = match self.parent {
                    Parent::Data(data) => index(data, &[first]).cloned(),
                    Parent::Outer(outer) => outer
                        .lookup(&[first.as_str()])
                        .map(ValueCow::into_owned),
                };
                if let Some(seed) = seed {
                    self.locals.insert(first.clone(), seed);
                }
            }
        }

        assign(&mut self.locals, path, value);
    }

    pub fn push_frame(&mut self, frame: LoopFrame<'render>) {
        self.frames.push(frame);
    }

    /// Advances the innermost loop, removing it once it is finished.
    ///
    /// Returns `true` if there is another iteration.
    pub fn advance(&mut self) -> bool {
        let Some(frame) = self.frames.last_mut() else {
            panic!("expected loop frame");
        };
        if frame.advance() {
            return true;
        }
        self.frames.pop();
        false
    }

    /// Returns a snapshot of the innermost `loop` record, including loops in
    /// templates that included this one.
    pub fn loop_record(&self) -> Option<Value> {
        match self.frames.last() {
            Some(frame) => Some(frame.record()),
            None => match self.parent {
                Parent::Data(_) => None,
                Parent::Outer(outer) => outer.loop_record(),
            },
        }
    }
}

fn assign(map: &mut Map<String, Value>, path: &[String], value: Value) {
    match path {
        [] => {}
        [last] => {
            map.insert(last.clone(), value);
        }
        [first, rest @ ..] => {
            let entry = map.entry(first.clone()).or_insert(Value::Null);
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(inner) = entry {
                assign(inner, rest, value);
            }
        }
    }
}
