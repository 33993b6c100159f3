//! The function registry.
//!
//! Functions are identified by their name and the number of arguments they
//! accept. The builtins live in a single process-wide table that is built the
//! first time it is used, callbacks are registered on an
//! [`Engine`][crate::Engine].

mod builtins;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use serde_json::{Map, Value};

pub use crate::functions::builtins::Builtin;
use crate::value::{self, ValueCow};
use crate::{Error, Result};

/// A boxed callback function.
pub type CallbackFn = dyn Fn(&Arguments<'_>) -> Result<Value> + Send + Sync + 'static;

/// The number of arguments a function accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Arity {
    Exact(usize),
    /// Any number of arguments, only matched when no function with the exact
    /// number of arguments exists.
    Variadic,
}

pub enum Function {
    Builtin(Builtin),
    Callback(Box<CallbackFn>),
}

/// A set of functions keyed by name and arity.
#[derive(Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, BTreeMap<Arity, Function>>,
}

/// The arguments passed to a callback.
///
/// Arguments are passed in the order they appear in the template. The typed
/// accessors fail with a [`ErrorKind::Value`][crate::ErrorKind::Value] error
/// if the argument has a different type, the renderer attaches the location
/// of the call.
///
/// # Examples
///
/// ```
/// use tessera::{Arguments, Engine, Result};
///
/// let mut engine = Engine::new();
/// engine.add_callback("repeat", 2, |args: &Arguments<'_>| -> Result<String> {
///     let s = args.as_str(0)?;
///     let n = args.as_i64(1)?;
///     Ok(s.repeat(n.max(0) as usize))
/// });
///
/// let result = engine.compile("{{ repeat(\"ab\", 3) }}")?.render(())?;
/// assert_eq!(result, "ababab");
/// # Ok::<(), tessera::Error>(())
/// ```
pub struct Arguments<'a> {
    values: &'a [ValueCow<'a>],
}

/// The return type of a callback.
///
/// This trait is implemented for [`Value`], `()`, [`bool`], the integer
/// types, [`f64`], [`String`], `&'static str`, `Vec<Value>` and
/// `Map<String, Value>`, as well as [`Option<R>`] and [`Result<R>`] where `R`
/// is one of those. Returning `()` or `None` produces `null` which renders as
/// nothing.
pub trait CallbackReturn {
    #[doc(hidden)]
    fn to_value(self) -> Result<Value>;
}

/// Returns the registry holding every builtin function.
pub fn builtins() -> &'static FunctionRegistry {
    static BUILTINS: OnceLock<FunctionRegistry> = OnceLock::new();
    BUILTINS.get_or_init(|| {
        let mut registry = FunctionRegistry::new();
        for builtin in Builtin::all() {
            if let Some(name) = builtin.name() {
                registry.register_builtin(name, Arity::Exact(builtin.arity()), *builtin);
            }
        }
        registry
    })
}

/// Wraps a user function so that it can be stored in a registry.
pub fn new<F, R>(f: F) -> Box<CallbackFn>
where
    F: Fn(&Arguments<'_>) -> R + Send + Sync + 'static,
    R: CallbackReturn,
{
    Box::new(move |args: &Arguments<'_>| -> Result<Value> { f(args).to_value() })
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_builtin(&mut self, name: &str, arity: Arity, builtin: Builtin) {
        self.register(name, arity, Function::Builtin(builtin));
    }

    pub fn register_callback(&mut self, name: &str, arity: Arity, f: Box<CallbackFn>) {
        self.register(name, arity, Function::Callback(f));
    }

    fn register(&mut self, name: &str, arity: Arity, function: Function) {
        self.functions
            .entry(name.to_owned())
            .or_default()
            .insert(arity, function);
    }

    /// Returns the function with exactly the given arity.
    pub fn get(&self, name: &str, arity: Arity) -> Option<&Function> {
        self.functions.get(name)?.get(&arity)
    }

    /// Returns the function to call with `n` arguments.
    ///
    /// An exact match is preferred, otherwise a variadic function is used if
    /// it is called with at least one argument.
    pub fn lookup(&self, name: &str, n: usize) -> Option<&Function> {
        let arities = self.functions.get(name)?;
        arities
            .get(&Arity::Exact(n))
            .or_else(|| (n > 0).then(|| arities.get(&Arity::Variadic)).flatten())
    }

    /// Returns whether any function with the given name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Returns the exact arities registered for the given name.
    pub fn arities(&self, name: &str) -> Vec<usize> {
        self.functions
            .get(name)
            .into_iter()
            .flat_map(|a| a.keys())
            .filter_map(|a| match a {
                Arity::Exact(n) => Some(*n),
                Arity::Variadic => None,
            })
            .collect()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.functions
                    .iter()
                    .map(|(name, arities)| (name, arities.keys().collect::<Vec<_>>())),
            )
            .finish()
    }
}

impl<'a> Arguments<'a> {
    pub(crate) fn new(values: &'a [ValueCow<'a>]) -> Self {
        Self { values }
    }

    /// Returns the number of arguments.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the function was called without arguments.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns an iterator over the argument values.
    pub fn iter(&self) -> impl Iterator<Item = &Value> + '_ {
        self.values.iter().map(|v| &**v)
    }

    /// Returns the argument at the given position.
    pub fn get(&self, i: usize) -> Result<&Value> {
        self.values.get(i).map(|v| &**v).ok_or_else(|| {
            Error::value(format!(
                "missing argument {}, function called with {} argument(s)",
                i + 1,
                self.len()
            ))
        })
    }

    pub fn as_str(&self, i: usize) -> Result<&str> {
        match self.get(i)? {
            Value::String(s) => Ok(s),
            v => Err(err_type("string", v)),
        }
    }

    pub fn as_bool(&self, i: usize) -> Result<bool> {
        match self.get(i)? {
            Value::Bool(b) => Ok(*b),
            v => Err(err_type("bool", v)),
        }
    }

    /// Returns the argument as an integer, floats are truncated.
    pub fn as_i64(&self, i: usize) -> Result<i64> {
        match self.get(i)? {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(i),
                None => n
                    .as_f64()
                    .filter(|f| f.is_finite() && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                    .map(|f| f as i64)
                    .ok_or_else(|| Error::value(format!("number {n} out of range for integer"))),
            },
            v => Err(err_type("integer", v)),
        }
    }

    pub fn as_f64(&self, i: usize) -> Result<f64> {
        match self.get(i)? {
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| Error::value(format!("number {n} is not representable as float"))),
            v => Err(err_type("number", v)),
        }
    }

    pub fn as_array(&self, i: usize) -> Result<&Vec<Value>> {
        match self.get(i)? {
            Value::Array(a) => Ok(a),
            v => Err(err_type("array", v)),
        }
    }

    pub fn as_object(&self, i: usize) -> Result<&Map<String, Value>> {
        match self.get(i)? {
            Value::Object(o) => Ok(o),
            v => Err(err_type("object", v)),
        }
    }
}

fn err_type(exp: &str, got: &Value) -> Error {
    Error::value(format!("expected {exp}, found {}", value::human(got)))
}

////////////////////////////////////////////////////////////////////////////////
// CallbackReturn
////////////////////////////////////////////////////////////////////////////////

macro_rules! impl_callback_return {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl CallbackReturn for $ty {
                fn to_value(self) -> Result<Value> {
                    Ok(Value::from(self))
                }
            }
        )+
    };
}

impl_callback_return! {
    (), bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, String, &'static str,
}

impl CallbackReturn for Value {
    fn to_value(self) -> Result<Value> {
        Ok(self)
    }
}

impl CallbackReturn for Vec<Value> {
    fn to_value(self) -> Result<Value> {
        Ok(Value::Array(self))
    }
}

impl CallbackReturn for Map<String, Value> {
    fn to_value(self) -> Result<Value> {
        Ok(Value::Object(self))
    }
}

impl<T> CallbackReturn for Option<T>
where
    T: CallbackReturn,
{
    fn to_value(self) -> Result<Value> {
        match self {
            Some(r) => r.to_value(),
            None => Ok(Value::Null),
        }
    }
}

impl<T> CallbackReturn for Result<T>
where
    T: CallbackReturn,
{
    fn to_value(self) -> Result<Value> {
        self.and_then(CallbackReturn::to_value)
    }
}
