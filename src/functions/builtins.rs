use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::functions::Arguments;
use crate::value::{self, Arith};
use crate::{Error, ErrorKind, Result};

/// A function implemented by the renderer itself.
///
/// Named builtins are callable from templates like `length(users)`, the
/// operator builtins are only produced by the compiler for expressions like
/// `a + b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    At,
    Capitalize,
    Default,
    DivisibleBy,
    Even,
    Exists,
    ExistsIn,
    First,
    Float,
    Int,
    IsArray,
    IsBoolean,
    IsFloat,
    IsInteger,
    IsNumber,
    IsObject,
    IsString,
    Join,
    Last,
    Length,
    Lower,
    Max,
    Min,
    Odd,
    Range,
    Round,
    Sort,
    Upper,

    // Operators
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    In,
    Not,
    Bool,
}

impl Builtin {
    pub const fn all() -> &'static [Builtin] {
        use Builtin::*;
        &[
            At, Capitalize, Default, DivisibleBy, Even, Exists, ExistsIn, First, Float, Int,
            IsArray, IsBoolean, IsFloat, IsInteger, IsNumber, IsObject, IsString, Join, Last,
            Length, Lower, Max, Min, Odd, Range, Round, Sort, Upper, Add, Sub, Mul, Div, Mod, Pow,
            Eq, Ne, Gt, Ge, Lt, Le, In, Not, Bool,
        ]
    }

    /// The name a template calls this builtin by, operators have none.
    pub const fn name(&self) -> Option<&'static str> {
        let name = match self {
            Self::At => "at",
            Self::Capitalize => "capitalize",
            Self::Default => "default",
            Self::DivisibleBy => "divisibleBy",
            Self::Even => "even",
            Self::Exists => "exists",
            Self::ExistsIn => "existsIn",
            Self::First => "first",
            Self::Float => "float",
            Self::Int => "int",
            Self::IsArray => "isArray",
            Self::IsBoolean => "isBoolean",
            Self::IsFloat => "isFloat",
            Self::IsInteger => "isInteger",
            Self::IsNumber => "isNumber",
            Self::IsObject => "isObject",
            Self::IsString => "isString",
            Self::Join => "join",
            Self::Last => "last",
            Self::Length => "length",
            Self::Lower => "lower",
            Self::Max => "max",
            Self::Min => "min",
            Self::Odd => "odd",
            Self::Range => "range",
            Self::Round => "round",
            Self::Sort => "sort",
            Self::Upper => "upper",
            _ => return None,
        };
        Some(name)
    }

    /// The number of arguments this builtin takes.
    pub const fn arity(&self) -> usize {
        match self {
            Self::At
            | Self::Default
            | Self::DivisibleBy
            | Self::ExistsIn
            | Self::Join
            | Self::Round
            | Self::Add
            | Self::Sub
            | Self::Mul
            | Self::Div
            | Self::Mod
            | Self::Pow
            | Self::Eq
            | Self::Ne
            | Self::Gt
            | Self::Ge
            | Self::Lt
            | Self::Le
            | Self::In => 2,
            _ => 1,
        }
    }

    /// Applies the builtin to the given arguments.
    ///
    /// `exists` depends on the render scope and is evaluated by the renderer
    /// before reaching this point.
    pub fn call(self, args: &Arguments<'_>) -> Result<Value> {
        let v = match self {
            Self::At => at(args.get(0)?, args.get(1)?)?,
            Self::Capitalize => capitalize(args.as_str(0)?).into(),
            // Both arguments were evaluated, so the first one exists.
            Self::Default => args.get(0)?.clone(),
            Self::DivisibleBy => {
                let (a, b) = (args.as_i64(0)?, args.as_i64(1)?);
                // Only `i64::MIN % -1` overflows and it divides evenly.
                Value::Bool(match a.checked_rem(b) {
                    Some(r) => r == 0,
                    None => b == -1,
                })
            }
            Self::Even => Value::Bool(args.as_i64(0)? % 2 == 0),
            Self::Odd => Value::Bool(args.as_i64(0)? % 2 != 0),
            Self::Exists => unreachable!("`exists` is evaluated by the renderer"),
            Self::ExistsIn => {
                let object = expect_object(args.get(0)?)?;
                Value::Bool(object.contains_key(args.as_str(1)?))
            }
            Self::First => expect_array(args.get(0)?)?.first().cloned().unwrap_or_default(),
            Self::Last => expect_array(args.get(0)?)?.last().cloned().unwrap_or_default(),
            Self::Float => float(args.get(0)?)?,
            Self::Int => int(args.get(0)?)?,
            Self::IsArray => Value::Bool(args.get(0)?.is_array()),
            Self::IsBoolean => Value::Bool(args.get(0)?.is_boolean()),
            Self::IsFloat => Value::Bool(args.get(0)?.is_f64()),
            Self::IsInteger => Value::Bool(args.get(0)?.is_i64() || args.get(0)?.is_u64()),
            Self::IsNumber => Value::Bool(args.get(0)?.is_number()),
            Self::IsObject => Value::Bool(args.get(0)?.is_object()),
            Self::IsString => Value::Bool(args.get(0)?.is_string()),
            Self::Join => {
                let sep = args.as_str(1)?;
                let items: Vec<_> = expect_array(args.get(0)?)?
                    .iter()
                    .map(value::to_display_string)
                    .collect();
                Value::String(items.join(sep))
            }
            Self::Length => length(args.get(0)?)?,
            Self::Lower => args.as_str(0)?.to_lowercase().into(),
            Self::Upper => args.as_str(0)?.to_uppercase().into(),
            Self::Max => extreme(args.get(0)?, Ordering::Greater)?,
            Self::Min => extreme(args.get(0)?, Ordering::Less)?,
            Self::Range => {
                let n = args.as_i64(0)?;
                Value::Array((0..n.max(0)).map(Value::from).collect())
            }
            Self::Round => round(args.as_f64(0)?, args.as_i64(1)?),
            Self::Sort => {
                let mut items = expect_array(args.get(0)?)?.clone();
                items.sort_by(value::compare);
                Value::Array(items)
            }

            Self::Add => value::arithmetic(Arith::Add, args.get(0)?, args.get(1)?)?,
            Self::Sub => value::arithmetic(Arith::Sub, args.get(0)?, args.get(1)?)?,
            Self::Mul => value::arithmetic(Arith::Mul, args.get(0)?, args.get(1)?)?,
            Self::Div => value::arithmetic(Arith::Div, args.get(0)?, args.get(1)?)?,
            Self::Mod => value::arithmetic(Arith::Rem, args.get(0)?, args.get(1)?)?,
            Self::Pow => value::arithmetic(Arith::Pow, args.get(0)?, args.get(1)?)?,
            Self::Eq => Value::Bool(value::equals(args.get(0)?, args.get(1)?)),
            Self::Ne => Value::Bool(!value::equals(args.get(0)?, args.get(1)?)),
            Self::Gt => Value::Bool(value::compare(args.get(0)?, args.get(1)?).is_gt()),
            Self::Ge => Value::Bool(value::compare(args.get(0)?, args.get(1)?).is_ge()),
            Self::Lt => Value::Bool(value::compare(args.get(0)?, args.get(1)?).is_lt()),
            Self::Le => Value::Bool(value::compare(args.get(0)?, args.get(1)?).is_le()),
            Self::In => Value::Bool(contains(args.get(1)?, args.get(0)?)?),
            Self::Not => Value::Bool(!value::is_truthy(args.get(0)?)),
            Self::Bool => Value::Bool(value::is_truthy(args.get(0)?)),
        };
        Ok(v)
    }

    /// A human readable description used in error messages.
    pub fn human(&self) -> &'static str {
        match self {
            Self::Add => "`+`",
            Self::Sub => "`-`",
            Self::Mul => "`*`",
            Self::Div => "`/`",
            Self::Mod => "`%`",
            Self::Pow => "`^`",
            Self::Eq => "`==`",
            Self::Ne => "`!=`",
            Self::Gt => "`>`",
            Self::Ge => "`>=`",
            Self::Lt => "`<`",
            Self::Le => "`<=`",
            Self::In => "`in`",
            Self::Not => "`not`",
            Self::Bool => "boolean conversion",
            b => b.name().unwrap_or("builtin"),
        }
    }
}

fn expect_array(v: &Value) -> Result<&Vec<Value>> {
    match v {
        Value::Array(a) => Ok(a),
        v => Err(err_expected("array", v)),
    }
}

fn expect_object(v: &Value) -> Result<&Map<String, Value>> {
    match v {
        Value::Object(o) => Ok(o),
        v => Err(err_expected("object", v)),
    }
}

fn err_expected(exp: &str, got: &Value) -> Error {
    Error::new(
        ErrorKind::Render,
        format!("expected {exp}, found {}", value::human(got)),
    )
}

fn at(v: &Value, key: &Value) -> Result<Value> {
    match (v, key) {
        (Value::Array(a), Value::Number(n)) => {
            let i = n
                .as_u64()
                .and_then(|i| usize::try_from(i).ok())
                .filter(|i| *i < a.len())
                .ok_or_else(|| {
                    Error::new(
                        ErrorKind::Render,
                        format!("index {n} out of bounds for array of length {}", a.len()),
                    )
                })?;
            Ok(a[i].clone())
        }
        (Value::Object(o), Value::String(k)) => o
            .get(k)
            .cloned()
            .ok_or_else(|| Error::new(ErrorKind::Render, format!("key '{k}' not found"))),
        (Value::Array(_), key) => Err(Error::value(format!(
            "expected integer index, found {}",
            value::human(key)
        ))),
        (Value::Object(_), key) => Err(Error::value(format!(
            "expected string key, found {}",
            value::human(key)
        ))),
        (v, _) => Err(err_expected("array or object", v)),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn length(v: &Value) -> Result<Value> {
    let n = match v {
        Value::String(s) => s.chars().count(),
        Value::Array(a) => a.len(),
        Value::Object(o) => o.len(),
        v => return Err(err_expected("array, object or string", v)),
    };
    Ok(Value::from(n))
}

fn extreme(v: &Value, ord: Ordering) -> Result<Value> {
    let items = expect_array(v)?;
    let best = items.iter().reduce(|best, item| {
        if value::compare(item, best) == ord {
            item
        } else {
            best
        }
    });
    Ok(best.cloned().unwrap_or_default())
}

fn float(v: &Value) -> Result<Value> {
    match v {
        Value::Number(n) => Ok(Value::from(n.as_f64().unwrap_or(f64::NAN))),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::from)
            .map_err(|_| Error::value(format!("cannot convert '{s}' to float"))),
        v => Err(Error::value(format!(
            "cannot convert {} to float",
            value::human(v)
        ))),
    }
}

fn int(v: &Value) -> Result<Value> {
    match v {
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(v.clone()),
        Value::Number(n) => Ok(Value::from(n.as_f64().unwrap_or(0.0).trunc() as i64)),
        Value::String(s) => {
            let prefix = numeric_prefix(s.trim_start());
            prefix
                .parse::<f64>()
                .map(|f| Value::from(f.trunc() as i64))
                .map_err(|_| Error::value(format!("cannot convert '{s}' to integer")))
        }
        v => Err(Error::value(format!(
            "cannot convert {} to integer",
            value::human(v)
        ))),
    }
}

/// Returns the longest prefix that looks like a decimal number.
fn numeric_prefix(s: &str) -> &str {
    let bytes = s.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if bytes.get(i) == Some(&b'.') {
        let j = i + 1;
        let k = j + bytes[j..].iter().take_while(|b| b.is_ascii_digit()).count();
        if k > j {
            i = k;
        }
    }
    &s[..i]
}

fn round(x: f64, precision: i64) -> Value {
    if precision <= 0 {
        let factor = 10f64.powi(precision.clamp(-308, 0) as i32);
        let rounded = (x * factor).round() / factor;
        if rounded.is_finite() && rounded.abs() < i64::MAX as f64 {
            return Value::from(rounded as i64);
        }
        return Value::from(rounded);
    }
    let factor = 10f64.powi(precision.min(308) as i32);
    Value::from((x * factor).round() / factor)
}

/// Returns whether the collection contains the needle.
fn contains(collection: &Value, needle: &Value) -> Result<bool> {
    match collection {
        Value::Array(a) => Ok(a.iter().any(|v| value::equals(v, needle))),
        Value::Object(o) => match needle {
            Value::String(k) => Ok(o.contains_key(k)),
            _ => Ok(false),
        },
        Value::String(s) => match needle {
            Value::String(n) => Ok(s.contains(n.as_str())),
            n => Err(Error::value(format!(
                "expected string, found {}",
                value::human(n)
            ))),
        },
        v => Err(err_expected("array, object or string", v)),
    }
}
