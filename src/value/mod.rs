//! Semantics of [`serde_json::Value`] as seen from a template: truthiness,
//! ordering, printing, and arithmetic.

mod cow;

use std::cmp::Ordering;
use std::fmt;

use serde_json::{Map, Number, Value};

pub(crate) use crate::value::cow::ValueCow;
use crate::{Error, ErrorKind, Result};

/// An arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Arith {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

/// A number split into the two representations arithmetic cares about.
#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

/// Returns a human readable name for the type of the value.
pub(crate) fn human(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Returns whether the value is considered true in a condition.
pub(crate) fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => match num(n) {
            Num::Int(i) => i != 0,
            Num::Float(f) => f != 0.0,
        },
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Compares two values.
///
/// Values of different types are ordered by type: null, bool, number,
/// object, array, string. Numbers compare by value regardless of whether they
/// are integers or floats.
pub(crate) fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => compare_numbers(a, b),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Array(a), Value::Array(b)) => {
            for (x, y) in a.iter().zip(b) {
                match compare(x, y) {
                    Ordering::Equal => continue,
                    ord => return ord,
                }
            }
            a.len().cmp(&b.len())
        }
        (Value::Object(a), Value::Object(b)) => {
            let (a, b) = (sorted(a), sorted(b));
            for ((xk, xv), (yk, yv)) in a.iter().zip(&b) {
                match xk.cmp(yk).then_with(|| compare(xv, yv)) {
                    Ordering::Equal => continue,
                    ord => return ord,
                }
            }
            a.len().cmp(&b.len())
        }
        (a, b) => rank(a).cmp(&rank(b)),
    }
}

/// Returns whether two values are structurally equal.
pub(crate) fn equals(a: &Value, b: &Value) -> bool {
    compare(a, b) == Ordering::Equal
}

/// Returns the entries of the object sorted by key.
pub(crate) fn sorted(map: &Map<String, Value>) -> Vec<(&String, &Value)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|(a, _), (b, _)| a.cmp(b));
    entries
}

fn rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::String(_) => 5,
    }
}

fn compare_numbers(a: &Number, b: &Number) -> Ordering {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        return a.cmp(&b);
    }
    if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
        return a.cmp(&b);
    }
    let a = a.as_f64().unwrap_or(f64::NAN);
    let b = b.as_f64().unwrap_or(f64::NAN);
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

fn num(n: &Number) -> Num {
    match n.as_i64() {
        Some(i) => Num::Int(i),
        None => Num::Float(n.as_f64().unwrap_or(f64::NAN)),
    }
}

/// Writes the value the way it appears in rendered output.
///
/// Strings are written verbatim, `null` is written as nothing, and everything
/// else is written as compact JSON.
pub(crate) fn write(f: &mut dyn fmt::Write, v: &Value) -> fmt::Result {
    match v {
        Value::Null => Ok(()),
        Value::String(s) => f.write_str(s),
        v => write!(f, "{v}"),
    }
}

/// Returns the value as it would be written in rendered output.
pub(crate) fn to_display_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        v => {
            let mut s = String::new();
            // Writing to a `String` cannot fail.
            let _ = write(&mut s, v);
            s
        }
    }
}

/// Applies an arithmetic operator to two values.
///
/// Integer operands produce an integer result unless the operation
/// overflows, in which case it is performed on floats. Division always
/// produces a float. Adding two strings concatenates them.
pub(crate) fn arithmetic(op: Arith, lhs: &Value, rhs: &Value) -> Result<Value> {
    if let (Arith::Add, Value::String(a), Value::String(b)) = (op, lhs, rhs) {
        return Ok(Value::String(format!("{a}{b}")));
    }

    let (a, b) = match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => (num(a), num(b)),
        (a, b) => {
            return Err(Error::value(format!(
                "cannot apply `{}` to {} and {}",
                op.symbol(),
                human(a),
                human(b)
            )));
        }
    };

    if matches!(op, Arith::Div | Arith::Rem) && is_zero(b) {
        return Err(Error::new(ErrorKind::Render, "division by zero"));
    }

    if let (Num::Int(a), Num::Int(b)) = (a, b) {
        let int = match op {
            Arith::Add => a.checked_add(b),
            Arith::Sub => a.checked_sub(b),
            Arith::Mul => a.checked_mul(b),
            Arith::Rem => a.checked_rem(b),
            Arith::Pow => u32::try_from(b).ok().and_then(|b| a.checked_pow(b)),
            Arith::Div => None,
        };
        if let Some(int) = int {
            return Ok(Value::from(int));
        }
    }

    let (a, b) = (to_f64(a), to_f64(b));
    let float = match op {
        Arith::Add => a + b,
        Arith::Sub => a - b,
        Arith::Mul => a * b,
        Arith::Div => a / b,
        Arith::Rem => a % b,
        Arith::Pow => a.powf(b),
    };
    Ok(Value::from(float))
}

fn is_zero(n: Num) -> bool {
    match n {
        Num::Int(i) => i == 0,
        Num::Float(f) => f == 0.0,
    }
}

fn to_f64(n: Num) -> f64 {
    match n {
        Num::Int(i) => i as f64,
        Num::Float(f) => f,
    }
}

impl Arith {
    fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Pow => "^",
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!([])));
        assert!(!is_truthy(&json!({})));
        assert!(is_truthy(&json!(-1)));
        assert!(is_truthy(&json!("false")));
        assert!(is_truthy(&json!([0])));
        assert!(is_truthy(&json!({"a": null})));
    }

    #[test]
    fn compare_mixed_numbers() {
        assert_eq!(compare(&json!(1), &json!(1.0)), Ordering::Equal);
        assert_eq!(compare(&json!(1), &json!(1.5)), Ordering::Less);
        assert_eq!(compare(&json!(-1), &json!(u64::MAX)), Ordering::Less);
    }

    #[test]
    fn compare_type_order() {
        let ordered = [
            json!(null),
            json!(true),
            json!(3),
            json!({"a": 1}),
            json!([1]),
            json!("a"),
        ];
        for pair in ordered.windows(2) {
            assert_eq!(compare(&pair[0], &pair[1]), Ordering::Less);
        }
    }

    #[test]
    fn compare_arrays_lexicographically() {
        assert_eq!(compare(&json!([1, 2]), &json!([1, 3])), Ordering::Less);
        assert_eq!(compare(&json!([1, 2]), &json!([1])), Ordering::Greater);
    }

    #[test]
    fn display_strings() {
        assert_eq!(to_display_string(&json!("text")), "text");
        assert_eq!(to_display_string(&json!(null)), "");
        assert_eq!(to_display_string(&json!(1.5)), "1.5");
        assert_eq!(to_display_string(&json!([1, "a"])), r#"[1,"a"]"#);
        assert_eq!(to_display_string(&json!({"a": true})), r#"{"a":true}"#);
    }

    #[test]
    fn arithmetic_integers() {
        assert_eq!(arithmetic(Arith::Add, &json!(1), &json!(2)).unwrap(), json!(3));
        assert_eq!(arithmetic(Arith::Sub, &json!(1), &json!(2)).unwrap(), json!(-1));
        assert_eq!(arithmetic(Arith::Mul, &json!(3), &json!(4)).unwrap(), json!(12));
        assert_eq!(arithmetic(Arith::Rem, &json!(7), &json!(4)).unwrap(), json!(3));
        assert_eq!(arithmetic(Arith::Pow, &json!(2), &json!(10)).unwrap(), json!(1024));
    }

    #[test]
    fn arithmetic_division_is_float() {
        assert_eq!(arithmetic(Arith::Div, &json!(6), &json!(4)).unwrap(), json!(1.5));
        assert_eq!(arithmetic(Arith::Div, &json!(6), &json!(3)).unwrap(), json!(2.0));
    }

    #[test]
    fn arithmetic_overflow_falls_back_to_float() {
        let v = arithmetic(Arith::Mul, &json!(i64::MAX), &json!(2)).unwrap();
        assert!(v.is_f64());
        let v = arithmetic(Arith::Pow, &json!(2), &json!(-1)).unwrap();
        assert_eq!(v, json!(0.5));
    }

    #[test]
    fn arithmetic_division_by_zero() {
        let err = arithmetic(Arith::Div, &json!(1), &json!(0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Render);
        assert_eq!(err.message(), "division by zero");
        let err = arithmetic(Arith::Rem, &json!(1.5), &json!(0.0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Render);
    }

    #[test]
    fn arithmetic_strings() {
        let v = arithmetic(Arith::Add, &json!("foo"), &json!("bar")).unwrap();
        assert_eq!(v, json!("foobar"));
        let err = arithmetic(Arith::Sub, &json!("foo"), &json!(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
        assert_eq!(err.message(), "cannot apply `-` to string and number");
    }
}
