//! Purpose: Convert raw `default=` literals into values of the destination's kind.
//! Exports: `coerce_literal`.
//! Role: Assignment-time conversion used by the converter's default substitution.
//! Invariants: The hint's kind decides the result; without a hint the literal is sniffed as JSON.
use serde_json::{Number, Value};

use crate::core::error::Error;
use crate::core::navigate::kind_name;

/// Converts `literal` to the kind of `hint`. A missing or null hint sniffs the literal as
/// JSON and falls back to a string.
pub(crate) fn coerce_literal(literal: &str, hint: Option<&Value>) -> Result<Value, Error> {
    let Some(hint) = hint.filter(|hint| !hint.is_null()) else {
        return Ok(serde_json::from_str(literal).unwrap_or_else(|_| Value::from(literal)));
    };

    let mismatch = || {
        Error::type_mismatch(format!(
            "default `{literal}` is not a valid {}",
            kind_name(hint)
        ))
    };
    match hint {
        Value::String(_) => Ok(Value::from(literal)),
        Value::Bool(_) => literal.parse::<bool>().map(Value::Bool).map_err(|_| mismatch()),
        Value::Number(_) => parse_number(literal).map(Value::Number).ok_or_else(mismatch),
        Value::Array(_) | Value::Object(_) => {
            let parsed: Value =
                serde_json::from_str(literal).map_err(|err| mismatch().with_source(err))?;
            if std::mem::discriminant(&parsed) != std::mem::discriminant(hint) {
                return Err(mismatch());
            }
            Ok(parsed)
        }
        Value::Null => Ok(Value::from(literal)),
    }
}

fn parse_number(literal: &str) -> Option<Number> {
    if let Ok(n) = literal.parse::<i64>() {
        return Some(Number::from(n));
    }
    if let Ok(n) = literal.parse::<u64>() {
        return Some(Number::from(n));
    }
    literal.parse::<f64>().ok().and_then(Number::from_f64)
}
