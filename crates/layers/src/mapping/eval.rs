use serde_json::{Map, Number, Value};

use super::expr::{Expr, ExprError, MAX_DEPTH};

pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Text form used by `+` and by display fields. Null renders empty.
pub fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

/// `==` with the usual number/string coercion; service payloads carry
/// numbers as text.
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .zip(n.as_f64())
            .is_some_and(|(x, y)| x == y),
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn lookup(payload: &Map<String, Value>, path: &[String]) -> Value {
    let Some((first, rest)) = path.split_first() else {
        return Value::Object(payload.clone());
    };
    let mut current = payload.get(first);
    for key in rest {
        current = current.and_then(|v| match v {
            Value::Object(m) => m.get(key),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        });
    }
    current.cloned().unwrap_or(Value::Null)
}

/// Deepest tree `evaluate` walks. Parsed mappings stay well below it; the
/// bound only matters for trees built by hand.
pub const MAX_EVAL_DEPTH: usize = 4 * MAX_DEPTH;

pub fn evaluate(expr: &Expr, payload: &Map<String, Value>) -> Result<Value, ExprError> {
    eval_at(expr, payload, 0)
}

fn eval_at(expr: &Expr, payload: &Map<String, Value>, depth: usize) -> Result<Value, ExprError> {
    if depth > MAX_EVAL_DEPTH {
        return Err(ExprError::TooDeep);
    }
    let eval = |e: &Expr| eval_at(e, payload, depth + 1);

    let value = match expr {
        Expr::Literal(v) => v.clone(),
        Expr::Field(path) => lookup(payload, path),
        Expr::Concat(parts) => {
            let values = parts.iter().map(eval).collect::<Result<Vec<_>, _>>()?;
            if values.iter().all(Value::is_number) {
                let sum: f64 = values.iter().filter_map(Value::as_f64).sum();
                Number::from_f64(sum).map(Value::Number).unwrap_or(Value::Null)
            } else {
                Value::String(values.iter().map(display).collect())
            }
        }
        Expr::Conditional {
            cond,
            then,
            otherwise,
        } => {
            if truthy(&eval(cond)?) {
                eval(then)?
            } else {
                eval(otherwise)?
            }
        }
        Expr::Equals {
            left,
            right,
            negate,
        } => {
            let eq = loose_eq(&eval(left)?, &eval(right)?);
            Value::Bool(eq != *negate)
        }
        Expr::Not(inner) => Value::Bool(!truthy(&eval(inner)?)),
        Expr::And(a, b) => {
            let left = eval(a)?;
            if truthy(&left) { eval(b)? } else { left }
        }
        Expr::Or(a, b) => {
            let left = eval(a)?;
            if truthy(&left) { left } else { eval(b)? }
        }
        Expr::Object(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, e)| Ok((k.clone(), eval(e)?)))
                .collect::<Result<Map<_, _>, ExprError>>()?,
        ),
    };
    Ok(value)
}
