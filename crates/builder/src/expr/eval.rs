use super::error::{ExprError, Result};
use super::parser::{BinaryOp, Expr, UnaryOp};
use super::value::Value;
use super::Environment;
use std::cmp::Ordering;

const BUILTINS: &[&str] = &["len", "lower", "upper"];

pub(super) fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

pub(super) struct Evaluator<'a, E> {
    pub(super) env: &'a E,
}

impl<E: Environment> Evaluator<'_, E> {
    pub(super) fn eval(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Ident(name) => self
                .env
                .lookup(name)
                .ok_or_else(|| ExprError::UnknownName { name: name.clone().into(), context: None }),
            Expr::Array(items) => Ok(Value::Array(items.iter().map(|i| self.eval(i)).collect::<Result<_>>()?)),
            Expr::Member(base, field) => member(self.eval(base)?, field),
            Expr::Index(base, index) => index_value(self.eval(base)?, &self.eval(index)?),
            Expr::Call(name, args) => {
                let args = args.iter().map(|a| self.eval(a)).collect::<Result<Vec<_>>>()?;
                if is_builtin(name) {
                    builtin(name, &args)
                } else {
                    self.env.call(name, &args)
                }
            },
            Expr::Unary(op, operand) => unary(*op, self.eval(operand)?),
            Expr::Binary(BinaryOp::And, lhs, rhs) => {
                if !truth(&self.eval(lhs)?, "&&")? {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(truth(&self.eval(rhs)?, "&&")?))
            },
            Expr::Binary(BinaryOp::Or, lhs, rhs) => {
                if truth(&self.eval(lhs)?, "||")? {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(truth(&self.eval(rhs)?, "||")?))
            },
            Expr::Binary(op, lhs, rhs) => binary(*op, self.eval(lhs)?, self.eval(rhs)?),
            Expr::Ternary(cond, then, otherwise) => {
                if truth(&self.eval(cond)?, "?:")? {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            },
        }
    }
}

fn truth(value: &Value, op: &str) -> Result<bool> {
    value.as_bool().ok_or_else(|| {
        ExprError::type_mismatch(format!("`{op}` expects a bool, got {}", value.type_name()))
    })
}

fn member(base: Value, field: &str) -> Result<Value> {
    match base {
        Value::Map(mut map) => Ok(map.remove(field).unwrap_or(Value::Nil)),
        Value::Nil => Ok(Value::Nil),
        other => Err(ExprError::type_mismatch(format!(
            "cannot access field `{field}` of {}",
            other.type_name()
        ))),
    }
}

fn index_value(base: Value, index: &Value) -> Result<Value> {
    match (base, index) {
        (Value::Map(mut map), Value::Str(key)) => Ok(map.remove(key).unwrap_or(Value::Nil)),
        (Value::Array(mut items), Value::Int(i)) => {
            let len = items.len();
            let at = resolve_index(*i, len)?;
            Ok(items.swap_remove(at))
        },
        (Value::Str(s), Value::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            let at = resolve_index(*i, chars.len())?;
            Ok(Value::Str(chars[at].to_string()))
        },
        (Value::Nil, _) => Ok(Value::Nil),
        (base, index) => Err(ExprError::type_mismatch(format!(
            "cannot index {} with {}",
            base.type_name(),
            index.type_name()
        ))),
    }
}

/// Negative indices count from the end.
fn resolve_index(index: i64, len: usize) -> Result<usize> {
    let len_i = i64::try_from(len).unwrap_or(i64::MAX);
    let resolved = if index < 0 { index + len_i } else { index };
    usize::try_from(resolved)
        .ok()
        .filter(|&i| i < len)
        .ok_or_else(|| ExprError::type_mismatch(format!("index {index} out of range (length {len})")))
}

fn unary(op: UnaryOp, value: Value) -> Result<Value> {
    match (op, value) {
        (UnaryOp::Not, value) => Ok(Value::Bool(!truth(&value, "!")?)),
        (UnaryOp::Neg, Value::Int(i)) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| ExprError::type_mismatch("integer overflow")),
        (UnaryOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
        (UnaryOp::Neg, other) => {
            Err(ExprError::type_mismatch(format!("cannot negate {}", other.type_name())))
        },
    }
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(equals(&lhs, &rhs))),
        BinaryOp::Ne => Ok(Value::Bool(!equals(&lhs, &rhs))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(&lhs, &rhs)?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        },
        BinaryOp::In => membership(&lhs, &rhs),
        BinaryOp::Contains | BinaryOp::StartsWith | BinaryOp::EndsWith => {
            let (Value::Str(haystack), Value::Str(needle)) = (&lhs, &rhs) else {
                return Err(ExprError::type_mismatch(format!(
                    "string operator applied to {} and {}",
                    lhs.type_name(),
                    rhs.type_name()
                )));
            };
            Ok(Value::Bool(match op {
                BinaryOp::Contains => haystack.contains(needle.as_str()),
                BinaryOp::StartsWith => haystack.starts_with(needle.as_str()),
                _ => haystack.ends_with(needle.as_str()),
            }))
        },
        BinaryOp::Add => add(lhs, rhs),
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => arithmetic(op, &lhs, &rhs),
        BinaryOp::And | BinaryOp::Or => Err("logical operators are evaluated lazily".into()),
    }
}

#[allow(clippy::cast_precision_loss)]
fn equals(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
        _ => lhs == rhs,
    }
}

#[allow(clippy::cast_precision_loss)]
fn compare(lhs: &Value, rhs: &Value) -> Result<Ordering> {
    let ordering = match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => None,
    };
    ordering.ok_or_else(|| {
        ExprError::type_mismatch(format!("cannot compare {} with {}", lhs.type_name(), rhs.type_name()))
    })
}

fn membership(needle: &Value, haystack: &Value) -> Result<Value> {
    let found = match (needle, haystack) {
        (_, Value::Array(items)) => items.iter().any(|item| equals(needle, item)),
        (Value::Str(key), Value::Map(map)) => map.contains_key(key),
        (Value::Str(sub), Value::Str(s)) => s.contains(sub.as_str()),
        (_, Value::Nil) => false,
        _ => {
            return Err(ExprError::type_mismatch(format!(
                "`in` is not defined for {} in {}",
                needle.type_name(),
                haystack.type_name()
            )));
        },
    };
    Ok(Value::Bool(found))
}

#[allow(clippy::cast_precision_loss)]
fn add(lhs: Value, rhs: Value) -> Result<Value> {
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
        (Value::Array(mut a), Value::Array(b)) => {
            a.extend(b);
            Ok(Value::Array(a))
        },
        (Value::Int(a), Value::Int(b)) => {
            a.checked_add(b).map(Value::Int).ok_or_else(|| ExprError::type_mismatch("integer overflow"))
        },
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
        (Value::Int(a), Value::Float(b)) => Ok(Value::Float(a as f64 + b)),
        (Value::Float(a), Value::Int(b)) => Ok(Value::Float(a + b as f64)),
        (a, b) => Err(ExprError::type_mismatch(format!("cannot add {} and {}", a.type_name(), b.type_name()))),
    }
}

#[allow(clippy::cast_precision_loss)]
fn arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value> {
    if let (Value::Int(a), Value::Int(b)) = (lhs, rhs) {
        let (a, b) = (*a, *b);
        if matches!(op, BinaryOp::Div | BinaryOp::Rem) && b == 0 {
            return Err(ExprError::DivisionByZero { context: None });
        }
        let result = match op {
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div => a.checked_div(b),
            _ => a.checked_rem(b),
        };
        return result.map(Value::Int).ok_or_else(|| ExprError::type_mismatch("integer overflow"));
    }

    let as_float = |v: &Value| match v {
        Value::Int(i) => Some(*i as f64),
        Value::Float(x) => Some(*x),
        _ => None,
    };
    let (Some(a), Some(b)) = (as_float(lhs), as_float(rhs)) else {
        return Err(ExprError::type_mismatch(format!(
            "arithmetic on {} and {}",
            lhs.type_name(),
            rhs.type_name()
        )));
    };

    match op {
        BinaryOp::Sub => Ok(Value::Float(a - b)),
        BinaryOp::Mul => Ok(Value::Float(a * b)),
        BinaryOp::Div if b == 0.0 => Err(ExprError::DivisionByZero { context: None }),
        BinaryOp::Div => Ok(Value::Float(a / b)),
        _ => Err(ExprError::type_mismatch("`%` is only defined for integers")),
    }
}

fn builtin(name: &str, args: &[Value]) -> Result<Value> {
    match (name, args) {
        ("len", [Value::Str(s)]) => Ok(Value::Int(length(s.chars().count()))),
        ("len", [Value::Array(items)]) => Ok(Value::Int(length(items.len()))),
        ("len", [Value::Map(map)]) => Ok(Value::Int(length(map.len()))),
        ("len", [Value::Nil]) => Ok(Value::Int(0)),
        ("lower", [Value::Str(s)]) => Ok(Value::Str(s.to_lowercase())),
        ("upper", [Value::Str(s)]) => Ok(Value::Str(s.to_uppercase())),
        _ => {
            let types = args.iter().map(Value::type_name).collect::<Vec<_>>().join(", ");
            Err(ExprError::type_mismatch(format!("{name}() does not accept ({types})")))
        },
    }
}

fn length(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
