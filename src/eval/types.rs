// ABOUTME: binary/unary operator semantics, type assertions, assert/error raising (spec section 4.4)

use crate::ast::{BinOp, UnOp};
use crate::error::RillError;
use crate::span::Span;
use crate::value::{RillValue, TypeTag};

/// `+` on two strings concatenates; on two numbers adds; any other pairing
/// (including a string and anything else) is a `RUNTIME_TYPE_ERROR` (spec
/// section 4.4: operators do not coerce across types).
pub fn eval_binop(op: BinOp, left: RillValue, right: RillValue, loc: Option<Span>) -> Result<RillValue, RillError> {
    use RillValue::*;
    match op {
        BinOp::Or => Ok(Bool(left.is_truthy() || right.is_truthy())),
        BinOp::And => Ok(Bool(left.is_truthy() && right.is_truthy())),
        BinOp::Eq => Ok(Bool(left.deep_equals(&right))),
        BinOp::NotEq => Ok(Bool(!left.deep_equals(&right))),
        BinOp::Add => match (&left, &right) {
            (Number(a), Number(b)) => Ok(Number(a + b)),
            (String(a), String(b)) => Ok(RillValue::string(format!("{a}{b}"))),
            (List(a), List(b)) => {
                let mut out = (**a).clone();
                out.extend((**b).clone());
                Ok(RillValue::list(out))
            }
            _ => Err(type_mismatch("+", &left, &right, loc)),
        },
        BinOp::Sub => numeric(op, left, right, loc),
        BinOp::Mul => numeric(op, left, right, loc),
        BinOp::Div => match (&left, &right) {
            (Number(_), Number(b)) if *b == 0.0 => {
                Err(RillError::type_error("division by zero", loc))
            }
            _ => numeric(op, left, right, loc),
        },
        BinOp::Mod => match (&left, &right) {
            (Number(_), Number(b)) if *b == 0.0 => {
                Err(RillError::type_error("division by zero", loc))
            }
            _ => numeric(op, left, right, loc),
        },
        BinOp::Lt | BinOp::Gt | BinOp::LtEq | BinOp::GtEq => relational(op, left, right, loc),
    }
}

fn numeric(op: BinOp, left: RillValue, right: RillValue, loc: Option<Span>) -> Result<RillValue, RillError> {
    match (&left, &right) {
        (RillValue::Number(a), RillValue::Number(b)) => Ok(RillValue::Number(match op {
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => a / b,
            BinOp::Mod => a % b,
            _ => unreachable!(),
        })),
        _ => Err(type_mismatch(op_symbol(op), &left, &right, loc)),
    }
}

fn relational(op: BinOp, left: RillValue, right: RillValue, loc: Option<Span>) -> Result<RillValue, RillError> {
    let ordering = match (&left, &right) {
        (RillValue::Number(a), RillValue::Number(b)) => a.partial_cmp(b),
        (RillValue::String(a), RillValue::String(b)) => Some(a.as_ref().cmp(b.as_ref())),
        _ => return Err(type_mismatch(op_symbol(op), &left, &right, loc)),
    };
    let Some(ordering) = ordering else {
        return Ok(RillValue::Bool(false));
    };
    use std::cmp::Ordering::*;
    let result = match op {
        BinOp::Lt => ordering == Less,
        BinOp::Gt => ordering == Greater,
        BinOp::LtEq => ordering != Greater,
        BinOp::GtEq => ordering != Less,
        _ => unreachable!(),
    };
    Ok(RillValue::Bool(result))
}

fn op_symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Or => "||",
        BinOp::And => "&&",
        BinOp::Eq => "==",
        BinOp::NotEq => "!=",
        BinOp::Lt => "<",
        BinOp::Gt => ">",
        BinOp::LtEq => "<=",
        BinOp::GtEq => ">=",
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
    }
}

fn type_mismatch(op: &str, left: &RillValue, right: &RillValue, loc: Option<Span>) -> RillError {
    RillError::type_error(
        format!(
            "'{op}' is not defined for {} and {}",
            left.infer_type(),
            right.infer_type()
        ),
        loc,
    )
}

pub fn eval_unop(op: UnOp, operand: RillValue, loc: Option<Span>) -> Result<RillValue, RillError> {
    match (op, &operand) {
        (UnOp::Neg, RillValue::Number(n)) => Ok(RillValue::Number(-n)),
        (UnOp::Neg, other) => Err(RillError::type_error(
            format!("'-' is not defined for {}", other.infer_type()),
            loc,
        )),
        (UnOp::Not, _) => Ok(RillValue::Bool(!operand.is_truthy())),
    }
}

/// `expr:type` (spec section 4.4): errors with `RUNTIME_TYPE_ERROR` unless
/// the value's inferred type matches.
pub fn assert_type(value: RillValue, tag: TypeTag, loc: Span) -> Result<RillValue, RillError> {
    let actual = value.infer_type();
    if actual == tag {
        Ok(value)
    } else {
        Err(RillError::type_error(
            format!("expected {tag}, found {actual}"),
            Some(loc),
        ))
    }
}

pub fn check_type(value: &RillValue, tag: TypeTag) -> RillValue {
    RillValue::Bool(value.infer_type() == tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_concatenates_strings_and_sums_numbers() {
        assert_eq!(
            eval_binop(BinOp::Add, RillValue::Number(1.0), RillValue::Number(2.0), None).unwrap(),
            RillValue::Number(3.0)
        );
        assert_eq!(
            eval_binop(
                BinOp::Add,
                RillValue::string("a"),
                RillValue::string("b"),
                None
            )
            .unwrap(),
            RillValue::string("ab")
        );
    }

    #[test]
    fn add_across_types_is_a_type_error() {
        let err = eval_binop(BinOp::Add, RillValue::string("a"), RillValue::Number(1.0), None)
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::RuntimeTypeError);
    }

    #[test]
    fn division_by_zero_is_a_type_error_not_inf() {
        let err = eval_binop(BinOp::Div, RillValue::Number(1.0), RillValue::Number(0.0), None)
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::RuntimeTypeError);
    }

    #[test]
    fn relational_compares_strings_lexically() {
        assert_eq!(
            eval_binop(
                BinOp::Lt,
                RillValue::string("a"),
                RillValue::string("b"),
                None
            )
            .unwrap(),
            RillValue::Bool(true)
        );
    }

    #[test]
    fn assert_type_matches_or_errors() {
        assert!(assert_type(RillValue::Number(1.0), TypeTag::Number, Span::default()).is_ok());
        let err = assert_type(RillValue::Number(1.0), TypeTag::String, Span::default()).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::RuntimeTypeError);
    }
}
