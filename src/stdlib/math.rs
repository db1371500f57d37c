// ABOUTME: bundled math host functions for rillc's demo standard library

use crate::error::RillError;
use crate::value::RillValue;
use rill_macros::host_fn;

fn expect_two_numbers(args: &[RillValue], fn_name: &str) -> Result<(f64, f64), RillError> {
    match args {
        [RillValue::Number(a), RillValue::Number(b)] => Ok((*a, *b)),
        _ => Err(RillError::type_error(
            format!("{fn_name} expects two numbers"),
            None,
        )),
    }
}

fn expect_one_number(args: &[RillValue], fn_name: &str) -> Result<f64, RillError> {
    match args {
        [RillValue::Number(n)] => Ok(*n),
        _ => Err(RillError::type_error(
            format!("{fn_name} expects a single number"),
            None,
        )),
    }
}

/// Adds two numbers.
///
/// # Examples
///
/// ```rill
/// 2 -> math::add(3)
/// ```
#[host_fn(name = "math::add", category = "Math")]
fn math_add(args: &[RillValue]) -> Result<RillValue, RillError> {
    let (a, b) = expect_two_numbers(args, "math::add")?;
    Ok(RillValue::Number(a + b))
}

/// Subtracts the second number from the first.
///
/// # Examples
///
/// ```rill
/// 5 -> math::sub(2)
/// ```
#[host_fn(name = "math::sub", category = "Math")]
fn math_sub(args: &[RillValue]) -> Result<RillValue, RillError> {
    let (a, b) = expect_two_numbers(args, "math::sub")?;
    Ok(RillValue::Number(a - b))
}

/// Multiplies two numbers.
///
/// # Examples
///
/// ```rill
/// 3 -> math::mul(4)
/// ```
#[host_fn(name = "math::mul", category = "Math")]
fn math_mul(args: &[RillValue]) -> Result<RillValue, RillError> {
    let (a, b) = expect_two_numbers(args, "math::mul")?;
    Ok(RillValue::Number(a * b))
}

/// Divides the first number by the second; raises a runtime type error on division by zero.
///
/// # Examples
///
/// ```rill
/// 10 -> math::div(2)
/// ```
#[host_fn(name = "math::div", category = "Math")]
fn math_div(args: &[RillValue]) -> Result<RillValue, RillError> {
    let (a, b) = expect_two_numbers(args, "math::div")?;
    if b == 0.0 {
        return Err(RillError::type_error("math::div cannot divide by zero", None));
    }
    Ok(RillValue::Number(a / b))
}

/// Absolute value.
///
/// # Examples
///
/// ```rill
/// -5 -> math::abs
/// ```
#[host_fn(name = "math::abs", category = "Math")]
fn math_abs(args: &[RillValue]) -> Result<RillValue, RillError> {
    let n = expect_one_number(args, "math::abs")?;
    Ok(RillValue::Number(n.abs()))
}

/// Square root; raises a runtime type error for a negative input.
///
/// # Examples
///
/// ```rill
/// 16 -> math::sqrt
/// ```
#[host_fn(name = "math::sqrt", category = "Math")]
fn math_sqrt(args: &[RillValue]) -> Result<RillValue, RillError> {
    let n = expect_one_number(args, "math::sqrt")?;
    if n < 0.0 {
        return Err(RillError::type_error(
            "math::sqrt cannot take the square root of a negative number",
            None,
        ));
    }
    Ok(RillValue::Number(n.sqrt()))
}

/// Raises the first number to the power of the second.
///
/// # Examples
///
/// ```rill
/// 2 -> math::pow(10)
/// ```
#[host_fn(name = "math::pow", category = "Math")]
fn math_pow(args: &[RillValue]) -> Result<RillValue, RillError> {
    let (a, b) = expect_two_numbers(args, "math::pow")?;
    Ok(RillValue::Number(a.powf(b)))
}

/// The smaller of two numbers.
///
/// # Examples
///
/// ```rill
/// 3 -> math::min(7)
/// ```
///
/// # See also
///
/// math::max
#[host_fn(name = "math::min", category = "Math", related("math::max"))]
fn math_min(args: &[RillValue]) -> Result<RillValue, RillError> {
    let (a, b) = expect_two_numbers(args, "math::min")?;
    Ok(RillValue::Number(a.min(b)))
}

/// The larger of two numbers.
///
/// # Examples
///
/// ```rill
/// 3 -> math::max(7)
/// ```
///
/// # See also
///
/// math::min
#[host_fn(name = "math::max", category = "Math", related("math::min"))]
fn math_max(args: &[RillValue]) -> Result<RillValue, RillError> {
    let (a, b) = expect_two_numbers(args, "math::max")?;
    Ok(RillValue::Number(a.max(b)))
}

/// Rounds a number to the nearest integer.
///
/// # Examples
///
/// ```rill
/// 2.6 -> math::round
/// ```
#[host_fn(name = "math::round", category = "Math")]
fn math_round(args: &[RillValue]) -> Result<RillValue, RillError> {
    let n = expect_one_number(args, "math::round")?;
    Ok(RillValue::Number(n.round()))
}

pub(crate) fn register_all(ctx: &crate::scope::ScopeRef) {
    register_math_add(ctx);
    register_math_sub(ctx);
    register_math_mul(ctx);
    register_math_div(ctx);
    register_math_abs(ctx);
    register_math_sqrt(ctx);
    register_math_pow(ctx);
    register_math_min(ctx);
    register_math_max(ctx);
    register_math_round(ctx);
}

pub(crate) fn register_all_help() {
    register_help_math_add();
    register_help_math_sub();
    register_help_math_mul();
    register_help_math_div();
    register_help_math_abs();
    register_help_math_sqrt();
    register_help_math_pow();
    register_help_math_min();
    register_help_math_max();
    register_help_math_round();
}
