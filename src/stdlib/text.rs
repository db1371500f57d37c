// ABOUTME: bundled string host functions for rillc's demo standard library

use crate::error::RillError;
use crate::value::RillValue;
use rill_macros::host_fn;

fn expect_string<'a>(args: &'a [RillValue], fn_name: &str) -> Result<&'a str, RillError> {
    match args {
        [RillValue::String(s)] => Ok(s.as_ref()),
        _ => Err(RillError::type_error(
            format!("{fn_name} expects a single string argument"),
            None,
        )),
    }
}

/// Uppercases a string.
///
/// # Examples
///
/// ```rill
/// "hello" -> str::upper
/// ```
///
/// # See also
///
/// str::lower
#[host_fn(name = "str::upper", category = "String", related("str::lower"))]
fn str_upper(args: &[RillValue]) -> Result<RillValue, RillError> {
    let s = expect_string(args, "str::upper")?;
    Ok(RillValue::string(s.to_uppercase()))
}

/// Lowercases a string.
///
/// # Examples
///
/// ```rill
/// "HELLO" -> str::lower
/// ```
///
/// # See also
///
/// str::upper
#[host_fn(name = "str::lower", category = "String", related("str::upper"))]
fn str_lower(args: &[RillValue]) -> Result<RillValue, RillError> {
    let s = expect_string(args, "str::lower")?;
    Ok(RillValue::string(s.to_lowercase()))
}

/// Trims leading and trailing whitespace from a string.
///
/// # Examples
///
/// ```rill
/// "  hi  " -> str::trim
/// ```
#[host_fn(name = "str::trim", category = "String")]
fn str_trim(args: &[RillValue]) -> Result<RillValue, RillError> {
    let s = expect_string(args, "str::trim")?;
    Ok(RillValue::string(s.trim()))
}

/// Splits a string on a separator, returning a list of substrings.
///
/// # Examples
///
/// ```rill
/// "a,b,c" -> str::split(",")
/// ```
///
/// # See also
///
/// str::join
#[host_fn(name = "str::split", category = "String", related("str::join"))]
fn str_split(args: &[RillValue]) -> Result<RillValue, RillError> {
    match args {
        [RillValue::String(s), RillValue::String(sep)] => {
            let parts = if sep.is_empty() {
                vec![RillValue::string(s.as_ref())]
            } else {
                s.split(sep.as_ref())
                    .map(RillValue::string)
                    .collect::<Vec<_>>()
            };
            Ok(RillValue::list(parts))
        }
        _ => Err(RillError::type_error(
            "str::split expects (string, separator)",
            None,
        )),
    }
}

/// Joins a list of strings with a separator.
///
/// # Examples
///
/// ```rill
/// ["a", "b", "c"] -> str::join(",")
/// ```
///
/// # See also
///
/// str::split
#[host_fn(name = "str::join", category = "String", related("str::split"))]
fn str_join(args: &[RillValue]) -> Result<RillValue, RillError> {
    match args {
        [RillValue::List(items), RillValue::String(sep)] => {
            let mut parts = Vec::with_capacity(items.len());
            for item in items.iter() {
                match item {
                    RillValue::String(s) => parts.push(s.to_string()),
                    other => {
                        return Err(RillError::type_error(
                            format!("str::join expects a list of strings, found {}", other.infer_type()),
                            None,
                        ))
                    }
                }
            }
            Ok(RillValue::string(parts.join(sep.as_ref())))
        }
        _ => Err(RillError::type_error(
            "str::join expects (list, separator)",
            None,
        )),
    }
}

/// Reports whether a string contains a substring.
///
/// # Examples
///
/// ```rill
/// "hello world" -> str::contains("world")
/// ```
#[host_fn(name = "str::contains", category = "String")]
fn str_contains(args: &[RillValue]) -> Result<RillValue, RillError> {
    match args {
        [RillValue::String(s), RillValue::String(needle)] => {
            Ok(RillValue::Bool(s.contains(needle.as_ref())))
        }
        _ => Err(RillError::type_error(
            "str::contains expects (string, substring)",
            None,
        )),
    }
}

/// Returns the length of a string, in characters.
///
/// # Examples
///
/// ```rill
/// "hello" -> str::len
/// ```
#[host_fn(name = "str::len", category = "String")]
fn str_len(args: &[RillValue]) -> Result<RillValue, RillError> {
    let s = expect_string(args, "str::len")?;
    Ok(RillValue::Number(s.chars().count() as f64))
}

/// Replaces every occurrence of a substring with a replacement.
///
/// # Examples
///
/// ```rill
/// "a-b-c" -> str::replace("-", "_")
/// ```
#[host_fn(name = "str::replace", category = "String")]
fn str_replace(args: &[RillValue]) -> Result<RillValue, RillError> {
    match args {
        [RillValue::String(s), RillValue::String(from), RillValue::String(to)] => {
            Ok(RillValue::string(s.replace(from.as_ref(), to.as_ref())))
        }
        _ => Err(RillError::type_error(
            "str::replace expects (string, from, to)",
            None,
        )),
    }
}

pub(crate) fn register_all(ctx: &crate::scope::ScopeRef) {
    register_str_upper(ctx);
    register_str_lower(ctx);
    register_str_trim(ctx);
    register_str_split(ctx);
    register_str_join(ctx);
    register_str_contains(ctx);
    register_str_len(ctx);
    register_str_replace(ctx);
}

pub(crate) fn register_all_help() {
    register_help_str_upper();
    register_help_str_lower();
    register_help_str_trim();
    register_help_str_split();
    register_help_str_join();
    register_help_str_contains();
    register_help_str_len();
    register_help_str_replace();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upper_and_lower_round_trip() {
        assert_eq!(
            str_upper(&[RillValue::string("hello")]).unwrap(),
            RillValue::string("HELLO")
        );
        assert_eq!(
            str_lower(&[RillValue::string("HELLO")]).unwrap(),
            RillValue::string("hello")
        );
    }

    #[test]
    fn split_then_join_is_the_identity() {
        let split = str_split(&[RillValue::string("a,b,c"), RillValue::string(",")]).unwrap();
        let joined = str_join(&[split, RillValue::string(",")]).unwrap();
        assert_eq!(joined, RillValue::string("a,b,c"));
    }

    #[test]
    fn contains_reports_substring_membership() {
        assert_eq!(
            str_contains(&[RillValue::string("hello world"), RillValue::string("world")]).unwrap(),
            RillValue::Bool(true)
        );
        assert_eq!(
            str_contains(&[RillValue::string("hello world"), RillValue::string("xyz")]).unwrap(),
            RillValue::Bool(false)
        );
    }

    #[test]
    fn wrong_arity_is_a_type_error() {
        assert!(str_upper(&[]).is_err());
    }
}
