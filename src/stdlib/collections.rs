// ABOUTME: bundled list/dict host functions for rillc's demo standard library

use crate::error::RillError;
use crate::value::RillValue;
use rill_macros::host_fn;

fn expect_list<'a>(args: &'a [RillValue], fn_name: &str) -> Result<&'a [RillValue], RillError> {
    match args {
        [RillValue::List(items)] => Ok(items.as_slice()),
        _ => Err(RillError::type_error(
            format!("{fn_name} expects a single list argument"),
            None,
        )),
    }
}

fn expect_numbers<'a>(items: &'a [RillValue], fn_name: &str) -> Result<Vec<f64>, RillError> {
    items
        .iter()
        .map(|v| match v {
            RillValue::Number(n) => Ok(*n),
            other => Err(RillError::type_error(
                format!("{fn_name} expects a list of numbers, found {}", other.infer_type()),
                None,
            )),
        })
        .collect()
}

/// Sums a list of numbers.
///
/// # Examples
///
/// ```rill
/// [1, 2, 3] -> list::sum
/// ```
#[host_fn(name = "list::sum", category = "Collection")]
fn list_sum(args: &[RillValue]) -> Result<RillValue, RillError> {
    let items = expect_list(args, "list::sum")?;
    let total: f64 = expect_numbers(items, "list::sum")?.into_iter().sum();
    Ok(RillValue::Number(total))
}

/// Reverses a list.
///
/// # Examples
///
/// ```rill
/// [1, 2, 3] -> list::reverse
/// ```
#[host_fn(name = "list::reverse", category = "Collection")]
fn list_reverse(args: &[RillValue]) -> Result<RillValue, RillError> {
    let items = expect_list(args, "list::reverse")?;
    let mut reversed = items.to_vec();
    reversed.reverse();
    Ok(RillValue::list(reversed))
}

/// Sorts a list of numbers or a list of strings in ascending order.
///
/// # Examples
///
/// ```rill
/// [3, 1, 2] -> list::sort
/// ```
#[host_fn(name = "list::sort", category = "Collection")]
fn list_sort(args: &[RillValue]) -> Result<RillValue, RillError> {
    let items = expect_list(args, "list::sort")?;
    if items.iter().all(|v| matches!(v, RillValue::Number(_))) {
        let mut numbers = expect_numbers(items, "list::sort")?;
        numbers.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        return Ok(RillValue::list(numbers.into_iter().map(RillValue::Number).collect()));
    }
    if items.iter().all(|v| matches!(v, RillValue::String(_))) {
        let mut strings: Vec<String> = items
            .iter()
            .map(|v| match v {
                RillValue::String(s) => s.to_string(),
                _ => unreachable!(),
            })
            .collect();
        strings.sort();
        return Ok(RillValue::list(strings.into_iter().map(RillValue::string).collect()));
    }
    Err(RillError::type_error(
        "list::sort expects a list of all-numbers or all-strings",
        None,
    ))
}

/// Removes duplicate elements, keeping first occurrence order, comparing elements structurally.
///
/// # Examples
///
/// ```rill
/// [1, 2, 1, 3, 2] -> list::unique
/// ```
#[host_fn(name = "list::unique", category = "Collection")]
fn list_unique(args: &[RillValue]) -> Result<RillValue, RillError> {
    let items = expect_list(args, "list::unique")?;
    let mut out: Vec<RillValue> = Vec::new();
    for item in items {
        if !out.iter().any(|existing| existing.deep_equals(item)) {
            out.push(item.clone());
        }
    }
    Ok(RillValue::list(out))
}

/// The number of elements in a list.
///
/// # Examples
///
/// ```rill
/// [1, 2, 3] -> list::len
/// ```
#[host_fn(name = "list::len", category = "Collection")]
fn list_len(args: &[RillValue]) -> Result<RillValue, RillError> {
    let items = expect_list(args, "list::len")?;
    Ok(RillValue::Number(items.len() as f64))
}

/// The keys of a dict, as a list of strings.
///
/// # Examples
///
/// ```rill
/// {a: 1, b: 2} -> dict::keys
/// ```
///
/// # See also
///
/// dict::values
#[host_fn(name = "dict::keys", category = "Collection", related("dict::values"))]
fn dict_keys(args: &[RillValue]) -> Result<RillValue, RillError> {
    match args {
        [RillValue::Dict(map)] => Ok(RillValue::list(map.keys().map(RillValue::string).collect())),
        _ => Err(RillError::type_error("dict::keys expects a single dict argument", None)),
    }
}

/// The values of a dict, in key order.
///
/// # Examples
///
/// ```rill
/// {a: 1, b: 2} -> dict::values
/// ```
///
/// # See also
///
/// dict::keys
#[host_fn(name = "dict::values", category = "Collection", related("dict::keys"))]
fn dict_values(args: &[RillValue]) -> Result<RillValue, RillError> {
    match args {
        [RillValue::Dict(map)] => Ok(RillValue::list(map.values().cloned().collect())),
        _ => Err(RillError::type_error("dict::values expects a single dict argument", None)),
    }
}

/// Reports whether a dict has a given key.
///
/// # Examples
///
/// ```rill
/// {a: 1} -> dict::has("a")
/// ```
#[host_fn(name = "dict::has", category = "Collection")]
fn dict_has(args: &[RillValue]) -> Result<RillValue, RillError> {
    match args {
        [RillValue::Dict(map), RillValue::String(key)] => Ok(RillValue::Bool(map.contains_key(key.as_ref()))),
        _ => Err(RillError::type_error("dict::has expects (dict, key)", None)),
    }
}

pub(crate) fn register_all(ctx: &crate::scope::ScopeRef) {
    register_list_sum(ctx);
    register_list_reverse(ctx);
    register_list_sort(ctx);
    register_list_unique(ctx);
    register_list_len(ctx);
    register_dict_keys(ctx);
    register_dict_values(ctx);
    register_dict_has(ctx);
}

pub(crate) fn register_all_help() {
    register_help_list_sum();
    register_help_list_reverse();
    register_help_list_sort();
    register_help_list_unique();
    register_help_list_len();
    register_help_dict_keys();
    register_help_dict_values();
    register_help_dict_has();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_and_reverse() {
        let list = RillValue::list(vec![RillValue::Number(1.0), RillValue::Number(2.0), RillValue::Number(3.0)]);
        assert_eq!(list_sum(&[list.clone()]).unwrap(), RillValue::Number(6.0));
        assert_eq!(
            list_reverse(&[list]).unwrap(),
            RillValue::list(vec![RillValue::Number(3.0), RillValue::Number(2.0), RillValue::Number(1.0)])
        );
    }

    #[test]
    fn sort_numbers_ascending() {
        let list = RillValue::list(vec![RillValue::Number(3.0), RillValue::Number(1.0), RillValue::Number(2.0)]);
        assert_eq!(
            list_sort(&[list]).unwrap(),
            RillValue::list(vec![RillValue::Number(1.0), RillValue::Number(2.0), RillValue::Number(3.0)])
        );
    }

    #[test]
    fn unique_keeps_first_occurrence_order() {
        let list = RillValue::list(vec![
            RillValue::Number(1.0),
            RillValue::Number(2.0),
            RillValue::Number(1.0),
            RillValue::Number(3.0),
        ]);
        assert_eq!(
            list_unique(&[list]).unwrap(),
            RillValue::list(vec![RillValue::Number(1.0), RillValue::Number(2.0), RillValue::Number(3.0)])
        );
    }

    #[test]
    fn dict_keys_values_and_has() {
        let mut map = std::collections::BTreeMap::new();
        map.insert("a".to_string(), RillValue::Number(1.0));
        map.insert("b".to_string(), RillValue::Number(2.0));
        let dict = RillValue::dict(map);
        assert_eq!(
            dict_keys(&[dict.clone()]).unwrap(),
            RillValue::list(vec![RillValue::string("a"), RillValue::string("b")])
        );
        assert_eq!(
            dict_values(&[dict.clone()]).unwrap(),
            RillValue::list(vec![RillValue::Number(1.0), RillValue::Number(2.0)])
        );
        assert_eq!(dict_has(&[dict.clone(), RillValue::string("a")]).unwrap(), RillValue::Bool(true));
        assert_eq!(dict_has(&[dict, RillValue::string("z")]).unwrap(), RillValue::Bool(false));
    }
}
