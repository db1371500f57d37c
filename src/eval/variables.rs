// ABOUTME: variable lookup, property/index access chains, and pipe captures (spec sections 4.5, 4.8)

use crate::ast::Accessor;
use crate::error::RillError;
use crate::scope::ScopeRef;
use crate::span::Span;
use crate::value::{RillValue, TupleValue, TypeTag};

/// Resolves `$name` (or bare `$`, meaning the scope's current pipe value)
/// and then walks the access chain left to right (spec section 4.8).
pub fn eval_variable(
    scope: &ScopeRef,
    name: &Option<String>,
    chain: &[Accessor],
    loc: Span,
) -> Result<RillValue, RillError> {
    let mut value = match name {
        Some(n) => scope
            .get_variable(n)
            .ok_or_else(|| RillError::undefined_variable(n, Some(loc)))?,
        None => scope.pipe_value(),
    };

    for accessor in chain {
        value = apply_accessor(scope, value, accessor, loc)?;
    }
    Ok(value)
}

fn apply_accessor(
    scope: &ScopeRef,
    value: RillValue,
    accessor: &Accessor,
    loc: Span,
) -> Result<RillValue, RillError> {
    match accessor {
        Accessor::Field(name) => field_access(&value, name, loc),
        Accessor::OptionalField(name) => match field_access(&value, name, loc) {
            Ok(v) => Ok(v),
            Err(e) if e.code == crate::error::ErrorCode::RuntimePropertyNotFound => {
                Ok(RillValue::Null)
            }
            Err(e) => Err(e),
        },
        Accessor::Coalesce(default_expr) => {
            if matches!(value, RillValue::Null) {
                super::eval_expr_sync(scope, default_expr)
            } else {
                Ok(value)
            }
        }
        Accessor::Index(index_expr) => {
            let index = super::eval_expr_sync(scope, index_expr)?;
            index_access(&value, &index, loc)
        }
    }
}

fn field_access(value: &RillValue, name: &str, loc: Span) -> Result<RillValue, RillError> {
    match value {
        RillValue::Dict(map) => map
            .get(name)
            .cloned()
            .ok_or_else(|| RillError::property_not_found(name, Some(loc))),
        RillValue::Tuple(t) => match t.as_ref() {
            TupleValue::Named(map) => map
                .get(name)
                .cloned()
                .ok_or_else(|| RillError::property_not_found(name, Some(loc))),
            TupleValue::Positional(items) => name
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).cloned())
                .ok_or_else(|| RillError::property_not_found(name, Some(loc))),
        },
        RillValue::Iterator(iter) => match name {
            "done" => Ok(RillValue::Bool(iter.done)),
            "value" => Ok(iter.value.clone().unwrap_or(RillValue::Null)),
            "next" => Ok(iter.next.clone()),
            _ => Err(RillError::property_not_found(name, Some(loc))),
        },
        RillValue::List(items) if name == "length" => Ok(RillValue::Number(items.len() as f64)),
        RillValue::String(s) if name == "length" => {
            Ok(RillValue::Number(s.chars().count() as f64))
        }
        other => Err(RillError::type_error(
            format!("cannot access field '{name}' on {}", other.infer_type()),
            Some(loc),
        )),
    }
}

fn index_access(value: &RillValue, index: &RillValue, loc: Span) -> Result<RillValue, RillError> {
    match (value, index) {
        (RillValue::List(items), RillValue::Number(n)) => resolve_index(*n, items.len())
            .and_then(|idx| items.get(idx))
            .cloned()
            .ok_or_else(|| RillError::property_not_found(&n.to_string(), Some(loc))),
        (RillValue::String(s), RillValue::Number(n)) => {
            let chars: Vec<char> = s.chars().collect();
            resolve_index(*n, chars.len())
                .and_then(|idx| chars.get(idx))
                .map(|c| RillValue::string(c.to_string()))
                .ok_or_else(|| RillError::property_not_found(&n.to_string(), Some(loc)))
        }
        (RillValue::Dict(map), RillValue::String(key)) => map
            .get(key.as_ref())
            .cloned()
            .ok_or_else(|| RillError::property_not_found(key, Some(loc))),
        (other, _) => Err(RillError::type_error(
            format!("cannot index into {}", other.infer_type()),
            Some(loc),
        )),
    }
}

/// Resolves a (possibly negative) index against `len` (spec section 4.8:
/// negative indices count from the end). Returns `None` when the index
/// falls outside `[0, len)` — including a negative index that underflows
/// past the start — so the caller raises `RUNTIME_PROPERTY_NOT_FOUND`
/// rather than silently clamping to element 0.
fn resolve_index(n: f64, len: usize) -> Option<usize> {
    if n < 0.0 {
        let resolved = len as f64 + n;
        if resolved < 0.0 {
            None
        } else {
            Some(resolved as usize)
        }
    } else {
        Some(n as usize)
    }
}

/// Spec section 4.8: "If the resolved terminal value is a callable with
/// zero parameters and appears in a context requiring a value (arithmetic,
/// comparison, negation), it is auto-invoked and its return value
/// substituted." Deliberately *not* applied to plain variable capture
/// (`:>`) or parameter binding — those are the idiom a closure is stashed
/// under a name for explicit later invocation (spec section 8 scenario 3's
/// `$factorial` late-bound recursion depends on the captured value staying
/// a callable, not its first call's result).
pub fn auto_invoke(scope: &ScopeRef, value: RillValue, loc: Span) -> Result<RillValue, RillError> {
    match &value {
        RillValue::Callable(c) if c.is_zero_arity() => {
            super::closures::call_callable(scope, c, vec![], None, loc).map(|control| control.value())
        }
        _ => Ok(value),
    }
}

/// `:> $name[:type]` (spec section 4.6): binds the current pipe value into
/// the chain's enclosing scope, asserting its type if one was given.
pub fn eval_capture(
    scope: &ScopeRef,
    name: &str,
    type_tag: Option<TypeTag>,
    value: RillValue,
    loc: Span,
) -> Result<RillValue, RillError> {
    let value = match type_tag {
        Some(tag) => super::types::assert_type(value, tag, loc)?,
        None => value,
    };
    scope.set_variable(name, value.clone(), type_tag, Some(loc))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeOptions;
    use crate::scope::Scope;
    use std::collections::BTreeMap;

    #[test]
    fn bare_dollar_reads_pipe_value() {
        let scope = Scope::root(&RuntimeOptions::default());
        scope.set_pipe_value(RillValue::Number(7.0));
        let v = eval_variable(&scope, &None, &[], Span::default()).unwrap();
        assert_eq!(v, RillValue::Number(7.0));
    }

    #[test]
    fn named_dollar_reads_binding_and_field_access_chains() {
        let scope = Scope::root(&RuntimeOptions::default());
        let mut map = BTreeMap::new();
        map.insert("name".to_string(), RillValue::string("rill"));
        scope
            .set_variable("obj", RillValue::dict(map), None, None)
            .unwrap();
        let v = eval_variable(
            &scope,
            &Some("obj".to_string()),
            &[Accessor::Field("name".to_string())],
            Span::default(),
        )
        .unwrap();
        assert_eq!(v, RillValue::string("rill"));
    }

    #[test]
    fn optional_field_access_on_missing_key_is_null() {
        let scope = Scope::root(&RuntimeOptions::default());
        scope
            .set_variable("obj", RillValue::dict(BTreeMap::new()), None, None)
            .unwrap();
        let v = eval_variable(
            &scope,
            &Some("obj".to_string()),
            &[Accessor::OptionalField("missing".to_string())],
            Span::default(),
        )
        .unwrap();
        assert_eq!(v, RillValue::Null);
    }

    #[test]
    fn negative_index_counts_from_end() {
        let list = RillValue::list(vec![RillValue::Number(1.0), RillValue::Number(2.0)]);
        let result = index_access(&list, &RillValue::Number(-1.0), Span::default()).unwrap();
        assert_eq!(result, RillValue::Number(2.0));
    }
}
