// ABOUTME: destructure/slice/spread operators against the current pipe value (spec section 4.11)

use crate::ast::{DestructureElement, DestructurePattern, Expr};
use crate::error::RillError;
use crate::scope::ScopeRef;
use crate::span::Span;
use crate::value::{RillValue, TupleValue};

/// `*<pattern>` (spec section 4.11): binds names from the current pipe
/// value, leaving it unchanged as the chain's result.
pub fn eval_destructure(scope: &ScopeRef, pattern: &DestructurePattern, loc: Span) -> Result<RillValue, RillError> {
    let value = scope.pipe_value();
    match pattern {
        DestructurePattern::Positional(elems) => bind_positional(scope, elems, &value, loc)?,
        DestructurePattern::Keyed(entries) => bind_keyed(scope, entries, &value, loc)?,
    }
    Ok(value)
}

fn bind_positional(
    scope: &ScopeRef,
    elems: &[DestructureElement],
    value: &RillValue,
    loc: Span,
) -> Result<(), RillError> {
    let RillValue::List(items) = value else {
        return Err(RillError::invalid_pattern(
            format!("positional destructure expects a list, found {}", value.infer_type()),
            Some(loc),
        ));
    };
    if items.len() != elems.len() {
        return Err(RillError::invalid_pattern(
            format!("pattern expects {} element(s), found {}", elems.len(), items.len()),
            Some(loc),
        ));
    }
    for (elem, item) in elems.iter().zip(items.iter()) {
        bind_element(scope, elem, item, loc)?;
    }
    Ok(())
}

fn bind_keyed(
    scope: &ScopeRef,
    entries: &[(String, DestructureElement)],
    value: &RillValue,
    loc: Span,
) -> Result<(), RillError> {
    let RillValue::Dict(map) = value else {
        return Err(RillError::invalid_pattern(
            format!("keyed destructure expects a dict, found {}", value.infer_type()),
            Some(loc),
        ));
    };
    for (key, elem) in entries {
        let item = map
            .get(key)
            .ok_or_else(|| RillError::property_not_found(key, Some(loc)))?;
        bind_element(scope, elem, item, loc)?;
    }
    Ok(())
}

fn bind_element(scope: &ScopeRef, elem: &DestructureElement, value: &RillValue, loc: Span) -> Result<(), RillError> {
    match elem {
        DestructureElement::Skip => Ok(()),
        DestructureElement::Bind(name, type_tag) => {
            let bound = match type_tag {
                Some(tag) => super::types::assert_type(value.clone(), *tag, loc)?,
                None => value.clone(),
            };
            scope.set_variable(name, bound, *type_tag, Some(loc))
        }
        DestructureElement::Nested(pattern) => match pattern {
            DestructurePattern::Positional(elems) => bind_positional(scope, elems, value, loc),
            DestructurePattern::Keyed(entries) => bind_keyed(scope, entries, value, loc),
        },
    }
}

/// `/<start:stop:step>` (spec section 4.11): Python-style slicing of the
/// current pipe value (list or string).
pub fn eval_slice(
    scope: &ScopeRef,
    start: Option<&Expr>,
    stop: Option<&Expr>,
    step: Option<&Expr>,
    loc: Span,
) -> Result<RillValue, RillError> {
    let value = scope.pipe_value();
    let step_n = match step {
        Some(e) => match super::eval_expr_sync(scope, e)? {
            RillValue::Number(n) => n as i64,
            other => {
                return Err(RillError::type_error(
                    format!("slice step expects a number, found {}", other.infer_type()),
                    Some(loc),
                ))
            }
        },
        None => 1,
    };
    if step_n == 0 {
        return Err(RillError::type_error("slice step cannot be 0", Some(loc)));
    }

    match &value {
        RillValue::List(items) => {
            let indices = slice_indices(scope, items.len(), start, stop, step_n, loc)?;
            Ok(RillValue::list(indices.into_iter().map(|i| items[i].clone()).collect()))
        }
        RillValue::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let indices = slice_indices(scope, chars.len(), start, stop, step_n, loc)?;
            Ok(RillValue::string(indices.into_iter().map(|i| chars[i]).collect::<String>()))
        }
        other => Err(RillError::type_error(
            format!("cannot slice {}", other.infer_type()),
            Some(loc),
        )),
    }
}

fn resolve_bound(scope: &ScopeRef, e: Option<&Expr>, loc: Span) -> Result<Option<i64>, RillError> {
    match e {
        Some(expr) => match super::eval_expr_sync(scope, expr)? {
            RillValue::Number(n) => Ok(Some(n as i64)),
            other => Err(RillError::type_error(
                format!("slice bound expects a number, found {}", other.infer_type()),
                Some(loc),
            )),
        },
        None => Ok(None),
    }
}

/// Normalizes negative indices from the end and clamps into `[0, len]`
/// (ascending) or defaults to the reverse-traversal range (descending),
/// matching Python's slice semantics.
fn slice_indices(
    scope: &ScopeRef,
    len: usize,
    start: Option<&Expr>,
    stop: Option<&Expr>,
    step: i64,
    loc: Span,
) -> Result<Vec<usize>, RillError> {
    let start_v = resolve_bound(scope, start, loc)?;
    let stop_v = resolve_bound(scope, stop, loc)?;
    let len_i = len as i64;
    let norm = |n: i64| -> i64 {
        if n < 0 {
            n + len_i
        } else {
            n
        }
    };

    let mut out = Vec::new();
    if step > 0 {
        let lo = start_v.map(norm).unwrap_or(0).clamp(0, len_i);
        let hi = stop_v.map(norm).unwrap_or(len_i).clamp(0, len_i);
        let mut i = lo;
        while i < hi {
            out.push(i as usize);
            i += step;
        }
    } else {
        let lo = start_v.map(norm).unwrap_or(len_i - 1).clamp(-1, len_i - 1);
        let hi = stop_v.map(norm).unwrap_or(-1).clamp(-1, len_i - 1);
        let mut i = lo;
        while i > hi {
            if i >= 0 && i < len_i {
                out.push(i as usize);
            }
            i += step;
        }
    }
    Ok(out)
}

/// `*expr` (spec section 4.11): converts a list/dict into a positional/
/// named tuple, for the next callable to optionally unpack as arguments.
pub fn eval_spread(scope: &ScopeRef, inner: Option<&Expr>, loc: Span) -> Result<RillValue, RillError> {
    let value = match inner {
        Some(e) => super::eval_expr_sync(scope, e)?,
        None => scope.pipe_value(),
    };
    match value {
        RillValue::List(items) => Ok(RillValue::Tuple(std::rc::Rc::new(TupleValue::Positional((*items).clone())))),
        RillValue::Dict(map) => Ok(RillValue::Tuple(std::rc::Rc::new(TupleValue::Named((*map).clone())))),
        other => Err(RillError::type_error(
            format!("cannot spread {}", other.infer_type()),
            Some(loc),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeOptions;
    use crate::scope::Scope;

    #[test]
    fn positional_destructure_binds_each_element() {
        let scope = Scope::root(&RuntimeOptions::default());
        scope.set_pipe_value(RillValue::list(vec![RillValue::Number(1.0), RillValue::Number(2.0)]));
        let pattern = DestructurePattern::Positional(vec![
            DestructureElement::Bind("a".into(), None),
            DestructureElement::Skip,
        ]);
        eval_destructure(&scope, &pattern, Span::default()).unwrap();
        assert_eq!(scope.get_variable("a"), Some(RillValue::Number(1.0)));
    }

    #[test]
    fn slice_with_negative_bounds_matches_python_semantics() {
        let scope = Scope::root(&RuntimeOptions::default());
        scope.set_pipe_value(RillValue::list(vec![
            RillValue::Number(0.0),
            RillValue::Number(1.0),
            RillValue::Number(2.0),
            RillValue::Number(3.0),
        ]));
        let result = eval_slice(&scope, None, Some(&Expr::Number(-1.0, Span::default())), None, Span::default()).unwrap();
        assert_eq!(result, RillValue::list(vec![RillValue::Number(0.0), RillValue::Number(1.0), RillValue::Number(2.0)]));
    }

    #[test]
    fn slice_step_zero_is_an_error() {
        let scope = Scope::root(&RuntimeOptions::default());
        scope.set_pipe_value(RillValue::list(vec![RillValue::Number(1.0)]));
        let err = eval_slice(&scope, None, None, Some(&Expr::Number(0.0, Span::default())), Span::default()).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::RuntimeTypeError);
    }

    #[test]
    fn spread_converts_list_to_positional_tuple() {
        let scope = Scope::root(&RuntimeOptions::default());
        let result = eval_spread(
            &scope,
            Some(&Expr::ListLiteral(vec![Expr::Number(1.0, Span::default())], Span::default())),
            Span::default(),
        )
        .unwrap();
        assert!(matches!(result, RillValue::Tuple(t) if matches!(t.as_ref(), TupleValue::Positional(v) if v.len() == 1)));
    }
}
