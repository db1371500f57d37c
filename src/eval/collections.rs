// ABOUTME: each/map/fold/filter collection iterators (spec section 4.10)

use crate::ast::{ClosureLiteral, IterExpr, IterKind};
use crate::error::RillError;
use crate::scope::{Scope, ScopeRef};
use crate::signal::Control;
use crate::span::Span;
use crate::value::RillValue;
use std::collections::BTreeMap;

/// Dispatches an `IterExpr` (spec section 4.10). `each`/`map`/`filter` take
/// their source from an explicit `(expr)` or, if omitted, the current pipe
/// value; `fold`'s `(expr)` slot is its initial accumulator instead, and its
/// source is always the pipe value.
pub fn eval_iter(scope: &ScopeRef, it: &IterExpr) -> Result<RillValue, RillError> {
    let loc = it.span;
    if matches!(it.kind, IterKind::Fold) {
        let items = materialize_source(scope, &scope.pipe_value(), loc)?;
        let initial = match &it.accumulator {
            Some(e) => super::eval_expr_sync(scope, e)?,
            None => {
                return Err(RillError::invalid_pattern(
                    "fold requires an initial accumulator",
                    Some(loc),
                ))
            }
        };
        return eval_fold(scope, items, initial, &it.closure, loc);
    }

    let source_value = match &it.source {
        Some(e) => super::eval_expr_sync(scope, e)?,
        None => scope.pipe_value(),
    };
    let items = materialize_source(scope, &source_value, loc)?;
    match it.kind {
        IterKind::Each => eval_each(scope, items, &it.closure, it.accumulator.as_deref(), loc),
        IterKind::Map => eval_map(scope, items, &it.closure, loc),
        IterKind::Filter => eval_filter(scope, items, &it.closure, loc),
        IterKind::Fold => unreachable!(),
    }
}

/// Expands the iteration source into a concrete `Vec` (spec section 4.10:
/// list -> elements, string -> code points, dict -> `{key, value}` pairs in
/// sorted-key order, iterator -> `next()`-driven expansion bounded by the
/// effective iteration limit).
fn materialize_source(scope: &ScopeRef, value: &RillValue, loc: Span) -> Result<Vec<RillValue>, RillError> {
    match value {
        RillValue::List(items) => Ok((**items).clone()),
        RillValue::String(s) => Ok(s.chars().map(|c| RillValue::string(c.to_string())).collect()),
        RillValue::Dict(map) => Ok(map
            .iter()
            .map(|(k, v)| {
                let mut pair = BTreeMap::new();
                pair.insert("key".to_string(), RillValue::string(k.clone()));
                pair.insert("value".to_string(), v.clone());
                RillValue::dict(pair)
            })
            .collect()),
        RillValue::Iterator(_) => expand_iterator(scope, value.clone(), loc),
        other => Err(RillError::type_error(
            format!("cannot iterate over {}", other.infer_type()),
            Some(loc),
        )),
    }
}

fn expand_iterator(scope: &ScopeRef, mut current: RillValue, loc: Span) -> Result<Vec<RillValue>, RillError> {
    let limit = scope.effective_iteration_limit();
    let mut out = Vec::new();
    let mut count = 0u64;
    loop {
        scope.cancel.check(Some(loc))?;
        let RillValue::Iterator(iter) = &current else { break };
        if iter.done {
            break;
        }
        if let Some(v) = &iter.value {
            out.push(v.clone());
        }
        count += 1;
        if count > limit {
            return Err(RillError::limit_exceeded(limit, Some(loc)));
        }
        let RillValue::Callable(next) = &iter.next else {
            return Err(RillError::type_error("iterator 'next' must be a callable", Some(loc)));
        };
        current = super::closures::call_callable(scope, next, vec![], None, loc)?.value();
    }
    Ok(out)
}

fn bind_inline_params(
    parent_scope: &ScopeRef,
    closure: &ClosureLiteral,
    values: &[RillValue],
    loc: Span,
) -> Result<ScopeRef, RillError> {
    let call_scope = Scope::create_child(parent_scope);
    for (i, param) in closure.params.iter().enumerate() {
        let value = if let Some(v) = values.get(i) {
            v.clone()
        } else if let Some(default) = &param.default {
            super::eval_expr_sync(&call_scope, default)?
        } else {
            return Err(RillError::type_error(
                format!("missing argument '{}' for iterator closure", param.name),
                Some(loc),
            ));
        };
        let value = match param.type_tag {
            Some(tag) => super::types::assert_type(value, tag, loc)?,
            None => value,
        };
        call_scope.set_variable(&param.name, value, param.type_tag, Some(loc))?;
    }
    Ok(call_scope)
}

/// Runs one iteration of an inline `each`/`map`/`fold`/`filter` closure.
/// Its body executes with `Block` semantics, so an internal `return` is
/// already converted to a plain value before we see it here (spec section
/// 4.7); only `Value`/`Break` ever reach the callers below.
fn call_inline_closure(
    parent_scope: &ScopeRef,
    closure: &ClosureLiteral,
    values: &[RillValue],
    loc: Span,
) -> Result<Control, RillError> {
    let call_scope = bind_inline_params(parent_scope, closure, values, loc)?;
    super::control_flow::eval_block_statements(&call_scope, &closure.body.statements, false)
}

/// `each` (spec section 4.10): sequential, returns a list of every body
/// result (partial on `break`). An optional accumulator is threaded in as
/// the closure's second positional parameter when declared.
fn eval_each(
    scope: &ScopeRef,
    items: Vec<RillValue>,
    closure: &ClosureLiteral,
    accumulator_expr: Option<&crate::ast::Expr>,
    loc: Span,
) -> Result<RillValue, RillError> {
    let limit = scope.effective_iteration_limit();
    let mut acc = match accumulator_expr {
        Some(e) => super::eval_expr_sync(scope, e)?,
        None => RillValue::Null,
    };
    let mut results = Vec::new();
    for (i, item) in items.into_iter().enumerate() {
        scope.cancel.check(Some(loc))?;
        if i as u64 >= limit {
            return Err(RillError::limit_exceeded(limit, Some(loc)));
        }
        let values: Vec<RillValue> = if closure.params.len() >= 2 {
            vec![item, acc.clone()]
        } else {
            vec![item]
        };
        match call_inline_closure(scope, closure, &values, loc)? {
            Control::Value(v) => {
                acc = v.clone();
                results.push(v);
            }
            Control::Break(v) => {
                results.push(v);
                break;
            }
            Control::Return(v) => {
                acc = v.clone();
                results.push(v);
            }
        }
    }
    Ok(RillValue::list(results))
}

/// `map` (spec section 4.10): each element runs in its own fresh scope so
/// closures captured inside one element's body never see another's
/// bindings; order is preserved in the returned list. Elements run one
/// after another — genuine concurrent host-call dispatch would require
/// the whole evaluator to be async (see DESIGN.md), so `limit` currently
/// bounds an execution that is already sequential.
fn eval_map(scope: &ScopeRef, items: Vec<RillValue>, closure: &ClosureLiteral, loc: Span) -> Result<RillValue, RillError> {
    let limit = scope.effective_iteration_limit();
    let mut results = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        scope.cancel.check(Some(loc))?;
        if i as u64 >= limit {
            return Err(RillError::limit_exceeded(limit, Some(loc)));
        }
        match call_inline_closure(scope, closure, &[item], loc)? {
            Control::Value(v) | Control::Return(v) => results.push(v),
            Control::Break(v) => {
                results.push(v);
                break;
            }
        }
    }
    Ok(RillValue::list(results))
}

/// `filter` (spec section 4.10): predicate must yield a bool; order
/// preserved. Runs sequentially for the same reason `map` does.
fn eval_filter(scope: &ScopeRef, items: Vec<RillValue>, closure: &ClosureLiteral, loc: Span) -> Result<RillValue, RillError> {
    let limit = scope.effective_iteration_limit();
    let mut results = Vec::new();
    for (i, item) in items.into_iter().enumerate() {
        scope.cancel.check(Some(loc))?;
        if i as u64 >= limit {
            return Err(RillError::limit_exceeded(limit, Some(loc)));
        }
        let (keep, stop) = match call_inline_closure(scope, closure, &[item.clone()], loc)? {
            Control::Value(v) | Control::Return(v) => (v, false),
            Control::Break(v) => (v, true),
        };
        let RillValue::Bool(b) = keep else {
            return Err(RillError::type_error(
                format!("filter predicate must return a bool, found {}", keep.infer_type()),
                Some(loc),
            ));
        };
        if b {
            results.push(item);
        }
        if stop {
            break;
        }
    }
    Ok(RillValue::list(results))
}

/// `fold` (spec section 4.10): sequential reduction; an empty source
/// returns the initial accumulator unchanged.
fn eval_fold(
    scope: &ScopeRef,
    items: Vec<RillValue>,
    initial: RillValue,
    closure: &ClosureLiteral,
    loc: Span,
) -> Result<RillValue, RillError> {
    let limit = scope.effective_iteration_limit();
    let mut acc = initial;
    for (i, item) in items.into_iter().enumerate() {
        scope.cancel.check(Some(loc))?;
        if i as u64 >= limit {
            return Err(RillError::limit_exceeded(limit, Some(loc)));
        }
        match call_inline_closure(scope, closure, &[acc.clone(), item], loc)? {
            Control::Value(v) | Control::Return(v) => acc = v,
            Control::Break(v) => {
                acc = v;
                break;
            }
        }
    }
    Ok(acc)
}
