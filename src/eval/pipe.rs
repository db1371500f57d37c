// ABOUTME: pipe-chain dispatch — host/closure/method/invoke calls, captures, closure-chains (spec section 4.6)

use crate::ast::{Argument, Expr, PipeChain, PipeTarget, SignalKind};
use crate::error::RillError;
use crate::scope::{Scope, ScopeRef};
use crate::signal::Control;
use crate::span::Span;
use crate::value::RillValue;

/// Dispatches a full `PipeChain` (spec section 4.6): evaluate the head,
/// then thread its result through each target as the new pipe value `$`.
pub fn eval_pipe_chain(scope: &ScopeRef, chain: &PipeChain) -> Result<Control, RillError> {
    let mut current = match super::eval_expr(scope, &chain.head)? {
        Control::Value(v) => v,
        other => return Ok(other),
    };
    scope.set_pipe_value(current.clone());

    for target in &chain.targets {
        scope.cancel.check(Some(chain.span))?;
        current = match eval_pipe_target(scope, target, &current)? {
            Control::Value(v) => v,
            other => return Ok(other),
        };
        scope.set_pipe_value(current.clone());
    }

    Ok(match chain.signal {
        Some(SignalKind::Break) => Control::Break(current),
        Some(SignalKind::Return) => Control::Return(current),
        None => Control::Value(current),
    })
}

fn eval_pipe_target(scope: &ScopeRef, target: &PipeTarget, current: &RillValue) -> Result<Control, RillError> {
    match target {
        PipeTarget::Expr(expr) => eval_pipe_target_expr(scope, expr, current),
        PipeTarget::Capture { name, type_tag, span } => {
            super::variables::eval_capture(scope, name, *type_tag, current.clone(), *span).map(Control::Value)
        }
        PipeTarget::ClosureChain(expr, span) => eval_closure_chain(scope, expr, current, *span),
    }
}

/// Most pipe targets are ordinary expressions evaluated against a fresh
/// child scope with `$` set to `current`; calls dispatched *directly* as a
/// pipe target additionally get the "zero explicit args" substitution rule
/// of spec section 4.6, so they're routed through the pipe-aware call
/// helpers below instead of plain `eval_expr`.
fn eval_pipe_target_expr(scope: &ScopeRef, expr: &Expr, current: &RillValue) -> Result<Control, RillError> {
    match expr {
        Expr::HostCall { namespace, name, args, span } => {
            eval_host_call(scope, namespace.as_deref(), name, args, *span, Some(current))
        }
        Expr::ClosureCall { callee, args, span } => eval_closure_call(scope, callee, args, *span, Some(current)),
        Expr::MethodCall { receiver, method, args, span } => {
            eval_method_call(scope, receiver, method, args, *span, Some(current))
        }
        Expr::Identifier(name, span) => eval_host_call(scope, None, name, &[], *span, Some(current)),
        other => {
            let child = Scope::create_child(scope);
            child.set_pipe_value(current.clone());
            super::eval_expr(&child, other)
        }
    }
}

pub fn eval_args(scope: &ScopeRef, args: &[Argument]) -> Result<Vec<(Option<String>, RillValue)>, RillError> {
    args.iter()
        .map(|a| Ok((a.name.clone(), super::eval_expr_sync(scope, &a.value)?)))
        .collect()
}

/// `[ns::]name(args)` (spec section 4.6): looks up a registered host
/// function by its (optionally namespaced) name and invokes it.
pub fn eval_host_call(
    scope: &ScopeRef,
    namespace: Option<&str>,
    name: &str,
    args: &[Argument],
    span: Span,
    pipe_subst: Option<&RillValue>,
) -> Result<Control, RillError> {
    let qualified = match namespace {
        Some(ns) => format!("{ns}::{name}"),
        None => name.to_string(),
    };
    let callable = scope
        .get_function(&qualified)
        .ok_or_else(|| RillError::undefined_function(&qualified, Some(span)))?;
    let RillValue::Callable(c) = &callable else {
        return Err(RillError::type_error(format!("'{qualified}' is not callable"), Some(span)));
    };
    let evaluated = eval_args(scope, args)?;
    super::closures::call_callable(scope, c, evaluated, pipe_subst.cloned(), span)
}

/// `$fn(args)` (spec section 4.6): the callee is evaluated as an ordinary
/// expression first (it may be a captured closure, a host-function
/// reference, or any other callable-producing expression).
pub fn eval_closure_call(
    scope: &ScopeRef,
    callee: &Expr,
    args: &[Argument],
    span: Span,
    pipe_subst: Option<&RillValue>,
) -> Result<Control, RillError> {
    let callee_value = super::eval_expr_sync(scope, callee)?;
    let RillValue::Callable(c) = &callee_value else {
        return Err(RillError::type_error(format!("cannot call a {}", callee_value.infer_type()), Some(span)));
    };
    let evaluated = eval_args(scope, args)?;
    super::closures::call_callable(scope, c, evaluated, pipe_subst.cloned(), span)
}

/// Postfix `expr(args)` (spec section 4.2): never gets pipe substitution,
/// since it isn't dispatched as a pipe target.
pub fn eval_invoke(scope: &ScopeRef, callee: &Expr, args: &[Argument], span: Span) -> Result<Control, RillError> {
    eval_closure_call(scope, callee, args, span, None)
}

/// `.method(args)` (spec section 4.6): a dict's own callable field wins
/// first, then the context's global method registry, then (for a
/// zero-arg call) a plain field read as property-accessor sugar.
pub fn eval_method_call(
    scope: &ScopeRef,
    receiver: &Expr,
    method: &str,
    args: &[Argument],
    span: Span,
    pipe_subst: Option<&RillValue>,
) -> Result<Control, RillError> {
    let receiver_value = super::eval_expr_sync(scope, receiver)?;
    let evaluated = eval_args(scope, args)?;
    let implicit_receiver = pipe_subst.cloned().unwrap_or_else(|| receiver_value.clone());

    if let RillValue::Dict(map) = &receiver_value {
        if let Some(RillValue::Callable(c)) = map.get(method) {
            return super::closures::call_callable(scope, c, evaluated, Some(implicit_receiver), span);
        }
    }
    if let Some(RillValue::Callable(c)) = scope.get_method(method) {
        return super::closures::call_callable(scope, &c, evaluated, Some(implicit_receiver), span);
    }
    if let RillValue::Dict(map) = &receiver_value {
        if evaluated.is_empty() {
            if let Some(v) = map.get(method) {
                return Ok(Control::Value(v.clone()));
            }
        }
    }
    Err(RillError::undefined_method(method, Some(span)))
}

/// `>> expr` (spec section 4.6): applies a callable, or each callable in a
/// list in order, to the current pipe value.
fn eval_closure_chain(scope: &ScopeRef, expr: &Expr, current: &RillValue, span: Span) -> Result<Control, RillError> {
    let target = super::eval_expr_sync(scope, expr)?;
    let callables: Vec<RillValue> = match target {
        RillValue::Callable(_) => vec![target],
        RillValue::List(items) => (*items).clone(),
        other => {
            return Err(RillError::type_error(
                format!("'>>' expects a callable or a list of callables, found {}", other.infer_type()),
                Some(span),
            ))
        }
    };

    let mut value = current.clone();
    for c in callables {
        let RillValue::Callable(callable) = &c else {
            return Err(RillError::type_error(format!("'>>' expects a callable, found {}", c.infer_type()), Some(span)));
        };
        value = match super::closures::call_callable(scope, callable, vec![], Some(value.clone()), span)? {
            Control::Value(v) => v,
            other => return Ok(other),
        };
    }
    Ok(Control::Value(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeOptions;
    use crate::host::HostFunctionDefinition;
    use crate::value::Callable;
    use std::rc::Rc;

    fn root_with_double() -> ScopeRef {
        let root = Scope::root(&RuntimeOptions::default());
        let def = HostFunctionDefinition::native("double", |args| match args {
            [RillValue::Number(n)] => Ok(RillValue::Number(n * 2.0)),
            _ => Err(RillError::type_error("double expects a number", None)),
        });
        root.define_function("double", RillValue::callable(Callable::Application(Rc::new(def))));
        root
    }

    #[test]
    fn host_call_with_explicit_arg_does_not_use_pipe_value() {
        let scope = root_with_double();
        let args = vec![Argument { name: None, value: Expr::Number(5.0, Span::default()) }];
        let control = eval_host_call(&scope, None, "double", &args, Span::default(), Some(&RillValue::Number(100.0))).unwrap();
        assert_eq!(control.value(), RillValue::Number(10.0));
    }

    #[test]
    fn undefined_host_function_is_a_runtime_error() {
        let scope = Scope::root(&RuntimeOptions::default());
        let err = eval_host_call(&scope, None, "missing", &[], Span::default(), None).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::RuntimeUndefinedFunction);
    }
}
