// ABOUTME: conditional/while/do-while/block evaluation, assert/error-raise (spec section 4.7)

use crate::ast::{ClosureBody, Expr, Stmt};
use crate::error::RillError;
use crate::scope::{Scope, ScopeRef};
use crate::signal::Control;
use crate::span::Span;
use crate::value::RillValue;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Runs `statements` as a `Block`/closure-body/top-level script (spec
/// section 4.7): each statement gets its own child scope so a later
/// sibling never sees an *unpromoted* local, but a `:>` capture is
/// promoted into `container` immediately after its statement finishes so
/// following siblings (and the block's own final value) can see it.
/// `ReturnSignal` is caught here and converted to a plain value; `Break`
/// is left untouched for an enclosing loop to catch.
///
/// `scan_auto_exceptions` restricts the spec section 5/8 auto-exception
/// scan to *top-level* statements: pass `true` only from `execute`'s own
/// script body, not from nested blocks, closure bodies, or loop bodies,
/// which also route through here.
pub fn eval_block_statements(
    container: &ScopeRef,
    statements: &[Stmt],
    scan_auto_exceptions: bool,
) -> Result<Control, RillError> {
    let mut last = container.pipe_value();
    for stmt in statements {
        container.cancel.check(Some(stmt.span))?;
        let stmt_scope = Scope::create_child(container);
        if !stmt.annotations.is_empty() {
            let mut merged = BTreeMap::new();
            for annotation in &stmt.annotations {
                for (key, value_expr) in &annotation.pairs {
                    let value = super::eval_expr_sync(&stmt_scope, value_expr)?;
                    merged.insert(key.clone(), value);
                }
            }
            stmt_scope.push_annotations(merged);
        }

        let control = super::eval_pipe_chain(&stmt_scope, &stmt.chain)?;
        container.promote_from(&stmt_scope);

        match control {
            Control::Value(v) => {
                if scan_auto_exceptions {
                    super::concurrency::check_auto_exceptions(
                        &container.auto_exceptions,
                        &v,
                        Some(stmt.span),
                    )?;
                }
                last = v;
            }
            Control::Break(v) => return Ok(Control::Break(v)),
            Control::Return(v) => return Ok(Control::Value(v)),
        }
    }
    Ok(Control::Value(last))
}

/// `Block` used as an ordinary sub-expression: a fresh child scope whose
/// promotions don't escape past the block itself.
pub fn eval_block_expr(scope: &ScopeRef, body: &Rc<ClosureBody>) -> Result<Control, RillError> {
    let block_scope = Scope::create_child(scope);
    eval_block_statements(&block_scope, &body.statements, false)
}

/// `cond ? then ! else` (spec section 4.7). A bare `?`/`!` with no
/// explicit condition tests the incoming pipe value.
pub fn eval_conditional(
    scope: &ScopeRef,
    cond: Option<&Expr>,
    then_branch: &Expr,
    else_branch: &Expr,
    span: Span,
) -> Result<Control, RillError> {
    let incoming = scope.pipe_value();
    let cond_value = match cond {
        Some(c) => super::eval_expr_sync(scope, c)?,
        None => incoming.clone(),
    };
    let RillValue::Bool(take_then) = cond_value else {
        return Err(RillError::type_error(
            format!("conditional expects a bool, found {}", cond_value.infer_type()),
            Some(span),
        ));
    };

    let branch_scope = Scope::create_child(scope);
    branch_scope.set_pipe_value(incoming);
    super::eval_expr(&branch_scope, if take_then { then_branch } else { else_branch })
}

/// `(cond) @ body` (spec section 4.7): re-evaluates `cond` before each
/// iteration against the loop's own evolving pipe value.
pub fn eval_while(scope: &ScopeRef, cond: &Expr, body: &Expr, span: Span) -> Result<Control, RillError> {
    let limit = scope.effective_iteration_limit();
    let loop_scope = Scope::create_child(scope);
    let mut last = scope.pipe_value();
    let mut iterations: u64 = 0;

    loop {
        scope.cancel.check(Some(span))?;
        loop_scope.set_pipe_value(last.clone());
        let cond_value = super::eval_expr_sync(&loop_scope, cond)?;
        let RillValue::Bool(keep_going) = cond_value else {
            return Err(RillError::type_error(
                format!("while condition expects a bool, found {}", cond_value.infer_type()),
                Some(span),
            ));
        };
        if !keep_going {
            break;
        }
        iterations += 1;
        if iterations > limit {
            return Err(RillError::limit_exceeded(limit, Some(span)));
        }

        let body_scope = Scope::create_child(&loop_scope);
        body_scope.set_pipe_value(last.clone());
        match super::eval_expr(&body_scope, body)? {
            Control::Value(v) => last = v,
            Control::Break(v) => return Ok(Control::Value(v)),
            other @ Control::Return(_) => return Ok(other),
        }
    }
    Ok(Control::Value(last))
}

/// `@ body ? (cond)` (spec section 4.7): body always runs once before the
/// first condition check.
pub fn eval_do_while(scope: &ScopeRef, body: &Expr, cond: &Expr, span: Span) -> Result<Control, RillError> {
    let limit = scope.effective_iteration_limit();
    let loop_scope = Scope::create_child(scope);
    let mut last = scope.pipe_value();
    let mut iterations: u64 = 0;

    loop {
        scope.cancel.check(Some(span))?;
        iterations += 1;
        if iterations > limit {
            return Err(RillError::limit_exceeded(limit, Some(span)));
        }

        let body_scope = Scope::create_child(&loop_scope);
        body_scope.set_pipe_value(last.clone());
        match super::eval_expr(&body_scope, body)? {
            Control::Value(v) => last = v,
            Control::Break(v) => return Ok(Control::Value(v)),
            other @ Control::Return(_) => return Ok(other),
        }

        loop_scope.set_pipe_value(last.clone());
        let cond_value = super::eval_expr_sync(&loop_scope, cond)?;
        let RillValue::Bool(keep_going) = cond_value else {
            return Err(RillError::type_error(
                format!("do-while condition expects a bool, found {}", cond_value.infer_type()),
                Some(span),
            ));
        };
        if !keep_going {
            break;
        }
    }
    Ok(Control::Value(last))
}

/// `?! condition [, message]` (spec section 4.7): passes the pipe value
/// through unchanged, or raises `RUNTIME_ASSERTION_FAILED`.
pub fn eval_assert(
    scope: &ScopeRef,
    condition: &Expr,
    message: Option<&Expr>,
    span: Span,
) -> Result<RillValue, RillError> {
    let cond_value = super::eval_expr_sync(scope, condition)?;
    if cond_value.is_truthy() {
        return Ok(scope.pipe_value());
    }
    let text = match message {
        Some(m) => super::eval_expr_sync(scope, m)?.to_string(),
        None => "assertion failed".to_string(),
    };
    Err(RillError::assertion_failed(text, Some(span)))
}

/// `!! message` (spec section 4.7): always raises `RUNTIME_ERROR_RAISED`.
/// The raised message is also handed to `onLogEvent` before the error
/// propagates, since this is the one explicit "tell the host something"
/// construct the language has.
pub fn eval_error_raise(scope: &ScopeRef, message: &Expr, span: Span) -> Result<RillValue, RillError> {
    let text = super::eval_expr_sync(scope, message)?.to_string();
    if let Some(hook) = &scope.observability.on_log_event {
        hook(&text);
    }
    Err(RillError::error_raised(text, Some(span)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{PipeChain, PipeTarget};
    use crate::config::RuntimeOptions;
    use crate::span::Span;

    fn num(n: f64) -> Expr {
        Expr::Number(n, Span::default())
    }

    fn bool_expr(b: bool) -> Expr {
        Expr::Bool(b, Span::default())
    }

    fn chain(head: Expr) -> Stmt {
        Stmt {
            annotations: vec![],
            chain: PipeChain { head, targets: vec![], signal: None, span: Span::default() },
            span: Span::default(),
        }
    }

    #[test]
    fn block_promotes_capture_to_container_and_catches_return() {
        let root = Scope::root(&RuntimeOptions::default());
        let capture_stmt = Stmt {
            annotations: vec![],
            chain: PipeChain {
                head: num(1.0),
                targets: vec![PipeTarget::Capture { name: "x".into(), type_tag: None, span: Span::default() }],
                signal: None,
                span: Span::default(),
            },
            span: Span::default(),
        };
        let read_stmt = Stmt {
            annotations: vec![],
            chain: PipeChain {
                head: Expr::Variable { name: Some("x".into()), access_chain: vec![], span: Span::default() },
                targets: vec![],
                signal: Some(crate::ast::SignalKind::Return),
                span: Span::default(),
            },
            span: Span::default(),
        };
        let control = eval_block_statements(&root, &[capture_stmt, read_stmt], false).unwrap();
        assert_eq!(control.value(), RillValue::Number(1.0));
        assert!(root.get_variable("x").is_some());
    }

    #[test]
    fn block_propagates_break_unconverted() {
        let root = Scope::root(&RuntimeOptions::default());
        let break_stmt = Stmt {
            annotations: vec![],
            chain: PipeChain {
                head: num(9.0),
                targets: vec![],
                signal: Some(crate::ast::SignalKind::Break),
                span: Span::default(),
            },
            span: Span::default(),
        };
        let control = eval_block_statements(&root, std::slice::from_ref(&break_stmt), false).unwrap();
        assert!(matches!(control, Control::Break(RillValue::Number(n)) if n == 9.0));
    }

    #[test]
    fn conditional_picks_branch_by_bool() {
        let root = Scope::root(&RuntimeOptions::default());
        let control = eval_conditional(&root, Some(&bool_expr(true)), &num(1.0), &num(2.0), Span::default()).unwrap();
        assert_eq!(control.value(), RillValue::Number(1.0));
    }

    #[test]
    fn while_loop_honors_iteration_limit() {
        let mut options = RuntimeOptions::default();
        options.iteration_limit = 2;
        let root = Scope::root(&options);
        let cond = bool_expr(true);
        let body = num(1.0);
        let err = eval_while(&root, &cond, &body, Span::default()).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::RuntimeLimitExceeded);
    }

    #[test]
    fn assert_passes_through_pipe_value_on_truthy_condition() {
        let root = Scope::root(&RuntimeOptions::default());
        root.set_pipe_value(RillValue::Number(5.0));
        let value = eval_assert(&root, &bool_expr(true), None, Span::default()).unwrap();
        assert_eq!(value, RillValue::Number(5.0));
    }

    #[test]
    fn assert_raises_with_default_message_on_falsy_condition() {
        let root = Scope::root(&RuntimeOptions::default());
        let err = eval_assert(&root, &bool_expr(false), None, Span::default()).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::RuntimeAssertionFailed);
    }
}
