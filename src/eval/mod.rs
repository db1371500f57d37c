// ABOUTME: the tree-walking evaluator — Expr dispatch, pipe threading, and the execute() entry point (spec sections 2, 4, 9)

pub mod closures;
pub mod collections;
pub mod concurrency;
pub mod control_flow;
pub mod extraction;
pub mod pipe;
pub mod types;
pub mod variables;

pub use pipe::{eval_host_call, eval_invoke, eval_pipe_chain};

use crate::ast::{DictKey, Expr, InterpPart, Script};
use crate::error::RillError;
use crate::scope::ScopeRef;
use crate::signal::Control;
use crate::span::Span;
use crate::value::{Callable, RillValue, ScriptCallable};

/// `execute(script, ctx)` (spec section 6): the top-level script behaves
/// like an implicit `Block` whose container scope is `ctx` itself, so a
/// capture made by one top-level statement is visible to the statements
/// that follow it. Unlike a nested block, each top-level statement's
/// final value is also scanned against `auto_exceptions` (spec sections
/// 5, 8), so a bare string matching a configured pattern raises
/// `RUNTIME_AUTO_EXCEPTION` even when it never passes through a host call.
pub fn execute(script: &Script, ctx: &ScopeRef) -> Result<RillValue, RillError> {
    Ok(control_flow::eval_block_statements(ctx, &script.statements, true)?.value())
}

/// Evaluates `expr` and unwraps any `Control` signal it carries into a
/// plain value. Used wherever a sub-expression position cannot itself
/// carry `break`/`return` (spec section 4.2: those only attach to a whole
/// pipe chain via its trailing `@`/`^` signal).
pub fn eval_expr_sync(scope: &ScopeRef, expr: &Expr) -> Result<RillValue, RillError> {
    Ok(eval_expr(scope, expr)?.value())
}

macro_rules! propagate {
    ($control:expr) => {
        match $control {
            Control::Value(v) => v,
            other => return Ok(other),
        }
    };
}

/// Evaluates a single expression node (spec sections 4.2-4.12).
pub fn eval_expr(scope: &ScopeRef, expr: &Expr) -> Result<Control, RillError> {
    scope.cancel.check(Some(expr.span()))?;
    match expr {
        Expr::Number(n, _) => Ok(Control::Value(RillValue::Number(*n))),
        Expr::Bool(b, _) => Ok(Control::Value(RillValue::Bool(*b))),
        Expr::Null(_) => Ok(Control::Value(RillValue::Null)),
        Expr::StringLit(parts, _) => Ok(Control::Value(RillValue::string(literal_string(parts)))),
        Expr::InterpolatedString(parts, _) => eval_interpolated(scope, parts).map(Control::Value),

        Expr::Variable { name, access_chain, span } => {
            variables::eval_variable(scope, name, access_chain, *span).map(Control::Value)
        }
        Expr::Identifier(name, span) => resolve_identifier(scope, name, *span).map(Control::Value),

        Expr::HostCall { namespace, name, args, span } => {
            pipe::eval_host_call(scope, namespace.as_deref(), name, args, *span, None)
        }
        Expr::ClosureCall { callee, args, span } => pipe::eval_closure_call(scope, callee, args, *span, None),
        Expr::MethodCall { receiver, method, args, span } => {
            pipe::eval_method_call(scope, receiver, method, args, *span, None)
        }
        Expr::Invoke { callee, args, span } => pipe::eval_invoke(scope, callee, args, *span),

        Expr::Closure(lit) => Ok(Control::Value(make_closure_value(scope, lit, false, None))),

        Expr::Conditional { cond, then_branch, else_branch, span } => {
            control_flow::eval_conditional(scope, cond.as_deref(), then_branch, else_branch, *span)
        }
        Expr::WhileLoop { cond, body, span } => control_flow::eval_while(scope, cond, body, *span),
        Expr::DoWhileLoop { body, cond, span } => control_flow::eval_do_while(scope, body, cond, *span),
        Expr::Block(body) => control_flow::eval_block_expr(scope, body),

        Expr::Grouped(inner, _) => {
            let child = crate::scope::Scope::create_child(scope);
            eval_expr(&child, inner)
        }

        Expr::ListLiteral(items, _) => eval_list_literal(scope, items).map(Control::Value),
        Expr::DictLiteral(entries, _) => eval_dict_literal(scope, entries).map(Control::Value),

        Expr::Iter(it) => collections::eval_iter(scope, it).map(Control::Value),

        Expr::Destructure(pattern, span) => extraction::eval_destructure(scope, pattern, *span).map(Control::Value),
        Expr::Slice { start, stop, step, span } => {
            extraction::eval_slice(scope, start.as_deref(), stop.as_deref(), step.as_deref(), *span).map(Control::Value)
        }
        Expr::Spread(inner, span) => extraction::eval_spread(scope, inner.as_deref(), *span).map(Control::Value),

        Expr::TypeAssertion(tag, span) => types::assert_type(scope.pipe_value(), *tag, *span).map(Control::Value),
        Expr::TypeCheck(tag, _) => Ok(Control::Value(types::check_type(&scope.pipe_value(), *tag))),

        Expr::Assert { condition, message, span } => {
            control_flow::eval_assert(scope, condition, message.as_deref(), *span).map(Control::Value)
        }
        Expr::ErrorRaise(message, span) => control_flow::eval_error_raise(scope, message, *span).map(Control::Value),

        Expr::BinaryOp { op, left, right, span } => eval_binop_expr(scope, *op, left, right, *span),
        Expr::UnaryOp { op, operand, span } => eval_unop_expr(scope, *op, operand, *span),

        Expr::ErrorNode { message, span, .. } => Err(RillError::parse_invalid_syntax(message.clone(), Some(*span))),
    }
}

fn eval_binop_expr(
    scope: &ScopeRef,
    op: crate::ast::BinOp,
    left: &Expr,
    right: &Expr,
    span: Span,
) -> Result<Control, RillError> {
    use crate::ast::BinOp;
    // `||`/`&&` short-circuit: the right operand is never evaluated (and
    // any errors it would raise never surface) once the result is decided.
    if op == BinOp::Or {
        let l = propagate!(eval_expr(scope, left)?);
        if l.is_truthy() {
            return Ok(Control::Value(RillValue::Bool(true)));
        }
        let r = propagate!(eval_expr(scope, right)?);
        return Ok(Control::Value(RillValue::Bool(r.is_truthy())));
    }
    if op == BinOp::And {
        let l = propagate!(eval_expr(scope, left)?);
        if !l.is_truthy() {
            return Ok(Control::Value(RillValue::Bool(false)));
        }
        let r = propagate!(eval_expr(scope, right)?);
        return Ok(Control::Value(RillValue::Bool(r.is_truthy())));
    }

    let l = variables::auto_invoke(scope, propagate!(eval_expr(scope, left)?), span)?;
    let r = variables::auto_invoke(scope, propagate!(eval_expr(scope, right)?), span)?;
    types::eval_binop(op, l, r, Some(span)).map(Control::Value)
}

fn eval_unop_expr(scope: &ScopeRef, op: crate::ast::UnOp, operand: &Expr, span: Span) -> Result<Control, RillError> {
    let v = propagate!(eval_expr(scope, operand)?);
    let v = match op {
        crate::ast::UnOp::Neg => variables::auto_invoke(scope, v, span)?,
        crate::ast::UnOp::Not => v,
    };
    types::eval_unop(op, v, Some(span)).map(Control::Value)
}

fn literal_string(parts: &[crate::token::StringPart]) -> String {
    parts
        .iter()
        .map(|p| match p {
            crate::token::StringPart::Literal(s) => s.clone(),
            crate::token::StringPart::Interpolation(s, _) => s.clone(),
        })
        .collect()
}

fn eval_interpolated(scope: &ScopeRef, parts: &[InterpPart]) -> Result<RillValue, RillError> {
    let mut out = String::new();
    for part in parts {
        match part {
            InterpPart::Literal(s) => out.push_str(s),
            InterpPart::Expr(e) => out.push_str(&eval_expr_sync(scope, e)?.to_string()),
        }
    }
    Ok(RillValue::string(out))
}

/// A bare identifier used where a value is expected (spec section 4.2): a
/// function reference if one is registered under that name, otherwise a
/// plain variable.
fn resolve_identifier(scope: &ScopeRef, name: &str, span: Span) -> Result<RillValue, RillError> {
    if let Some(f) = scope.get_function(name) {
        return Ok(f);
    }
    if let Some(v) = scope.get_variable(name) {
        return Ok(v);
    }
    Err(RillError::undefined_function(name, Some(span)))
}

fn eval_list_literal(scope: &ScopeRef, items: &[Expr]) -> Result<RillValue, RillError> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        out.push(eval_expr_sync(scope, item)?);
    }
    Ok(RillValue::list(out))
}

fn eval_dict_literal(scope: &ScopeRef, entries: &[(DictKey, Expr)]) -> Result<RillValue, RillError> {
    let mut map = std::collections::BTreeMap::new();
    for (key, value_expr) in entries {
        let key_string = match key {
            DictKey::Ident(s) => s.clone(),
            DictKey::Computed(e) => eval_expr_sync(scope, e)?.to_string(),
        };
        map.insert(key_string, eval_expr_sync(scope, value_expr)?);
    }
    Ok(RillValue::dict(map))
}

/// `|params| body` (spec section 4.9): captures `scope` as the closure's
/// `definingScope` at the moment the literal is evaluated (late binding).
fn make_closure_value(
    scope: &ScopeRef,
    lit: &crate::ast::ClosureLiteral,
    property_style: bool,
    bound_dict: Option<RillValue>,
) -> RillValue {
    RillValue::callable(Callable::Script(ScriptCallable {
        params: lit.params.clone(),
        body: std::rc::Rc::clone(&lit.body),
        defining_scope: std::rc::Rc::clone(scope),
        bound_dict,
        property_style,
    }))
}
