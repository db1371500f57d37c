// ABOUTME: closure/host/runtime invocation — argument binding and late binding via definingScope (spec section 4.9)

use crate::error::RillError;
use crate::host::HostFunctionDefinition;
use crate::scope::{Scope, ScopeRef};
use crate::signal::Control;
use crate::span::Span;
use crate::value::{Callable, CallableParam, RillValue, RuntimeCallable, ScriptCallable, TupleValue};
use std::rc::Rc;

/// Applies spec 4.6's "zero explicit args, non-null pipe value" rule and
/// 4.9 point 4's "property-style callable with a bound dict" rule, then
/// dispatches to the matching `Callable` variant.
pub fn call_callable(
    scope: &ScopeRef,
    callable: &Callable,
    args: Vec<(Option<String>, RillValue)>,
    pipe_subst: Option<RillValue>,
    loc: Span,
) -> Result<Control, RillError> {
    let args = resolve_zero_arg_substitution(callable, args, pipe_subst);
    match callable {
        Callable::Runtime(r) => call_runtime(r, args, loc),
        Callable::Application(def) => call_application(scope, def, args, loc),
        Callable::Script(s) => call_script(s, args, loc),
    }
}

fn resolve_zero_arg_substitution(
    callable: &Callable,
    args: Vec<(Option<String>, RillValue)>,
    pipe_subst: Option<RillValue>,
) -> Vec<(Option<String>, RillValue)> {
    if !args.is_empty() {
        return args;
    }
    if let Callable::Script(s) = callable {
        if s.property_style {
            if let Some(bound) = &s.bound_dict {
                return vec![(None, bound.clone())];
            }
        }
    }
    match pipe_subst {
        Some(v) if !callable.is_zero_arity() => vec![(None, v)],
        _ => Vec::new(),
    }
}

fn positional_values(args: Vec<(Option<String>, RillValue)>) -> Vec<RillValue> {
    args.into_iter().map(|(_, v)| v).collect()
}

fn call_runtime(r: &RuntimeCallable, args: Vec<(Option<String>, RillValue)>, loc: Span) -> Result<Control, RillError> {
    if let Some(arity) = r.arity {
        if args.len() != arity {
            return Err(RillError::type_error(
                format!("'{}' expects {} argument(s), found {}", r.name, arity, args.len()),
                Some(loc),
            ));
        }
    }
    (r.func)(&positional_values(args)).map(Control::Value)
}

fn call_application(
    scope: &ScopeRef,
    def: &Rc<HostFunctionDefinition>,
    args: Vec<(Option<String>, RillValue)>,
    loc: Span,
) -> Result<Control, RillError> {
    let values = positional_values(bind_named_by_declared_order(&def.params, args, loc)?);
    if let Some(hook) = &scope.observability.on_host_call {
        hook(&def.name, &values);
    }
    let fut = (def.func)(&values, scope, Some(loc));
    let result = super::concurrency::dispatch_host_call(
        fut,
        &def.name,
        scope.effective_timeout_ms(),
        scope.cancel.clone(),
        Some(loc),
    )?;
    super::concurrency::check_auto_exceptions(&scope.auto_exceptions, &result, Some(loc))?;
    if let Some(hook) = &scope.observability.on_function_return {
        hook(&def.name, &result);
    }
    Ok(Control::Value(result))
}

/// Host functions have no named-argument calling convention of their own
/// (spec section 6: the contract is a plain positional `&[RillValue]`),
/// but a descriptive registration's `params` metadata is enough to honor
/// `name:` call-site syntax when a caller chooses to use it.
fn bind_named_by_declared_order(
    params: &[CallableParam],
    args: Vec<(Option<String>, RillValue)>,
    loc: Span,
) -> Result<Vec<(Option<String>, RillValue)>, RillError> {
    if params.is_empty() || args.iter().all(|(n, _)| n.is_none()) {
        return Ok(args);
    }
    let mut slots: Vec<Option<RillValue>> = vec![None; params.len()];
    let mut positional_idx = 0;
    for (name, value) in args {
        match name {
            Some(n) => {
                let idx = params
                    .iter()
                    .position(|p| p.name == n)
                    .ok_or_else(|| RillError::type_error(format!("unknown named argument '{n}'"), Some(loc)))?;
                slots[idx] = Some(value);
            }
            None => {
                if positional_idx >= slots.len() {
                    return Err(RillError::type_error("too many positional arguments", Some(loc)));
                }
                slots[positional_idx] = Some(value);
                positional_idx += 1;
            }
        }
    }
    Ok(slots
        .into_iter()
        .map(|v| (None, v.unwrap_or(RillValue::Null)))
        .collect())
}

/// Closure invocation (spec section 4.9): new scope parented at
/// `definingScope` (late binding, not the caller's scope), argument
/// unpacking, defaults, and declared-type checks.
fn call_script(s: &ScriptCallable, args: Vec<(Option<String>, RillValue)>, loc: Span) -> Result<Control, RillError> {
    let args = unpack_single_tuple_arg(&s.params, args);
    let call_scope = Scope::create_child(&s.defining_scope);
    bind_params(&call_scope, &s.params, args, loc)?;
    super::control_flow::eval_block_statements(&call_scope, &s.body.statements, false)
}

/// Spec 4.9 point 3: a lone `Tuple` argument against a multi-parameter
/// closure is unpacked — positionally for a `Positional` tuple, by name
/// for a `Named` one — rather than bound to the first parameter whole.
fn unpack_single_tuple_arg(
    params: &[crate::ast::ParamDecl],
    args: Vec<(Option<String>, RillValue)>,
) -> Vec<(Option<String>, RillValue)> {
    if args.len() == 1 && params.len() != 1 {
        if let (None, RillValue::Tuple(t)) = &args[0] {
            return match t.as_ref() {
                TupleValue::Positional(items) => items.iter().map(|v| (None, v.clone())).collect(),
                TupleValue::Named(map) => map.iter().map(|(k, v)| (Some(k.clone()), v.clone())).collect(),
            };
        }
    }
    args
}

fn bind_params(
    scope: &ScopeRef,
    params: &[crate::ast::ParamDecl],
    args: Vec<(Option<String>, RillValue)>,
    loc: Span,
) -> Result<(), RillError> {
    let mut slots: Vec<Option<RillValue>> = vec![None; params.len()];
    let mut positional_idx = 0;
    for (name, value) in args {
        match name {
            Some(n) => {
                let idx = params
                    .iter()
                    .position(|p| p.name == n)
                    .ok_or_else(|| RillError::type_error(format!("unknown named argument '{n}'"), Some(loc)))?;
                if slots[idx].is_some() {
                    return Err(RillError::type_error(format!("duplicate argument '{n}'"), Some(loc)));
                }
                slots[idx] = Some(value);
            }
            None => {
                if positional_idx >= slots.len() {
                    return Err(RillError::type_error("too many positional arguments", Some(loc)));
                }
                slots[positional_idx] = Some(value);
                positional_idx += 1;
            }
        }
    }

    for (param, slot) in params.iter().zip(slots) {
        let value = match slot {
            Some(v) => v,
            None => match &param.default {
                Some(default_expr) => super::eval_expr_sync(scope, default_expr)?,
                None => {
                    return Err(RillError::type_error(
                        format!("missing required parameter '{}'", param.name),
                        Some(loc),
                    ))
                }
            },
        };
        let value = match param.type_tag {
            Some(tag) => super::types::assert_type(value, tag, loc)?,
            None => value,
        };
        scope.set_variable(&param.name, value, param.type_tag, Some(loc))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ClosureBody, ParamDecl};
    use crate::config::RuntimeOptions;

    fn param(name: &str) -> ParamDecl {
        ParamDecl { name: name.into(), type_tag: None, default: None, span: Span::default() }
    }

    fn empty_body() -> Rc<ClosureBody> {
        Rc::new(ClosureBody { statements: vec![], span: Span::default() })
    }

    #[test]
    fn missing_required_param_is_a_type_error() {
        let root = Scope::root(&RuntimeOptions::default());
        let callable = ScriptCallable {
            params: vec![param("x")],
            body: empty_body(),
            defining_scope: root,
            bound_dict: None,
            property_style: false,
        };
        let err = call_script(&callable, vec![], Span::default()).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::RuntimeTypeError);
    }

    #[test]
    fn named_arg_binds_to_matching_param_regardless_of_order() {
        let root = Scope::root(&RuntimeOptions::default());
        let callable = ScriptCallable {
            params: vec![param("a"), param("b")],
            body: empty_body(),
            defining_scope: root,
            bound_dict: None,
            property_style: false,
        };
        let args = vec![
            (Some("b".to_string()), RillValue::Number(2.0)),
            (Some("a".to_string()), RillValue::Number(1.0)),
        ];
        let control = call_script(&callable, args, Span::default()).unwrap();
        assert_eq!(control.value(), RillValue::Null);
    }

    #[test]
    fn positional_tuple_unpacks_into_multiple_params() {
        let params = vec![param("a"), param("b")];
        let tuple = RillValue::Tuple(Rc::new(TupleValue::Positional(vec![
            RillValue::Number(1.0),
            RillValue::Number(2.0),
        ])));
        let args = unpack_single_tuple_arg(&params, vec![(None, tuple)]);
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn property_style_supplies_bound_dict_with_no_explicit_args() {
        let root = Scope::root(&RuntimeOptions::default());
        let mut map = std::collections::BTreeMap::new();
        map.insert("n".to_string(), RillValue::Number(5.0));
        let callable = Callable::Script(ScriptCallable {
            params: vec![param("self")],
            body: Rc::new(ClosureBody {
                statements: vec![crate::ast::Stmt {
                    annotations: vec![],
                    chain: crate::ast::PipeChain {
                        head: crate::ast::Expr::Variable {
                            name: Some("self".into()),
                            access_chain: vec![crate::ast::Accessor::Field("n".into())],
                            span: Span::default(),
                        },
                        targets: vec![],
                        signal: None,
                        span: Span::default(),
                    },
                    span: Span::default(),
                }],
                span: Span::default(),
            }),
            defining_scope: root.clone(),
            bound_dict: Some(RillValue::dict(map)),
            property_style: true,
        });
        let control = call_callable(&root, &callable, vec![], None, Span::default()).unwrap();
        assert_eq!(control.value(), RillValue::Number(5.0));
    }
}
