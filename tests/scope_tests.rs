// ABOUTME: script-level scope behavior — annotation overrides and observability hooks, driven through the embedder API

use rill::config::{CreateContextOptions, RuntimeOptions};
use rill::error::ErrorCode;
use rill::host::HostFunctionDefinition;
use rill::scope::Observability;
use rill::value::RillValue;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

fn run(source: &str, ctx: &rill::scope::ScopeRef) -> Result<RillValue, rill::error::RillError> {
    let script = rill::parse(source).unwrap_or_else(|e| panic!("parse error: {e}"));
    rill::execute(&script, ctx)
}

fn sleepy(delay_ms: u64) -> HostFunctionDefinition {
    HostFunctionDefinition::async_native(
        "sleepy",
        vec![],
        Some("sleeps then returns true".to_string()),
        move |_args, _ctx, _loc| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(RillValue::Bool(true))
            })
        },
    )
}

#[test]
fn a_statement_level_timeout_annotation_overrides_a_generous_default() {
    let mut runtime = RuntimeOptions::default();
    runtime.timeout_ms = 60_000;
    let ctx = rill::create_runtime_context(CreateContextOptions {
        runtime,
        ..CreateContextOptions::new().with_function("sleepy", sleepy(200))
    })
    .unwrap();

    let err = run("^(timeout: 20)\nsleepy()\n", &ctx).unwrap_err();
    assert_eq!(err.code, ErrorCode::RuntimeTimeout);
}

#[test]
fn a_statement_level_timeout_annotation_grants_more_time_than_a_strict_default() {
    let mut runtime = RuntimeOptions::default();
    runtime.timeout_ms = 10;
    let ctx = rill::create_runtime_context(CreateContextOptions {
        runtime,
        ..CreateContextOptions::new().with_function("sleepy", sleepy(30))
    })
    .unwrap();

    let value = run("^(timeout: 500)\nsleepy()\n", &ctx).unwrap();
    assert_eq!(value, RillValue::Bool(true));
}

#[test]
fn a_timeout_annotation_on_one_statement_does_not_leak_into_the_next() {
    let mut runtime = RuntimeOptions::default();
    runtime.timeout_ms = 10;
    let ctx = rill::create_runtime_context(CreateContextOptions {
        runtime,
        ..CreateContextOptions::new().with_function("sleepy", sleepy(30))
    })
    .unwrap();

    let err = run("^(timeout: 500)\nsleepy()\nsleepy()\n", &ctx).unwrap_err();
    assert_eq!(err.code, ErrorCode::RuntimeTimeout);
}

#[test]
fn a_limit_annotation_caps_an_otherwise_unbounded_while_loop() {
    let ctx = rill::create_runtime_context(CreateContextOptions::new()).unwrap();
    let err = run("^(limit: 3)\n(true) @ { 1 }\n", &ctx).unwrap_err();
    assert_eq!(err.code, ErrorCode::RuntimeLimitExceeded);
}

#[test]
fn host_call_and_return_hooks_fire_with_the_resolved_value() {
    let calls = Rc::new(RefCell::new(Vec::<String>::new()));
    let returns = Rc::new(RefCell::new(Vec::<(String, RillValue)>::new()));
    let calls_hook = calls.clone();
    let returns_hook = returns.clone();

    let observability = Observability {
        on_host_call: Some(Rc::new(move |name: &str, _args: &[RillValue]| {
            calls_hook.borrow_mut().push(name.to_string());
        })),
        on_function_return: Some(Rc::new(move |name: &str, value: &RillValue| {
            returns_hook.borrow_mut().push((name.to_string(), value.clone()));
        })),
        on_log_event: None,
    };

    let double = HostFunctionDefinition::native("double", |args| match args {
        [RillValue::Number(n)] => Ok(RillValue::Number(n * 2.0)),
        _ => Err(rill::error::RillError::type_error("double expects a number", None)),
    });

    let ctx = rill::create_runtime_context(CreateContextOptions {
        observability,
        ..CreateContextOptions::new().with_function("double", double)
    })
    .unwrap();

    let value = run("21 -> double\n", &ctx).unwrap();
    assert_eq!(value, RillValue::Number(42.0));
    assert_eq!(calls.borrow().as_slice(), ["double"]);
    assert_eq!(returns.borrow().as_slice(), [("double".to_string(), RillValue::Number(42.0))]);
}

#[test]
fn an_explicit_error_raise_fires_the_log_hook_before_propagating() {
    let logged = Rc::new(RefCell::new(Vec::<String>::new()));
    let logged_hook = logged.clone();

    let observability = Observability {
        on_host_call: None,
        on_function_return: None,
        on_log_event: Some(Rc::new(move |message: &str| {
            logged_hook.borrow_mut().push(message.to_string());
        })),
    };

    let ctx = rill::create_runtime_context(CreateContextOptions {
        observability,
        ..CreateContextOptions::new()
    })
    .unwrap();

    let err = run("!! \"something went wrong\"\n", &ctx).unwrap_err();
    assert_eq!(err.code, ErrorCode::RuntimeErrorRaised);
    assert_eq!(logged.borrow().as_slice(), ["something went wrong"]);
}

#[test]
fn a_captured_variable_is_visible_to_a_later_top_level_statement_but_not_the_reverse() {
    let ctx = rill::create_runtime_context(CreateContextOptions::new()).unwrap();
    let err = run("$later\n5 :> $later\n", &ctx).unwrap_err();
    assert_eq!(err.code, ErrorCode::RuntimeUndefinedVariable);

    let ctx2 = rill::create_runtime_context(CreateContextOptions::new()).unwrap();
    let value = run("5 :> $later\n$later + 1\n", &ctx2).unwrap();
    assert_eq!(value, RillValue::Number(6.0));
}
