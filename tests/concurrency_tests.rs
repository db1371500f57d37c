// ABOUTME: script-level host-call dispatch — cancellation and auto-exception behavior driven through the embedder API

use rill::config::{CreateContextOptions, RuntimeOptions};
use rill::error::ErrorCode;
use rill::host::HostFunctionDefinition;
use rill::value::RillValue;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

fn run(source: &str, ctx: &rill::scope::ScopeRef) -> Result<RillValue, rill::error::RillError> {
    let script = rill::parse(source).unwrap_or_else(|e| panic!("parse error: {e}"));
    rill::execute(&script, ctx)
}

#[test]
fn a_pre_cancelled_context_aborts_before_any_host_call_runs() {
    let ran = Rc::new(Cell::new(false));
    let ran_hook = ran.clone();
    let marker = HostFunctionDefinition::async_native(
        "marker",
        vec![],
        Some("records that it ran".to_string()),
        move |_args, _ctx, _loc| {
            let ran_hook = ran_hook.clone();
            Box::pin(async move {
                ran_hook.set(true);
                Ok(RillValue::Null)
            })
        },
    );

    let ctx = rill::create_runtime_context(CreateContextOptions::new().with_function("marker", marker)).unwrap();
    ctx.cancel.cancel();

    let err = run("marker()\n", &ctx).unwrap_err();
    assert_eq!(err.code, ErrorCode::RuntimeAborted);
    assert!(!ran.get(), "a pre-cancelled context must never invoke the host function");
}

#[test]
fn a_host_call_that_cancels_its_own_context_is_aborted_before_it_resolves() {
    let ctx = rill::create_runtime_context(CreateContextOptions::new()).unwrap();
    let cancel = ctx.cancel.clone();

    let cancel_then_sleep = HostFunctionDefinition::async_native(
        "cancelThenSleep",
        vec![],
        Some("cancels the context then sleeps well past any reasonable timeout".to_string()),
        move |_args, _ctx, _loc| {
            let cancel = cancel.clone();
            Box::pin(async move {
                cancel.cancel();
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(RillValue::Number(1.0))
            })
        },
    );
    ctx.define_function("cancelThenSleep", RillValue::callable(rill::value::Callable::Application(Rc::new(cancel_then_sleep))));

    let err = run("cancelThenSleep()\n", &ctx).unwrap_err();
    assert_eq!(err.code, ErrorCode::RuntimeAborted);
}

#[test]
fn auto_exception_pattern_is_scoped_to_the_context_that_declares_it() {
    let boom = HostFunctionDefinition::native("boom", |_args| Ok(RillValue::string("ERROR: kaboom")));

    let mut guarded = RuntimeOptions::default();
    guarded = guarded.with_auto_exceptions(&["^ERROR:"]).unwrap();
    let guarded_ctx = rill::create_runtime_context(CreateContextOptions {
        runtime: guarded,
        ..CreateContextOptions::new().with_function("boom", boom)
    })
    .unwrap();
    let err = run("boom()\n", &guarded_ctx).unwrap_err();
    assert_eq!(err.code, ErrorCode::RuntimeAutoException);

    let boom2 = HostFunctionDefinition::native("boom", |_args| Ok(RillValue::string("ERROR: kaboom")));
    let unguarded_ctx =
        rill::create_runtime_context(CreateContextOptions::new().with_function("boom", boom2)).unwrap();
    let value = run("boom()\n", &unguarded_ctx).unwrap();
    assert_eq!(value, RillValue::string("ERROR: kaboom"));
}

#[test]
fn map_runs_every_element_against_its_own_isolated_scope() {
    let ctx = rill::create_runtime_context(CreateContextOptions::new()).unwrap();
    let value = run("[1, 2, 3] -> map |n| { \"seen\" :> $tag\n$n * 10 }\n", &ctx).unwrap();
    let RillValue::List(items) = value else { panic!("expected a list") };
    assert_eq!(&**items, &[RillValue::Number(10.0), RillValue::Number(20.0), RillValue::Number(30.0)]);
    assert!(ctx.get_variable("tag").is_none(), "a map body's capture must not leak into the surrounding scope");
}
