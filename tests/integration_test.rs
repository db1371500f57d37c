// ABOUTME: script-level tests against the embedder API, covering the concrete scenarios of spec section 8

use rill::config::{CreateContextOptions, RuntimeOptions};
use rill::error::ErrorCode;
use rill::host::HostFunctionDefinition;
use rill::value::RillValue;
use std::time::Duration;

fn run(source: &str, ctx: &rill::scope::ScopeRef) -> Result<RillValue, rill::error::RillError> {
    let script = rill::parse(source).unwrap_or_else(|e| panic!("parse error: {e}"));
    rill::execute(&script, ctx)
}

fn slow_fn(delay_ms: u64, result: &'static str) -> HostFunctionDefinition {
    HostFunctionDefinition::async_native(
        "slowFn",
        vec![],
        Some("returns a fixed string after a delay".to_string()),
        move |_args, _ctx, _loc| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(RillValue::string(result))
            })
        },
    )
}

#[test]
fn pipe_with_host_call_resolves_before_its_timeout() {
    let mut runtime = RuntimeOptions::default();
    runtime.timeout_ms = 100;
    let ctx = rill::create_runtime_context(CreateContextOptions {
        runtime,
        ..CreateContextOptions::new().with_function("slowFn", slow_fn(10, "done"))
    })
    .unwrap();

    let result = run("slowFn()\n", &ctx).unwrap();
    assert_eq!(result, RillValue::string("done"));
}

#[test]
fn a_host_call_that_outlasts_its_timeout_raises_runtime_timeout() {
    let mut runtime = RuntimeOptions::default();
    runtime.timeout_ms = 50;
    let ctx = rill::create_runtime_context(CreateContextOptions {
        runtime,
        ..CreateContextOptions::new().with_function("slowFn", slow_fn(200, "done"))
    })
    .unwrap();

    let err = run("slowFn()\n", &ctx).unwrap_err();
    assert_eq!(err.code, ErrorCode::RuntimeTimeout);
    assert_eq!(
        err.context.get("functionName"),
        Some(&RillValue::string("slowFn"))
    );
    assert_eq!(err.context.get("timeoutMs"), Some(&RillValue::Number(50.0)));
}

#[test]
fn a_zero_duration_sync_call_never_times_out_regardless_of_timeout() {
    let mut runtime = RuntimeOptions::default();
    runtime.timeout_ms = 1;
    let ctx = rill::create_runtime_context(CreateContextOptions {
        runtime,
        ..CreateContextOptions::new().with_function(
            "instant",
            HostFunctionDefinition::native("instant", |_| Ok(RillValue::Number(7.0))),
        )
    })
    .unwrap();

    assert_eq!(run("instant()\n", &ctx).unwrap(), RillValue::Number(7.0));
}

#[test]
fn late_bound_recursive_closure_computes_factorial() {
    let ctx = rill::create_runtime_context(CreateContextOptions::new()).unwrap();
    let source = "|n| { ($n < 1) ? 1 ! ($n * $factorial($n - 1)) } :> $factorial\n\
                  $factorial(5)\n";
    assert_eq!(run(source, &ctx).unwrap(), RillValue::Number(120.0));
}

#[test]
fn reassigning_a_name_from_an_outer_scope_inside_each_is_rejected() {
    let ctx = rill::create_runtime_context(CreateContextOptions::new()).unwrap();
    let source = "\"outer\" :> $x\n[1, 2, 3] -> each |item| { \"inner\" :> $x }\n";
    let err = run(source, &ctx).unwrap_err();
    assert_eq!(err.code, ErrorCode::RuntimeReassignOuter);
}

#[test]
fn auto_exception_pattern_converts_a_matching_string_result_into_an_error() {
    let runtime = RuntimeOptions::default()
        .with_auto_exceptions(&["ERROR"])
        .unwrap();
    let ctx = rill::create_runtime_context(CreateContextOptions {
        runtime,
        ..CreateContextOptions::new().with_function(
            "boom",
            HostFunctionDefinition::native("boom", |_| Ok(RillValue::string("ERROR: boom"))),
        )
    })
    .unwrap();

    let err = run("boom()\n", &ctx).unwrap_err();
    assert_eq!(err.code, ErrorCode::RuntimeAutoException);
    assert_eq!(
        err.context.get("matchedValue"),
        Some(&RillValue::string("ERROR: boom"))
    );
}

#[test]
fn namespaced_host_call_used_as_a_bare_pipe_target() {
    let ctx = rill::create_runtime_context(CreateContextOptions::new()).unwrap();
    rill::stdlib::register_demo_builtins(&ctx);
    let result = run("\"hello\" -> str::upper\n", &ctx).unwrap();
    assert_eq!(result, RillValue::string("HELLO"));
}

#[test]
fn empty_list_map_and_filter_return_empty_lists() {
    let ctx = rill::create_runtime_context(CreateContextOptions::new()).unwrap();
    assert_eq!(run("[] -> map |x| { $x }\n", &ctx).unwrap(), RillValue::list(vec![]));
    assert_eq!(run("[] -> filter |x| { true }\n", &ctx).unwrap(), RillValue::list(vec![]));
}

#[test]
fn division_by_zero_is_a_runtime_type_error() {
    let ctx = rill::create_runtime_context(CreateContextOptions::new()).unwrap();
    let err = run("5 -> (1 / 0)\n", &ctx).unwrap_err();
    assert_eq!(err.code, ErrorCode::RuntimeTypeError);
}

#[test]
fn top_level_capture_is_visible_to_a_later_statement() {
    let ctx = rill::create_runtime_context(CreateContextOptions::new()).unwrap();
    let result = run("10 :> $x\n$x + 5\n", &ctx).unwrap();
    assert_eq!(result, RillValue::Number(15.0));
}
