// ABOUTME: host-call dispatch: races a call's future against its timeout and cancellation (spec section 5)

use crate::error::RillError;
use crate::host::HostCallFuture;
use crate::scope::CancellationToken;
use crate::span::Span;
use crate::value::RillValue;
use once_cell::unsync::OnceCell;
use std::cell::RefCell;
use std::time::Duration;
use tokio::runtime::Runtime;

thread_local! {
    /// One current-thread runtime per OS thread, used to drive host-call
    /// futures to completion. The evaluator itself stays synchronous; only
    /// the boundary where a host function genuinely suspends needs an
    /// executor (spec section 5: "single-threaded with cooperative
    /// suspension").
    static HOST_RUNTIME: RefCell<OnceCell<Runtime>> = RefCell::new(OnceCell::new());
}

fn with_runtime<R>(f: impl FnOnce(&Runtime) -> R) -> R {
    HOST_RUNTIME.with(|cell| {
        let cell = cell.borrow();
        let rt = cell.get_or_init(|| {
            tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .expect("failed to build host-call runtime")
        });
        f(rt)
    })
}

async fn race_cancellation(cancel: CancellationToken) {
    loop {
        if cancel.is_cancelled() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Drives a host call's future to completion, racing it against the
/// effective per-call timeout and the runtime's cancellation token (spec
/// sections 5, 7, 8: "RUNTIME_TIMEOUT" / "RUNTIME_ABORTED").
pub fn dispatch_host_call(
    fut: HostCallFuture,
    fn_name: &str,
    timeout_ms: u64,
    cancel: CancellationToken,
    loc: Option<Span>,
) -> Result<RillValue, RillError> {
    cancel.check(loc)?;
    let fn_name = fn_name.to_string();
    with_runtime(|rt| {
        rt.block_on(async move {
            tokio::select! {
                biased;
                () = race_cancellation(cancel) => Err(RillError::aborted(loc)),
                () = tokio::time::sleep(Duration::from_millis(timeout_ms)) => {
                    Err(RillError::timeout(&fn_name, timeout_ms, loc))
                }
                res = fut => res,
            }
        })
    })
}

/// Scans a host call's successful result against the context's configured
/// auto-exception patterns (spec sections 6, 7, 8): a string result
/// matching any pattern is converted into a `RUNTIME_AUTO_EXCEPTION` error
/// rather than returned as a value.
pub fn check_auto_exceptions(
    patterns: &[regex::Regex],
    value: &RillValue,
    loc: Option<Span>,
) -> Result<(), RillError> {
    if let RillValue::String(s) = value {
        for pattern in patterns {
            if pattern.is_match(s) {
                return Err(RillError::auto_exception(pattern.as_str(), s, loc));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_returns_timeout_error_when_call_never_resolves() {
        let fut: HostCallFuture = Box::pin(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(RillValue::Null)
        });
        let err = dispatch_host_call(fut, "slow", 5, CancellationToken::new(), None).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::RuntimeTimeout);
    }

    #[test]
    fn dispatch_returns_aborted_when_pre_cancelled() {
        let fut: HostCallFuture = Box::pin(async { Ok(RillValue::Null) });
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = dispatch_host_call(fut, "f", 1000, cancel, None).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::RuntimeAborted);
    }

    #[test]
    fn dispatch_returns_value_on_success() {
        let fut: HostCallFuture = Box::pin(async { Ok(RillValue::Number(42.0)) });
        let value = dispatch_host_call(fut, "f", 1000, CancellationToken::new(), None).unwrap();
        assert_eq!(value, RillValue::Number(42.0));
    }

    #[test]
    fn auto_exception_flags_matching_string_result() {
        let patterns = vec![regex::Regex::new("^ERROR:").unwrap()];
        let err = check_auto_exceptions(&patterns, &RillValue::string("ERROR: boom"), None)
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::RuntimeAutoException);
    }

    #[test]
    fn auto_exception_allows_non_matching_string_result() {
        let patterns = vec![regex::Regex::new("^ERROR:").unwrap()];
        assert!(check_auto_exceptions(&patterns, &RillValue::string("ok"), None).is_ok());
    }
}
