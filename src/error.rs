// ABOUTME: Structured error values and the stable error-code taxonomy (spec section 7)

use crate::span::Span;
use crate::value::RillValue;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Stable, embedder-facing error codes. The string forms (via `Display`) are
/// the contract: embedders match on these, not on `message`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ParseUnexpectedToken,
    ParseInvalidSyntax,
    ParseInvalidType,
    RuntimeUndefinedVariable,
    RuntimeUndefinedFunction,
    RuntimeUndefinedMethod,
    RuntimeTypeError,
    RuntimePropertyNotFound,
    RuntimeLimitExceeded,
    RuntimeAssertionFailed,
    RuntimeErrorRaised,
    RuntimeReassignOuter,
    RuntimeInvalidPattern,
    RuntimeTimeout,
    RuntimeAutoException,
    RuntimeAborted,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::ParseUnexpectedToken => "PARSE_UNEXPECTED_TOKEN",
            ErrorCode::ParseInvalidSyntax => "PARSE_INVALID_SYNTAX",
            ErrorCode::ParseInvalidType => "PARSE_INVALID_TYPE",
            ErrorCode::RuntimeUndefinedVariable => "RUNTIME_UNDEFINED_VARIABLE",
            ErrorCode::RuntimeUndefinedFunction => "RUNTIME_UNDEFINED_FUNCTION",
            ErrorCode::RuntimeUndefinedMethod => "RUNTIME_UNDEFINED_METHOD",
            ErrorCode::RuntimeTypeError => "RUNTIME_TYPE_ERROR",
            ErrorCode::RuntimePropertyNotFound => "RUNTIME_PROPERTY_NOT_FOUND",
            ErrorCode::RuntimeLimitExceeded => "RUNTIME_LIMIT_EXCEEDED",
            ErrorCode::RuntimeAssertionFailed => "RUNTIME_ASSERTION_FAILED",
            ErrorCode::RuntimeErrorRaised => "RUNTIME_ERROR_RAISED",
            ErrorCode::RuntimeReassignOuter => "RUNTIME_REASSIGN_OUTER",
            ErrorCode::RuntimeInvalidPattern => "RUNTIME_INVALID_PATTERN",
            ErrorCode::RuntimeTimeout => "RUNTIME_TIMEOUT",
            ErrorCode::RuntimeAutoException => "RUNTIME_AUTO_EXCEPTION",
            ErrorCode::RuntimeAborted => "RUNTIME_ABORTED",
        };
        f.write_str(s)
    }
}

/// The structured error value of spec section 7: `{ code, message, location?, context? }`.
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct RillError {
    pub code: ErrorCode,
    pub message: String,
    pub location: Option<Span>,
    pub context: BTreeMap<String, RillValue>,
}

impl RillError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        RillError {
            code,
            message: message.into(),
            location: None,
            context: BTreeMap::new(),
        }
    }

    pub fn with_location(mut self, loc: Span) -> Self {
        self.location = Some(loc);
        self
    }

    pub fn with_context(mut self, key: &str, value: RillValue) -> Self {
        self.context.insert(key.to_string(), value);
        self
    }

    /// Renders this error back into a `RillValue::Dict`, the `toData()`
    /// accessor spec section 7 asks embedders be able to call.
    pub fn to_data(&self) -> RillValue {
        let mut map = BTreeMap::new();
        map.insert(
            "code".to_string(),
            RillValue::String(self.code.to_string().into()),
        );
        map.insert(
            "message".to_string(),
            RillValue::String(self.message.clone().into()),
        );
        if let Some(loc) = self.location {
            let mut loc_map = BTreeMap::new();
            loc_map.insert("line".to_string(), RillValue::Number(loc.start.line as f64));
            loc_map.insert(
                "column".to_string(),
                RillValue::Number(loc.start.column as f64),
            );
            loc_map.insert(
                "offset".to_string(),
                RillValue::Number(loc.start.offset as f64),
            );
            map.insert("location".to_string(), RillValue::dict(loc_map));
        }
        if !self.context.is_empty() {
            map.insert(
                "context".to_string(),
                RillValue::dict(self.context.clone()),
            );
        }
        RillValue::dict(map)
    }

    pub fn type_error(message: impl Into<String>, loc: Option<Span>) -> Self {
        let mut e = RillError::new(ErrorCode::RuntimeTypeError, message);
        e.location = loc;
        e
    }

    pub fn undefined_variable(name: &str, loc: Option<Span>) -> Self {
        let mut e = RillError::new(
            ErrorCode::RuntimeUndefinedVariable,
            format!("undefined variable '{name}'"),
        );
        e.location = loc;
        e
    }

    pub fn undefined_function(name: &str, loc: Option<Span>) -> Self {
        let mut e = RillError::new(
            ErrorCode::RuntimeUndefinedFunction,
            format!("undefined function '{name}'"),
        );
        e.location = loc;
        e
    }

    pub fn undefined_method(name: &str, loc: Option<Span>) -> Self {
        let mut e = RillError::new(
            ErrorCode::RuntimeUndefinedMethod,
            format!("undefined method '{name}'"),
        );
        e.location = loc;
        e
    }

    pub fn property_not_found(key: &str, loc: Option<Span>) -> Self {
        let mut e = RillError::new(
            ErrorCode::RuntimePropertyNotFound,
            format!("property '{key}' not found"),
        );
        e.location = loc;
        e
    }

    pub fn reassign_outer(name: &str, loc: Option<Span>) -> Self {
        let mut e = RillError::new(
            ErrorCode::RuntimeReassignOuter,
            format!("'{name}' is defined in an outer scope and cannot be reassigned here"),
        );
        e.location = loc;
        e
    }

    pub fn limit_exceeded(limit: u64, loc: Option<Span>) -> Self {
        let mut e = RillError::new(
            ErrorCode::RuntimeLimitExceeded,
            format!("iteration limit of {limit} exceeded"),
        );
        e.location = loc;
        e
    }

    pub fn assertion_failed(message: impl Into<String>, loc: Option<Span>) -> Self {
        let mut e = RillError::new(ErrorCode::RuntimeAssertionFailed, message);
        e.location = loc;
        e
    }

    pub fn error_raised(message: impl Into<String>, loc: Option<Span>) -> Self {
        let mut e = RillError::new(ErrorCode::RuntimeErrorRaised, message);
        e.location = loc;
        e
    }

    pub fn invalid_pattern(message: impl Into<String>, loc: Option<Span>) -> Self {
        let mut e = RillError::new(ErrorCode::RuntimeInvalidPattern, message);
        e.location = loc;
        e
    }

    pub fn timeout(function_name: &str, timeout_ms: u64, loc: Option<Span>) -> Self {
        let mut e = RillError::new(
            ErrorCode::RuntimeTimeout,
            format!("call to '{function_name}' exceeded its timeout of {timeout_ms}ms"),
        );
        e.location = loc;
        e.context.insert(
            "functionName".to_string(),
            RillValue::String(function_name.to_string().into()),
        );
        e.context.insert(
            "timeoutMs".to_string(),
            RillValue::Number(timeout_ms as f64),
        );
        e
    }

    pub fn auto_exception(pattern: &str, matched: &str, loc: Option<Span>) -> Self {
        let mut e = RillError::new(
            ErrorCode::RuntimeAutoException,
            format!("result matched auto-exception pattern '{pattern}'"),
        );
        e.location = loc;
        e.context.insert(
            "pattern".to_string(),
            RillValue::String(pattern.to_string().into()),
        );
        e.context.insert(
            "matchedValue".to_string(),
            RillValue::String(matched.to_string().into()),
        );
        e
    }

    pub fn aborted(loc: Option<Span>) -> Self {
        let mut e = RillError::new(ErrorCode::RuntimeAborted, "execution was cancelled");
        e.location = loc;
        e
    }

    pub fn parse_unexpected_token(message: impl Into<String>, loc: Option<Span>) -> Self {
        let mut e = RillError::new(ErrorCode::ParseUnexpectedToken, message);
        e.location = loc;
        e
    }

    pub fn parse_invalid_syntax(message: impl Into<String>, loc: Option<Span>) -> Self {
        let mut e = RillError::new(ErrorCode::ParseInvalidSyntax, message);
        e.location = loc;
        e
    }

    pub fn parse_invalid_type(message: impl Into<String>, loc: Option<Span>) -> Self {
        let mut e = RillError::new(ErrorCode::ParseInvalidType, message);
        e.location = loc;
        e
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_stable_code() {
        let e = RillError::undefined_variable("x", None);
        assert_eq!(e.code.to_string(), "RUNTIME_UNDEFINED_VARIABLE");
        assert!(e.to_string().starts_with("RUNTIME_UNDEFINED_VARIABLE:"));
    }

    #[test]
    fn timeout_carries_context_fields() {
        let e = RillError::timeout("slowFn", 50, None);
        assert_eq!(
            e.context.get("functionName"),
            Some(&RillValue::String("slowFn".to_string().into()))
        );
        assert_eq!(e.context.get("timeoutMs"), Some(&RillValue::Number(50.0)));
    }

    #[test]
    fn to_data_round_trips_code_and_message() {
        let e = RillError::reassign_outer("x", None);
        let data = e.to_data();
        match data {
            RillValue::Dict(d) => {
                assert_eq!(
                    d.get("code"),
                    Some(&RillValue::String("RUNTIME_REASSIGN_OUTER".to_string().into()))
                );
            }
            _ => panic!("expected dict"),
        }
    }
}
