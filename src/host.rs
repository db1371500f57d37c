// ABOUTME: HostFunctionDefinition — the embedder function registry contract (spec section 6)

use crate::error::RillError;
use crate::scope::ScopeRef;
use crate::span::Span;
use crate::value::{CallableParam, RillValue, TypeTag};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

/// The future a host call returns. Not `Send`: the evaluator is
/// single-threaded and values are `Rc`-based (spec section 5, "single-
/// threaded with cooperative suspension").
pub type HostCallFuture = Pin<Box<dyn Future<Output = Result<RillValue, RillError>>>>;

pub type HostFn = Rc<dyn Fn(&[RillValue], &ScopeRef, Option<Span>) -> HostCallFuture>;

/// `{ params, fn(args, ctx, loc) -> value|Promise<value>, description?, returnType? }`
/// (spec section 6). Namespaced names use `::` (e.g. `math::add`).
#[derive(Clone)]
pub struct HostFunctionDefinition {
    pub name: String,
    pub params: Vec<CallableParam>,
    pub func: HostFn,
    pub description: Option<String>,
    pub return_type: Option<TypeTag>,
}

impl std::fmt::Debug for HostFunctionDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostFunctionDefinition")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

impl HostFunctionDefinition {
    /// Wraps a synchronous Rust function (no params/description metadata)
    /// as a host function — the common case for `rillc`'s bundled demo
    /// stdlib, whose functions never suspend.
    pub fn native(
        name: impl Into<String>,
        func: fn(&[RillValue]) -> Result<RillValue, RillError>,
    ) -> Self {
        let name = name.into();
        HostFunctionDefinition {
            name,
            params: Vec::new(),
            func: Rc::new(move |args, _ctx, _loc| {
                let result = func(args);
                Box::pin(async move { result })
            }),
            description: None,
            return_type: None,
        }
    }

    /// Registers a fully-described synchronous host function (used when an
    /// embedder sets `requireDescriptions: true`, spec section 6).
    pub fn describe(
        name: impl Into<String>,
        params: Vec<CallableParam>,
        description: impl Into<String>,
        return_type: Option<TypeTag>,
        func: impl Fn(&[RillValue], &ScopeRef, Option<Span>) -> Result<RillValue, RillError>
            + 'static,
    ) -> Self {
        HostFunctionDefinition {
            name: name.into(),
            params,
            func: Rc::new(move |args, ctx, loc| {
                let result = func(args, ctx, loc);
                Box::pin(async move { result })
            }),
            description: Some(description.into()),
            return_type,
        }
    }

    /// Registers a host function whose body genuinely suspends (the
    /// asynchronous case spec section 5/6 exists for).
    pub fn async_native(
        name: impl Into<String>,
        params: Vec<CallableParam>,
        description: Option<String>,
        func: impl Fn(&[RillValue], &ScopeRef, Option<Span>) -> HostCallFuture + 'static,
    ) -> Self {
        HostFunctionDefinition {
            name: name.into(),
            params,
            func: Rc::new(func),
            description,
            return_type: None,
        }
    }

    pub fn is_zero_arity(&self) -> bool {
        self.params.is_empty()
    }

    /// Validates registration-time requirements from spec section 6:
    /// `requireDescriptions` demands a non-blank description on the
    /// function and every parameter.
    pub fn validate_descriptions(&self) -> Result<(), RillError> {
        let blank = |s: &Option<String>| s.as_deref().unwrap_or("").trim().is_empty();
        if blank(&self.description) {
            return Err(RillError::parse_invalid_syntax(
                format!("host function '{}' is missing a description", self.name),
                None,
            ));
        }
        for p in &self.params {
            if p.name.trim().is_empty() {
                return Err(RillError::parse_invalid_syntax(
                    format!("host function '{}' has an unnamed parameter", self.name),
                    None,
                ));
            }
            if blank(&p.description) {
                return Err(RillError::parse_invalid_syntax(
                    format!(
                        "host function '{}' parameter '{}' is missing a description",
                        self.name, p.name
                    ),
                    None,
                ));
            }
        }
        Ok(())
    }
}
