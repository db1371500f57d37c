// ABOUTME: RuntimeOptions — createRuntimeContext's opts bag and the ambient default constants (spec sections 5, 6, 8)

use crate::error::RillError;
use crate::host::HostFunctionDefinition;
use crate::scope::Observability;
use crate::value::RillValue;

/// Default per-call timeout: 30 000 ms (spec sections 5, 8).
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default loop/lazy-iterator expansion cap (spec sections 5, 8).
pub const DEFAULT_ITERATION_LIMIT: u64 = 10_000;

/// `createRuntimeContext(opts)` (spec section 6): named constants plus a
/// plain `Default` impl, rather than a builder type.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub timeout_ms: u64,
    pub iteration_limit: u64,
    /// Compiled from the opts' `autoExceptions` list of regex source
    /// strings; an invalid pattern is rejected here, at context-creation
    /// time, rather than surfacing later on first match (spec section 6).
    pub auto_exceptions: Vec<regex::Regex>,
    /// When true, `register_function`/`register_application` below reject
    /// a registration whose description (or any parameter's) is blank.
    pub require_descriptions: bool,
    /// `limit` annotation default for `map`/`filter` concurrency (spec
    /// section 4.10). `None` means unbounded.
    pub map_concurrency_limit: Option<usize>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        RuntimeOptions {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            iteration_limit: DEFAULT_ITERATION_LIMIT,
            auto_exceptions: Vec::new(),
            require_descriptions: false,
            map_concurrency_limit: None,
        }
    }
}

impl RuntimeOptions {
    /// Compiles `patterns` into `auto_exceptions`, failing at
    /// context-creation time on an invalid pattern (spec section 6:
    /// "invalid regex raises at context creation").
    pub fn with_auto_exceptions(mut self, patterns: &[&str]) -> Result<Self, RillError> {
        self.auto_exceptions = patterns
            .iter()
            .map(|p| {
                regex::Regex::new(p).map_err(|e| {
                    RillError::parse_invalid_syntax(format!("invalid auto-exception pattern '{p}': {e}"), None)
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(self)
    }
}

/// The full `opts` bag of `createRuntimeContext(opts)` (spec section 6):
/// `functions`, `methods`, `variables`, `timeout`, `autoExceptions`,
/// `requireDescriptions`, `observability`. `RuntimeOptions` above holds
/// just the scalar/regex settings that every scope carries by value;
/// this wraps it with the registries that are only consulted once, at
/// context-creation time.
#[derive(Default)]
pub struct CreateContextOptions {
    pub runtime: RuntimeOptions,
    pub functions: Vec<(String, HostFunctionDefinition)>,
    pub methods: Vec<(String, RillValue)>,
    pub variables: Vec<(String, RillValue)>,
    pub observability: Observability,
}

impl CreateContextOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_function(mut self, name: impl Into<String>, def: HostFunctionDefinition) -> Self {
        self.functions.push((name.into(), def));
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: RillValue) -> Self {
        self.variables.push((name.into(), value));
        self
    }

    pub fn with_require_descriptions(mut self, require: bool) -> Self {
        self.runtime.require_descriptions = require;
        self
    }
}
