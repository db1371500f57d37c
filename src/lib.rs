// ABOUTME: public crate root — the embedder API of spec section 6 (parse/createRuntimeContext/execute)

pub mod ast;
pub mod config;
pub mod error;
pub mod eval;
pub mod host;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod signal;
pub mod span;
pub mod stdlib;
pub mod token;
pub mod value;

use config::CreateContextOptions;
use error::RillError;
use scope::{Scope, ScopeRef};
use value::{Callable, RillValue};

pub use ast::Script;
pub use parser::ParseOutcome;

/// `parse(source, opts?) -> Script | throw ParseError` (spec section 6).
/// Strict mode: the first lex/parse error is returned as `Err`.
pub fn parse(source: &str) -> Result<Script, RillError> {
    parser::parse(source)
}

/// `parseWithRecovery(source) -> { ast, errors, success }` (spec section 6).
pub fn parse_with_recovery(source: &str) -> ParseOutcome {
    parser::parse_with_recovery(source)
}

/// `createRuntimeContext(opts) -> Scope` (spec section 6). Registers the
/// opts' `functions`/`methods`/`variables`, validating descriptions first
/// when `requireDescriptions` is set — a registration failure means *no*
/// scope is handed back, matching "registration fails with an Error naming
/// the offender".
pub fn create_runtime_context(opts: CreateContextOptions) -> Result<ScopeRef, RillError> {
    if opts.runtime.require_descriptions {
        for (_, def) in &opts.functions {
            def.validate_descriptions()?;
        }
    }

    let ctx = Scope::root_with_observability(&opts.runtime, opts.observability);
    for (name, def) in opts.functions {
        ctx.define_function(name, RillValue::callable(Callable::Application(std::rc::Rc::new(def))));
    }
    for (name, value) in opts.methods {
        ctx.define_method(name, value);
    }
    for (name, value) in opts.variables {
        ctx.set_variable(&name, value, None, None)?;
    }
    Ok(ctx)
}

/// `execute(script, ctx) -> RillValue | throw RillError` (spec section 6).
pub fn execute(script: &Script, ctx: &ScopeRef) -> Result<RillValue, RillError> {
    eval::execute(script, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_execute_a_pipe_chain() {
        let script = parse("2 -> double\n").unwrap();
        let ctx = create_runtime_context(
            CreateContextOptions::new().with_function(
                "double",
                host::HostFunctionDefinition::native("double", |args| match args {
                    [RillValue::Number(n)] => Ok(RillValue::Number(n * 2.0)),
                    _ => Err(RillError::type_error("double expects a number", None)),
                }),
            ),
        )
        .unwrap();
        assert_eq!(execute(&script, &ctx).unwrap(), RillValue::Number(4.0));
    }

    #[test]
    fn require_descriptions_rejects_undocumented_registration() {
        let opts = CreateContextOptions::new()
            .with_require_descriptions(true)
            .with_function("nope", host::HostFunctionDefinition::native("nope", |_| Ok(RillValue::Null)));
        assert!(create_runtime_context(opts).is_err());
    }

    #[test]
    fn invalid_source_is_a_parse_error_in_strict_mode() {
        assert!(parse("$x -> )\n").is_err());
    }
}
