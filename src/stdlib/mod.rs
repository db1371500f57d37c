// ABOUTME: rillc's bundled demo standard library — host functions scripts get for free

pub mod collections;
pub mod help;
pub mod json;
pub mod math;
pub mod text;

/// Registers every bundled demo host function and its help entry on a fresh
/// runtime context. `rillc` calls this before handing the context to the
/// parser/evaluator; embedders that only want the language core (no demo
/// library) simply don't call it.
pub fn register_demo_builtins(ctx: &crate::scope::ScopeRef) {
    text::register_all(ctx);
    math::register_all(ctx);
    collections::register_all(ctx);
    json::register_all(ctx);

    text::register_all_help();
    math::register_all_help();
    collections::register_all_help();
    json::register_all_help();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeOptions;
    use crate::scope::Scope;

    #[test]
    fn registers_functions_under_their_namespaced_names() {
        let ctx = Scope::root(&RuntimeOptions::default());
        register_demo_builtins(&ctx);
        assert!(ctx.get_function("str::upper").is_some());
        assert!(ctx.get_function("math::add").is_some());
        assert!(ctx.get_function("list::sum").is_some());
        assert!(help::lookup("str::upper").is_some());
    }
}
