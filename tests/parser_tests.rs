// ABOUTME: embedder-facing parser behavior — multi-statement scripts, recovery mode, the fuller grammar

use rill::ast::{DestructureElement, DestructurePattern, Expr, PipeTarget};

fn parse_ok(src: &str) -> rill::ast::Script {
    rill::parse(src).unwrap_or_else(|e| panic!("parse error for {src:?}: {e}"))
}

#[test]
fn a_multi_statement_script_parses_one_ast_node_per_line() {
    let script = parse_ok("1 -> upper\n\"x\" :> $y\n$y -> lower\n");
    assert_eq!(script.statements.len(), 3);
}

#[test]
fn closure_chain_composes_two_closures_as_a_pipe_target() {
    let script = parse_ok("5 -> |n| { $n + 1 } >> |n| { $n * 2 }\n");
    assert_eq!(script.statements[0].chain.targets.len(), 2);
    assert!(matches!(
        script.statements[0].chain.targets[1],
        PipeTarget::ClosureChain(..)
    ));
}

#[test]
fn keyed_destructure_pattern_binds_named_fields() {
    let script = parse_ok("*<name: $n, age: $a>\n");
    match &script.statements[0].chain.head {
        Expr::Destructure(DestructurePattern::Keyed(entries), _) => {
            assert_eq!(entries.len(), 2);
            assert_eq!(entries[0].0, "name");
            assert!(matches!(entries[0].1, DestructureElement::Bind(..)));
        }
        other => panic!("unexpected head {other:?}"),
    }
}

#[test]
fn nested_positional_destructure_pattern_parses() {
    let script = parse_ok("*<$a, *<$b, $c>>\n");
    match &script.statements[0].chain.head {
        Expr::Destructure(DestructurePattern::Positional(elems), _) => {
            assert_eq!(elems.len(), 2);
            assert!(matches!(elems[1], DestructureElement::Nested(_)));
        }
        other => panic!("unexpected head {other:?}"),
    }
}

#[test]
fn heredoc_literal_is_a_plain_string_expression_head() {
    let script = parse_ok("<<EOF\nhello\nworld\nEOF\n-> upper\n");
    assert!(matches!(script.statements[0].chain.head, Expr::StringLit(..)));
}

#[test]
fn string_interpolation_parses_into_multiple_parts() {
    let script = parse_ok("\"hello {$name}!\"\n");
    match &script.statements[0].chain.head {
        Expr::StringLit(..) => {}
        other => panic!("unexpected head {other:?}"),
    }
}

#[test]
fn optional_field_access_and_coalesce_parse_on_a_captured_variable() {
    let script = parse_ok("$person.address.?city ?? \"unknown\"\n");
    assert!(matches!(script.statements[0].chain.head, Expr::Variable { .. }));
}

#[test]
fn recovery_mode_reports_one_error_per_malformed_statement() {
    let outcome = rill::parse_with_recovery("1 -> )\n2 -> )\n3 -> upper\n");
    assert!(!outcome.success);
    assert_eq!(outcome.errors.len(), 2);
    assert_eq!(outcome.ast.statements.len(), 3);
}

#[test]
fn frontmatter_is_only_recognized_at_the_very_start_of_a_script() {
    let script = parse_ok("---\nauthor: me\n---\n1 -> upper\n");
    assert_eq!(script.frontmatter.as_deref(), Some("author: me\n"));
    assert_eq!(script.statements.len(), 1);
}

#[test]
fn a_script_with_no_leading_dashes_has_no_frontmatter() {
    let script = parse_ok("1 -> upper\n2 -> lower\n");
    assert_eq!(script.frontmatter, None);
}
