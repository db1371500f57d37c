// ABOUTME: in-language help registry for rillc's bundled demo host functions

use std::cell::RefCell;

/// One documented host function, assembled by `#[host_fn]` from its
/// rustdoc comment and attribute arguments (name/category/related).
#[derive(Debug, Clone)]
pub struct HelpEntry {
    pub name: String,
    pub signature: String,
    pub description: String,
    pub examples: Vec<String>,
    pub related: Vec<String>,
    pub category: String,
}

thread_local! {
    static REGISTRY: RefCell<Vec<HelpEntry>> = const { RefCell::new(Vec::new()) };
}

/// Called once per `#[host_fn]`-annotated function by its generated
/// `register_help_*` companion.
pub fn register_help(entry: HelpEntry) {
    REGISTRY.with(|r| r.borrow_mut().push(entry));
}

/// `help()` with no argument: every registered entry's name, one per line.
pub fn list_all() -> Vec<String> {
    REGISTRY.with(|r| r.borrow().iter().map(|e| e.name.clone()).collect())
}

/// `help("name")`: the full entry for one function, if registered.
pub fn lookup(name: &str) -> Option<HelpEntry> {
    REGISTRY.with(|r| r.borrow().iter().find(|e| e.name == name).cloned())
}

/// Renders an entry as markdown, the shape `rillc`'s REPL hands to
/// `termimad` for terminal rendering.
pub fn render_markdown(entry: &HelpEntry) -> String {
    let mut out = format!("# {}\n\n`{}`\n\n{}\n", entry.name, entry.signature, entry.description);
    if !entry.examples.is_empty() {
        out.push_str("\n## Examples\n\n");
        for example in &entry.examples {
            out.push_str(&format!("```rill\n{example}\n```\n\n"));
        }
    }
    if !entry.related.is_empty() {
        out.push_str(&format!("\n## See also\n\n{}\n", entry.related.join(", ")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_lookup_round_trips() {
        register_help(HelpEntry {
            name: "test::entry".to_string(),
            signature: "test::entry(...)".to_string(),
            description: "a test entry".to_string(),
            examples: vec![],
            related: vec![],
            category: "Other".to_string(),
        });
        assert!(lookup("test::entry").is_some());
        assert!(list_all().contains(&"test::entry".to_string()));
    }
}
