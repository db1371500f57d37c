// ABOUTME: Scope/RuntimeContext — lexical scope chain with host registries (spec sections 3, 4.5)

use crate::error::RillError;
use crate::span::Span;
use crate::value::{RillValue, TypeTag};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Cooperative cancellation flag, shared by every scope descended from the
/// same `createRuntimeContext` call (spec section 5).
#[derive(Clone, Default)]
pub struct CancellationToken(Rc<Cell<bool>>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken(Rc::new(Cell::new(false)))
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }

    pub fn check(&self, loc: Option<Span>) -> Result<(), RillError> {
        if self.is_cancelled() {
            Err(RillError::aborted(loc))
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CancellationToken({})", self.is_cancelled())
    }
}

/// Host-provided diagnostic callbacks (spec section 3). The core has no
/// logging crate of its own; these hooks are the observability surface an
/// embedder hangs its own logging facade off.
#[derive(Clone, Default)]
pub struct Observability {
    pub on_host_call: Option<Rc<dyn Fn(&str, &[RillValue])>>,
    pub on_function_return: Option<Rc<dyn Fn(&str, &RillValue)>>,
    pub on_log_event: Option<Rc<dyn Fn(&str)>>,
}

impl fmt::Debug for Observability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observability")
            .field("on_host_call", &self.on_host_call.is_some())
            .field("on_function_return", &self.on_function_return.is_some())
            .field("on_log_event", &self.on_log_event.is_some())
            .finish()
    }
}

/// A linked lexical scope (spec section 3: "Scope (RuntimeContext)").
pub struct Scope {
    pub parent: Option<ScopeRef>,
    variables: RefCell<BTreeMap<String, RillValue>>,
    variable_types: RefCell<BTreeMap<String, TypeTag>>,
    pipe_value: RefCell<RillValue>,
    functions: RefCell<BTreeMap<String, RillValue>>,
    methods: RefCell<BTreeMap<String, RillValue>>,
    annotation_stack: RefCell<Vec<BTreeMap<String, RillValue>>>,
    pub observability: Observability,
    pub timeout_ms: u64,
    pub cancel: CancellationToken,
    pub auto_exceptions: Rc<Vec<regex::Regex>>,
    pub iteration_limit: u64,
    pub map_concurrency_limit: Option<usize>,
}

/// Scopes are reference-counted: closures hold a `ScopeRef` to their
/// defining scope, children hold one to their parent.
pub type ScopeRef = Rc<Scope>;
pub type RuntimeContext = Scope;

impl Scope {
    /// Builds the root scope for a fresh `createRuntimeContext` call.
    pub fn root(options: &crate::config::RuntimeOptions) -> ScopeRef {
        Scope::root_with_observability(options, Observability::default())
    }

    /// Same as [`Scope::root`] but also installs the embedder's
    /// observability hooks at construction time (spec section 6's
    /// `createRuntimeContext` `observability` option) — `observability`
    /// is a plain field, not a `RefCell`, so it can only be set while
    /// building the scope, before it is wrapped in its `Rc`.
    pub fn root_with_observability(options: &crate::config::RuntimeOptions, observability: Observability) -> ScopeRef {
        Rc::new(Scope {
            parent: None,
            variables: RefCell::new(BTreeMap::new()),
            variable_types: RefCell::new(BTreeMap::new()),
            pipe_value: RefCell::new(RillValue::Null),
            functions: RefCell::new(BTreeMap::new()),
            methods: RefCell::new(BTreeMap::new()),
            annotation_stack: RefCell::new(Vec::new()),
            observability,
            timeout_ms: options.timeout_ms,
            cancel: CancellationToken::new(),
            auto_exceptions: Rc::new(options.auto_exceptions.clone()),
            iteration_limit: options.iteration_limit,
            map_concurrency_limit: options.map_concurrency_limit,
        })
    }

    /// `createChildContext(parent)` (spec section 4.5): empty
    /// variables/types, inherits pipe value, annotation-stack top,
    /// functions/methods lookups, timeout, observability, cancellation.
    pub fn create_child(parent: &ScopeRef) -> ScopeRef {
        let inherited_top = parent.annotation_stack.borrow().last().cloned();
        Rc::new(Scope {
            parent: Some(Rc::clone(parent)),
            variables: RefCell::new(BTreeMap::new()),
            variable_types: RefCell::new(BTreeMap::new()),
            pipe_value: RefCell::new(parent.pipe_value()),
            functions: RefCell::new(BTreeMap::new()),
            methods: RefCell::new(BTreeMap::new()),
            annotation_stack: RefCell::new(inherited_top.into_iter().collect()),
            observability: parent.observability.clone(),
            timeout_ms: parent.timeout_ms,
            cancel: parent.cancel.clone(),
            auto_exceptions: Rc::clone(&parent.auto_exceptions),
            iteration_limit: parent.iteration_limit,
            map_concurrency_limit: parent.map_concurrency_limit,
        })
    }

    /// Promotes a just-finished statement-scope's own local bindings into
    /// `self` (spec section 4.7: "Variables captured with :> in a
    /// statement's scope are promoted to the enclosing block scope so
    /// later siblings can read them"). Safe to do unconditionally: `child`
    /// bindings were already checked against `self` (and its ancestors) by
    /// `set_variable` at the moment they were written, since `child`'s
    /// parent is `self`.
    pub fn promote_from(&self, child: &Scope) {
        for (k, v) in child.variables.borrow().iter() {
            self.variables.borrow_mut().insert(k.clone(), v.clone());
        }
        for (k, v) in child.variable_types.borrow().iter() {
            self.variable_types.borrow_mut().insert(k.clone(), *v);
        }
    }

    pub fn pipe_value(&self) -> RillValue {
        self.pipe_value.borrow().clone()
    }

    pub fn set_pipe_value(&self, value: RillValue) {
        *self.pipe_value.borrow_mut() = value;
    }

    /// `getVariable(scope, name)` (spec section 4.5): walk parents until found.
    pub fn get_variable(&self, name: &str) -> Option<RillValue> {
        if let Some(v) = self.variables.borrow().get(name) {
            return Some(v.clone());
        }
        self.parent.as_ref().and_then(|p| p.get_variable(name))
    }

    fn exists_in_ancestor(&self, name: &str) -> bool {
        match &self.parent {
            None => false,
            Some(p) => p.variables.borrow().contains_key(name) || p.exists_in_ancestor(name),
        }
    }

    /// `setVariable(scope, name, value, typeTag?)` (spec section 4.5).
    pub fn set_variable(
        &self,
        name: &str,
        value: RillValue,
        type_tag: Option<TypeTag>,
        loc: Option<Span>,
    ) -> Result<(), RillError> {
        if self.exists_in_ancestor(name) {
            return Err(RillError::reassign_outer(name, loc));
        }

        let inferred = type_tag.unwrap_or_else(|| value.infer_type());
        let mut types = self.variable_types.borrow_mut();
        if let Some(existing) = types.get(name) {
            if *existing != inferred {
                return Err(RillError::type_error(
                    format!(
                        "'{name}' was first assigned as {existing} and cannot be reassigned as {inferred}"
                    ),
                    loc,
                ));
            }
        } else {
            types.insert(name.to_string(), inferred);
        }

        self.variables.borrow_mut().insert(name.to_string(), value);
        Ok(())
    }

    pub fn get_function(&self, name: &str) -> Option<RillValue> {
        if let Some(v) = self.functions.borrow().get(name) {
            return Some(v.clone());
        }
        self.parent.as_ref().and_then(|p| p.get_function(name))
    }

    pub fn define_function(&self, name: impl Into<String>, value: RillValue) {
        self.functions.borrow_mut().insert(name.into(), value);
    }

    pub fn get_method(&self, name: &str) -> Option<RillValue> {
        if let Some(v) = self.methods.borrow().get(name) {
            return Some(v.clone());
        }
        self.parent.as_ref().and_then(|p| p.get_method(name))
    }

    pub fn define_method(&self, name: impl Into<String>, value: RillValue) {
        self.methods.borrow_mut().insert(name.into(), value);
    }

    pub fn push_annotations(&self, annotations: BTreeMap<String, RillValue>) {
        self.annotation_stack.borrow_mut().push(annotations);
    }

    pub fn pop_annotations(&self) -> Option<BTreeMap<String, RillValue>> {
        self.annotation_stack.borrow_mut().pop()
    }

    fn current_annotation(&self, key: &str) -> Option<RillValue> {
        self.annotation_stack
            .borrow()
            .last()
            .and_then(|m| m.get(key).cloned())
    }

    pub fn effective_timeout_ms(&self) -> u64 {
        match self.current_annotation("timeout") {
            Some(RillValue::Number(n)) if n >= 0.0 => n as u64,
            _ => self.timeout_ms,
        }
    }

    pub fn effective_iteration_limit(&self) -> u64 {
        match self.current_annotation("limit") {
            Some(RillValue::Number(n)) if n >= 0.0 => n as u64,
            _ => self.iteration_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeOptions;

    #[test]
    fn child_inherits_pipe_value_but_not_variables() {
        let root = Scope::root(&RuntimeOptions::default());
        root.set_pipe_value(RillValue::Number(1.0));
        root.set_variable("x", RillValue::Number(5.0), None, None)
            .unwrap();

        let child = Scope::create_child(&root);
        assert_eq!(child.pipe_value(), RillValue::Number(1.0));
        assert_eq!(child.get_variable("x"), Some(RillValue::Number(5.0)));
        assert!(child.variables.borrow().is_empty());
    }

    #[test]
    fn reassigning_an_ancestor_binding_is_rejected() {
        let root = Scope::root(&RuntimeOptions::default());
        root.set_variable("x", RillValue::Number(1.0), None, None)
            .unwrap();
        let child = Scope::create_child(&root);

        let err = child
            .set_variable("x", RillValue::Number(2.0), None, None)
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::RuntimeReassignOuter);
    }

    #[test]
    fn local_shadowing_of_a_new_name_is_fine() {
        let root = Scope::root(&RuntimeOptions::default());
        let child = Scope::create_child(&root);
        child
            .set_variable("y", RillValue::Number(1.0), None, None)
            .unwrap();
        assert_eq!(child.get_variable("y"), Some(RillValue::Number(1.0)));
        assert_eq!(root.get_variable("y"), None);
    }

    #[test]
    fn pinned_type_rejects_later_mismatched_write() {
        let root = Scope::root(&RuntimeOptions::default());
        root.set_variable("x", RillValue::Number(1.0), None, None)
            .unwrap();
        let err = root
            .set_variable("x", RillValue::string("nope"), None, None)
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::RuntimeTypeError);
    }

    #[test]
    fn same_type_rewrite_in_same_scope_is_allowed() {
        let root = Scope::root(&RuntimeOptions::default());
        root.set_variable("x", RillValue::Number(1.0), None, None)
            .unwrap();
        root.set_variable("x", RillValue::Number(2.0), None, None)
            .unwrap();
        assert_eq!(root.get_variable("x"), Some(RillValue::Number(2.0)));
    }
}
