// ABOUTME: RillValue, the tagged-variant runtime value model (spec section 3)

use crate::ast::ClosureBody;
use crate::error::RillError;
use crate::host::HostFunctionDefinition;
use crate::scope::ScopeRef;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// The type tag returned by `infer_type`, used in assertions and error
/// messages (spec section 4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    String,
    Number,
    Bool,
    List,
    Dict,
    Tuple,
    Closure,
    Iterator,
    Vector,
    Null,
}

impl TypeTag {
    pub fn from_name(name: &str) -> Option<TypeTag> {
        Some(match name {
            "string" => TypeTag::String,
            "number" => TypeTag::Number,
            "bool" => TypeTag::Bool,
            "list" => TypeTag::List,
            "dict" => TypeTag::Dict,
            "tuple" => TypeTag::Tuple,
            "closure" => TypeTag::Closure,
            "iterator" => TypeTag::Iterator,
            "vector" => TypeTag::Vector,
            "null" => TypeTag::Null,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            TypeTag::String => "string",
            TypeTag::Number => "number",
            TypeTag::Bool => "bool",
            TypeTag::List => "list",
            TypeTag::Dict => "dict",
            TypeTag::Tuple => "tuple",
            TypeTag::Closure => "closure",
            TypeTag::Iterator => "iterator",
            TypeTag::Vector => "vector",
            TypeTag::Null => "null",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Mapping (string | nonnegative integer) -> RillValue, used exclusively for
/// spread / argument-unpacking (spec section 3). Keys are all-numeric or
/// all-string; construction enforces this.
#[derive(Debug, Clone)]
pub enum TupleValue {
    Positional(Vec<RillValue>),
    Named(BTreeMap<String, RillValue>),
}

/// A dict-shaped lazy sequence: `{ done, value?, next }` (spec section 3, 4.10).
#[derive(Debug, Clone)]
pub struct IteratorValue {
    pub done: bool,
    pub value: Option<RillValue>,
    pub next: RillValue,
}

/// An opaque typed float vector with provenance; produced by extensions,
/// the core only knows identity/formatting/the iterator protocol for it.
#[derive(Debug, Clone)]
pub struct VectorValue {
    pub data: Vec<f32>,
    pub provenance: String,
}

pub type NativeFn = Rc<dyn Fn(&[RillValue]) -> Result<RillValue, RillError>>;

/// A native function of the host runtime itself (not an embedder
/// registration) — used for things like the `next` callable of a built-in
/// iterator, or a bound method closure.
#[derive(Clone)]
pub struct RuntimeCallable {
    pub name: String,
    pub arity: Option<usize>,
    pub property_style: bool,
    pub func: NativeFn,
}

impl fmt::Debug for RuntimeCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeCallable")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// `CallableParam = { name, typeName, defaultValue, annotations }` (spec section 3).
/// `description` is only meaningful for a host function's params (spec
/// section 6's `requireDescriptions` option); script closures leave it `None`.
#[derive(Debug, Clone)]
pub struct CallableParam {
    pub name: String,
    pub type_name: Option<TypeTag>,
    pub default_value: Option<RillValue>,
    pub annotations: BTreeMap<String, RillValue>,
    pub description: Option<String>,
}

impl CallableParam {
    pub fn simple(name: impl Into<String>) -> Self {
        CallableParam {
            name: name.into(),
            type_name: None,
            default_value: None,
            annotations: BTreeMap::new(),
            description: None,
        }
    }

    pub fn described(name: impl Into<String>, type_name: TypeTag, description: impl Into<String>) -> Self {
        CallableParam {
            name: name.into(),
            type_name: Some(type_name),
            default_value: None,
            annotations: BTreeMap::new(),
            description: Some(description.into()),
        }
    }
}

/// A user-defined closure: `{ params, body, definingScope, boundDict? }`
/// (spec section 3, 4.9). Parameters keep their declaration-time shape
/// (`ParamDecl`, with defaults as unevaluated `Expr`) rather than
/// `CallableParam`'s pre-evaluated `defaultValue`, since a script closure's
/// defaults are evaluated fresh at call time against the call scope (late
/// binding), not once at closure-creation time.
#[derive(Clone)]
pub struct ScriptCallable {
    pub params: Vec<crate::ast::ParamDecl>,
    pub body: Rc<ClosureBody>,
    pub defining_scope: ScopeRef,
    pub bound_dict: Option<RillValue>,
    pub property_style: bool,
}

impl fmt::Debug for ScriptCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptCallable")
            .field("params", &self.params)
            .finish()
    }
}

/// The three callable kinds of spec section 3.
#[derive(Debug, Clone)]
pub enum Callable {
    Runtime(RuntimeCallable),
    Application(Rc<HostFunctionDefinition>),
    Script(ScriptCallable),
}

impl Callable {
    pub fn is_zero_arity(&self) -> bool {
        match self {
            Callable::Runtime(r) => r.arity == Some(0),
            Callable::Application(def) => def.params.is_empty(),
            Callable::Script(s) => s.params.is_empty(),
        }
    }

    pub fn is_property_style(&self) -> bool {
        match self {
            Callable::Runtime(r) => r.property_style,
            Callable::Application(_) => false,
            Callable::Script(s) => s.property_style,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Callable::Runtime(r) => &r.name,
            Callable::Application(def) => &def.name,
            Callable::Script(_) => "<closure>",
        }
    }
}

/// The runtime value model (spec section 3). Immutable at the language
/// level; interior sharing is via `Rc` so clones stay cheap.
#[derive(Debug, Clone)]
pub enum RillValue {
    String(Rc<str>),
    Number(f64),
    Bool(bool),
    Null,
    List(Rc<Vec<RillValue>>),
    Dict(Rc<BTreeMap<String, RillValue>>),
    Tuple(Rc<TupleValue>),
    Callable(Rc<Callable>),
    Iterator(Rc<IteratorValue>),
    Vector(Rc<VectorValue>),
}

impl RillValue {
    pub fn string(s: impl Into<Rc<str>>) -> Self {
        RillValue::String(s.into())
    }

    pub fn list(items: Vec<RillValue>) -> Self {
        RillValue::List(Rc::new(items))
    }

    pub fn dict(map: BTreeMap<String, RillValue>) -> Self {
        RillValue::Dict(Rc::new(map))
    }

    pub fn callable(c: Callable) -> Self {
        RillValue::Callable(Rc::new(c))
    }

    /// `truthiness` (spec section 4.4): false, null, 0, "", [], {} are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            RillValue::Bool(b) => *b,
            RillValue::Null => false,
            RillValue::Number(n) => *n != 0.0,
            RillValue::String(s) => !s.is_empty(),
            RillValue::List(l) => !l.is_empty(),
            RillValue::Dict(d) => !d.is_empty(),
            RillValue::Tuple(_) => true,
            RillValue::Callable(_) => true,
            RillValue::Iterator(_) => true,
            RillValue::Vector(_) => true,
        }
    }

    /// `inferType` (spec section 4.4).
    pub fn infer_type(&self) -> TypeTag {
        match self {
            RillValue::String(_) => TypeTag::String,
            RillValue::Number(_) => TypeTag::Number,
            RillValue::Bool(_) => TypeTag::Bool,
            RillValue::Null => TypeTag::Null,
            RillValue::List(_) => TypeTag::List,
            RillValue::Dict(_) => TypeTag::Dict,
            RillValue::Tuple(_) => TypeTag::Tuple,
            RillValue::Callable(_) => TypeTag::Closure,
            RillValue::Iterator(_) => TypeTag::Iterator,
            RillValue::Vector(_) => TypeTag::Vector,
        }
    }

    /// `deepEquals` (spec section 4.4 / 8): structural for primitives and
    /// collections, identity for callables/iterators, NaN never equal.
    pub fn deep_equals(&self, other: &RillValue) -> bool {
        match (self, other) {
            (RillValue::String(a), RillValue::String(b)) => a == b,
            (RillValue::Number(a), RillValue::Number(b)) => {
                !a.is_nan() && !b.is_nan() && a == b
            }
            (RillValue::Bool(a), RillValue::Bool(b)) => a == b,
            (RillValue::Null, RillValue::Null) => true,
            (RillValue::List(a), RillValue::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.deep_equals(y))
            }
            (RillValue::Dict(a), RillValue::Dict(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|bv| v.deep_equals(bv)))
            }
            (RillValue::Tuple(a), RillValue::Tuple(b)) => match (a.as_ref(), b.as_ref()) {
                (TupleValue::Positional(x), TupleValue::Positional(y)) => {
                    x.len() == y.len() && x.iter().zip(y.iter()).all(|(p, q)| p.deep_equals(q))
                }
                (TupleValue::Named(x), TupleValue::Named(y)) => {
                    x.len() == y.len()
                        && x.iter()
                            .all(|(k, v)| y.get(k).is_some_and(|yv| v.deep_equals(yv)))
                }
                _ => false,
            },
            (RillValue::Callable(a), RillValue::Callable(b)) => Rc::ptr_eq(a, b),
            (RillValue::Iterator(a), RillValue::Iterator(b)) => Rc::ptr_eq(a, b),
            (RillValue::Vector(a), RillValue::Vector(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialEq for RillValue {
    fn eq(&self, other: &Self) -> bool {
        self.deep_equals(other)
    }
}

impl fmt::Display for RillValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RillValue::String(s) => write!(f, "{s}"),
            RillValue::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            RillValue::Bool(b) => write!(f, "{b}"),
            RillValue::Null => write!(f, "null"),
            RillValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            RillValue::Dict(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            RillValue::Tuple(t) => match t.as_ref() {
                TupleValue::Positional(items) => {
                    write!(f, "(")?;
                    for (i, item) in items.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{item}")?;
                    }
                    write!(f, ")")
                }
                TupleValue::Named(map) => {
                    write!(f, "(")?;
                    for (i, (k, v)) in map.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{k}: {v}")?;
                    }
                    write!(f, ")")
                }
            },
            RillValue::Callable(c) => write!(f, "#<closure {}>", c.display_name()),
            RillValue::Iterator(_) => write!(f, "#<iterator>"),
            RillValue::Vector(v) => write!(f, "#<vector[{}] {}>", v.data.len(), v.provenance),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_display_drops_trailing_zero() {
        assert_eq!(format!("{}", RillValue::Number(42.0)), "42");
        assert_eq!(format!("{}", RillValue::Number(-2.5)), "-2.5");
    }

    #[test]
    fn truthiness_matches_spec_boundary_cases() {
        assert!(!RillValue::Bool(false).is_truthy());
        assert!(!RillValue::Null.is_truthy());
        assert!(!RillValue::Number(0.0).is_truthy());
        assert!(!RillValue::string("").is_truthy());
        assert!(!RillValue::list(vec![]).is_truthy());
        assert!(!RillValue::dict(BTreeMap::new()).is_truthy());
        assert!(RillValue::Number(0.1).is_truthy());
        assert!(RillValue::string("x").is_truthy());
    }

    #[test]
    fn deep_equals_is_structural_and_nan_never_equal() {
        let a = RillValue::list(vec![RillValue::Number(1.0), RillValue::string("x")]);
        let b = RillValue::list(vec![RillValue::Number(1.0), RillValue::string("x")]);
        assert!(a.deep_equals(&b));
        assert!(b.deep_equals(&a));

        let nan = RillValue::Number(f64::NAN);
        assert!(!nan.deep_equals(&nan));
    }

    #[test]
    fn infer_type_covers_all_tags() {
        assert_eq!(RillValue::string("x").infer_type(), TypeTag::String);
        assert_eq!(RillValue::Number(1.0).infer_type(), TypeTag::Number);
        assert_eq!(RillValue::Bool(true).infer_type(), TypeTag::Bool);
        assert_eq!(RillValue::Null.infer_type(), TypeTag::Null);
        assert_eq!(RillValue::list(vec![]).infer_type(), TypeTag::List);
        assert_eq!(RillValue::dict(BTreeMap::new()).infer_type(), TypeTag::Dict);
    }
}
