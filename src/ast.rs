// ABOUTME: The AST node-kind set produced by the parser and consumed by the evaluator (spec section 4.3)
//
// This is the parser<->evaluator contract spec section 4.3 asks for: a
// closed set of tagged-variant node kinds, each carrying its span for
// diagnostics. `Expr` carries the bulk of the variety (literals, primaries,
// and the control-flow/collection/extraction forms that can also appear
// directly as pipe targets per spec section 4.6); `PipeChain`/`PipeTarget`
// describe how pipe-chain dispatch is different from ordinary sub-
// expression evaluation.

use crate::span::Span;
use crate::value::TypeTag;

#[derive(Debug, Clone)]
pub struct Script {
    pub frontmatter: Option<String>,
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct Annotation {
    pub pairs: Vec<(String, Expr)>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub annotations: Vec<Annotation>,
    pub chain: PipeChain,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Break,
    Return,
}

#[derive(Debug, Clone)]
pub struct PipeChain {
    pub head: Expr,
    pub targets: Vec<PipeTarget>,
    pub signal: Option<SignalKind>,
    pub span: Span,
}

/// A single link of a pipe chain (spec section 4.6). Most control-flow and
/// collection/extraction forms can appear both as ordinary expressions and
/// directly as a pipe target, so `PipeTarget::Expr` wraps the shared `Expr`
/// set; `Capture` and `ClosureChain` have dispatch semantics (storing, or
/// sequential application) that don't fit plain expression evaluation.
#[derive(Debug, Clone)]
pub enum PipeTarget {
    Expr(Expr),
    Capture {
        name: String,
        type_tag: Option<TypeTag>,
        span: Span,
    },
    ClosureChain(Expr, Span),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone)]
pub enum Accessor {
    Field(String),
    OptionalField(String),
    Coalesce(Box<Expr>),
    Index(Box<Expr>),
}

#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub name: String,
    pub type_tag: Option<TypeTag>,
    pub default: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Argument {
    pub name: Option<String>,
    pub value: Expr,
}

/// A closure/block body: a list of statements sharing threading of `$`
/// exactly like a `Block` expression (spec section 4.7).
#[derive(Debug, Clone)]
pub struct ClosureBody {
    pub statements: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ClosureLiteral {
    pub params: Vec<ParamDecl>,
    pub body: std::rc::Rc<ClosureBody>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum DictKey {
    Ident(String),
    Computed(Box<Expr>),
}

#[derive(Debug, Clone)]
pub enum DestructureElement {
    Skip,
    Bind(String, Option<TypeTag>),
    Nested(DestructurePattern),
}

#[derive(Debug, Clone)]
pub enum DestructurePattern {
    Positional(Vec<DestructureElement>),
    Keyed(Vec<(String, DestructureElement)>),
}

#[derive(Debug, Clone)]
pub enum IterKind {
    Each,
    Map,
    Fold,
    Filter,
}

#[derive(Debug, Clone)]
pub struct IterExpr {
    pub kind: IterKind,
    pub source: Option<Box<Expr>>,
    pub closure: ClosureLiteral,
    pub accumulator: Option<Box<Expr>>,
    pub span: Span,
}

/// The full expression/primary node set (spec sections 4.2-4.12).
#[derive(Debug, Clone)]
pub enum Expr {
    Number(f64, Span),
    Bool(bool, Span),
    Null(Span),
    StringLit(Vec<crate::token::StringPart>, Span),
    InterpolatedString(Vec<InterpPart>, Span),

    /// `$name` or bare `$`, with its access chain.
    Variable {
        name: Option<String>,
        access_chain: Vec<Accessor>,
        span: Span,
    },

    /// A bare identifier used as a pipe target/callable reference, not a call.
    Identifier(String, Span),

    HostCall {
        namespace: Option<String>,
        name: String,
        args: Vec<Argument>,
        span: Span,
    },

    ClosureCall {
        callee: Box<Expr>,
        args: Vec<Argument>,
        span: Span,
    },

    MethodCall {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Argument>,
        span: Span,
    },

    /// Postfix `expr(args)`.
    Invoke {
        callee: Box<Expr>,
        args: Vec<Argument>,
        span: Span,
    },

    Closure(ClosureLiteral),

    Conditional {
        cond: Option<Box<Expr>>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
        span: Span,
    },

    WhileLoop {
        cond: Box<Expr>,
        body: Box<Expr>,
        span: Span,
    },

    DoWhileLoop {
        body: Box<Expr>,
        cond: Box<Expr>,
        span: Span,
    },

    Block(std::rc::Rc<ClosureBody>),

    Grouped(Box<Expr>, Span),

    ListLiteral(Vec<Expr>, Span),
    DictLiteral(Vec<(DictKey, Expr)>, Span),

    Iter(Box<IterExpr>),

    Destructure(DestructurePattern, Span),
    Slice {
        start: Option<Box<Expr>>,
        stop: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
        span: Span,
    },
    Spread(Option<Box<Expr>>, Span),

    TypeAssertion(TypeTag, Span),
    TypeCheck(TypeTag, Span),

    Assert {
        condition: Box<Expr>,
        message: Option<Box<Expr>>,
        span: Span,
    },
    ErrorRaise(Box<Expr>, Span),

    BinaryOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    UnaryOp {
        op: UnOp,
        operand: Box<Expr>,
        span: Span,
    },

    /// Recovery-mode placeholder for a statement that failed to parse.
    ErrorNode {
        message: String,
        text: String,
        span: Span,
    },
}

#[derive(Debug, Clone)]
pub enum InterpPart {
    Literal(String),
    Expr(Expr),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Number(_, s)
            | Expr::Bool(_, s)
            | Expr::Null(s)
            | Expr::StringLit(_, s)
            | Expr::InterpolatedString(_, s)
            | Expr::Variable { span: s, .. }
            | Expr::Identifier(_, s)
            | Expr::HostCall { span: s, .. }
            | Expr::ClosureCall { span: s, .. }
            | Expr::MethodCall { span: s, .. }
            | Expr::Invoke { span: s, .. }
            | Expr::Conditional { span: s, .. }
            | Expr::WhileLoop { span: s, .. }
            | Expr::DoWhileLoop { span: s, .. }
            | Expr::Grouped(_, s)
            | Expr::ListLiteral(_, s)
            | Expr::DictLiteral(_, s)
            | Expr::Destructure(_, s)
            | Expr::Slice { span: s, .. }
            | Expr::Spread(_, s)
            | Expr::TypeAssertion(_, s)
            | Expr::TypeCheck(_, s)
            | Expr::Assert { span: s, .. }
            | Expr::ErrorRaise(_, s)
            | Expr::BinaryOp { span: s, .. }
            | Expr::UnaryOp { span: s, .. }
            | Expr::ErrorNode { span: s, .. } => *s,
            Expr::Closure(c) => c.span,
            Expr::Block(b) => b.span,
            Expr::Iter(i) => i.span,
        }
    }
}
