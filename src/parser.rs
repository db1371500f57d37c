// ABOUTME: parse()/parse_with_recovery() — token stream to Script AST (spec section 4.2)

use crate::ast::*;
use crate::error::{ErrorCode, RillError};
use crate::lexer::tokenize;
use crate::span::Span;
use crate::token::{StringPart, Token, TokenKind};
use crate::value::TypeTag;

/// Result of `parse_with_recovery` (spec section 4.2, 6): a partial AST plus
/// any errors collected along the way. `success` is `errors.is_empty()`.
pub struct ParseOutcome {
    pub ast: Script,
    pub errors: Vec<RillError>,
    pub success: bool,
}

pub fn parse(source: &str) -> Result<Script, RillError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens, false);
    parser.parse_script()
}

pub fn parse_with_recovery(source: &str) -> ParseOutcome {
    let tokens = match tokenize(source) {
        Ok(t) => t,
        Err(e) => {
            return ParseOutcome {
                ast: Script {
                    frontmatter: None,
                    statements: vec![],
                },
                errors: vec![e],
                success: false,
            };
        }
    };
    let mut parser = Parser::new(tokens, true);
    let ast = parser
        .parse_script()
        .unwrap_or_else(|e| {
            parser.errors.push(e);
            Script {
                frontmatter: parser.frontmatter.take(),
                statements: std::mem::take(&mut parser.statements),
            }
        });
    let errors = parser.errors;
    let success = errors.is_empty();
    ParseOutcome { ast, errors, success }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    recovery: bool,
    errors: Vec<RillError>,
    frontmatter: Option<String>,
    statements: Vec<Stmt>,
}

impl Parser {
    fn new(tokens: Vec<Token>, recovery: bool) -> Self {
        Parser {
            tokens,
            pos: 0,
            recovery,
            errors: Vec::new(),
            frontmatter: None,
            statements: Vec::new(),
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek().kind, TokenKind::Newline) {
            self.advance();
        }
    }

    fn err_unexpected(&self, expected: &str) -> RillError {
        RillError::parse_unexpected_token(
            format!("expected {expected}, found {:?}", self.peek().kind),
            Some(self.peek().span),
        )
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token, RillError> {
        if std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind) {
            Ok(self.advance())
        } else {
            Err(self.err_unexpected(&format!("{kind:?}")))
        }
    }

    fn expect_identifier(&mut self) -> Result<(String, Span), RillError> {
        match &self.peek().kind {
            TokenKind::Identifier(s) => {
                let s = s.clone();
                let span = self.peek().span;
                self.advance();
                Ok((s, span))
            }
            _ => Err(self.err_unexpected("identifier")),
        }
    }

    /// `$name` used where only the bare name is wanted, not a `Variable`
    /// expression (the capture target of `:>`, spec section 4.6).
    fn expect_dollar_identifier(&mut self) -> Result<(String, Span), RillError> {
        let dollar_span = self.expect(&TokenKind::Dollar)?.span;
        let (name, name_span) = self.expect_identifier()?;
        Ok((name, dollar_span.merge(name_span)))
    }

    fn expect_type_tag(&mut self) -> Result<TypeTag, RillError> {
        let (name, span) = self.expect_identifier()?;
        TypeTag::from_name(&name)
            .ok_or_else(|| RillError::parse_invalid_type(format!("unknown type '{name}'"), Some(span)))
    }

    // ------------------------------------------------------------------
    // Script / statements
    // ------------------------------------------------------------------

    fn parse_script(&mut self) -> Result<Script, RillError> {
        let frontmatter = if let TokenKind::Frontmatter(content) = &self.peek().kind {
            let c = content.clone();
            self.advance();
            Some(c)
        } else {
            None
        };
        self.frontmatter = frontmatter.clone();

        let mut statements = Vec::new();
        self.skip_newlines();
        while !self.at_eof() {
            if self.recovery {
                match self.parse_statement() {
                    Ok(stmt) => statements.push(stmt),
                    Err(e) => {
                        let recovered = self.recover_from_error(e);
                        statements.push(recovered);
                    }
                }
            } else {
                statements.push(self.parse_statement()?);
            }
            self.statements = statements.clone();
            self.skip_newlines();
        }

        Ok(Script {
            frontmatter,
            statements,
        })
    }

    /// Records the error, emits an `ErrorNode` statement in its place, and
    /// advances to the next newline that isn't nested inside brackets
    /// (spec section 4.2, "Recovery mode").
    fn recover_from_error(&mut self, err: RillError) -> Stmt {
        let span = err.location.unwrap_or_else(|| self.peek().span);
        let text_start = self.pos;
        self.errors.push(err.clone());

        let mut depth: i32 = 0;
        loop {
            match &self.peek().kind {
                TokenKind::Eof => break,
                TokenKind::LParen | TokenKind::LBrace | TokenKind::LBracket => {
                    depth += 1;
                    self.advance();
                }
                TokenKind::RParen | TokenKind::RBrace | TokenKind::RBracket => {
                    depth -= 1;
                    self.advance();
                }
                TokenKind::Newline if depth <= 0 => {
                    break;
                }
                _ => {
                    self.advance();
                }
            }
        }
        let text: String = self.tokens[text_start..self.pos]
            .iter()
            .map(|t| format!("{:?}", t.kind))
            .collect::<Vec<_>>()
            .join(" ");

        Stmt {
            annotations: vec![],
            chain: PipeChain {
                head: Expr::ErrorNode {
                    message: err.message,
                    text,
                    span,
                },
                targets: vec![],
                signal: None,
                span,
            },
            span,
        }
    }

    fn is_stmt_terminator(&self, tok: &Token) -> bool {
        matches!(
            tok.kind,
            TokenKind::Newline | TokenKind::Eof | TokenKind::RBrace | TokenKind::RParen
        )
    }

    fn parse_annotations(&mut self) -> Result<Vec<Annotation>, RillError> {
        let mut out = Vec::new();
        while matches!(self.peek().kind, TokenKind::Caret) {
            let start = self.advance().span;
            self.expect(&TokenKind::LParen)?;
            let mut pairs = Vec::new();
            if !matches!(self.peek().kind, TokenKind::RParen) {
                loop {
                    let (key, _) = self.expect_identifier()?;
                    self.expect(&TokenKind::Colon)?;
                    let value = self.parse_ternary()?;
                    pairs.push((key, value));
                    if matches!(self.peek().kind, TokenKind::Comma) {
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
            let end = self.expect(&TokenKind::RParen)?.span;
            out.push(Annotation {
                pairs,
                span: start.merge(end),
            });
        }
        Ok(out)
    }

    fn parse_statement(&mut self) -> Result<Stmt, RillError> {
        let annotations = self.parse_annotations()?;
        let start = self.peek().span;

        if let TokenKind::Identifier(name) = &self.peek().kind {
            if (name == "break" || name == "return") && self.is_stmt_terminator(self.peek_at(1)) {
                let kind = if name == "break" {
                    SignalKind::Break
                } else {
                    SignalKind::Return
                };
                let span = self.advance().span;
                let chain = PipeChain {
                    head: Expr::Variable {
                        name: None,
                        access_chain: vec![],
                        span,
                    },
                    targets: vec![],
                    signal: Some(kind),
                    span,
                };
                return Ok(Stmt {
                    annotations,
                    chain,
                    span,
                });
            }
        }

        let chain = self.parse_pipe_chain()?;
        let end = chain.span;
        Ok(Stmt {
            annotations,
            chain,
            span: start.merge(end),
        })
    }

    // ------------------------------------------------------------------
    // Pipe chains
    // ------------------------------------------------------------------

    fn parse_pipe_chain(&mut self) -> Result<PipeChain, RillError> {
        let head = self.parse_ternary()?;
        let start = head.span();
        let mut targets = Vec::new();
        let mut signal = None;
        let mut end = start;

        loop {
            match &self.peek().kind {
                TokenKind::Arrow => {
                    self.advance();
                    if let TokenKind::Identifier(name) = &self.peek().kind {
                        if name == "break" || name == "return" {
                            let kind = if name == "break" {
                                SignalKind::Break
                            } else {
                                SignalKind::Return
                            };
                            end = self.advance().span;
                            signal = Some(kind);
                            break;
                        }
                    }
                    let target = self.parse_pipe_target()?;
                    end = target.span();
                    targets.push(PipeTarget::Expr(target));
                }
                TokenKind::CaptureArrow => {
                    let arrow_span = self.advance().span;
                    let (name, name_span) = self.expect_dollar_identifier()?;
                    let type_tag = if matches!(self.peek().kind, TokenKind::Colon) {
                        self.advance();
                        Some(self.expect_type_tag()?)
                    } else {
                        None
                    };
                    end = name_span;
                    targets.push(PipeTarget::Capture {
                        name,
                        type_tag,
                        span: arrow_span.merge(name_span),
                    });
                }
                TokenKind::ClosureChain => {
                    let span = self.advance().span;
                    let expr = self.parse_ternary()?;
                    end = expr.span();
                    targets.push(PipeTarget::ClosureChain(expr, span.merge(end)));
                }
                TokenKind::Colon => {
                    let span = self.advance().span;
                    let is_check = matches!(self.peek().kind, TokenKind::Question);
                    if is_check {
                        self.advance();
                    }
                    let tag = self.expect_type_tag()?;
                    let e = if is_check {
                        Expr::TypeCheck(tag, span)
                    } else {
                        Expr::TypeAssertion(tag, span)
                    };
                    end = span;
                    targets.push(PipeTarget::Expr(e));
                }
                _ => break,
            }
        }

        Ok(PipeChain {
            head,
            targets,
            signal,
            span: start.merge(end),
        })
    }

    fn bare_pipe_var(&self, span: Span) -> Expr {
        Expr::Variable {
            name: None,
            access_chain: vec![],
            span,
        }
    }

    /// A pipe target (spec section 4.6): host/closure/method calls implicitly
    /// receiving the pipe value as receiver, or any ordinary expression.
    fn parse_pipe_target(&mut self) -> Result<Expr, RillError> {
        let start = self.peek().span;
        match &self.peek().kind {
            TokenKind::Dot => {
                self.advance();
                let (method, _) = self.expect_identifier()?;
                self.expect(&TokenKind::LParen)?;
                let args = self.parse_args()?;
                let end = self.expect(&TokenKind::RParen)?.span;
                Ok(Expr::MethodCall {
                    receiver: Box::new(self.bare_pipe_var(start)),
                    method,
                    args,
                    span: start.merge(end),
                })
            }
            TokenKind::Identifier(name) if !is_keyword(name) => {
                let name = name.clone();
                self.advance();
                if matches!(self.peek().kind, TokenKind::DoubleColon) {
                    self.advance();
                    let (fname, _) = self.expect_identifier()?;
                    self.expect(&TokenKind::LParen)?;
                    let args = self.parse_args()?;
                    let end = self.expect(&TokenKind::RParen)?.span;
                    Ok(Expr::HostCall {
                        namespace: Some(name),
                        name: fname,
                        args,
                        span: start.merge(end),
                    })
                } else if matches!(self.peek().kind, TokenKind::LParen) {
                    self.advance();
                    let args = self.parse_args()?;
                    let end = self.expect(&TokenKind::RParen)?.span;
                    Ok(Expr::HostCall {
                        namespace: None,
                        name,
                        args,
                        span: start.merge(end),
                    })
                } else {
                    Ok(Expr::Identifier(name, start))
                }
            }
            TokenKind::Dollar | TokenKind::PipeVar => {
                let var = self.parse_variable()?;
                if matches!(self.peek().kind, TokenKind::LParen) {
                    self.advance();
                    let args = self.parse_args()?;
                    let end = self.expect(&TokenKind::RParen)?.span;
                    Ok(Expr::ClosureCall {
                        callee: Box::new(var),
                        args,
                        span: start.merge(end),
                    })
                } else {
                    Ok(var)
                }
            }
            _ => self.parse_ternary(),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Argument>, RillError> {
        let mut args = Vec::new();
        if matches!(self.peek().kind, TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            let name = if let TokenKind::Identifier(n) = &self.peek().kind {
                if matches!(self.peek_at(1).kind, TokenKind::Colon) {
                    let n = n.clone();
                    self.advance();
                    self.advance();
                    Some(n)
                } else {
                    None
                }
            } else {
                None
            };
            let value = self.parse_ternary()?;
            args.push(Argument { name, value });
            if matches!(self.peek().kind, TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(args)
    }

    // ------------------------------------------------------------------
    // Expressions: ternary -> binops -> unary -> postfix -> primary
    // ------------------------------------------------------------------

    fn parse_ternary(&mut self) -> Result<Expr, RillError> {
        let cond = self.parse_or()?;
        if matches!(self.peek().kind, TokenKind::Question) {
            let start = cond.span();
            self.advance();
            let then_branch = self.parse_ternary()?;
            self.expect(&TokenKind::Bang)?;
            let else_branch = self.parse_ternary()?;
            let end = else_branch.span();
            Ok(Expr::Conditional {
                cond: Some(Box::new(cond)),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
                span: start.merge(end),
            })
        } else {
            Ok(cond)
        }
    }

    fn parse_binop_level(
        &mut self,
        ops: &[(TokenKind, BinOp)],
        next: fn(&mut Self) -> Result<Expr, RillError>,
    ) -> Result<Expr, RillError> {
        let mut left = next(self)?;
        loop {
            let matched = ops
                .iter()
                .find(|(k, _)| std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(k));
            let Some((_, op)) = matched else { break };
            self.advance();
            let right = next(self)?;
            let span = left.span().merge(right.span());
            left = Expr::BinaryOp {
                op: *op,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Expr, RillError> {
        self.parse_binop_level(&[(TokenKind::Or, BinOp::Or)], Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Expr, RillError> {
        self.parse_binop_level(&[(TokenKind::And, BinOp::And)], Self::parse_equality)
    }

    fn parse_equality(&mut self) -> Result<Expr, RillError> {
        self.parse_binop_level(
            &[(TokenKind::Eq, BinOp::Eq), (TokenKind::NotEq, BinOp::NotEq)],
            Self::parse_relational,
        )
    }

    fn parse_relational(&mut self) -> Result<Expr, RillError> {
        self.parse_binop_level(
            &[
                (TokenKind::Lt, BinOp::Lt),
                (TokenKind::Gt, BinOp::Gt),
                (TokenKind::LtEq, BinOp::LtEq),
                (TokenKind::GtEq, BinOp::GtEq),
            ],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> Result<Expr, RillError> {
        self.parse_binop_level(
            &[(TokenKind::Plus, BinOp::Add), (TokenKind::Minus, BinOp::Sub)],
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, RillError> {
        self.parse_binop_level(
            &[
                (TokenKind::Star, BinOp::Mul),
                (TokenKind::Slash, BinOp::Div),
                (TokenKind::Percent, BinOp::Mod),
            ],
            Self::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> Result<Expr, RillError> {
        match &self.peek().kind {
            TokenKind::Minus => {
                let start = self.advance().span;
                let operand = self.parse_unary()?;
                let end = operand.span();
                Ok(Expr::UnaryOp {
                    op: UnOp::Neg,
                    operand: Box::new(operand),
                    span: start.merge(end),
                })
            }
            TokenKind::Bang => {
                let start = self.advance().span;
                let operand = self.parse_unary()?;
                let end = operand.span();
                Ok(Expr::UnaryOp {
                    op: UnOp::Not,
                    operand: Box::new(operand),
                    span: start.merge(end),
                })
            }
            TokenKind::Star => {
                let start = self.advance().span;
                if self.starts_expr() {
                    let inner = self.parse_unary()?;
                    let end = inner.span();
                    Ok(Expr::Spread(Some(Box::new(inner)), start.merge(end)))
                } else {
                    Ok(Expr::Spread(None, start))
                }
            }
            _ => self.parse_postfix(),
        }
    }

    fn starts_expr(&self) -> bool {
        !matches!(
            self.peek().kind,
            TokenKind::Newline
                | TokenKind::Eof
                | TokenKind::RParen
                | TokenKind::RBrace
                | TokenKind::RBracket
                | TokenKind::Comma
                | TokenKind::Arrow
                | TokenKind::CaptureArrow
        )
    }

    fn parse_postfix(&mut self) -> Result<Expr, RillError> {
        let mut expr = self.parse_primary()?;
        loop {
            match &self.peek().kind {
                TokenKind::LParen => {
                    let start = expr.span();
                    self.advance();
                    let args = self.parse_args()?;
                    let end = self.expect(&TokenKind::RParen)?.span;
                    expr = Expr::Invoke {
                        callee: Box::new(expr),
                        args,
                        span: start.merge(end),
                    };
                }
                TokenKind::Dot
                    if matches!(self.peek_at(1).kind, TokenKind::Identifier(_))
                        && matches!(self.peek_at(2).kind, TokenKind::LParen) =>
                {
                    let start = expr.span();
                    self.advance();
                    let (method, _) = self.expect_identifier()?;
                    self.expect(&TokenKind::LParen)?;
                    let args = self.parse_args()?;
                    let end = self.expect(&TokenKind::RParen)?.span;
                    expr = Expr::MethodCall {
                        receiver: Box::new(expr),
                        method,
                        args,
                        span: start.merge(end),
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_access_chain(&mut self) -> Result<Vec<Accessor>, RillError> {
        let mut chain = Vec::new();
        loop {
            match &self.peek().kind {
                TokenKind::Dot => {
                    self.advance();
                    let (name, _) = self.expect_identifier()?;
                    chain.push(Accessor::Field(name));
                }
                TokenKind::OptDot => {
                    self.advance();
                    let (name, _) = self.expect_identifier()?;
                    chain.push(Accessor::OptionalField(name));
                }
                TokenKind::LBracket => {
                    self.advance();
                    let idx = self.parse_ternary()?;
                    self.expect(&TokenKind::RBracket)?;
                    chain.push(Accessor::Index(Box::new(idx)));
                }
                TokenKind::QQ => {
                    self.advance();
                    let default = self.parse_unary()?;
                    chain.push(Accessor::Coalesce(Box::new(default)));
                }
                _ => break,
            }
        }
        Ok(chain)
    }

    fn parse_variable(&mut self) -> Result<Expr, RillError> {
        let start = self.peek().span;
        match self.advance().kind {
            TokenKind::Dollar => {
                let (name, _) = self.expect_identifier()?;
                let chain = self.parse_access_chain()?;
                let end = chain.last().map(|_| self.tokens[self.pos.saturating_sub(1)].span).unwrap_or(start);
                Ok(Expr::Variable {
                    name: Some(name),
                    access_chain: chain,
                    span: start.merge(end),
                })
            }
            TokenKind::PipeVar => {
                let chain = self.parse_access_chain()?;
                let end = chain.last().map(|_| self.tokens[self.pos.saturating_sub(1)].span).unwrap_or(start);
                Ok(Expr::Variable {
                    name: None,
                    access_chain: chain,
                    span: start.merge(end),
                })
            }
            _ => unreachable!("parse_variable called on non-variable token"),
        }
    }

    // ------------------------------------------------------------------
    // Primaries
    // ------------------------------------------------------------------

    fn parse_primary(&mut self) -> Result<Expr, RillError> {
        let start = self.peek().span;
        match self.peek().kind.clone() {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Number(n, start))
            }
            TokenKind::StringLiteral(parts) => {
                self.advance();
                self.build_string_expr(parts, start)
            }
            TokenKind::Dollar | TokenKind::PipeVar => self.parse_variable(),
            TokenKind::Identifier(name) => match name.as_str() {
                "true" => {
                    self.advance();
                    Ok(Expr::Bool(true, start))
                }
                "false" => {
                    self.advance();
                    Ok(Expr::Bool(false, start))
                }
                "null" => {
                    self.advance();
                    Ok(Expr::Null(start))
                }
                "each" | "map" | "fold" | "filter" => self.parse_iter(),
                "assert" => {
                    self.advance();
                    let condition = self.parse_ternary()?;
                    let message = if matches!(self.peek().kind, TokenKind::Comma) {
                        self.advance();
                        Some(Box::new(self.parse_ternary()?))
                    } else {
                        None
                    };
                    let end = message
                        .as_ref()
                        .map(|m| m.span())
                        .unwrap_or_else(|| condition.span());
                    Ok(Expr::Assert {
                        condition: Box::new(condition),
                        message,
                        span: start.merge(end),
                    })
                }
                "error" => {
                    self.advance();
                    let msg = self.parse_ternary()?;
                    let end = msg.span();
                    Ok(Expr::ErrorRaise(Box::new(msg), start.merge(end)))
                }
                _ => {
                    self.advance();
                    if matches!(self.peek().kind, TokenKind::DoubleColon) {
                        self.advance();
                        let (fname, _) = self.expect_identifier()?;
                        self.expect(&TokenKind::LParen)?;
                        let args = self.parse_args()?;
                        let end = self.expect(&TokenKind::RParen)?.span;
                        Ok(Expr::HostCall {
                            namespace: Some(name),
                            name: fname,
                            args,
                            span: start.merge(end),
                        })
                    } else if matches!(self.peek().kind, TokenKind::LParen) {
                        self.advance();
                        let args = self.parse_args()?;
                        let end = self.expect(&TokenKind::RParen)?.span;
                        Ok(Expr::HostCall {
                            namespace: None,
                            name,
                            args,
                            span: start.merge(end),
                        })
                    } else {
                        Ok(Expr::Identifier(name, start))
                    }
                }
            },
            TokenKind::Pipe => self.parse_closure(),
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_ternary()?;
                let end = self.expect(&TokenKind::RParen)?.span;
                let grouped_span = start.merge(end);
                if matches!(self.peek().kind, TokenKind::At) {
                    self.advance();
                    let body = self.parse_unary()?;
                    let bspan = body.span();
                    Ok(Expr::WhileLoop {
                        cond: Box::new(inner),
                        body: Box::new(body),
                        span: grouped_span.merge(bspan),
                    })
                } else {
                    Ok(Expr::Grouped(Box::new(inner), grouped_span))
                }
            }
            TokenKind::At => {
                self.advance();
                let body = self.parse_unary()?;
                self.expect(&TokenKind::Question)?;
                self.expect(&TokenKind::LParen)?;
                let cond = self.parse_ternary()?;
                let end = self.expect(&TokenKind::RParen)?.span;
                Ok(Expr::DoWhileLoop {
                    body: Box::new(body),
                    cond: Box::new(cond),
                    span: start.merge(end),
                })
            }
            TokenKind::LBrace => {
                let body = self.parse_block_body()?;
                Ok(Expr::Block(std::rc::Rc::new(body)))
            }
            TokenKind::LBracket => self.parse_list_or_dict(),
            TokenKind::DestructureOpen => self.parse_destructure(),
            TokenKind::SliceOpen => self.parse_slice(),
            TokenKind::Star => {
                self.advance();
                if self.starts_expr() {
                    let inner = self.parse_unary()?;
                    let end = inner.span();
                    Ok(Expr::Spread(Some(Box::new(inner)), start.merge(end)))
                } else {
                    Ok(Expr::Spread(None, start))
                }
            }
            TokenKind::Question => {
                self.advance();
                let then_branch = self.parse_ternary()?;
                self.expect(&TokenKind::Bang)?;
                let else_branch = self.parse_ternary()?;
                let end = else_branch.span();
                Ok(Expr::Conditional {
                    cond: None,
                    then_branch: Box::new(then_branch),
                    else_branch: Box::new(else_branch),
                    span: start.merge(end),
                })
            }
            TokenKind::Colon => {
                self.advance();
                let is_check = matches!(self.peek().kind, TokenKind::Question);
                if is_check {
                    self.advance();
                }
                let tag = self.expect_type_tag()?;
                Ok(if is_check {
                    Expr::TypeCheck(tag, start)
                } else {
                    Expr::TypeAssertion(tag, start)
                })
            }
            other => Err(RillError::new(
                ErrorCode::ParseUnexpectedToken,
                format!("unexpected token {other:?}"),
            )
            .with_location(start)),
        }
    }

    fn build_string_expr(&mut self, parts: Vec<StringPart>, span: Span) -> Result<Expr, RillError> {
        let has_interp = parts.iter().any(|p| matches!(p, StringPart::Interpolation(..)));
        if !has_interp {
            return Ok(Expr::StringLit(parts, span));
        }
        let mut out = Vec::new();
        for part in parts {
            match part {
                StringPart::Literal(s) => out.push(InterpPart::Literal(s)),
                StringPart::Interpolation(src, ispan) => {
                    let inner_tokens = tokenize(&src)?;
                    let mut inner_parser = Parser::new(inner_tokens, false);
                    let expr = inner_parser.parse_ternary().map_err(|e| {
                        RillError::parse_invalid_syntax(
                            format!("invalid interpolation: {}", e.message),
                            Some(ispan),
                        )
                    })?;
                    out.push(InterpPart::Expr(expr));
                }
            }
        }
        Ok(Expr::InterpolatedString(out, span))
    }

    fn parse_block_body(&mut self) -> Result<ClosureBody, RillError> {
        let start = self.expect(&TokenKind::LBrace)?.span;
        self.skip_newlines();
        let mut statements = Vec::new();
        while !matches!(self.peek().kind, TokenKind::RBrace) {
            if self.recovery {
                match self.parse_statement() {
                    Ok(s) => statements.push(s),
                    Err(e) => statements.push(self.recover_from_error(e)),
                }
            } else {
                statements.push(self.parse_statement()?);
            }
            self.skip_newlines();
        }
        let end = self.expect(&TokenKind::RBrace)?.span;
        Ok(ClosureBody {
            statements,
            span: start.merge(end),
        })
    }

    fn parse_closure(&mut self) -> Result<Expr, RillError> {
        let start = self.expect(&TokenKind::Pipe)?.span;
        let mut params = Vec::new();
        if !matches!(self.peek().kind, TokenKind::Pipe) {
            loop {
                let (name, pspan) = self.expect_identifier()?;
                let type_tag = if matches!(self.peek().kind, TokenKind::Colon) {
                    self.advance();
                    Some(self.expect_type_tag()?)
                } else {
                    None
                };
                let default = if matches!(self.peek().kind, TokenKind::Assign) {
                    self.advance();
                    Some(self.parse_ternary()?)
                } else {
                    None
                };
                params.push(ParamDecl {
                    name,
                    type_tag,
                    default,
                    span: pspan,
                });
                if matches!(self.peek().kind, TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(&TokenKind::Pipe)?;
        let body = self.parse_closure_body_expr()?;
        let end = body.span;
        Ok(Expr::Closure(ClosureLiteral {
            params,
            body: std::rc::Rc::new(body),
            span: start.merge(end),
        }))
    }

    /// A closure/iterator body is either an explicit `{ ... }` block or a
    /// single expression treated as a one-statement body.
    fn parse_closure_body_expr(&mut self) -> Result<ClosureBody, RillError> {
        if matches!(self.peek().kind, TokenKind::LBrace) {
            self.parse_block_body()
        } else {
            let chain = self.parse_pipe_chain()?;
            let span = chain.span;
            Ok(ClosureBody {
                statements: vec![Stmt {
                    annotations: vec![],
                    chain,
                    span,
                }],
                span,
            })
        }
    }

    fn parse_iter(&mut self) -> Result<Expr, RillError> {
        let (name, start) = self.expect_identifier()?;
        let kind = match name.as_str() {
            "each" => IterKind::Each,
            "map" => IterKind::Map,
            "fold" => IterKind::Fold,
            "filter" => IterKind::Filter,
            _ => unreachable!(),
        };

        let mut source = None;
        let mut accumulator = None;
        if matches!(self.peek().kind, TokenKind::LParen) {
            self.advance();
            let expr = self.parse_ternary()?;
            self.expect(&TokenKind::RParen)?;
            if matches!(kind, IterKind::Fold) {
                accumulator = Some(Box::new(expr));
            } else {
                source = Some(Box::new(expr));
            }
        }

        let closure = match self.parse_primary()? {
            Expr::Closure(c) => c,
            other => {
                return Err(RillError::parse_invalid_syntax(
                    "expected a closure literal after iterator keyword",
                    Some(other.span()),
                ))
            }
        };

        if matches!(kind, IterKind::Each) && accumulator.is_none() {
            if let Some(last) = closure.params.last() {
                if closure.params.len() >= 2 {
                    accumulator = last.default.clone().map(Box::new);
                }
            }
        }

        let end = closure.span;
        Ok(Expr::Iter(Box::new(IterExpr {
            kind,
            source,
            closure,
            accumulator,
            span: start.merge(end),
        })))
    }

    fn parse_list_or_dict(&mut self) -> Result<Expr, RillError> {
        let start = self.expect(&TokenKind::LBracket)?.span;
        self.skip_newlines();
        if matches!(self.peek().kind, TokenKind::RBracket) {
            let end = self.advance().span;
            return Ok(Expr::ListLiteral(vec![], start.merge(end)));
        }

        if self.looks_like_dict_entry() {
            let mut entries = Vec::new();
            loop {
                self.skip_newlines();
                let key = self.parse_dict_key()?;
                self.expect(&TokenKind::Colon)?;
                let value = self.parse_ternary()?;
                entries.push((key, value));
                self.skip_newlines();
                if matches!(self.peek().kind, TokenKind::Comma) {
                    self.advance();
                    self.skip_newlines();
                } else {
                    break;
                }
            }
            self.skip_newlines();
            let end = self.expect(&TokenKind::RBracket)?.span;
            Ok(Expr::DictLiteral(entries, start.merge(end)))
        } else {
            let mut items = Vec::new();
            loop {
                self.skip_newlines();
                items.push(self.parse_ternary()?);
                self.skip_newlines();
                if matches!(self.peek().kind, TokenKind::Comma) {
                    self.advance();
                    self.skip_newlines();
                } else {
                    break;
                }
            }
            self.skip_newlines();
            let end = self.expect(&TokenKind::RBracket)?.span;
            Ok(Expr::ListLiteral(items, start.merge(end)))
        }
    }

    fn looks_like_dict_entry(&self) -> bool {
        match &self.peek().kind {
            TokenKind::Identifier(_) => matches!(self.peek_at(1).kind, TokenKind::Colon),
            TokenKind::StringLiteral(_) => matches!(self.peek_at(1).kind, TokenKind::Colon),
            TokenKind::LBracket => true,
            _ => false,
        }
    }

    fn parse_dict_key(&mut self) -> Result<DictKey, RillError> {
        match self.peek().kind.clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(DictKey::Ident(name))
            }
            TokenKind::StringLiteral(parts) => {
                self.advance();
                let s = parts
                    .into_iter()
                    .map(|p| match p {
                        StringPart::Literal(s) => s,
                        StringPart::Interpolation(s, _) => s,
                    })
                    .collect::<String>();
                Ok(DictKey::Ident(s))
            }
            TokenKind::LBracket => {
                self.advance();
                let expr = self.parse_ternary()?;
                self.expect(&TokenKind::RBracket)?;
                Ok(DictKey::Computed(Box::new(expr)))
            }
            _ => Err(self.err_unexpected("dict key")),
        }
    }

    fn parse_destructure_element(&mut self) -> Result<DestructureElement, RillError> {
        match &self.peek().kind {
            TokenKind::Underscore => {
                self.advance();
                Ok(DestructureElement::Skip)
            }
            TokenKind::Identifier(name) if name == "_" => {
                self.advance();
                Ok(DestructureElement::Skip)
            }
            TokenKind::DestructureOpen => {
                let nested = self.parse_destructure_pattern()?;
                Ok(DestructureElement::Nested(nested))
            }
            TokenKind::Dollar => {
                self.advance();
                let (name, _) = self.expect_identifier()?;
                let type_tag = if matches!(self.peek().kind, TokenKind::Colon) {
                    self.advance();
                    Some(self.expect_type_tag()?)
                } else {
                    None
                };
                Ok(DestructureElement::Bind(name, type_tag))
            }
            _ => Err(self.err_unexpected("destructure element")),
        }
    }

    fn parse_destructure_pattern(&mut self) -> Result<DestructurePattern, RillError> {
        self.expect(&TokenKind::DestructureOpen)?;
        let keyed = matches!(self.peek().kind, TokenKind::Identifier(_))
            && matches!(self.peek_at(1).kind, TokenKind::Colon);
        let pattern = if keyed {
            let mut entries = Vec::new();
            loop {
                let (key, _) = self.expect_identifier()?;
                self.expect(&TokenKind::Colon)?;
                let elem = self.parse_destructure_element()?;
                entries.push((key, elem));
                if matches!(self.peek().kind, TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
            DestructurePattern::Keyed(entries)
        } else {
            let mut elems = Vec::new();
            if !matches!(self.peek().kind, TokenKind::Gt) {
                loop {
                    elems.push(self.parse_destructure_element()?);
                    if matches!(self.peek().kind, TokenKind::Comma) {
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
            DestructurePattern::Positional(elems)
        };
        self.expect(&TokenKind::Gt)?;
        Ok(pattern)
    }

    fn parse_destructure(&mut self) -> Result<Expr, RillError> {
        let start = self.peek().span;
        let pattern = self.parse_destructure_pattern()?;
        let end = self.tokens[self.pos.saturating_sub(1)].span;
        Ok(Expr::Destructure(pattern, start.merge(end)))
    }

    fn parse_slice(&mut self) -> Result<Expr, RillError> {
        let start = self.expect(&TokenKind::SliceOpen)?.span;
        let start_expr = if matches!(self.peek().kind, TokenKind::Colon) {
            None
        } else {
            Some(Box::new(self.parse_ternary()?))
        };
        self.expect(&TokenKind::Colon)?;
        let stop_expr = if matches!(self.peek().kind, TokenKind::Colon | TokenKind::Gt) {
            None
        } else {
            Some(Box::new(self.parse_ternary()?))
        };
        let step_expr = if matches!(self.peek().kind, TokenKind::Colon) {
            self.advance();
            if matches!(self.peek().kind, TokenKind::Gt) {
                None
            } else {
                Some(Box::new(self.parse_ternary()?))
            }
        } else {
            None
        };
        let end = self.expect(&TokenKind::Gt)?.span;
        Ok(Expr::Slice {
            start: start_expr,
            stop: stop_expr,
            step: step_expr,
            span: start.merge(end),
        })
    }
}

fn is_keyword(name: &str) -> bool {
    matches!(
        name,
        "true" | "false" | "null" | "each" | "map" | "fold" | "filter" | "assert" | "error" | "break" | "return"
    )
}
