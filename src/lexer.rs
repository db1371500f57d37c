// ABOUTME: tokenize() — source text to token stream (spec section 4.1)

use crate::error::RillError;
use crate::span::{Pos, Span};
use crate::token::{StringPart, Token, TokenKind};
use std::iter::Peekable;
use std::str::Chars;

pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    pos: Pos,
    at_file_start: bool,
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            chars: source.chars().peekable(),
            pos: Pos::start(),
            at_file_start: true,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn peek2(&self) -> Option<char> {
        let mut clone = self.chars.clone();
        clone.next();
        clone.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.pos.advance(c);
        Some(c)
    }

    fn lex_error(&self, msg: impl Into<String>) -> RillError {
        RillError::parse_invalid_syntax(msg, Some(Span::point(self.pos)))
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, RillError> {
        let mut tokens = Vec::new();

        if self.at_file_start {
            if let Some(fm) = self.try_lex_frontmatter()? {
                tokens.push(fm);
            }
            self.at_file_start = false;
        }

        loop {
            self.skip_non_newline_whitespace_and_comments();
            let start = self.pos;
            let Some(c) = self.peek() else {
                tokens.push(Token::new(TokenKind::Eof, Span::point(start)));
                break;
            };

            if c == '\n' {
                self.bump();
                tokens.push(Token::new(TokenKind::Newline, Span::new(start, self.pos)));
                continue;
            }

            let tok = if c == '"' {
                self.lex_string(start)?
            } else if c == '<' && self.peek2().is_some_and(is_ident_start) && self.is_heredoc_open()
            {
                self.lex_heredoc(start)?
            } else if c.is_ascii_digit() || (c == '.' && self.peek2().is_some_and(|n| n.is_ascii_digit())) {
                self.lex_number(start)?
            } else if c == '$' {
                self.bump();
                if self.peek().is_some_and(is_ident_start) {
                    Token::new(TokenKind::Dollar, Span::new(start, self.pos))
                } else {
                    Token::new(TokenKind::PipeVar, Span::new(start, self.pos))
                }
            } else if is_ident_start(c) {
                self.lex_identifier(start)
            } else {
                self.lex_operator(start)?
            };
            tokens.push(tok);
        }

        Ok(tokens)
    }

    fn is_heredoc_open(&self) -> bool {
        let mut clone = self.chars.clone();
        clone.next() == Some('<')
    }

    fn skip_non_newline_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c == ' ' || c == '\t' || c == '\r' => {
                    self.bump();
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn try_lex_frontmatter(&mut self) -> Result<Option<Token>, RillError> {
        let mut clone = self.chars.clone();
        let prefix: String = (0..3).filter_map(|_| clone.next()).collect();
        if prefix != "---" {
            return Ok(None);
        }
        let after = clone.next();
        if !matches!(after, Some('\n') | None) {
            return Ok(None);
        }

        let start = self.pos;
        self.bump();
        self.bump();
        self.bump(); // consume "---"
        if self.peek() == Some('\n') {
            self.bump();
        }

        let mut content = String::new();
        loop {
            if self.at_line_start_matches("---") {
                self.bump();
                self.bump();
                self.bump();
                break;
            }
            match self.bump() {
                Some(c) => content.push(c),
                None => return Err(self.lex_error("unterminated frontmatter block")),
            }
        }
        Ok(Some(Token::new(
            TokenKind::Frontmatter(content),
            Span::new(start, self.pos),
        )))
    }

    fn at_line_start_matches(&self, needle: &str) -> bool {
        let mut clone = self.chars.clone();
        for expected in needle.chars() {
            if clone.next() != Some(expected) {
                return false;
            }
        }
        true
    }

    fn lex_identifier(&mut self, start: Pos) -> Token {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }
        Token::new(TokenKind::Identifier(s), Span::new(start, self.pos))
    }

    fn lex_number(&mut self, start: Pos) -> Result<Token, RillError> {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if self.peek() == Some('.') && self.peek2().is_some_and(|c| c.is_ascii_digit() || c == ' ' || !is_ident_start(c)) {
            // `42.` (trailing dot) and `42.5` both allowed; `42.field` is not a number.
            if self.peek2().is_some_and(|c| c.is_ascii_digit()) || !self.peek2().is_some_and(is_ident_start) {
                s.push('.');
                self.bump();
                while let Some(c) = self.peek() {
                    if c.is_ascii_digit() {
                        s.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
            }
        }
        let value: f64 = s
            .parse()
            .map_err(|_| self.lex_error(format!("invalid number literal '{s}'")))?;
        Ok(Token::new(TokenKind::Number(value), Span::new(start, self.pos)))
    }

    fn lex_escape(&mut self) -> Result<char, RillError> {
        match self.bump() {
            Some('n') => Ok('\n'),
            Some('t') => Ok('\t'),
            Some('\\') => Ok('\\'),
            Some('"') => Ok('"'),
            Some('{') => Ok('{'),
            Some(other) => Ok(other),
            None => Err(self.lex_error("unterminated escape sequence")),
        }
    }

    fn lex_string(&mut self, start: Pos) -> Result<Token, RillError> {
        self.bump(); // opening quote
        let triple = self.peek() == Some('"') && self.peek2() == Some('"');
        if triple {
            self.bump();
            self.bump();
            let mut s = String::new();
            loop {
                if self.peek() == Some('"') && self.peek2() == Some('"') {
                    let mut clone = self.chars.clone();
                    clone.next();
                    clone.next();
                    if clone.next() == Some('"') {
                        self.bump();
                        self.bump();
                        self.bump();
                        break;
                    }
                }
                match self.bump() {
                    Some(c) => s.push(c),
                    None => return Err(self.lex_error("unterminated triple-quoted string")),
                }
            }
            return Ok(Token::new(
                TokenKind::StringLiteral(vec![StringPart::Literal(s)]),
                Span::new(start, self.pos),
            ));
        }

        let mut parts = Vec::new();
        let mut literal = String::new();
        loop {
            match self.peek() {
                None => return Err(self.lex_error("unterminated string literal")),
                Some('"') => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    literal.push(self.lex_escape()?);
                }
                Some('{') => {
                    let interp_start = self.pos;
                    self.bump();
                    if !literal.is_empty() {
                        parts.push(StringPart::Literal(std::mem::take(&mut literal)));
                    }
                    let mut depth = 1usize;
                    let mut inner = String::new();
                    loop {
                        match self.peek() {
                            None => return Err(self.lex_error("unterminated interpolation")),
                            Some('{') => {
                                depth += 1;
                                inner.push(self.bump().unwrap());
                            }
                            Some('}') => {
                                depth -= 1;
                                self.bump();
                                if depth == 0 {
                                    break;
                                }
                                inner.push('}');
                            }
                            Some('"') if inner.trim_start().starts_with("\"\"\"") => {
                                return Err(self.lex_error(
                                    "triple-quoted strings are forbidden inside interpolations",
                                ));
                            }
                            Some(c) => {
                                inner.push(c);
                                self.bump();
                            }
                        }
                    }
                    if inner.trim().is_empty() {
                        return Err(self.lex_error("empty interpolation"));
                    }
                    parts.push(StringPart::Interpolation(
                        inner,
                        Span::new(interp_start, self.pos),
                    ));
                }
                Some(c) => {
                    literal.push(c);
                    self.bump();
                }
            }
        }
        if !literal.is_empty() || parts.is_empty() {
            parts.push(StringPart::Literal(literal));
        }
        Ok(Token::new(
            TokenKind::StringLiteral(parts),
            Span::new(start, self.pos),
        ))
    }

    fn lex_heredoc(&mut self, start: Pos) -> Result<Token, RillError> {
        self.bump();
        self.bump(); // consume "<<"
        let mut tag = String::new();
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                tag.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if self.peek() == Some('\n') {
            self.bump();
        }
        let mut content = String::new();
        loop {
            if self.at_line_start_matches(&tag) {
                let mut clone = self.chars.clone();
                for _ in 0..tag.chars().count() {
                    clone.next();
                }
                if matches!(clone.peek(), Some('\n') | None) {
                    for _ in 0..tag.chars().count() {
                        self.bump();
                    }
                    break;
                }
            }
            match self.bump() {
                Some(c) => content.push(c),
                None => return Err(self.lex_error(format!("unterminated heredoc <<{tag}"))),
            }
        }
        if content.ends_with('\n') {
            content.pop();
        }
        Ok(Token::new(
            TokenKind::StringLiteral(vec![StringPart::Literal(content)]),
            Span::new(start, self.pos),
        ))
    }

    fn lex_operator(&mut self, start: Pos) -> Result<Token, RillError> {
        macro_rules! two {
            ($a:expr, $b:expr, $kind:expr) => {
                if self.peek() == Some($a) && self.peek2() == Some($b) {
                    self.bump();
                    self.bump();
                    return Ok(Token::new($kind, Span::new(start, self.pos)));
                }
            };
        }
        two!(':', '>', TokenKind::CaptureArrow);
        two!('-', '>', TokenKind::Arrow);
        two!('>', '>', TokenKind::ClosureChain);
        two!('=', '=', TokenKind::Eq);
        two!('!', '=', TokenKind::NotEq);
        two!('<', '=', TokenKind::LtEq);
        two!('>', '=', TokenKind::GtEq);
        two!('|', '|', TokenKind::Or);
        two!('&', '&', TokenKind::And);
        two!(':', ':', TokenKind::DoubleColon);
        two!('?', '?', TokenKind::QQ);
        two!('.', '?', TokenKind::OptDot);
        two!('*', '<', TokenKind::DestructureOpen);
        two!('/', '<', TokenKind::SliceOpen);

        let c = self.bump().ok_or_else(|| self.lex_error("unexpected end of input"))?;
        let kind = match c {
            '.' => TokenKind::Dot,
            '?' => TokenKind::Question,
            '!' => TokenKind::Bang,
            '@' => TokenKind::At,
            '^' => TokenKind::Caret,
            ':' => TokenKind::Colon,
            ',' => TokenKind::Comma,
            '=' => TokenKind::Assign,
            '<' => TokenKind::Lt,
            '>' => TokenKind::Gt,
            '_' => TokenKind::Underscore,
            '|' => TokenKind::Pipe,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            other => return Err(self.lex_error(format!("unexpected character '{other}'"))),
        };
        Ok(Token::new(kind, Span::new(start, self.pos)))
    }
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, RillError> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_numbers() {
        assert_eq!(kinds("42"), vec![TokenKind::Number(42.0), TokenKind::Eof]);
        assert_eq!(kinds("3.14"), vec![TokenKind::Number(3.14), TokenKind::Eof]);
    }

    #[test]
    fn lexes_pipe_var_vs_dollar_name() {
        assert_eq!(
            kinds("$x"),
            vec![
                TokenKind::Dollar,
                TokenKind::Identifier("x".to_string()),
                TokenKind::Eof
            ]
        );
        assert_eq!(kinds("$"), vec![TokenKind::PipeVar, TokenKind::Eof]);
    }

    #[test]
    fn lexes_pipe_and_capture_operators() {
        assert_eq!(
            kinds("-> :>"),
            vec![TokenKind::Arrow, TokenKind::CaptureArrow, TokenKind::Eof]
        );
    }

    #[test]
    fn lexes_simple_string() {
        let toks = kinds("\"hi\"");
        assert_eq!(
            toks,
            vec![
                TokenKind::StringLiteral(vec![StringPart::Literal("hi".to_string())]),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn lexes_interpolated_string() {
        let toks = kinds("\"hello {$name}!\"");
        match &toks[0] {
            TokenKind::StringLiteral(parts) => {
                assert_eq!(parts.len(), 3);
                assert_eq!(parts[0], StringPart::Literal("hello ".to_string()));
                assert!(matches!(parts[1], StringPart::Interpolation(..)));
                assert_eq!(parts[2], StringPart::Literal("!".to_string()));
            }
            other => panic!("unexpected token {other:?}"),
        }
    }

    #[test]
    fn empty_interpolation_is_a_lex_error() {
        assert!(tokenize("\"{}\"").is_err());
    }

    #[test]
    fn lexes_heredoc() {
        let toks = kinds("<<EOF\nhello\nworld\nEOF\n");
        assert_eq!(
            toks[0],
            TokenKind::StringLiteral(vec![StringPart::Literal("hello\nworld".to_string())])
        );
    }

    #[test]
    fn lexes_frontmatter_only_at_start() {
        let toks = kinds("---\nkey: value\n---\n1");
        assert_eq!(
            toks[0],
            TokenKind::Frontmatter("key: value\n".to_string())
        );
        assert!(matches!(toks[1], TokenKind::Newline));
    }

    #[test]
    fn comment_runs_to_end_of_line() {
        assert_eq!(
            kinds("1 # comment\n2"),
            vec![
                TokenKind::Number(1.0),
                TokenKind::Newline,
                TokenKind::Number(2.0),
                TokenKind::Eof
            ]
        );
    }
}
