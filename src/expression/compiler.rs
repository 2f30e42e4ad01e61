//! Expression lexer and parser
//!
//! Hand-rolled recursive descent. Errors carry the byte position of the
//! offending token so schema validation can report where an expression
//! went wrong.

use crate::domain::ExpressionError;
use crate::expression::{CompareOp, Expression, Literal, PathExpr, PathFunc, PathSegment};

/// Compiles expression text into an [`Expression`] AST
///
/// Pure and deterministic; never mutates its input.
///
/// # Errors
///
/// Returns an [`ExpressionError`] with the position and cause when the
/// text is not a valid expression.
pub fn compile(text: &str) -> Result<Expression, ExpressionError> {
    let tokens = lex(text)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    match parser.peek() {
        None => Ok(expr),
        Some(tok) => Err(ExpressionError::new(
            tok.position,
            format!("unexpected trailing input '{}'", tok.kind.describe()),
        )),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Ident(String),
    Str(String),
    Num(f64),
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Eq,
    NotEq,
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            TokenKind::Ident(s) => s.clone(),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Num(_) => "number".to_string(),
            TokenKind::Dot => ".".to_string(),
            TokenKind::LBracket => "[".to_string(),
            TokenKind::RBracket => "]".to_string(),
            TokenKind::LParen => "(".to_string(),
            TokenKind::RParen => ")".to_string(),
            TokenKind::Eq => "=".to_string(),
            TokenKind::NotEq => "!=".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    position: usize,
}

fn lex(text: &str) -> Result<Vec<Token>, ExpressionError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '.' => {
                tokens.push(Token { kind: TokenKind::Dot, position: i });
                i += 1;
            }
            '[' => {
                tokens.push(Token { kind: TokenKind::LBracket, position: i });
                i += 1;
            }
            ']' => {
                tokens.push(Token { kind: TokenKind::RBracket, position: i });
                i += 1;
            }
            '(' => {
                tokens.push(Token { kind: TokenKind::LParen, position: i });
                i += 1;
            }
            ')' => {
                tokens.push(Token { kind: TokenKind::RParen, position: i });
                i += 1;
            }
            '=' => {
                tokens.push(Token { kind: TokenKind::Eq, position: i });
                i += 1;
            }
            '!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token { kind: TokenKind::NotEq, position: i });
                    i += 2;
                } else {
                    return Err(ExpressionError::new(i, "expected '=' after '!'"));
                }
            }
            '\'' => {
                let start = i;
                i += 1;
                let mut value = String::new();
                loop {
                    match bytes.get(i) {
                        None => {
                            return Err(ExpressionError::new(start, "unterminated string literal"))
                        }
                        Some(b'\'') => {
                            i += 1;
                            break;
                        }
                        Some(&b) => {
                            value.push(b as char);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token { kind: TokenKind::Str(value), position: start });
            }
            c if c.is_ascii_digit() || c == '-' => {
                let start = i;
                i += 1;
                while i < bytes.len()
                    && ((bytes[i] as char).is_ascii_digit() || bytes[i] == b'.')
                {
                    i += 1;
                }
                let raw = &text[start..i];
                let num: f64 = raw.parse().map_err(|_| {
                    ExpressionError::new(start, format!("invalid number '{raw}'"))
                })?;
                tokens.push(Token { kind: TokenKind::Num(num), position: start });
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '%' => {
                let start = i;
                i += 1;
                while i < bytes.len() {
                    let b = bytes[i] as char;
                    if b.is_ascii_alphanumeric() || b == '_' || b == '-' {
                        i += 1;
                    } else {
                        break;
                    }
                }
                tokens.push(Token {
                    kind: TokenKind::Ident(text[start..i].to_string()),
                    position: start,
                });
            }
            other => {
                return Err(ExpressionError::new(i, format!("unexpected character '{other}'")))
            }
        }
    }

    if tokens.is_empty() {
        return Err(ExpressionError::new(0, "empty expression"));
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn end_position(&self) -> usize {
        self.tokens.last().map(|t| t.position + 1).unwrap_or(0)
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<(), ExpressionError> {
        match self.advance() {
            Some(tok) if &tok.kind == kind => Ok(()),
            Some(tok) => Err(ExpressionError::new(
                tok.position,
                format!("expected {what}, found '{}'", tok.kind.describe()),
            )),
            None => Err(ExpressionError::new(
                self.end_position(),
                format!("expected {what}, found end of expression"),
            )),
        }
    }

    fn parse_or(&mut self) -> Result<Expression, ExpressionError> {
        let mut lhs = self.parse_and()?;
        while self.peek_keyword("or") {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expression::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expression, ExpressionError> {
        let mut lhs = self.parse_not()?;
        while self.peek_keyword("and") {
            self.advance();
            let rhs = self.parse_not()?;
            lhs = Expression::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expression, ExpressionError> {
        if self.peek_keyword("not") {
            self.advance();
            let inner = self.parse_not()?;
            return Ok(Expression::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expression, ExpressionError> {
        let lhs = self.parse_operand()?;
        let op = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Eq) => CompareOp::Eq,
            Some(TokenKind::NotEq) => CompareOp::NotEq,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_operand()?;
        Ok(Expression::Compare {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn parse_operand(&mut self) -> Result<Expression, ExpressionError> {
        match self.advance() {
            Some(Token { kind: TokenKind::Str(s), .. }) => {
                Ok(Expression::Literal(Literal::Text(s)))
            }
            Some(Token { kind: TokenKind::Num(n), .. }) => {
                Ok(Expression::Literal(Literal::Number(n)))
            }
            Some(Token { kind: TokenKind::LParen, .. }) => {
                let inner = self.parse_or()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token { kind: TokenKind::Ident(name), .. }) => match name.as_str() {
                "true" => Ok(Expression::Literal(Literal::Bool(true))),
                "false" => Ok(Expression::Literal(Literal::Bool(false))),
                _ => self.parse_path(name),
            },
            Some(tok) => Err(ExpressionError::new(
                tok.position,
                format!("expected an operand, found '{}'", tok.kind.describe()),
            )),
            None => Err(ExpressionError::new(
                self.end_position(),
                "expected an operand, found end of expression",
            )),
        }
    }

    /// Parses the rest of a path after its first segment name
    fn parse_path(&mut self, first: String) -> Result<Expression, ExpressionError> {
        let mut segments = vec![self.parse_segment_suffix(first)?];
        let mut func = None;

        while matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Dot)) {
            self.advance();
            let (name, name_pos) = match self.advance() {
                Some(Token { kind: TokenKind::Ident(name), position }) => (name, position),
                Some(tok) => {
                    return Err(ExpressionError::new(
                        tok.position,
                        format!("expected a field name, found '{}'", tok.kind.describe()),
                    ))
                }
                None => {
                    return Err(ExpressionError::new(
                        self.end_position(),
                        "expected a field name, found end of expression",
                    ))
                }
            };

            // A parenthesized segment terminates the path as a function call
            if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::LParen)) {
                self.advance();
                self.expect(&TokenKind::RParen, "')'")?;
                func = Some(match name.as_str() {
                    "exists" => PathFunc::Exists,
                    "empty" => PathFunc::Empty,
                    other => {
                        return Err(ExpressionError::new(
                            name_pos,
                            format!("unknown path function '{other}'"),
                        ))
                    }
                });
                break;
            }

            segments.push(self.parse_segment_suffix(name)?);
        }

        Ok(Expression::Path(PathExpr { segments, func }))
    }

    /// Consumes an optional `[index]` suffix for the segment
    fn parse_segment_suffix(&mut self, name: String) -> Result<PathSegment, ExpressionError> {
        let mut index = None;
        if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::LBracket)) {
            self.advance();
            index = match self.advance() {
                Some(Token { kind: TokenKind::Num(n), position: num_pos }) => {
                    if n < 0.0 || n.fract() != 0.0 {
                        return Err(ExpressionError::new(
                            num_pos,
                            format!("array index must be a non-negative integer, got {n}"),
                        ));
                    }
                    Some(n as usize)
                }
                Some(tok) => {
                    return Err(ExpressionError::new(
                        tok.position,
                        format!("expected an array index, found '{}'", tok.kind.describe()),
                    ))
                }
                None => {
                    return Err(ExpressionError::new(
                        self.end_position(),
                        "expected an array index, found end of expression",
                    ))
                }
            };
            self.expect(&TokenKind::RBracket, "']'")?;
        }
        Ok(PathSegment { name, index })
    }

    fn peek_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(Token { kind: TokenKind::Ident(name), .. }) if name == kw)
    }
}
