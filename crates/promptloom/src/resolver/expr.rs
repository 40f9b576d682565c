//! Restricted expression language for computed slots.
//!
//! Grammar:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/' | '%') unary)*
//! unary   := ('-' | '+') unary | primary
//! primary := NUMBER | STRING | IDENT | '(' expr ')'
//! ```
//!
//! Identifiers look up already-resolved slot values. `+` adds when both
//! operands read as numbers and concatenates otherwise; the other operators
//! are numeric only. Nothing is ever executed dynamically.

use std::fmt;

use crate::error::ExprError;
use crate::value::SlotValue;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Str(String),
    Ident(String),
    Op(char),
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Num(n) => write!(f, "{n}"),
            Token::Str(s) => write!(f, "\"{s}\""),
            Token::Ident(name) => f.write_str(name),
            Token::Op(c) => write!(f, "{c}"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
        }
    }
}

fn tokenize(src: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(offset, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut literal = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' {
                        literal.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let n = literal
                    .parse::<f64>()
                    .map_err(|_| ExprError::UnexpectedChar { ch, offset })?;
                tokens.push(Token::Num(n));
            }
            '"' | '\'' => {
                let quote = ch;
                chars.next();
                let mut literal = String::new();
                let mut closed = false;
                while let Some((_, c)) = chars.next() {
                    match c {
                        c if c == quote => {
                            closed = true;
                            break;
                        }
                        '\\' => {
                            if let Some((_, escaped)) = chars.next() {
                                literal.push(escaped);
                            }
                        }
                        c => literal.push(c),
                    }
                }
                if !closed {
                    return Err(ExprError::UnterminatedString(offset));
                }
                tokens.push(Token::Str(literal));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(name));
            }
            '+' | '-' | '*' | '/' | '%' => {
                tokens.push(Token::Op(ch));
                chars.next();
            }
            '(' => {
                tokens.push(Token::LParen);
                chars.next();
            }
            ')' => {
                tokens.push(Token::RParen);
                chars.next();
            }
            _ => return Err(ExprError::UnexpectedChar { ch, offset }),
        }
    }
    Ok(tokens)
}

/// Nesting limit for parentheses and unary operators.
pub const MAX_DEPTH: usize = 256;

struct Parser<'a, F> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
    lookup: F,
}

impl<F> Parser<'_, F>
where
    F: Fn(&str) -> Option<SlotValue>,
{
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    /// Run `f` one nesting level deeper.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ExprError>,
    ) -> Result<T, ExprError> {
        if self.depth >= MAX_DEPTH {
            return Err(ExprError::TooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn expr(&mut self) -> Result<SlotValue, ExprError> {
        let mut left = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek() {
            let op = *op;
            self.pos += 1;
            let right = self.term()?;
            left = binary(op, left, right)?;
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<SlotValue, ExprError> {
        let mut left = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/' | '%'))) = self.peek() {
            let op = *op;
            self.pos += 1;
            let right = self.unary()?;
            left = binary(op, left, right)?;
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<SlotValue, ExprError> {
        match self.peek() {
            Some(Token::Op('-')) => {
                self.pos += 1;
                let operand = self.nested(Self::unary)?;
                let n = numeric(&operand).ok_or(ExprError::TypeMismatch {
                    op: '-',
                    left: "nothing",
                    right: operand.type_name(),
                })?;
                Ok(SlotValue::Number(-n))
            }
            Some(Token::Op('+')) => {
                self.pos += 1;
                self.nested(Self::unary)
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<SlotValue, ExprError> {
        match self.next().cloned() {
            Some(Token::Num(n)) => Ok(SlotValue::Number(n)),
            Some(Token::Str(s)) => Ok(SlotValue::Text(s)),
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(SlotValue::Bool(true)),
                "false" => Ok(SlotValue::Bool(false)),
                _ => (self.lookup)(&name).ok_or(ExprError::UnknownVariable(name)),
            },
            Some(Token::LParen) => {
                let inner = self.nested(Self::expr)?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    Some(other) => Err(ExprError::UnexpectedToken(other.to_string())),
                    None => Err(ExprError::UnexpectedEnd),
                }
            }
            Some(other) => Err(ExprError::UnexpectedToken(other.to_string())),
            None => Err(ExprError::UnexpectedEnd),
        }
    }
}

/// Numbers, and text that parses as one. Booleans never coerce.
fn numeric(value: &SlotValue) -> Option<f64> {
    match value {
        SlotValue::Number(_) | SlotValue::Text(_) => value.as_f64(),
        _ => None,
    }
}

fn binary(op: char, left: SlotValue, right: SlotValue) -> Result<SlotValue, ExprError> {
    let (l, r) = (numeric(&left), numeric(&right));
    if op == '+' {
        return Ok(match (l, r) {
            (Some(a), Some(b)) => SlotValue::Number(a + b),
            _ => SlotValue::Text(format!("{}{}", left.render(), right.render())),
        });
    }

    let (Some(a), Some(b)) = (l, r) else {
        return Err(ExprError::TypeMismatch {
            op,
            left: left.type_name(),
            right: right.type_name(),
        });
    };
    match op {
        '-' => Ok(SlotValue::Number(a - b)),
        '*' => Ok(SlotValue::Number(a * b)),
        '/' | '%' if b == 0.0 => Err(ExprError::DivisionByZero),
        '/' => Ok(SlotValue::Number(a / b)),
        _ => Ok(SlotValue::Number(a % b)),
    }
}

/// Evaluate `src`, resolving identifiers through `lookup`.
pub fn evaluate<F>(src: &str, lookup: F) -> Result<SlotValue, ExprError>
where
    F: Fn(&str) -> Option<SlotValue>,
{
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(ExprError::Empty);
    }
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
        lookup,
    };
    let value = parser.expr()?;
    match parser.peek() {
        None => Ok(value),
        Some(extra) => Err(ExprError::UnexpectedToken(extra.to_string())),
    }
}
