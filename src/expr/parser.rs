//! Tokenizer and recursive-descent parser for guard expressions.

use crate::error::{Error, Result};
use crate::expr::ast::{Condition, RelOp};

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Var(String),
    Number(f64),
    Text(String),
    And,
    Or,
    Not,
    LParen,
    RParen,
    Op(RelOp),
}

#[derive(Clone, Debug)]
struct Spanned {
    token: Token,
    offset: usize,
}

/// Parses `source` into a [`Condition`].
pub fn parse(source: &str) -> Result<Condition> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
    };
    let condition = parser.parse_or()?;
    if let Some(extra) = parser.tokens.get(parser.pos) {
        return Err(parser.error_at(extra.offset, "unexpected trailing input"));
    }
    Ok(condition)
}

fn tokenize(source: &str) -> Result<Vec<Spanned>> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    let err = |offset: usize, message: &str| Error::Parse {
        expr: source.to_owned(),
        offset,
        message: message.to_owned(),
    };
    while i < bytes.len() {
        let c = bytes[i];
        let start = i;
        let token = match c {
            b' ' | b'\t' | b'\r' | b'\n' => {
                i += 1;
                continue;
            }
            b'(' => {
                i += 1;
                Token::LParen
            }
            b')' => {
                i += 1;
                Token::RParen
            }
            b'=' => {
                i += 1;
                Token::Op(RelOp::Eq)
            }
            b'!' => {
                if bytes.get(i + 1) != Some(&b'=') {
                    return Err(err(start, "expected '!='"));
                }
                i += 2;
                Token::Op(RelOp::Ne)
            }
            b'<' | b'>' => {
                let or_equal = bytes.get(i + 1) == Some(&b'=');
                i += if or_equal { 2 } else { 1 };
                Token::Op(match (c, or_equal) {
                    (b'<', false) => RelOp::Lt,
                    (b'<', true) => RelOp::Le,
                    (_, false) => RelOp::Gt,
                    (_, true) => RelOp::Ge,
                })
            }
            b'\'' | b'"' => {
                let close = source[i + 1..]
                    .find(c as char)
                    .ok_or_else(|| err(start, "unterminated text literal"))?;
                let text = source[i + 1..i + 1 + close].to_owned();
                i += close + 2;
                Token::Text(text)
            }
            b'$' => {
                let len = ident_len(&source[i + 1..]);
                if len == 0 {
                    return Err(err(start, "expected variable name after '$'"));
                }
                let name = source[i + 1..i + 1 + len].to_owned();
                i += len + 1;
                Token::Var(name)
            }
            b'0'..=b'9' | b'.' | b'-' => {
                let mut end = i + 1;
                while end < bytes.len() && (bytes[end].is_ascii_digit() || bytes[end] == b'.') {
                    end += 1;
                }
                let text = &source[i..end];
                let number = text
                    .parse::<f64>()
                    .map_err(|_| err(start, "invalid numeric literal"))?;
                i = end;
                Token::Number(number)
            }
            c if c.is_ascii_alphabetic() => {
                let len = ident_len(&source[i..]);
                let word = &source[i..i + len];
                i += len;
                match word {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => return Err(err(start, "unknown keyword")),
                }
            }
            _ => return Err(err(start, "unexpected character")),
        };
        tokens.push(Spanned {
            token,
            offset: start,
        });
    }
    Ok(tokens)
}

fn ident_len(text: &str) -> usize {
    text.bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
        .count()
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn next(&mut self) -> Option<Spanned> {
        let item = self.tokens.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|s| s.offset)
            .unwrap_or(self.source.len())
    }

    fn error_at(&self, offset: usize, message: &str) -> Error {
        Error::Parse {
            expr: self.source.to_owned(),
            offset,
            message: message.to_owned(),
        }
    }

    fn expect(&mut self, expected: Token, message: &str) -> Result<()> {
        let offset = self.offset();
        match self.next() {
            Some(s) if s.token == expected => Ok(()),
            _ => Err(self.error_at(offset, message)),
        }
    }

    fn parse_or(&mut self) -> Result<Condition> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.parse_and()?;
            lhs = Condition::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Condition> {
        let mut lhs = self.parse_compare()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.parse_compare()?;
            lhs = Condition::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_compare(&mut self) -> Result<Condition> {
        let lhs = self.parse_unary()?;
        if let Some(Token::Op(op)) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.parse_unary()?;
            return Ok(Condition::Compare {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            });
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Condition> {
        let offset = self.offset();
        let Some(spanned) = self.next() else {
            return Err(self.error_at(offset, "unexpected end of expression"));
        };
        match spanned.token {
            Token::Not => {
                self.expect(Token::LParen, "expected '(' after not")?;
                let inner = self.parse_or()?;
                self.expect(Token::RParen, "expected ')' to close not(")?;
                Ok(Condition::Not(Box::new(inner)))
            }
            Token::LParen => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen, "expected ')'")?;
                Ok(inner)
            }
            Token::Var(name) => Ok(Condition::Var(name)),
            Token::Number(n) => Ok(Condition::Number(n)),
            Token::Text(s) => Ok(Condition::Text(s)),
            _ => Err(self.error_at(spanned.offset, "expected operand")),
        }
    }
}
