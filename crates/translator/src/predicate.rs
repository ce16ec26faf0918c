//! `when` 조건식 언어 -- 규칙의 매칭 가드
//!
//! 최소 문법:
//! ```text
//! expr   := term ( ("and"|"or") term )*
//! term   := path op literal | "not" term | "(" expr ")"
//! op     := "=" | "!=" | "like"
//! ```
//!
//! `like 'X'`는 경로 값의 문자열 형태에 대한 부분 문자열 포함 검사입니다.
//! 없는 경로에 대한 비교는 항상 거짓이며, `and`/`or`는 좌에서 우로
//! 단락(short-circuit) 평가됩니다.

use serde_json::Value;

use normwire_core::event::DataMap;
use normwire_core::maps;

use crate::error::TranslatorError;

/// 비교 연산자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `like` (부분 문자열 포함)
    Like,
}

/// 컴파일된 조건식 AST
#[derive(Debug, Clone)]
pub enum Predicate {
    /// `path op 'literal'`
    Compare {
        path: String,
        op: CmpOp,
        literal: String,
    },
    /// `not term`
    Not(Box<Predicate>),
    /// `a and b`
    And(Box<Predicate>, Box<Predicate>),
    /// `a or b`
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    /// 조건식 문자열을 AST로 컴파일합니다.
    pub fn parse(expr: &str) -> Result<Self, TranslatorError> {
        let tokens = tokenize(expr)?;
        let mut cursor = Cursor {
            expr,
            tokens,
            pos: 0,
        };
        let predicate = cursor.expr()?;
        if cursor.pos != cursor.tokens.len() {
            return Err(cursor.error("trailing tokens after expression"));
        }
        Ok(predicate)
    }

    /// 데이터 트리에 대해 조건식을 평가합니다.
    pub fn eval(&self, data: &DataMap) -> bool {
        match self {
            Predicate::Compare { path, op, literal } => {
                // 없는 경로는 어떤 비교든 거짓
                let Some(value) = maps::get_in(data, path) else {
                    return false;
                };
                let text = string_form(value);
                match op {
                    CmpOp::Eq => text == *literal,
                    CmpOp::Ne => text != *literal,
                    CmpOp::Like => text.contains(literal.as_str()),
                }
            }
            Predicate::Not(inner) => !inner.eval(data),
            Predicate::And(left, right) => left.eval(data) && right.eval(data),
            Predicate::Or(left, right) => left.eval(data) || right.eval(data),
        }
    }
}

/// 값의 문자열 형태를 반환합니다. 문자열은 그대로, 그 외는 JSON 표현입니다.
fn string_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Literal(String),
    Op(CmpOp),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Result<Vec<Token>, TranslatorError> {
    let mut tokens = Vec::new();
    let mut chars = expr.char_indices().peekable();

    while let Some(&(pos, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '=' => {
                chars.next();
                tokens.push(Token::Op(CmpOp::Eq));
            }
            '!' => {
                chars.next();
                match chars.peek() {
                    Some(&(_, '=')) => {
                        chars.next();
                        tokens.push(Token::Op(CmpOp::Ne));
                    }
                    _ => {
                        return Err(TranslatorError::BadPredicate {
                            expr: expr.to_owned(),
                            reason: format!("expected '=' after '!' at offset {pos}"),
                        });
                    }
                }
            }
            '\'' => {
                chars.next();
                let mut literal = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '\'' {
                        closed = true;
                        break;
                    }
                    literal.push(c);
                }
                if !closed {
                    return Err(TranslatorError::BadPredicate {
                        expr: expr.to_owned(),
                        reason: "unterminated string literal".to_owned(),
                    });
                }
                tokens.push(Token::Literal(literal));
            }
            c if is_ident_char(c) => {
                let mut ident = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if is_ident_char(c) {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(match ident.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "like" => Token::Op(CmpOp::Like),
                    _ => Token::Ident(ident),
                });
            }
            other => {
                return Err(TranslatorError::BadPredicate {
                    expr: expr.to_owned(),
                    reason: format!("unexpected character '{other}' at offset {pos}"),
                });
            }
        }
    }

    Ok(tokens)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

struct Cursor<'a> {
    expr: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Cursor<'_> {
    fn error(&self, reason: &str) -> TranslatorError {
        TranslatorError::BadPredicate {
            expr: self.expr.to_owned(),
            reason: reason.to_owned(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// expr := term ( ("and"|"or") term )*
    fn expr(&mut self) -> Result<Predicate, TranslatorError> {
        let mut left = self.term()?;

        loop {
            match self.peek() {
                Some(Token::And) => {
                    self.pos += 1;
                    let right = self.term()?;
                    left = Predicate::And(Box::new(left), Box::new(right));
                }
                Some(Token::Or) => {
                    self.pos += 1;
                    let right = self.term()?;
                    left = Predicate::Or(Box::new(left), Box::new(right));
                }
                _ => return Ok(left),
            }
        }
    }

    /// term := path op literal | "not" term | "(" expr ")"
    fn term(&mut self) -> Result<Predicate, TranslatorError> {
        match self.next() {
            Some(Token::Not) => Ok(Predicate::Not(Box::new(self.term()?))),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(self.error("expected ')'")),
                }
            }
            Some(Token::Ident(path)) => {
                let op = match self.next() {
                    Some(Token::Op(op)) => op,
                    _ => return Err(self.error("expected comparison operator after path")),
                };
                let literal = match self.next() {
                    Some(Token::Literal(literal)) => literal,
                    _ => return Err(self.error("expected quoted literal after operator")),
                };
                Ok(Predicate::Compare { path, op, literal })
            }
            _ => Err(self.error("expected a term")),
        }
    }
}
