//! Text form of predicates
//!
//! ```text
//! expr    := and ( OR and )*
//! and     := unary ( AND unary )*
//! unary   := NOT unary | primary
//! primary := '(' expr ')' | TRUE | FALSE
//!          | attr op literal
//!          | attr [NOT] LIKE 'pattern' | attr [NOT] ILIKE 'pattern'
//!          | attr
//! op      := = | == | != | <> | < | <= | > | >=
//! literal := 'text' | "text" | number | TRUE | FALSE | word
//! ```
//!
//! Keywords are case-insensitive. A bare word on the right-hand side is a
//! text literal (`typeName = typex`). A bare attribute is a boolean test.

use crate::value::AttributeValue;

use super::ast::{ComparisonOp, Predicate, MAX_NESTING};
use super::errors::{PredicateError, PredicateResult};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
    Number(AttributeValue),
    Op(ComparisonOp),
    LParen,
    RParen,
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    position: usize,
}

fn is_word_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

fn lex(text: &str) -> PredicateResult<Vec<Spanned>> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (position, c) = chars[i];
        let next = chars.get(i + 1).map(|(_, c)| *c);

        let token = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '(' => {
                i += 1;
                Token::LParen
            }
            ')' => {
                i += 1;
                Token::RParen
            }
            '=' => {
                i += if next == Some('=') { 2 } else { 1 };
                Token::Op(ComparisonOp::Equal)
            }
            '!' if next == Some('=') => {
                i += 2;
                Token::Op(ComparisonOp::NotEqual)
            }
            '<' => match next {
                Some('>') => {
                    i += 2;
                    Token::Op(ComparisonOp::NotEqual)
                }
                Some('=') => {
                    i += 2;
                    Token::Op(ComparisonOp::LessOrEqual)
                }
                _ => {
                    i += 1;
                    Token::Op(ComparisonOp::LessThan)
                }
            },
            '>' => {
                if next == Some('=') {
                    i += 2;
                    Token::Op(ComparisonOp::GreaterOrEqual)
                } else {
                    i += 1;
                    Token::Op(ComparisonOp::GreaterThan)
                }
            }
            '\'' | '"' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i).map(|(_, c)| *c) {
                        None => {
                            return Err(PredicateError::syntax(position, "unterminated string"))
                        }
                        Some(c) if c == quote => {
                            if chars.get(i + 1).map(|(_, c)| *c) == Some(quote) {
                                value.push(quote);
                                i += 2;
                            } else {
                                i += 1;
                                break;
                            }
                        }
                        Some(c) => {
                            value.push(c);
                            i += 1;
                        }
                    }
                }
                Token::Quoted(value)
            }
            c if c.is_ascii_digit()
                || (c == '-' && next.map(|n| n.is_ascii_digit() || n == '.').unwrap_or(false))
                || (c == '.' && next.map(|n| n.is_ascii_digit()).unwrap_or(false)) =>
            {
                let start = i;
                i += 1;
                while i < chars.len() {
                    let c = chars[i].1;
                    let prev = chars[i - 1].1;
                    let exponent_sign = (c == '+' || c == '-') && (prev == 'e' || prev == 'E');
                    if c.is_ascii_alphanumeric() || c == '.' || exponent_sign {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let end = chars.get(i).map(|(p, _)| *p).unwrap_or(text.len());
                let raw = &text[chars[start].0..end];
                Token::Number(parse_number(raw).ok_or_else(|| {
                    PredicateError::syntax(position, format!("invalid number '{}'", raw))
                })?)
            }
            c if is_word_start(c) => {
                let start = i;
                while i < chars.len() && is_word_char(chars[i].1) {
                    i += 1;
                }
                let end = chars.get(i).map(|(p, _)| *p).unwrap_or(text.len());
                Token::Word(text[chars[start].0..end].to_string())
            }
            other => {
                return Err(PredicateError::syntax(
                    position,
                    format!("unexpected character '{}'", other),
                ))
            }
        };

        tokens.push(Spanned { token, position });
    }

    Ok(tokens)
}

fn parse_number(raw: &str) -> Option<AttributeValue> {
    if let Ok(i) = raw.parse::<i64>() {
        return Some(AttributeValue::int(i));
    }
    if let Ok(u) = raw.parse::<u64>() {
        return Some(AttributeValue::from(u));
    }
    raw.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(AttributeValue::float)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map(|s| s.position).unwrap_or(self.end)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        self.pos += 1;
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> PredicateError {
        PredicateError::syntax(self.position(), message)
    }

    /// Run one nested production, failing past `MAX_NESTING` levels
    fn nested<T>(
        &mut self,
        production: impl FnOnce(&mut Self) -> PredicateResult<T>,
    ) -> PredicateResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(PredicateError::TooDeep(MAX_NESTING));
        }
        self.depth += 1;
        let result = production(self);
        self.depth -= 1;
        result
    }

    fn parse_or(&mut self) -> PredicateResult<Predicate> {
        let mut operands = vec![self.parse_and()?];
        while self.eat_keyword("OR") {
            operands.push(self.parse_and()?);
        }
        Ok(if operands.len() == 1 {
            operands.remove(0)
        } else {
            Predicate::Or(operands)
        })
    }

    fn parse_and(&mut self) -> PredicateResult<Predicate> {
        let mut operands = vec![self.parse_unary()?];
        while self.eat_keyword("AND") {
            operands.push(self.parse_unary()?);
        }
        Ok(if operands.len() == 1 {
            operands.remove(0)
        } else {
            Predicate::And(operands)
        })
    }

    fn parse_unary(&mut self) -> PredicateResult<Predicate> {
        if self.eat_keyword("NOT") {
            return Ok(Predicate::not(self.nested(Self::parse_unary)?));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> PredicateResult<Predicate> {
        match self.advance() {
            Some(Token::LParen) => {
                let inner = self.nested(Self::parse_or)?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => {
                        self.pos = self.pos.saturating_sub(1);
                        Err(self.error("expected ')'"))
                    }
                }
            }
            Some(Token::Word(word)) => {
                if word.eq_ignore_ascii_case("TRUE") {
                    return Ok(Predicate::True);
                }
                if word.eq_ignore_ascii_case("FALSE") {
                    return Ok(Predicate::not(Predicate::True));
                }
                if is_keyword(&word) {
                    self.pos -= 1;
                    return Err(self.error(format!("unexpected keyword '{}'", word)));
                }
                self.parse_condition(word)
            }
            Some(_) => {
                self.pos -= 1;
                Err(self.error("expected attribute name"))
            }
            None => Err(self.error("unexpected end of predicate")),
        }
    }

    fn parse_condition(&mut self, attribute: String) -> PredicateResult<Predicate> {
        if let Some(Token::Op(op)) = self.peek().cloned() {
            self.pos += 1;
            let value = self.parse_literal()?;
            return Ok(Predicate::Compare {
                attribute,
                op,
                value,
            });
        }

        let negated = self.peek_keyword("NOT")
            && matches!(
                self.tokens.get(self.pos + 1).map(|s| &s.token),
                Some(Token::Word(w)) if w.eq_ignore_ascii_case("LIKE") || w.eq_ignore_ascii_case("ILIKE")
            );
        if negated {
            self.pos += 1;
        }

        let like = if self.eat_keyword("LIKE") {
            Some(false)
        } else if self.eat_keyword("ILIKE") {
            Some(true)
        } else {
            None
        };

        match like {
            Some(case_insensitive) => {
                let pattern = match self.advance() {
                    Some(Token::Quoted(p)) => p,
                    _ => {
                        self.pos = self.pos.saturating_sub(1);
                        return Err(self.error("expected quoted pattern"));
                    }
                };
                let predicate = if case_insensitive {
                    Predicate::ilike(attribute, &pattern)?
                } else {
                    Predicate::like(attribute, &pattern)?
                };
                Ok(if negated {
                    Predicate::not(predicate)
                } else {
                    predicate
                })
            }
            None => Ok(Predicate::BooleanAttribute(attribute)),
        }
    }

    fn parse_literal(&mut self) -> PredicateResult<AttributeValue> {
        match self.advance() {
            Some(Token::Quoted(s)) => Ok(AttributeValue::Text(s)),
            Some(Token::Number(n)) => Ok(n),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("TRUE") => Ok(AttributeValue::Bool(true)),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("FALSE") => {
                Ok(AttributeValue::Bool(false))
            }
            Some(Token::Word(w)) if !is_keyword(&w) => Ok(AttributeValue::Text(w)),
            Some(_) => {
                self.pos -= 1;
                Err(self.error("expected literal"))
            }
            None => Err(self.error("expected literal")),
        }
    }
}

fn is_keyword(word: &str) -> bool {
    ["AND", "OR", "NOT", "LIKE", "ILIKE"]
        .iter()
        .any(|k| word.eq_ignore_ascii_case(k))
}

/// Parse predicate text.
pub fn parse(text: &str) -> PredicateResult<Predicate> {
    let tokens = lex(text)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: text.len(),
        depth: 0,
    };

    let predicate = parser.parse_or()?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    predicate.validate()?;
    Ok(predicate)
}
