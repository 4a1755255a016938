//! The boolean grammar used by condition nodes.
//!
//! A `parameters.logic` string is parsed as a small grammar over node-id
//! literals and the operators `&`, `|`, `!`, and parentheses. Both single
//! (`&`, `|`) and doubled (`&&`, `||`) spellings are accepted. Node ids
//! are resolved through a caller-supplied lookup, so no dynamic code is
//! ever constructed from document content.

use crate::error::ExprError;

#[derive(Debug, Clone, PartialEq)]
enum LogicToken {
    Ident(String),
    And,
    Or,
    Not,
    LParen,
    RParen,
    True,
    False,
}

/// Evaluates a boolean logic expression. `lookup` maps a node id to its
/// current truthiness; an unresolvable id is an error.
pub fn evaluate_logic<F>(source: &str, lookup: F) -> Result<bool, ExprError>
where
    F: Fn(&str) -> Option<bool>,
{
    let tokens = tokenize(source)?;
    let mut parser = LogicParser {
        tokens,
        pos: 0,
        lookup: &lookup,
    };
    let value = parser.or_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(ExprError::UnexpectedToken {
            token: format!("{:?}", parser.tokens[parser.pos]),
            offset: parser.pos,
        });
    }
    Ok(value)
}

fn tokenize(source: &str) -> Result<Vec<LogicToken>, ExprError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '&' => {
                i += if chars.get(i + 1) == Some(&'&') { 2 } else { 1 };
                tokens.push(LogicToken::And);
            }
            '|' => {
                i += if chars.get(i + 1) == Some(&'|') { 2 } else { 1 };
                tokens.push(LogicToken::Or);
            }
            '!' => {
                i += 1;
                tokens.push(LogicToken::Not);
            }
            '(' => {
                i += 1;
                tokens.push(LogicToken::LParen);
            }
            ')' => {
                i += 1;
                tokens.push(LogicToken::RParen);
            }
            c if c.is_ascii_alphanumeric() || c == '_' || c == '-' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '-')
                {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                tokens.push(match ident.as_str() {
                    "true" => LogicToken::True,
                    "false" => LogicToken::False,
                    _ => LogicToken::Ident(ident),
                });
            }
            other => {
                return Err(ExprError::UnexpectedToken {
                    token: other.to_string(),
                    offset: i,
                })
            }
        }
    }
    Ok(tokens)
}

struct LogicParser<'a> {
    tokens: Vec<LogicToken>,
    pos: usize,
    lookup: &'a dyn Fn(&str) -> Option<bool>,
}

impl LogicParser<'_> {
    fn or_expr(&mut self) -> Result<bool, ExprError> {
        let mut value = self.and_expr()?;
        while self.tokens.get(self.pos) == Some(&LogicToken::Or) {
            self.pos += 1;
            // No short-circuit: the right side must still be well formed.
            let right = self.and_expr()?;
            value = value || right;
        }
        Ok(value)
    }

    fn and_expr(&mut self) -> Result<bool, ExprError> {
        let mut value = self.unary()?;
        while self.tokens.get(self.pos) == Some(&LogicToken::And) {
            self.pos += 1;
            let right = self.unary()?;
            value = value && right;
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<bool, ExprError> {
        match self.tokens.get(self.pos).cloned() {
            Some(LogicToken::Not) => {
                self.pos += 1;
                Ok(!self.unary()?)
            }
            Some(LogicToken::LParen) => {
                self.pos += 1;
                let value = self.or_expr()?;
                if self.tokens.get(self.pos) != Some(&LogicToken::RParen) {
                    return Err(ExprError::UnbalancedParens);
                }
                self.pos += 1;
                Ok(value)
            }
            Some(LogicToken::True) => {
                self.pos += 1;
                Ok(true)
            }
            Some(LogicToken::False) => {
                self.pos += 1;
                Ok(false)
            }
            Some(LogicToken::Ident(name)) => {
                self.pos += 1;
                (self.lookup)(&name).ok_or(ExprError::UnknownVariable(name))
            }
            Some(token) => Err(ExprError::UnexpectedToken {
                token: format!("{:?}", token),
                offset: self.pos,
            }),
            None => Err(ExprError::UnexpectedEnd),
        }
    }
}
