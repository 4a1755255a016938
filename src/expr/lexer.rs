use crate::error::ExprError;

/// Lexical tokens of the formula grammar.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
}

/// Tokenizes a formula source. `.` is only legal inside a numeric literal,
/// which makes property-access syntax unrepresentable; `[` and `]` pass the
/// character whitelist but have no place in the grammar and are rejected
/// here.
pub(super) fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, ExprError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' => {
                i += 1;
            }
            '+' => {
                tokens.push((Token::Plus, i));
                i += 1;
            }
            '-' => {
                tokens.push((Token::Minus, i));
                i += 1;
            }
            '*' => {
                tokens.push((Token::Star, i));
                i += 1;
            }
            '/' => {
                tokens.push((Token::Slash, i));
                i += 1;
            }
            '(' => {
                tokens.push((Token::LParen, i));
                i += 1;
            }
            ')' => {
                tokens.push((Token::RParen, i));
                i += 1;
            }
            ',' => {
                tokens.push((Token::Comma, i));
                i += 1;
            }
            '0'..='9' => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                if i < chars.len() && chars[i] == '.' {
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let number = text.parse::<f64>().map_err(|_| ExprError::UnexpectedToken {
                    token: text.clone(),
                    offset: start,
                })?;
                tokens.push((Token::Number(number), start));
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '-')
                {
                    // Identifiers may carry '-' only when glued between
                    // alphanumerics, so `a-1` stays a subtraction.
                    if chars[i] == '-'
                        && !(i + 1 < chars.len()
                            && (chars[i + 1].is_ascii_alphabetic() || chars[i + 1] == '_'))
                    {
                        break;
                    }
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                tokens.push((Token::Ident(ident), start));
            }
            _ => {
                return Err(ExprError::UnexpectedToken {
                    token: c.to_string(),
                    offset: i,
                })
            }
        }
    }
    Ok(tokens)
}
