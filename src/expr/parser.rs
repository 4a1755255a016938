use super::lexer::{tokenize, Token};
use crate::error::ExprError;

/// The arithmetic AST a formula compiles to.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Var(String),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Call(Builtin, Vec<Expr>),
}

/// The closed set of callable builtins. Anything else is an
/// `UnknownFunction` at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Abs,
    Min,
    Max,
    Sqrt,
    Pow,
    Sin,
    Cos,
    Tan,
    Log,
    Exp,
    Floor,
    Ceil,
    Round,
}

impl Builtin {
    fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "abs" => Builtin::Abs,
            "min" => Builtin::Min,
            "max" => Builtin::Max,
            "sqrt" => Builtin::Sqrt,
            "pow" => Builtin::Pow,
            "sin" => Builtin::Sin,
            "cos" => Builtin::Cos,
            "tan" => Builtin::Tan,
            "log" => Builtin::Log,
            "exp" => Builtin::Exp,
            "floor" => Builtin::Floor,
            "ceil" => Builtin::Ceil,
            "round" => Builtin::Round,
            _ => return None,
        })
    }

    fn arity(self) -> usize {
        match self {
            Builtin::Min | Builtin::Max | Builtin::Pow => 2,
            _ => 1,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Builtin::Abs => "abs",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Sqrt => "sqrt",
            Builtin::Pow => "pow",
            Builtin::Sin => "sin",
            Builtin::Cos => "cos",
            Builtin::Tan => "tan",
            Builtin::Log => "log",
            Builtin::Exp => "exp",
            Builtin::Floor => "floor",
            Builtin::Ceil => "ceil",
            Builtin::Round => "round",
        }
    }
}

/// Parses a screened formula source into an [`Expr`].
pub(super) fn parse(source: &str) -> Result<Expr, ExprError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expression()?;
    if let Some((token, offset)) = parser.peek_with_offset() {
        return Err(ExprError::UnexpectedToken {
            token: format!("{:?}", token),
            offset,
        });
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_with_offset(&self) -> Option<(&Token, usize)> {
        self.tokens.get(self.pos).map(|(t, o)| (t, *o))
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExprError> {
        match self.tokens.get(self.pos) {
            Some((t, _)) if *t == expected => {
                self.pos += 1;
                Ok(())
            }
            Some((t, o)) => Err(ExprError::UnexpectedToken {
                token: format!("{:?}", t),
                offset: *o,
            }),
            None => Err(ExprError::UnexpectedEnd),
        }
    }

    fn expression(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    let right = self.term()?;
                    left = Expr::Add(Box::new(left), Box::new(right));
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    let right = self.term()?;
                    left = Expr::Sub(Box::new(left), Box::new(right));
                }
                _ => return Ok(left),
            }
        }
    }

    fn term(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    let right = self.unary()?;
                    left = Expr::Mul(Box::new(left), Box::new(right));
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let right = self.unary()?;
                    left = Expr::Div(Box::new(left), Box::new(right));
                }
                _ => return Ok(left),
            }
        }
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        if matches!(self.peek(), Some(Token::Minus)) {
            self.pos += 1;
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Ident(name)) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.pos += 1;
                    let builtin = Builtin::lookup(&name)
                        .ok_or_else(|| ExprError::UnknownFunction(name.clone()))?;
                    let args = self.arguments()?;
                    if args.len() != builtin.arity() {
                        return Err(ExprError::ArityMismatch {
                            name: builtin.name().to_string(),
                            expected: builtin.arity(),
                            got: args.len(),
                        });
                    }
                    Ok(Expr::Call(builtin, args))
                } else {
                    Ok(Expr::Var(name))
                }
            }
            Some(Token::LParen) => {
                let expr = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Some(token) => {
                let offset = self
                    .tokens
                    .get(self.pos - 1)
                    .map(|(_, o)| *o)
                    .unwrap_or_default();
                Err(ExprError::UnexpectedToken {
                    token: format!("{:?}", token),
                    offset,
                })
            }
            None => Err(ExprError::UnexpectedEnd),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, ExprError> {
        let mut args = Vec::new();
        if matches!(self.peek(), Some(Token::RParen)) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                Some(token) => {
                    let offset = self
                        .tokens
                        .get(self.pos - 1)
                        .map(|(_, o)| *o)
                        .unwrap_or_default();
                    return Err(ExprError::UnexpectedToken {
                        token: format!("{:?}", token),
                        offset,
                    });
                }
                None => return Err(ExprError::UnexpectedEnd),
            }
        }
    }
}
