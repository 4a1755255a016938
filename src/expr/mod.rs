//! Sandboxed formula evaluation.
//!
//! Formula sources are screened against a character whitelist and a list of
//! forbidden tokens, parsed into a small arithmetic AST, and walked under a
//! wall-clock and memory budget. The evaluation context binds only the
//! variables supplied by the caller and a fixed set of numeric builtins;
//! there is no property access, no function definition, and no reachable
//! clock or randomness, so identical inputs always produce identical output.

mod lexer;
pub mod logic;
mod parser;

use crate::error::ExprError;
use ahash::AHashMap;
use serde_json::Value;
use std::time::Instant;

pub use parser::{Builtin, Expr};

/// Default per-formula time budget.
pub const DEFAULT_EXPR_TIMEOUT_MS: u64 = 5_000;
/// Default cap on the serialized size of a formula result.
pub const DEFAULT_EXPR_MEMORY_BYTES: usize = 10 * 1024 * 1024;

const FORBIDDEN_TOKENS: [&str; 6] = ["eval", "exec", "import", "require", "process", "fs"];

/// Resource limits for one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct ExprLimits {
    pub timeout_ms: u64,
    pub memory_bytes: usize,
}

impl Default for ExprLimits {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_EXPR_TIMEOUT_MS,
            memory_bytes: DEFAULT_EXPR_MEMORY_BYTES,
        }
    }
}

/// The result of one evaluation. Elapsed time and byte count are reported
/// even when the evaluation failed.
#[derive(Debug, Clone)]
pub struct ExprOutcome {
    pub success: bool,
    pub value: Value,
    pub error: Option<ExprError>,
    pub elapsed_ms: u64,
    pub bytes_used: usize,
}

impl ExprOutcome {
    fn failure(error: ExprError, elapsed_ms: u64, bytes_used: usize) -> Self {
        Self {
            success: false,
            value: Value::Null,
            error: Some(error),
            elapsed_ms,
            bytes_used,
        }
    }
}

/// Screens a formula source without evaluating it. Used by the validator
/// to reject unsafe documents before they ever reach the engine.
///
/// Checks, in order: forbidden tokens (so a `require(...)` is reported by
/// name even when the rest of the source is also illegal), the character
/// whitelist, and parenthesis balance.
pub fn scan_source(source: &str) -> Result<(), ExprError> {
    let mut ident = String::new();
    for c in source.chars().chain(std::iter::once(' ')) {
        if c.is_ascii_alphanumeric() || c == '_' {
            ident.push(c);
        } else if !ident.is_empty() {
            if FORBIDDEN_TOKENS.contains(&ident.as_str()) {
                return Err(ExprError::UnsafeToken(ident));
            }
            ident.clear();
        }
    }

    for c in source.chars() {
        let allowed = c.is_ascii_alphanumeric()
            || matches!(
                c,
                '_' | ' ' | '+' | '-' | '*' | '/' | '(' | ')' | '.' | ',' | '[' | ']'
            );
        if !allowed {
            return Err(ExprError::ForbiddenChar(c));
        }
    }

    let mut depth: i64 = 0;
    for c in source.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(ExprError::UnbalancedParens);
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(ExprError::UnbalancedParens);
    }
    Ok(())
}

/// Evaluates screened formula sources within resource limits.
#[derive(Debug, Clone, Default)]
pub struct ExprEvaluator {
    limits: ExprLimits,
}

impl ExprEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: ExprLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> ExprLimits {
        self.limits
    }

    /// Evaluates `source` against the supplied variables.
    pub fn evaluate(&self, source: &str, variables: &AHashMap<String, Value>) -> ExprOutcome {
        let started = Instant::now();
        let elapsed = |s: &Instant| s.elapsed().as_millis() as u64;

        if let Err(e) = scan_source(source) {
            return ExprOutcome::failure(e, elapsed(&started), 0);
        }

        let ast = match parser::parse(source) {
            Ok(ast) => ast,
            Err(e) => return ExprOutcome::failure(e, elapsed(&started), 0),
        };

        let walker = Walker {
            variables,
            started,
            timeout_ms: self.limits.timeout_ms,
        };
        let number = match walker.eval(&ast) {
            Ok(n) => n,
            Err(e) => return ExprOutcome::failure(e, elapsed(&started), 0),
        };

        // Non-finite results are unrepresentable in JSON and collapse to null.
        let value = serde_json::Number::from_f64(number)
            .map(Value::Number)
            .unwrap_or(Value::Null);
        let bytes_used = value.to_string().len();

        if bytes_used > self.limits.memory_bytes {
            return ExprOutcome::failure(
                ExprError::MemoryExceeded(self.limits.memory_bytes),
                elapsed(&started),
                bytes_used,
            );
        }

        ExprOutcome {
            success: true,
            value,
            error: None,
            elapsed_ms: elapsed(&started),
            bytes_used,
        }
    }
}

/// Coerces a JSON value to a number the way the engine does everywhere:
/// numbers pass through, booleans map to 1/0, numeric strings parse,
/// null counts as zero. Composites fail.
pub fn coerce_number(value: &Value) -> Result<f64, ExprError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| ExprError::NotNumeric(value.to_string())),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Null => Ok(0.0),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ExprError::NotNumeric(value.to_string())),
        _ => Err(ExprError::NotNumeric(value.to_string())),
    }
}

struct Walker<'a> {
    variables: &'a AHashMap<String, Value>,
    started: Instant,
    timeout_ms: u64,
}

impl Walker<'_> {
    fn eval(&self, expr: &Expr) -> Result<f64, ExprError> {
        if self.started.elapsed().as_millis() as u64 > self.timeout_ms {
            return Err(ExprError::Timeout(self.timeout_ms));
        }
        match expr {
            Expr::Number(n) => Ok(*n),
            Expr::Var(name) => {
                let value = self
                    .variables
                    .get(name)
                    .ok_or_else(|| ExprError::UnknownVariable(name.clone()))?;
                coerce_number(value)
            }
            Expr::Neg(v) => Ok(-self.eval(v)?),
            Expr::Add(l, r) => Ok(self.eval(l)? + self.eval(r)?),
            Expr::Sub(l, r) => Ok(self.eval(l)? - self.eval(r)?),
            Expr::Mul(l, r) => Ok(self.eval(l)? * self.eval(r)?),
            Expr::Div(l, r) => Ok(self.eval(l)? / self.eval(r)?),
            Expr::Call(builtin, args) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg)?);
                }
                Ok(apply_builtin(*builtin, &values))
            }
        }
    }
}

fn apply_builtin(builtin: Builtin, args: &[f64]) -> f64 {
    match builtin {
        Builtin::Abs => args[0].abs(),
        Builtin::Min => args[0].min(args[1]),
        Builtin::Max => args[0].max(args[1]),
        Builtin::Sqrt => args[0].sqrt(),
        Builtin::Pow => args[0].powf(args[1]),
        Builtin::Sin => args[0].sin(),
        Builtin::Cos => args[0].cos(),
        Builtin::Tan => args[0].tan(),
        Builtin::Log => args[0].ln(),
        Builtin::Exp => args[0].exp(),
        Builtin::Floor => args[0].floor(),
        Builtin::Ceil => args[0].ceil(),
        Builtin::Round => args[0].round(),
    }
}
