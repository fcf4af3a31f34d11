//! Token, AST, value and error types for calculation scripts.

use std::fmt;

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    /// `const`, `let` or `var`.
    Declare,
    Plus,
    Minus,
    Star,
    Slash,
    StarStar,
    OrOr,
    LParen,
    RParen,
    Comma,
    Semicolon,
    Assign,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "number {n}"),
            Self::Str(s) => write!(f, "string \"{s}\""),
            Self::Ident(name) => write!(f, "identifier '{name}'"),
            Self::Declare => f.write_str("declaration keyword"),
            Self::Plus => f.write_str("'+'"),
            Self::Minus => f.write_str("'-'"),
            Self::Star => f.write_str("'*'"),
            Self::Slash => f.write_str("'/'"),
            Self::StarStar => f.write_str("'**'"),
            Self::OrOr => f.write_str("'||'"),
            Self::LParen => f.write_str("'('"),
            Self::RParen => f.write_str("')'"),
            Self::Comma => f.write_str("','"),
            Self::Semicolon => f.write_str("';'"),
            Self::Assign => f.write_str("'='"),
        }
    }
}

/// A token with the byte range it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    /// Value-or-default: the left side unless it is falsy.
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Var(String),
    /// Unary `-`.
    Neg(Box<Expr>),
    /// Unary `+`: numeric coercion.
    Pos(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Assign { name: String, value: Expr },
    Expr(Expr),
}

/// One parsed statement plus its source text, kept for error reports.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StmtKind,
    pub source: String,
}

/// A parsed calculation script.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Script {
    pub statements: Vec<Statement>,
}

impl Script {
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }
}

// ---------------------------------------------------------------------------
// Runtime values
// ---------------------------------------------------------------------------

/// A script value: every expression yields a number or a string.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    /// Numeric view. Text coerces like `parseFloat`.
    pub fn as_number(&self) -> f64 {
        match self {
            Self::Number(n) => *n,
            Self::Text(s) => parse_float_lossy(s),
        }
    }

    /// Zero, NaN and the empty string are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Text(s) => !s.is_empty(),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            Self::Number(n) => format_number(*n),
            Self::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

/// Renders a number without a trailing `.0` for integral values.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Lossy string-to-number coercion.
///
/// Reads the longest numeric prefix after leading whitespace (sign,
/// digits, one decimal point, optional exponent). Anything unreadable
/// yields `0`.
pub fn parse_float_lossy(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    let mantissa = &s[digits_start..end];
    if mantissa.is_empty() || mantissa == "." {
        return 0.0;
    }

    // Exponent only counts when at least one digit follows it.
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from parsing or evaluating a calculation script.
///
/// Statement indices are 1-based. A failed script never leaves partial
/// writes behind.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormulaError {
    #[error("syntax error in statement {index} `{statement}`: {message}")]
    Syntax {
        index: usize,
        statement: String,
        message: String,
    },

    #[error("evaluation failed in statement {index} `{statement}`: {message}")]
    Evaluation {
        index: usize,
        statement: String,
        message: String,
    },

    #[error("script has more than {limit} statements")]
    TooManyStatements { limit: usize },
}

impl FormulaError {
    /// The 1-based index of the failing statement, if one is known.
    pub fn statement_index(&self) -> Option<usize> {
        match self {
            Self::Syntax { index, .. } | Self::Evaluation { index, .. } => Some(*index),
            Self::TooManyStatements { .. } => None,
        }
    }

    /// Source text of the failing statement, if one is known.
    pub fn statement(&self) -> Option<&str> {
        match self {
            Self::Syntax { statement, .. } | Self::Evaluation { statement, .. } => {
                Some(statement.as_str())
            }
            Self::TooManyStatements { .. } => None,
        }
    }
}
