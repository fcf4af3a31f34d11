//! Recursive-descent parser for calculation scripts.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! script     := { statement }
//! statement  := [ "const" | "let" | "var" ] IDENT "=" expr [ ";" ]
//!             | expr [ ";" ]
//! expr       := additive { "||" additive }
//! additive   := term { ( "+" | "-" ) term }
//! term       := power { ( "*" | "/" ) power }
//! power      := unary [ "**" power ]            (right associative)
//! unary      := ( "-" | "+" ) unary | primary
//! primary    := NUMBER | STRING | IDENT "(" [ expr { "," expr } ] ")"
//!             | IDENT | "(" expr ")"
//! ```
//!
//! Semicolons are optional; a statement ends where its expression can no
//! longer continue.

use std::collections::VecDeque;

use crate::lexer::{LexError, Lexer};
use crate::types::{BinOp, Expr, FormulaError, Script, Statement, StmtKind, Token, TokenKind};

/// Upper bound on statements per script.
pub const MAX_STATEMENTS: usize = 10_000;

/// Upper bound on expression nesting, keeping recursion off the stack limit.
/// Every chained binary operator counts as a level, since `a + b + c` nests
/// to the left.
pub const MAX_DEPTH: usize = 256;

/// Longest statement excerpt carried in an error.
const EXCERPT_LEN: usize = 120;

/// Parses `source` into a [`Script`].
pub fn parse_script(source: &str) -> Result<Script, FormulaError> {
    let mut parser = Parser::new(source);
    let mut statements = Vec::new();

    loop {
        parser.stmt_start = parser.last_end;
        let next = match parser.peek() {
            Ok(next) => next,
            Err(fault) => return Err(parser.syntax_error(fault, statements.len() + 1)),
        };
        let Some(token) = next else { break };
        if token.kind == TokenKind::Semicolon {
            // Empty statement.
            let _ = parser.advance();
            continue;
        }
        if statements.len() >= MAX_STATEMENTS {
            return Err(FormulaError::TooManyStatements {
                limit: MAX_STATEMENTS,
            });
        }

        parser.stmt_start = token.start;
        let kind = match parser.statement() {
            Ok(kind) => kind,
            Err(fault) => return Err(parser.syntax_error(fault, statements.len() + 1)),
        };
        let text = source[parser.stmt_start..parser.last_end].trim().to_owned();
        statements.push(Statement { kind, source: text });

        parser.stmt_start = parser.last_end;
        match parser.peek() {
            Ok(Some(t)) if t.kind == TokenKind::Semicolon => {
                let _ = parser.advance();
            }
            Ok(_) => {}
            Err(fault) => return Err(parser.syntax_error(fault, statements.len() + 1)),
        }
    }

    Ok(Script { statements })
}

/// Internal parse failure at a byte offset.
struct Fault {
    at: usize,
    message: String,
}

impl From<LexError> for Fault {
    fn from(e: LexError) -> Self {
        Self {
            at: e.pos,
            message: e.message,
        }
    }
}

struct Parser<'a> {
    source: &'a str,
    lexer: Lexer<'a>,
    lookahead: VecDeque<Token>,
    depth: usize,
    stmt_start: usize,
    last_end: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            lexer: Lexer::new(source),
            lookahead: VecDeque::new(),
            depth: 0,
            stmt_start: 0,
            last_end: 0,
        }
    }

    // -- Token plumbing -----------------------------------------------------

    fn fill(&mut self, n: usize) -> Result<(), Fault> {
        while self.lookahead.len() < n {
            match self.lexer.next_token()? {
                Some(token) => self.lookahead.push_back(token),
                None => break,
            }
        }
        Ok(())
    }

    fn peek(&mut self) -> Result<Option<Token>, Fault> {
        self.fill(1)?;
        Ok(self.lookahead.front().cloned())
    }

    fn peek_kind(&mut self) -> Result<Option<TokenKind>, Fault> {
        Ok(self.peek()?.map(|t| t.kind))
    }

    fn peek_second_kind(&mut self) -> Result<Option<TokenKind>, Fault> {
        self.fill(2)?;
        Ok(self.lookahead.get(1).map(|t| t.kind.clone()))
    }

    fn advance(&mut self) -> Result<Option<Token>, Fault> {
        self.fill(1)?;
        let token = self.lookahead.pop_front();
        if let Some(ref t) = token {
            self.last_end = t.end;
        }
        Ok(token)
    }

    fn eat(&mut self, kind: &TokenKind) -> Result<bool, Fault> {
        if self.peek_kind()?.as_ref() == Some(kind) {
            self.advance()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), Fault> {
        if self.eat(&kind)? {
            return Ok(());
        }
        Err(self.unexpected(&format!("expected {kind}")))
    }

    /// Builds a fault describing the next token (or end of input).
    fn unexpected(&mut self, context: &str) -> Fault {
        match self.peek() {
            Ok(Some(t)) => Fault {
                at: t.start,
                message: format!("{context}, found {}", t.kind),
            },
            Ok(None) => Fault {
                at: self.source.len(),
                message: format!("{context}, found end of script"),
            },
            Err(fault) => fault,
        }
    }

    fn enter(&mut self) -> Result<(), Fault> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            let at = self.last_end;
            return Err(Fault {
                at,
                message: format!("expression nested deeper than {MAX_DEPTH} levels"),
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn syntax_error(&self, fault: Fault, index: usize) -> FormulaError {
        FormulaError::Syntax {
            index,
            statement: excerpt(self.source, self.stmt_start.min(fault.at), fault.at),
            message: fault.message,
        }
    }

    // -- Grammar ------------------------------------------------------------

    fn statement(&mut self) -> Result<StmtKind, Fault> {
        if self.eat(&TokenKind::Declare)? {
            let name = match self.advance()? {
                Some(Token {
                    kind: TokenKind::Ident(name),
                    ..
                }) => name,
                Some(t) => {
                    return Err(Fault {
                        at: t.start,
                        message: format!("expected a variable name, found {}", t.kind),
                    });
                }
                None => {
                    return Err(Fault {
                        at: self.source.len(),
                        message: "expected a variable name, found end of script".into(),
                    });
                }
            };
            self.expect(TokenKind::Assign)?;
            let value = self.expr()?;
            return Ok(StmtKind::Assign { name, value });
        }

        if let Some(TokenKind::Ident(name)) = self.peek_kind()? {
            if self.peek_second_kind()? == Some(TokenKind::Assign) {
                self.advance()?;
                self.advance()?;
                let value = self.expr()?;
                return Ok(StmtKind::Assign { name, value });
            }
        }

        Ok(StmtKind::Expr(self.expr()?))
    }

    fn expr(&mut self) -> Result<Expr, Fault> {
        let entered = self.depth;
        self.enter()?;
        let mut left = self.additive()?;
        while self.eat(&TokenKind::OrOr)? {
            self.enter()?;
            let right = self.additive()?;
            left = Expr::Binary(BinOp::Or, Box::new(left), Box::new(right));
        }
        self.depth = entered;
        Ok(left)
    }

    fn additive(&mut self) -> Result<Expr, Fault> {
        let entered = self.depth;
        let mut left = self.term()?;
        loop {
            let op = match self.peek_kind()? {
                Some(TokenKind::Plus) => BinOp::Add,
                Some(TokenKind::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance()?;
            self.enter()?;
            let right = self.term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth = entered;
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr, Fault> {
        let entered = self.depth;
        let mut left = self.power()?;
        loop {
            let op = match self.peek_kind()? {
                Some(TokenKind::Star) => BinOp::Mul,
                Some(TokenKind::Slash) => BinOp::Div,
                _ => break,
            };
            self.advance()?;
            self.enter()?;
            let right = self.power()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth = entered;
        Ok(left)
    }

    fn power(&mut self) -> Result<Expr, Fault> {
        self.enter()?;
        let base = self.unary()?;
        let result = if self.eat(&TokenKind::StarStar)? {
            let exponent = self.power()?;
            Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exponent))
        } else {
            base
        };
        self.leave();
        Ok(result)
    }

    fn unary(&mut self) -> Result<Expr, Fault> {
        match self.peek_kind()? {
            Some(TokenKind::Minus) => {
                self.advance()?;
                self.enter()?;
                let operand = self.unary()?;
                self.leave();
                Ok(Expr::Neg(Box::new(operand)))
            }
            Some(TokenKind::Plus) => {
                self.advance()?;
                self.enter()?;
                let operand = self.unary()?;
                self.leave();
                Ok(Expr::Pos(Box::new(operand)))
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Expr, Fault> {
        let Some(token) = self.peek()? else {
            return Err(self.unexpected("expected an expression"));
        };

        match token.kind {
            TokenKind::Number(n) => {
                self.advance()?;
                Ok(Expr::Number(n))
            }
            TokenKind::Str(s) => {
                self.advance()?;
                Ok(Expr::Str(s))
            }
            TokenKind::Ident(name) => {
                self.advance()?;
                if self.eat(&TokenKind::LParen)? {
                    let args = self.arguments()?;
                    return Ok(Expr::Call(name, args));
                }
                Ok(Expr::Var(name))
            }
            TokenKind::LParen => {
                self.advance()?;
                let inner = self.expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            _ => Err(self.unexpected("expected an expression")),
        }
    }

    /// Parses call arguments after the opening parenthesis.
    fn arguments(&mut self) -> Result<Vec<Expr>, Fault> {
        let mut args = Vec::new();
        if self.eat(&TokenKind::RParen)? {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if self.eat(&TokenKind::Comma)? {
                continue;
            }
            self.expect(TokenKind::RParen)?;
            return Ok(args);
        }
    }
}

/// The statement text from `start` up to the end of the line or `;`
/// following `at`, trimmed and shortened for display.
fn excerpt(source: &str, start: usize, at: usize) -> String {
    let tail = &source[at..];
    let stop = tail
        .find(|c| c == ';' || c == '\n')
        .map_or(source.len(), |n| at + n);
    let text = source[start..stop].trim();
    if text.chars().count() > EXCERPT_LEN {
        let cut: String = text.chars().take(EXCERPT_LEN).collect();
        format!("{cut}...")
    } else {
        text.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn num(n: f64) -> Box<Expr> {
        Box::new(Expr::Number(n))
    }

    fn single(source: &str) -> StmtKind {
        let script = parse_script(source).unwrap();
        assert_eq!(script.len(), 1, "expected one statement in {source:?}");
        script.statements.into_iter().next().unwrap().kind
    }

    #[test]
    fn empty_and_comment_only_scripts() {
        assert!(parse_script("").unwrap().is_empty());
        assert!(parse_script("  // nothing here\n ;; ").unwrap().is_empty());
    }

    #[test]
    fn precedence() {
        assert_eq!(
            single("1 + 2 * 3"),
            StmtKind::Expr(Expr::Binary(
                BinOp::Add,
                num(1.0),
                Box::new(Expr::Binary(BinOp::Mul, num(2.0), num(3.0)))
            ))
        );
    }

    #[test]
    fn power_is_right_associative() {
        assert_eq!(
            single("2 ** 3 ** 2"),
            StmtKind::Expr(Expr::Binary(
                BinOp::Pow,
                num(2.0),
                Box::new(Expr::Binary(BinOp::Pow, num(3.0), num(2.0)))
            ))
        );
    }

    #[test]
    fn or_binds_loosest() {
        assert_eq!(
            single("a + 1 || 5"),
            StmtKind::Expr(Expr::Binary(
                BinOp::Or,
                Box::new(Expr::Binary(
                    BinOp::Add,
                    Box::new(Expr::Var("a".into())),
                    num(1.0)
                )),
                num(5.0)
            ))
        );
    }

    #[test]
    fn assignment_forms() {
        let expected = StmtKind::Assign {
            name: "x".into(),
            value: Expr::Number(1.0),
        };
        assert_eq!(single("x = 1"), expected);
        assert_eq!(single("const x = 1;"), expected);
        assert_eq!(single("let x = 1"), expected);
        assert_eq!(single("var x = 1"), expected);
    }

    #[test]
    fn calls_with_arguments() {
        assert_eq!(
            single(r#"setValue("Main:A3", -x)"#),
            StmtKind::Expr(Expr::Call(
                "setValue".into(),
                vec![
                    Expr::Str("Main:A3".into()),
                    Expr::Neg(Box::new(Expr::Var("x".into())))
                ]
            ))
        );
        assert_eq!(single("f()"), StmtKind::Expr(Expr::Call("f".into(), vec![])));
    }

    #[test]
    fn statements_without_semicolons() {
        let script = parse_script("a = 1\nb = a + 1\nsetValue(\"S:C\", b)").unwrap();
        assert_eq!(script.len(), 3);
        assert_eq!(script.statements[1].source, "b = a + 1");
        assert_eq!(script.statements[2].source, "setValue(\"S:C\", b)");
    }

    #[test]
    fn syntax_error_names_statement() {
        let err = parse_script("a = 1;\nb = (a + ;\nc = 2").unwrap_err();
        match err {
            FormulaError::Syntax {
                index,
                statement,
                message,
            } => {
                assert_eq!(index, 2);
                assert_eq!(statement, "b = (a +");
                assert!(message.contains("expected an expression"), "{message}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn lex_error_reported_in_current_statement() {
        let err = parse_script("x = 1;\ny = 2 # 3").unwrap_err();
        assert_eq!(err.statement_index(), Some(2));
        assert!(err.to_string().contains("unexpected character '#'"));
    }

    #[test]
    fn unclosed_call() {
        let err = parse_script(r#"setValue("Main:A1", 1"#).unwrap_err();
        assert_eq!(err.statement_index(), Some(1));
        assert!(err.to_string().contains("expected ')'"));
    }

    #[test]
    fn declaration_needs_name() {
        let err = parse_script("let = 4").unwrap_err();
        assert!(err.to_string().contains("expected a variable name"));
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let source = format!("{}1{}", "(".repeat(500), ")".repeat(500));
        let err = parse_script(&source).unwrap_err();
        assert!(err.to_string().contains("nested deeper"));

        let minus = format!("x = {}1", "-".repeat(500));
        assert!(parse_script(&minus).is_err());
    }

    #[test]
    fn long_operator_chains_are_bounded() {
        let long = format!("x = {}", vec!["1"; 2_500].join(" + "));
        let err = parse_script(&long).unwrap_err();
        assert_eq!(err.statement_index(), Some(1));
        assert!(err.to_string().contains("nested deeper"), "{err}");

        let product = format!("x = {}", vec!["2"; 2_500].join(" * "));
        assert!(parse_script(&product).is_err());
        let fallback = format!("x = {}", vec!["a"; 2_500].join(" || "));
        assert!(parse_script(&fallback).is_err());

        let moderate = format!("x = {}", vec!["1"; 200].join(" + "));
        assert_eq!(parse_script(&moderate).unwrap().len(), 1);
    }

    #[test]
    fn statement_limit() {
        let source = "x = 1;".repeat(MAX_STATEMENTS + 1);
        assert_eq!(
            parse_script(&source).unwrap_err(),
            FormulaError::TooManyStatements {
                limit: MAX_STATEMENTS
            }
        );
    }
}
