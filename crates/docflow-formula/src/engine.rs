//! Script evaluation against a form grid.

use std::collections::HashMap;

use docflow_core::form_data::{CellRef, FormData};
use serde_json::Value as Json;

use crate::parser::parse_script;
use crate::types::{BinOp, Expr, FormulaError, Script, StmtKind, Value};

/// Runs `script` over a copy of `form_data` and returns the updated grid.
///
/// An empty script returns the input unchanged. On any failure the input
/// is untouched and the error names the failing statement.
pub fn execute(form_data: &FormData, script: &str) -> Result<FormData, FormulaError> {
    if script.trim().is_empty() {
        return Ok(form_data.clone());
    }
    parse_script(script)?.evaluate(form_data)
}

impl Script {
    /// Evaluates every statement in order against a private copy of the
    /// grid. Writes are visible to later reads within the same run.
    pub fn evaluate(&self, form_data: &FormData) -> Result<FormData, FormulaError> {
        let mut scope = Scope {
            grid: form_data.clone(),
            vars: HashMap::new(),
        };
        for (i, statement) in self.statements.iter().enumerate() {
            scope
                .run(&statement.kind)
                .map_err(|message| FormulaError::Evaluation {
                    index: i + 1,
                    statement: statement.source.clone(),
                    message,
                })?;
        }
        Ok(scope.grid)
    }
}

struct Scope {
    grid: FormData,
    vars: HashMap<String, Value>,
}

impl Scope {
    fn run(&mut self, stmt: &StmtKind) -> Result<(), String> {
        match stmt {
            StmtKind::Assign { name, value } => {
                let v = self.eval(value)?;
                self.vars.insert(name.clone(), v);
            }
            StmtKind::Expr(expr) => {
                self.eval(expr)?;
            }
        }
        Ok(())
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, String> {
        Ok(match expr {
            Expr::Number(n) => Value::Number(*n),
            Expr::Str(s) => Value::Text(s.clone()),
            // Unknown names read as zero.
            Expr::Var(name) => self.vars.get(name).cloned().unwrap_or(Value::Number(0.0)),
            Expr::Neg(inner) => Value::Number(normalize(-self.eval(inner)?.as_number())),
            Expr::Pos(inner) => Value::Number(normalize(self.eval(inner)?.as_number())),
            Expr::Binary(BinOp::Or, left, right) => {
                let l = self.eval(left)?;
                if l.is_truthy() { l } else { self.eval(right)? }
            }
            Expr::Binary(op, left, right) => {
                let a = self.eval(left)?.as_number();
                let b = self.eval(right)?.as_number();
                Value::Number(arithmetic(*op, a, b))
            }
            Expr::Call(name, args) => self.call(name, args)?,
        })
    }

    fn call(&mut self, name: &str, args: &[Expr]) -> Result<Value, String> {
        match name {
            "getValue" => {
                arity(name, args, 1)?;
                let reference = self.eval(&args[0])?.as_text();
                let value = reference
                    .parse::<CellRef>()
                    .ok()
                    .and_then(|at| self.grid.get(&at).map(cell_number))
                    .unwrap_or(0.0);
                Ok(Value::Number(value))
            }
            "setValue" => {
                arity(name, args, 2)?;
                let reference = self.eval(&args[0])?.as_text();
                let at = reference.parse::<CellRef>().map_err(|e| e.to_string())?;
                let value = self.eval(&args[1])?;
                self.grid.set(&at, to_json(&value));
                Ok(value)
            }
            "parseFloat" => {
                arity(name, args, 1)?;
                let value = self.eval(&args[0])?;
                Ok(Value::Number(normalize(value.as_number())))
            }
            // Unknown functions read as zero, like unknown variables.
            _ => Ok(Value::Number(0.0)),
        }
    }
}

fn arity(name: &str, args: &[Expr], expected: usize) -> Result<(), String> {
    if args.len() == expected {
        return Ok(());
    }
    let noun = if expected == 1 { "argument" } else { "arguments" };
    Err(format!(
        "{name} expects {expected} {noun}, got {}",
        args.len()
    ))
}

/// Applies a numeric operator. Division by zero and any non-finite result
/// yield 0 so every cell written stays a plain number.
fn arithmetic(op: BinOp, a: f64, b: f64) -> f64 {
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div if b == 0.0 => 0.0,
        BinOp::Div => a / b,
        BinOp::Pow => a.powf(b),
        BinOp::Or if a != 0.0 && !a.is_nan() => a,
        BinOp::Or => b,
    };
    normalize(result)
}

fn normalize(n: f64) -> f64 {
    if !n.is_finite() || n == 0.0 { 0.0 } else { n }
}

/// Numeric reading of a stored cell: numbers as-is, numeric strings
/// parsed, booleans as 1/0, everything else 0.
fn cell_number(value: &Json) -> f64 {
    let n = match value {
        Json::Number(n) => n.as_f64().unwrap_or(0.0),
        Json::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Json::Bool(b) => f64::from(u8::from(*b)),
        Json::Null | Json::Array(_) | Json::Object(_) => 0.0,
    };
    normalize(n)
}

/// Converts a script value into the JSON stored in the grid. Integral
/// numbers are stored as integers.
fn to_json(value: &Value) -> Json {
    match value {
        Value::Number(n) => {
            let n = normalize(*n);
            if n.fract() == 0.0 && n.abs() < 9.0e15 {
                Json::from(n as i64)
            } else {
                serde_json::Number::from_f64(n).map_or(Json::from(0), Json::Number)
            }
        }
        Value::Text(s) => Json::String(s.clone()),
    }
}
