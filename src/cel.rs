//! CEL (Common Expression Language) parsing and evaluation
//!
//! Matcher rules express their conditions in CEL. This module:
//! - Validates CEL strings (using cel-parser)
//! - Evaluates CEL expressions against evidence bindings (using cel-interpreter)
//! - Lists the variables an expression references, for rule specificity

use crate::error::{Error, Result};
use std::collections::HashMap;

pub use cel_parser::Expression as CelExpr;
use cel_parser::Parser;

use cel_interpreter::{Context, Program, Value};

/// Re-export cel-interpreter Value for use in evaluation
pub use cel_interpreter::Value as CelValue;

/// CEL helper: parse, validate, evaluate
pub struct CelCompiler;

impl CelCompiler {
    /// Parse CEL expression string to AST
    pub fn parse(expr: &str) -> Result<CelExpr> {
        Parser::new()
            .parse(expr)
            .map_err(|e| Error::CelParse(format!("{}: {}", expr, e)))
    }

    /// Check if a string is a valid CEL expression
    pub fn is_valid(expr: &str) -> bool {
        Parser::new().parse(expr).is_ok()
    }

    /// Evaluate a CEL expression with the given variable bindings
    pub fn eval(expr: &str, vars: &HashMap<String, CelValue>) -> Result<CelValue> {
        let program =
            Program::compile(expr).map_err(|e| Error::CelParse(format!("{}: {}", expr, e)))?;

        let mut context = Context::default();
        for (name, value) in vars {
            context.add_variable_from_value(name.clone(), value.clone());
        }

        program
            .execute(&context)
            .map_err(|e| Error::CelEval(format!("{}: {:?}", expr, e)))
    }

    /// Evaluate a CEL expression and return result as bool
    pub fn eval_bool(expr: &str, vars: &HashMap<String, CelValue>) -> Result<bool> {
        match Self::eval(expr, vars)? {
            Value::Bool(b) => Ok(b),
            other => Err(Error::CelEval(format!(
                "Expected bool result, got {:?}",
                other
            ))),
        }
    }

    /// Extract all variables referenced in a CEL expression, sorted
    pub fn extract_variables(expr: &str) -> Result<Vec<String>> {
        let ast = Self::parse(expr)?;
        let mut vars: Vec<String> = ast
            .references()
            .variables()
            .into_iter()
            .map(str::to_string)
            .collect();
        vars.sort();
        vars.dedup();
        Ok(vars)
    }
}
