//! The geometry script language: lexer, parser, a sandboxed tree-walking
//! interpreter and the static validator used before execution.

use std::error::Error;
use std::fmt;

pub mod ast;
mod interpreter;
mod lexer;
mod parser;
mod validate;

pub use interpreter::{Evaluation, ResultLookup, SandboxLimits, Value, evaluate, run_script};
pub use validate::{ValidationIssue, validate_script};

/// Module name that unlocks the geometry engine.
pub const ENGINE_MODULE: &str = "cad";
/// Module name of the always-available math namespace.
pub const MATH_MODULE: &str = "math";
/// Variable that holds the exported model.
pub const RESULT_VARIABLE: &str = "model";

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptError {
    message: String,
    line: Option<usize>,
    column: Option<usize>,
}

impl ScriptError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            column: None,
        }
    }

    pub(crate) fn at(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line: Some(line),
            column: Some(column),
        }
    }

    /// Attaches a position unless the error already carries one.
    pub(crate) fn or_at(mut self, line: usize, column: usize) -> Self {
        if self.line.is_none() {
            self.line = Some(line);
            self.column = Some(column);
        }
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn line(&self) -> Option<usize> {
        self.line
    }

    pub fn column(&self) -> Option<usize> {
        self.column
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => {
                write!(f, "{} at line {}, column {}", self.message, line, column)
            }
            _ => f.write_str(&self.message),
        }
    }
}

impl Error for ScriptError {}

pub fn parse_program(source: &str) -> Result<ast::Program, ScriptError> {
    let tokens = lexer::Lexer::new(source).tokenize()?;
    parser::Parser::new(tokens).parse_program()
}
