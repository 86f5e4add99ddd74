use std::error::Error;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{ScriptError, parse_program};

static IMPORT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*use[ \t]+cad\b").expect("Invalid import regex"));
static RESULT_BINDING_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*model[ \t]*=([^=]|$)").expect("Invalid result binding regex")
});

/// Why a script failed the structural contract. Checks run in declaration
/// order and the first failure wins.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    Empty,
    MissingImport,
    MissingResultBinding,
    Syntax(ScriptError),
}

impl ValidationIssue {
    /// `(valid, reason)` view for callers that report rather than branch.
    pub fn verdict(script: &str) -> (bool, Option<String>) {
        match validate_script(script) {
            Ok(()) => (true, None),
            Err(issue) => (false, Some(issue.to_string())),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::Empty => f.write_str("empty"),
            ValidationIssue::MissingImport => f.write_str("missing import"),
            ValidationIssue::MissingResultBinding => f.write_str("missing result binding"),
            ValidationIssue::Syntax(err) => write!(f, "syntax error: {err}"),
        }
    }
}

impl Error for ValidationIssue {}

pub fn validate_script(script: &str) -> Result<(), ValidationIssue> {
    if script.trim().is_empty() {
        return Err(ValidationIssue::Empty);
    }
    if !IMPORT_LINE.is_match(script) {
        return Err(ValidationIssue::MissingImport);
    }
    if !RESULT_BINDING_LINE.is_match(script) {
        return Err(ValidationIssue::MissingResultBinding);
    }
    parse_program(script).map_err(ValidationIssue::Syntax)?;
    Ok(())
}
