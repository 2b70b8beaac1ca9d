use std::borrow::Cow;

use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Context, Helper, Result};
use strum::IntoEnumIterator;

use crate::ast::token_kind::CommandName;

/// Line-editor helper for the REPL: completes and hints command names.
pub struct CliHelper {
    keywords: Vec<String>,
}

impl CliHelper {
    pub fn new() -> Self {
        Self { keywords: CommandName::iter().map(|name| name.to_string()).collect() }
    }
}

impl Default for CliHelper {
    fn default() -> Self {
        Self::new()
    }
}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> Result<(usize, Vec<Pair>)> {
        let start = line[..pos]
            .rfind(|c: char| c.is_whitespace() || c == '(' || c == ',')
            .map_or(0, |i| i + 1);
        let prefix = &line[start..pos];
        let candidates = self
            .keywords
            .iter()
            .filter(|keyword| !prefix.is_empty() && keyword.starts_with(prefix))
            .map(|keyword| Pair { display: keyword.clone(), replacement: keyword.clone() })
            .collect();
        Ok((start, candidates))
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<Self::Hint> {
        if pos < line.len() || line.is_empty() {
            return None;
        }
        self.keywords
            .iter()
            .find(|keyword| keyword.starts_with(line) && keyword.len() > line.len())
            .map(|keyword| keyword[line.len()..].to_string())
    }
}

impl Highlighter for CliHelper {
    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned("\x1b[1m".to_owned() + hint + "\x1b[m")
    }
}

impl Validator for CliHelper {
    fn validate(&self, _ctx: &mut ValidationContext) -> Result<ValidationResult> {
        Ok(ValidationResult::Valid(None))
    }
}

impl Helper for CliHelper {}
