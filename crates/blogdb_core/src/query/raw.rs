//! Raw SQL escape hatch with explicit bindings.
//!
//! Raw statements bypass the composer entirely: no soft-delete filter is
//! injected, and the caller owns Live-only filtering in the SQL text.

use super::value::SqlValue;
use super::{CompositionError, Statement, StatementKind};
use once_cell::sync::Lazy;
use regex::Regex;

static QUOTED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"'(?:[^']|'')*'|"(?:[^"]|"")*""#).expect("valid quoted literal regex")
});
static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\?(\d*)").expect("valid placeholder regex"));

/// Number of parameters `sql` expects, ignoring quoted literals.
///
/// Bare `?` placeholders count one each; numbered `?N` placeholders count up
/// to their highest index.
pub(crate) fn placeholder_count(sql: &str) -> usize {
    let stripped = QUOTED_RE.replace_all(sql, "");
    let mut sequential = 0usize;
    let mut numbered = 0usize;
    for captures in PLACEHOLDER_RE.captures_iter(&stripped) {
        match captures.get(1).map(|m| m.as_str()).unwrap_or_default() {
            "" => sequential += 1,
            digits => numbered = numbered.max(digits.parse().unwrap_or(0)),
        }
    }
    sequential.max(numbered)
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawQuery {
    sql: String,
    params: Vec<SqlValue>,
}

impl RawQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, value: impl Into<SqlValue>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Fails when placeholder and binding counts disagree.
    pub fn into_statement(self) -> Result<Statement, CompositionError> {
        let placeholders = placeholder_count(&self.sql);
        if placeholders != self.params.len() {
            return Err(CompositionError::ParameterCountMismatch {
                placeholders,
                bindings: self.params.len(),
            });
        }
        Ok(Statement::new(self.sql, self.params, StatementKind::Raw))
    }
}
