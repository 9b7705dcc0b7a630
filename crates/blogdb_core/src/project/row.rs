//! Returned rows and typed, null-aware column access.

use super::{ProjectionError, ProjectionResult};
use crate::query::value::SqlValue;
use std::sync::Arc;

/// One returned row: ordered column names plus values.
///
/// Column names are shared by every row of one result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<SqlValue>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|column| column == name)
            .and_then(|index| self.values.get(index))
    }

    /// Strict view over unprefixed columns.
    pub fn view(&self) -> RowView<'_> {
        RowView {
            row: self,
            prefix: "",
            outer: false,
        }
    }

    /// Strict view over columns named `{prefix}{field}`.
    pub fn scoped<'r>(&'r self, prefix: &'r str) -> RowView<'r> {
        RowView {
            row: self,
            prefix,
            outer: false,
        }
    }

    /// Null-safe view for an entity reached through a 1:1 outer join.
    pub fn outer<'r>(&'r self, prefix: &'r str) -> RowView<'r> {
        RowView {
            row: self,
            prefix,
            outer: true,
        }
    }
}

/// Prefix-scoped accessor over one [`Row`].
///
/// In outer mode every NULL reads as the zero value of the requested type,
/// so an outer-join miss projects as an empty record.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'r> {
    row: &'r Row,
    prefix: &'r str,
    outer: bool,
}

impl<'r> RowView<'r> {
    pub fn row(&self) -> &'r Row {
        self.row
    }

    pub fn is_outer(&self) -> bool {
        self.outer
    }

    /// Same row, columns named `{prefix}{field}`, same null mode.
    pub fn scoped(&self, prefix: &'r str) -> RowView<'r> {
        RowView {
            row: self.row,
            prefix,
            outer: self.outer,
        }
    }

    pub fn into_outer(self) -> RowView<'r> {
        RowView {
            outer: true,
            ..self
        }
    }

    fn column_name(&self, name: &str) -> String {
        format!("{}{name}", self.prefix)
    }

    fn lookup(&self, name: &str) -> ProjectionResult<&'r SqlValue> {
        let column = self.column_name(name);
        self.row
            .get(&column)
            .ok_or(ProjectionError::MissingColumn(column))
    }

    fn mismatch(&self, name: &str, expected: &'static str, actual: &SqlValue) -> ProjectionError {
        ProjectionError::TypeMismatch {
            column: self.column_name(name),
            expected,
            actual: actual.kind_name(),
        }
    }

    pub fn is_null(&self, name: &str) -> ProjectionResult<bool> {
        Ok(self.lookup(name)?.is_null())
    }

    pub fn opt_i64(&self, name: &str) -> ProjectionResult<Option<i64>> {
        match self.lookup(name)? {
            SqlValue::Null => Ok(None),
            SqlValue::Integer(value) => Ok(Some(*value)),
            other => Err(self.mismatch(name, "integer", other)),
        }
    }

    pub fn i64(&self, name: &str) -> ProjectionResult<i64> {
        match self.opt_i64(name)? {
            Some(value) => Ok(value),
            None if self.outer => Ok(0),
            None => Err(ProjectionError::UnexpectedNull(self.column_name(name))),
        }
    }

    pub fn i64_or_zero(&self, name: &str) -> ProjectionResult<i64> {
        Ok(self.opt_i64(name)?.unwrap_or_default())
    }

    /// Reads a real; integer storage is widened, never truncated.
    pub fn opt_f64(&self, name: &str) -> ProjectionResult<Option<f64>> {
        match self.lookup(name)? {
            SqlValue::Null => Ok(None),
            SqlValue::Real(value) => Ok(Some(*value)),
            SqlValue::Integer(value) => Ok(Some(*value as f64)),
            other => Err(self.mismatch(name, "real", other)),
        }
    }

    pub fn f64(&self, name: &str) -> ProjectionResult<f64> {
        match self.opt_f64(name)? {
            Some(value) => Ok(value),
            None if self.outer => Ok(0.0),
            None => Err(ProjectionError::UnexpectedNull(self.column_name(name))),
        }
    }

    pub fn f64_or_zero(&self, name: &str) -> ProjectionResult<f64> {
        Ok(self.opt_f64(name)?.unwrap_or_default())
    }

    pub fn opt_text(&self, name: &str) -> ProjectionResult<Option<String>> {
        match self.lookup(name)? {
            SqlValue::Null => Ok(None),
            SqlValue::Text(value) => Ok(Some(value.clone())),
            other => Err(self.mismatch(name, "text", other)),
        }
    }

    pub fn text(&self, name: &str) -> ProjectionResult<String> {
        match self.opt_text(name)? {
            Some(value) => Ok(value),
            None if self.outer => Ok(String::new()),
            None => Err(ProjectionError::UnexpectedNull(self.column_name(name))),
        }
    }

    pub fn text_or_empty(&self, name: &str) -> ProjectionResult<String> {
        Ok(self.opt_text(name)?.unwrap_or_default())
    }
}
