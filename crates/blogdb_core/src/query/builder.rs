//! SQL text accumulator with positional parameter binding.

use super::value::SqlValue;

/// Builds one SQL statement and its parameter list side by side.
///
/// Values are only ever appended through [`SqlBuilder::push_param`], which
/// emits a numbered `?N` placeholder. Nothing else writes caller data into
/// the SQL text.
#[derive(Debug, Default)]
pub struct SqlBuilder {
    sql: String,
    params: Vec<SqlValue>,
}

impl SqlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_str<T: AsRef<str>>(&mut self, s: T) {
        self.sql.push_str(s.as_ref());
    }

    pub fn push(&mut self, c: char) {
        self.sql.push(c);
    }

    /// Pushes a double-quoted identifier. Identifiers come from static
    /// schema metadata or validated aliases only.
    pub fn push_identifier<T: AsRef<str>>(&mut self, s: T) {
        self.sql.push('"');
        self.sql.push_str(s.as_ref());
        self.sql.push('"');
    }

    /// Pushes `"alias"."column"`.
    pub fn push_column(&mut self, alias: &str, column: &str) {
        self.push_identifier(alias);
        self.push('.');
        self.push_identifier(column);
    }

    /// Binds `value` and pushes its placeholder.
    pub fn push_param(&mut self, value: SqlValue) {
        self.params.push(value);
        self.sql.push('?');
        self.sql.push_str(&self.params.len().to_string());
    }

    /// Pushes elements of an iterator separated by `sep`.
    pub fn push_iter<T, E>(
        &mut self,
        iter: impl IntoIterator<Item = T>,
        sep: &str,
        mut push_elem: impl FnMut(&mut Self, T) -> Result<(), E>,
    ) -> Result<(), E> {
        for (i, item) in iter.into_iter().enumerate() {
            if i > 0 {
                self.sql.push_str(sep);
            }
            push_elem(self, item)?;
        }
        Ok(())
    }

    /// Consumes the builder, returning SQL text and bound parameters.
    pub fn into_sql(self) -> (String, Vec<SqlValue>) {
        (self.sql, self.params)
    }
}
