//! Result projection into typed records.
//!
//! # Responsibility
//! - Map returned rows into caller-declared record types.
//! - Zero-fill 1:1 outer-join misses and fold 1:N fan-out into nested
//!   collections.
//!
//! # Invariants
//! - A record type decides its own null mode per related entity; strict
//!   views never coerce NULL.

mod row;

pub use row::{Row, RowView};

use std::collections::HashMap;
use thiserror::Error;

pub type ProjectionResult<T> = Result<T, ProjectionError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    #[error("result has no column `{0}`")]
    MissingColumn(String),
    #[error("column `{column}` holds {actual}, expected {expected}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("column `{0}` is NULL")]
    UnexpectedNull(String),
    #[error("expected at most {expected} row(s), got {actual}")]
    CardinalityViolation { expected: usize, actual: usize },
}

/// A type that can be built from one returned row.
pub trait FromRow: Sized {
    fn from_row(row: RowView<'_>) -> ProjectionResult<Self>;
}

pub fn project_rows<T: FromRow>(rows: &[Row]) -> ProjectionResult<Vec<T>> {
    rows.iter().map(|row| T::from_row(row.view())).collect()
}

/// Projects a 1:1 lookup; more than one row is a multiplicity violation.
pub fn project_at_most_one<T: FromRow>(rows: &[Row]) -> ProjectionResult<Option<T>> {
    match rows {
        [] => Ok(None),
        [row] => T::from_row(row.view()).map(Some),
        _ => Err(ProjectionError::CardinalityViolation {
            expected: 1,
            actual: rows.len(),
        }),
    }
}

/// Folds fanned-out 1:N rows into parents with nested children.
///
/// Parents keep first-seen order. A row whose `{child_prefix}{child_key}` is
/// NULL is an outer-join miss and contributes no child.
pub fn group_by_parent<P, C>(
    rows: &[Row],
    parent_key: &str,
    child_prefix: &str,
    child_key: &str,
) -> ProjectionResult<Vec<(P, Vec<C>)>>
where
    P: FromRow,
    C: FromRow,
{
    let mut groups: Vec<(P, Vec<C>)> = Vec::new();
    let mut index: HashMap<i64, usize> = HashMap::new();
    for row in rows {
        let key = row.view().i64(parent_key)?;
        let slot = match index.get(&key) {
            Some(slot) => *slot,
            None => {
                groups.push((P::from_row(row.view())?, Vec::new()));
                index.insert(key, groups.len() - 1);
                groups.len() - 1
            }
        };
        let child = row.scoped(child_prefix);
        if child.opt_i64(child_key)?.is_some() {
            groups[slot].1.push(C::from_row(child)?);
        }
    }
    Ok(groups)
}
