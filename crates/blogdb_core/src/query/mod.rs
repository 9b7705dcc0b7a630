//! Query composition layer.
//!
//! # Responsibility
//! - Build parameter-bound predicate and clause trees from typed inputs.
//! - Compose reads and writes into executable [`Statement`] values.
//!
//! # Invariants
//! - Caller data reaches SQL text only as `?N` placeholders.
//! - The Live-only filter is injected for every soft-deletable entity a
//!   read touches unless visibility says otherwise.

pub mod builder;
pub mod clause;
pub mod compose;
pub mod expr;
pub mod raw;
pub mod value;
pub mod write;

use crate::model::entity::{Entity, FieldType};
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub use clause::{
    Direction, JoinKind, JoinSpec, JoinTarget, OrderKey, Pagination, RankFunction, SelectItem,
    Visibility, WindowRank,
};
pub use compose::Query;
pub use expr::{Aggregate, CmpOp, Expr, InSet, Operand, Predicate, Scalar};
pub use raw::RawQuery;
pub use value::SqlValue;
pub use write::{Insert, SoftDelete, Update, Write};

/// Caller-side misuse of the composer. Never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompositionError {
    #[error("relationship `{name}` is not declared on {entity}")]
    UndeclaredRelationship { entity: Entity, name: String },
    #[error("{0} is not in scope")]
    EntityNotInScope(Entity),
    #[error("column {column} is not available in the joined set")]
    ColumnNotInScope { column: String },
    #[error("unknown field `{field}` on {entity}")]
    UnknownField { entity: Entity, field: String },
    #[error("{0} is joined more than once")]
    DuplicateEntity(Entity),
    #[error("duplicate output alias `{0}`")]
    DuplicateAlias(String),
    #[error("invalid output alias `{0}`")]
    InvalidAlias(String),
    #[error("subquery must project exactly one column, got {actual}")]
    SubqueryArity { actual: usize },
    #[error("type mismatch in {context}: expected {expected}, got {actual}")]
    TypeMismatch {
        context: String,
        expected: FieldType,
        actual: String,
    },
    #[error("comparison of {column} against NULL; use is_null/is_not_null")]
    NullComparison { column: String },
    #[error("aggregate expressions are not allowed in WHERE")]
    AggregateInWhere,
    #[error("HAVING requires GROUP BY")]
    HavingWithoutGrouping,
    #[error("projected column `{0}` is neither grouped nor aggregated")]
    UngroupedColumn(String),
    #[error("ordering key {0} must be projected by a ranked query")]
    UnprojectedOrderKey(String),
    #[error("{0} does not support soft delete")]
    NotSoftDeletable(Entity),
    #[error("field `{field}` of {entity} is required")]
    MissingField { entity: Entity, field: String },
    #[error("field `{field}` of {entity} is written more than once")]
    DuplicateField { entity: Entity, field: String },
    #[error("the soft-delete marker of {0} is written only by soft delete")]
    MarkerWrite(Entity),
    #[error("update of {0} sets no fields")]
    EmptyUpdate(Entity),
    #[error("raw query has {placeholders} placeholders but {bindings} bindings")]
    ParameterCountMismatch { placeholders: usize, bindings: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Query,
    Insert,
    Update,
    SoftDelete,
    Raw,
}

impl Display for StatementKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            Self::Query => "query",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::SoftDelete => "soft_delete",
            Self::Raw => "raw",
        };
        f.write_str(value)
    }
}

/// Parameterized statement ready for a store.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
    pub kind: StatementKind,
}

impl Statement {
    pub fn new(sql: String, params: Vec<SqlValue>, kind: StatementKind) -> Self {
        Self { sql, params, kind }
    }
}

/// Declared shape of one output column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputColumn {
    pub name: String,
    pub ty: FieldType,
    pub nullable: bool,
}

/// Composed read plus its output shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedQuery {
    pub statement: Statement,
    pub columns: Vec<OutputColumn>,
}

impl ComposedQuery {
    pub fn column(&self, name: &str) -> Option<&OutputColumn> {
        self.columns.iter().find(|column| column.name == name)
    }
}
