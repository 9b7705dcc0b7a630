//! Store collaborator boundary and the embedded SQLite implementation.
//!
//! # Responsibility
//! - Define the [`Store`] contract the composer, projector and transaction
//!   coordinator run against.
//! - Open, configure and migrate SQLite connections.
//!
//! # Invariants
//! - Parameters cross the boundary as [`SqlValue`](crate::query::SqlValue)
//!   bindings only.
//! - Every call checks its [`CallContext`] before touching the engine.
//! - Migration version is tracked via `PRAGMA user_version`.

mod context;
pub mod migrations;
mod open;
mod sqlite;

pub use context::{CallContext, CancelToken};
pub use open::{open_store, open_store_in_memory, open_store_with};
pub use sqlite::SqliteStore;

use crate::project::Row;
use crate::query::Statement;
use std::fmt::{Display, Formatter};
use thiserror::Error;
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

/// Which integrity rule rejected a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    ForeignKey,
    Unique,
    NotNull,
    Check,
    Other,
}

impl Display for ConstraintKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            Self::ForeignKey => "foreign_key",
            Self::Unique => "unique",
            Self::NotNull => "not_null",
            Self::Check => "check",
            Self::Other => "other",
        };
        f.write_str(value)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// Store unreachable or not a database.
    #[error("store connection failed: {0}")]
    Connection(String),
    #[error("{kind} constraint violated: {message}")]
    Constraint {
        kind: ConstraintKind,
        message: String,
    },
    #[error("store busy: {0}")]
    Busy(String),
    #[error("call cancelled")]
    Cancelled,
    #[error("call deadline exceeded")]
    DeadlineExceeded,
    /// Another unit owns the connection.
    #[error("another transaction unit is active on this store")]
    TransactionInProgress,
    #[error("transaction handle is not active on this store")]
    UnknownTransaction,
    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    #[error("store requires schema version {expected_version}, got {actual_version}")]
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    #[error("store requires table `{0}`")]
    MissingTable(&'static str),
    #[error("store requires column `{column}` in table `{table}`")]
    MissingColumn {
        table: &'static str,
        column: &'static str,
    },
    #[error("column `{column}` holds unsupported {kind} value")]
    UnsupportedValue { column: String, kind: String },
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// Identity of one active transaction unit on one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHandle(Uuid);

impl TxHandle {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn id(&self) -> Uuid {
        self.0
    }
}

impl Display for TxHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of one write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOutcome {
    pub rows_affected: usize,
    /// Row id generated by an insert.
    pub generated_key: Option<i64>,
}

/// Relational engine collaborator.
///
/// Calls block until the engine answers. A store admits statements of at
/// most one active unit at a time; `ctx.transaction()` names the unit a
/// statement belongs to.
pub trait Store {
    fn execute_query(&self, statement: &Statement, ctx: &CallContext) -> StoreResult<Vec<Row>>;
    fn execute_write(&self, statement: &Statement, ctx: &CallContext)
        -> StoreResult<WriteOutcome>;
    fn begin(&self, ctx: &CallContext) -> StoreResult<TxHandle>;
    fn commit(&self, handle: TxHandle, ctx: &CallContext) -> StoreResult<()>;
    fn rollback(&self, handle: TxHandle) -> StoreResult<()>;
}

impl<S: Store + ?Sized> Store for &S {
    fn execute_query(&self, statement: &Statement, ctx: &CallContext) -> StoreResult<Vec<Row>> {
        (**self).execute_query(statement, ctx)
    }

    fn execute_write(
        &self,
        statement: &Statement,
        ctx: &CallContext,
    ) -> StoreResult<WriteOutcome> {
        (**self).execute_write(statement, ctx)
    }

    fn begin(&self, ctx: &CallContext) -> StoreResult<TxHandle> {
        (**self).begin(ctx)
    }

    fn commit(&self, handle: TxHandle, ctx: &CallContext) -> StoreResult<()> {
        (**self).commit(handle, ctx)
    }

    fn rollback(&self, handle: TxHandle) -> StoreResult<()> {
        (**self).rollback(handle)
    }
}
