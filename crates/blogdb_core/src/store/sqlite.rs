//! Embedded SQLite store.
//!
//! # Responsibility
//! - Execute composed statements with positional bindings.
//! - Own the single active transaction unit of one connection.
//! - Translate engine failures into [`StoreError`].
//!
//! # Invariants
//! - While a unit is active, statements from any other context are rejected
//!   so writes of different units never interleave on one handle.
//! - A bounded [`CallContext`] installs a progress handler for the duration
//!   of one engine call and removes it afterwards.

use super::migrations::latest_version;
use super::{CallContext, ConstraintKind, Store, StoreError, StoreResult, TxHandle, WriteOutcome};
use crate::model::entity::Entity;
use crate::project::Row;
use crate::query::{SqlValue, Statement, StatementKind};
use log::{debug, warn};
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{ffi, params_from_iter, Connection, ErrorCode, ToSql};
use std::cell::Cell;
use std::sync::Arc;
use std::time::Instant;

/// Engine operations between interrupt checks.
const PROGRESS_OPS: i32 = 1_000;

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Integer(value) => ToSqlOutput::Owned(Value::Integer(*value)),
            SqlValue::Real(value) => ToSqlOutput::Owned(Value::Real(*value)),
            SqlValue::Text(value) => ToSqlOutput::Borrowed(ValueRef::Text(value.as_bytes())),
        })
    }
}

/// One SQLite connection behind the [`Store`] contract.
pub struct SqliteStore {
    conn: Connection,
    active: Cell<Option<TxHandle>>,
}

impl SqliteStore {
    /// Wraps an already-migrated connection after a readiness check.
    pub fn try_new(conn: Connection) -> StoreResult<Self> {
        ensure_connection_ready(&conn)?;
        Ok(Self {
            conn,
            active: Cell::new(None),
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn active_transaction(&self) -> Option<TxHandle> {
        self.active.get()
    }

    fn admit(&self, ctx: &CallContext) -> StoreResult<()> {
        ctx.check()?;
        match (self.active.get(), ctx.transaction()) {
            (Some(active), Some(owner)) if active == owner => Ok(()),
            (Some(_), _) => Err(StoreError::TransactionInProgress),
            (None, Some(_)) => Err(StoreError::UnknownTransaction),
            (None, None) => Ok(()),
        }
    }

    fn expect_active(&self, handle: TxHandle) -> StoreResult<()> {
        match self.active.get() {
            Some(active) if active == handle => Ok(()),
            Some(_) => Err(StoreError::TransactionInProgress),
            None => Err(StoreError::UnknownTransaction),
        }
    }

    /// Runs one engine call under the context's interrupt hook.
    fn guarded<T>(
        &self,
        ctx: &CallContext,
        call: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> StoreResult<T> {
        let bounded = ctx.is_bounded();
        if bounded {
            let watched = ctx.clone();
            self.conn
                .progress_handler(PROGRESS_OPS, Some(move || watched.is_done()));
        }
        let result = call(&self.conn);
        if bounded {
            self.conn.progress_handler(0, None::<fn() -> bool>);
        }
        result.map_err(|err| translate_error(err, ctx))
    }
}

impl Store for SqliteStore {
    fn execute_query(&self, statement: &Statement, ctx: &CallContext) -> StoreResult<Vec<Row>> {
        let started_at = Instant::now();
        self.admit(ctx)?;
        let result = self.guarded(ctx, |conn| {
            let mut stmt = conn.prepare_cached(&statement.sql)?;
            let columns: Arc<[String]> = stmt
                .column_names()
                .into_iter()
                .map(String::from)
                .collect();
            let mut rows = stmt.query(params_from_iter(statement.params.iter()))?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut values = Vec::with_capacity(columns.len());
                for (index, name) in columns.iter().enumerate() {
                    values.push(read_value(row.get_ref(index)?, index, name)?);
                }
                out.push(Row::new(Arc::clone(&columns), values));
            }
            Ok(out)
        });
        match &result {
            Ok(rows) => debug!(
                "event=query module=store status=ok kind={} params={} rows={} duration_ms={}",
                statement.kind,
                statement.params.len(),
                rows.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=query module=store status=error kind={} params={} duration_ms={} error={}",
                statement.kind,
                statement.params.len(),
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    fn execute_write(
        &self,
        statement: &Statement,
        ctx: &CallContext,
    ) -> StoreResult<WriteOutcome> {
        let started_at = Instant::now();
        self.admit(ctx)?;
        let result = self.guarded(ctx, |conn| {
            let mut stmt = conn.prepare_cached(&statement.sql)?;
            let rows_affected = stmt.execute(params_from_iter(statement.params.iter()))?;
            let generated_key =
                (statement.kind == StatementKind::Insert).then(|| conn.last_insert_rowid());
            Ok(WriteOutcome {
                rows_affected,
                generated_key,
            })
        });
        match &result {
            Ok(outcome) => debug!(
                "event=write module=store status=ok kind={} params={} rows_affected={} in_tx={} duration_ms={}",
                statement.kind,
                statement.params.len(),
                outcome.rows_affected,
                ctx.transaction().is_some(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=write module=store status=error kind={} params={} in_tx={} duration_ms={} error={}",
                statement.kind,
                statement.params.len(),
                ctx.transaction().is_some(),
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    fn begin(&self, ctx: &CallContext) -> StoreResult<TxHandle> {
        ctx.check()?;
        if self.active.get().is_some() {
            return Err(StoreError::TransactionInProgress);
        }
        self.guarded(ctx, |conn| conn.execute_batch("BEGIN IMMEDIATE;"))?;
        let handle = TxHandle::new();
        self.active.set(Some(handle));
        Ok(handle)
    }

    fn commit(&self, handle: TxHandle, ctx: &CallContext) -> StoreResult<()> {
        self.expect_active(handle)?;
        ctx.check()?;
        match self.guarded(ctx, |conn| conn.execute_batch("COMMIT;")) {
            Ok(()) => {
                self.active.set(None);
                Ok(())
            }
            Err(err) => {
                // SQLite may already have rolled the unit back.
                if self.conn.is_autocommit() {
                    self.active.set(None);
                }
                Err(err)
            }
        }
    }

    fn rollback(&self, handle: TxHandle) -> StoreResult<()> {
        self.expect_active(handle)?;
        self.active.set(None);
        if self.conn.is_autocommit() {
            return Ok(());
        }
        self.conn
            .execute_batch("ROLLBACK;")
            .map_err(|err| translate_error(err, &CallContext::default()))
    }
}

fn read_value(value: ValueRef<'_>, index: usize, name: &str) -> rusqlite::Result<SqlValue> {
    match value {
        ValueRef::Null => Ok(SqlValue::Null),
        ValueRef::Integer(value) => Ok(SqlValue::Integer(value)),
        ValueRef::Real(value) => Ok(SqlValue::Real(value)),
        ValueRef::Text(bytes) => Ok(SqlValue::Text(String::from_utf8_lossy(bytes).into_owned())),
        ValueRef::Blob(_) => Err(rusqlite::Error::InvalidColumnType(
            index,
            name.to_string(),
            rusqlite::types::Type::Blob,
        )),
    }
}

fn translate_error(err: rusqlite::Error, ctx: &CallContext) -> StoreError {
    let (code, extended_code) = match &err {
        rusqlite::Error::SqliteFailure(failure, _) => (failure.code, failure.extended_code),
        rusqlite::Error::InvalidColumnType(_, column, ty) => {
            return StoreError::UnsupportedValue {
                column: column.clone(),
                kind: ty.to_string(),
            }
        }
        _ => return StoreError::Sqlite(err),
    };
    match code {
        ErrorCode::ConstraintViolation => StoreError::Constraint {
            kind: constraint_kind(extended_code),
            message: err.to_string(),
        },
        ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => StoreError::Busy(err.to_string()),
        ErrorCode::OperationInterrupted => ctx.interruption(),
        ErrorCode::CannotOpen | ErrorCode::NotADatabase => StoreError::Connection(err.to_string()),
        _ => StoreError::Sqlite(err),
    }
}

fn constraint_kind(extended_code: i32) -> ConstraintKind {
    match extended_code {
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => ConstraintKind::ForeignKey,
        ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => ConstraintKind::Unique,
        ffi::SQLITE_CONSTRAINT_NOTNULL => ConstraintKind::NotNull,
        ffi::SQLITE_CONSTRAINT_CHECK => ConstraintKind::Check,
        _ => ConstraintKind::Other,
    }
}

fn ensure_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for entity in Entity::ALL {
        let def = entity.def();
        if !table_exists(conn, def.table)? {
            return Err(StoreError::MissingTable(def.table));
        }
        for field in def.fields {
            if !table_has_column(conn, def.table, field.name)? {
                return Err(StoreError::MissingColumn {
                    table: def.table,
                    column: field.name,
                });
            }
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> StoreResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
