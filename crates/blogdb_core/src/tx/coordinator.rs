//! Transaction coordinator state machine.

use super::TxState;
use crate::error::{DataError, DataResult};
use crate::project::{project_rows, FromRow, Row};
use crate::query::{Query, Statement, Write};
use crate::store::{CallContext, Store, TxHandle, WriteOutcome};
use log::{info, warn};
use std::time::Instant;
use uuid::Uuid;

/// One atomic unit of work on one store.
///
/// Statements run strictly in submission order. Any failure rolls the unit
/// back and is returned as [`DataError::TransactionAbort`] carrying the
/// original cause. Dropping a unit that is still `Started` rolls it back.
pub struct TransactionCoordinator<'s, S: Store + ?Sized> {
    store: &'s S,
    handle: TxHandle,
    ctx: CallContext,
    state: TxState,
    submitted: usize,
    started_at: Instant,
}

impl<'s, S: Store + ?Sized> TransactionCoordinator<'s, S> {
    pub fn begin(store: &'s S, ctx: &CallContext) -> DataResult<Self> {
        let handle = match store.begin(ctx) {
            Ok(handle) => handle,
            Err(err) => {
                warn!("event=tx_begin module=tx status=error error={err}");
                return Err(err.into());
            }
        };
        info!("event=tx_begin module=tx status=ok unit_id={handle}");
        Ok(Self {
            store,
            handle,
            ctx: ctx.for_transaction(handle),
            state: TxState::Started,
            submitted: 0,
            started_at: Instant::now(),
        })
    }

    pub fn unit_id(&self) -> Uuid {
        self.handle.id()
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    /// Context bound to this unit; use it for direct store calls.
    pub fn context(&self) -> &CallContext {
        &self.ctx
    }

    /// Composes and submits one write; returns its generated key, if any.
    pub fn execute(&mut self, write: impl Into<Write>) -> DataResult<WriteOutcome> {
        self.ensure_open()?;
        let index = self.next_index();
        let statement = match write.into().compose() {
            Ok(statement) => statement,
            Err(err) => return Err(self.abort(index, err.into())),
        };
        self.submit_write(index, &statement)
    }

    pub fn execute_statement(&mut self, statement: &Statement) -> DataResult<WriteOutcome> {
        self.ensure_open()?;
        let index = self.next_index();
        self.submit_write(index, statement)
    }

    /// Reads inside the unit, seeing its uncommitted writes.
    pub fn query(&mut self, query: &Query) -> DataResult<Vec<Row>> {
        self.ensure_open()?;
        let index = self.next_index();
        let composed = match query.compose() {
            Ok(composed) => composed,
            Err(err) => return Err(self.abort(index, err.into())),
        };
        match self.store.execute_query(&composed.statement, &self.ctx) {
            Ok(rows) => Ok(rows),
            Err(err) => Err(self.abort(index, err.into())),
        }
    }

    pub fn query_as<T: FromRow>(&mut self, query: &Query) -> DataResult<Vec<T>> {
        let index = self.submitted;
        let rows = self.query(query)?;
        match project_rows(&rows) {
            Ok(records) => Ok(records),
            Err(err) => Err(self.abort(index, err.into())),
        }
    }

    /// Aborts the unit on a caller-detected condition.
    ///
    /// Returns `cause` unchanged when the unit is no longer `Started`.
    pub fn fail(&mut self, cause: DataError) -> DataError {
        if self.state != TxState::Started {
            return cause;
        }
        let index = self.submitted;
        self.abort(index, cause)
    }

    pub fn commit(mut self) -> DataResult<()> {
        self.ensure_open()?;
        match self.store.commit(self.handle, &self.ctx) {
            Ok(()) => {
                self.state = TxState::Committed;
                info!(
                    "event=tx_commit module=tx status=ok unit_id={} statements={} duration_ms={}",
                    self.handle,
                    self.submitted,
                    self.started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                let index = self.submitted;
                Err(self.abort(index, err.into()))
            }
        }
    }

    /// Rolls back without a failure cause.
    pub fn rollback(mut self) -> DataResult<()> {
        self.ensure_open()?;
        self.state = TxState::RollbackRequested;
        let result = self.store.rollback(self.handle);
        self.state = TxState::RolledBack;
        info!(
            "event=tx_rollback module=tx status={} unit_id={} statements={} reason=requested duration_ms={}",
            if result.is_ok() { "ok" } else { "error" },
            self.handle,
            self.submitted,
            self.started_at.elapsed().as_millis()
        );
        result.map_err(DataError::from)
    }

    fn next_index(&mut self) -> usize {
        let index = self.submitted;
        self.submitted += 1;
        index
    }

    fn ensure_open(&self) -> DataResult<()> {
        if self.state != TxState::Started {
            return Err(DataError::TransactionClosed {
                unit_id: self.unit_id(),
                state: self.state,
            });
        }
        Ok(())
    }

    fn submit_write(&mut self, index: usize, statement: &Statement) -> DataResult<WriteOutcome> {
        match self.store.execute_write(statement, &self.ctx) {
            Ok(outcome) => Ok(outcome),
            Err(err) => Err(self.abort(index, err.into())),
        }
    }

    fn abort(&mut self, statement_index: usize, cause: DataError) -> DataError {
        self.state = TxState::RollbackRequested;
        let rollback = self.store.rollback(self.handle);
        self.state = TxState::RolledBack;
        match &rollback {
            Ok(()) => warn!(
                "event=tx_rollback module=tx status=ok unit_id={} statement_index={} duration_ms={} cause={}",
                self.handle,
                statement_index,
                self.started_at.elapsed().as_millis(),
                cause
            ),
            Err(err) => warn!(
                "event=tx_rollback module=tx status=error unit_id={} statement_index={} duration_ms={} cause={} error={}",
                self.handle,
                statement_index,
                self.started_at.elapsed().as_millis(),
                cause,
                err
            ),
        }
        DataError::TransactionAbort {
            unit_id: self.unit_id(),
            statement_index,
            cause: Box::new(cause),
        }
    }
}

impl<S: Store + ?Sized> Drop for TransactionCoordinator<'_, S> {
    fn drop(&mut self) {
        if self.state != TxState::Started {
            return;
        }
        self.state = TxState::RollbackRequested;
        let result = self.store.rollback(self.handle);
        self.state = TxState::RolledBack;
        warn!(
            "event=tx_drop module=tx status={} unit_id={} statements={}",
            if result.is_ok() { "rolled_back" } else { "error" },
            self.handle,
            self.submitted
        );
    }
}

/// Runs `work` inside one unit, committing on `Ok` and rolling back on `Err`.
pub fn run_in_transaction<S, T, F>(store: &S, ctx: &CallContext, work: F) -> DataResult<T>
where
    S: Store + ?Sized,
    F: FnOnce(&mut TransactionCoordinator<'_, S>) -> DataResult<T>,
{
    let mut unit = TransactionCoordinator::begin(store, ctx)?;
    match work(&mut unit) {
        Ok(value) => {
            unit.commit()?;
            Ok(value)
        }
        Err(err) => Err(unit.fail(err)),
    }
}
