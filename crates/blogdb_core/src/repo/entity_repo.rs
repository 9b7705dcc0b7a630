//! Generic per-entity repository.

use super::{fetch, fetch_rows};
use crate::error::{DataError, DataResult};
use crate::model::entity::Col;
use crate::model::records::{NewRecord, Record};
use crate::project::project_at_most_one;
use crate::query::{
    Direction, Expr, Pagination, Predicate, Query, SoftDelete, SqlValue, Update, Visibility,
};
use crate::store::{CallContext, Store};
use std::marker::PhantomData;

/// CRUD over one record type, bound to an explicit store handle.
pub struct EntityRepository<'s, S: Store + ?Sized, R: Record> {
    store: &'s S,
    _record: PhantomData<fn() -> R>,
}

impl<'s, S: Store + ?Sized, R: Record> EntityRepository<'s, S, R> {
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            _record: PhantomData,
        }
    }

    fn base_query(visibility: Visibility) -> Query {
        Query::new(R::ENTITY)
            .select_all(R::ENTITY, "")
            .visibility(visibility)
    }

    fn primary_key() -> Col {
        R::ENTITY.def().primary_key_col()
    }

    /// Validates and inserts one row; returns its generated id.
    pub fn create(&self, ctx: &CallContext, value: &R::New) -> DataResult<i64> {
        value.validate()?;
        let statement = value.to_insert().compose()?;
        let outcome = self.store.execute_write(&statement, ctx)?;
        Ok(outcome.generated_key.unwrap_or_default())
    }

    /// Live row by primary key.
    pub fn get(&self, ctx: &CallContext, id: i64) -> DataResult<R> {
        self.get_with(ctx, id, Visibility::LiveOnly)
    }

    pub fn get_with(&self, ctx: &CallContext, id: i64, visibility: Visibility) -> DataResult<R> {
        let query = Self::base_query(visibility).filter(Predicate::eq(Self::primary_key(), id));
        let rows = fetch_rows(self.store, ctx, &query)?;
        project_at_most_one::<R>(&rows)?.ok_or_else(|| DataError::not_found(R::ENTITY, id))
    }

    /// First Live row matching `predicate` in primary-key order.
    pub fn find_first(&self, ctx: &CallContext, predicate: Predicate) -> DataResult<R> {
        self.find_first_with(ctx, predicate, Visibility::LiveOnly)
    }

    pub fn find_first_with(
        &self,
        ctx: &CallContext,
        predicate: Predicate,
        visibility: Visibility,
    ) -> DataResult<R> {
        let query = Self::base_query(visibility)
            .filter(predicate)
            .order_by(Self::primary_key(), Direction::Asc)
            .limit(1);
        fetch::<S, R>(self.store, ctx, &query)?
            .into_iter()
            .next()
            .ok_or_else(|| DataError::not_found(R::ENTITY, "first match"))
    }

    /// Live rows matching `filter` in primary-key order.
    pub fn list(
        &self,
        ctx: &CallContext,
        filter: Predicate,
        page: Pagination,
    ) -> DataResult<Vec<R>> {
        self.list_with(ctx, filter, page, Visibility::LiveOnly)
    }

    pub fn list_with(
        &self,
        ctx: &CallContext,
        filter: Predicate,
        page: Pagination,
        visibility: Visibility,
    ) -> DataResult<Vec<R>> {
        let query = Self::base_query(visibility)
            .filter(filter)
            .order_by(Self::primary_key(), Direction::Asc)
            .paginate(page);
        fetch(self.store, ctx, &query)
    }

    pub fn count(&self, ctx: &CallContext, filter: Predicate) -> DataResult<i64> {
        self.count_with(ctx, filter, Visibility::LiveOnly)
    }

    pub fn count_with(
        &self,
        ctx: &CallContext,
        filter: Predicate,
        visibility: Visibility,
    ) -> DataResult<i64> {
        let query = Query::new(R::ENTITY)
            .select(Expr::count_all(), "count")
            .filter(filter)
            .visibility(visibility);
        let rows = fetch_rows(self.store, ctx, &query)?;
        match rows.first() {
            Some(row) => Ok(row.view().i64("count")?),
            None => Ok(0),
        }
    }

    /// Updates one Live row; zero affected rows is `NotFound`.
    pub fn update_by_id(
        &self,
        ctx: &CallContext,
        id: i64,
        changes: impl IntoIterator<Item = (Col, SqlValue)>,
    ) -> DataResult<()> {
        let update = changes
            .into_iter()
            .fold(Update::new(R::ENTITY), |update, (col, value)| {
                update.set(col, value)
            })
            .filter(Predicate::eq(Self::primary_key(), id));
        let statement = update.compose()?;
        let outcome = self.store.execute_write(&statement, ctx)?;
        if outcome.rows_affected == 0 {
            return Err(DataError::not_found(R::ENTITY, id));
        }
        Ok(())
    }

    /// Marks one Live row Deleted; an absent or already Deleted row is
    /// `NotFound`.
    pub fn soft_delete(&self, ctx: &CallContext, id: i64, deleted_at_ms: i64) -> DataResult<()> {
        let statement = SoftDelete::new(R::ENTITY, deleted_at_ms)
            .filter(Predicate::eq(Self::primary_key(), id))
            .compose()?;
        let outcome = self.store.execute_write(&statement, ctx)?;
        if outcome.rows_affected == 0 {
            return Err(DataError::not_found(R::ENTITY, id));
        }
        Ok(())
    }
}
