//! Repository layer over the composer and projector.
//!
//! # Responsibility
//! - Provide use-case oriented reads and writes per entity.
//! - Isolate statement composition from service orchestration.
//!
//! # Invariants
//! - Writes run `NewRecord::validate()` before anything reaches the store.
//! - Point lookups return `DataError::NotFound`; collection reads return a
//!   possibly empty `Vec`.

pub mod entity_repo;
pub mod post_repo;
pub mod user_repo;

pub use entity_repo::EntityRepository;
pub use post_repo::{PostRepository, PostWithComments};
pub use user_repo::{UserChanges, UserDetails, UserRepository, UserWithPosts};

use crate::error::DataResult;
use crate::project::{project_rows, FromRow, Row};
use crate::query::Query;
use crate::store::{CallContext, Store};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}

pub(crate) fn fetch_rows<S: Store + ?Sized>(
    store: &S,
    ctx: &CallContext,
    query: &Query,
) -> DataResult<Vec<Row>> {
    let composed = query.compose()?;
    Ok(store.execute_query(&composed.statement, ctx)?)
}

pub(crate) fn fetch<S: Store + ?Sized, T: FromRow>(
    store: &S,
    ctx: &CallContext,
    query: &Query,
) -> DataResult<Vec<T>> {
    let rows = fetch_rows(store, ctx, query)?;
    Ok(project_rows(&rows)?)
}
