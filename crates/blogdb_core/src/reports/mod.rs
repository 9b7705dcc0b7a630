//! Named analytical queries over the blog schema.
//!
//! # Responsibility
//! - Declare each report as a composed [`Query`] plus its typed row record.
//! - Run reports against any [`Store`] through [`ReportRunner`].
//!
//! # Invariants
//! - Every report inherits the Live-only filter of the composer.
//! - Every report carries a total order, so paging and comparison of runs
//!   are deterministic.

pub mod catalog;
pub mod raw;

pub use catalog::{
    CommenterMatch, DirectoryEntry, EmailMatchedCommenters, PostBodyStats, PostBodyStatsReport,
    PostCommentCount, PostCommentCounts, PostCountsPerUser, ProlificAuthors, RankedPost,
    TopPostsPerUser, UserDirectory, UserPostCount, UserSummary, UsersWithDiscussion,
    UsersWithoutPosts,
};
pub use raw::raw_top_posts_per_user;

use crate::error::DataResult;
use crate::project::{project_rows, FromRow};
use crate::query::{Pagination, Query, RawQuery};
use crate::repo::fetch;
use crate::store::{CallContext, Store};
use log::debug;
use std::time::Instant;

/// Names accepted by [`ReportRunner`] callers that dispatch by string.
pub const REPORT_NAMES: &[&str] = &[
    PostCountsPerUser::NAME,
    TopPostsPerUser::NAME,
    EmailMatchedCommenters::NAME,
    UsersWithoutPosts::NAME,
    UserDirectory::NAME,
    PostBodyStatsReport::NAME,
    ProlificAuthors::NAME,
    UsersWithDiscussion::NAME,
    PostCommentCounts::NAME,
];

/// One named report and the record its rows project into.
pub trait Report {
    type Row: FromRow;

    const NAME: &'static str;

    fn query(&self) -> Query;
}

pub struct ReportRunner<'s, S: Store + ?Sized> {
    store: &'s S,
}

impl<'s, S: Store + ?Sized> ReportRunner<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    pub fn run<R: Report>(&self, ctx: &CallContext, report: &R) -> DataResult<Vec<R::Row>> {
        self.run_query(ctx, R::NAME, &report.query())
    }

    /// Runs a page of the report; the page applies after the report's order.
    pub fn run_page<R: Report>(
        &self,
        ctx: &CallContext,
        report: &R,
        page: Pagination,
    ) -> DataResult<Vec<R::Row>> {
        self.run_query(ctx, R::NAME, &report.query().paginate(page))
    }

    /// Runs a raw statement; no Live-only filter is injected.
    pub fn run_raw<T: FromRow>(&self, ctx: &CallContext, raw: RawQuery) -> DataResult<Vec<T>> {
        let started_at = Instant::now();
        let statement = raw.into_statement()?;
        let rows = self.store.execute_query(&statement, ctx)?;
        debug!(
            "event=report module=reports status=ok name=raw rows={} duration_ms={}",
            rows.len(),
            started_at.elapsed().as_millis()
        );
        Ok(project_rows(&rows)?)
    }

    fn run_query<T: FromRow>(
        &self,
        ctx: &CallContext,
        name: &str,
        query: &Query,
    ) -> DataResult<Vec<T>> {
        let started_at = Instant::now();
        let rows = fetch::<S, T>(self.store, ctx, query)?;
        debug!(
            "event=report module=reports status=ok name={name} rows={} duration_ms={}",
            rows.len(),
            started_at.elapsed().as_millis()
        );
        Ok(rows)
    }
}

/// Composes a report without running it.
pub fn compose_report<R: Report>(report: &R) -> DataResult<String> {
    Ok(report.query().compose()?.statement.sql)
}
