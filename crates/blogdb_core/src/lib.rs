//! Data-access layer over the blog schema: users, addresses, companies,
//! posts and comments.
//!
//! Reads are composed as typed [`Query`] values and projected into records;
//! multi-statement writes run through [`TransactionCoordinator`]. Every call
//! takes an explicit [`Store`] handle and a [`CallContext`].

pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod project;
pub mod query;
pub mod repo;
pub mod reports;
pub mod service;
pub mod store;
pub mod tx;

pub use config::{load_config, parse_config, ConfigError, StoreConfig};
pub use error::{DataError, DataResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::entity::{Cardinality, Col, Entity, FieldType};
pub use model::records::{
    Address, Comment, Company, NewAddress, NewComment, NewCompany, NewPost, NewRecord, NewUser,
    Post, Record, User, ValidationError,
};
pub use project::{FromRow, ProjectionError, Row, RowView};
pub use query::{
    CompositionError, Direction, Expr, JoinKind, Pagination, Predicate, Query, RawQuery, SqlValue,
    Statement, Visibility, WindowRank,
};
pub use repo::{EntityRepository, PostRepository, UserRepository};
pub use reports::{Report, ReportRunner};
pub use service::{BlogService, UserProfile};
pub use store::{
    open_store, open_store_in_memory, open_store_with, CallContext, CancelToken, SqliteStore,
    Store, StoreError,
};
pub use tx::{run_in_transaction, TransactionCoordinator, TxState};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
