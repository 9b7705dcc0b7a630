//! Coordinated multi-statement write units.
//!
//! # Responsibility
//! - Sequence writes into one all-or-nothing unit against a [`Store`](crate::store::Store).
//!
//! # Invariants
//! - A unit moves `Started -> Committed` or
//!   `Started -> RollbackRequested -> RolledBack`; both ends are terminal.
//! - After the first failure no further statement of the unit is submitted.
//! - The coordinator never retries.

mod coordinator;

pub use coordinator::{run_in_transaction, TransactionCoordinator};

use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Started,
    Committed,
    RollbackRequested,
    RolledBack,
}

impl TxState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }
}

impl Display for TxState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            Self::Started => "started",
            Self::Committed => "committed",
            Self::RollbackRequested => "rollback_requested",
            Self::RolledBack => "rolled_back",
        };
        f.write_str(value)
    }
}
