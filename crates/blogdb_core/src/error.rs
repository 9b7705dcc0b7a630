//! Caller-facing error taxonomy.
//!
//! # Invariants
//! - Store failures are translated, never masked as success.
//! - A point lookup that finds nothing is [`DataError::NotFound`]; an empty
//!   collection is not an error.

use crate::model::entity::Entity;
use crate::model::records::ValidationError;
use crate::project::ProjectionError;
use crate::query::CompositionError;
use crate::store::StoreError;
use crate::tx::TxState;
use thiserror::Error;
use uuid::Uuid;

pub type DataResult<T> = Result<T, DataError>;

#[derive(Debug, Error)]
pub enum DataError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Composition(#[from] CompositionError),
    #[error(transparent)]
    Projection(#[from] ProjectionError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{entity} not found: {key}")]
    NotFound { entity: Entity, key: String },
    /// A coordinated unit was rolled back; `cause` is the original failure.
    #[error("transaction {unit_id} aborted at statement {statement_index}: {cause}")]
    TransactionAbort {
        unit_id: Uuid,
        statement_index: usize,
        #[source]
        cause: Box<DataError>,
    },
    #[error("transaction {unit_id} is {state} and accepts no statements")]
    TransactionClosed { unit_id: Uuid, state: TxState },
}

impl DataError {
    pub fn not_found(entity: Entity, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Innermost cause, looking through transaction aborts.
    pub fn root_cause(&self) -> &DataError {
        match self {
            Self::TransactionAbort { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root_cause(), Self::NotFound { .. })
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::Store(StoreError::Constraint { .. })
        )
    }
}
