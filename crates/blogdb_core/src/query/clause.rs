//! Join, order, pagination, window-ranking and projection clauses.

use super::expr::Expr;
use crate::model::entity::{Col, Entity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    LeftOuter,
}

impl JoinKind {
    pub(crate) fn sql(self) -> &'static str {
        match self {
            Self::Inner => "JOIN",
            Self::LeftOuter => "LEFT JOIN",
        }
    }
}

/// What a join attaches and how its rows are matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinTarget {
    /// Follows a relationship declared on `from`, which must already be in
    /// scope.
    Relationship { from: Entity, name: &'static str },
    /// Explicit key pair; `right.entity` is the entity being attached.
    Keys { left: Col, right: Col },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinSpec {
    pub kind: JoinKind,
    pub target: JoinTarget,
}

impl JoinSpec {
    pub fn inner(from: Entity, name: &'static str) -> Self {
        Self {
            kind: JoinKind::Inner,
            target: JoinTarget::Relationship { from, name },
        }
    }

    pub fn left_outer(from: Entity, name: &'static str) -> Self {
        Self {
            kind: JoinKind::LeftOuter,
            target: JoinTarget::Relationship { from, name },
        }
    }

    pub fn on_keys(kind: JoinKind, left: Col, right: Col) -> Self {
        Self {
            kind,
            target: JoinTarget::Keys { left, right },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub(crate) fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderKey {
    pub expr: Expr,
    pub direction: Direction,
}

impl OrderKey {
    pub fn new(expr: impl Into<Expr>, direction: Direction) -> Self {
        Self {
            expr: expr.into(),
            direction,
        }
    }
}

/// Page window. `limit = None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pagination {
    pub limit: Option<u32>,
    pub offset: u32,
}

impl Pagination {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            limit: Some(limit),
            offset,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankFunction {
    #[default]
    RowNumber,
    Rank,
    DenseRank,
}

impl RankFunction {
    pub(crate) fn sql(self) -> &'static str {
        match self {
            Self::RowNumber => "ROW_NUMBER()",
            Self::Rank => "RANK()",
            Self::DenseRank => "DENSE_RANK()",
        }
    }
}

/// Per-partition ranking used to cap rows per group.
///
/// The rank is projected as [`WindowRank::RANK_ALIAS`] and the outer query
/// keeps rows whose rank is at most `max_rank`.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowRank {
    pub partition_by: Vec<Col>,
    pub order_by: Vec<OrderKey>,
    pub function: RankFunction,
    pub max_rank: Option<u32>,
}

impl WindowRank {
    pub const RANK_ALIAS: &'static str = "rank";

    pub fn partition_by(col: Col) -> Self {
        Self {
            partition_by: vec![col],
            order_by: Vec::new(),
            function: RankFunction::RowNumber,
            max_rank: None,
        }
    }

    pub fn and_partition_by(mut self, col: Col) -> Self {
        self.partition_by.push(col);
        self
    }

    pub fn order_by(mut self, expr: impl Into<Expr>, direction: Direction) -> Self {
        self.order_by.push(OrderKey::new(expr, direction));
        self
    }

    pub fn function(mut self, function: RankFunction) -> Self {
        self.function = function;
        self
    }

    pub fn keep_top(mut self, n: u32) -> Self {
        self.max_rank = Some(n);
        self
    }
}

/// One output column.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: String,
}

impl SelectItem {
    pub fn new(expr: impl Into<Expr>, alias: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            alias: alias.into(),
        }
    }
}

/// Soft-delete visibility of a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    LiveOnly,
    IncludeDeleted,
}
