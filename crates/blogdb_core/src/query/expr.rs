//! Expression and predicate trees.
//!
//! # Invariants
//! - Every literal is carried as a [`SqlValue`] and bound as a parameter at
//!   build time.
//! - Constructors reduce trivially true/false branches, so an empty `IN`
//!   list never reaches the SQL text.

use super::compose::Query;
use super::value::SqlValue;
use crate::model::entity::Col;

/// Row-level scalar expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Column(Col),
    /// Character length of a text column.
    Length(Col),
}

impl Scalar {
    pub fn length(col: Col) -> Self {
        Self::Length(col)
    }

    pub fn col(&self) -> Col {
        match self {
            Self::Column(col) | Self::Length(col) => *col,
        }
    }
}

impl From<Col> for Scalar {
    fn from(value: Col) -> Self {
        Self::Column(value)
    }
}

/// Aggregate over a group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregate {
    CountAll,
    Count(Scalar),
    CountDistinct(Scalar),
    Sum(Scalar),
    /// Always projected as a real; never truncated to an integer.
    Avg(Scalar),
    Min(Scalar),
    Max(Scalar),
}

impl Aggregate {
    pub(crate) fn function_name(&self) -> &'static str {
        match self {
            Self::CountAll | Self::Count(_) | Self::CountDistinct(_) => "COUNT",
            Self::Sum(_) => "SUM",
            Self::Avg(_) => "AVG",
            Self::Min(_) => "MIN",
            Self::Max(_) => "MAX",
        }
    }

    pub(crate) fn argument(&self) -> Option<&Scalar> {
        match self {
            Self::CountAll => None,
            Self::Count(arg)
            | Self::CountDistinct(arg)
            | Self::Sum(arg)
            | Self::Avg(arg)
            | Self::Min(arg)
            | Self::Max(arg) => Some(arg),
        }
    }
}

/// Projectable expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Scalar(Scalar),
    Aggregate(Aggregate),
    /// Correlated scalar subquery; must project exactly one column.
    Subquery(Box<Query>),
}

impl Expr {
    pub fn col(col: Col) -> Self {
        Self::Scalar(Scalar::Column(col))
    }

    pub fn length(col: Col) -> Self {
        Self::Scalar(Scalar::Length(col))
    }

    pub fn count_all() -> Self {
        Self::Aggregate(Aggregate::CountAll)
    }

    /// `COUNT(arg)`: NULLs from outer-join misses are not counted.
    pub fn count(arg: impl Into<Scalar>) -> Self {
        Self::Aggregate(Aggregate::Count(arg.into()))
    }

    pub fn count_distinct(arg: impl Into<Scalar>) -> Self {
        Self::Aggregate(Aggregate::CountDistinct(arg.into()))
    }

    pub fn sum(arg: impl Into<Scalar>) -> Self {
        Self::Aggregate(Aggregate::Sum(arg.into()))
    }

    pub fn avg(arg: impl Into<Scalar>) -> Self {
        Self::Aggregate(Aggregate::Avg(arg.into()))
    }

    pub fn min(arg: impl Into<Scalar>) -> Self {
        Self::Aggregate(Aggregate::Min(arg.into()))
    }

    pub fn max(arg: impl Into<Scalar>) -> Self {
        Self::Aggregate(Aggregate::Max(arg.into()))
    }

    pub fn subquery(query: Query) -> Self {
        Self::Subquery(Box::new(query))
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Self::Aggregate(_))
    }
}

impl From<Col> for Expr {
    fn from(value: Col) -> Self {
        Self::col(value)
    }
}

impl From<Scalar> for Expr {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

impl From<Aggregate> for Expr {
    fn from(value: Aggregate) -> Self {
        Self::Aggregate(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub(crate) fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    fn negate(self) -> Self {
        match self {
            Self::Eq => Self::Ne,
            Self::Ne => Self::Eq,
            Self::Lt => Self::Ge,
            Self::Le => Self::Gt,
            Self::Gt => Self::Le,
            Self::Ge => Self::Lt,
        }
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Bound parameter.
    Value(SqlValue),
    /// Another expression, e.g. an outer column in a correlated subquery.
    Expr(Expr),
}

/// Right-hand side of membership tests.
#[derive(Debug, Clone, PartialEq)]
pub enum InSet {
    List(Vec<SqlValue>),
    /// Nested query; must project exactly one column of a compatible type.
    Query(Box<Query>),
}

/// Boolean filter tree used for WHERE, HAVING and ON clauses.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    True,
    False,
    Compare {
        lhs: Expr,
        op: CmpOp,
        rhs: Operand,
    },
    Between {
        expr: Expr,
        low: SqlValue,
        high: SqlValue,
    },
    IsNull {
        expr: Expr,
        negated: bool,
    },
    In {
        expr: Expr,
        set: InSet,
        negated: bool,
    },
    Exists {
        query: Box<Query>,
        negated: bool,
    },
    Like {
        expr: Expr,
        pattern: SqlValue,
    },
    // Prefer Predicate::and(), which simplifies the clause
    And(Box<Predicate>, Box<Predicate>),
    // Prefer Predicate::or(), which simplifies the clause
    Or(Box<Predicate>, Box<Predicate>),
    // Prefer `!predicate`, which simplifies the clause
    Not(Box<Predicate>),
}

impl Default for Predicate {
    fn default() -> Self {
        Self::True
    }
}

impl Predicate {
    /// Compares an expression with a bound value. `= NULL` and `<> NULL`
    /// become `IS NULL` / `IS NOT NULL`.
    pub fn cmp(lhs: impl Into<Expr>, op: CmpOp, value: impl Into<SqlValue>) -> Self {
        let lhs = lhs.into();
        let value = value.into();
        match (op, value.is_null()) {
            (CmpOp::Eq, true) => Self::IsNull {
                expr: lhs,
                negated: false,
            },
            (CmpOp::Ne, true) => Self::IsNull {
                expr: lhs,
                negated: true,
            },
            _ => Self::Compare {
                lhs,
                op,
                rhs: Operand::Value(value),
            },
        }
    }

    pub fn eq(lhs: impl Into<Expr>, value: impl Into<SqlValue>) -> Self {
        Self::cmp(lhs, CmpOp::Eq, value)
    }

    pub fn ne(lhs: impl Into<Expr>, value: impl Into<SqlValue>) -> Self {
        Self::cmp(lhs, CmpOp::Ne, value)
    }

    pub fn lt(lhs: impl Into<Expr>, value: impl Into<SqlValue>) -> Self {
        Self::cmp(lhs, CmpOp::Lt, value)
    }

    pub fn le(lhs: impl Into<Expr>, value: impl Into<SqlValue>) -> Self {
        Self::cmp(lhs, CmpOp::Le, value)
    }

    pub fn gt(lhs: impl Into<Expr>, value: impl Into<SqlValue>) -> Self {
        Self::cmp(lhs, CmpOp::Gt, value)
    }

    pub fn ge(lhs: impl Into<Expr>, value: impl Into<SqlValue>) -> Self {
        Self::cmp(lhs, CmpOp::Ge, value)
    }

    /// Compares two expressions, e.g. an inner and an outer column.
    pub fn compare_exprs(lhs: impl Into<Expr>, op: CmpOp, rhs: impl Into<Expr>) -> Self {
        Self::Compare {
            lhs: lhs.into(),
            op,
            rhs: Operand::Expr(rhs.into()),
        }
    }

    pub fn columns_eq(lhs: Col, rhs: Col) -> Self {
        Self::compare_exprs(lhs, CmpOp::Eq, rhs)
    }

    pub fn between(
        expr: impl Into<Expr>,
        low: impl Into<SqlValue>,
        high: impl Into<SqlValue>,
    ) -> Self {
        Self::Between {
            expr: expr.into(),
            low: low.into(),
            high: high.into(),
        }
    }

    pub fn is_null(expr: impl Into<Expr>) -> Self {
        Self::IsNull {
            expr: expr.into(),
            negated: false,
        }
    }

    pub fn is_not_null(expr: impl Into<Expr>) -> Self {
        Self::IsNull {
            expr: expr.into(),
            negated: true,
        }
    }

    /// Membership in a literal set. An empty set is always false.
    pub fn in_list<V: Into<SqlValue>>(
        expr: impl Into<Expr>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values: Vec<SqlValue> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Self::False;
        }
        Self::In {
            expr: expr.into(),
            set: InSet::List(values),
            negated: false,
        }
    }

    /// Non-membership in a literal set. An empty set is always true.
    pub fn not_in_list<V: Into<SqlValue>>(
        expr: impl Into<Expr>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        !Self::in_list(expr, values)
    }

    pub fn in_query(expr: impl Into<Expr>, query: Query) -> Self {
        Self::In {
            expr: expr.into(),
            set: InSet::Query(Box::new(query)),
            negated: false,
        }
    }

    pub fn not_in_query(expr: impl Into<Expr>, query: Query) -> Self {
        Self::In {
            expr: expr.into(),
            set: InSet::Query(Box::new(query)),
            negated: true,
        }
    }

    pub fn exists(query: Query) -> Self {
        Self::Exists {
            query: Box::new(query),
            negated: false,
        }
    }

    pub fn not_exists(query: Query) -> Self {
        Self::Exists {
            query: Box::new(query),
            negated: true,
        }
    }

    pub fn like(expr: impl Into<Expr>, pattern: impl Into<String>) -> Self {
        Self::Like {
            expr: expr.into(),
            pattern: SqlValue::Text(pattern.into()),
        }
    }

    /// Logical and of two predicates, reducing to a simpler predicate if possible.
    pub fn and(lhs: Predicate, rhs: Predicate) -> Predicate {
        match (lhs, rhs) {
            (Predicate::False, _) | (_, Predicate::False) => Predicate::False,
            (Predicate::True, rhs) => rhs,
            (lhs, Predicate::True) => lhs,
            (lhs, rhs) if lhs == rhs => lhs,
            (lhs, rhs) => Predicate::And(Box::new(lhs), Box::new(rhs)),
        }
    }

    /// Logical or of two predicates, reducing to a simpler predicate if possible.
    pub fn or(lhs: Predicate, rhs: Predicate) -> Predicate {
        match (lhs, rhs) {
            (Predicate::True, _) | (_, Predicate::True) => Predicate::True,
            (Predicate::False, rhs) => rhs,
            (lhs, Predicate::False) => lhs,
            (lhs, rhs) if lhs == rhs => lhs,
            (lhs, rhs) => Predicate::Or(Box::new(lhs), Box::new(rhs)),
        }
    }

    pub fn all(predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
        predicates.into_iter().fold(Predicate::True, Predicate::and)
    }

    pub fn any(predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
        predicates.into_iter().fold(Predicate::False, Predicate::or)
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Self::True)
    }

    /// Whether an aggregate appears outside of nested subqueries.
    pub(crate) fn contains_aggregate(&self) -> bool {
        match self {
            Self::True | Self::False | Self::Exists { .. } => false,
            Self::Compare { lhs, rhs, .. } => {
                lhs.is_aggregate() || matches!(rhs, Operand::Expr(expr) if expr.is_aggregate())
            }
            Self::Between { expr, .. }
            | Self::IsNull { expr, .. }
            | Self::In { expr, .. }
            | Self::Like { expr, .. } => expr.is_aggregate(),
            Self::And(lhs, rhs) | Self::Or(lhs, rhs) => {
                lhs.contains_aggregate() || rhs.contains_aggregate()
            }
            Self::Not(inner) => inner.contains_aggregate(),
        }
    }
}

impl std::ops::Not for Predicate {
    type Output = Predicate;

    fn not(self) -> Self::Output {
        match self {
            Predicate::True => Predicate::False,
            Predicate::False => Predicate::True,
            Predicate::Compare {
                lhs,
                op,
                rhs: Operand::Value(value),
            } => Predicate::Compare {
                lhs,
                op: op.negate(),
                rhs: Operand::Value(value),
            },
            Predicate::IsNull { expr, negated } => Predicate::IsNull {
                expr,
                negated: !negated,
            },
            Predicate::In {
                expr,
                set,
                negated,
            } => Predicate::In {
                expr,
                set,
                negated: !negated,
            },
            Predicate::Exists { query, negated } => Predicate::Exists {
                query,
                negated: !negated,
            },
            Predicate::Not(inner) => *inner,
            predicate => Predicate::Not(Box::new(predicate)),
        }
    }
}
