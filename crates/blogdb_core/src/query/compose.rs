//! Read-query composer.
//!
//! # Responsibility
//! - Assemble root entity, joins, predicates, subqueries, grouping, window
//!   ranking, projection and pagination into one parameterized statement.
//! - Validate every reference against the entity model while writing.
//!
//! # Invariants
//! - Composing the same [`Query`] twice yields identical SQL and bindings.
//! - Scope aliases are the table name at depth 0 and `{table}_{depth}` in
//!   nested subqueries; a column resolves to the innermost scope holding its
//!   entity, which is how correlation reaches outer rows.
//! - In [`Visibility::LiveOnly`] mode the root filter lands in WHERE and the
//!   join filter lands in ON, so outer joins keep their unmatched rows.

use super::builder::SqlBuilder;
use super::clause::{
    Direction, JoinKind, JoinSpec, JoinTarget, OrderKey, Pagination, SelectItem, Visibility,
    WindowRank,
};
use super::expr::{Aggregate, Expr, InSet, Operand, Predicate, Scalar};
use super::value::SqlValue;
use super::{ComposedQuery, CompositionError, OutputColumn, Statement, StatementKind};
use crate::model::entity::{Col, Entity, FieldDef, FieldType};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashSet;

static ALIAS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("valid alias regex"));

pub(crate) fn validate_alias(alias: &str) -> Result<(), CompositionError> {
    if ALIAS_RE.is_match(alias) {
        Ok(())
    } else {
        Err(CompositionError::InvalidAlias(alias.to_string()))
    }
}

pub(crate) fn field_of(col: Col) -> Result<&'static FieldDef, CompositionError> {
    col.def().ok_or_else(|| CompositionError::UnknownField {
        entity: col.entity,
        field: col.field.to_string(),
    })
}

/// Declarative read request over one root entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    root: Entity,
    joins: Vec<JoinSpec>,
    filter: Predicate,
    group_by: Vec<Scalar>,
    having: Predicate,
    order_by: Vec<OrderKey>,
    projection: Vec<SelectItem>,
    ranking: Option<WindowRank>,
    page: Pagination,
    visibility: Visibility,
    distinct: bool,
}

impl Query {
    pub fn new(root: Entity) -> Self {
        Self {
            root,
            joins: Vec::new(),
            filter: Predicate::True,
            group_by: Vec::new(),
            having: Predicate::True,
            order_by: Vec::new(),
            projection: Vec::new(),
            ranking: None,
            page: Pagination::default(),
            visibility: Visibility::LiveOnly,
            distinct: false,
        }
    }

    pub fn root(&self) -> Entity {
        self.root
    }

    pub fn is_live_only(&self) -> bool {
        self.visibility == Visibility::LiveOnly
    }

    /// Inner join through a relationship declared on `from`.
    pub fn join(self, from: Entity, relationship: &'static str) -> Self {
        self.join_spec(JoinSpec::inner(from, relationship))
    }

    /// Left outer join through a relationship declared on `from`.
    pub fn left_join(self, from: Entity, relationship: &'static str) -> Self {
        self.join_spec(JoinSpec::left_outer(from, relationship))
    }

    /// Join on an explicit key pair; `right.entity` is attached.
    pub fn join_on(self, kind: JoinKind, left: Col, right: Col) -> Self {
        self.join_spec(JoinSpec::on_keys(kind, left, right))
    }

    pub fn join_spec(mut self, spec: JoinSpec) -> Self {
        self.joins.push(spec);
        self
    }

    /// Adds a WHERE conjunct.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Predicate::and(std::mem::take(&mut self.filter), predicate);
        self
    }

    pub fn group_by(mut self, key: impl Into<Scalar>) -> Self {
        self.group_by.push(key.into());
        self
    }

    /// Adds a HAVING conjunct.
    pub fn having(mut self, predicate: Predicate) -> Self {
        self.having = Predicate::and(std::mem::take(&mut self.having), predicate);
        self
    }

    pub fn order_by(mut self, expr: impl Into<Expr>, direction: Direction) -> Self {
        self.order_by.push(OrderKey::new(expr, direction));
        self
    }

    pub fn select(mut self, expr: impl Into<Expr>, alias: impl Into<String>) -> Self {
        self.projection.push(SelectItem::new(expr, alias));
        self
    }

    /// Projects every declared field of `entity` as `{prefix}{field}`.
    pub fn select_all(mut self, entity: Entity, prefix: &str) -> Self {
        for field in entity.def().fields {
            self.projection.push(SelectItem::new(
                Col::new(entity, field.name),
                format!("{prefix}{}", field.name),
            ));
        }
        self
    }

    pub fn rank_within(mut self, rank: WindowRank) -> Self {
        self.ranking = Some(rank);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.page.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.page.offset = offset;
        self
    }

    pub fn paginate(mut self, page: Pagination) -> Self {
        self.page = page;
        self
    }

    /// Bypasses the Live-only filter for every entity in this query.
    pub fn include_deleted(self) -> Self {
        self.visibility(Visibility::IncludeDeleted)
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Composes the request into SQL plus its declared output columns.
    pub fn compose(&self) -> Result<ComposedQuery, CompositionError> {
        let mut composer = Composer::default();
        let columns = composer.write_query(self)?;
        let (sql, params) = composer.builder.into_sql();
        Ok(ComposedQuery {
            statement: Statement::new(sql, params, StatementKind::Query),
            columns,
        })
    }

    fn output_items(&self) -> Cow<'_, [SelectItem]> {
        if self.projection.is_empty() {
            let items = self
                .root
                .def()
                .fields
                .iter()
                .map(|field| SelectItem::new(Col::new(self.root, field.name), field.name))
                .collect::<Vec<_>>();
            Cow::Owned(items)
        } else {
            Cow::Borrowed(&self.projection)
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ExprType {
    ty: FieldType,
    nullable: bool,
}

#[derive(Debug)]
struct ScopeEntry {
    entity: Entity,
    alias: String,
    outer: bool,
}

#[derive(Debug)]
struct Scope {
    depth: usize,
    entries: Vec<ScopeEntry>,
}

impl Scope {
    fn alias_for(&self, entity: Entity) -> String {
        if self.depth == 0 {
            entity.table().to_string()
        } else {
            format!("{}_{}", entity.table(), self.depth)
        }
    }

    fn entry(&self, entity: Entity) -> Option<&ScopeEntry> {
        self.entries.iter().find(|entry| entry.entity == entity)
    }

    fn add(&mut self, entity: Entity, outer: bool) {
        let alias = self.alias_for(entity);
        self.entries.push(ScopeEntry {
            entity,
            alias,
            outer,
        });
    }
}

struct Resolved {
    alias: String,
    field: &'static FieldDef,
    outer: bool,
}

struct ResolvedJoin {
    kind: JoinKind,
    left: Col,
    right: Col,
}

#[derive(Default)]
pub(crate) struct Composer {
    builder: SqlBuilder,
    scopes: Vec<Scope>,
}

impl Composer {
    /// Composer scoped to the single target table of a write.
    pub(crate) fn for_table(entity: Entity) -> Self {
        let mut scope = Scope {
            depth: 0,
            entries: Vec::new(),
        };
        scope.add(entity, false);
        Self {
            builder: SqlBuilder::new(),
            scopes: vec![scope],
        }
    }

    pub(crate) fn builder_mut(&mut self) -> &mut SqlBuilder {
        &mut self.builder
    }

    pub(crate) fn push_where(&mut self, predicate: &Predicate) -> Result<(), CompositionError> {
        if predicate.contains_aggregate() {
            return Err(CompositionError::AggregateInWhere);
        }
        if !predicate.is_true() {
            self.builder.push_str(" WHERE ");
            self.write_predicate(predicate)?;
        }
        Ok(())
    }

    pub(crate) fn finish(self) -> (String, Vec<SqlValue>) {
        self.builder.into_sql()
    }

    fn current(&self) -> Option<&Scope> {
        self.scopes.last()
    }

    fn in_current(&self, entity: Entity) -> bool {
        self.current()
            .is_some_and(|scope| scope.entry(entity).is_some())
    }

    fn resolve(&self, col: Col) -> Result<Resolved, CompositionError> {
        let field = field_of(col)?;
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.entry(col.entity))
            .map(|entry| Resolved {
                alias: entry.alias.clone(),
                field,
                outer: entry.outer,
            })
            .ok_or_else(|| CompositionError::ColumnNotInScope {
                column: col.to_string(),
            })
    }

    fn write_query(&mut self, query: &Query) -> Result<Vec<OutputColumn>, CompositionError> {
        let depth = self.scopes.len();
        let mut scope = Scope {
            depth,
            entries: Vec::new(),
        };
        scope.add(query.root, false);
        self.scopes.push(scope);

        let joins = self.resolve_joins(query)?;
        let items = query.output_items();
        validate_items(query, &items)?;

        let columns = match &query.ranking {
            None => self.write_plain(query, &items, &joins)?,
            Some(rank) => self.write_ranked(query, rank, &items, &joins, depth)?,
        };
        self.scopes.pop();
        Ok(columns)
    }

    fn resolve_joins(&mut self, query: &Query) -> Result<Vec<ResolvedJoin>, CompositionError> {
        let mut joins = Vec::with_capacity(query.joins.len());
        for spec in &query.joins {
            let (left, right) = match spec.target {
                JoinTarget::Relationship { from, name } => {
                    if !self.in_current(from) {
                        return Err(CompositionError::EntityNotInScope(from));
                    }
                    from.def()
                        .relationship(name)
                        .ok_or_else(|| CompositionError::UndeclaredRelationship {
                            entity: from,
                            name: name.to_string(),
                        })?
                        .key_pair()
                }
                JoinTarget::Keys { left, right } => {
                    if !self.in_current(left.entity) {
                        return Err(CompositionError::EntityNotInScope(left.entity));
                    }
                    let left_field = field_of(left)?;
                    let right_field = field_of(right)?;
                    if !left_field.ty.accepts(right_field.ty) {
                        return Err(CompositionError::TypeMismatch {
                            context: format!("join {left} = {right}"),
                            expected: left_field.ty,
                            actual: right_field.ty.to_string(),
                        });
                    }
                    (left, right)
                }
            };
            if self.in_current(right.entity) {
                return Err(CompositionError::DuplicateEntity(right.entity));
            }
            let parent_outer = self
                .current()
                .and_then(|scope| scope.entry(left.entity))
                .is_some_and(|entry| entry.outer);
            if let Some(scope) = self.scopes.last_mut() {
                scope.add(right.entity, spec.kind == JoinKind::LeftOuter || parent_outer);
            }
            joins.push(ResolvedJoin {
                kind: spec.kind,
                left,
                right,
            });
        }
        Ok(joins)
    }

    fn write_plain(
        &mut self,
        query: &Query,
        items: &[SelectItem],
        joins: &[ResolvedJoin],
    ) -> Result<Vec<OutputColumn>, CompositionError> {
        self.builder.push_str("SELECT ");
        if query.distinct {
            self.builder.push_str("DISTINCT ");
        }
        let columns = self.write_items(items)?;
        self.write_from(query, joins)?;
        if !query.order_by.is_empty() {
            self.builder.push_str(" ORDER BY ");
            for (i, key) in query.order_by.iter().enumerate() {
                if i > 0 {
                    self.builder.push_str(", ");
                }
                self.write_expr(&key.expr)?;
                self.builder.push(' ');
                self.builder.push_str(key.direction.sql());
            }
        }
        self.write_page(query.page);
        Ok(columns)
    }

    fn write_ranked(
        &mut self,
        query: &Query,
        rank: &WindowRank,
        items: &[SelectItem],
        joins: &[ResolvedJoin],
        depth: usize,
    ) -> Result<Vec<OutputColumn>, CompositionError> {
        let outer = if depth == 0 {
            "ranked".to_string()
        } else {
            format!("ranked_{depth}")
        };
        let order = query
            .order_by
            .iter()
            .map(|key| {
                items
                    .iter()
                    .find(|item| item.expr == key.expr)
                    .map(|item| (item.alias.as_str(), key.direction))
                    .ok_or_else(|| CompositionError::UnprojectedOrderKey(describe(&key.expr)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.builder.push_str("SELECT ");
        if query.distinct {
            self.builder.push_str("DISTINCT ");
        }
        let aliases = items
            .iter()
            .map(|item| item.alias.as_str())
            .chain(std::iter::once(WindowRank::RANK_ALIAS));
        self.builder
            .push_iter(aliases, ", ", |builder, alias| {
                builder.push_column(&outer, alias);
                builder.push_str(" AS ");
                builder.push_identifier(alias);
                Ok::<(), CompositionError>(())
            })?;

        self.builder.push_str(" FROM (SELECT ");
        let mut columns = self.write_items(items)?;
        self.builder.push_str(", ");
        self.builder.push_str(rank.function.sql());
        self.builder.push_str(" OVER (");
        for (i, col) in rank.partition_by.iter().enumerate() {
            self.builder
                .push_str(if i == 0 { "PARTITION BY " } else { ", " });
            self.write_scalar(&Scalar::Column(*col))?;
        }
        for (i, key) in rank.order_by.iter().enumerate() {
            if i == 0 {
                if !rank.partition_by.is_empty() {
                    self.builder.push(' ');
                }
                self.builder.push_str("ORDER BY ");
            } else {
                self.builder.push_str(", ");
            }
            self.write_expr(&key.expr)?;
            self.builder.push(' ');
            self.builder.push_str(key.direction.sql());
        }
        self.builder.push_str(") AS ");
        self.builder.push_identifier(WindowRank::RANK_ALIAS);
        self.write_from(query, joins)?;
        self.builder.push_str(") AS ");
        self.builder.push_identifier(&outer);

        if let Some(max_rank) = rank.max_rank {
            self.builder.push_str(" WHERE ");
            self.builder.push_column(&outer, WindowRank::RANK_ALIAS);
            self.builder.push_str(" <= ");
            self.builder.push_param(SqlValue::from(max_rank));
        }
        if !order.is_empty() {
            self.builder.push_str(" ORDER BY ");
            self.builder
                .push_iter(order, ", ", |builder, (alias, direction)| {
                    builder.push_column(&outer, alias);
                    builder.push(' ');
                    builder.push_str(direction.sql());
                    Ok::<(), CompositionError>(())
                })?;
        }
        self.write_page(query.page);

        columns.push(OutputColumn {
            name: WindowRank::RANK_ALIAS.to_string(),
            ty: FieldType::Integer,
            nullable: false,
        });
        Ok(columns)
    }

    fn write_items(&mut self, items: &[SelectItem]) -> Result<Vec<OutputColumn>, CompositionError> {
        let mut columns = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.builder.push_str(", ");
            }
            let ty = self.write_expr(&item.expr)?;
            self.builder.push_str(" AS ");
            self.builder.push_identifier(&item.alias);
            columns.push(OutputColumn {
                name: item.alias.clone(),
                ty: ty.ty,
                nullable: ty.nullable,
            });
        }
        Ok(columns)
    }

    /// Writes FROM, JOIN, WHERE, GROUP BY and HAVING.
    fn write_from(&mut self, query: &Query, joins: &[ResolvedJoin]) -> Result<(), CompositionError> {
        let live_only = query.is_live_only();
        let root = self.resolve(query.root.def().primary_key_col())?;
        self.builder.push_str(" FROM ");
        self.builder.push_identifier(query.root.table());
        if root.alias != query.root.table() {
            self.builder.push_str(" AS ");
            self.builder.push_identifier(&root.alias);
        }

        for join in joins {
            let target = join.right.entity;
            let left = self.resolve(join.left)?;
            let right = self.resolve(join.right)?;
            self.builder.push(' ');
            self.builder.push_str(join.kind.sql());
            self.builder.push(' ');
            self.builder.push_identifier(target.table());
            if right.alias != target.table() {
                self.builder.push_str(" AS ");
                self.builder.push_identifier(&right.alias);
            }
            self.builder.push_str(" ON ");
            self.builder.push_column(&left.alias, join.left.field);
            self.builder.push_str(" = ");
            self.builder.push_column(&right.alias, join.right.field);
            if let Some(marker) = target.def().marker().filter(|_| live_only) {
                self.builder.push_str(" AND ");
                self.builder.push_column(&right.alias, marker.field);
                self.builder.push_str(" IS NULL");
            }
        }

        if query.filter.contains_aggregate() {
            return Err(CompositionError::AggregateInWhere);
        }
        let live = match query.root.def().marker() {
            Some(marker) if live_only => Predicate::is_null(marker),
            _ => Predicate::True,
        };
        let where_clause = Predicate::and(live, query.filter.clone());
        if !where_clause.is_true() {
            self.builder.push_str(" WHERE ");
            self.write_predicate(&where_clause)?;
        }

        if !query.group_by.is_empty() {
            self.builder.push_str(" GROUP BY ");
            for (i, key) in query.group_by.iter().enumerate() {
                if i > 0 {
                    self.builder.push_str(", ");
                }
                self.write_scalar(key)?;
            }
        }
        if !query.having.is_true() {
            self.builder.push_str(" HAVING ");
            self.write_predicate(&query.having)?;
        }
        Ok(())
    }

    fn write_page(&mut self, page: Pagination) {
        match (page.limit, page.offset) {
            (None, 0) => {}
            (Some(limit), 0) => {
                self.builder.push_str(" LIMIT ");
                self.builder.push_param(SqlValue::from(limit));
            }
            (Some(limit), offset) => {
                self.builder.push_str(" LIMIT ");
                self.builder.push_param(SqlValue::from(limit));
                self.builder.push_str(" OFFSET ");
                self.builder.push_param(SqlValue::from(offset));
            }
            (None, offset) => {
                self.builder.push_str(" LIMIT -1 OFFSET ");
                self.builder.push_param(SqlValue::from(offset));
            }
        }
    }

    fn write_expr(&mut self, expr: &Expr) -> Result<ExprType, CompositionError> {
        match expr {
            Expr::Scalar(scalar) => self.write_scalar(scalar),
            Expr::Aggregate(aggregate) => self.write_aggregate(aggregate),
            Expr::Subquery(query) => {
                self.builder.push('(');
                let column = single_column(self.write_query(query)?)?;
                self.builder.push(')');
                Ok(ExprType {
                    ty: column.ty,
                    nullable: true,
                })
            }
        }
    }

    fn write_scalar(&mut self, scalar: &Scalar) -> Result<ExprType, CompositionError> {
        let col = scalar.col();
        let resolved = self.resolve(col)?;
        let nullable = resolved.field.nullable || resolved.outer;
        match scalar {
            Scalar::Column(_) => {
                self.builder.push_column(&resolved.alias, col.field);
                Ok(ExprType {
                    ty: resolved.field.ty,
                    nullable,
                })
            }
            Scalar::Length(_) => {
                if resolved.field.ty != FieldType::Text {
                    return Err(CompositionError::TypeMismatch {
                        context: format!("LENGTH({col})"),
                        expected: FieldType::Text,
                        actual: resolved.field.ty.to_string(),
                    });
                }
                self.builder.push_str("LENGTH(");
                self.builder.push_column(&resolved.alias, col.field);
                self.builder.push(')');
                Ok(ExprType {
                    ty: FieldType::Integer,
                    nullable,
                })
            }
        }
    }

    fn write_aggregate(&mut self, aggregate: &Aggregate) -> Result<ExprType, CompositionError> {
        let name = aggregate.function_name();
        self.builder.push_str(name);
        self.builder.push('(');
        if let Aggregate::CountDistinct(_) = aggregate {
            self.builder.push_str("DISTINCT ");
        }
        let arg = match aggregate.argument() {
            Some(arg) => Some(self.write_scalar(arg)?),
            None => {
                self.builder.push('*');
                None
            }
        };
        self.builder.push(')');

        let numeric = |arg: Option<ExprType>| match arg {
            Some(arg) if arg.ty == FieldType::Text => Err(CompositionError::TypeMismatch {
                context: format!("{name}()"),
                expected: FieldType::Real,
                actual: FieldType::Text.to_string(),
            }),
            Some(arg) => Ok(arg.ty),
            None => Ok(FieldType::Integer),
        };
        let ty = match aggregate {
            Aggregate::CountAll | Aggregate::Count(_) | Aggregate::CountDistinct(_) => ExprType {
                ty: FieldType::Integer,
                nullable: false,
            },
            Aggregate::Sum(_) => ExprType {
                ty: match numeric(arg)? {
                    FieldType::Real => FieldType::Real,
                    _ => FieldType::Integer,
                },
                nullable: true,
            },
            Aggregate::Avg(_) => {
                numeric(arg)?;
                ExprType {
                    ty: FieldType::Real,
                    nullable: true,
                }
            }
            Aggregate::Min(_) | Aggregate::Max(_) => ExprType {
                ty: arg.map_or(FieldType::Integer, |arg| arg.ty),
                nullable: true,
            },
        };
        Ok(ty)
    }

    fn write_predicate(&mut self, predicate: &Predicate) -> Result<(), CompositionError> {
        match predicate {
            Predicate::True => self.builder.push_str("1 = 1"),
            Predicate::False => self.builder.push_str("1 = 0"),
            Predicate::Compare { lhs, op, rhs } => {
                let lhs_ty = self.write_expr(lhs)?;
                self.builder.push(' ');
                self.builder.push_str(op.sql());
                self.builder.push(' ');
                match rhs {
                    Operand::Value(value) => self.write_value(lhs, lhs_ty, value)?,
                    Operand::Expr(rhs) => {
                        let rhs_ty = self.write_expr(rhs)?;
                        check_compatible(lhs, lhs_ty.ty, rhs_ty.ty)?;
                    }
                }
            }
            Predicate::Between { expr, low, high } => {
                let ty = self.write_expr(expr)?;
                self.builder.push_str(" BETWEEN ");
                self.write_value(expr, ty, low)?;
                self.builder.push_str(" AND ");
                self.write_value(expr, ty, high)?;
            }
            Predicate::IsNull { expr, negated } => {
                self.write_expr(expr)?;
                self.builder
                    .push_str(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Predicate::In {
                expr,
                set,
                negated,
            } => {
                let ty = self.write_expr(expr)?;
                self.builder
                    .push_str(if *negated { " NOT IN (" } else { " IN (" });
                match set {
                    InSet::List(values) => {
                        for (i, value) in values.iter().enumerate() {
                            if i > 0 {
                                self.builder.push_str(", ");
                            }
                            self.write_value(expr, ty, value)?;
                        }
                    }
                    InSet::Query(query) => {
                        let column = single_column(self.write_query(query)?)?;
                        check_compatible(expr, ty.ty, column.ty)?;
                    }
                }
                self.builder.push(')');
            }
            Predicate::Exists { query, negated } => {
                self.builder
                    .push_str(if *negated { "NOT EXISTS (" } else { "EXISTS (" });
                self.write_query(query)?;
                self.builder.push(')');
            }
            Predicate::Like { expr, pattern } => {
                let ty = self.write_expr(expr)?;
                if ty.ty != FieldType::Text {
                    return Err(CompositionError::TypeMismatch {
                        context: format!("LIKE on {}", describe(expr)),
                        expected: FieldType::Text,
                        actual: ty.ty.to_string(),
                    });
                }
                self.builder.push_str(" LIKE ");
                self.write_value(expr, ty, pattern)?;
            }
            Predicate::And(lhs, rhs) => {
                self.write_conjunct(lhs)?;
                self.builder.push_str(" AND ");
                self.write_conjunct(rhs)?;
            }
            Predicate::Or(lhs, rhs) => {
                self.write_predicate(lhs)?;
                self.builder.push_str(" OR ");
                self.write_predicate(rhs)?;
            }
            Predicate::Not(inner) => {
                self.builder.push_str("NOT (");
                self.write_predicate(inner)?;
                self.builder.push(')');
            }
        }
        Ok(())
    }

    fn write_conjunct(&mut self, predicate: &Predicate) -> Result<(), CompositionError> {
        if let Predicate::Or(..) = predicate {
            self.builder.push('(');
            self.write_predicate(predicate)?;
            self.builder.push(')');
            Ok(())
        } else {
            self.write_predicate(predicate)
        }
    }

    fn write_value(
        &mut self,
        lhs: &Expr,
        lhs_ty: ExprType,
        value: &SqlValue,
    ) -> Result<(), CompositionError> {
        match value.field_type() {
            None => Err(CompositionError::NullComparison {
                column: describe(lhs),
            }),
            Some(ty) if !lhs_ty.ty.accepts(ty) => Err(CompositionError::TypeMismatch {
                context: describe(lhs),
                expected: lhs_ty.ty,
                actual: value.kind_name().to_string(),
            }),
            Some(_) => {
                self.builder.push_param(value.clone());
                Ok(())
            }
        }
    }
}

fn validate_items(query: &Query, items: &[SelectItem]) -> Result<(), CompositionError> {
    let mut seen = HashSet::new();
    for item in items {
        validate_alias(&item.alias)?;
        if !seen.insert(item.alias.as_str()) {
            return Err(CompositionError::DuplicateAlias(item.alias.clone()));
        }
    }
    if query.ranking.is_some() && seen.contains(WindowRank::RANK_ALIAS) {
        return Err(CompositionError::DuplicateAlias(
            WindowRank::RANK_ALIAS.to_string(),
        ));
    }

    if !query.having.is_true() && query.group_by.is_empty() {
        return Err(CompositionError::HavingWithoutGrouping);
    }
    let grouped = !query.group_by.is_empty() || items.iter().any(|item| item.expr.is_aggregate());
    if grouped {
        for item in items {
            if let Expr::Scalar(scalar) = &item.expr {
                if !query.group_by.iter().any(|key| key.col() == scalar.col()) {
                    return Err(CompositionError::UngroupedColumn(item.alias.clone()));
                }
            }
        }
    }
    Ok(())
}

fn single_column(mut columns: Vec<OutputColumn>) -> Result<OutputColumn, CompositionError> {
    if columns.len() != 1 {
        return Err(CompositionError::SubqueryArity {
            actual: columns.len(),
        });
    }
    columns
        .pop()
        .ok_or(CompositionError::SubqueryArity { actual: 0 })
}

fn check_compatible(lhs: &Expr, expected: FieldType, actual: FieldType) -> Result<(), CompositionError> {
    if expected.accepts(actual) {
        Ok(())
    } else {
        Err(CompositionError::TypeMismatch {
            context: describe(lhs),
            expected,
            actual: actual.to_string(),
        })
    }
}

fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Scalar(Scalar::Column(col)) => col.to_string(),
        Expr::Scalar(Scalar::Length(col)) => format!("LENGTH({col})"),
        Expr::Aggregate(aggregate) => format!("{}()", aggregate.function_name()),
        Expr::Subquery(query) => format!("subquery over {}", query.root()),
    }
}

#[cfg(test)]
mod tests {
    use super::Query;
    use crate::model::entity::{Entity, FieldType};
    use crate::model::schema::{comments, posts, users};
    use crate::query::clause::{Direction, JoinKind, Pagination, RankFunction, WindowRank};
    use crate::query::expr::{CmpOp, Expr, Predicate};
    use crate::query::value::SqlValue;
    use crate::query::CompositionError;

    #[test]
    fn root_filter_carries_live_predicate() {
        let composed = Query::new(Entity::User)
            .select(users::ID, "id")
            .filter(Predicate::eq(users::USERNAME, "Bret"))
            .compose()
            .unwrap();
        assert_eq!(
            composed.statement.sql,
            r#"SELECT "users"."id" AS "id" FROM "users" WHERE "users"."deleted_at" IS NULL AND "users"."username" = ?1"#
        );
        assert_eq!(composed.statement.params, vec![SqlValue::from("Bret")]);
        assert_eq!(composed.columns[0].ty, FieldType::Integer);
    }

    #[test]
    fn include_deleted_drops_live_predicate() {
        let composed = Query::new(Entity::User)
            .select(users::ID, "id")
            .select(users::DELETED_AT, "deleted_at")
            .include_deleted()
            .compose()
            .unwrap();
        assert_eq!(
            composed.statement.sql,
            r#"SELECT "users"."id" AS "id", "users"."deleted_at" AS "deleted_at" FROM "users""#
        );
        assert!(composed.columns[1].nullable);
    }

    #[test]
    fn outer_join_filters_deleted_rows_in_on_clause() {
        let composed = Query::new(Entity::User)
            .left_join(Entity::User, "posts")
            .select(users::ID, "user_id")
            .select(Expr::count(posts::ID), "post_count")
            .group_by(users::ID)
            .order_by(users::ID, Direction::Asc)
            .compose()
            .unwrap();
        assert_eq!(
            composed.statement.sql,
            concat!(
                r#"SELECT "users"."id" AS "user_id", COUNT("posts"."id") AS "post_count" "#,
                r#"FROM "users" LEFT JOIN "posts" ON "users"."id" = "posts"."user_id" AND "posts"."deleted_at" IS NULL "#,
                r#"WHERE "users"."deleted_at" IS NULL GROUP BY "users"."id" ORDER BY "users"."id" ASC"#
            )
        );
        assert!(!composed.column("post_count").unwrap().nullable);
    }

    #[test]
    fn nested_subquery_uses_depth_suffixed_alias() {
        let composed = Query::new(Entity::User)
            .select(users::ID, "id")
            .filter(Predicate::not_in_query(
                users::ID,
                Query::new(Entity::Post).select(posts::USER_ID, "user_id"),
            ))
            .compose()
            .unwrap();
        assert_eq!(
            composed.statement.sql,
            concat!(
                r#"SELECT "users"."id" AS "id" FROM "users" WHERE "users"."deleted_at" IS NULL AND "users"."id" NOT IN "#,
                r#"(SELECT "posts_1"."user_id" AS "user_id" FROM "posts" AS "posts_1" WHERE "posts_1"."deleted_at" IS NULL)"#
            )
        );
    }

    #[test]
    fn correlated_exists_resolves_outer_scope() {
        let discussion = Query::new(Entity::Comment)
            .join(Entity::Comment, "post")
            .select(comments::ID, "id")
            .filter(Predicate::compare_exprs(posts::USER_ID, CmpOp::Eq, users::ID));
        let composed = Query::new(Entity::User)
            .select(users::ID, "id")
            .filter(Predicate::exists(discussion))
            .compose()
            .unwrap();
        assert!(composed.statement.sql.contains(
            r#"EXISTS (SELECT "comments_1"."id" AS "id" FROM "comments" AS "comments_1" JOIN "posts" AS "posts_1" ON "comments_1"."post_id" = "posts_1"."id" AND "posts_1"."deleted_at" IS NULL"#
        ));
        assert!(composed
            .statement
            .sql
            .ends_with(r#"AND "posts_1"."user_id" = "users"."id")"#));
    }

    #[test]
    fn ranked_query_wraps_window_and_binds_cap() {
        let composed = Query::new(Entity::Post)
            .select(posts::USER_ID, "user_id")
            .select(posts::ID, "post_id")
            .rank_within(
                WindowRank::partition_by(posts::USER_ID)
                    .order_by(posts::ID, Direction::Asc)
                    .keep_top(3),
            )
            .order_by(posts::USER_ID, Direction::Asc)
            .order_by(posts::ID, Direction::Asc)
            .compose()
            .unwrap();
        assert_eq!(
            composed.statement.sql,
            concat!(
                r#"SELECT "ranked"."user_id" AS "user_id", "ranked"."post_id" AS "post_id", "ranked"."rank" AS "rank" "#,
                r#"FROM (SELECT "posts"."user_id" AS "user_id", "posts"."id" AS "post_id", "#,
                r#"ROW_NUMBER() OVER (PARTITION BY "posts"."user_id" ORDER BY "posts"."id" ASC) AS "rank" "#,
                r#"FROM "posts" WHERE "posts"."deleted_at" IS NULL) AS "ranked" "#,
                r#"WHERE "ranked"."rank" <= ?1 ORDER BY "ranked"."user_id" ASC, "ranked"."post_id" ASC"#
            )
        );
        assert_eq!(composed.statement.params, vec![SqlValue::Integer(3)]);
        assert_eq!(composed.columns.len(), 3);
    }

    #[test]
    fn rank_functions_and_multi_column_partitions() {
        let composed = Query::new(Entity::Post)
            .select(posts::ID, "id")
            .select(posts::USER_ID, "user_id")
            .select(posts::TITLE, "title")
            .rank_within(
                WindowRank::partition_by(posts::USER_ID)
                    .and_partition_by(posts::TITLE)
                    .order_by(posts::ID, Direction::Desc)
                    .function(RankFunction::DenseRank)
                    .keep_top(2),
            )
            .order_by(posts::ID, Direction::Asc)
            .compose()
            .unwrap();
        assert!(composed.statement.sql.contains(concat!(
            r#"DENSE_RANK() OVER (PARTITION BY "posts"."user_id", "posts"."title" "#,
            r#"ORDER BY "posts"."id" DESC) AS "rank""#
        )));

        let rank = Query::new(Entity::Post)
            .select(posts::ID, "id")
            .rank_within(
                WindowRank::partition_by(posts::USER_ID)
                    .order_by(posts::TITLE, Direction::Asc)
                    .function(RankFunction::Rank),
            )
            .compose()
            .unwrap();
        assert!(rank.statement.sql.contains(r#"RANK() OVER (PARTITION BY "posts"."user_id""#));
        assert!(!rank.statement.sql.contains("DENSE_RANK"));
    }

    #[test]
    fn ranked_query_requires_projected_order_keys() {
        let err = Query::new(Entity::Post)
            .select(posts::ID, "post_id")
            .rank_within(WindowRank::partition_by(posts::USER_ID).keep_top(1))
            .order_by(posts::TITLE, Direction::Asc)
            .compose()
            .unwrap_err();
        assert!(matches!(err, CompositionError::UnprojectedOrderKey(_)));
    }

    #[test]
    fn pagination_binds_limit_then_offset() {
        let composed = Query::new(Entity::User)
            .select(users::ID, "id")
            .filter(Predicate::gt(users::ID, 0))
            .order_by(users::ID, Direction::Asc)
            .paginate(Pagination::new(2, 2))
            .compose()
            .unwrap();
        assert!(composed
            .statement
            .sql
            .ends_with(r#"ORDER BY "users"."id" ASC LIMIT ?2 OFFSET ?3"#));
        assert_eq!(
            composed.statement.params,
            vec![SqlValue::Integer(0), SqlValue::Integer(2), SqlValue::Integer(2)]
        );

        let offset_only = Query::new(Entity::User).offset(5).compose().unwrap();
        assert!(offset_only.statement.sql.ends_with("LIMIT -1 OFFSET ?1"));
    }

    #[test]
    fn composition_is_deterministic() {
        let query = Query::new(Entity::Post)
            .left_join(Entity::Post, "comments")
            .select(posts::ID, "id")
            .select(Expr::count(comments::ID), "comment_count")
            .filter(Predicate::in_list(posts::USER_ID, [1, 2, 3]))
            .group_by(posts::ID);
        assert_eq!(query.compose().unwrap(), query.compose().unwrap());
    }

    #[test]
    fn rejects_undeclared_relationship() {
        let err = Query::new(Entity::User)
            .join(Entity::User, "comments")
            .compose()
            .unwrap_err();
        assert!(matches!(
            err,
            CompositionError::UndeclaredRelationship { entity: Entity::User, .. }
        ));
    }

    #[test]
    fn rejects_column_outside_joined_set() {
        let err = Query::new(Entity::User)
            .select(posts::TITLE, "title")
            .compose()
            .unwrap_err();
        assert!(matches!(err, CompositionError::ColumnNotInScope { .. }));
    }

    #[test]
    fn rejects_in_subquery_type_mismatch() {
        let err = Query::new(Entity::User)
            .filter(Predicate::in_query(
                users::ID,
                Query::new(Entity::Post).select(posts::TITLE, "title"),
            ))
            .compose()
            .unwrap_err();
        assert!(matches!(err, CompositionError::TypeMismatch { .. }));

        let err = Query::new(Entity::User)
            .filter(Predicate::in_query(users::ID, Query::new(Entity::Post)))
            .compose()
            .unwrap_err();
        assert!(matches!(err, CompositionError::SubqueryArity { actual: 5 }));
    }

    #[test]
    fn rejects_misplaced_aggregates_and_grouping() {
        let err = Query::new(Entity::User)
            .select(users::NAME, "name")
            .select(Expr::count_all(), "total")
            .compose()
            .unwrap_err();
        assert_eq!(err, CompositionError::UngroupedColumn("name".to_string()));

        let err = Query::new(Entity::Post)
            .filter(Predicate::gt(Expr::count_all(), 1))
            .compose()
            .unwrap_err();
        assert_eq!(err, CompositionError::AggregateInWhere);

        let err = Query::new(Entity::Post)
            .select(Expr::count_all(), "total")
            .having(Predicate::gt(Expr::count_all(), 1))
            .compose()
            .unwrap_err();
        assert_eq!(err, CompositionError::HavingWithoutGrouping);
    }

    #[test]
    fn rejects_bad_values_and_aliases() {
        let err = Query::new(Entity::User)
            .filter(Predicate::gt(users::ID, SqlValue::Null))
            .compose()
            .unwrap_err();
        assert!(matches!(err, CompositionError::NullComparison { .. }));

        let err = Query::new(Entity::User)
            .filter(Predicate::eq(users::ID, "one"))
            .compose()
            .unwrap_err();
        assert!(matches!(err, CompositionError::TypeMismatch { .. }));

        let err = Query::new(Entity::User)
            .select(users::ID, "id; DROP TABLE users")
            .compose()
            .unwrap_err();
        assert!(matches!(err, CompositionError::InvalidAlias(_)));

        let err = Query::new(Entity::User)
            .join_on(JoinKind::Inner, users::EMAIL, comments::EMAIL)
            .join_on(JoinKind::Inner, users::EMAIL, comments::NAME)
            .compose()
            .unwrap_err();
        assert_eq!(err, CompositionError::DuplicateEntity(Entity::Comment));
    }
}
