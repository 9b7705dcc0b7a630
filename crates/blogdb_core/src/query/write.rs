//! Write statements: insert, update and soft delete.
//!
//! # Invariants
//! - Values are checked against declared field types and nullability.
//! - Updates only touch Live rows of soft-deletable entities.
//! - The soft-delete marker is written by [`SoftDelete`] only.

use super::compose::{field_of, Composer};
use super::expr::Predicate;
use super::value::SqlValue;
use super::{CompositionError, Statement, StatementKind};
use crate::model::entity::{Col, Entity, FieldDef};
use std::collections::HashSet;

fn check_value(col: Col, field: &FieldDef, value: &SqlValue) -> Result<(), CompositionError> {
    match value.field_type() {
        None if field.nullable => Ok(()),
        None => Err(CompositionError::MissingField {
            entity: col.entity,
            field: col.field.to_string(),
        }),
        Some(ty) if field.ty.accepts(ty) => Ok(()),
        Some(_) => Err(CompositionError::TypeMismatch {
            context: col.to_string(),
            expected: field.ty,
            actual: value.kind_name().to_string(),
        }),
    }
}

fn check_assignments(entity: Entity, values: &[(Col, SqlValue)]) -> Result<(), CompositionError> {
    let marker = entity.def().marker();
    let mut seen = HashSet::new();
    for (col, value) in values {
        if col.entity != entity {
            return Err(CompositionError::ColumnNotInScope {
                column: col.to_string(),
            });
        }
        let field = field_of(*col)?;
        if Some(*col) == marker {
            return Err(CompositionError::MarkerWrite(entity));
        }
        if !seen.insert(col.field) {
            return Err(CompositionError::DuplicateField {
                entity,
                field: col.field.to_string(),
            });
        }
        check_value(*col, field, value)?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    entity: Entity,
    values: Vec<(Col, SqlValue)>,
}

impl Insert {
    pub fn new(entity: Entity) -> Self {
        Self {
            entity,
            values: Vec::new(),
        }
    }

    pub fn value(mut self, col: Col, value: impl Into<SqlValue>) -> Self {
        self.values.push((col, value.into()));
        self
    }

    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// Every required field except the primary key must be supplied.
    pub fn compose(&self) -> Result<Statement, CompositionError> {
        let def = self.entity.def();
        check_assignments(self.entity, &self.values)?;
        for field in def.fields {
            let required = !field.nullable && field.name != def.primary_key;
            if required && !self.values.iter().any(|(col, _)| col.field == field.name) {
                return Err(CompositionError::MissingField {
                    entity: self.entity,
                    field: field.name.to_string(),
                });
            }
        }

        let mut composer = Composer::for_table(self.entity);
        let builder = composer.builder_mut();
        builder.push_str("INSERT INTO ");
        builder.push_identifier(def.table);
        builder.push_str(" (");
        builder.push_iter(&self.values, ", ", |builder, (col, _)| {
            builder.push_identifier(col.field);
            Ok::<(), CompositionError>(())
        })?;
        builder.push_str(") VALUES (");
        builder.push_iter(&self.values, ", ", |builder, (_, value)| {
            builder.push_param(value.clone());
            Ok::<(), CompositionError>(())
        })?;
        builder.push(')');

        let (sql, params) = composer.finish();
        Ok(Statement::new(sql, params, StatementKind::Insert))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    entity: Entity,
    sets: Vec<(Col, SqlValue)>,
    filter: Predicate,
}

impl Update {
    pub fn new(entity: Entity) -> Self {
        Self {
            entity,
            sets: Vec::new(),
            filter: Predicate::True,
        }
    }

    pub fn set(mut self, col: Col, value: impl Into<SqlValue>) -> Self {
        self.sets.push((col, value.into()));
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Predicate::and(std::mem::take(&mut self.filter), predicate);
        self
    }

    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn compose(&self) -> Result<Statement, CompositionError> {
        if self.sets.is_empty() {
            return Err(CompositionError::EmptyUpdate(self.entity));
        }
        check_assignments(self.entity, &self.sets)?;

        let def = self.entity.def();
        let mut composer = Composer::for_table(self.entity);
        let builder = composer.builder_mut();
        builder.push_str("UPDATE ");
        builder.push_identifier(def.table);
        builder.push_str(" SET ");
        builder.push_iter(&self.sets, ", ", |builder, (col, value)| {
            builder.push_identifier(col.field);
            builder.push_str(" = ");
            builder.push_param(value.clone());
            Ok::<(), CompositionError>(())
        })?;

        let live = def
            .marker()
            .map_or(Predicate::True, |marker| Predicate::is_null(marker));
        composer.push_where(&Predicate::and(live, self.filter.clone()))?;

        let (sql, params) = composer.finish();
        Ok(Statement::new(sql, params, StatementKind::Update))
    }
}

/// Live to Deleted transition: stamps the marker on matching Live rows.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftDelete {
    entity: Entity,
    deleted_at_ms: i64,
    filter: Predicate,
}

impl SoftDelete {
    pub fn new(entity: Entity, deleted_at_ms: i64) -> Self {
        Self {
            entity,
            deleted_at_ms,
            filter: Predicate::True,
        }
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Predicate::and(std::mem::take(&mut self.filter), predicate);
        self
    }

    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn compose(&self) -> Result<Statement, CompositionError> {
        let def = self.entity.def();
        let marker = def
            .marker()
            .ok_or(CompositionError::NotSoftDeletable(self.entity))?;

        let mut composer = Composer::for_table(self.entity);
        let builder = composer.builder_mut();
        builder.push_str("UPDATE ");
        builder.push_identifier(def.table);
        builder.push_str(" SET ");
        builder.push_identifier(marker.field);
        builder.push_str(" = ");
        builder.push_param(SqlValue::Integer(self.deleted_at_ms));
        composer.push_where(&Predicate::and(
            Predicate::is_null(marker),
            self.filter.clone(),
        ))?;

        let (sql, params) = composer.finish();
        Ok(Statement::new(sql, params, StatementKind::SoftDelete))
    }
}

/// Any statement a transaction unit can submit.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    Insert(Insert),
    Update(Update),
    SoftDelete(SoftDelete),
}

impl Write {
    pub fn entity(&self) -> Entity {
        match self {
            Self::Insert(insert) => insert.entity(),
            Self::Update(update) => update.entity(),
            Self::SoftDelete(delete) => delete.entity(),
        }
    }

    pub fn compose(&self) -> Result<Statement, CompositionError> {
        match self {
            Self::Insert(insert) => insert.compose(),
            Self::Update(update) => update.compose(),
            Self::SoftDelete(delete) => delete.compose(),
        }
    }
}

impl From<Insert> for Write {
    fn from(value: Insert) -> Self {
        Self::Insert(value)
    }
}

impl From<Update> for Write {
    fn from(value: Update) -> Self {
        Self::Update(value)
    }
}

impl From<SoftDelete> for Write {
    fn from(value: SoftDelete) -> Self {
        Self::SoftDelete(value)
    }
}
