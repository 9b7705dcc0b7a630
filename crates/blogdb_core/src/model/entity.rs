//! Entity and relationship metadata.
//!
//! # Responsibility
//! - Declare per-entity field lists, primary keys, relationships and the
//!   soft-delete capability.
//! - Answer relationship lookups for the composer and projector.
//!
//! # Invariants
//! - Metadata is static and never mutated at runtime.
//! - Soft-delete is an explicit capability on the entity declaration, never a
//!   naming convention detected by the store.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use super::schema;

/// Every entity modeled by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    User,
    Address,
    Company,
    Post,
    Comment,
}

impl Entity {
    /// All entities in dependency order (parents first).
    pub const ALL: [Entity; 5] = [
        Entity::User,
        Entity::Address,
        Entity::Company,
        Entity::Post,
        Entity::Comment,
    ];

    /// Returns the static declaration for this entity.
    pub fn def(self) -> &'static EntityDef {
        schema::entity_def(self)
    }

    /// Physical table name.
    pub fn table(self) -> &'static str {
        self.def().table
    }

    /// Lower-case singular name used in logs and error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Address => "address",
            Self::Company => "company",
            Self::Post => "post",
            Self::Comment => "comment",
        }
    }
}

impl Display for Entity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Semantic column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Integer,
    Real,
    Text,
    /// Unix epoch milliseconds, stored as an integer.
    Timestamp,
}

impl FieldType {
    /// Whether values of `other` may be compared with or stored into `self`.
    ///
    /// Integers, reals and timestamps share numeric storage; text only
    /// matches text.
    pub fn accepts(self, other: FieldType) -> bool {
        match (self, other) {
            (Self::Text, Self::Text) => true,
            (Self::Text, _) | (_, Self::Text) => false,
            _ => true,
        }
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Text => "text",
            Self::Timestamp => "timestamp",
        };
        f.write_str(value)
    }
}

/// One declared column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub ty: FieldType,
    pub nullable: bool,
}

impl FieldDef {
    pub const fn required(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            nullable: false,
        }
    }

    pub const fn nullable(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            nullable: true,
        }
    }
}

/// Relationship multiplicity seen from the declaring entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// At most one related row (`user -> address`).
    OneToOne,
    /// Zero or more related rows (`user -> posts`).
    OneToMany,
    /// Exactly one parent row (`post -> author`).
    ManyToOne,
}

impl Cardinality {
    /// Whether joining through this relationship can multiply outer rows.
    pub fn fans_out(self) -> bool {
        matches!(self, Self::OneToMany)
    }
}

/// A declared foreign-key relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relationship {
    pub name: &'static str,
    pub from: Entity,
    pub to: Entity,
    pub cardinality: Cardinality,
    /// Join key on the declaring entity.
    pub from_key: &'static str,
    /// Join key on the related entity.
    pub to_key: &'static str,
}

impl Relationship {
    /// Join key pair as typed column references.
    pub fn key_pair(&self) -> (Col, Col) {
        (
            Col::new(self.from, self.from_key),
            Col::new(self.to, self.to_key),
        )
    }
}

/// Soft-delete capability marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftDelete {
    /// Nullable timestamp column; NULL means live.
    pub marker: &'static str,
}

/// Static declaration of one entity.
#[derive(Debug)]
pub struct EntityDef {
    pub entity: Entity,
    pub table: &'static str,
    pub primary_key: &'static str,
    pub fields: &'static [FieldDef],
    pub relationships: &'static [Relationship],
    pub soft_delete: Option<SoftDelete>,
}

impl EntityDef {
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Looks up a relationship by its declared name.
    pub fn relationship(&self, name: &str) -> Option<&'static Relationship> {
        self.relationships.iter().find(|rel| rel.name == name)
    }

    /// Looks up the first relationship pointing at `target`.
    pub fn relationship_to(&self, target: Entity) -> Option<&'static Relationship> {
        self.relationships.iter().find(|rel| rel.to == target)
    }

    pub fn is_soft_deletable(&self) -> bool {
        self.soft_delete.is_some()
    }

    /// Soft-delete marker column, when the entity carries the capability.
    pub fn marker(&self) -> Option<Col> {
        self.soft_delete
            .map(|soft_delete| Col::new(self.entity, soft_delete.marker))
    }

    pub fn primary_key_col(&self) -> Col {
        Col::new(self.entity, self.primary_key)
    }
}

/// A typed reference to one column of one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Col {
    pub entity: Entity,
    pub field: &'static str,
}

impl Col {
    pub const fn new(entity: Entity, field: &'static str) -> Self {
        Self { entity, field }
    }

    /// Field declaration, if `field` exists on `entity`.
    pub fn def(&self) -> Option<&'static FieldDef> {
        self.entity.def().field(self.field)
    }
}

impl Display for Col {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.entity.table(), self.field)
    }
}

#[cfg(test)]
mod tests {
    use super::{Cardinality, Entity, FieldType};

    #[test]
    fn relationship_lookup_reports_cardinality() {
        let user = Entity::User.def();
        assert_eq!(
            user.relationship("address").map(|rel| rel.cardinality),
            Some(Cardinality::OneToOne)
        );
        assert_eq!(
            user.relationship_to(Entity::Post).map(|rel| rel.cardinality),
            Some(Cardinality::OneToMany)
        );
        assert!(user.relationship("comments").is_none());
        assert!(Entity::Comment.def().relationship("post").is_some());
    }

    #[test]
    fn only_one_to_many_fans_out() {
        let user = Entity::User.def();
        let fan_out = |name: &str| user.relationship(name).map(|rel| rel.cardinality.fans_out());
        assert_eq!(fan_out("posts"), Some(true));
        assert_eq!(fan_out("address"), Some(false));
        assert_eq!(fan_out("company"), Some(false));
        assert!(!Cardinality::ManyToOne.fans_out());
    }

    #[test]
    fn soft_delete_capability_is_explicit() {
        assert!(Entity::User.def().is_soft_deletable());
        assert!(Entity::Post.def().is_soft_deletable());
        assert!(Entity::Comment.def().is_soft_deletable());
        assert!(!Entity::Address.def().is_soft_deletable());
        assert!(!Entity::Company.def().is_soft_deletable());
    }

    #[test]
    fn numeric_types_are_mutually_comparable() {
        assert!(FieldType::Integer.accepts(FieldType::Real));
        assert!(FieldType::Timestamp.accepts(FieldType::Integer));
        assert!(!FieldType::Text.accepts(FieldType::Integer));
        assert!(!FieldType::Integer.accepts(FieldType::Text));
    }
}
