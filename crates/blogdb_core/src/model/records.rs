//! Entity records and validated insert values.
//!
//! # Responsibility
//! - Define the typed read shape of every entity.
//! - Validate `New*` values before they are turned into inserts.
//!
//! # Invariants
//! - `deleted_at` is `None` for Live rows; point lookups in default
//!   visibility never return a Deleted row.
//! - Foreign keys of `New*` values are positive row ids.

use super::entity::Entity;
use super::schema::{addresses, comments, companies, posts, users};
use crate::project::{FromRow, ProjectionResult, RowView};
use crate::query::write::Insert;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{entity}.{field} must not be empty")]
    EmptyField { entity: Entity, field: &'static str },
    #[error("{entity}.{field} is not a valid email: `{value}`")]
    InvalidEmail {
        entity: Entity,
        field: &'static str,
        value: String,
    },
    #[error("{entity}.{field} must reference an existing row")]
    InvalidKey { entity: Entity, field: &'static str },
}

pub(crate) fn require_text(
    entity: Entity,
    field: &'static str,
    value: &str,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField { entity, field });
    }
    Ok(())
}

pub(crate) fn require_email(
    entity: Entity,
    field: &'static str,
    value: &str,
) -> Result<(), ValidationError> {
    if !EMAIL_RE.is_match(value) {
        return Err(ValidationError::InvalidEmail {
            entity,
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn require_key(entity: Entity, field: &'static str, value: i64) -> Result<(), ValidationError> {
    if value <= 0 {
        return Err(ValidationError::InvalidKey { entity, field });
    }
    Ok(())
}

/// Typed read shape of one entity row.
pub trait Record: FromRow {
    const ENTITY: Entity;

    /// Insert value creating rows of this record.
    type New: NewRecord;

    fn id(&self) -> i64;
}

/// Validated insert value for one entity.
pub trait NewRecord {
    const ENTITY: Entity;

    fn validate(&self) -> Result<(), ValidationError>;

    fn to_insert(&self) -> Insert;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub website: String,
    pub deleted_at: Option<i64>,
}

impl User {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl FromRow for User {
    fn from_row(row: RowView<'_>) -> ProjectionResult<Self> {
        Ok(Self {
            id: row.i64("id")?,
            name: row.text("name")?,
            username: row.text("username")?,
            email: row.text("email")?,
            phone: row.text("phone")?,
            website: row.text("website")?,
            deleted_at: row.opt_i64("deleted_at")?,
        })
    }
}

impl Record for User {
    const ENTITY: Entity = Entity::User;
    type New = NewUser;

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub id: i64,
    pub user_id: i64,
    pub street: String,
    pub suite: String,
    pub city: String,
    pub zipcode: String,
    pub lat: String,
    pub lng: String,
}

impl FromRow for Address {
    fn from_row(row: RowView<'_>) -> ProjectionResult<Self> {
        Ok(Self {
            id: row.i64("id")?,
            user_id: row.i64("user_id")?,
            street: row.text("street")?,
            suite: row.text("suite")?,
            city: row.text("city")?,
            zipcode: row.text("zipcode")?,
            lat: row.text("lat")?,
            lng: row.text("lng")?,
        })
    }
}

impl Record for Address {
    const ENTITY: Entity = Entity::Address;
    type New = NewAddress;

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub catch_phrase: String,
    pub bs: String,
}

impl FromRow for Company {
    fn from_row(row: RowView<'_>) -> ProjectionResult<Self> {
        Ok(Self {
            id: row.i64("id")?,
            user_id: row.i64("user_id")?,
            name: row.text("name")?,
            catch_phrase: row.text("catch_phrase")?,
            bs: row.text("bs")?,
        })
    }
}

impl Record for Company {
    const ENTITY: Entity = Entity::Company;
    type New = NewCompany;

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub body: String,
    pub deleted_at: Option<i64>,
}

impl FromRow for Post {
    fn from_row(row: RowView<'_>) -> ProjectionResult<Self> {
        Ok(Self {
            id: row.i64("id")?,
            user_id: row.i64("user_id")?,
            title: row.text("title")?,
            body: row.text("body")?,
            deleted_at: row.opt_i64("deleted_at")?,
        })
    }
}

impl Record for Post {
    const ENTITY: Entity = Entity::Post;
    type New = NewPost;

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub name: String,
    pub email: String,
    pub body: String,
    pub deleted_at: Option<i64>,
}

impl FromRow for Comment {
    fn from_row(row: RowView<'_>) -> ProjectionResult<Self> {
        Ok(Self {
            id: row.i64("id")?,
            post_id: row.i64("post_id")?,
            name: row.text("name")?,
            email: row.text("email")?,
            body: row.text("body")?,
            deleted_at: row.opt_i64("deleted_at")?,
        })
    }
}

impl Record for Comment {
    const ENTITY: Entity = Entity::Comment;
    type New = NewComment;

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub website: String,
}

impl NewRecord for NewUser {
    const ENTITY: Entity = Entity::User;

    fn validate(&self) -> Result<(), ValidationError> {
        require_text(Self::ENTITY, "name", &self.name)?;
        require_text(Self::ENTITY, "username", &self.username)?;
        require_email(Self::ENTITY, "email", &self.email)
    }

    fn to_insert(&self) -> Insert {
        Insert::new(Self::ENTITY)
            .value(users::NAME, &self.name)
            .value(users::USERNAME, &self.username)
            .value(users::EMAIL, &self.email)
            .value(users::PHONE, &self.phone)
            .value(users::WEBSITE, &self.website)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewAddress {
    pub user_id: i64,
    pub street: String,
    pub suite: String,
    pub city: String,
    pub zipcode: String,
    pub lat: String,
    pub lng: String,
}

impl NewAddress {
    pub fn with_user_id(self, user_id: i64) -> Self {
        Self { user_id, ..self }
    }
}

impl NewRecord for NewAddress {
    const ENTITY: Entity = Entity::Address;

    fn validate(&self) -> Result<(), ValidationError> {
        require_key(Self::ENTITY, "user_id", self.user_id)
    }

    fn to_insert(&self) -> Insert {
        Insert::new(Self::ENTITY)
            .value(addresses::USER_ID, self.user_id)
            .value(addresses::STREET, &self.street)
            .value(addresses::SUITE, &self.suite)
            .value(addresses::CITY, &self.city)
            .value(addresses::ZIPCODE, &self.zipcode)
            .value(addresses::LAT, &self.lat)
            .value(addresses::LNG, &self.lng)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewCompany {
    pub user_id: i64,
    pub name: String,
    pub catch_phrase: String,
    pub bs: String,
}

impl NewCompany {
    pub fn with_user_id(self, user_id: i64) -> Self {
        Self { user_id, ..self }
    }
}

impl NewRecord for NewCompany {
    const ENTITY: Entity = Entity::Company;

    fn validate(&self) -> Result<(), ValidationError> {
        require_key(Self::ENTITY, "user_id", self.user_id)?;
        require_text(Self::ENTITY, "name", &self.name)
    }

    fn to_insert(&self) -> Insert {
        Insert::new(Self::ENTITY)
            .value(companies::USER_ID, self.user_id)
            .value(companies::NAME, &self.name)
            .value(companies::CATCH_PHRASE, &self.catch_phrase)
            .value(companies::BS, &self.bs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    #[serde(default)]
    pub user_id: i64,
    pub title: String,
    pub body: String,
}

impl NewPost {
    pub fn with_user_id(self, user_id: i64) -> Self {
        Self { user_id, ..self }
    }
}

impl NewRecord for NewPost {
    const ENTITY: Entity = Entity::Post;

    fn validate(&self) -> Result<(), ValidationError> {
        require_key(Self::ENTITY, "user_id", self.user_id)?;
        require_text(Self::ENTITY, "title", &self.title)
    }

    fn to_insert(&self) -> Insert {
        Insert::new(Self::ENTITY)
            .value(posts::USER_ID, self.user_id)
            .value(posts::TITLE, &self.title)
            .value(posts::BODY, &self.body)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    #[serde(default)]
    pub post_id: i64,
    pub name: String,
    pub email: String,
    pub body: String,
}

impl NewComment {
    pub fn with_post_id(self, post_id: i64) -> Self {
        Self { post_id, ..self }
    }
}

impl NewRecord for NewComment {
    const ENTITY: Entity = Entity::Comment;

    fn validate(&self) -> Result<(), ValidationError> {
        require_key(Self::ENTITY, "post_id", self.post_id)?;
        require_text(Self::ENTITY, "name", &self.name)?;
        require_email(Self::ENTITY, "email", &self.email)
    }

    fn to_insert(&self) -> Insert {
        Insert::new(Self::ENTITY)
            .value(comments::POST_ID, self.post_id)
            .value(comments::NAME, &self.name)
            .value(comments::EMAIL, &self.email)
            .value(comments::BODY, &self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::{NewComment, NewRecord, NewUser, ValidationError};
    use crate::model::entity::Entity;

    fn user() -> NewUser {
        NewUser {
            name: "Leanne Graham".to_string(),
            username: "Bret".to_string(),
            email: "Sincere@april.biz".to_string(),
            phone: "1-770-736-8031 x56442".to_string(),
            website: "hildegard.org".to_string(),
        }
    }

    #[test]
    fn new_user_requires_username_and_email() {
        assert!(user().validate().is_ok());

        let mut blank = user();
        blank.username = "  ".to_string();
        assert_eq!(
            blank.validate().unwrap_err(),
            ValidationError::EmptyField {
                entity: Entity::User,
                field: "username"
            }
        );

        let mut bad_email = user();
        bad_email.email = "not-an-email".to_string();
        assert!(matches!(
            bad_email.validate(),
            Err(ValidationError::InvalidEmail { .. })
        ));
    }

    #[test]
    fn child_values_need_parent_keys() {
        let comment = NewComment {
            post_id: 0,
            name: "id labore ex et quam laborum".to_string(),
            email: "Eliseo@gardner.biz".to_string(),
            body: "laudantium enim quasi".to_string(),
        };
        assert!(matches!(
            comment.validate(),
            Err(ValidationError::InvalidKey { field: "post_id", .. })
        ));
        assert!(comment.with_post_id(1).validate().is_ok());
    }

    #[test]
    fn insert_carries_every_field() {
        let statement = user().to_insert().compose().unwrap();
        assert_eq!(statement.params.len(), 5);
    }
}
