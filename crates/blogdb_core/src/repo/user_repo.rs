//! User reads with preloaded relations.
//!
//! # Invariants
//! - Address and company are 1:1 outer joins: a missing row projects as a
//!   zero-valued record, never as an error or a skipped user.
//! - Posts are a 1:N outer join folded into a nested collection.

use super::{fetch_rows, EntityRepository};
use crate::error::{DataError, DataResult};
use crate::model::entity::{Col, Entity};
use crate::model::records::{
    require_email, require_text, Address, Company, Post, User, ValidationError,
};
use crate::model::schema::{posts, users};
use crate::project::{group_by_parent, project_at_most_one, FromRow, ProjectionResult, RowView};
use crate::query::{Direction, Pagination, Predicate, Query, SqlValue};
use crate::store::{CallContext, Store};
use serde::Serialize;

/// User with 1:1 relations, zero-filled when absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserDetails {
    pub user: User,
    pub address: Address,
    pub company: Company,
}

impl UserDetails {
    fn query() -> Query {
        Query::new(Entity::User)
            .left_join(Entity::User, "address")
            .left_join(Entity::User, "company")
            .select_all(Entity::User, "")
            .select_all(Entity::Address, "address_")
            .select_all(Entity::Company, "company_")
    }

    pub fn has_address(&self) -> bool {
        self.address.id != 0
    }

    pub fn has_company(&self) -> bool {
        self.company.id != 0
    }
}

impl FromRow for UserDetails {
    fn from_row(row: RowView<'_>) -> ProjectionResult<Self> {
        Ok(Self {
            user: User::from_row(row)?,
            address: Address::from_row(row.scoped("address_").into_outer())?,
            company: Company::from_row(row.scoped("company_").into_outer())?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserWithPosts {
    pub user: User,
    pub posts: Vec<Post>,
}

/// Partial profile update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
}

impl UserChanges {
    fn into_assignments(self) -> Result<Vec<(Col, SqlValue)>, ValidationError> {
        if let Some(name) = &self.name {
            require_text(Entity::User, "name", name)?;
        }
        if let Some(username) = &self.username {
            require_text(Entity::User, "username", username)?;
        }
        if let Some(email) = &self.email {
            require_email(Entity::User, "email", email)?;
        }

        let fields = [
            (users::NAME, self.name),
            (users::USERNAME, self.username),
            (users::EMAIL, self.email),
            (users::PHONE, self.phone),
            (users::WEBSITE, self.website),
        ];
        Ok(fields
            .into_iter()
            .filter_map(|(col, value)| value.map(|value| (col, SqlValue::Text(value))))
            .collect())
    }
}

pub struct UserRepository<'s, S: Store + ?Sized> {
    store: &'s S,
    users: EntityRepository<'s, S, User>,
}

impl<'s, S: Store + ?Sized> UserRepository<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            users: EntityRepository::new(store),
        }
    }

    pub fn users(&self) -> &EntityRepository<'s, S, User> {
        &self.users
    }

    pub fn get(&self, ctx: &CallContext, id: i64) -> DataResult<User> {
        self.users.get(ctx, id)
    }

    pub fn list(&self, ctx: &CallContext, page: Pagination) -> DataResult<Vec<User>> {
        self.users.list(ctx, Predicate::True, page)
    }

    pub fn find_by_username(&self, ctx: &CallContext, username: &str) -> DataResult<User> {
        self.users
            .find_first(ctx, Predicate::eq(users::USERNAME, username))
            .map_err(|err| match err {
                DataError::NotFound { entity, .. } => DataError::not_found(entity, username),
                other => other,
            })
    }

    /// Live user with address and company preloaded.
    pub fn get_details(&self, ctx: &CallContext, id: i64) -> DataResult<UserDetails> {
        let query = UserDetails::query().filter(Predicate::eq(users::ID, id));
        let rows = fetch_rows(self.store, ctx, &query)?;
        project_at_most_one(&rows)?.ok_or_else(|| DataError::not_found(Entity::User, id))
    }

    pub fn list_details(&self, ctx: &CallContext, page: Pagination) -> DataResult<Vec<UserDetails>> {
        let query = UserDetails::query()
            .order_by(users::ID, Direction::Asc)
            .paginate(page);
        super::fetch(self.store, ctx, &query)
    }

    pub fn get_with_posts(&self, ctx: &CallContext, id: i64) -> DataResult<UserWithPosts> {
        self.with_posts(ctx, Predicate::eq(users::ID, id))?
            .into_iter()
            .next()
            .ok_or_else(|| DataError::not_found(Entity::User, id))
    }

    /// Every Live user with Live posts ordered by id; users without posts get
    /// an empty list.
    pub fn list_with_posts(&self, ctx: &CallContext) -> DataResult<Vec<UserWithPosts>> {
        self.with_posts(ctx, Predicate::True)
    }

    fn with_posts(&self, ctx: &CallContext, filter: Predicate) -> DataResult<Vec<UserWithPosts>> {
        let query = Query::new(Entity::User)
            .left_join(Entity::User, "posts")
            .select_all(Entity::User, "")
            .select_all(Entity::Post, "post_")
            .filter(filter)
            .order_by(users::ID, Direction::Asc)
            .order_by(posts::ID, Direction::Asc);
        let rows = fetch_rows(self.store, ctx, &query)?;
        let grouped = group_by_parent::<User, Post>(&rows, "id", "post_", "id")?;
        Ok(grouped
            .into_iter()
            .map(|(user, posts)| UserWithPosts { user, posts })
            .collect())
    }

    pub fn update_user(&self, ctx: &CallContext, id: i64, changes: UserChanges) -> DataResult<()> {
        let assignments = changes.into_assignments()?;
        self.users.update_by_id(ctx, id, assignments)
    }
}
