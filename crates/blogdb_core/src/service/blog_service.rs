//! Multi-entity write use-cases.
//!
//! # Responsibility
//! - Run every multi-statement write as one coordinated unit.
//! - Thread generated keys from parent inserts into child foreign keys.
//!
//! # Invariants
//! - Each use-case is all-or-nothing: any failure leaves the store as it was.
//! - Values are validated inside the unit, so a validation failure also aborts
//!   it before anything later is written.

use crate::error::{DataError, DataResult};
use crate::model::entity::Entity;
use crate::model::records::{NewAddress, NewComment, NewCompany, NewPost, NewRecord, NewUser};
use crate::model::schema::{comments, posts, users};
use crate::query::{Predicate, Query, SoftDelete};
use crate::repo::now_epoch_ms;
use crate::store::{CallContext, Store};
use crate::tx::{run_in_transaction, TransactionCoordinator};
use log::info;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// User plus optional 1:1 relations, inserted together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user: NewUser,
    #[serde(default)]
    pub address: Option<NewAddress>,
    #[serde(default)]
    pub company: Option<NewCompany>,
}

impl UserProfile {
    pub fn new(user: NewUser) -> Self {
        Self {
            user,
            address: None,
            company: None,
        }
    }

    pub fn with_address(self, address: NewAddress) -> Self {
        Self {
            address: Some(address),
            ..self
        }
    }

    pub fn with_company(self, company: NewCompany) -> Self {
        Self {
            company: Some(company),
            ..self
        }
    }
}

/// Post plus the comments published with it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDraft {
    pub post: NewPost,
    #[serde(default)]
    pub comments: Vec<NewComment>,
}

/// Keys generated by [`BlogService::publish_post`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishedPost {
    pub post_id: i64,
    pub comment_ids: Vec<i64>,
}

/// Row counts marked Deleted by [`BlogService::retire_user`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetireSummary {
    pub posts: usize,
    pub comments: usize,
}

pub struct BlogService<'s, S: Store + ?Sized> {
    store: &'s S,
}

impl<'s, S: Store + ?Sized> BlogService<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Inserts user, address and company in one unit; returns the user id.
    pub fn register_user(&self, ctx: &CallContext, profile: &UserProfile) -> DataResult<i64> {
        let started_at = Instant::now();
        let user_id =
            run_in_transaction(self.store, ctx, |unit| insert_profile(unit, profile))?;
        info!(
            "event=register_user module=service status=ok user_id={user_id} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(user_id)
    }

    /// Inserts every profile or none of them; ids keep input order.
    pub fn import_users(&self, ctx: &CallContext, profiles: &[UserProfile]) -> DataResult<Vec<i64>> {
        let started_at = Instant::now();
        let ids = run_in_transaction(self.store, ctx, |unit| {
            profiles
                .iter()
                .map(|profile| insert_profile(unit, profile))
                .collect::<DataResult<Vec<_>>>()
        })?;
        info!(
            "event=import_users module=service status=ok users={} duration_ms={}",
            ids.len(),
            started_at.elapsed().as_millis()
        );
        Ok(ids)
    }

    /// Inserts a post and its comments in one unit.
    pub fn publish_post(&self, ctx: &CallContext, draft: &PostDraft) -> DataResult<PublishedPost> {
        run_in_transaction(self.store, ctx, |unit| insert_draft(unit, draft))
    }

    /// Publishes many drafts in one unit.
    pub fn publish_posts(
        &self,
        ctx: &CallContext,
        drafts: &[PostDraft],
    ) -> DataResult<Vec<PublishedPost>> {
        run_in_transaction(self.store, ctx, |unit| {
            drafts
                .iter()
                .map(|draft| insert_draft(unit, draft))
                .collect::<DataResult<Vec<_>>>()
        })
    }

    /// Soft-deletes a user with every Live post and comment beneath it.
    ///
    /// An absent or already Deleted user aborts the unit with `NotFound`.
    pub fn retire_user(&self, ctx: &CallContext, user_id: i64) -> DataResult<RetireSummary> {
        let deleted_at = now_epoch_ms();
        let summary = run_in_transaction(self.store, ctx, |unit| {
            let authored = Query::new(Entity::Post)
                .select(posts::ID, "id")
                .filter(Predicate::eq(posts::USER_ID, user_id));
            let deleted_comments = unit.execute(
                SoftDelete::new(Entity::Comment, deleted_at)
                    .filter(Predicate::in_query(comments::POST_ID, authored)),
            )?;
            let deleted_posts = unit.execute(
                SoftDelete::new(Entity::Post, deleted_at)
                    .filter(Predicate::eq(posts::USER_ID, user_id)),
            )?;
            let user = unit.execute(
                SoftDelete::new(Entity::User, deleted_at).filter(Predicate::eq(users::ID, user_id)),
            )?;
            if user.rows_affected == 0 {
                return Err(unit.fail(DataError::not_found(Entity::User, user_id)));
            }
            Ok(RetireSummary {
                posts: deleted_posts.rows_affected,
                comments: deleted_comments.rows_affected,
            })
        })?;
        info!(
            "event=retire_user module=service status=ok user_id={user_id} posts={} comments={}",
            summary.posts, summary.comments
        );
        Ok(summary)
    }
}

fn insert_validated<S, V>(unit: &mut TransactionCoordinator<'_, S>, value: &V) -> DataResult<i64>
where
    S: Store + ?Sized,
    V: NewRecord,
{
    if let Err(err) = value.validate() {
        return Err(unit.fail(err.into()));
    }
    let outcome = unit.execute(value.to_insert())?;
    Ok(outcome.generated_key.unwrap_or_default())
}

fn insert_profile<S: Store + ?Sized>(
    unit: &mut TransactionCoordinator<'_, S>,
    profile: &UserProfile,
) -> DataResult<i64> {
    let user_id = insert_validated(unit, &profile.user)?;
    if let Some(address) = &profile.address {
        insert_validated(unit, &address.clone().with_user_id(user_id))?;
    }
    if let Some(company) = &profile.company {
        insert_validated(unit, &company.clone().with_user_id(user_id))?;
    }
    Ok(user_id)
}

fn insert_draft<S: Store + ?Sized>(
    unit: &mut TransactionCoordinator<'_, S>,
    draft: &PostDraft,
) -> DataResult<PublishedPost> {
    let post_id = insert_validated(unit, &draft.post)?;
    let comment_ids = draft
        .comments
        .iter()
        .map(|comment| insert_validated(unit, &comment.clone().with_post_id(post_id)))
        .collect::<DataResult<Vec<_>>>()?;
    Ok(PublishedPost {
        post_id,
        comment_ids,
    })
}
