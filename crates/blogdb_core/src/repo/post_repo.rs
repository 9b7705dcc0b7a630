//! Post reads scoped to an author, and posts with their discussion.

use super::{fetch, fetch_rows, EntityRepository};
use crate::error::{DataError, DataResult};
use crate::model::entity::Entity;
use crate::model::records::{Comment, Post};
use crate::model::schema::{comments, posts};
use crate::project::group_by_parent;
use crate::query::{Direction, Pagination, Predicate, Query};
use crate::store::{CallContext, Store};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PostWithComments {
    pub post: Post,
    pub comments: Vec<Comment>,
}

pub struct PostRepository<'s, S: Store + ?Sized> {
    store: &'s S,
    posts: EntityRepository<'s, S, Post>,
}

impl<'s, S: Store + ?Sized> PostRepository<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            posts: EntityRepository::new(store),
        }
    }

    pub fn posts(&self) -> &EntityRepository<'s, S, Post> {
        &self.posts
    }

    /// Live posts of one author in id order.
    pub fn list_for_user(
        &self,
        ctx: &CallContext,
        user_id: i64,
        page: Pagination,
    ) -> DataResult<Vec<Post>> {
        self.posts
            .list(ctx, Predicate::eq(posts::USER_ID, user_id), page)
    }

    /// Live comments of one post in id order.
    pub fn comments_for_post(&self, ctx: &CallContext, post_id: i64) -> DataResult<Vec<Comment>> {
        let query = Query::new(Entity::Comment)
            .select_all(Entity::Comment, "")
            .filter(Predicate::eq(comments::POST_ID, post_id))
            .order_by(comments::ID, Direction::Asc);
        fetch(self.store, ctx, &query)
    }

    /// Live post with its Live comments; a post without comments has an
    /// empty list.
    pub fn get_with_comments(&self, ctx: &CallContext, id: i64) -> DataResult<PostWithComments> {
        let query = Query::new(Entity::Post)
            .left_join(Entity::Post, "comments")
            .select_all(Entity::Post, "")
            .select_all(Entity::Comment, "comment_")
            .filter(Predicate::eq(posts::ID, id))
            .order_by(comments::ID, Direction::Asc);
        let rows = fetch_rows(self.store, ctx, &query)?;
        group_by_parent::<Post, Comment>(&rows, "id", "comment_", "id")?
            .into_iter()
            .next()
            .map(|(post, comments)| PostWithComments { post, comments })
            .ok_or_else(|| DataError::not_found(Entity::Post, id))
    }
}
