//! Report declarations and their row records.

use super::Report;
use crate::model::entity::Entity;
use crate::model::schema::{addresses, comments, companies, posts, users};
use crate::project::{FromRow, ProjectionResult, RowView};
use crate::query::{Direction, Expr, JoinKind, Predicate, Query, Scalar, WindowRank};
use serde::Serialize;

/// Live post count of every Live user, zero included.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostCountsPerUser;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserPostCount {
    pub user_id: i64,
    pub username: String,
    pub post_count: i64,
}

impl FromRow for UserPostCount {
    fn from_row(row: RowView<'_>) -> ProjectionResult<Self> {
        Ok(Self {
            user_id: row.i64("user_id")?,
            username: row.text("username")?,
            post_count: row.i64("post_count")?,
        })
    }
}

fn post_counts(kind: JoinKind) -> Query {
    Query::new(Entity::User)
        .join_on(kind, users::ID, posts::USER_ID)
        .select(users::ID, "user_id")
        .select(users::USERNAME, "username")
        .select(Expr::count(posts::ID), "post_count")
        .group_by(users::ID)
        .group_by(users::USERNAME)
        .order_by(users::ID, Direction::Asc)
}

impl Report for PostCountsPerUser {
    type Row = UserPostCount;

    const NAME: &'static str = "post_counts_per_user";

    fn query(&self) -> Query {
        post_counts(JoinKind::LeftOuter)
    }
}

/// Users with at least `min_posts` Live posts.
#[derive(Debug, Clone, Copy)]
pub struct ProlificAuthors {
    pub min_posts: u32,
}

impl Report for ProlificAuthors {
    type Row = UserPostCount;

    const NAME: &'static str = "prolific_authors";

    fn query(&self) -> Query {
        post_counts(JoinKind::LeftOuter).having(Predicate::ge(
            Expr::count(posts::ID),
            i64::from(self.min_posts),
        ))
    }
}

/// First `per_user` posts of every author by ascending id.
#[derive(Debug, Clone, Copy)]
pub struct TopPostsPerUser {
    pub per_user: u32,
}

impl Default for TopPostsPerUser {
    fn default() -> Self {
        Self { per_user: 3 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RankedPost {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub rank: i64,
}

impl FromRow for RankedPost {
    fn from_row(row: RowView<'_>) -> ProjectionResult<Self> {
        Ok(Self {
            id: row.i64("id")?,
            user_id: row.i64("user_id")?,
            title: row.text("title")?,
            rank: row.i64("rank")?,
        })
    }
}

impl Report for TopPostsPerUser {
    type Row = RankedPost;

    const NAME: &'static str = "top_posts_per_user";

    fn query(&self) -> Query {
        Query::new(Entity::Post)
            .select(posts::ID, "id")
            .select(posts::USER_ID, "user_id")
            .select(posts::TITLE, "title")
            .rank_within(
                WindowRank::partition_by(posts::USER_ID)
                    .order_by(posts::ID, Direction::Asc)
                    .keep_top(self.per_user),
            )
            .order_by(posts::USER_ID, Direction::Asc)
            .order_by(posts::ID, Direction::Asc)
    }
}

/// Comments whose author email equals a user's email.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmailMatchedCommenters;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommenterMatch {
    pub user_id: i64,
    pub username: String,
    pub comment_id: i64,
    pub post_id: i64,
    pub email: String,
}

impl FromRow for CommenterMatch {
    fn from_row(row: RowView<'_>) -> ProjectionResult<Self> {
        Ok(Self {
            user_id: row.i64("user_id")?,
            username: row.text("username")?,
            comment_id: row.i64("comment_id")?,
            post_id: row.i64("post_id")?,
            email: row.text("email")?,
        })
    }
}

impl Report for EmailMatchedCommenters {
    type Row = CommenterMatch;

    const NAME: &'static str = "email_matched_commenters";

    fn query(&self) -> Query {
        Query::new(Entity::User)
            .join_on(JoinKind::Inner, users::EMAIL, comments::EMAIL)
            .select(users::ID, "user_id")
            .select(users::USERNAME, "username")
            .select(comments::ID, "comment_id")
            .select(comments::POST_ID, "post_id")
            .select(comments::EMAIL, "email")
            .order_by(users::ID, Direction::Asc)
            .order_by(comments::ID, Direction::Asc)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl FromRow for UserSummary {
    fn from_row(row: RowView<'_>) -> ProjectionResult<Self> {
        Ok(Self {
            id: row.i64("id")?,
            username: row.text("username")?,
            email: row.text("email")?,
        })
    }
}

fn user_summaries(filter: Predicate) -> Query {
    Query::new(Entity::User)
        .select(users::ID, "id")
        .select(users::USERNAME, "username")
        .select(users::EMAIL, "email")
        .filter(filter)
        .order_by(users::ID, Direction::Asc)
}

/// Live users without any Live post.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsersWithoutPosts;

impl Report for UsersWithoutPosts {
    type Row = UserSummary;

    const NAME: &'static str = "users_without_posts";

    fn query(&self) -> Query {
        let authors = Query::new(Entity::Post).select(posts::USER_ID, "user_id");
        user_summaries(Predicate::not_in_query(users::ID, authors))
    }
}

/// Live users with at least one Live comment on one of their Live posts.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsersWithDiscussion;

impl Report for UsersWithDiscussion {
    type Row = UserSummary;

    const NAME: &'static str = "users_with_discussion";

    fn query(&self) -> Query {
        let discussed = Query::new(Entity::Post)
            .join(Entity::Post, "comments")
            .select(posts::ID, "id")
            .filter(Predicate::columns_eq(posts::USER_ID, users::ID));
        user_summaries(Predicate::exists(discussed))
    }
}

/// Flat user listing with city and company name; absent relations read
/// as empty text.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserDirectory {
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub user_id: i64,
    pub name: String,
    pub username: String,
    pub email: String,
    pub city: String,
    pub company_name: String,
}

impl FromRow for DirectoryEntry {
    fn from_row(row: RowView<'_>) -> ProjectionResult<Self> {
        let outer = row.into_outer();
        Ok(Self {
            user_id: row.i64("user_id")?,
            name: row.text("name")?,
            username: row.text("username")?,
            email: row.text("email")?,
            city: outer.text("city")?,
            company_name: outer.text("company_name")?,
        })
    }
}

impl Report for UserDirectory {
    type Row = DirectoryEntry;

    const NAME: &'static str = "user_directory";

    fn query(&self) -> Query {
        let query = Query::new(Entity::User)
            .left_join(Entity::User, "address")
            .left_join(Entity::User, "company")
            .select(users::ID, "user_id")
            .select(users::NAME, "name")
            .select(users::USERNAME, "username")
            .select(users::EMAIL, "email")
            .select(addresses::CITY, "city")
            .select(companies::NAME, "company_name")
            .order_by(users::ID, Direction::Asc);
        match self.user_id {
            Some(id) => query.filter(Predicate::eq(users::ID, id)),
            None => query,
        }
    }
}

/// Live post count with average and shortest body length.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostBodyStatsReport;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PostBodyStats {
    pub post_count: i64,
    pub avg_body_length: f64,
    pub min_body_length: Option<i64>,
}

impl FromRow for PostBodyStats {
    fn from_row(row: RowView<'_>) -> ProjectionResult<Self> {
        Ok(Self {
            post_count: row.i64("post_count")?,
            avg_body_length: row.f64_or_zero("avg_body_length")?,
            min_body_length: row.opt_i64("min_body_length")?,
        })
    }
}

impl Report for PostBodyStatsReport {
    type Row = PostBodyStats;

    const NAME: &'static str = "post_body_stats";

    fn query(&self) -> Query {
        Query::new(Entity::Post)
            .select(Expr::count_all(), "post_count")
            .select(Expr::avg(Scalar::length(posts::BODY)), "avg_body_length")
            .select(Expr::min(Scalar::length(posts::BODY)), "min_body_length")
    }
}

/// Every Live post with its Live comment count.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostCommentCounts;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PostCommentCount {
    pub post_id: i64,
    pub title: String,
    pub comment_count: i64,
}

impl FromRow for PostCommentCount {
    fn from_row(row: RowView<'_>) -> ProjectionResult<Self> {
        Ok(Self {
            post_id: row.i64("post_id")?,
            title: row.text("title")?,
            comment_count: row.i64_or_zero("comment_count")?,
        })
    }
}

impl Report for PostCommentCounts {
    type Row = PostCommentCount;

    const NAME: &'static str = "post_comment_counts";

    fn query(&self) -> Query {
        let count = Query::new(Entity::Comment)
            .select(Expr::count_all(), "comment_count")
            .filter(Predicate::columns_eq(comments::POST_ID, posts::ID));
        Query::new(Entity::Post)
            .select(posts::ID, "post_id")
            .select(posts::TITLE, "title")
            .select(Expr::subquery(count), "comment_count")
            .order_by(posts::ID, Direction::Asc)
    }
}
