mod common;

use blogdb_core::reports::{
    compose_report, raw_top_posts_per_user, EmailMatchedCommenters, PostBodyStatsReport,
    PostCommentCounts, PostCountsPerUser, ProlificAuthors, RankedPost, TopPostsPerUser,
    UserDirectory, UsersWithDiscussion, UsersWithoutPosts,
};
use blogdb_core::model::schema::posts;
use blogdb_core::project::ProjectionResult;
use blogdb_core::query::RankFunction;
use blogdb_core::repo::now_epoch_ms;
use blogdb_core::{
    BlogService, CallContext, Direction, Entity, EntityRepository, FromRow, NewAddress, Post,
    Query, Report, ReportRunner, RowView, User, UserProfile, WindowRank,
};
use common::{add_comment, add_post, add_post_with_id, add_user, new_user, store};

fn delete_post(store: &blogdb_core::SqliteStore, id: i64) {
    EntityRepository::<_, Post>::new(store)
        .soft_delete(&CallContext::new(), id, now_epoch_ms())
        .unwrap();
}

#[test]
fn top_posts_keeps_first_three_per_author() {
    let store = store();
    let ctx = CallContext::new();
    let prolific = add_user(&store, "Bret");
    let quiet = add_user(&store, "Antonette");
    for id in 10..15 {
        add_post_with_id(&store, id, prolific);
    }
    add_post_with_id(&store, 20, quiet);

    let rows = ReportRunner::new(&store)
        .run(&ctx, &TopPostsPerUser::default())
        .unwrap();
    let picked = rows
        .iter()
        .map(|row| (row.user_id, row.id, row.rank))
        .collect::<Vec<_>>();
    assert_eq!(
        picked,
        vec![
            (prolific, 10, 1),
            (prolific, 11, 2),
            (prolific, 12, 3),
            (quiet, 20, 1),
        ]
    );
}

#[test]
fn top_posts_ranks_live_posts_only() {
    let store = store();
    let ctx = CallContext::new();
    let author = add_user(&store, "Bret");
    for id in 10..15 {
        add_post_with_id(&store, id, author);
    }
    delete_post(&store, 10);

    let ids = ReportRunner::new(&store)
        .run(&ctx, &TopPostsPerUser { per_user: 2 })
        .unwrap()
        .into_iter()
        .map(|row| row.id)
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![11, 12]);
}

#[test]
fn raw_rendition_matches_composed_report() {
    let store = store();
    let ctx = CallContext::new();
    let first = add_user(&store, "Bret");
    let second = add_user(&store, "Antonette");
    for id in 1..6 {
        add_post_with_id(&store, id, if id % 2 == 0 { first } else { second });
    }
    delete_post(&store, 3);

    let runner = ReportRunner::new(&store);
    let composed = runner.run(&ctx, &TopPostsPerUser { per_user: 2 }).unwrap();
    let raw: Vec<RankedPost> = runner.run_raw(&ctx, raw_top_posts_per_user(2)).unwrap();
    assert_eq!(composed, raw);
    assert!(compose_report(&TopPostsPerUser::default())
        .unwrap()
        .contains("ROW_NUMBER() OVER"));
}

#[test]
fn users_without_posts_excludes_every_author() {
    let store = store();
    let ctx = CallContext::new();
    let first = add_user(&store, "Bret");
    let second = add_user(&store, "Antonette");
    let third = add_user(&store, "Samantha");
    add_post(&store, first, "one");
    add_post(&store, first, "two");
    add_post(&store, second, "three");

    let ids = ReportRunner::new(&store)
        .run(&ctx, &UsersWithoutPosts)
        .unwrap()
        .into_iter()
        .map(|row| row.id)
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![third]);
}

#[test]
fn author_whose_posts_are_deleted_counts_as_without_posts() {
    let store = store();
    let ctx = CallContext::new();
    let author = add_user(&store, "Bret");
    let post = add_post(&store, author, "gone");
    delete_post(&store, post);

    let rows = ReportRunner::new(&store)
        .run(&ctx, &UsersWithoutPosts)
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].username, "Bret");
}

#[test]
fn post_counts_include_users_without_posts() {
    let store = store();
    let ctx = CallContext::new();
    let author = add_user(&store, "Bret");
    let idle = add_user(&store, "Antonette");
    add_post(&store, author, "one");
    add_post(&store, author, "two");
    let deleted = add_post(&store, author, "three");
    delete_post(&store, deleted);

    let counts = ReportRunner::new(&store)
        .run(&ctx, &PostCountsPerUser)
        .unwrap()
        .into_iter()
        .map(|row| (row.user_id, row.post_count))
        .collect::<Vec<_>>();
    assert_eq!(counts, vec![(author, 2), (idle, 0)]);

    let prolific = ReportRunner::new(&store)
        .run(&ctx, &ProlificAuthors { min_posts: 2 })
        .unwrap();
    assert_eq!(prolific.len(), 1);
    assert_eq!(prolific[0].user_id, author);
    assert!(ReportRunner::new(&store)
        .run(&ctx, &ProlificAuthors { min_posts: 3 })
        .unwrap()
        .is_empty());
}

#[test]
fn user_directory_reads_missing_company_as_empty() {
    let store = store();
    let ctx = CallContext::new();
    let profile = UserProfile::new(new_user("Bret")).with_address(NewAddress {
        user_id: 0,
        street: "Kulas Light".to_string(),
        suite: "Apt. 556".to_string(),
        city: "Gwenborough".to_string(),
        zipcode: "92998-3874".to_string(),
        lat: "-37.3159".to_string(),
        lng: "81.1496".to_string(),
    });
    let with_address = BlogService::new(&store)
        .register_user(&ctx, &profile)
        .unwrap();
    let bare = add_user(&store, "Antonette");

    let entries = ReportRunner::new(&store)
        .run(&ctx, &UserDirectory::default())
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].user_id, with_address);
    assert_eq!(entries[0].city, "Gwenborough");
    assert_eq!(entries[0].company_name, "");
    assert_eq!(entries[1].user_id, bare);
    assert_eq!(entries[1].city, "");

    let single = ReportRunner::new(&store)
        .run(&ctx, &UserDirectory { user_id: Some(bare) })
        .unwrap();
    assert_eq!(single.len(), 1);
    assert_eq!(single[0].username, "Antonette");
}

#[test]
fn email_matched_commenters_join_on_email() {
    let store = store();
    let ctx = CallContext::new();
    let author = add_user(&store, "Bret");
    let reader = add_user(&store, "Antonette");
    let post = add_post(&store, author, "hello");
    let matched = add_comment(&store, post, "antonette@example.org");
    add_comment(&store, post, "stranger@example.org");

    let rows = ReportRunner::new(&store)
        .run(&ctx, &EmailMatchedCommenters)
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].user_id, reader);
    assert_eq!(rows[0].comment_id, matched);
    assert_eq!(rows[0].post_id, post);
}

#[test]
fn users_with_discussion_need_a_live_comment() {
    let store = store();
    let ctx = CallContext::new();
    let discussed = add_user(&store, "Bret");
    let ignored = add_user(&store, "Antonette");
    let post = add_post(&store, discussed, "popular");
    add_post(&store, ignored, "lonely");
    add_comment(&store, post, "reader@example.org");

    let rows = ReportRunner::new(&store)
        .run(&ctx, &UsersWithDiscussion)
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, discussed);
}

#[test]
fn body_stats_average_is_real() {
    let store = store();
    let ctx = CallContext::new();
    let empty = ReportRunner::new(&store)
        .run(&ctx, &PostBodyStatsReport)
        .unwrap();
    assert_eq!(empty.len(), 1);
    assert_eq!(empty[0].post_count, 0);
    assert_eq!(empty[0].avg_body_length, 0.0);
    assert_eq!(empty[0].min_body_length, None);

    let author = add_user(&store, "Bret");
    // Bodies are "{title} body": 7 and 8 characters.
    add_post(&store, author, "ab");
    add_post(&store, author, "abc");

    let stats = ReportRunner::new(&store)
        .run(&ctx, &PostBodyStatsReport)
        .unwrap();
    assert_eq!(stats[0].post_count, 2);
    assert!((stats[0].avg_body_length - 7.5).abs() < f64::EPSILON);
    assert_eq!(stats[0].min_body_length, Some(7));
}

#[test]
fn post_comment_counts_skip_deleted_comments() {
    let store = store();
    let ctx = CallContext::new();
    let author = add_user(&store, "Bret");
    let busy = add_post(&store, author, "busy");
    let quiet = add_post(&store, author, "quiet");
    add_comment(&store, busy, "a@example.org");
    let removed = add_comment(&store, busy, "b@example.org");
    EntityRepository::<_, blogdb_core::Comment>::new(&store)
        .soft_delete(&ctx, removed, now_epoch_ms())
        .unwrap();

    let counts = ReportRunner::new(&store)
        .run(&ctx, &PostCommentCounts)
        .unwrap()
        .into_iter()
        .map(|row| (row.post_id, row.comment_count))
        .collect::<Vec<_>>();
    assert_eq!(counts, vec![(busy, 1), (quiet, 0)]);
}

#[test]
fn reports_hide_deleted_users() {
    let store = store();
    let ctx = CallContext::new();
    let gone = add_user(&store, "Bret");
    add_user(&store, "Antonette");
    EntityRepository::<_, User>::new(&store)
        .soft_delete(&ctx, gone, now_epoch_ms())
        .unwrap();

    let counts = ReportRunner::new(&store)
        .run(&ctx, &PostCountsPerUser)
        .unwrap();
    assert_eq!(counts.len(), 1);
    assert_eq!(counts[0].username, "Antonette");
}

#[test]
fn report_rows_serialize_with_field_names() {
    let store = store();
    let ctx = CallContext::new();
    add_user(&store, "Bret");

    let rows = ReportRunner::new(&store)
        .run(&ctx, &UsersWithoutPosts)
        .unwrap();
    let json = serde_json::to_value(&rows[0]).unwrap();
    assert_eq!(json["username"], "Bret");
    assert_eq!(json["email"], "bret@example.org");
}

#[test]
fn prolific_threshold_zero_keeps_users_without_posts() {
    let store = store();
    let ctx = CallContext::new();
    let idle = add_user(&store, "Bret");

    let rows = ReportRunner::new(&store)
        .run(&ctx, &ProlificAuthors { min_posts: 0 })
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].user_id, idle);
    assert_eq!(rows[0].post_count, 0);
    assert!(ReportRunner::new(&store)
        .run(&ctx, &ProlificAuthors { min_posts: 1 })
        .unwrap()
        .is_empty());
}

/// Posts ranked by title inside each partition.
struct TitleRanks {
    window: WindowRank,
}

#[derive(Debug, PartialEq, Eq)]
struct TitleRank {
    id: i64,
    rank: i64,
}

impl FromRow for TitleRank {
    fn from_row(row: RowView<'_>) -> ProjectionResult<Self> {
        Ok(Self {
            id: row.i64("id")?,
            rank: row.i64("rank")?,
        })
    }
}

impl Report for TitleRanks {
    type Row = TitleRank;

    const NAME: &'static str = "title_ranks";

    fn query(&self) -> Query {
        Query::new(Entity::Post)
            .select(posts::ID, "id")
            .select(posts::USER_ID, "user_id")
            .select(posts::TITLE, "title")
            .rank_within(self.window.clone())
            .order_by(posts::USER_ID, Direction::Asc)
            .order_by(posts::TITLE, Direction::Asc)
            .order_by(posts::ID, Direction::Asc)
    }
}

fn title_ranks(store: &blogdb_core::SqliteStore, window: WindowRank) -> Vec<(i64, i64)> {
    ReportRunner::new(store)
        .run(&CallContext::new(), &TitleRanks { window })
        .unwrap()
        .into_iter()
        .map(|row| (row.id, row.rank))
        .collect()
}

fn by_title(function: RankFunction) -> WindowRank {
    WindowRank::partition_by(posts::USER_ID)
        .order_by(posts::TITLE, Direction::Asc)
        .function(function)
}

#[test]
fn tied_keys_rank_by_function() {
    let store = store();
    let author = add_user(&store, "Bret");
    let first = add_post(&store, author, "alpha");
    let second = add_post(&store, author, "alpha");
    let third = add_post(&store, author, "beta");

    assert_eq!(
        title_ranks(&store, by_title(RankFunction::Rank)),
        vec![(first, 1), (second, 1), (third, 3)]
    );
    assert_eq!(
        title_ranks(&store, by_title(RankFunction::DenseRank)),
        vec![(first, 1), (second, 1), (third, 2)]
    );
    assert_eq!(
        title_ranks(&store, by_title(RankFunction::Rank).keep_top(2)),
        vec![(first, 1), (second, 1)]
    );
    assert_eq!(
        title_ranks(&store, by_title(RankFunction::DenseRank).keep_top(2)),
        vec![(first, 1), (second, 1), (third, 2)]
    );
}

#[test]
fn two_column_partition_restarts_per_group() {
    let store = store();
    let first_author = add_user(&store, "Bret");
    let second_author = add_user(&store, "Antonette");
    let a1 = add_post(&store, first_author, "alpha");
    let a2 = add_post(&store, first_author, "alpha");
    let b1 = add_post(&store, first_author, "beta");
    let c1 = add_post(&store, second_author, "alpha");

    let window = WindowRank::partition_by(posts::USER_ID)
        .and_partition_by(posts::TITLE)
        .order_by(posts::ID, Direction::Asc);
    assert_eq!(
        title_ranks(&store, window.clone()),
        vec![(a1, 1), (a2, 2), (b1, 1), (c1, 1)]
    );
    assert_eq!(
        title_ranks(&store, window.keep_top(1)),
        vec![(a1, 1), (b1, 1), (c1, 1)]
    );
}
