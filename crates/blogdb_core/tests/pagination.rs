mod common;

use blogdb_core::reports::{PostCountsPerUser, TopPostsPerUser};
use blogdb_core::{CallContext, Pagination, Predicate, ReportRunner, UserRepository};
use common::{add_post_with_id, add_user, store};

fn seeded_users(store: &blogdb_core::SqliteStore) -> Vec<i64> {
    ["Bret", "Antonette", "Samantha", "Karianne", "Kamren"]
        .into_iter()
        .map(|name| add_user(store, name))
        .collect()
}

#[test]
fn limit_and_offset_select_a_window() {
    let store = store();
    let ctx = CallContext::new();
    let ids = seeded_users(&store);

    let page = UserRepository::new(&store)
        .list(&ctx, Pagination::new(2, 2))
        .unwrap();
    assert_eq!(
        page.iter().map(|user| user.id).collect::<Vec<_>>(),
        vec![ids[2], ids[3]]
    );
}

#[test]
fn offset_without_limit_returns_the_tail() {
    let store = store();
    let ctx = CallContext::new();
    let ids = seeded_users(&store);

    let tail = UserRepository::new(&store)
        .list(
            &ctx,
            Pagination {
                limit: None,
                offset: 3,
            },
        )
        .unwrap();
    assert_eq!(
        tail.iter().map(|user| user.id).collect::<Vec<_>>(),
        vec![ids[3], ids[4]]
    );
}

#[test]
fn page_past_the_end_is_empty() {
    let store = store();
    let ctx = CallContext::new();
    seeded_users(&store);

    let page = UserRepository::new(&store)
        .list(&ctx, Pagination::new(10, 5))
        .unwrap();
    assert!(page.is_empty());
    let zero = UserRepository::new(&store)
        .list(&ctx, Pagination::new(0, 0))
        .unwrap();
    assert!(zero.is_empty());
}

#[test]
fn pages_concatenate_to_the_full_listing() {
    let store = store();
    let ctx = CallContext::new();
    let ids = seeded_users(&store);
    let repo = UserRepository::new(&store);

    let mut collected = Vec::new();
    for offset in (0..6).step_by(2) {
        let page = repo.list(&ctx, Pagination::new(2, offset)).unwrap();
        collected.extend(page.into_iter().map(|user| user.id));
    }
    assert_eq!(collected, ids);
    assert_eq!(repo.users().count(&ctx, Predicate::True).unwrap(), 5);
}

#[test]
fn report_pages_apply_after_the_report_order() {
    let store = store();
    let ctx = CallContext::new();
    let ids = seeded_users(&store);
    let runner = ReportRunner::new(&store);

    let page = runner
        .run_page(&ctx, &PostCountsPerUser, Pagination::new(2, 1))
        .unwrap();
    assert_eq!(
        page.iter().map(|row| row.user_id).collect::<Vec<_>>(),
        vec![ids[1], ids[2]]
    );
}

#[test]
fn ranked_report_pages_over_the_filtered_set() {
    let store = store();
    let ctx = CallContext::new();
    let author = add_user(&store, "Bret");
    for id in 1..6 {
        add_post_with_id(&store, id, author);
    }
    let page = ReportRunner::new(&store)
        .run_page(&ctx, &TopPostsPerUser { per_user: 4 }, Pagination::new(2, 2))
        .unwrap();
    assert_eq!(
        page.iter().map(|row| row.id).collect::<Vec<_>>(),
        vec![3, 4]
    );
}
