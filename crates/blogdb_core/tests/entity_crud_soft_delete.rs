mod common;

use blogdb_core::model::schema::{posts, users};
use blogdb_core::{
    CallContext, DataError, EntityRepository, NewAddress, NewCompany, Pagination, Post,
    PostRepository, Predicate, SqlValue, User, UserRepository, ValidationError, Visibility,
};
use blogdb_core::repo::UserChanges;
use blogdb_core::service::UserProfile;
use blogdb_core::BlogService;
use common::{add_comment, add_post, add_user, new_user, store};

#[test]
fn create_and_get_roundtrip() {
    let store = store();
    let ctx = CallContext::new();
    let repo = EntityRepository::<_, User>::new(&store);

    let id = repo.create(&ctx, &new_user("Bret")).unwrap();
    let loaded = repo.get(&ctx, id).unwrap();
    assert_eq!(loaded.id, id);
    assert_eq!(loaded.username, "Bret");
    assert_eq!(loaded.email, "bret@example.org");
    assert_eq!(loaded.deleted_at, None);
}

#[test]
fn invalid_values_never_reach_the_store() {
    let store = store();
    let ctx = CallContext::new();
    let repo = EntityRepository::<_, User>::new(&store);

    let mut user = new_user("Antonette");
    user.email = "not-an-email".to_string();
    let err = repo.create(&ctx, &user).unwrap_err();
    assert!(matches!(
        err,
        DataError::Validation(ValidationError::InvalidEmail { .. })
    ));
    assert_eq!(common::row_count(&store, "users"), 0);
}

#[test]
fn duplicate_username_is_a_unique_violation() {
    let store = store();
    let ctx = CallContext::new();
    let repo = EntityRepository::<_, User>::new(&store);

    repo.create(&ctx, &new_user("Samantha")).unwrap();
    let err = repo.create(&ctx, &new_user("Samantha")).unwrap_err();
    assert!(err.is_constraint_violation());
}

#[test]
fn missing_parent_is_a_foreign_key_violation() {
    let store = store();
    let ctx = CallContext::new();
    let post = blogdb_core::NewPost {
        user_id: 42,
        title: "orphan".to_string(),
        body: String::new(),
    };
    let err = EntityRepository::<_, Post>::new(&store)
        .create(&ctx, &post)
        .unwrap_err();
    assert!(err.is_constraint_violation());
}

#[test]
fn soft_deleted_row_reads_as_not_found_by_default() {
    let store = store();
    let ctx = CallContext::new();
    let repo = EntityRepository::<_, User>::new(&store);
    let id = add_user(&store, "Karianne");

    repo.soft_delete(&ctx, id, 1_700_000_000_000).unwrap();

    let err = repo.get(&ctx, id).unwrap_err();
    assert!(err.is_not_found());

    let deleted = repo.get_with(&ctx, id, Visibility::IncludeDeleted).unwrap();
    assert_eq!(deleted.deleted_at, Some(1_700_000_000_000));
    assert!(deleted.is_deleted());

    assert_eq!(common::row_count(&store, "users"), 1);
}

#[test]
fn deleting_twice_is_not_found() {
    let store = store();
    let ctx = CallContext::new();
    let repo = EntityRepository::<_, User>::new(&store);
    let id = add_user(&store, "Kamren");

    repo.soft_delete(&ctx, id, 1).unwrap();
    assert!(repo.soft_delete(&ctx, id, 2).unwrap_err().is_not_found());
    assert_eq!(
        repo.get_with(&ctx, id, Visibility::IncludeDeleted)
            .unwrap()
            .deleted_at,
        Some(1)
    );
}

#[test]
fn list_and_count_exclude_deleted_rows() {
    let store = store();
    let ctx = CallContext::new();
    let repo = EntityRepository::<_, User>::new(&store);
    let first = add_user(&store, "Leopoldo");
    let second = add_user(&store, "Elwyn");
    repo.soft_delete(&ctx, first, 5).unwrap();

    let live = repo.list(&ctx, Predicate::True, Pagination::default()).unwrap();
    assert_eq!(live.iter().map(|user| user.id).collect::<Vec<_>>(), vec![second]);
    assert_eq!(repo.count(&ctx, Predicate::True).unwrap(), 1);
    assert_eq!(
        repo.count_with(&ctx, Predicate::True, Visibility::IncludeDeleted)
            .unwrap(),
        2
    );
    assert!(repo
        .list(&ctx, Predicate::eq(users::USERNAME, "nobody"), Pagination::default())
        .unwrap()
        .is_empty());
}

#[test]
fn update_by_id_changes_only_live_rows() {
    let store = store();
    let ctx = CallContext::new();
    let repo = EntityRepository::<_, User>::new(&store);
    let id = add_user(&store, "Maxime");

    repo.update_by_id(
        &ctx,
        id,
        [(users::WEBSITE, SqlValue::from("conrad.com"))],
    )
    .unwrap();
    assert_eq!(repo.get(&ctx, id).unwrap().website, "conrad.com");

    repo.soft_delete(&ctx, id, 9).unwrap();
    let err = repo
        .update_by_id(&ctx, id, [(users::WEBSITE, SqlValue::from("x.org"))])
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn update_user_validates_changes() {
    let store = store();
    let ctx = CallContext::new();
    let users_repo = UserRepository::new(&store);
    let id = add_user(&store, "Delphine");

    let err = users_repo
        .update_user(
            &ctx,
            id,
            UserChanges {
                email: Some("broken".to_string()),
                ..UserChanges::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, DataError::Validation(_)));

    users_repo
        .update_user(
            &ctx,
            id,
            UserChanges {
                name: Some("Glenna Reichert".to_string()),
                phone: Some("(775)976-6794".to_string()),
                ..UserChanges::default()
            },
        )
        .unwrap();
    let user = users_repo.get(&ctx, id).unwrap();
    assert_eq!(user.name, "Glenna Reichert");
    assert_eq!(user.phone, "(775)976-6794");
    assert_eq!(user.username, "Delphine");
}

#[test]
fn find_by_username_returns_first_live_match() {
    let store = store();
    let ctx = CallContext::new();
    let repo = UserRepository::new(&store);
    let id = add_user(&store, "Moriah.Stanton");

    assert_eq!(repo.find_by_username(&ctx, "Moriah.Stanton").unwrap().id, id);
    let err = repo.find_by_username(&ctx, "ghost").unwrap_err();
    match err {
        DataError::NotFound { key, .. } => assert_eq!(key, "ghost"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn details_zero_fill_absent_company() {
    let store = store();
    let ctx = CallContext::new();
    let service = BlogService::new(&store);
    let profile = UserProfile::new(new_user("Bret")).with_address(NewAddress {
        street: "Kulas Light".to_string(),
        city: "Gwenborough".to_string(),
        ..NewAddress::default()
    });
    let id = service.register_user(&ctx, &profile).unwrap();

    let details = UserRepository::new(&store).get_details(&ctx, id).unwrap();
    assert_eq!(details.user.username, "Bret");
    assert!(details.has_address());
    assert_eq!(details.address.city, "Gwenborough");
    assert_eq!(details.address.user_id, id);
    assert!(!details.has_company());
    assert_eq!(details.company.name, "");
}

#[test]
fn details_with_company_project_both_relations() {
    let store = store();
    let ctx = CallContext::new();
    let profile = UserProfile::new(new_user("Antonette")).with_company(NewCompany {
        name: "Deckow-Crist".to_string(),
        catch_phrase: "Proactive didactic contingency".to_string(),
        ..NewCompany::default()
    });
    let id = BlogService::new(&store).register_user(&ctx, &profile).unwrap();

    let details = UserRepository::new(&store).get_details(&ctx, id).unwrap();
    assert_eq!(details.company.name, "Deckow-Crist");
    assert!(!details.has_address());
    assert_eq!(details.address.street, "");
}

#[test]
fn user_with_posts_nests_live_posts_only() {
    let store = store();
    let ctx = CallContext::new();
    let author = add_user(&store, "Author");
    let silent = add_user(&store, "Silent");
    let kept = add_post(&store, author, "kept");
    let dropped = add_post(&store, author, "dropped");
    EntityRepository::<_, Post>::new(&store)
        .soft_delete(&ctx, dropped, 3)
        .unwrap();

    let repo = UserRepository::new(&store);
    let loaded = repo.get_with_posts(&ctx, author).unwrap();
    assert_eq!(loaded.posts.iter().map(|post| post.id).collect::<Vec<_>>(), vec![kept]);

    let all = repo.list_with_posts(&ctx).unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[1].user.id, silent);
    assert!(all[1].posts.is_empty());
}

#[test]
fn post_with_comments_and_author_listing() {
    let store = store();
    let ctx = CallContext::new();
    let author = add_user(&store, "Writer");
    let post = add_post(&store, author, "first");
    let empty = add_post(&store, author, "second");
    let first_comment = add_comment(&store, post, "Eliseo@gardner.biz");
    let second_comment = add_comment(&store, post, "Jayne_Kuhic@sydney.com");

    let repo = PostRepository::new(&store);
    let loaded = repo.get_with_comments(&ctx, post).unwrap();
    assert_eq!(
        loaded.comments.iter().map(|c| c.id).collect::<Vec<_>>(),
        vec![first_comment, second_comment]
    );
    assert!(repo.get_with_comments(&ctx, empty).unwrap().comments.is_empty());
    assert!(repo.get_with_comments(&ctx, 999).unwrap_err().is_not_found());

    let listed = repo
        .list_for_user(&ctx, author, Pagination::new(1, 1))
        .unwrap();
    assert_eq!(listed.iter().map(|p| p.id).collect::<Vec<_>>(), vec![empty]);
    assert_eq!(
        repo.posts()
            .count(&ctx, Predicate::eq(posts::USER_ID, author))
            .unwrap(),
        2
    );
}

#[test]
fn find_first_with_visibility_sees_deleted_rows() {
    let store = store();
    let ctx = CallContext::new();
    let repo = EntityRepository::<_, User>::new(&store);
    let id = add_user(&store, "Retired");
    repo.soft_delete(&ctx, id, 42).unwrap();

    let by_name = || Predicate::eq(users::USERNAME, "Retired");
    assert!(repo.find_first(&ctx, by_name()).unwrap_err().is_not_found());
    let found = repo
        .find_first_with(&ctx, by_name(), Visibility::IncludeDeleted)
        .unwrap();
    assert_eq!(found.id, id);
    assert_eq!(found.deleted_at, Some(42));
}

#[test]
fn list_details_pages_zero_filled_profiles() {
    let store = store();
    let ctx = CallContext::new();
    let with_company = UserProfile::new(new_user("Bret")).with_company(NewCompany {
        name: "Romaguera-Crona".to_string(),
        ..NewCompany::default()
    });
    let first = BlogService::new(&store)
        .register_user(&ctx, &with_company)
        .unwrap();
    let second = add_user(&store, "Antonette");
    let third = add_user(&store, "Samantha");

    let repo = UserRepository::new(&store);
    let all = repo.list_details(&ctx, Pagination::default()).unwrap();
    assert_eq!(
        all.iter().map(|details| details.user.id).collect::<Vec<_>>(),
        vec![first, second, third]
    );
    assert!(all[0].has_company());
    assert!(!all[1].has_company());
    assert_eq!(all[1].company.name, "");

    let page = repo.list_details(&ctx, Pagination::new(1, 1)).unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].user.id, second);
}

#[test]
fn comments_for_post_lists_live_comments_in_order() {
    let store = store();
    let ctx = CallContext::new();
    let author = add_user(&store, "Writer");
    let post = add_post(&store, author, "discussed");
    let other = add_post(&store, author, "elsewhere");
    let first = add_comment(&store, post, "Eliseo@gardner.biz");
    let removed = add_comment(&store, post, "Jayne_Kuhic@sydney.com");
    let last = add_comment(&store, post, "Nikita@garfield.biz");
    add_comment(&store, other, "Lew@alysha.tv");
    EntityRepository::<_, blogdb_core::Comment>::new(&store)
        .soft_delete(&ctx, removed, 7)
        .unwrap();

    let comments = PostRepository::new(&store)
        .comments_for_post(&ctx, post)
        .unwrap();
    assert_eq!(
        comments.iter().map(|comment| comment.id).collect::<Vec<_>>(),
        vec![first, last]
    );
    assert!(PostRepository::new(&store)
        .comments_for_post(&ctx, 999)
        .unwrap()
        .is_empty());
}
