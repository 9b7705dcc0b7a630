#![allow(dead_code)]

use blogdb_core::{
    open_store_in_memory, CallContext, Comment, EntityRepository, NewComment, NewPost, NewUser,
    Post, SqliteStore, User,
};

pub fn store() -> SqliteStore {
    open_store_in_memory().unwrap()
}

pub fn new_user(username: &str) -> NewUser {
    NewUser {
        name: format!("{username} Name"),
        username: username.to_string(),
        email: format!("{}@example.org", username.to_lowercase()),
        phone: String::new(),
        website: String::new(),
    }
}

pub fn add_user(store: &SqliteStore, username: &str) -> i64 {
    EntityRepository::<_, User>::new(store)
        .create(&CallContext::new(), &new_user(username))
        .unwrap()
}

pub fn add_post(store: &SqliteStore, user_id: i64, title: &str) -> i64 {
    let post = NewPost {
        user_id,
        title: title.to_string(),
        body: format!("{title} body"),
    };
    EntityRepository::<_, Post>::new(store)
        .create(&CallContext::new(), &post)
        .unwrap()
}

pub fn add_comment(store: &SqliteStore, post_id: i64, email: &str) -> i64 {
    let comment = NewComment {
        post_id,
        name: "reader".to_string(),
        email: email.to_string(),
        body: "nice post".to_string(),
    };
    EntityRepository::<_, Comment>::new(store)
        .create(&CallContext::new(), &comment)
        .unwrap()
}

/// Inserts a post with an explicit id, bypassing the composer.
pub fn add_post_with_id(store: &SqliteStore, id: i64, user_id: i64) {
    store
        .connection()
        .execute(
            "INSERT INTO posts (id, user_id, title, body) VALUES (?1, ?2, ?3, '')",
            rusqlite::params![id, user_id, format!("post {id}")],
        )
        .unwrap();
}

pub fn row_count(store: &SqliteStore, table: &str) -> i64 {
    store
        .connection()
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .unwrap()
}
