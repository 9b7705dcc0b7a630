//! Hand-written renditions of catalog reports.
//!
//! Raw statements get no Live-only injection, so each one spells out its
//! own `deleted_at IS NULL` filter.

use crate::query::RawQuery;

const TOP_POSTS_PER_USER_SQL: &str = "SELECT id, user_id, title, rank FROM (\
SELECT id, user_id, title, ROW_NUMBER() OVER (PARTITION BY user_id ORDER BY id ASC) AS rank \
FROM posts WHERE deleted_at IS NULL) \
WHERE rank <= ?1 ORDER BY user_id ASC, id ASC";

/// Same rows as `TopPostsPerUser { per_user }`, projected into `RankedPost`.
pub fn raw_top_posts_per_user(per_user: u32) -> RawQuery {
    RawQuery::new(TOP_POSTS_PER_USER_SQL).bind(per_user)
}

#[cfg(test)]
mod tests {
    use super::raw_top_posts_per_user;
    use crate::query::{SqlValue, StatementKind};

    #[test]
    fn binds_exactly_one_limit() {
        let statement = raw_top_posts_per_user(3).into_statement().unwrap();
        assert_eq!(statement.kind, StatementKind::Raw);
        assert_eq!(statement.params, vec![SqlValue::Integer(3)]);
    }
}
