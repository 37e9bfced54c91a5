//! Cache key namespaces.
//!
//! Every cached value lives under one of these prefixes so writes can
//! invalidate by pattern without enumerating exact keys.

use uuid::Uuid;

use shelfmark_core::BookListQuery;

pub const BOOK_PREFIX: &str = "book:";
pub const BOOK_LIST_PREFIX: &str = "books:list:";
pub const USER_PREFIX: &str = "user:";
pub const SESSION_PREFIX: &str = "session:";
pub const USER_SESSIONS_PREFIX: &str = "user_sessions:";
pub const STATS_PREFIX: &str = "stats:";
pub const RATE_LIMIT_PREFIX: &str = "ratelimit:";
pub const BLACKLIST_PREFIX: &str = "token:blacklist:";

/// Pattern matching every cached book list page.
pub const BOOK_LIST_PATTERN: &str = "books:list:*";
/// Pattern matching every cached stats document.
pub const STATS_PATTERN: &str = "stats:*";

pub fn book_key(id: Uuid) -> String {
    format!("{BOOK_PREFIX}{id}")
}

pub fn book_list_key(query: &BookListQuery) -> String {
    format!("{BOOK_LIST_PREFIX}{}", query.canonical_key())
}

pub fn user_key(id: Uuid) -> String {
    format!("{USER_PREFIX}{id}")
}

pub fn session_key(session_id: &str) -> String {
    format!("{SESSION_PREFIX}{session_id}")
}

pub fn user_sessions_key(user_id: Uuid) -> String {
    format!("{USER_SESSIONS_PREFIX}{user_id}")
}

pub fn stats_key(scope: &str) -> String {
    format!("{STATS_PREFIX}{scope}")
}

pub fn rate_limit_key(identifier: &str) -> String {
    format!("{RATE_LIMIT_PREFIX}{identifier}")
}

pub fn blacklist_key(token: &str) -> String {
    format!("{BLACKLIST_PREFIX}{token}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_key_embeds_canonical_query() {
        let query = BookListQuery::default();
        let key = book_list_key(&query);
        assert!(key.starts_with(BOOK_LIST_PREFIX));
        assert!(key.contains("p=1;l=10"));
    }

    #[test]
    fn test_prefixes_do_not_collide() {
        // `user:` must not be a prefix of `user_sessions:` keys and vice
        // versa, or pattern invalidation would cross namespaces.
        let user = user_key(Uuid::nil());
        let sessions = user_sessions_key(Uuid::nil());
        assert!(!sessions.starts_with(USER_PREFIX));
        assert!(!user.starts_with(USER_SESSIONS_PREFIX));
    }
}
