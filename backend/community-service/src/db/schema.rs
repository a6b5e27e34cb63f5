use sqlx::PgPool;
use tracing::info;

use super::StoreError;

/// Ensure the community tables exist.
///
/// Created lazily at startup so a fresh database can serve immediately
/// without a separate migration step.
pub async fn ensure_content_tables(pool: &PgPool) -> Result<(), StoreError> {
    info!("Ensuring community content tables exist");

    for statement in [
        COMMUNITY_POSTS_TABLE,
        COMMUNITY_POSTS_FEED_INDEX,
        COMMUNITY_POSTS_AUTHOR_INDEX,
        COMMUNITY_PROFILES_TABLE,
    ] {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}

/// One row per post. `document` holds the full tree (children, replies,
/// like sets); the scalar columns mirror the fields we filter and order on.
const COMMUNITY_POSTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS community_posts (
    id UUID PRIMARY KEY,
    kind TEXT NOT NULL CHECK (kind IN ('question', 'announcement')),
    author_id UUID NOT NULL,
    seq BIGSERIAL NOT NULL,
    version BIGINT NOT NULL DEFAULT 1,
    created_at TIMESTAMPTZ NOT NULL,
    document JSONB NOT NULL
)
"#;

const COMMUNITY_POSTS_FEED_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_community_posts_feed
    ON community_posts (kind, created_at DESC, seq ASC)
"#;

const COMMUNITY_POSTS_AUTHOR_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_community_posts_author
    ON community_posts (kind, author_id, created_at DESC)
"#;

/// Display profiles, written by the identity side and read here.
const COMMUNITY_PROFILES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS community_profiles (
    identity UUID PRIMARY KEY,
    display_name TEXT,
    avatar_url TEXT,
    role TEXT,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_are_idempotent() {
        // Startup calls this through the `db` re-export.
        let _ensure = crate::db::ensure_content_tables;

        for statement in [
            COMMUNITY_POSTS_TABLE,
            COMMUNITY_POSTS_FEED_INDEX,
            COMMUNITY_POSTS_AUTHOR_INDEX,
            COMMUNITY_PROFILES_TABLE,
        ] {
            assert!(statement.contains("IF NOT EXISTS"), "{statement}");
        }
    }
}
