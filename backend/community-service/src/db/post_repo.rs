use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{ContentStore, StoreError, Window};
use crate::domain::thread::MissingNode;
use crate::models::{Post, PostKind};

const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL-backed content store.
///
/// Posts live in `community_posts` as JSONB documents; `version` and `seq`
/// are authoritative in their own columns and copied onto the decoded post.
#[derive(Clone)]
pub struct PgContentStore {
    pool: PgPool,
}

type DocumentRow = (Json<Post>, i64, i64);

fn hydrate((Json(mut post), version, seq): DocumentRow) -> Post {
    post.version = version;
    post.seq = seq;
    post
}

impl PgContentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn stored_version(&self, kind: PostKind, id: Uuid) -> Result<Option<i64>, StoreError> {
        let row = sqlx::query_as::<_, (i64,)>(
            "SELECT version FROM community_posts WHERE id = $1 AND kind = $2",
        )
        .bind(id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(version,)| version))
    }
}

#[async_trait]
impl ContentStore for PgContentStore {
    async fn find(&self, kind: PostKind, id: Uuid) -> Result<Option<Post>, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT document, version, seq
            FROM community_posts
            WHERE id = $1 AND kind = $2
            "#,
        )
        .bind(id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(hydrate))
    }

    async fn list(&self, kind: PostKind, window: Window) -> Result<Vec<Post>, StoreError> {
        // NULL limit is LIMIT ALL; oversized windows saturate
        let rows = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT document, version, seq
            FROM community_posts
            WHERE kind = $1
            ORDER BY created_at DESC, seq ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(kind.as_str())
        .bind(window.limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX)))
        .bind(i64::try_from(window.offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(hydrate).collect())
    }

    async fn count(&self, kind: PostKind) -> Result<usize, StoreError> {
        let (count,) = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM community_posts WHERE kind = $1",
        )
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as usize)
    }

    async fn list_by_author(
        &self,
        kind: PostKind,
        author: Uuid,
    ) -> Result<Vec<Post>, StoreError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT document, version, seq
            FROM community_posts
            WHERE kind = $1 AND author_id = $2
            ORDER BY created_at DESC, seq ASC
            "#,
        )
        .bind(kind.as_str())
        .bind(author)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(hydrate).collect())
    }

    async fn list_with_child_author(
        &self,
        kind: PostKind,
        author: Uuid,
    ) -> Result<Vec<Post>, StoreError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT document, version, seq
            FROM community_posts
            WHERE kind = $1
              AND jsonb_path_exists(
                    document,
                    '$.children[*] ? (@.author_id == $a || exists(@.replies[*] ? (@.author_id == $a)))',
                    jsonb_build_object('a', $2::text)
                  )
            ORDER BY created_at DESC, seq ASC
            "#,
        )
        .bind(kind.as_str())
        .bind(author)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(hydrate).collect())
    }

    async fn insert(&self, mut post: Post) -> Result<Post, StoreError> {
        post.version = 1;
        let result = sqlx::query_as::<_, (i64,)>(
            r#"
            INSERT INTO community_posts (id, kind, author_id, version, created_at, document)
            VALUES ($1, $2, $3, 1, $4, $5)
            RETURNING seq
            "#,
        )
        .bind(post.id)
        .bind(post.kind().as_str())
        .bind(post.author_id)
        .bind(post.created_at)
        .bind(Json(&post))
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok((seq,)) => {
                post.seq = seq;
                Ok(post)
            }
            Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                Err(StoreError::Conflict { post_id: post.id })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn replace(&self, mut post: Post) -> Result<Post, StoreError> {
        let row = sqlx::query_as::<_, (i64, i64)>(
            r#"
            UPDATE community_posts
            SET document = $3, version = version + 1
            WHERE id = $1 AND kind = $2 AND version = $4
            RETURNING version, seq
            "#,
        )
        .bind(post.id)
        .bind(post.kind().as_str())
        .bind(Json(&post))
        .bind(post.version)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((version, seq)) => {
                post.version = version;
                post.seq = seq;
                Ok(post)
            }
            None => match self.stored_version(post.kind(), post.id).await? {
                Some(_) => Err(StoreError::Conflict { post_id: post.id }),
                None => Err(MissingNode::Post(post.id).into()),
            },
        }
    }

    async fn delete(
        &self,
        kind: PostKind,
        id: Uuid,
        expected_version: Option<i64>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM community_posts
            WHERE id = $1 AND kind = $2 AND ($3::BIGINT IS NULL OR version = $3)
            "#,
        )
        .bind(id)
        .bind(kind.as_str())
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        match self.stored_version(kind, id).await? {
            Some(_) => Err(StoreError::Conflict { post_id: id }),
            None => Err(MissingNode::Post(id).into()),
        }
    }
}
