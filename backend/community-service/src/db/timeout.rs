/// Per-operation deadline at the storage boundary.
///
/// Wraps any [`ContentStore`] so each primitive call is bounded by
/// `tokio::time::timeout`; an elapsed deadline surfaces as the retryable
/// [`StoreError::Timeout`]. The provided tree operations inherit the bound
/// through the primitives they call.
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;
use uuid::Uuid;

use super::{ContentStore, StoreError, Window};
use crate::models::{Post, PostKind};

pub struct TimedStore<S> {
    inner: S,
    deadline: Duration,
}

impl<S> TimedStore<S> {
    pub fn new(inner: S, deadline: Duration) -> Self {
        Self { inner, deadline }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }
}

/// Execute a storage future with a deadline
async fn bounded<F, T>(deadline: Duration, op: &'static str, future: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match timeout(deadline, future).await {
        Ok(result) => result,
        Err(_) => {
            warn!(op, ?deadline, "storage operation timed out");
            Err(StoreError::Timeout(deadline))
        }
    }
}

#[async_trait]
impl<S: ContentStore> ContentStore for TimedStore<S> {
    async fn find(&self, kind: PostKind, id: Uuid) -> Result<Option<Post>, StoreError> {
        bounded(self.deadline, "find", self.inner.find(kind, id)).await
    }

    async fn list(&self, kind: PostKind, window: Window) -> Result<Vec<Post>, StoreError> {
        bounded(self.deadline, "list", self.inner.list(kind, window)).await
    }

    async fn count(&self, kind: PostKind) -> Result<usize, StoreError> {
        bounded(self.deadline, "count", self.inner.count(kind)).await
    }

    async fn list_by_author(
        &self,
        kind: PostKind,
        author: Uuid,
    ) -> Result<Vec<Post>, StoreError> {
        bounded(
            self.deadline,
            "list_by_author",
            self.inner.list_by_author(kind, author),
        )
        .await
    }

    async fn list_with_child_author(
        &self,
        kind: PostKind,
        author: Uuid,
    ) -> Result<Vec<Post>, StoreError> {
        bounded(
            self.deadline,
            "list_with_child_author",
            self.inner.list_with_child_author(kind, author),
        )
        .await
    }

    async fn insert(&self, post: Post) -> Result<Post, StoreError> {
        bounded(self.deadline, "insert", self.inner.insert(post)).await
    }

    async fn replace(&self, post: Post) -> Result<Post, StoreError> {
        bounded(self.deadline, "replace", self.inner.replace(post)).await
    }

    async fn delete(
        &self,
        kind: PostKind,
        id: Uuid,
        expected_version: Option<i64>,
    ) -> Result<(), StoreError> {
        bounded(
            self.deadline,
            "delete",
            self.inner.delete(kind, id, expected_version),
        )
        .await
    }
}
