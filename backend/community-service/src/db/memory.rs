//! In-process content store. Default backend when no database is configured,
//! and the store used by tests.

use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ContentStore, StoreError, Window};
use crate::domain::thread::MissingNode;
use crate::models::{Post, PostKind};

#[derive(Default)]
struct Inner {
    posts: HashMap<Uuid, Post>,
    next_seq: i64,
}

#[derive(Default)]
pub struct InMemoryContentStore {
    inner: RwLock<Inner>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Newest first, then insertion order.
pub(crate) fn feed_order(a: &Post, b: &Post) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| a.seq.cmp(&b.seq))
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn find(&self, kind: PostKind, id: Uuid) -> Result<Option<Post>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.posts.get(&id).filter(|p| p.kind() == kind).cloned())
    }

    async fn list(&self, kind: PostKind, window: Window) -> Result<Vec<Post>, StoreError> {
        let inner = self.inner.read().await;
        let mut posts: Vec<Post> = inner
            .posts
            .values()
            .filter(|p| p.kind() == kind)
            .cloned()
            .collect();
        posts.sort_by(feed_order);
        Ok(window.apply(posts))
    }

    async fn count(&self, kind: PostKind) -> Result<usize, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.posts.values().filter(|p| p.kind() == kind).count())
    }

    async fn list_by_author(
        &self,
        kind: PostKind,
        author: Uuid,
    ) -> Result<Vec<Post>, StoreError> {
        let inner = self.inner.read().await;
        let mut posts: Vec<Post> = inner
            .posts
            .values()
            .filter(|p| p.kind() == kind && p.author_id == author)
            .cloned()
            .collect();
        posts.sort_by(feed_order);
        Ok(posts)
    }

    async fn insert(&self, mut post: Post) -> Result<Post, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.posts.contains_key(&post.id) {
            return Err(StoreError::Conflict { post_id: post.id });
        }
        inner.next_seq += 1;
        post.seq = inner.next_seq;
        post.version = 1;
        inner.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn replace(&self, mut post: Post) -> Result<Post, StoreError> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .posts
            .get_mut(&post.id)
            .filter(|p| p.kind() == post.kind())
            .ok_or(MissingNode::Post(post.id))?;

        if stored.version != post.version {
            return Err(StoreError::Conflict { post_id: post.id });
        }

        post.version += 1;
        post.seq = stored.seq;
        *stored = post.clone();
        Ok(post)
    }

    async fn delete(
        &self,
        kind: PostKind,
        id: Uuid,
        expected_version: Option<i64>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .posts
            .get(&id)
            .filter(|p| p.kind() == kind)
            .ok_or(MissingNode::Post(id))?;

        if let Some(expected) = expected_version {
            if stored.version != expected {
                return Err(StoreError::Conflict { post_id: id });
            }
        }

        inner.posts.remove(&id);
        Ok(())
    }
}
