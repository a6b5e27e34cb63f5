/// Content Store Adapter
///
/// A variant-aware document store over the two post collections. Backends
/// implement the handful of required primitives; the tree-level contract
/// (`get_by_id`, `append_child`, `replace_node`, `remove_node`, `toggle_like`)
/// is provided on top of them as fresh-read / mutate / conditional-write loops.
pub mod memory;
pub mod post_repo;
pub mod profile_repo;
pub mod schema;
pub mod timeout;

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::domain::likes;
use crate::domain::thread::{self, AttachError, MissingNode, NewNode};
use crate::metrics::community::WRITE_RETRIES_TOTAL;
use crate::models::{NodePath, Post, PostKind};

pub use memory::InMemoryContentStore;
pub use post_repo::PgContentStore;
pub use profile_repo::{InMemoryProfiles, PgProfileRepository, Profile, ProfileLookup};
pub use schema::ensure_content_tables;
pub use timeout::TimedStore;

/// Attempts used by the provided read-modify-write helpers unless the caller
/// asks otherwise.
pub const DEFAULT_WRITE_ATTEMPTS: u32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Transient I/O failure; safe to retry with backoff
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage operation exceeded {0:?}")]
    Timeout(Duration),

    /// Conditional write lost against a concurrent writer
    #[error("post {post_id} changed since it was read")]
    Conflict { post_id: Uuid },

    #[error(transparent)]
    Missing(#[from] MissingNode),

    #[error("replies cannot be nested below another reply")]
    DepthExceeded,

    /// Patch names a field the targeted node does not carry
    #[error("field '{0}' cannot be set on this node")]
    InvalidPatch(&'static str),

    /// Stored document could not be decoded
    #[error("corrupt document: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

impl From<AttachError> for StoreError {
    fn from(err: AttachError) -> Self {
        match err {
            AttachError::Missing(missing) => StoreError::Missing(missing),
            AttachError::DepthExceeded => StoreError::DepthExceeded,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

/// Slice of a per-variant listing, in feed order (newest first, then by
/// insertion sequence).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
    pub offset: usize,
    pub limit: Option<usize>,
}

impl Window {
    /// Every document.
    pub fn all() -> Self {
        Self::default()
    }

    /// The first `limit` documents.
    pub fn head(limit: usize) -> Self {
        Self {
            offset: 0,
            limit: Some(limit),
        }
    }

    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let iter = items.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }
}

/// Partial update of a node. Fields a node level does not carry (`tags` and
/// `title` below the post) are rejected by [`NodePatch::apply`].
#[derive(Debug, Clone, Default)]
pub struct NodePatch {
    pub body: Option<String>,
    pub tags: Option<Vec<String>>,
    pub title: Option<String>,
}

impl NodePatch {
    pub fn body(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_none() && self.tags.is_none() && self.title.is_none()
    }

    /// Apply to the node at `path`, stamping `updated_at` on that node.
    pub fn apply(&self, post: &mut Post, path: &NodePath) -> Result<(), PatchError> {
        let now = Utc::now();

        if let NodePath::Post = path {
            if let Some(tags) = &self.tags {
                post.tags = tags.clone();
            }
            if let Some(title) = &self.title {
                match post.content.announcement_mut() {
                    Some(announcement) => announcement.title = Some(title.clone()),
                    None => return Err(PatchError::Field("title")),
                }
            }
        } else if self.tags.is_some() {
            return Err(PatchError::Field("tags"));
        } else if self.title.is_some() {
            return Err(PatchError::Field("title"));
        }

        let node = thread::locate_mut(post, path)?;
        if let Some(body) = &self.body {
            *node.body = body.clone();
        }
        *node.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error(transparent)]
    Missing(#[from] MissingNode),
    /// Field not carried by the targeted node
    #[error("field '{0}' cannot be set on this node")]
    Field(&'static str),
}

/// Removal result: whole post gone, or the post with a child detached.
#[derive(Debug, Clone)]
pub enum Removed {
    Post(Post),
    Child(Post),
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn find(&self, kind: PostKind, id: Uuid) -> Result<Option<Post>, StoreError>;

    /// Posts of one variant in feed order, sliced by `window`.
    async fn list(&self, kind: PostKind, window: Window) -> Result<Vec<Post>, StoreError>;

    async fn count(&self, kind: PostKind) -> Result<usize, StoreError>;

    /// Posts of one variant written by `author`, newest first.
    async fn list_by_author(&self, kind: PostKind, author: Uuid)
        -> Result<Vec<Post>, StoreError>;

    /// Store a new post. The store assigns `seq` and sets `version` to 1.
    async fn insert(&self, post: Post) -> Result<Post, StoreError>;

    /// Overwrite a post only if the stored `version` equals `post.version`.
    /// Returns the stored document with the bumped version.
    async fn replace(&self, post: Post) -> Result<Post, StoreError>;

    /// Delete a post, conditionally on its version when one is given.
    async fn delete(
        &self,
        kind: PostKind,
        id: Uuid,
        expected_version: Option<i64>,
    ) -> Result<(), StoreError>;

    /// Lookup without knowing the variant: questions first, then announcements.
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Post>, StoreError> {
        for kind in PostKind::SEARCH_ORDER {
            if let Some(post) = self.find(kind, id).await? {
                return Ok(Some(post));
            }
        }
        Ok(None)
    }

    async fn list_all(&self, kind: PostKind) -> Result<Vec<Post>, StoreError> {
        self.list(kind, Window::all()).await
    }

    /// Posts of one variant in which `author` wrote a comment or reply.
    async fn list_with_child_author(
        &self,
        kind: PostKind,
        author: Uuid,
    ) -> Result<Vec<Post>, StoreError> {
        let mut posts = self.list_all(kind).await?;
        posts.retain(|p| thread::has_child_by(p, author));
        Ok(posts)
    }

    /// Attach `node` under `parent`, returning the updated post and the path
    /// of the new node.
    async fn append_child(
        &self,
        post_id: Uuid,
        parent: NodePath,
        node: NewNode,
    ) -> Result<(Post, NodePath), StoreError> {
        modify(self, post_id, None, DEFAULT_WRITE_ATTEMPTS, |post| {
            thread::attach_child(post, &parent, node.clone()).map_err(StoreError::from)
        })
        .await
    }

    async fn replace_node(
        &self,
        post_id: Uuid,
        path: NodePath,
        patch: NodePatch,
        expected_version: Option<i64>,
    ) -> Result<Post, StoreError> {
        let (post, ()) = modify(self, post_id, expected_version, DEFAULT_WRITE_ATTEMPTS, |post| {
            patch.apply(post, &path).map_err(|e| match e {
                PatchError::Missing(missing) => StoreError::Missing(missing),
                PatchError::Field(field) => StoreError::InvalidPatch(field),
            })
        })
        .await?;
        Ok(post)
    }

    /// Remove the node at `path`. An empty path deletes the post itself.
    async fn remove_node(
        &self,
        post_id: Uuid,
        path: NodePath,
        expected_version: Option<i64>,
    ) -> Result<Removed, StoreError> {
        match path {
            NodePath::Post => {
                let post = self
                    .get_by_id(post_id)
                    .await?
                    .ok_or(MissingNode::Post(post_id))?;
                if let Some(expected) = expected_version {
                    if expected != post.version {
                        return Err(StoreError::Conflict { post_id });
                    }
                }
                self.delete(post.kind(), post_id, Some(post.version)).await?;
                Ok(Removed::Post(post))
            }
            NodePath::Comment { comment_id } => {
                let detach = |post: &mut Post| {
                    thread::detach_child(post, comment_id, None).map_err(StoreError::from)
                };
                let (post, ()) =
                    modify(self, post_id, expected_version, DEFAULT_WRITE_ATTEMPTS, detach).await?;
                Ok(Removed::Child(post))
            }
            NodePath::Reply {
                comment_id,
                reply_id,
            } => {
                let detach = |post: &mut Post| {
                    thread::detach_child(post, comment_id, Some(reply_id)).map_err(StoreError::from)
                };
                let (post, ()) =
                    modify(self, post_id, expected_version, DEFAULT_WRITE_ATTEMPTS, detach).await?;
                Ok(Removed::Child(post))
            }
        }
    }

    /// Flip `identity` in the like set of the node at `path`.
    ///
    /// Each attempt reads the post fresh and writes it back conditionally, so
    /// two concurrent toggles can never both apply to the same snapshot.
    async fn toggle_like(
        &self,
        post_id: Uuid,
        path: NodePath,
        identity: Uuid,
        max_attempts: u32,
    ) -> Result<(Post, bool), StoreError> {
        modify(self, post_id, None, max_attempts, |post| {
            likes::toggle_like(post, &path, identity).map_err(StoreError::from)
        })
        .await
    }
}

/// Read-modify-write with a conditional write.
///
/// `f` runs against a fresh copy of the post on every attempt and may fail
/// with any error a [`StoreError`] converts into. With an `expected_version`
/// the first read must match it and conflicts are not retried; without one,
/// conflicts are retried up to `max_attempts`.
pub async fn modify<S, T, E, F>(
    store: &S,
    post_id: Uuid,
    expected_version: Option<i64>,
    max_attempts: u32,
    mut f: F,
) -> Result<(Post, T), E>
where
    S: ContentStore + ?Sized,
    T: Send,
    E: From<StoreError> + Send,
    F: FnMut(&mut Post) -> Result<T, E> + Send,
{
    let attempts = max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let mut post = store
            .get_by_id(post_id)
            .await?
            .ok_or(StoreError::Missing(MissingNode::Post(post_id)))?;

        if let Some(expected) = expected_version {
            if expected != post.version {
                return Err(StoreError::Conflict { post_id }.into());
            }
        }

        let outcome = f(&mut post)?;

        match store.replace(post).await {
            Ok(stored) => return Ok((stored, outcome)),
            Err(err) if err.is_conflict() && expected_version.is_none() && attempt < attempts => {
                WRITE_RETRIES_TOTAL.inc();
                debug!(post_id = %post_id, attempt, "conditional write lost, retrying");
            }
            Err(err) => return Err(err.into()),
        }
    }
}
