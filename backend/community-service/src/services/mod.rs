/// Business logic layer for community-service
///
/// [`CommunityService`] is the single entry point for the exposed operations:
/// - Feed: merged, ordered view over both post variants
/// - Posts: create, read, edit, delete, poll votes, authored listings
/// - Comments: add, edit and delete comments/answers and replies
/// - Likes: toggle on any node
///
/// Every mutation runs resolve → authorize → conditional write → normalize,
/// then publishes a realtime event.
pub mod comments;
pub mod feed;
pub mod likes;
pub mod normalizer;
pub mod posts;
pub mod thread;

pub use comments::{ChildEdit, NewChild};
pub use feed::FeedPage;
pub use normalizer::PostNormalizer;
pub use posts::{NewPost, PostEdit};
pub use thread::{Located, Resolution};

use std::sync::Arc;
use uuid::Uuid;

use crate::db::{ContentStore, DEFAULT_WRITE_ATTEMPTS};
use crate::error::{AppError, Result};
use crate::metrics::community::MUTATIONS_TOTAL;
use crate::middleware::{Action, AuthorizationResolver, Caller};
use crate::models::{AuthorSnapshot, NodePath};
use crate::realtime::{EventName, RealtimeNotifier};

#[derive(Debug, Clone, Copy)]
pub struct ServiceSettings {
    /// Attempts for like toggles and poll votes before a lost race is
    /// reported as a conflict.
    pub like_toggle_max_attempts: u32,
    /// Page size when a feed request names none; `None` returns everything.
    pub feed_default_page_size: Option<usize>,
    pub feed_max_page_size: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            like_toggle_max_attempts: DEFAULT_WRITE_ATTEMPTS,
            feed_default_page_size: None,
            feed_max_page_size: 500,
        }
    }
}

#[derive(Clone)]
pub struct CommunityService {
    store: Arc<dyn ContentStore>,
    normalizer: PostNormalizer,
    authz: AuthorizationResolver,
    notifier: Arc<dyn RealtimeNotifier>,
    settings: ServiceSettings,
}

impl CommunityService {
    pub fn new(
        store: Arc<dyn ContentStore>,
        normalizer: PostNormalizer,
        authz: AuthorizationResolver,
        notifier: Arc<dyn RealtimeNotifier>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            store,
            normalizer,
            authz,
            notifier,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    pub fn settings(&self) -> ServiceSettings {
        self.settings
    }

    /// Resolve `path` in `post_id`, failing with NotFound if any segment is
    /// missing.
    pub async fn locate(&self, post_id: Uuid, path: NodePath) -> Result<Located> {
        thread::resolve(self.store.as_ref(), post_id, path)
            .await?
            .found()
    }

    /// Resolve then authorize `action` for `caller`.
    async fn locate_for(
        &self,
        caller: &Caller,
        post_id: Uuid,
        path: NodePath,
        action: Action,
    ) -> Result<Located> {
        let located = self.locate(post_id, path).await?;
        self.authz.authorize(
            caller.identity,
            caller.canonical_role(),
            &located.chain,
            action,
        )?;
        Ok(located)
    }

    /// Snapshot of the caller's display fields, embedded on new nodes.
    async fn snapshot_of(&self, caller: &Caller) -> AuthorSnapshot {
        let profile = self.normalizer.profile_of(caller.identity).await;
        AuthorSnapshot {
            name: profile.as_ref().and_then(|p| p.display_name.clone()),
            avatar: profile.as_ref().and_then(|p| p.avatar_url.clone()),
            role: Some(caller.role.label().to_string()),
        }
    }

    fn publish(&self, name: EventName, payload: serde_json::Value) {
        self.notifier.publish(name, payload);
    }
}

/// Count a finished mutation by action and outcome.
fn record<T>(action: &'static str, result: &Result<T>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.code(),
    };
    MUTATIONS_TOTAL.with_label_values(&[action, outcome]).inc();
}

/// Non-blank text check, reporting the offending field.
fn require_text(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(field, "must not be empty"));
    }
    Ok(())
}
