/// Like service - toggles on posts, comments and replies
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use super::{record, CommunityService};
use crate::domain::thread;
use crate::error::Result;
use crate::middleware::{Action, Caller};
use crate::models::{LikeState, NodePath};
use crate::realtime::EventName;

impl CommunityService {
    /// Flip the caller's like on the node at `path`.
    ///
    /// The flip is computed on a fresh read and written conditionally, so a
    /// rapid double toggle lands as two toggles, never as one lost update.
    pub async fn toggle_like(
        &self,
        caller: &Caller,
        post_id: Uuid,
        path: NodePath,
    ) -> Result<LikeState> {
        let result = self.toggle_like_inner(caller, post_id, path).await;
        record("like", &result);
        result
    }

    async fn toggle_like_inner(
        &self,
        caller: &Caller,
        post_id: Uuid,
        path: NodePath,
    ) -> Result<LikeState> {
        self.locate_for(caller, post_id, path, Action::ToggleLike)
            .await?;

        let (updated, liked) = self
            .store
            .toggle_like(
                post_id,
                path,
                caller.identity,
                self.settings.like_toggle_max_attempts,
            )
            .await?;

        let likes = thread::locate(&updated, &path)?.likes();
        let state = LikeState {
            post_id,
            target: path,
            liked,
            likes: likes.to_vec(),
            like_count: likes.len(),
        };
        debug!(
            post_id = %post_id,
            level = %path.level(),
            liked,
            count = state.like_count,
            "like toggled"
        );

        self.publish(
            EventName::LikeToggled,
            json!({
                "post_id": post_id,
                "target": path,
                "liked": liked,
                "like_count": state.like_count,
                "by": caller.identity,
            }),
        );
        Ok(state)
    }
}
