/// Post service - post lifecycle, poll votes and authored listings
use chrono::Utc;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::{feed, record, require_text, CommunityService};
use crate::db::{self, NodePatch, Removed};
use crate::domain::likes::cast_vote;
use crate::domain::Role;
use crate::error::{AppError, Result};
use crate::middleware::{Action, Caller};
use crate::models::{
    Announcement, AnnouncementCategory, ImageAttachment, LikeSet, NodePath, PollOption, Post,
    PostContent, PostKind, UnifiedPost,
};
use crate::realtime::EventName;

#[derive(Debug, Clone)]
pub struct NewPost {
    pub kind: PostKind,
    pub body: String,
    pub tags: Vec<String>,
    pub title: Option<String>,
    pub category: Option<AnnouncementCategory>,
    pub image: Option<ImageAttachment>,
    pub poll_options: Vec<String>,
}

impl NewPost {
    pub fn question(body: impl Into<String>) -> Self {
        Self {
            kind: PostKind::Question,
            body: body.into(),
            tags: Vec::new(),
            title: None,
            category: None,
            image: None,
            poll_options: Vec::new(),
        }
    }

    pub fn announcement(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind: PostKind::Announcement,
            title: Some(title.into()),
            ..Self::question(body)
        }
    }

    fn into_content(self) -> Result<(PostContent, String, Vec<String>)> {
        require_text("body", &self.body)?;
        let tags = normalize_tags(self.tags);

        let content = match self.kind {
            PostKind::Question => {
                if self.title.is_some() {
                    return Err(AppError::validation("title", "questions do not carry a title"));
                }
                if self.image.is_some() {
                    return Err(AppError::validation("image", "questions do not carry an image"));
                }
                if !self.poll_options.is_empty() {
                    return Err(AppError::validation(
                        "poll_options",
                        "questions do not carry a poll",
                    ));
                }
                PostContent::Question
            }
            PostKind::Announcement => {
                let poll_options: Vec<PollOption> = self
                    .poll_options
                    .iter()
                    .map(|label| label.trim())
                    .filter(|label| !label.is_empty())
                    .map(PollOption::new)
                    .collect();

                let category = match self.category {
                    Some(category) => category,
                    None if !poll_options.is_empty() => AnnouncementCategory::Poll,
                    None => AnnouncementCategory::Announcement,
                };
                if category == AnnouncementCategory::Poll && poll_options.len() < 2 {
                    return Err(AppError::validation(
                        "poll_options",
                        "a poll needs at least two options",
                    ));
                }
                if let Some(image) = &self.image {
                    if !image.content_type.starts_with("image/") {
                        return Err(AppError::validation("image", "content type must be image/*"));
                    }
                }

                PostContent::Announcement(Announcement {
                    category,
                    title: self.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
                    image: self.image,
                    poll_options,
                })
            }
        };

        Ok((content, self.body, tags))
    }
}

/// Edit of a post's own fields. Author-only.
#[derive(Debug, Clone, Default)]
pub struct PostEdit {
    pub body: Option<String>,
    pub tags: Option<Vec<String>>,
    pub title: Option<String>,
    pub expected_version: Option<i64>,
}

/// Trimmed, with blank tags dropped.
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

impl CommunityService {
    /// Create a post authored by `caller`.
    ///
    /// Questions may be asked by anyone; announcements are reserved for
    /// organizers and institutions.
    pub async fn create_post(&self, caller: &Caller, new_post: NewPost) -> Result<UnifiedPost> {
        let result = self.create_post_inner(caller, new_post).await;
        record("create", &result);
        result
    }

    async fn create_post_inner(&self, caller: &Caller, new_post: NewPost) -> Result<UnifiedPost> {
        if new_post.kind == PostKind::Announcement && caller.role == Role::Member {
            return Err(AppError::Forbidden(
                "only organizers and institutions can publish announcements".into(),
            ));
        }

        let (content, body, tags) = new_post.into_content()?;
        let now = Utc::now();
        let post = Post {
            id: Uuid::new_v4(),
            author_id: caller.identity,
            author: Some(self.snapshot_of(caller).await),
            content,
            body,
            tags,
            likes: LikeSet::new(),
            children: Vec::new(),
            created_at: now,
            updated_at: now,
            version: 0,
            seq: 0,
        };

        let stored = self.store.insert(post).await?;
        info!(
            post_id = %stored.id,
            kind = %stored.kind(),
            author = %caller.identity,
            "post created"
        );

        let view = self.normalizer.normalize(&stored).await;
        self.publish(EventName::PostCreated, json!({ "post": view }));
        Ok(view)
    }

    pub async fn get_post(&self, _caller: &Caller, post_id: Uuid) -> Result<UnifiedPost> {
        let located = self.locate(post_id, NodePath::Post).await?;
        Ok(self.normalizer.normalize(&located.post).await)
    }

    pub async fn edit_post(
        &self,
        caller: &Caller,
        post_id: Uuid,
        edit: PostEdit,
    ) -> Result<UnifiedPost> {
        let result = self.edit_post_inner(caller, post_id, edit).await;
        record("edit", &result);
        result
    }

    async fn edit_post_inner(
        &self,
        caller: &Caller,
        post_id: Uuid,
        edit: PostEdit,
    ) -> Result<UnifiedPost> {
        if let Some(body) = &edit.body {
            require_text("body", body)?;
        }
        let patch = NodePatch {
            body: edit.body,
            tags: edit.tags.map(normalize_tags),
            title: edit.title,
        };
        if patch.is_empty() {
            return Err(AppError::validation("body", "nothing to update"));
        }

        self.locate_for(caller, post_id, NodePath::Post, Action::EditContent)
            .await?;

        let updated = self
            .store
            .replace_node(post_id, NodePath::Post, patch, edit.expected_version)
            .await?;
        info!(
            post_id = %post_id,
            caller = %caller.identity,
            version = updated.version,
            "post edited"
        );

        let view = self.normalizer.normalize(&updated).await;
        self.publish(EventName::PostUpdated, json!({ "post": view }));
        Ok(view)
    }

    pub async fn delete_post(
        &self,
        caller: &Caller,
        post_id: Uuid,
        expected_version: Option<i64>,
    ) -> Result<()> {
        let result = self
            .delete_post_inner(caller, post_id, expected_version)
            .await;
        record("delete", &result);
        result
    }

    async fn delete_post_inner(
        &self,
        caller: &Caller,
        post_id: Uuid,
        expected_version: Option<i64>,
    ) -> Result<()> {
        self.locate_for(caller, post_id, NodePath::Post, Action::DeleteContent)
            .await?;

        match self
            .store
            .remove_node(post_id, NodePath::Post, expected_version)
            .await?
        {
            Removed::Post(post) => {
                info!(
                    post_id = %post_id,
                    kind = %post.kind(),
                    caller = %caller.identity,
                    "post deleted"
                );
                self.publish(
                    EventName::PostDeleted,
                    json!({ "post_id": post_id, "kind": post.kind() }),
                );
                Ok(())
            }
            Removed::Child(_) => Err(AppError::Internal(
                "post removal detached a child instead".into(),
            )),
        }
    }

    /// Cast or move the caller's vote on an announcement poll.
    pub async fn vote_poll(
        &self,
        caller: &Caller,
        post_id: Uuid,
        option_index: usize,
    ) -> Result<UnifiedPost> {
        let result = self.vote_poll_inner(caller, post_id, option_index).await;
        record("vote", &result);
        result
    }

    async fn vote_poll_inner(
        &self,
        caller: &Caller,
        post_id: Uuid,
        option_index: usize,
    ) -> Result<UnifiedPost> {
        let located = self
            .locate_for(caller, post_id, NodePath::Post, Action::Vote)
            .await?;
        let voter = caller.identity;
        let (updated, _) = db::modify(
            self.store.as_ref(),
            located.post.id,
            None,
            self.settings.like_toggle_max_attempts,
            |post| cast_vote(post, option_index, voter).map_err(AppError::from),
        )
        .await?;

        info!(post_id = %post_id, voter = %voter, option_index, "poll vote recorded");
        let view = self.normalizer.normalize(&updated).await;
        self.publish(
            EventName::PollVoted,
            json!({ "post_id": post_id, "poll_options": view.poll_options }),
        );
        Ok(view)
    }

    /// The caller's own posts of both variants, newest first.
    pub async fn list_authored_posts(&self, caller: &Caller) -> Result<Vec<UnifiedPost>> {
        let (questions, announcements) = tokio::try_join!(
            self.store.list_by_author(PostKind::Question, caller.identity),
            self.store.list_by_author(PostKind::Announcement, caller.identity),
        )?;
        let merged = feed::merge(questions, announcements);
        Ok(self.normalizer.normalize_many(&merged).await)
    }

    /// Posts in which the caller wrote a comment, answer or reply.
    pub async fn list_authored_children(&self, caller: &Caller) -> Result<Vec<UnifiedPost>> {
        let (questions, announcements) = tokio::try_join!(
            self.store.list_with_child_author(PostKind::Question, caller.identity),
            self.store.list_with_child_author(PostKind::Announcement, caller.identity),
        )?;
        let merged = feed::merge(questions, announcements);
        Ok(self.normalizer.normalize_many(&merged).await)
    }
}
