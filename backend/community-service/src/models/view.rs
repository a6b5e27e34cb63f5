//! Client-facing shapes. Both post variants render into [`UnifiedPost`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AnnouncementCategory, NodePath, PostKind};

/// Resolved author display fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayProfile {
    pub display_name: String,
    pub display_avatar: String,
    pub display_role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOptionView {
    pub label: String,
    pub vote_count: usize,
}

/// A comment or reply. Replies use the same shape with an empty `replies`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnifiedNode {
    pub id: Uuid,
    pub author_id: Uuid,
    #[serde(flatten)]
    pub profile: DisplayProfile,
    pub body: String,
    pub likes: Vec<Uuid>,
    pub like_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub replies: Vec<UnifiedNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnifiedPost {
    pub id: Uuid,
    pub kind: PostKind,
    pub author_id: Uuid,
    #[serde(flatten)]
    pub profile: DisplayProfile,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<AnnouncementCategory>,
    /// `data:` URL of the attached image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub poll_options: Vec<PollOptionView>,
    pub tags: Vec<String>,
    pub likes: Vec<Uuid>,
    pub like_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
    pub children: Vec<UnifiedNode>,
}

/// Outcome of a like toggle: enough to re-render a counter without a second read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeState {
    pub post_id: Uuid,
    pub target: NodePath,
    pub liked: bool,
    pub likes: Vec<Uuid>,
    pub like_count: usize,
}

/// One page of the merged feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSlice {
    pub posts: Vec<UnifiedPost>,
    pub cursor: Option<String>,
    pub has_more: bool,
    pub total_count: usize,
}
