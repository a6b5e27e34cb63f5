/// Data models for community-service
///
/// This module defines the stored document shapes:
/// - Post: top-level unit, either a member Question or an organizer Announcement
/// - Comment: first-level child ("answer" on questions, "comment" on announcements)
/// - Reply: second-level, terminal child of a Comment
///
/// The two-level depth cap is encoded in the types: a [`Reply`] has no
/// `replies` field at all.
pub mod view;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

pub use view::{DisplayProfile, FeedSlice, LikeState, PollOptionView, UnifiedNode, UnifiedPost};

/// Which collection a post lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostKind {
    Question,
    Announcement,
}

impl PostKind {
    /// Lookup order used when a caller does not know the variant of an id.
    pub const SEARCH_ORDER: [PostKind; 2] = [PostKind::Question, PostKind::Announcement];

    pub fn as_str(self) -> &'static str {
        match self {
            PostKind::Question => "question",
            PostKind::Announcement => "announcement",
        }
    }

    /// Name the source collections use for first-level children.
    pub fn child_label(self) -> &'static str {
        match self {
            PostKind::Question => "answer",
            PostKind::Announcement => "comment",
        }
    }
}

impl fmt::Display for PostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of identities that liked a node. Membership is the source of truth;
/// the displayed count is `len()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LikeSet(BTreeSet<Uuid>);

impl LikeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, identity: &Uuid) -> bool {
        self.0.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Uuid> {
        self.0.iter()
    }

    /// Flip membership of `identity`. Returns `true` if the identity is now
    /// present (liked), `false` if it was removed.
    pub fn toggle(&mut self, identity: Uuid) -> bool {
        if self.0.remove(&identity) {
            false
        } else {
            self.0.insert(identity);
            true
        }
    }

    pub fn to_vec(&self) -> Vec<Uuid> {
        self.0.iter().copied().collect()
    }
}

impl FromIterator<Uuid> for LikeSet {
    fn from_iter<I: IntoIterator<Item = Uuid>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Author fields captured when a node was written. Second tier of display
/// resolution, after the live profile record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorSnapshot {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    /// Raw role string; canonicalized only when rendered.
    #[serde(default)]
    pub role: Option<String>,
}

/// Binary image attached to an announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAttachment {
    pub content_type: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl ImageAttachment {
    /// Render as a `data:` URL for clients.
    pub fn to_data_url(&self) -> String {
        use base64::{engine::general_purpose, Engine as _};
        format!(
            "data:{};base64,{}",
            self.content_type,
            general_purpose::STANDARD.encode(&self.data)
        )
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// One poll option. Votes are stored as the voter set so a caller can hold at
/// most one vote per poll; the count is derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub label: String,
    #[serde(default)]
    pub voters: BTreeSet<Uuid>,
}

impl PollOption {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            voters: BTreeSet::new(),
        }
    }

    pub fn vote_count(&self) -> usize {
        self.voters.len()
    }
}

/// Organizer post categories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncementCategory {
    #[default]
    Announcement,
    Notice,
    Update,
    Event,
    Question,
    Poll,
}

/// Fields only announcements carry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    #[serde(default)]
    pub category: AnnouncementCategory,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub image: Option<ImageAttachment>,
    #[serde(default)]
    pub poll_options: Vec<PollOption>,
}

/// Variant discriminant plus variant-specific payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PostContent {
    Question,
    Announcement(Announcement),
}

impl PostContent {
    pub fn kind(&self) -> PostKind {
        match self {
            PostContent::Question => PostKind::Question,
            PostContent::Announcement(_) => PostKind::Announcement,
        }
    }

    pub fn announcement(&self) -> Option<&Announcement> {
        match self {
            PostContent::Announcement(a) => Some(a),
            PostContent::Question => None,
        }
    }

    pub fn announcement_mut(&mut self) -> Option<&mut Announcement> {
        match self {
            PostContent::Announcement(a) => Some(a),
            PostContent::Question => None,
        }
    }
}

/// Terminal node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub id: Uuid,
    pub author_id: Uuid,
    #[serde(default)]
    pub author: Option<AuthorSnapshot>,
    pub body: String,
    #[serde(default)]
    pub likes: LikeSet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// First-level child of a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub author_id: Uuid,
    #[serde(default)]
    pub author: Option<AuthorSnapshot>,
    pub body: String,
    #[serde(default)]
    pub likes: LikeSet,
    #[serde(default)]
    pub replies: Vec<Reply>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored post document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    #[serde(default)]
    pub author: Option<AuthorSnapshot>,
    pub content: PostContent,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub likes: LikeSet,
    #[serde(default)]
    pub children: Vec<Comment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency marker, bumped by the store on every write.
    #[serde(default)]
    pub version: i64,
    /// Store-assigned insertion sequence; final tie-breaker for ordering.
    #[serde(default)]
    pub seq: i64,
}

impl Post {
    pub fn kind(&self) -> PostKind {
        self.content.kind()
    }
}

/// Address of a node inside a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum NodePath {
    Post,
    Comment { comment_id: Uuid },
    Reply { comment_id: Uuid, reply_id: Uuid },
}

impl NodePath {
    pub fn from_ids(comment_id: Option<Uuid>, reply_id: Option<Uuid>) -> Option<Self> {
        match (comment_id, reply_id) {
            (None, None) => Some(NodePath::Post),
            (Some(comment_id), None) => Some(NodePath::Comment { comment_id }),
            (Some(comment_id), Some(reply_id)) => Some(NodePath::Reply {
                comment_id,
                reply_id,
            }),
            (None, Some(_)) => None,
        }
    }

    pub fn level(&self) -> NodeLevel {
        match self {
            NodePath::Post => NodeLevel::Post,
            NodePath::Comment { .. } => NodeLevel::Comment,
            NodePath::Reply { .. } => NodeLevel::Reply,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeLevel {
    Post,
    Comment,
    Reply,
}

impl fmt::Display for NodeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NodeLevel::Post => "post",
            NodeLevel::Comment => "comment",
            NodeLevel::Reply => "reply",
        })
    }
}
