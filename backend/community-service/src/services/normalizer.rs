/// Post Normalizer
///
/// Renders a stored post of either variant into the single [`UnifiedPost`]
/// shape, attaching display fields for every author in the tree. Display
/// fields resolve per field, in order: live profile record, author snapshot
/// embedded on the node, fixed fallback. Profile lookup failures degrade to
/// the next tier; normalization itself never fails.
use futures::future::join_all;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::db::{Profile, ProfileLookup};
use crate::domain::{canonicalize, CanonicalRole, Role};
use crate::metrics::community::UNRECOGNIZED_ROLES_TOTAL;
use crate::models::{
    AuthorSnapshot, Comment, DisplayProfile, PollOptionView, Post, PostKind, Reply, UnifiedNode,
    UnifiedPost,
};

pub const UNKNOWN_USER: &str = "Unknown User";
pub const DEFAULT_AVATAR: &str = "/default-avatar.png";

type ProfileMap = HashMap<Uuid, Profile>;

#[derive(Clone)]
pub struct PostNormalizer {
    profiles: Arc<dyn ProfileLookup>,
}

impl PostNormalizer {
    pub fn new(profiles: Arc<dyn ProfileLookup>) -> Self {
        Self { profiles }
    }

    /// Live profile for one identity; lookup errors are logged and read as
    /// "no profile".
    pub async fn profile_of(&self, identity: Uuid) -> Option<Profile> {
        match self.profiles.get_profile(identity).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(
                    %identity,
                    error = %e,
                    "profile lookup failed; using fallback display fields"
                );
                None
            }
        }
    }

    pub async fn normalize(&self, post: &Post) -> UnifiedPost {
        let profiles = self.load_profiles(std::slice::from_ref(post)).await;
        render_post(post, &profiles)
    }

    /// Normalize a batch, looking up each distinct author once.
    pub async fn normalize_many(&self, posts: &[Post]) -> Vec<UnifiedPost> {
        let profiles = self.load_profiles(posts).await;
        posts.iter().map(|p| render_post(p, &profiles)).collect()
    }

    async fn load_profiles(&self, posts: &[Post]) -> ProfileMap {
        let mut authors = BTreeSet::new();
        for post in posts {
            authors.insert(post.author_id);
            for comment in &post.children {
                authors.insert(comment.author_id);
                authors.extend(comment.replies.iter().map(|r| r.author_id));
            }
        }

        let lookups = authors.into_iter().map(|identity| async move {
            self.profile_of(identity).await.map(|p| (identity, p))
        });

        join_all(lookups).await.into_iter().flatten().collect()
    }
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn known_role(raw: Option<&String>, source: &'static str, author_id: Uuid) -> Option<Role> {
    let raw = raw?;
    match canonicalize(raw) {
        CanonicalRole::Known(role) => Some(role),
        CanonicalRole::Missing => None,
        CanonicalRole::Unrecognized => {
            UNRECOGNIZED_ROLES_TOTAL.with_label_values(&[source]).inc();
            warn!(author_id = %author_id, raw_role = %raw, source, "unrecognized stored role");
            None
        }
    }
}

/// Resolve display fields for one author.
pub fn resolve_display(
    author_id: Uuid,
    snapshot: Option<&AuthorSnapshot>,
    profile: Option<&Profile>,
    fallback_role: Role,
) -> DisplayProfile {
    let name = non_blank(profile.and_then(|p| p.display_name.as_ref()))
        .or_else(|| non_blank(snapshot.and_then(|s| s.name.as_ref())))
        .unwrap_or(UNKNOWN_USER);

    let avatar = non_blank(profile.and_then(|p| p.avatar_url.as_ref()))
        .or_else(|| non_blank(snapshot.and_then(|s| s.avatar.as_ref())))
        .unwrap_or(DEFAULT_AVATAR);

    let role = known_role(profile.and_then(|p| p.role.as_ref()), "profile", author_id)
        .or_else(|| known_role(snapshot.and_then(|s| s.role.as_ref()), "snapshot", author_id))
        .unwrap_or(fallback_role);

    DisplayProfile {
        display_name: name.to_string(),
        display_avatar: avatar.to_string(),
        display_role: role.label().to_string(),
    }
}

fn render_reply(reply: &Reply, profiles: &ProfileMap) -> UnifiedNode {
    UnifiedNode {
        id: reply.id,
        author_id: reply.author_id,
        profile: resolve_display(
            reply.author_id,
            reply.author.as_ref(),
            profiles.get(&reply.author_id),
            Role::Member,
        ),
        body: reply.body.clone(),
        likes: reply.likes.to_vec(),
        like_count: reply.likes.len(),
        created_at: reply.created_at,
        updated_at: reply.updated_at,
        replies: Vec::new(),
    }
}

fn render_comment(comment: &Comment, profiles: &ProfileMap) -> UnifiedNode {
    UnifiedNode {
        id: comment.id,
        author_id: comment.author_id,
        profile: resolve_display(
            comment.author_id,
            comment.author.as_ref(),
            profiles.get(&comment.author_id),
            Role::Member,
        ),
        body: comment.body.clone(),
        likes: comment.likes.to_vec(),
        like_count: comment.likes.len(),
        created_at: comment.created_at,
        updated_at: comment.updated_at,
        replies: comment
            .replies
            .iter()
            .map(|r| render_reply(r, profiles))
            .collect(),
    }
}

fn render_post(post: &Post, profiles: &ProfileMap) -> UnifiedPost {
    // Announcements without any role data were written by organizers
    let fallback_role = match post.kind() {
        PostKind::Announcement => Role::Organizer,
        PostKind::Question => Role::Member,
    };
    let announcement = post.content.announcement();

    UnifiedPost {
        id: post.id,
        kind: post.kind(),
        author_id: post.author_id,
        profile: resolve_display(
            post.author_id,
            post.author.as_ref(),
            profiles.get(&post.author_id),
            fallback_role,
        ),
        body: post.body.clone(),
        title: announcement.and_then(|a| a.title.clone()),
        category: announcement.map(|a| a.category),
        image: announcement
            .and_then(|a| a.image.as_ref())
            .map(|img| img.to_data_url()),
        poll_options: announcement
            .map(|a| {
                a.poll_options
                    .iter()
                    .map(|o| PollOptionView {
                        label: o.label.clone(),
                        vote_count: o.vote_count(),
                    })
                    .collect()
            })
            .unwrap_or_default(),
        tags: post.tags.clone(),
        likes: post.likes.to_vec(),
        like_count: post.likes.len(),
        created_at: post.created_at,
        updated_at: post.updated_at,
        version: post.version,
        children: post
            .children
            .iter()
            .map(|c| render_comment(c, profiles))
            .collect(),
    }
}
