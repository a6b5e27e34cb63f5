//! Reaction semantics: node likes and announcement poll votes.
//!
//! Both operate on a freshly read [`Post`] and mutate it in place; the store
//! layer is responsible for writing the result back conditionally.

use uuid::Uuid;

use super::thread::{locate_mut, MissingNode};
use crate::models::{NodePath, Post};

/// Flip `identity`'s membership in the like set of the node at `path`.
///
/// Returns whether the identity is now present. Does not touch `updated_at`:
/// a like is not an edit of the node.
pub fn toggle_like(
    post: &mut Post,
    path: &NodePath,
    identity: Uuid,
) -> Result<bool, MissingNode> {
    let node = locate_mut(post, path)?;
    Ok(node.likes.toggle(identity))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoteError {
    #[error("post {0} is not a poll")]
    NotAPoll(Uuid),
    #[error("option {index} is out of range (poll has {len} options)")]
    OptionOutOfRange { index: usize, len: usize },
}

/// Outcome of a vote: which option now holds the caller's vote and which one
/// it moved away from, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteOutcome {
    pub option_index: usize,
    pub previous: Option<usize>,
}

/// Record `voter`'s vote for `option_index`. A voter holds at most one vote
/// per poll; voting again moves it, voting for the same option is a no-op.
pub fn cast_vote(
    post: &mut Post,
    option_index: usize,
    voter: Uuid,
) -> Result<VoteOutcome, VoteError> {
    let post_id = post.id;
    let options = match post.content.announcement_mut() {
        Some(a) if !a.poll_options.is_empty() => &mut a.poll_options,
        _ => return Err(VoteError::NotAPoll(post_id)),
    };

    if option_index >= options.len() {
        return Err(VoteError::OptionOutOfRange {
            index: option_index,
            len: options.len(),
        });
    }

    let previous = options.iter().position(|o| o.voters.contains(&voter));
    if let Some(prev) = previous {
        options[prev].voters.remove(&voter);
    }
    options[option_index].voters.insert(voter);

    Ok(VoteOutcome {
        option_index,
        previous,
    })
}
