/// Navigation and surgery on the two-level comment tree of a single post.
///
/// Everything here is pure: no storage, no authorization. Lookups never
/// partially succeed: either the whole path resolves or the first missing
/// segment is reported.
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    AuthorSnapshot, Comment, LikeSet, NodeLevel, NodePath, Post, PostKind, Reply,
};

/// The first path segment that failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MissingNode {
    #[error("post {0} not found")]
    Post(Uuid),
    #[error("comment {0} not found")]
    Comment(Uuid),
    #[error("reply {0} not found")]
    Reply(Uuid),
}

impl MissingNode {
    pub fn level(&self) -> NodeLevel {
        match self {
            MissingNode::Post(_) => NodeLevel::Post,
            MissingNode::Comment(_) => NodeLevel::Comment,
            MissingNode::Reply(_) => NodeLevel::Reply,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AttachError {
    #[error(transparent)]
    Missing(#[from] MissingNode),
    #[error("replies cannot be nested below another reply")]
    DepthExceeded,
}

/// Borrowed view of a resolved node.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Post(&'a Post),
    Comment(&'a Comment),
    Reply(&'a Reply),
}

impl<'a> NodeRef<'a> {
    pub fn author_id(&self) -> Uuid {
        match self {
            NodeRef::Post(p) => p.author_id,
            NodeRef::Comment(c) => c.author_id,
            NodeRef::Reply(r) => r.author_id,
        }
    }

    pub fn likes(&self) -> &'a LikeSet {
        match self {
            NodeRef::Post(p) => &p.likes,
            NodeRef::Comment(c) => &c.likes,
            NodeRef::Reply(r) => &r.likes,
        }
    }

    pub fn body(&self) -> &'a str {
        match self {
            NodeRef::Post(p) => &p.body,
            NodeRef::Comment(c) => &c.body,
            NodeRef::Reply(r) => &r.body,
        }
    }
}

/// Mutable handles on the fields a node mutation may touch.
pub struct NodeMut<'a> {
    pub body: &'a mut String,
    pub likes: &'a mut LikeSet,
    pub updated_at: &'a mut DateTime<Utc>,
}

/// Owner chain for a resolved node: who wrote it and who owns the post that
/// transitively contains it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnershipChain {
    pub post_id: Uuid,
    pub post_kind: PostKind,
    pub level: NodeLevel,
    pub node_owner: Uuid,
    pub post_owner: Uuid,
}

/// Content of a child about to be attached.
#[derive(Debug, Clone)]
pub struct NewNode {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author: Option<AuthorSnapshot>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl NewNode {
    pub fn new(author_id: Uuid, author: Option<AuthorSnapshot>, body: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            author_id,
            author,
            body,
            created_at: Utc::now(),
        }
    }
}

fn find_comment<'a>(post: &'a Post, comment_id: Uuid) -> Result<&'a Comment, MissingNode> {
    post.children
        .iter()
        .find(|c| c.id == comment_id)
        .ok_or(MissingNode::Comment(comment_id))
}

fn find_comment_mut(post: &mut Post, comment_id: Uuid) -> Result<&mut Comment, MissingNode> {
    post.children
        .iter_mut()
        .find(|c| c.id == comment_id)
        .ok_or(MissingNode::Comment(comment_id))
}

pub fn locate<'a>(post: &'a Post, path: &NodePath) -> Result<NodeRef<'a>, MissingNode> {
    match *path {
        NodePath::Post => Ok(NodeRef::Post(post)),
        NodePath::Comment { comment_id } => find_comment(post, comment_id).map(NodeRef::Comment),
        NodePath::Reply {
            comment_id,
            reply_id,
        } => {
            let comment = find_comment(post, comment_id)?;
            comment
                .replies
                .iter()
                .find(|r| r.id == reply_id)
                .map(NodeRef::Reply)
                .ok_or(MissingNode::Reply(reply_id))
        }
    }
}

pub fn locate_mut<'a>(post: &'a mut Post, path: &NodePath) -> Result<NodeMut<'a>, MissingNode> {
    match *path {
        NodePath::Post => Ok(NodeMut {
            body: &mut post.body,
            likes: &mut post.likes,
            updated_at: &mut post.updated_at,
        }),
        NodePath::Comment { comment_id } => {
            let comment = find_comment_mut(post, comment_id)?;
            Ok(NodeMut {
                body: &mut comment.body,
                likes: &mut comment.likes,
                updated_at: &mut comment.updated_at,
            })
        }
        NodePath::Reply {
            comment_id,
            reply_id,
        } => {
            let comment = find_comment_mut(post, comment_id)?;
            let reply = comment
                .replies
                .iter_mut()
                .find(|r| r.id == reply_id)
                .ok_or(MissingNode::Reply(reply_id))?;
            Ok(NodeMut {
                body: &mut reply.body,
                likes: &mut reply.likes,
                updated_at: &mut reply.updated_at,
            })
        }
    }
}

pub fn ownership(post: &Post, path: &NodePath) -> Result<OwnershipChain, MissingNode> {
    let node = locate(post, path)?;
    Ok(OwnershipChain {
        post_id: post.id,
        post_kind: post.kind(),
        level: path.level(),
        node_owner: node.author_id(),
        post_owner: post.author_id,
    })
}

/// Attach `node` under `parent`, returning the new node's path.
///
/// A post parent yields a comment, a comment parent yields a reply; a reply
/// parent is rejected to keep the tree at two levels.
pub fn attach_child(
    post: &mut Post,
    parent: &NodePath,
    node: NewNode,
) -> Result<NodePath, AttachError> {
    match *parent {
        NodePath::Post => {
            let comment_id = node.id;
            post.children.push(Comment {
                id: node.id,
                author_id: node.author_id,
                author: node.author,
                body: node.body,
                likes: LikeSet::new(),
                replies: Vec::new(),
                created_at: node.created_at,
                updated_at: node.created_at,
            });
            Ok(NodePath::Comment { comment_id })
        }
        NodePath::Comment { comment_id } => {
            let comment = find_comment_mut(post, comment_id)?;
            let reply_id = node.id;
            comment.replies.push(Reply {
                id: node.id,
                author_id: node.author_id,
                author: node.author,
                body: node.body,
                likes: LikeSet::new(),
                created_at: node.created_at,
                updated_at: node.created_at,
            });
            Ok(NodePath::Reply {
                comment_id,
                reply_id,
            })
        }
        NodePath::Reply { .. } => Err(AttachError::DepthExceeded),
    }
}

/// Remove a comment (with its replies) or a single reply.
pub fn detach_child(
    post: &mut Post,
    comment_id: Uuid,
    reply_id: Option<Uuid>,
) -> Result<(), MissingNode> {
    match reply_id {
        None => {
            let before = post.children.len();
            post.children.retain(|c| c.id != comment_id);
            if post.children.len() == before {
                return Err(MissingNode::Comment(comment_id));
            }
        }
        Some(reply_id) => {
            let comment = find_comment_mut(post, comment_id)?;
            let before = comment.replies.len();
            comment.replies.retain(|r| r.id != reply_id);
            if comment.replies.len() == before {
                return Err(MissingNode::Reply(reply_id));
            }
        }
    }
    Ok(())
}

/// Whether `identity` wrote any comment or reply in `post`.
pub fn has_child_by(post: &Post, identity: Uuid) -> bool {
    post.children.iter().any(|c| {
        c.author_id == identity || c.replies.iter().any(|r| r.author_id == identity)
    })
}
