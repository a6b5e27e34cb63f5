/// Comment service - comments/answers and replies inside a post
///
/// Any authenticated caller may reply. Editing is author-only; deletion
/// follows the owner / post owner / privileged-role tiers.
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::{record, require_text, CommunityService};
use crate::db::{NodePatch, Removed};
use crate::domain::NewNode;
use crate::error::{AppError, Result};
use crate::middleware::{Action, Caller};
use crate::models::{NodePath, UnifiedPost};
use crate::realtime::EventName;

#[derive(Debug, Clone)]
pub struct NewChild {
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct ChildEdit {
    pub body: String,
    pub expected_version: Option<i64>,
}

/// A child path; the post itself is not a child.
fn require_child(path: NodePath) -> Result<NodePath> {
    match path {
        NodePath::Post => Err(AppError::validation(
            "path",
            "a comment or reply id is required",
        )),
        child => Ok(child),
    }
}

impl CommunityService {
    /// Add a comment (parent = post) or a reply (parent = comment).
    ///
    /// Returns the updated post and the path of the new node.
    pub async fn add_child(
        &self,
        caller: &Caller,
        post_id: Uuid,
        parent: NodePath,
        child: NewChild,
    ) -> Result<(UnifiedPost, NodePath)> {
        let result = self.add_child_inner(caller, post_id, parent, child).await;
        record("reply", &result);
        result
    }

    async fn add_child_inner(
        &self,
        caller: &Caller,
        post_id: Uuid,
        parent: NodePath,
        child: NewChild,
    ) -> Result<(UnifiedPost, NodePath)> {
        require_text("body", &child.body)?;
        if let NodePath::Reply { .. } = parent {
            return Err(AppError::validation(
                "path",
                "replies cannot be nested below another reply",
            ));
        }

        self.locate_for(caller, post_id, parent, Action::Reply).await?;

        let node = NewNode::new(caller.identity, Some(self.snapshot_of(caller).await), child.body);
        let (updated, path) = self.store.append_child(post_id, parent, node).await?;
        info!(post_id = %post_id, level = %path.level(), author = %caller.identity, "child added");

        let view = self.normalizer.normalize(&updated).await;
        self.publish(
            EventName::ChildAdded,
            json!({ "post_id": post_id, "path": path, "post": view }),
        );
        Ok((view, path))
    }

    pub async fn edit_child(
        &self,
        caller: &Caller,
        post_id: Uuid,
        path: NodePath,
        edit: ChildEdit,
    ) -> Result<UnifiedPost> {
        let result = self.edit_child_inner(caller, post_id, path, edit).await;
        record("edit", &result);
        result
    }

    async fn edit_child_inner(
        &self,
        caller: &Caller,
        post_id: Uuid,
        path: NodePath,
        edit: ChildEdit,
    ) -> Result<UnifiedPost> {
        let path = require_child(path)?;
        require_text("body", &edit.body)?;

        self.locate_for(caller, post_id, path, Action::EditContent)
            .await?;

        let updated = self
            .store
            .replace_node(post_id, path, NodePatch::body(edit.body), edit.expected_version)
            .await?;
        info!(post_id = %post_id, level = %path.level(), caller = %caller.identity, "child edited");

        let view = self.normalizer.normalize(&updated).await;
        self.publish(
            EventName::ChildUpdated,
            json!({ "post_id": post_id, "path": path, "post": view }),
        );
        Ok(view)
    }

    pub async fn delete_child(
        &self,
        caller: &Caller,
        post_id: Uuid,
        path: NodePath,
        expected_version: Option<i64>,
    ) -> Result<UnifiedPost> {
        let result = self
            .delete_child_inner(caller, post_id, path, expected_version)
            .await;
        record("delete", &result);
        result
    }

    async fn delete_child_inner(
        &self,
        caller: &Caller,
        post_id: Uuid,
        path: NodePath,
        expected_version: Option<i64>,
    ) -> Result<UnifiedPost> {
        let path = require_child(path)?;
        let located = self
            .locate_for(caller, post_id, path, Action::DeleteContent)
            .await?;

        let updated = match self.store.remove_node(post_id, path, expected_version).await? {
            Removed::Child(post) => post,
            Removed::Post(_) => {
                return Err(AppError::Internal("child removal deleted the post".into()))
            }
        };
        info!(
            post_id = %post_id,
            level = %path.level(),
            caller = %caller.identity,
            node_owner = %located.chain.node_owner,
            "child deleted"
        );

        let view = self.normalizer.normalize(&updated).await;
        self.publish(
            EventName::ChildDeleted,
            json!({ "post_id": post_id, "path": path }),
        );
        Ok(view)
    }
}
