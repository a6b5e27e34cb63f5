/// Thread Resolver
///
/// Store-backed lookup of a node and its owner chain. Not-found is an
/// ordinary result here, so callers can keep "does not exist" apart from
/// "exists but denied".
use uuid::Uuid;

use crate::db::{ContentStore, StoreError};
use crate::domain::thread::{self, MissingNode, OwnershipChain};
use crate::error::AppError;
use crate::models::{NodePath, Post};

#[derive(Debug, Clone)]
pub struct Located {
    pub post: Post,
    pub path: NodePath,
    pub chain: OwnershipChain,
}

#[derive(Debug, Clone)]
pub enum Resolution {
    Found(Located),
    Missing(MissingNode),
}

impl Resolution {
    /// Found node, or the boundary NotFound error.
    pub fn found(self) -> Result<Located, AppError> {
        match self {
            Resolution::Found(located) => Ok(located),
            Resolution::Missing(missing) => Err(missing.into()),
        }
    }
}

/// Locate `path` inside post `post_id`, searching both variants.
///
/// Only storage failures are errors; any unresolved segment yields
/// [`Resolution::Missing`].
pub async fn resolve(
    store: &dyn ContentStore,
    post_id: Uuid,
    path: NodePath,
) -> Result<Resolution, StoreError> {
    let Some(post) = store.get_by_id(post_id).await? else {
        return Ok(Resolution::Missing(MissingNode::Post(post_id)));
    };

    match thread::ownership(&post, &path) {
        Ok(chain) => Ok(Resolution::Found(Located { post, path, chain })),
        Err(missing) => Ok(Resolution::Missing(missing)),
    }
}
