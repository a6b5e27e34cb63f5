/// Comment handlers - comments/answers on a post and replies on a comment
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::posts::VersionQuery;
use crate::error::Result;
use crate::middleware::Caller;
use crate::models::{NodePath, UnifiedPost};
use crate::services::{ChildEdit, CommunityService, NewChild};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateChildRequest {
    #[validate(length(min = 1, max = 5000))]
    pub body: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateChildRequest {
    #[validate(length(min = 1, max = 5000))]
    pub body: String,
    pub expected_version: Option<i64>,
}

/// Created child: the updated post plus where the new node lives.
#[derive(Debug, Serialize)]
pub struct ChildCreatedResponse {
    pub path: NodePath,
    pub post: UnifiedPost,
}

async fn add(
    service: &CommunityService,
    caller: &Caller,
    post_id: Uuid,
    parent: NodePath,
    req: CreateChildRequest,
) -> Result<HttpResponse> {
    req.validate()?;
    let (post, path) = service
        .add_child(caller, post_id, parent, NewChild { body: req.body })
        .await?;
    Ok(HttpResponse::Created().json(ChildCreatedResponse { path, post }))
}

async fn edit(
    service: &CommunityService,
    caller: &Caller,
    post_id: Uuid,
    path: NodePath,
    req: UpdateChildRequest,
) -> Result<HttpResponse> {
    req.validate()?;
    let post = service
        .edit_child(
            caller,
            post_id,
            path,
            ChildEdit {
                body: req.body,
                expected_version: req.expected_version,
            },
        )
        .await?;
    Ok(HttpResponse::Ok().json(post))
}

/// POST /posts/{post_id}/children
pub async fn create_comment(
    service: web::Data<Arc<CommunityService>>,
    caller: Caller,
    post_id: web::Path<Uuid>,
    req: web::Json<CreateChildRequest>,
) -> Result<HttpResponse> {
    add(&service, &caller, *post_id, NodePath::Post, req.into_inner()).await
}

/// PUT /posts/{post_id}/children/{comment_id}
pub async fn update_comment(
    service: web::Data<Arc<CommunityService>>,
    caller: Caller,
    path: web::Path<(Uuid, Uuid)>,
    req: web::Json<UpdateChildRequest>,
) -> Result<HttpResponse> {
    let (post_id, comment_id) = path.into_inner();
    edit(
        &service,
        &caller,
        post_id,
        NodePath::Comment { comment_id },
        req.into_inner(),
    )
    .await
}

/// DELETE /posts/{post_id}/children/{comment_id}
pub async fn delete_comment(
    service: web::Data<Arc<CommunityService>>,
    caller: Caller,
    path: web::Path<(Uuid, Uuid)>,
    query: web::Query<VersionQuery>,
) -> Result<HttpResponse> {
    let (post_id, comment_id) = path.into_inner();
    let post = service
        .delete_child(
            &caller,
            post_id,
            NodePath::Comment { comment_id },
            query.expected_version,
        )
        .await?;
    Ok(HttpResponse::Ok().json(post))
}

/// PUT /posts/{post_id}/children/{comment_id}/like
pub async fn toggle_comment_like(
    service: web::Data<Arc<CommunityService>>,
    caller: Caller,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<HttpResponse> {
    let (post_id, comment_id) = path.into_inner();
    let state = service
        .toggle_like(&caller, post_id, NodePath::Comment { comment_id })
        .await?;
    Ok(HttpResponse::Ok().json(state))
}

/// POST /posts/{post_id}/children/{comment_id}/replies
pub async fn create_reply(
    service: web::Data<Arc<CommunityService>>,
    caller: Caller,
    path: web::Path<(Uuid, Uuid)>,
    req: web::Json<CreateChildRequest>,
) -> Result<HttpResponse> {
    let (post_id, comment_id) = path.into_inner();
    add(
        &service,
        &caller,
        post_id,
        NodePath::Comment { comment_id },
        req.into_inner(),
    )
    .await
}

/// PUT /posts/{post_id}/children/{comment_id}/replies/{reply_id}
pub async fn update_reply(
    service: web::Data<Arc<CommunityService>>,
    caller: Caller,
    path: web::Path<(Uuid, Uuid, Uuid)>,
    req: web::Json<UpdateChildRequest>,
) -> Result<HttpResponse> {
    let (post_id, comment_id, reply_id) = path.into_inner();
    edit(
        &service,
        &caller,
        post_id,
        NodePath::Reply {
            comment_id,
            reply_id,
        },
        req.into_inner(),
    )
    .await
}

/// DELETE /posts/{post_id}/children/{comment_id}/replies/{reply_id}
pub async fn delete_reply(
    service: web::Data<Arc<CommunityService>>,
    caller: Caller,
    path: web::Path<(Uuid, Uuid, Uuid)>,
    query: web::Query<VersionQuery>,
) -> Result<HttpResponse> {
    let (post_id, comment_id, reply_id) = path.into_inner();
    let post = service
        .delete_child(
            &caller,
            post_id,
            NodePath::Reply {
                comment_id,
                reply_id,
            },
            query.expected_version,
        )
        .await?;
    Ok(HttpResponse::Ok().json(post))
}

/// PUT /posts/{post_id}/children/{comment_id}/replies/{reply_id}/like
pub async fn toggle_reply_like(
    service: web::Data<Arc<CommunityService>>,
    caller: Caller,
    path: web::Path<(Uuid, Uuid, Uuid)>,
) -> Result<HttpResponse> {
    let (post_id, comment_id, reply_id) = path.into_inner();
    let state = service
        .toggle_like(
            &caller,
            post_id,
            NodePath::Reply {
                comment_id,
                reply_id,
            },
        )
        .await?;
    Ok(HttpResponse::Ok().json(state))
}
