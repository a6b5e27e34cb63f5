/// Post handlers - HTTP endpoints for post operations
use actix_web::{web, HttpResponse};
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::Caller;
use crate::models::{AnnouncementCategory, ImageAttachment, NodePath, PostKind};
use crate::services::{CommunityService, NewPost, PostEdit};

#[derive(Debug, Deserialize, Validate)]
pub struct ImagePayload {
    #[validate(length(min = 1))]
    pub content_type: String,
    /// Base64-encoded bytes
    #[validate(length(min = 1))]
    pub data: String,
}

impl ImagePayload {
    fn decode(self) -> Result<ImageAttachment> {
        let data = general_purpose::STANDARD
            .decode(self.data.as_bytes())
            .map_err(|_| AppError::validation("image", "image data is not valid base64"))?;
        Ok(ImageAttachment {
            content_type: self.content_type,
            data,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    pub kind: PostKind,
    #[validate(length(min = 1, max = 10000))]
    pub body: String,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub tags: Vec<String>,
    #[validate(length(max = 200))]
    pub title: Option<String>,
    pub category: Option<AnnouncementCategory>,
    #[validate(nested)]
    pub image: Option<ImagePayload>,
    #[serde(default)]
    #[validate(length(max = 10))]
    pub poll_options: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePostRequest {
    #[validate(length(min = 1, max = 10000))]
    pub body: Option<String>,
    #[validate(length(max = 20))]
    pub tags: Option<Vec<String>>,
    #[validate(length(max = 200))]
    pub title: Option<String>,
    pub expected_version: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct VersionQuery {
    pub expected_version: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub option_index: usize,
}

/// Create a question or announcement
pub async fn create_post(
    service: web::Data<Arc<CommunityService>>,
    caller: Caller,
    req: web::Json<CreatePostRequest>,
) -> Result<HttpResponse> {
    req.validate()?;
    let req = req.into_inner();

    let new_post = NewPost {
        kind: req.kind,
        body: req.body,
        tags: req.tags,
        title: req.title,
        category: req.category,
        image: req.image.map(ImagePayload::decode).transpose()?,
        poll_options: req.poll_options,
    };

    let post = service.create_post(&caller, new_post).await?;
    Ok(HttpResponse::Created().json(post))
}

/// Get a post by ID
pub async fn get_post(
    service: web::Data<Arc<CommunityService>>,
    caller: Caller,
    post_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let post = service.get_post(&caller, *post_id).await?;
    Ok(HttpResponse::Ok().json(post))
}

/// Edit a post's own fields (author only)
pub async fn update_post(
    service: web::Data<Arc<CommunityService>>,
    caller: Caller,
    post_id: web::Path<Uuid>,
    req: web::Json<UpdatePostRequest>,
) -> Result<HttpResponse> {
    req.validate()?;
    let req = req.into_inner();

    let post = service
        .edit_post(
            &caller,
            *post_id,
            PostEdit {
                body: req.body,
                tags: req.tags,
                title: req.title,
                expected_version: req.expected_version,
            },
        )
        .await?;

    Ok(HttpResponse::Ok().json(post))
}

/// Delete a post with its whole thread
pub async fn delete_post(
    service: web::Data<Arc<CommunityService>>,
    caller: Caller,
    post_id: web::Path<Uuid>,
    query: web::Query<VersionQuery>,
) -> Result<HttpResponse> {
    service
        .delete_post(&caller, *post_id, query.expected_version)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Toggle the caller's like on a post
pub async fn toggle_post_like(
    service: web::Data<Arc<CommunityService>>,
    caller: Caller,
    post_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let state = service
        .toggle_like(&caller, *post_id, NodePath::Post)
        .await?;
    Ok(HttpResponse::Ok().json(state))
}

/// Vote on an announcement poll
pub async fn vote_poll(
    service: web::Data<Arc<CommunityService>>,
    caller: Caller,
    post_id: web::Path<Uuid>,
    req: web::Json<VoteRequest>,
) -> Result<HttpResponse> {
    let post = service
        .vote_poll(&caller, *post_id, req.option_index)
        .await?;
    Ok(HttpResponse::Ok().json(post))
}

/// Posts authored by the caller
pub async fn get_my_posts(
    service: web::Data<Arc<CommunityService>>,
    caller: Caller,
) -> Result<HttpResponse> {
    let posts = service.list_authored_posts(&caller).await?;
    Ok(HttpResponse::Ok().json(posts))
}

/// Posts the caller commented, answered or replied on
pub async fn get_my_replies(
    service: web::Data<Arc<CommunityService>>,
    caller: Caller,
) -> Result<HttpResponse> {
    let posts = service.list_authored_children(&caller).await?;
    Ok(HttpResponse::Ok().json(posts))
}
