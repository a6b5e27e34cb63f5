use actix_web::{web, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::Result;
use crate::middleware::Caller;
use crate::services::{CommunityService, FeedPage};

#[derive(Debug, Deserialize)]
pub struct FeedQueryParams {
    pub limit: Option<usize>,
    pub cursor: Option<String>,
}

/// Merged feed of questions and announcements, newest first.
///
/// GET /api/v1/community/feed?limit=&cursor=
pub async fn get_feed(
    service: web::Data<Arc<CommunityService>>,
    caller: Caller,
    query: web::Query<FeedQueryParams>,
) -> Result<HttpResponse> {
    let query = query.into_inner();
    let slice = service
        .get_feed(
            &caller,
            FeedPage {
                limit: query.limit,
                cursor: query.cursor,
            },
        )
        .await?;

    Ok(HttpResponse::Ok().json(slice))
}
