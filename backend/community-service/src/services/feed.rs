/// Feed Aggregator
///
/// Pulls both post variants, merges them into one newest-first sequence and
/// normalizes the requested slice. The merge order is total: `created_at`
/// descending, then variant (questions before announcements), then the
/// store's insertion sequence.
use base64::{engine::general_purpose, Engine as _};
use std::cmp::Ordering;
use tracing::debug;

use super::CommunityService;
use crate::db::Window;
use crate::error::{AppError, Result};
use crate::metrics::community::{FEED_REQUEST_DURATION_SECONDS, FEED_REQUEST_TOTAL};
use crate::middleware::Caller;
use crate::models::{FeedSlice, Post, PostKind};

/// Page request. Both fields optional: no limit (and no configured default)
/// means the whole feed.
#[derive(Debug, Clone, Default)]
pub struct FeedPage {
    pub limit: Option<usize>,
    pub cursor: Option<String>,
}

pub fn merge_order(a: &Post, b: &Post) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| a.kind().cmp(&b.kind()))
        .then_with(|| a.seq.cmp(&b.seq))
}

/// Concatenate and sort. Stable, so equal keys keep their input order.
pub fn merge(questions: Vec<Post>, announcements: Vec<Post>) -> Vec<Post> {
    let mut merged = questions;
    merged.extend(announcements);
    merged.sort_by(merge_order);
    merged
}

pub fn encode_cursor(offset: usize) -> String {
    general_purpose::STANDARD.encode(offset.to_string())
}

pub fn decode_cursor(cursor: Option<&str>) -> Result<usize> {
    match cursor {
        Some(cursor) => {
            let decoded = general_purpose::STANDARD
                .decode(cursor)
                .map_err(|_| AppError::validation("cursor", "invalid cursor format"))?;

            let offset = String::from_utf8(decoded)
                .map_err(|_| AppError::validation("cursor", "invalid cursor encoding"))?;

            let offset = offset
                .parse::<usize>()
                .map_err(|_| AppError::validation("cursor", "invalid cursor value"))?;

            // Storage offsets are signed 64-bit
            if i64::try_from(offset).is_err() {
                return Err(AppError::validation("cursor", "cursor out of range"));
            }
            Ok(offset)
        }
        None => Ok(0),
    }
}

impl CommunityService {
    /// Merged feed visible to any authenticated caller.
    pub async fn get_feed(&self, caller: &Caller, page: FeedPage) -> Result<FeedSlice> {
        let offset = decode_cursor(page.cursor.as_deref())?;
        let limit = page
            .limit
            .or(self.settings.feed_default_page_size)
            .map(|l| l.clamp(1, self.settings.feed_max_page_size.max(1)));

        let mode = if limit.is_some() { "paged" } else { "full" };
        FEED_REQUEST_TOTAL.with_label_values(&[mode]).inc();
        let _timer = FEED_REQUEST_DURATION_SECONDS
            .with_label_values(&[mode])
            .start_timer();

        debug!(caller = %caller.identity, ?limit, offset, "feed request");

        // Top `offset + limit` of the merge always come from the top
        // `offset + limit` of each variant.
        let window = match limit {
            Some(limit) => Window::head(offset.saturating_add(limit)),
            None => Window::all(),
        };

        let (questions, announcements) = tokio::try_join!(
            self.store.list(PostKind::Question, window),
            self.store.list(PostKind::Announcement, window),
        )?;

        let (total_count, page_posts) = match limit {
            Some(limit) => {
                let (q_total, a_total) = tokio::try_join!(
                    self.store.count(PostKind::Question),
                    self.store.count(PostKind::Announcement),
                )?;
                let merged = merge(questions, announcements);
                let slice: Vec<Post> = merged.into_iter().skip(offset).take(limit).collect();
                (q_total + a_total, slice)
            }
            None => {
                let merged = merge(questions, announcements);
                let total = merged.len();
                (total, merged.into_iter().skip(offset).collect())
            }
        };

        let next_offset = offset + page_posts.len();
        let has_more = next_offset < total_count;
        let cursor = if has_more && !page_posts.is_empty() {
            Some(encode_cursor(next_offset))
        } else {
            None
        };

        let posts = self.normalizer.normalize_many(&page_posts).await;

        Ok(FeedSlice {
            posts,
            cursor,
            has_more,
            total_count,
        })
    }
}
