/// HTTP handlers for community endpoints
///
/// This module contains handlers for:
/// - Feed: merged question/announcement feed
/// - Posts: create, read, edit, delete, like, poll vote, authored listings
/// - Comments: comment/answer and reply CRUD plus likes
///
/// Every route below requires a bearer token; see [`crate::middleware`].
pub mod comments;
pub mod feed;
pub mod posts;

pub use comments::{
    create_comment, create_reply, delete_comment, delete_reply, toggle_comment_like,
    toggle_reply_like, update_comment, update_reply,
};
pub use feed::get_feed;
pub use posts::{
    create_post, delete_post, get_my_posts, get_my_replies, get_post, toggle_post_like,
    update_post, vote_poll,
};

use actix_web::web;

use crate::realtime::stream_events;

/// Register every community route under the caller's scope.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/feed", web::get().to(get_feed))
        .route("/events", web::get().to(stream_events))
        .route("/children/mine", web::get().to(get_my_replies))
        .service(
            web::scope("/posts")
                .service(web::resource("").route(web::post().to(create_post)))
                .service(web::resource("/mine").route(web::get().to(get_my_posts)))
                .service(
                    web::resource("/{post_id}")
                        .route(web::get().to(get_post))
                        .route(web::put().to(update_post))
                        .route(web::delete().to(delete_post)),
                )
                .route("/{post_id}/like", web::put().to(toggle_post_like))
                .route("/{post_id}/vote", web::put().to(vote_poll))
                .route("/{post_id}/children", web::post().to(create_comment))
                .service(
                    web::resource("/{post_id}/children/{comment_id}")
                        .route(web::put().to(update_comment))
                        .route(web::delete().to(delete_comment)),
                )
                .route(
                    "/{post_id}/children/{comment_id}/like",
                    web::put().to(toggle_comment_like),
                )
                .route(
                    "/{post_id}/children/{comment_id}/replies",
                    web::post().to(create_reply),
                )
                .service(
                    web::resource("/{post_id}/children/{comment_id}/replies/{reply_id}")
                        .route(web::put().to(update_reply))
                        .route(web::delete().to(delete_reply)),
                )
                .route(
                    "/{post_id}/children/{comment_id}/replies/{reply_id}/like",
                    web::put().to(toggle_reply_like),
                ),
        );
}
