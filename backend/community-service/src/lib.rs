/// Community Service Library
///
/// Campus community board: questions from members, announcements and polls
/// from organizers and institutions, each with a two-level thread of
/// comments/answers and replies, likes on every node, and one merged feed.
///
/// # Modules
///
/// - `handlers`: HTTP request handlers
/// - `models`: Post documents and their rendered views
/// - `domain`: Roles, thread navigation, likes and poll votes
/// - `services`: Business logic layer (feed, posts, comments, likes)
/// - `db`: Content store trait, PostgreSQL and in-memory stores
/// - `cache`: Profile lookup caching
/// - `middleware`: JWT authentication and authorization rules
/// - `realtime`: Change notifications and the SSE stream
/// - `error`: Error types and handling
/// - `config`: Configuration management
/// - `metrics`: Observability and metrics collection
pub mod cache;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod realtime;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};
