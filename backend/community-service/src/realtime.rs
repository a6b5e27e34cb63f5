//! Realtime Notifier: fire-and-forget fan-out of community events
//!
//! Events are published after a mutation has been stored. Delivery is
//! at-most-once: a lagging or absent subscriber simply misses events, and
//! publishing never fails the mutation that triggered it.

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use futures::stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Event names carried on the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventName {
    #[serde(rename = "post.created")]
    PostCreated,
    #[serde(rename = "post.updated")]
    PostUpdated,
    #[serde(rename = "post.deleted")]
    PostDeleted,
    #[serde(rename = "child.added")]
    ChildAdded,
    #[serde(rename = "child.updated")]
    ChildUpdated,
    #[serde(rename = "child.deleted")]
    ChildDeleted,
    #[serde(rename = "like.toggled")]
    LikeToggled,
    #[serde(rename = "poll.voted")]
    PollVoted,
}

impl EventName {
    pub fn as_str(self) -> &'static str {
        match self {
            EventName::PostCreated => "post.created",
            EventName::PostUpdated => "post.updated",
            EventName::PostDeleted => "post.deleted",
            EventName::ChildAdded => "child.added",
            EventName::ChildUpdated => "child.updated",
            EventName::ChildDeleted => "child.deleted",
            EventName::LikeToggled => "like.toggled",
            EventName::PollVoted => "poll.voted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub name: EventName,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Capability handed to whichever operation needs to publish.
pub trait RealtimeNotifier: Send + Sync {
    fn publish(&self, name: EventName, payload: serde_json::Value);
}

/// In-process hub over a `tokio::sync::broadcast` channel.
pub struct BroadcastNotifier {
    channel: broadcast::Sender<Event>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (channel, _) = broadcast::channel(capacity.max(1));
        Self { channel }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.channel.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.channel.receiver_count()
    }
}

impl RealtimeNotifier for BroadcastNotifier {
    fn publish(&self, name: EventName, payload: serde_json::Value) {
        let event = Event {
            name,
            payload,
            timestamp: Utc::now(),
        };
        // Err only means nobody is listening
        if self.channel.send(event).is_err() {
            debug!(event = name.as_str(), "no realtime subscribers");
        }
    }
}

/// Stream events to a client as server-sent events.
///
/// GET /api/v1/community/events
pub async fn stream_events(hub: web::Data<BroadcastNotifier>) -> HttpResponse {
    let receiver = hub.subscribe();

    let events = stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let data = serde_json::to_string(&event.payload).unwrap_or_default();
                    let frame = format!("event: {}\ndata: {}\n\n", event.name.as_str(), data);
                    return Some((
                        Ok::<_, actix_web::Error>(web::Bytes::from(frame)),
                        receiver,
                    ));
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "realtime subscriber lagged; events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(events)
}
