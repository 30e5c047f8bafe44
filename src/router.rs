use crate::broker::{MessageHandler, Subscriber};
use crate::engine::SpeechSink;
use crate::error::BridgeResult;
use async_trait::async_trait;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const UNKNOWN_TOPIC: &str = "/ttv/unknown";
pub const INBOUND_TOPIC: &str = "/ttv/inbound";
pub const OUTBOUND_TOPIC: &str = "/ttv/outbound";

/// The three announcement channels, in subscription order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Announcement {
    /// A tag that has not been registered yet.
    Unknown,
    Inbound,
    Outbound,
}

impl Announcement {
    pub const ALL: [Announcement; 3] = [
        Announcement::Unknown,
        Announcement::Inbound,
        Announcement::Outbound,
    ];

    pub fn from_topic(topic: &str) -> Option<Self> {
        match topic {
            UNKNOWN_TOPIC => Some(Announcement::Unknown),
            INBOUND_TOPIC => Some(Announcement::Inbound),
            OUTBOUND_TOPIC => Some(Announcement::Outbound),
            _ => None,
        }
    }

    pub fn topic(self) -> &'static str {
        match self {
            Announcement::Unknown => UNKNOWN_TOPIC,
            Announcement::Inbound => INBOUND_TOPIC,
            Announcement::Outbound => OUTBOUND_TOPIC,
        }
    }

    pub fn phrase(self, username: &str) -> String {
        match self {
            Announcement::Unknown => "unknown user detected".to_string(),
            Announcement::Inbound => format!("welcome {}", username),
            Announcement::Outbound => format!("goodbye {}", username),
        }
    }
}

/// Phrase to speak for `topic`, or `None` when the topic is not announced.
pub fn phrase_for(topic: &str, username: &str) -> Option<String> {
    Announcement::from_topic(topic).map(|a| a.phrase(username))
}

/// Turns broker messages into speech.
pub struct Router {
    sink: Arc<dyn SpeechSink>,
}

impl Router {
    pub fn new(sink: Arc<dyn SpeechSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl MessageHandler for Router {
    async fn on_connect(&self, subscriber: &dyn Subscriber) -> BridgeResult<()> {
        for announcement in Announcement::ALL {
            subscriber.subscribe(announcement.topic()).await?;
            info!("Subscribed to {}", announcement.topic());
        }
        Ok(())
    }

    async fn on_message(&self, topic: &str, payload: &[u8]) -> BridgeResult<()> {
        let username = String::from_utf8_lossy(payload);
        if matches!(username, Cow::Owned(_)) {
            warn!(topic, "payload is not valid UTF-8, decoded lossily");
        }

        let Some(phrase) = phrase_for(topic, &username) else {
            debug!(topic, "ignoring message on unannounced topic");
            return Ok(());
        };

        info!("Announcing: {}", phrase);
        self.sink.speak(&phrase).await?;
        Ok(())
    }
}
