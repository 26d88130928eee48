//! Outbound event envelope and the bus it travels on.
//!
//! The control plane only ever publishes; extension runtimes subscribe.
//! Nothing here waits for a reply.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use crate::types::{Action, State};
use crate::wire::{ReleaseExtensionPayload, ReleasePayload};

/// Event name for a release dispatch.
pub const RELEASE_EVENT: &str = "release";

/// Event name addressed to one extension's channel: `release:<key>`.
pub fn extension_channel(extension_key: &str) -> String {
    format!("{RELEASE_EVENT}:{extension_key}")
}

/// Typed event body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum EventPayload {
    Release(Box<ReleasePayload>),
    ReleaseExtension(ReleaseExtensionPayload),
}

/// Extra key/value data attached to an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub key: String,
    pub value: serde_json::Value,
    pub secret: bool,
}

/// A single message on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub action: Action,
    pub state: State,
    pub state_message: String,
    pub payload: EventPayload,
    pub artifacts: Vec<Artifact>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// New event in `waiting` state with a fresh id.
    pub fn new(name: impl Into<String>, action: Action, payload: EventPayload) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            action,
            state: State::Waiting,
            state_message: String::new(),
            payload,
            artifacts: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_state(mut self, state: State, message: impl Into<String>) -> Self {
        self.state = state;
        self.state_message = message.into();
        self
    }

    pub fn add_artifact(&mut self, key: &str, value: serde_json::Value, secret: bool) {
        self.artifacts.push(Artifact {
            key: key.to_string(),
            value,
            secret,
        });
    }

    /// `name:action`, e.g. `release:create` or `release:dockerbuilder:create`.
    pub fn matcher(&self) -> String {
        format!("{}:{}", self.name, self.action.as_str())
    }

    pub fn matches(&self, pattern: &str) -> bool {
        self.matcher() == pattern
    }
}

/// Errors that can occur while publishing.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("event bus closed, dropped event {0}")]
    Closed(String),
}

/// Fire-and-forget publisher.
pub trait EventBus: Send + Sync {
    fn publish(&self, event: Event) -> Result<(), EventError>;
}

/// In-process bus backed by an unbounded tokio channel.
///
/// The receiving half is drained by a relay task (or directly by tests
/// via `try_recv`).
#[derive(Debug, Clone)]
pub struct ChannelBus {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelBus {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventBus for ChannelBus {
    fn publish(&self, event: Event) -> Result<(), EventError> {
        debug!(event = %event.name, action = event.action.as_str(), state = %event.state, "publishing event");
        self.tx
            .send(event)
            .map_err(|err| EventError::Closed(err.0.name))
    }
}
