//! Change events and subscription handles.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::access::Role;
use crate::error::Result;
use crate::types::{Product, ProductId};

/// Configuration for the broadcaster.
#[derive(Clone, Debug)]
pub struct BroadcastConfig {
    /// Max buffered notifications per subscriber before it is dropped.
    /// Default: 256
    pub buffer_size: usize,

    /// Bounded wait for a full subscriber queue. `None` never waits.
    pub send_timeout: Option<Duration>,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            buffer_size: 256,
            send_timeout: None,
        }
    }
}

/// What happened to a product.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    /// Event name carried in the wire frame.
    pub fn event_name(&self) -> &'static str {
        match self {
            ChangeKind::Created => "product.created",
            ChangeKind::Updated => "product.updated",
            ChangeKind::Deleted => "product.deleted",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name())
    }
}

/// Body of a change event: the full record, or only its identity for deletes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventPayload {
    Record(Product),
    Identity { id: ProductId },
}

/// A committed mutation, ready to fan out.
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub payload: EventPayload,
}

#[derive(Serialize)]
struct WireEvent<'a> {
    event: &'static str,
    data: &'a EventPayload,
}

impl ChangeEvent {
    pub fn created(product: Product) -> Self {
        Self {
            kind: ChangeKind::Created,
            payload: EventPayload::Record(product),
        }
    }

    pub fn updated(product: Product) -> Self {
        Self {
            kind: ChangeKind::Updated,
            payload: EventPayload::Record(product),
        }
    }

    pub fn deleted(id: ProductId) -> Self {
        Self {
            kind: ChangeKind::Deleted,
            payload: EventPayload::Identity { id },
        }
    }

    /// Id of the affected product.
    pub fn product_id(&self) -> ProductId {
        match &self.payload {
            EventPayload::Record(product) => product.id,
            EventPayload::Identity { id } => *id,
        }
    }

    /// Serialize to `{"event": ..., "data": ...}`.
    pub fn to_frame(&self) -> Result<Frame> {
        let json = serde_json::to_string(&WireEvent {
            event: self.kind.event_name(),
            data: &self.payload,
        })?;
        Ok(Frame(Arc::from(json)))
    }
}

/// A serialized event, shared by every subscriber it is delivered to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame(Arc<str>);

impl Frame {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the frame back into JSON.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.0)?)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a subscriber receives.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    /// A change frame, in publish order.
    Change(Frame),
    /// The subscription ended; nothing follows.
    Dropped { reason: DropReason },
}

/// Why a subscriber was removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// The bounded send wait elapsed.
    Timeout,
    /// Receiver went away.
    Disconnected,
    /// Explicitly unsubscribed.
    Unsubscribed,
    /// Broadcaster closed.
    Shutdown,
}

/// Outcome of one publish.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub dropped: usize,
}

/// Unique identifier for a subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Receiving side of a subscription.
pub struct SubscriptionHandle {
    pub id: SubscriberId,
    pub partition: Option<Role>,
    /// Channel to receive notifications.
    pub receiver: crossbeam_channel::Receiver<Notification>,
}

impl SubscriptionHandle {
    /// Receive the next notification (blocking).
    pub fn recv(&self) -> std::result::Result<Notification, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a notification (non-blocking).
    pub fn try_recv(&self) -> std::result::Result<Notification, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> std::result::Result<Notification, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Next change frame; `None` on timeout or once the subscription ended.
    pub fn next_frame(&self, timeout: Duration) -> Option<Frame> {
        match self.receiver.recv_timeout(timeout) {
            Ok(Notification::Change(frame)) => Some(frame),
            _ => None,
        }
    }
}
