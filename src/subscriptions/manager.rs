//! Broadcaster fanning change events out to subscribers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam_channel::{bounded, SendTimeoutError, Sender, TrySendError};
use parking_lot::RwLock;
use tracing::{debug, error, warn};

use crate::access::Role;

use super::types::{
    BroadcastConfig, ChangeEvent, DropReason, Frame, Notification, PublishReport, SubscriberId,
    SubscriptionHandle,
};

type Partition = Option<Role>;

/// Internal subscriber state.
struct Subscriber {
    sender: Sender<Notification>,
}

/// Registry of subscribers grouped by partition.
///
/// Membership changes take the write lock; publishing only holds the read
/// lock long enough to snapshot the senders, so a stalled subscriber never
/// blocks registration.
pub struct Broadcaster {
    partitions: RwLock<HashMap<Partition, HashMap<SubscriberId, Subscriber>>>,
    /// Counter for generating subscriber IDs.
    next_id: AtomicU64,
    config: BroadcastConfig,
    closed: AtomicBool,
}

impl Broadcaster {
    pub fn new(config: BroadcastConfig) -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            config,
            closed: AtomicBool::new(false),
        }
    }

    /// Register a subscriber under `partition`.
    ///
    /// After `close` the returned handle is already disconnected.
    pub fn subscribe(&self, partition: Option<Role>) -> SubscriptionHandle {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(self.config.buffer_size.max(1));

        if !self.closed.load(Ordering::SeqCst) {
            let mut partitions = self.partitions.write();
            // Re-check under the lock so `close` cannot miss this subscriber.
            if !self.closed.load(Ordering::SeqCst) {
                partitions
                    .entry(partition)
                    .or_default()
                    .insert(id, Subscriber { sender });
                debug!(subscriber = %id, partition = ?partition, "subscriber added");
            }
        }

        SubscriptionHandle {
            id,
            partition,
            receiver,
        }
    }

    /// Remove a subscriber. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = {
            let mut partitions = self.partitions.write();
            let removed = partitions
                .values_mut()
                .find_map(|members| members.remove(&id));
            partitions.retain(|_, members| !members.is_empty());
            removed
        };

        match removed {
            Some(sub) => {
                // Best effort
                let _ = sub.sender.try_send(Notification::Dropped {
                    reason: DropReason::Unsubscribed,
                });
                debug!(subscriber = %id, "subscriber removed");
                true
            }
            None => false,
        }
    }

    /// Get subscriber count across all partitions.
    pub fn subscriber_count(&self) -> usize {
        self.partitions.read().values().map(HashMap::len).sum()
    }

    /// Subscribers in one partition.
    pub fn partition_len(&self, partition: Option<Role>) -> usize {
        self.partitions
            .read()
            .get(&partition)
            .map_or(0, HashMap::len)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Deliver to every subscriber in every partition.
    pub fn publish(&self, event: &ChangeEvent) -> PublishReport {
        match self.frame(event) {
            Some(frame) => self.fan_out(&frame, |_| true),
            None => PublishReport::default(),
        }
    }

    /// Deliver to the subscribers of one partition.
    pub fn publish_to(&self, event: &ChangeEvent, partition: Option<Role>) -> PublishReport {
        match self.frame(event) {
            Some(frame) => self.fan_out(&frame, |p| *p == partition),
            None => PublishReport::default(),
        }
    }

    /// Drop every subscriber. Later publishes reach nobody and later
    /// subscriptions start disconnected.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let drained: Vec<Subscriber> = self
            .partitions
            .write()
            .drain()
            .flat_map(|(_, members)| members.into_values())
            .collect();

        let count = drained.len();
        for sub in drained {
            let _ = sub.sender.try_send(Notification::Dropped {
                reason: DropReason::Shutdown,
            });
        }
        debug!(subscribers = count, "broadcaster closed");
    }

    fn frame(&self, event: &ChangeEvent) -> Option<Frame> {
        match event.to_frame() {
            Ok(frame) => Some(frame),
            Err(e) => {
                error!(
                    event = %event.kind,
                    product_id = %event.product_id(),
                    error = %e,
                    "failed to serialize change event"
                );
                None
            }
        }
    }

    fn fan_out<F>(&self, frame: &Frame, include: F) -> PublishReport
    where
        F: Fn(&Partition) -> bool,
    {
        let targets: Vec<(SubscriberId, Sender<Notification>)> = {
            let partitions = self.partitions.read();
            partitions
                .iter()
                .filter(|(partition, _)| include(*partition))
                .flat_map(|(_, members)| {
                    members
                        .iter()
                        .map(|(id, sub)| (*id, sub.sender.clone()))
                })
                .collect()
        };

        let mut report = PublishReport::default();
        let mut failed = Vec::new();
        for (id, sender) in targets {
            match self.send(&sender, frame) {
                Ok(()) => report.delivered += 1,
                Err(reason) => failed.push((id, reason)),
            }
        }

        // Remove dropped subscribers
        if !failed.is_empty() {
            report.dropped = failed.len();
            let mut partitions = self.partitions.write();
            for (id, reason) in failed {
                let removed = partitions
                    .values_mut()
                    .find_map(|members| members.remove(&id));
                if let Some(sub) = removed {
                    warn!(subscriber = %id, reason = ?reason, "dropping subscriber");
                    // Try to notify about the drop (might fail, that's ok)
                    let _ = sub.sender.try_send(Notification::Dropped { reason });
                }
            }
            partitions.retain(|_, members| !members.is_empty());
        }

        report
    }

    fn send(&self, sender: &Sender<Notification>, frame: &Frame) -> Result<(), DropReason> {
        let notification = Notification::Change(frame.clone());
        match self.config.send_timeout {
            Some(timeout) => sender
                .send_timeout(notification, timeout)
                .map_err(|e| match e {
                    SendTimeoutError::Timeout(_) => DropReason::Timeout,
                    SendTimeoutError::Disconnected(_) => DropReason::Disconnected,
                }),
            None => sender.try_send(notification).map_err(|e| match e {
                TrySendError::Full(_) => DropReason::BufferOverflow,
                TrySendError::Disconnected(_) => DropReason::Disconnected,
            }),
        }
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(BroadcastConfig::default())
    }
}
