//! Live change broadcast.
//!
//! Every committed create, update or delete becomes one `ChangeEvent`,
//! serialized once into a `Frame` and pushed to each subscriber's bounded
//! queue. Delivery is at-most-once:
//! - a subscriber whose queue is full or closed is dropped on the spot
//! - missed events are not replayed
//! - each subscriber sees frames in publish order
//!
//! # Example
//!
//! ```ignore
//! let broadcaster = Broadcaster::new(BroadcastConfig::default());
//! let handle = broadcaster.subscribe(Some(Role::Office));
//!
//! broadcaster.publish(&ChangeEvent::deleted(ProductId(4)));
//!
//! loop {
//!     match handle.recv() {
//!         Ok(Notification::Change(frame)) => println!("{frame}"),
//!         Ok(Notification::Dropped { reason }) => break,
//!         Err(_) => break,
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::Broadcaster;
pub use types::{
    BroadcastConfig, ChangeEvent, ChangeKind, DropReason, EventPayload, Frame, Notification,
    PublishReport, SubscriberId, SubscriptionHandle,
};
