//! `railgrid-engine` — the in-process address-space core.
//!
//! Pure engine crate: the node/value store, the change-notification
//! subscription engine, and their shared error taxonomy. No IO, no
//! transport, no authentication; those live above this crate.

pub mod error;
pub mod events;
pub mod space;
pub mod subscription;

pub use error::SpaceError;
pub use events::{ChangeCollector, ChangeHook, ValueChange};
pub use space::AddressSpace;
pub use subscription::{
    MonitorHandle, Notification, SubscriptionEngine, SubscriptionId, SubscriptionState,
};
