//! capy-resources: the shared registry of desktop session state.
//!
//! - `ResourceStore` - path-keyed, prefix-partitioned resource table
//! - `ChangeBus` - topic-keyed best-effort notifications for live readers
//! - `Resource` - the immutable value every producer publishes
//!
//! Producers (D-Bus listeners, directory scanners, window-system loops)
//! write through the store; readers take snapshots and subscribe to changes.

pub mod bus;
pub mod error;
pub mod path;
pub mod resource;
pub mod store;

pub use bus::{ChangeBus, Event, RESYNC_TOPIC, Subscription};
pub use error::StoreError;
pub use resource::{Capabilities, Capability, Link, Profile, Relation, Resource};
pub use store::{Change, ChangeKind, CollectionWriter, DEFAULT_RESERVED_PATHS, ResourceStore};
