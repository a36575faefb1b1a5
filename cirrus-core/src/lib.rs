//! cirrus-core: shared building blocks for the cirrus media upload crates.
//!
//! - [`MediaError`] / [`MediaResult`]: one error type for every crate
//! - [`MediaConfig`]: account credentials and client settings, parsed from
//!   a single connection string
//! - [`DeliveryContext`]: the designated thread all callbacks run on
//! - [`EventHub`]: listener registry a coordinator owns for its own events

pub mod config;
pub mod dispatch;
pub mod errors;
pub mod events;

pub use config::{CloudCredentials, MediaConfig};
pub use dispatch::DeliveryContext;
pub use errors::{MediaError, MediaResult};
pub use events::{
    CoordinatorEvent, CoordinatorEventKind, CoordinatorId, EventHub, EventListener, ListenerId,
};
