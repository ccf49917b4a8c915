//! Sentinel event bus.
//!
//! - [`EventBus`] -- in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PlatformEvent`] -- the canonical event envelope.
//! - [`SecurityBreachEvent`] -- typed view of `security.*` events.
//! - [`SecurityLog`] -- background subscriber that writes security events to
//!   the tracing log.

pub mod bus;
pub mod security;

pub use bus::{EventBus, PlatformEvent};
pub use security::{BreachKind, SecurityBreachEvent, SecurityLog};
