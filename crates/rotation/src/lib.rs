//! Rotation-token lifecycle: rotation, reuse detection, session limits.
//!
//! - [`engine`] -- the rotation state machine with per-token single-flight.
//! - [`limiter`] -- caps concurrent sessions per user.
//! - [`breach`] -- account-wide response to detected token reuse.
//! - [`issuer`] -- the credential issuer seam and its JWT implementation.
//! - [`service`] -- the operation surface used by the API and in-process clients.
//! - [`sweeper`] -- periodic purge of expired ledger rows.

pub mod breach;
pub mod config;
pub mod engine;
pub mod error;
pub mod issuer;
pub mod limiter;
pub mod service;
pub mod sweeper;

pub use config::RotationConfig;
pub use error::RotationError;
pub use service::RotationService;
