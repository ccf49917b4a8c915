//! Client side of rotation-token sessions.
//!
//! - [`coordinator`] -- holds the local rotation token and rotates it.
//! - [`backend`] -- the in-process and HTTP rotation backends.
//! - [`device`] -- stable per-installation device identity.
//! - [`storage`] -- local secret stores.

pub mod backend;
pub mod coordinator;
pub mod device;
pub mod error;
pub mod storage;

pub use backend::{HttpBackend, RotationBackend};
pub use coordinator::{RotationCoordinator, SignOut};
pub use error::ClientError;
