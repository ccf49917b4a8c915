//! Shared primitives for the rotation-token session service.
//!
//! This crate has zero internal dependencies so the ledger, the rotation
//! engine, the HTTP API and the client coordinator can all build on it.

pub mod device;
pub mod env;
pub mod error;
pub mod hashing;
pub mod session;
pub mod single_flight;
pub mod types;
pub mod validation;
