//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod rotation_token_repo;

pub use rotation_token_repo::RotationTokenRepo;
