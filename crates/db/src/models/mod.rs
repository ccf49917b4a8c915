//! Domain model structs and DTOs.

pub mod rotation_token;
