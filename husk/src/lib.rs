//! This crate re-exports all husk crates.

pub use husk_core as core;
pub use husk_crypto as crypto;
pub use husk_packet as packet;
