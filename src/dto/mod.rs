//! Data transfer types: HTTP payloads and the binary bridge message decoder.

pub mod balance;
pub mod bridge;
pub mod health;
