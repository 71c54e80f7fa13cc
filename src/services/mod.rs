//! Service layer: the engine facade, persistence scheduling, and the bridge.

pub mod balance_service;
pub mod bridge_service;
pub mod persistence;
