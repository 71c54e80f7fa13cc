//! Persistence layer: balances document codec and the atomic file store.

pub mod balance_store;
pub mod codec;
pub mod storage;
