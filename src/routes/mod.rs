use axum::Router;

use crate::state::SharedState;

pub mod admin;
pub mod balance;
pub mod health;

/// Compose all route trees and wire in the shared state.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(balance::router())
        .merge(admin::router())
        .with_state(state)
}
