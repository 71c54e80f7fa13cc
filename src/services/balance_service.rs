//! Engine facade over the ledger: every mutation that changes state pairs
//! with a debounced-save request, so callers cannot forget the persistence
//! half of the contract.

use uuid::Uuid;

use crate::{error::ServiceError, services::persistence, state::SharedState};

/// Current balance for `id`; 0 for unknown identities. No side effects.
pub fn balance(state: &SharedState, id: Uuid) -> i64 {
    state.ledger().balance(id)
}

/// Set the balance of `id` to `max(0, amount)` and return the stored value.
pub fn set_balance(state: &SharedState, id: Uuid, amount: i64) -> i64 {
    let stored = state.ledger().set_balance(id, amount);
    persistence::request_debounced_save(state);
    stored
}

/// Credit `amount` to `id`, returning the new balance. Non-positive amounts
/// are a no-op returning the unchanged balance and requesting no save.
pub fn add(state: &SharedState, id: Uuid, amount: i64) -> i64 {
    if amount <= 0 {
        return state.ledger().balance(id);
    }
    let updated = state.ledger().add(id, amount);
    persistence::request_debounced_save(state);
    updated
}

/// Debit `amount` from `id` if covered. Non-positive amounts succeed
/// trivially; only an actual decrement requests a save.
pub fn spend(state: &SharedState, id: Uuid, amount: i64) -> bool {
    if amount <= 0 {
        return true;
    }
    let spent = state.ledger().spend(id, amount);
    if spent {
        persistence::request_debounced_save(state);
    }
    spent
}

/// Command-style credit: rejects non-positive amounts instead of ignoring
/// them, mirroring the operator-facing `give` command.
pub fn give(state: &SharedState, id: Uuid, amount: i64) -> Result<i64, ServiceError> {
    ensure_positive(amount)?;
    Ok(add(state, id, amount))
}

/// Command-style debit: rejects non-positive amounts and reports the held
/// balance when funds are insufficient.
pub fn take(state: &SharedState, id: Uuid, amount: i64) -> Result<i64, ServiceError> {
    ensure_positive(amount)?;
    if !spend(state, id, amount) {
        return Err(ServiceError::InsufficientFunds {
            balance: state.ledger().balance(id),
        });
    }
    Ok(state.ledger().balance(id))
}

fn ensure_positive(amount: i64) -> Result<(), ServiceError> {
    if amount <= 0 {
        return Err(ServiceError::InvalidInput(
            "amount must be greater than 0".into(),
        ));
    }
    Ok(())
}
