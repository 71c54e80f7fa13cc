//! The in-memory balance ledger and its dirty tracking.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::{DashMap, mapref::entry::Entry};
use uuid::Uuid;

/// Concurrent identity→balance map with process-wide dirty tracking.
///
/// Balances are invariantly non-negative. Entries are created lazily on
/// first mutation and never removed, so a missing entry and a zero balance
/// are indistinguishable to callers.
pub struct Ledger {
    balances: DashMap<Uuid, i64>,
    dirty: AtomicBool,
}

impl Ledger {
    /// Create an empty ledger with a clean dirty flag.
    pub fn new() -> Self {
        Self {
            balances: DashMap::new(),
            dirty: AtomicBool::new(false),
        }
    }

    /// Current balance for `id`, or 0 when the identity is unknown.
    pub fn balance(&self, id: Uuid) -> i64 {
        self.balances.get(&id).map_or(0, |entry| *entry)
    }

    /// Overwrite the balance for `id` with `max(0, amount)` and return the
    /// stored value. Always succeeds and always marks the ledger dirty.
    pub fn set_balance(&self, id: Uuid, amount: i64) -> i64 {
        let stored = amount.max(0);
        self.balances.insert(id, stored);
        self.mark_dirty();
        stored
    }

    /// Credit `amount` tokens to `id` and return the new balance.
    ///
    /// Non-positive amounts are a no-op returning the unchanged balance.
    /// The increment saturates at `i64::MAX` rather than wrapping.
    pub fn add(&self, id: Uuid, amount: i64) -> i64 {
        if amount <= 0 {
            return self.balance(id);
        }

        let mut entry = self.balances.entry(id).or_insert(0);
        *entry = entry.saturating_add(amount);
        let updated = *entry;
        drop(entry);

        self.mark_dirty();
        updated
    }

    /// Debit `amount` tokens from `id` if the balance covers it.
    ///
    /// Non-positive amounts succeed trivially without touching state. The
    /// check and decrement happen under the per-key entry lock, so two
    /// concurrent spends can never both drain the same funds.
    pub fn spend(&self, id: Uuid, amount: i64) -> bool {
        if amount <= 0 {
            return true;
        }

        let spent = match self.balances.entry(id) {
            Entry::Occupied(mut occupied) => {
                let current = *occupied.get();
                if current < amount {
                    false
                } else {
                    *occupied.get_mut() = current - amount;
                    true
                }
            }
            // Unknown identity has balance 0; never enough for amount > 0.
            Entry::Vacant(_) => false,
        };

        if spent {
            self.mark_dirty();
        }
        spent
    }

    /// Number of identities currently tracked.
    pub fn len(&self) -> usize {
        self.balances.len()
    }

    /// Whether unpersisted mutations exist.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Flag the ledger as diverged from the persisted snapshot.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Clear the dirty flag, returning whether it was set.
    ///
    /// Callers must restore the flag with [`Ledger::mark_dirty`] if the
    /// save they are about to attempt fails.
    pub fn clear_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    /// Sorted owned copy of the current balances, suitable for encoding.
    pub fn snapshot(&self) -> BTreeMap<Uuid, i64> {
        self.balances
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }

    /// Install loaded balances, used once at startup. Leaves the dirty flag
    /// untouched: freshly loaded state matches the disk by definition.
    pub fn replace(&self, entries: impl IntoIterator<Item = (Uuid, i64)>) {
        self.balances.clear();
        for (id, balance) in entries {
            self.balances.insert(id, balance.max(0));
        }
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn unknown_identity_has_zero_balance() {
        let ledger = Ledger::new();
        assert_eq!(ledger.balance(Uuid::new_v4()), 0);
        assert!(!ledger.is_dirty());
    }

    #[test]
    fn set_balance_stores_and_clamps() {
        let ledger = Ledger::new();
        let id = Uuid::new_v4();

        assert_eq!(ledger.set_balance(id, 42), 42);
        assert_eq!(ledger.balance(id), 42);
        assert!(ledger.is_dirty());

        assert_eq!(ledger.set_balance(id, -5), 0);
        assert_eq!(ledger.balance(id), 0);
    }

    #[test]
    fn add_increments_and_ignores_non_positive_amounts() {
        let ledger = Ledger::new();
        let id = Uuid::new_v4();

        assert_eq!(ledger.add(id, 10), 10);
        assert_eq!(ledger.add(id, 5), 15);
        assert_eq!(ledger.balance(id), 15);

        ledger.clear_dirty();
        assert_eq!(ledger.add(id, 0), 15);
        assert_eq!(ledger.add(id, -3), 15);
        assert!(!ledger.is_dirty());
    }

    #[test]
    fn add_saturates_instead_of_wrapping() {
        let ledger = Ledger::new();
        let id = Uuid::new_v4();

        ledger.set_balance(id, i64::MAX - 1);
        assert_eq!(ledger.add(id, 10), i64::MAX);
    }

    #[test]
    fn spend_rejects_insufficient_funds() {
        let ledger = Ledger::new();
        let id = Uuid::new_v4();

        ledger.set_balance(id, 30);
        assert!(!ledger.spend(id, 31));
        assert_eq!(ledger.balance(id), 30);

        assert!(ledger.spend(id, 30));
        assert_eq!(ledger.balance(id), 0);

        assert!(!ledger.spend(Uuid::new_v4(), 1));
    }

    #[test]
    fn spend_of_zero_succeeds_without_marking_dirty() {
        let ledger = Ledger::new();
        let id = Uuid::new_v4();

        assert!(ledger.spend(id, 0));
        assert!(ledger.spend(id, -7));
        assert!(!ledger.is_dirty());
        assert_eq!(ledger.balance(id), 0);
    }

    #[test]
    fn concurrent_spends_never_double_spend() {
        let ledger = Arc::new(Ledger::new());
        let id = Uuid::new_v4();
        ledger.set_balance(id, 100);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || ledger.spend(id, 100))
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|handle| handle.join())
            .filter(|result| matches!(result, Ok(true)))
            .count();

        assert_eq!(successes, 1);
        assert_eq!(ledger.balance(id), 0);
    }

    #[test]
    fn snapshot_and_replace_round_trip() {
        let ledger = Ledger::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        ledger.set_balance(a, 1);
        ledger.set_balance(b, 2);

        let snapshot = ledger.snapshot();
        assert_eq!(snapshot.len(), 2);

        let other = Ledger::new();
        other.replace(snapshot);
        assert_eq!(other.balance(a), 1);
        assert_eq!(other.balance(b), 2);
        assert!(!other.is_dirty());
    }
}
