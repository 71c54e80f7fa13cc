//! Shared application state: the ledger, its store, and persistence flags.

pub mod ledger;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::sync::Mutex;

use crate::{config::AppConfig, dao::balance_store::BalanceStore};

pub use self::ledger::Ledger;

/// Cheaply cloneable handle on the application state.
pub type SharedState = Arc<AppState>;

/// Central application state wiring the ledger to its persistence machinery.
///
/// Constructed once in the binary and handed to the HTTP router and the
/// bridge listener; nothing in the crate reaches for a global instance.
pub struct AppState {
    config: AppConfig,
    ledger: Ledger,
    store: BalanceStore,
    /// Pending-save token: true while exactly one debounced save is scheduled.
    pending_save: AtomicBool,
    /// Serializes writers of the balances file across debounce, sweep,
    /// deliberate saves, and shutdown.
    save_gate: Mutex<()>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig) -> SharedState {
        let store = BalanceStore::new(config.data_dir());
        Arc::new(Self {
            config,
            ledger: Ledger::new(),
            store,
            pending_save: AtomicBool::new(false),
            save_gate: Mutex::new(()),
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The in-memory balance ledger.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// The on-disk store backing the ledger.
    pub fn store(&self) -> &BalanceStore {
        &self.store
    }

    /// Gate taken for the duration of any save to disk.
    pub fn save_gate(&self) -> &Mutex<()> {
        &self.save_gate
    }

    /// Try to move the pending-save token from absent to scheduled.
    /// Returns false when a save is already scheduled.
    pub fn try_schedule_save(&self) -> bool {
        self.pending_save
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Clear the pending-save token once a scheduled save has fired,
    /// regardless of whether the save itself succeeded.
    pub fn clear_scheduled_save(&self) {
        self.pending_save.store(false, Ordering::Release);
    }

    /// Whether a debounced save is currently scheduled.
    pub fn save_scheduled(&self) -> bool {
        self.pending_save.load(Ordering::Acquire)
    }
}
