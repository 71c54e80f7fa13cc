//! Debounced, swept, and shutdown persistence of the balance ledger.
//!
//! Mutation bursts are coalesced into a single delayed save through the
//! pending-save token, a periodic sweep persists whatever the debounce path
//! missed, and shutdown runs one final unconditional save. All disk writes
//! are serialized behind the save gate and run on the blocking pool, so they
//! never stall ledger mutations or the async workers.

use tokio::{
    task::{self, JoinHandle},
    time::{Instant, interval_at, sleep},
};
use tracing::{debug, error, info, warn};

use crate::{error::ServiceError, state::SharedState};

/// Populate the ledger from disk, once at startup.
///
/// Load failures are never fatal: the engine starts with an empty ledger and
/// a warning, matching the persistence layer's degrade-don't-crash contract.
pub async fn load_from_disk(state: &SharedState) {
    let store = state.store().clone();
    match task::spawn_blocking(move || store.load()).await {
        Ok(Ok(balances)) => state.ledger().replace(balances),
        Ok(Err(err)) => warn!(error = %err, "failed to load balances, starting empty"),
        Err(err) => warn!(error = %err, "balance load task failed, starting empty"),
    }
}

/// Persist the current ledger, returning the number of entries written.
///
/// The dirty flag is cleared before the snapshot is taken, so a mutation
/// racing the save re-marks the ledger and the next cycle picks it up; on
/// failure the flag is restored and the error returned, leaving retry to the
/// next debounce or sweep.
pub async fn save_to_disk(state: &SharedState, with_backup: bool) -> Result<usize, ServiceError> {
    let _gate = state.save_gate().lock().await;

    state.ledger().clear_dirty();
    let snapshot = state.ledger().snapshot();
    let count = snapshot.len();

    let store = state.store().clone();
    let written = task::spawn_blocking(move || store.save(&snapshot, with_backup)).await;

    match written {
        Ok(Ok(())) => {
            debug!(count, with_backup, "persisted balances");
            Ok(count)
        }
        Ok(Err(err)) => {
            state.ledger().mark_dirty();
            Err(err.into())
        }
        Err(err) => {
            state.ledger().mark_dirty();
            Err(ServiceError::Internal(format!("save task failed: {err}")))
        }
    }
}

/// Request a save after the configured debounce delay.
///
/// A no-op returning `None` while a save is already scheduled; otherwise the
/// pending-save token moves to scheduled, the handle of the delayed save
/// task is returned, and the token is cleared unconditionally once that save
/// has fired, whether or not it persisted successfully.
pub fn request_debounced_save(state: &SharedState) -> Option<JoinHandle<()>> {
    if !state.try_schedule_save() {
        return None;
    }

    let state = SharedState::clone(state);
    Some(tokio::spawn(async move {
        sleep(state.config().save_debounce()).await;
        if let Err(err) = save_to_disk(&state, false).await {
            warn!(error = %err, "debounced save failed");
        }
        state.clear_scheduled_save();
    }))
}

/// Spawn the periodic save-if-dirty sweep.
///
/// This is the backstop that guarantees eventual persistence even when the
/// debounce path is starved or a debounced save failed.
pub fn spawn_autosave(state: SharedState) -> JoinHandle<()> {
    let period = state.config().autosave_interval();
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        loop {
            ticker.tick().await;
            if !state.ledger().is_dirty() {
                continue;
            }
            if let Err(err) = save_to_disk(&state, false).await {
                warn!(error = %err, "periodic autosave failed");
            }
        }
    })
}

/// Final unconditional save on orderly shutdown, after the listeners have
/// stopped handing out work. Saving an unchanged ledger is harmless.
pub async fn shutdown(state: &SharedState) {
    match save_to_disk(state, false).await {
        Ok(count) => info!(count, "persisted balances on shutdown"),
        Err(err) => error!(error = %err, "failed to persist balances on shutdown"),
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::{Path, PathBuf}, time::Duration};

    use uuid::Uuid;

    use super::*;
    use crate::{config::AppConfig, state::AppState};

    /// Scratch directory removed when the test ends.
    struct TempDir(PathBuf);

    impl TempDir {
        fn new() -> Self {
            let dir = std::env::temp_dir().join(format!("event-currency-test-{}", Uuid::new_v4()));
            Self(dir)
        }

        fn path(&self) -> &Path {
            &self.0
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            // Some tests occupy the path with a plain file instead.
            let _ = fs::remove_dir_all(&self.0);
            let _ = fs::remove_file(&self.0);
        }
    }

    fn state_in(dir: &TempDir) -> SharedState {
        AppState::new(AppConfig::for_tests(
            dir.path().to_path_buf(),
            Duration::from_millis(500),
            Duration::from_secs(60),
        ))
    }

    /// Spin (with a real-time backoff, since the blocking pool runs off the
    /// paused clock) until `condition` holds.
    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            tokio::task::yield_now().await;
            std::thread::sleep(Duration::from_millis(2));
        }
        panic!("condition never reached");
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let dir = TempDir::new();
        let id = Uuid::new_v4();

        let state = state_in(&dir);
        state.ledger().set_balance(id, 77);
        save_to_disk(&state, false).await.expect("save");
        assert!(!state.ledger().is_dirty());

        let restarted = state_in(&dir);
        load_from_disk(&restarted).await;
        assert_eq!(restarted.ledger().balance(id), 77);
        assert!(!restarted.ledger().is_dirty());
    }

    #[tokio::test]
    async fn failed_save_keeps_the_ledger_dirty() {
        let dir = TempDir::new();
        // Occupy the data directory path with a plain file so the store
        // cannot create it.
        fs::write(dir.path(), b"in the way").expect("blocker");

        let state = state_in(&dir);
        state.ledger().set_balance(Uuid::new_v4(), 1);

        assert!(save_to_disk(&state, false).await.is_err());
        assert!(state.ledger().is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_requests_coalesce_into_one_save() {
        let dir = TempDir::new();
        let state = state_in(&dir);
        let id = Uuid::new_v4();

        state.ledger().set_balance(id, 1);
        let scheduled: Vec<_> = (0..50)
            .filter_map(|_| request_debounced_save(&state))
            .collect();
        assert_eq!(scheduled.len(), 1);
        assert!(state.save_scheduled());

        // Mutations inside the debounce window ride along with the single
        // scheduled save.
        state.ledger().set_balance(id, 2);

        for handle in scheduled {
            handle.await.expect("scheduled save");
        }

        let loaded = state.store().load().expect("load");
        assert_eq!(loaded.get(&id), Some(&2));

        // Token is reusable after the save fired.
        assert!(!state.save_scheduled());
        assert!(request_debounced_save(&state).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn pending_token_clears_even_when_the_save_fails() {
        let dir = TempDir::new();
        fs::write(dir.path(), b"in the way").expect("blocker");

        let state = state_in(&dir);
        state.ledger().set_balance(Uuid::new_v4(), 5);
        let handle = request_debounced_save(&state).expect("first request schedules");
        handle.await.expect("scheduled save");

        assert!(state.ledger().is_dirty());
        assert!(!state.save_scheduled());
    }

    #[tokio::test(start_paused = true)]
    async fn autosave_sweep_persists_a_dirty_ledger() {
        let dir = TempDir::new();
        let state = AppState::new(AppConfig::for_tests(
            dir.path().to_path_buf(),
            Duration::from_millis(500),
            Duration::from_secs(2),
        ));
        let id = Uuid::new_v4();

        let sweep = spawn_autosave(state.clone());

        // Mutate the ledger directly: only the sweep can persist this.
        state.ledger().set_balance(id, 9);
        tokio::time::sleep(Duration::from_secs(3)).await;

        wait_until(|| !state.ledger().is_dirty()).await;
        assert_eq!(state.store().load().expect("load").get(&id), Some(&9));

        sweep.abort();
    }

    #[tokio::test]
    async fn shutdown_saves_even_when_clean() {
        let dir = TempDir::new();
        let state = state_in(&dir);

        assert!(!state.ledger().is_dirty());
        shutdown(&state).await;

        assert!(state.store().path().exists());
    }
}
