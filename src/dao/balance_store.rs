//! File-backed persistence for the balance ledger with atomic replacement.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    fs::File,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use tracing::{info, warn};
use uuid::Uuid;

use crate::dao::{
    codec,
    storage::{StorageError, StorageResult},
};

/// File name of the persisted ledger inside the data directory.
const BALANCES_FILE: &str = "balances.json";
/// Scratch file the writer fills before atomically replacing [`BALANCES_FILE`].
const BALANCES_TMP_FILE: &str = "balances.json.tmp";

/// Handle on the on-disk balances document.
///
/// Saves go through a temp-file-then-rename sequence so a crash at any point
/// leaves either the previous document or the new one at the target path,
/// never a torn file.
#[derive(Debug, Clone)]
pub struct BalanceStore {
    dir: PathBuf,
    path: PathBuf,
}

impl BalanceStore {
    /// Create a store rooted at `data_dir`. Nothing is touched on disk yet.
    pub fn new(data_dir: &Path) -> Self {
        Self {
            dir: data_dir.to_path_buf(),
            path: data_dir.join(BALANCES_FILE),
        }
    }

    /// Path of the persisted document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted balances. A missing file is an empty ledger, and
    /// document damage degrades via the permissive codec rather than failing.
    pub fn load(&self) -> StorageResult<HashMap<Uuid, i64>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let balances = codec::decode(&contents);
                info!(
                    path = %self.path.display(),
                    count = balances.len(),
                    "loaded balances"
                );
                Ok(balances)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no balances file yet, starting empty");
                Ok(HashMap::new())
            }
            Err(err) => Err(StorageError::io(&self.path, err)),
        }
    }

    /// Persist `snapshot`, optionally renaming the previous document to a
    /// timestamped backup first.
    ///
    /// The snapshot is encoded into a scratch file in the same directory,
    /// flushed to disk, then renamed over the target. The rename is the
    /// commit point: callers may clear their dirty tracking only when this
    /// returns `Ok`.
    pub fn save(&self, snapshot: &BTreeMap<Uuid, i64>, with_backup: bool) -> StorageResult<()> {
        fs::create_dir_all(&self.dir).map_err(|err| StorageError::io(&self.dir, err))?;

        if with_backup && self.path.exists() {
            let backup = self.dir.join(format!("balances-{}.bak.json", epoch_millis()));
            if let Err(err) = fs::rename(&self.path, &backup) {
                warn!(
                    path = %backup.display(),
                    error = %err,
                    "could not move previous balances file to backup"
                );
            }
        }

        let encoded = codec::encode(snapshot)?;
        let tmp = self.dir.join(BALANCES_TMP_FILE);
        {
            let mut file = File::create(&tmp).map_err(|err| StorageError::io(&tmp, err))?;
            file.write_all(encoded.as_bytes())
                .map_err(|err| StorageError::io(&tmp, err))?;
            file.sync_all().map_err(|err| StorageError::io(&tmp, err))?;
        }

        fs::rename(&tmp, &self.path).map_err(|err| StorageError::io(&self.path, err))?;
        Ok(())
    }
}

/// Milliseconds since the Unix epoch, used for backup file names.
fn epoch_millis() -> i128 {
    time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000
}
