use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::ledger::{Ledger, LedgerError};

/// Transactional wrapper around the [`Ledger`] document state.
///
/// Every operation runs under one lock against a working copy, and the
/// snapshot file is written before the copy replaces the live state.
/// That gives the two guarantees the reward protocol needs:
/// serializable isolation (two postbacks with one `ymid` cannot both
/// see "event absent"), and all-or-nothing persistence (a failed write
/// leaves neither the credit nor the idempotency mark behind, so the
/// caller can safely retry the same event id).
pub struct Store {
    path: Option<PathBuf>,
    inner: Mutex<Ledger>,
}

impl Store {
    /// Volatile store, used by tests and as a fallback when no state
    /// file is configured.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            inner: Mutex::new(Ledger::new()),
        }
    }

    /// Open a file-backed store, restoring the previous snapshot if the
    /// file exists.
    pub fn open(path: PathBuf) -> Result<Self, LedgerError> {
        let ledger = if path.exists() {
            let bytes = fs::read(&path).map_err(|e| storage_error("read snapshot", &e))?;
            serde_json::from_slice(&bytes).map_err(|e| storage_error("parse snapshot", &e))?
        } else {
            Ledger::new()
        };
        Ok(Self {
            path: Some(path),
            inner: Mutex::new(ledger),
        })
    }

    /// Run one atomic unit of work. The closure's mutations are applied
    /// to a working copy; only after the closure succeeds and the
    /// snapshot is durable does the copy become the live state.
    pub fn transact<T>(
        &self,
        op: impl FnOnce(&mut Ledger) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut work = guard.clone();
        let out = op(&mut work)?;
        if let Some(path) = &self.path {
            persist(path, &work)?;
        }
        *guard = work;
        Ok(out)
    }

    /// Read-only view; never persists.
    pub fn read<T>(&self, op: impl FnOnce(&Ledger) -> T) -> T {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        op(&guard)
    }
}

/// Write the snapshot next to its final name and rename into place, so
/// a crash mid-write never leaves a truncated snapshot.
fn persist(path: &Path, ledger: &Ledger) -> Result<(), LedgerError> {
    let json =
        serde_json::to_vec_pretty(ledger).map_err(|e| storage_error("encode snapshot", &e))?;
    let tmp = path.with_extension("json.tmp");
    let mut file = fs::File::create(&tmp).map_err(|e| storage_error("create snapshot", &e))?;
    file.write_all(&json)
        .and_then(|_| file.sync_all())
        .map_err(|e| storage_error("write snapshot", &e))?;
    fs::rename(&tmp, path).map_err(|e| storage_error("commit snapshot", &e))
}

fn storage_error(stage: &str, err: &dyn std::fmt::Display) -> LedgerError {
    LedgerError::Storage {
        reason: format!("{stage}: {err}"),
    }
}
