//! File-backed fingerprint ledger.
//!
//! One ledger per endpoint. Records live in memory for lock-free lookups
//! and every change is rewritten to disk before it becomes visible.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use tessera_trust::{Fingerprint, HostIdentity, LedgerRecord, Provenance};

use crate::persist::write_atomic;

/// Log target for load-time corruption, kept apart from handshake rejections.
pub const INTEGRITY_TARGET: &str = "tessera::ledger_integrity";

const HEADER: &str = "# tessera fingerprint ledger\n\
# <host> <sha256 of leaf public key, lowercase hex> <ca|self-signed>\n";

/// How `try_update` merges with an existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Write only if the host has no record.
    InsertIfAbsent,
    /// Write regardless of the current record.
    Overwrite,
}

/// Result of a successful `try_update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// A new record was written.
    Inserted,
    /// An existing record was replaced.
    Overwritten { previous: LedgerRecord },
    /// The ledger already held exactly this record; nothing was written.
    Unchanged,
    /// `InsertIfAbsent` lost to a different record, which is returned.
    Conflict { existing: LedgerRecord },
}

/// Errors from loading or persisting a ledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("failed to read ledger {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to persist ledger {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Per-endpoint store of trusted fingerprints, keyed by host identity.
///
/// Decisions for one host are serialized on a per-host lock. Decisions for
/// different hosts do not wait on each other, but every write rewrites the
/// one ledger file under a single ledger-wide lock, so concurrent first
/// contacts from distinct hosts queue for that rewrite and its fsyncs.
/// Lookups never wait on either lock.
pub struct FingerprintLedger {
    path: PathBuf,
    records: DashMap<HostIdentity, LedgerRecord>,
    host_locks: DashMap<HostIdentity, Arc<Mutex<()>>>,
    flush_lock: Mutex<()>,
}

impl FingerprintLedger {
    /// Load the ledger at `path`. A missing file is an empty ledger.
    ///
    /// Malformed lines are skipped and logged on [`INTEGRITY_TARGET`].
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let records = DashMap::new();

        match std::fs::read(&path) {
            Ok(bytes) => load_lines(&path, &bytes, &records),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Ledger file absent, starting empty");
            }
            Err(source) => return Err(LedgerError::Read { path, source }),
        }

        tracing::info!(path = %path.display(), records = records.len(), "Ledger loaded");

        Ok(Self {
            path,
            records,
            host_locks: DashMap::new(),
            flush_lock: Mutex::new(()),
        })
    }

    /// Current record for `host`.
    #[must_use]
    pub fn lookup(&self, host: &HostIdentity) -> Option<LedgerRecord> {
        self.records.get(host).map(|r| r.value().clone())
    }

    /// Apply `policy` for `host` and persist the result before returning.
    ///
    /// On a write error nothing changes, in memory or on disk.
    pub fn try_update(
        &self,
        host: &HostIdentity,
        fingerprint: Fingerprint,
        provenance: Provenance,
        policy: UpdatePolicy,
    ) -> Result<UpdateOutcome, LedgerError> {
        let host_lock = self
            .host_locks
            .entry(host.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        let _host_guard = host_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let current = self.lookup(host);
        let record = LedgerRecord::new(host.clone(), fingerprint, provenance);

        let outcome = match (&current, policy) {
            (Some(existing), _) if *existing == record => return Ok(UpdateOutcome::Unchanged),
            (Some(existing), UpdatePolicy::InsertIfAbsent) => {
                return Ok(UpdateOutcome::Conflict {
                    existing: existing.clone(),
                })
            }
            (Some(existing), UpdatePolicy::Overwrite) => UpdateOutcome::Overwritten {
                previous: existing.clone(),
            },
            (None, _) => UpdateOutcome::Inserted,
        };

        self.persist_with(record)?;
        Ok(outcome)
    }

    fn persist_with(&self, record: LedgerRecord) -> Result<(), LedgerError> {
        let _flush_guard = self.flush_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut lines = self.snapshot();
        lines.insert(record.host.clone(), record.clone());

        let mut content = String::from(HEADER);
        for r in lines.values() {
            content.push_str(&r.to_line());
            content.push('\n');
        }

        write_atomic(&self.path, content.as_bytes(), false).map_err(|source| {
            LedgerError::Write {
                path: self.path.clone(),
                source,
            }
        })?;

        self.records.insert(record.host.clone(), record);
        Ok(())
    }

    /// All records, ordered by host.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<HostIdentity, LedgerRecord> {
        self.records
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for FingerprintLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintLedger")
            .field("path", &self.path)
            .field("records", &self.records.len())
            .finish()
    }
}

fn load_lines(path: &Path, bytes: &[u8], records: &DashMap<HostIdentity, LedgerRecord>) {
    for (index, raw) in bytes.split(|b| *b == b'\n').enumerate() {
        let line_no = index + 1;
        let Ok(line) = std::str::from_utf8(raw) else {
            tracing::warn!(
                target: INTEGRITY_TARGET,
                path = %path.display(),
                line = line_no,
                "Skipping ledger line: not valid UTF-8"
            );
            continue;
        };

        match LedgerRecord::parse_line(line) {
            Ok(Some(record)) => {
                if let Some(previous) = records.insert(record.host.clone(), record) {
                    tracing::warn!(
                        target: INTEGRITY_TARGET,
                        path = %path.display(),
                        line = line_no,
                        host = %previous.host,
                        "Duplicate ledger entry, later line wins"
                    );
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    target: INTEGRITY_TARGET,
                    path = %path.display(),
                    line = line_no,
                    error = %e,
                    "Skipping malformed ledger line"
                );
            }
        }
    }
}
