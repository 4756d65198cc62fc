//! Local wallet cache backed by a single JSON file.
//!
//! The cache is append-friendly and loss-tolerant: a corrupt or missing
//! file degrades to an empty cache rather than an error, and merges from
//! the remote store never overwrite records that already exist locally.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use alloy_primitives::Address;

use crate::claim::unix_now;
use crate::error::Error;
use crate::records::{SyncState, WalletRecord};

/// File-backed cache of [`WalletRecord`]s.
pub struct LocalWalletCache {
    path: PathBuf,
    records: RwLock<Vec<WalletRecord>>,
}

impl LocalWalletCache {
    /// Opens the cache at `path`, creating an empty one when the file does
    /// not exist. A file that fails to parse is logged and treated as empty;
    /// it is overwritten on the next persisted mutation.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(records) => records,
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "wallet cache unreadable, starting empty");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        Self {
            path,
            records: RwLock::new(records),
        }
    }

    /// All cached records, optionally filtered by owner identity.
    #[must_use]
    pub fn list(&self, owner: Option<&str>) -> Vec<WalletRecord> {
        let records = self
            .records
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        records
            .iter()
            .filter(|record| {
                owner.is_none_or(|owner| record.owner_identity_id.as_deref() == Some(owner))
            })
            .cloned()
            .collect()
    }

    /// The cached record for `account`, if any.
    #[must_use]
    pub fn get(&self, account: Address) -> Option<WalletRecord> {
        let records = self
            .records
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        records
            .iter()
            .find(|record| record.account_address == account)
            .cloned()
    }

    /// Inserts or replaces the record for its account address, then persists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] when the cache file cannot be written.
    pub fn upsert(&self, record: WalletRecord) -> Result<(), Error> {
        {
            let mut records = self
                .records
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            match records
                .iter_mut()
                .find(|existing| existing.account_address == record.account_address)
            {
                Some(existing) => *existing = record,
                None => records.push(record),
            }
        }
        self.persist()
    }

    /// Appends records from the remote store that are not cached yet.
    /// Existing local records are never overwritten; the local copy may
    /// hold state (like a pending-sync marker) the remote lacks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] when the cache file cannot be written.
    pub fn merge(&self, remote: Vec<WalletRecord>) -> Result<(), Error> {
        let mut added = 0_usize;
        {
            let mut records = self
                .records
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            for record in remote {
                let known = records
                    .iter()
                    .any(|existing| existing.account_address == record.account_address);
                if !known {
                    records.push(record);
                    added += 1;
                }
            }
        }
        if added == 0 {
            return Ok(());
        }
        tracing::debug!(added, "merged remote wallet records into local cache");
        self.persist()
    }

    /// Updates the sync marker of a cached record, then persists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] when the record is not cached or the cache
    /// file cannot be written.
    pub fn set_sync_state(&self, account: Address, sync: SyncState) -> Result<(), Error> {
        {
            let mut records = self
                .records
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let record = records
                .iter_mut()
                .find(|record| record.account_address == account)
                .ok_or_else(|| Error::Storage {
                    error: format!("wallet {account} not in local cache"),
                })?;
            record.sync = sync;
        }
        self.persist()
    }

    /// Marks a cached record as deployed. Monotonic: a record already
    /// deployed keeps its existing deployment details.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] when the record is not cached or the cache
    /// file cannot be written.
    pub fn update_deployment(
        &self,
        account: Address,
        tx_ref: &str,
        deployed_at: u64,
    ) -> Result<(), Error> {
        {
            let mut records = self
                .records
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let record = records
                .iter_mut()
                .find(|record| record.account_address == account)
                .ok_or_else(|| Error::Storage {
                    error: format!("wallet {account} not in local cache"),
                })?;
            if record.is_deployed {
                return Ok(());
            }
            record.is_deployed = true;
            record.deployed_at = Some(deployed_at);
            record.deployment_tx_ref = Some(tx_ref.to_string());
            record.updated_at = Some(unix_now());
        }
        self.persist()
    }

    /// Removes the record for `account`, if cached, then persists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] when the cache file cannot be written.
    pub fn remove(&self, account: Address) -> Result<(), Error> {
        {
            let mut records = self
                .records
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            records.retain(|record| record.account_address != account);
        }
        self.persist()
    }

    fn persist(&self) -> Result<(), Error> {
        let serialized = {
            let records = self
                .records
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            serde_json::to_vec_pretty(&*records).map_err(|err| Error::Serialization {
                error: err.to_string(),
            })?
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| storage_io(&self.path, &err))?;
        }
        // write-then-rename so a crash never leaves a half-written cache
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serialized).map_err(|err| storage_io(&tmp, &err))?;
        fs::rename(&tmp, &self.path).map_err(|err| storage_io(&self.path, &err))
    }
}

fn storage_io(path: &Path, err: &std::io::Error) -> Error {
    Error::Storage {
        error: format!("{}: {err}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(byte: u8, owner: &str) -> WalletRecord {
        WalletRecord::new(
            Address::repeat_byte(byte),
            None,
            Some(owner.to_string()),
        )
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.json");

        let cache = LocalWalletCache::open(&path);
        cache.upsert(record(0x11, "alice@example.com")).unwrap();
        cache.upsert(record(0x22, "bob@example.com")).unwrap();

        let reopened = LocalWalletCache::open(&path);
        assert_eq!(reopened.list(None).len(), 2);
        assert_eq!(
            reopened.list(Some("alice@example.com"))[0].account_address,
            Address::repeat_byte(0x11)
        );
    }

    #[test]
    fn test_corrupt_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.json");
        fs::write(&path, "{not json").unwrap();

        let cache = LocalWalletCache::open(&path);
        assert!(cache.list(None).is_empty());
        // the next mutation replaces the corrupt file
        cache.upsert(record(0x33, "carol@example.com")).unwrap();
        assert_eq!(LocalWalletCache::open(&path).list(None).len(), 1);
    }

    #[test]
    fn test_merge_never_overwrites_local_records() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalWalletCache::open(dir.path().join("wallets.json"));

        let mut local = record(0x11, "alice@example.com");
        local.sync = SyncState::PendingRemote;
        cache.upsert(local).unwrap();

        // remote copy of the same account plus a new one
        let remote_copy = record(0x11, "someone-else@example.com");
        let remote_new = record(0x22, "bob@example.com");
        cache.merge(vec![remote_copy, remote_new]).unwrap();

        let kept = cache.get(Address::repeat_byte(0x11)).unwrap();
        assert_eq!(kept.owner_identity_id.as_deref(), Some("alice@example.com"));
        assert_eq!(kept.sync, SyncState::PendingRemote);
        assert_eq!(cache.list(None).len(), 2);
    }

    #[test]
    fn test_deployment_update_is_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalWalletCache::open(dir.path().join("wallets.json"));
        let account = Address::repeat_byte(0x44);
        cache.upsert(record(0x44, "dave@example.com")).unwrap();

        cache.update_deployment(account, "0xabc", 1_700_000_000).unwrap();
        cache.update_deployment(account, "0xdef", 1_800_000_000).unwrap();

        let deployed = cache.get(account).unwrap();
        assert!(deployed.is_deployed);
        assert_eq!(deployed.deployment_tx_ref.as_deref(), Some("0xabc"));
        assert_eq!(deployed.deployed_at, Some(1_700_000_000));
    }

    #[test]
    fn test_update_of_unknown_record_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalWalletCache::open(dir.path().join("wallets.json"));
        let err = cache
            .update_deployment(Address::repeat_byte(0x55), "0xabc", 1)
            .unwrap_err();
        assert!(matches!(err, Error::Storage { .. }));
    }

    #[test]
    fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalWalletCache::open(dir.path().join("wallets.json"));
        cache.upsert(record(0x66, "erin@example.com")).unwrap();
        cache.remove(Address::repeat_byte(0x66)).unwrap();
        assert!(cache.get(Address::repeat_byte(0x66)).is_none());
        // removing an absent record is fine
        cache.remove(Address::repeat_byte(0x66)).unwrap();
    }
}
