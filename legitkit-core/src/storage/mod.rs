//! Dual-tier wallet storage: a local file cache in front of a remote
//! document store, reconciled so the local tier never silently loses a
//! record the remote tier has, and vice versa.

mod local;
mod remote;

use std::sync::Arc;

use alloy_primitives::Address;

pub use local::LocalWalletCache;
pub use remote::{HttpUserDirectory, HttpWalletStore, RemoteWalletStore, UserDirectory};

use crate::error::Error;
use crate::records::{SyncState, WalletRecord};

/// How far a [`WalletStore::save`] made it.
#[derive(Debug)]
pub enum SaveOutcome {
    /// Both tiers hold the record.
    Synced,
    /// The local tier holds the record; the remote write failed with the
    /// carried error and the record is marked [`SyncState::PendingRemote`].
    PendingRemoteSync(Error),
}

/// The reconciling store: local writes first for durability, remote writes
/// after for sharing, reads local-first with remote fallback.
pub struct WalletStore<R> {
    local: LocalWalletCache,
    remote: Arc<R>,
}

impl<R: RemoteWalletStore> WalletStore<R> {
    /// Combines the two tiers.
    pub const fn new(local: LocalWalletCache, remote: Arc<R>) -> Self {
        Self { local, remote }
    }

    /// Direct access to the local cache.
    pub const fn local(&self) -> &LocalWalletCache {
        &self.local
    }

    /// Saves a record to both tiers, local first.
    ///
    /// A remote failure never fails the save: the record stays durable
    /// locally, marked [`SyncState::PendingRemote`], and the outcome carries
    /// the remote error for the caller to surface.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] only when the local write fails; the
    /// record is then durable nowhere and the caller must not proceed as if
    /// it were saved.
    pub async fn save(&self, mut record: WalletRecord) -> Result<SaveOutcome, Error> {
        record.sync = SyncState::Synced;
        self.local.upsert(record.clone())?;

        match self.remote.save(&record).await {
            Ok(()) => Ok(SaveOutcome::Synced),
            Err(err) => {
                tracing::warn!(
                    account = %record.account_address,
                    %err,
                    "remote wallet save failed, record pending sync"
                );
                self.local
                    .set_sync_state(record.account_address, SyncState::PendingRemote)?;
                Ok(SaveOutcome::PendingRemoteSync(err))
            }
        }
    }

    /// All wallet records for `owner`.
    ///
    /// Serves the local cache when it has anything for the owner; otherwise
    /// falls back to the remote store and merges what it returns into the
    /// cache. A remote failure on the fallback path degrades to an empty
    /// list rather than an error.
    pub async fn load_wallets(&self, owner: &str) -> Vec<WalletRecord> {
        let cached = self.local.list(Some(owner));
        if !cached.is_empty() {
            return cached;
        }

        match self.remote.find_by_owner(owner).await {
            Ok(records) => {
                if let Err(err) = self.local.merge(records.clone()) {
                    tracing::warn!(%err, "could not cache remote wallet records");
                }
                records
            }
            Err(err) => {
                tracing::warn!(owner, %err, "remote wallet lookup failed");
                Vec::new()
            }
        }
    }

    /// The record for `account`, local-first with remote backfill.
    ///
    /// # Errors
    ///
    /// Propagates remote failures when the record is not cached locally;
    /// "not found anywhere" is `Ok(None)`, not an error.
    pub async fn get(&self, account: Address) -> Result<Option<WalletRecord>, Error> {
        if let Some(record) = self.local.get(account) {
            return Ok(Some(record));
        }
        let Some(record) = self.remote.find_by_address(account).await? else {
            return Ok(None);
        };
        if let Err(err) = self.local.merge(vec![record.clone()]) {
            tracing::warn!(%account, %err, "could not cache remote wallet record");
        }
        Ok(Some(record))
    }

    /// Marks a wallet deployed in both tiers, remote first.
    ///
    /// At-least-once with no rollback: when one tier updates and the other
    /// fails, the updated tier stays updated (the operation is idempotent
    /// and safe to repeat until both succeed).
    ///
    /// # Errors
    ///
    /// Returns the first tier failure after both tiers were attempted.
    pub async fn update_deployment(
        &self,
        account: Address,
        tx_ref: &str,
        deployed_at: u64,
    ) -> Result<(), Error> {
        let remote_result = self.remote.update_deployment(account, tx_ref, deployed_at).await;
        // the local tier is attempted regardless of the remote outcome
        let local_result = self.local.update_deployment(account, tx_ref, deployed_at);

        match (remote_result, local_result) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(err), _) => {
                tracing::warn!(%account, %err, "remote deployment update failed");
                Err(err)
            }
            (Ok(()), Err(err)) => {
                tracing::warn!(%account, %err, "local deployment update failed");
                Err(err)
            }
        }
    }

    /// Deletes the record from both tiers. The local removal is best-effort;
    /// the remote deletion decides the outcome.
    ///
    /// # Errors
    ///
    /// Propagates the remote deletion failure.
    pub async fn delete(&self, account: Address) -> Result<(), Error> {
        if let Err(err) = self.local.remove(account) {
            tracing::warn!(%account, %err, "local wallet removal failed");
        }
        self.remote.delete(account).await
    }
}
