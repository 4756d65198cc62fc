//! In-memory implementations of the storage and ledger traits, with fault
//! injection. Used throughout this crate's tests and exported for
//! downstream integration tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use alloy_primitives::{keccak256, Address, Bytes, B256};

use crate::claim;
use crate::contract::Claim;
use crate::error::Error;
use crate::records::{UserRecord, WalletRecord};
use crate::registry::{AttestationLedger, AttestationReceipt, AttestationStatus};
use crate::storage::RemoteWalletStore;
use crate::storage::UserDirectory;

#[derive(Debug, Default)]
struct LedgerState {
    attested: HashMap<Address, B256>,
    used_nonces: HashSet<B256>,
}

/// [`AttestationLedger`] over process memory, mirroring the contract's
/// semantics: at most one attestation per wallet, each nonce consumed
/// exactly once, both checked atomically at submission.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
    /// When set, the next read fails with a network error (one-shot).
    pub fail_next_read: AtomicBool,
    /// When set, the next submission is recorded but reported as a
    /// confirmation timeout (one-shot). Models a transaction that landed
    /// after the client stopped waiting.
    pub timeout_next_submit: AtomicBool,
    /// Number of submissions attempted, successful or not.
    pub submissions: AtomicUsize,
}

impl MemoryLedger {
    /// Empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an existing attestation for `account`.
    pub fn seed_attested(&self, account: Address, record_id: B256) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        state.attested.insert(account, record_id);
    }

    fn take_fault(flag: &AtomicBool) -> bool {
        flag.swap(false, Ordering::SeqCst)
    }

    fn read_fault(&self) -> Result<(), Error> {
        if Self::take_fault(&self.fail_next_read) {
            return Err(Error::Network {
                url: "memory://ledger".to_string(),
                status: None,
                error: "injected read failure".to_string(),
            });
        }
        Ok(())
    }
}

impl AttestationLedger for MemoryLedger {
    async fn status(&self, account: Address) -> Result<AttestationStatus, Error> {
        self.read_fault()?;
        let state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let last_record_id = state.attested.get(&account).copied();
        Ok(AttestationStatus {
            is_attested: last_record_id.is_some(),
            last_record_id,
        })
    }

    async fn nonce_used(&self, nonce: B256) -> Result<bool, Error> {
        self.read_fault()?;
        let state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(state.used_nonces.contains(&nonce))
    }

    async fn submit(
        &self,
        claim: &Claim,
        signature: &Bytes,
    ) -> Result<AttestationReceipt, Error> {
        self.submissions.fetch_add(1, Ordering::SeqCst);

        if signature.is_empty() {
            return Err(Error::SubmissionRejected {
                reason: "execution reverted: bad admin signature".to_string(),
            });
        }
        if claim::is_expired(claim, claim::unix_now()) {
            return Err(Error::SubmissionRejected {
                reason: "execution reverted: claim expired".to_string(),
            });
        }

        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if state.used_nonces.contains(&claim.nonce) {
            return Err(Error::ReplayRejected {
                reason: "execution reverted: nonce already used".to_string(),
            });
        }
        if state.attested.contains_key(&claim.wallet) {
            return Err(Error::ReplayRejected {
                reason: "execution reverted: wallet already attested".to_string(),
            });
        }

        let mut preimage = [0_u8; 52];
        preimage[..20].copy_from_slice(claim.wallet.as_slice());
        preimage[20..].copy_from_slice(claim.nonce.as_slice());
        let record_id = keccak256(preimage);
        let tx_hash = keccak256(record_id);

        state.used_nonces.insert(claim.nonce);
        state.attested.insert(claim.wallet, record_id);
        drop(state);

        if Self::take_fault(&self.timeout_next_submit) {
            return Err(Error::ConfirmationTimeout { tx_hash });
        }
        Ok(AttestationReceipt { record_id, tx_hash })
    }
}

/// [`RemoteWalletStore`] over process memory with write fault injection.
#[derive(Default)]
pub struct MemoryWalletStore {
    records: Mutex<HashMap<Address, WalletRecord>>,
    /// When set, the next write fails with a network error (one-shot).
    pub fail_next_write: AtomicBool,
}

impl MemoryWalletStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn write_fault(&self) -> Result<(), Error> {
        if self.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(Error::Network {
                url: "memory://wallets".to_string(),
                status: Some(503),
                error: "injected write failure".to_string(),
            });
        }
        Ok(())
    }
}

impl RemoteWalletStore for MemoryWalletStore {
    async fn save(&self, record: &WalletRecord) -> Result<(), Error> {
        self.write_fault()?;
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        records.insert(record.account_address, record.clone());
        Ok(())
    }

    async fn find_by_owner(&self, owner: &str) -> Result<Vec<WalletRecord>, Error> {
        let records = self
            .records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(records
            .values()
            .filter(|record| record.owner_identity_id.as_deref() == Some(owner))
            .cloned()
            .collect())
    }

    async fn find_by_address(&self, account: Address) -> Result<Option<WalletRecord>, Error> {
        let records = self
            .records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(records.get(&account).cloned())
    }

    async fn update_deployment(
        &self,
        account: Address,
        tx_ref: &str,
        deployed_at: u64,
    ) -> Result<(), Error> {
        self.write_fault()?;
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let record = records.get_mut(&account).ok_or_else(|| Error::Storage {
            error: format!("wallet {account} not found"),
        })?;
        if !record.is_deployed {
            record.is_deployed = true;
            record.deployed_at = Some(deployed_at);
            record.deployment_tx_ref = Some(tx_ref.to_string());
        }
        Ok(())
    }

    async fn delete(&self, account: Address) -> Result<(), Error> {
        self.write_fault()?;
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        records.remove(&account);
        Ok(())
    }
}

/// [`UserDirectory`] over process memory.
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: Mutex<HashMap<String, UserRecord>>,
}

impl MemoryUserDirectory {
    /// Empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserDirectory for MemoryUserDirectory {
    async fn create_if_absent(&self, record: &UserRecord) -> Result<(), Error> {
        let mut users = self
            .users
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        users
            .entry(record.user_id.clone())
            .or_insert_with(|| record.clone());
        Ok(())
    }

    async fn find(&self, user_id: &str) -> Result<Option<UserRecord>, Error> {
        let users = self
            .users
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(users.get(user_id).cloned())
    }

    async fn mark_attested(
        &self,
        user_id: &str,
        tx_ref: &str,
        attested_at: u64,
    ) -> Result<(), Error> {
        let mut users = self
            .users
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let record = users.get_mut(user_id).ok_or_else(|| Error::Storage {
            error: format!("user {user_id} not found"),
        })?;
        if !record.attested {
            record.attested = true;
            record.attestation_tx_ref = Some(tx_ref.to_string());
            record.attested_at = Some(attested_at);
        }
        Ok(())
    }
}
