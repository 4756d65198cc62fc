//! End-to-end attestation workflow: enrollment persistence, claim
//! issuance, submission and outcome disambiguation.
//!
//! The flow is a small state machine. Success shapes (`Success`,
//! `AlreadyAttested`) are sticky: re-running a finished flow returns the
//! recorded outcome without touching the issuer or the ledger again. A
//! `Failed` flow may be re-run; its `verify_before_retry` hint tells the
//! caller whether the ledger must be re-checked first.

use std::sync::{Arc, Mutex};

use alloy_primitives::Address;

use crate::claim::unix_now;
use crate::error::Error;
use crate::issuer::{IssueOutcome, IssuerService, SignedClaim};
use crate::records::{CredentialMaterial, UserRecord, WalletRecord};
use crate::registry::AttestationLedger;
use crate::storage::{RemoteWalletStore, UserDirectory, WalletStore};

/// Observable state of an [`AttestationFlow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    /// Nothing started yet.
    Idle,
    /// Waiting for the issuer to sign a claim.
    FetchingSignature,
    /// Claim signed; waiting for the ledger to record it.
    Submitting,
    /// The attestation was recorded.
    Success {
        /// Permanent record id, zero when the confirming receipt carried
        /// no decodable record event.
        record_id: alloy_primitives::B256,
        /// Reference to the recording transaction, when known.
        tx_ref: Option<String>,
    },
    /// The account was already attested; no new record was created.
    AlreadyAttested,
    /// The flow failed.
    Failed {
        /// Operator-facing failure description.
        message: String,
        /// When `true` the ledger state is uncertain and must be re-read
        /// before retrying; the previous attempt may still have landed.
        verify_before_retry: bool,
    },
}

impl FlowState {
    /// Whether this state ends the flow.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success { .. } | Self::AlreadyAttested | Self::Failed { .. }
        )
    }
}

/// Sequences enrollment, issuance and submission for one account.
pub struct AttestationFlow<L, R, U> {
    issuer: Arc<IssuerService<L>>,
    ledger: Arc<L>,
    wallets: Arc<WalletStore<R>>,
    users: Arc<U>,
    state: Mutex<FlowState>,
}

impl<L, R, U> AttestationFlow<L, R, U>
where
    L: AttestationLedger,
    R: RemoteWalletStore,
    U: UserDirectory,
{
    /// Builds an idle flow over the given services.
    pub fn new(
        issuer: Arc<IssuerService<L>>,
        ledger: Arc<L>,
        wallets: Arc<WalletStore<R>>,
        users: Arc<U>,
    ) -> Self {
        Self {
            issuer,
            ledger,
            wallets,
            users,
            state: Mutex::new(FlowState::Idle),
        }
    }

    /// Current flow state.
    #[must_use]
    pub fn state(&self) -> FlowState {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn set_state(&self, next: FlowState) -> FlowState {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *state = next.clone();
        next
    }

    /// Runs the flow to a terminal state.
    ///
    /// Record persistence is best-effort and never blocks attestation; a
    /// wallet or user store failure is logged and the flow proceeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] when the flow is already running.
    /// All other failures become a terminal [`FlowState::Failed`], not an
    /// error.
    pub async fn run(
        &self,
        identity_id: &str,
        account: Address,
        credential: Option<CredentialMaterial>,
    ) -> Result<FlowState, Error> {
        {
            let mut state = self
                .state
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            match &*state {
                FlowState::Success { .. } | FlowState::AlreadyAttested => {
                    return Ok(state.clone());
                }
                FlowState::FetchingSignature | FlowState::Submitting => {
                    return Err(Error::InvalidState {
                        reason: format!("attestation already in progress ({state:?})"),
                    });
                }
                FlowState::Idle | FlowState::Failed { .. } => {
                    *state = FlowState::FetchingSignature;
                }
            }
        }

        self.persist_enrollment(identity_id, account, credential).await;

        let signed = match self.issuer.issue(identity_id, account).await {
            Ok(IssueOutcome::Issued(signed)) => signed,
            Ok(IssueOutcome::AlreadyAttested) => {
                return Ok(self.set_state(FlowState::AlreadyAttested));
            }
            Err(err) => {
                return Ok(self.set_state(FlowState::Failed {
                    message: err.to_string(),
                    verify_before_retry: false,
                }));
            }
        };

        self.set_state(FlowState::Submitting);
        match self.ledger.submit(&signed.claim, &signed.signature).await {
            Ok(receipt) => {
                let tx_ref = format!("{}", receipt.tx_hash);
                self.record_attestation(identity_id, &tx_ref).await;
                Ok(self.set_state(FlowState::Success {
                    record_id: receipt.record_id,
                    tx_ref: Some(tx_ref),
                }))
            }
            Err(err) => Ok(self.settle_submission_failure(identity_id, account, &signed, err).await),
        }
    }

    /// Best-effort persistence of the wallet and user records before the
    /// claim is requested, mirroring enrollment.
    async fn persist_enrollment(
        &self,
        identity_id: &str,
        account: Address,
        credential: Option<CredentialMaterial>,
    ) {
        let wallet = WalletRecord::new(account, credential.clone(), Some(identity_id.to_string()));
        if let Err(err) = self.wallets.save(wallet).await {
            tracing::warn!(%account, %err, "wallet record not saved");
        }

        let user = UserRecord::new(identity_id.to_string(), Some(account), credential);
        if let Err(err) = self.users.create_if_absent(&user).await {
            tracing::warn!(identity_id, %err, "user record not saved");
        }
    }

    async fn record_attestation(&self, identity_id: &str, tx_ref: &str) {
        if let Err(err) = self.users.mark_attested(identity_id, tx_ref, unix_now()).await {
            tracing::warn!(identity_id, %err, "user attestation marker not saved");
        }
    }

    /// Maps a submission failure to a terminal state, consulting the
    /// ledger where the failure leaves the outcome ambiguous.
    async fn settle_submission_failure(
        &self,
        identity_id: &str,
        account: Address,
        signed: &SignedClaim,
        err: Error,
    ) -> FlowState {
        match err {
            // Replay at submission time usually means a concurrent attempt
            // won; confirm before reporting failure.
            Error::ReplayRejected { ref reason } => {
                match self.ledger.status(account).await {
                    Ok(status) if status.is_attested => {
                        tracing::info!(%account, "submission lost the race, account attested");
                        self.set_state(FlowState::AlreadyAttested)
                    }
                    _ => self.set_state(FlowState::Failed {
                        message: reason.clone(),
                        verify_before_retry: true,
                    }),
                }
            }
            // A timed-out transaction may still have landed. The claim's
            // nonce tells the two cases apart.
            Error::ConfirmationTimeout { tx_hash } => {
                let landed = match self.ledger.status(account).await {
                    Ok(status) => status.is_attested,
                    Err(_) => self
                        .ledger
                        .nonce_used(signed.claim.nonce)
                        .await
                        .unwrap_or(false),
                };
                if landed {
                    let tx_ref = format!("{tx_hash}");
                    self.record_attestation(identity_id, &tx_ref).await;
                    let record_id = match self.ledger.status(account).await {
                        Ok(status) => status.last_record_id.unwrap_or_default(),
                        Err(_) => alloy_primitives::B256::ZERO,
                    };
                    self.set_state(FlowState::Success {
                        record_id,
                        tx_ref: Some(tx_ref),
                    })
                } else {
                    self.set_state(FlowState::Failed {
                        message: err.to_string(),
                        verify_before_retry: true,
                    })
                }
            }
            other => self.set_state(FlowState::Failed {
                message: other.to_string(),
                verify_before_retry: true,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::*;
    use crate::issuer::IssuerConfig;
    use crate::storage::LocalWalletCache;
    use crate::testing::{MemoryLedger, MemoryUserDirectory, MemoryWalletStore};

    const TEST_ADMIN_KEY: &str =
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn flow(
        dir: &tempfile::TempDir,
        ledger: Arc<MemoryLedger>,
    ) -> AttestationFlow<MemoryLedger, MemoryWalletStore, MemoryUserDirectory> {
        let issuer = IssuerService::new(
            IssuerConfig::new("app1".to_string(), 11_155_111, Address::repeat_byte(0x42)),
            TEST_ADMIN_KEY,
            SecretString::from("pepper"),
            Arc::clone(&ledger),
        )
        .unwrap();
        let wallets = WalletStore::new(
            LocalWalletCache::open(dir.path().join("wallets.json")),
            Arc::new(MemoryWalletStore::new()),
        );
        AttestationFlow::new(
            Arc::new(issuer),
            ledger,
            Arc::new(wallets),
            Arc::new(MemoryUserDirectory::new()),
        )
    }

    #[tokio::test]
    async fn test_terminal_state_is_sticky() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(MemoryLedger::new());
        let flow = flow(&dir, Arc::clone(&ledger));
        let account = Address::repeat_byte(0x11);

        let first = flow.run("alice@example.com", account, None).await.unwrap();
        assert!(matches!(first, FlowState::Success { .. }));

        // re-running returns the recorded outcome without resubmitting
        let before = ledger.submissions.load(std::sync::atomic::Ordering::SeqCst);
        let second = flow.run("alice@example.com", account, None).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(
            ledger.submissions.load(std::sync::atomic::Ordering::SeqCst),
            before
        );
    }

    #[tokio::test]
    async fn test_issuance_failure_does_not_require_verification() {
        let dir = tempfile::tempdir().unwrap();
        let flow = flow(&dir, Arc::new(MemoryLedger::new()));

        // zero address is rejected by the issuer before anything is signed
        let state = flow
            .run("alice@example.com", Address::ZERO, None)
            .await
            .unwrap();
        let FlowState::Failed {
            verify_before_retry,
            ..
        } = state
        else {
            panic!("expected failure, got {state:?}");
        };
        assert!(!verify_before_retry);

        // a failed flow may be retried
        let retried = flow
            .run("alice@example.com", Address::repeat_byte(0x11), None)
            .await
            .unwrap();
        assert!(matches!(retried, FlowState::Success { .. }));
    }
}
