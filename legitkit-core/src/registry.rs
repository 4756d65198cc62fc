//! Client for the on-chain `LegitRegistry712` attestation ledger.
//!
//! Submissions are dry-run first so deterministic rejections (replay,
//! expiry, bad signature) surface without spending gas; only a clean
//! simulation is broadcast and awaited.

use std::future::Future;
use std::time::Duration;

use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::contract::{Claim, LegitRegistry712};
use crate::error::Error;

/// How long a broadcast transaction is awaited before reporting
/// [`Error::ConfirmationTimeout`].
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(90);

/// Point-in-time attestation status of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationStatus {
    /// Whether the account holds a recorded attestation.
    pub is_attested: bool,
    /// Permanent id of the most recent attestation record, when one exists.
    pub last_record_id: Option<B256>,
}

/// Proof that a submission was recorded by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationReceipt {
    /// Permanent id of the new attestation record.
    pub record_id: B256,
    /// Hash of the confirming transaction.
    pub tx_hash: B256,
}

/// The authoritative attestation store.
///
/// Abstracted so issuance, replay checks and the workflow can run against
/// an in-memory double in tests; [`RegistryClient`] is the production
/// implementation. Methods return `Send` futures so implementations can be
/// driven from multi-threaded executors.
pub trait AttestationLedger: Send + Sync {
    /// Current attestation status of `account`.
    fn status(
        &self,
        account: Address,
    ) -> impl Future<Output = Result<AttestationStatus, Error>> + Send;

    /// Whether `nonce` has been consumed.
    fn nonce_used(&self, nonce: B256) -> impl Future<Output = Result<bool, Error>> + Send;

    /// Records `claim` under `signature`, consuming the claim's nonce.
    fn submit(
        &self,
        claim: &Claim,
        signature: &Bytes,
    ) -> impl Future<Output = Result<AttestationReceipt, Error>> + Send;
}

/// JSON-RPC client for a deployed `LegitRegistry712`.
pub struct RegistryClient {
    registry: LegitRegistry712::LegitRegistry712Instance<DynProvider>,
    rpc_url: Url,
    confirmation_timeout: Duration,
}

impl RegistryClient {
    /// Read-only client; [`AttestationLedger::submit`] will fail at the node
    /// for lack of a funded sender.
    #[must_use]
    pub fn new(registry_address: Address, rpc_url: Url) -> Self {
        let provider = ProviderBuilder::new()
            .connect_http(rpc_url.clone())
            .erased();
        Self {
            registry: LegitRegistry712::new(registry_address, provider),
            rpc_url,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        }
    }

    /// Client with a local signer for submitting attestations.
    #[must_use]
    pub fn with_submitter(
        registry_address: Address,
        rpc_url: Url,
        submitter: PrivateKeySigner,
    ) -> Self {
        let provider = ProviderBuilder::new()
            .wallet(submitter)
            .connect_http(rpc_url.clone())
            .erased();
        Self {
            registry: LegitRegistry712::new(registry_address, provider),
            rpc_url,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        }
    }

    /// Overrides [`DEFAULT_CONFIRMATION_TIMEOUT`].
    #[must_use]
    pub const fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    /// The signer address the contract accepts claims from.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] when the call fails.
    pub async fn admin(&self) -> Result<Address, Error> {
        self.registry
            .ADMIN()
            .call()
            .await
            .map_err(|err| self.network_error(err.to_string()))
    }

    fn network_error(&self, error: String) -> Error {
        Error::Network {
            url: self.rpc_url.to_string(),
            status: None,
            error,
        }
    }
}

impl AttestationLedger for RegistryClient {
    async fn status(&self, account: Address) -> Result<AttestationStatus, Error> {
        let is_attested = self
            .registry
            .isLegit(account)
            .call()
            .await
            .map_err(|err| self.network_error(err.to_string()))?;
        let uid = self
            .registry
            .lastUID(account)
            .call()
            .await
            .map_err(|err| self.network_error(err.to_string()))?;

        Ok(AttestationStatus {
            is_attested,
            last_record_id: (uid != B256::ZERO).then_some(uid),
        })
    }

    async fn nonce_used(&self, nonce: B256) -> Result<bool, Error> {
        self.registry
            .usedNonce(nonce)
            .call()
            .await
            .map_err(|err| self.network_error(err.to_string()))
    }

    async fn submit(
        &self,
        claim: &Claim,
        signature: &Bytes,
    ) -> Result<AttestationReceipt, Error> {
        let call = self
            .registry
            .submitAttestation(claim.clone(), signature.clone());

        // Dry-run catches deterministic reverts before gas is spent.
        if let Err(err) = call.call().await {
            return Err(classify_revert(err.to_string()));
        }

        let pending = call
            .send()
            .await
            .map_err(|err| classify_revert(err.to_string()))?
            .with_timeout(Some(self.confirmation_timeout));
        let tx_hash = *pending.tx_hash();
        tracing::info!(wallet = %claim.wallet, %tx_hash, "attestation broadcast");

        let receipt = pending.get_receipt().await.map_err(|err| {
            let message = err.to_string();
            if message.contains("timed out") || message.contains("timeout") {
                Error::ConfirmationTimeout { tx_hash }
            } else {
                self.network_error(message)
            }
        })?;

        if !receipt.status() {
            return Err(Error::SubmissionRejected {
                reason: format!("transaction {tx_hash} reverted"),
            });
        }

        let record_id = receipt
            .logs()
            .iter()
            .find_map(|log| {
                log.log_decode::<LegitRegistry712::Attested>()
                    .ok()
                    .map(|event| event.inner.data.uid)
            })
            .unwrap_or_else(|| {
                tracing::warn!(%tx_hash, "confirmed receipt carries no attestation event");
                B256::ZERO
            });

        tracing::info!(wallet = %claim.wallet, %record_id, %tx_hash, "attestation recorded");
        Ok(AttestationReceipt { record_id, tx_hash })
    }
}

/// Maps a node error message to the error taxonomy.
///
/// Replay rejections are terminal for the claim; other reverts are terminal
/// for the submission; anything else is treated as transport trouble.
fn classify_revert(message: String) -> Error {
    let lowered = message.to_lowercase();
    if lowered.contains("nonce already used")
        || lowered.contains("already attested")
        || lowered.contains("already legit")
    {
        Error::ReplayRejected { reason: message }
    } else if lowered.contains("revert")
        || lowered.contains("expired")
        || lowered.contains("signature")
    {
        Error::SubmissionRejected { reason: message }
    } else {
        Error::Network {
            url: "<rpc>".to_string(),
            status: None,
            error: message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_reverts_classified_as_terminal_for_claim() {
        for message in [
            "execution reverted: nonce already used",
            "execution reverted: wallet already attested",
        ] {
            assert!(matches!(
                classify_revert(message.to_string()),
                Error::ReplayRejected { .. }
            ));
        }
    }

    #[test]
    fn test_other_reverts_rejected_without_replay_flag() {
        for message in [
            "execution reverted: claim expired",
            "execution reverted: bad admin signature",
            "execution reverted",
        ] {
            assert!(matches!(
                classify_revert(message.to_string()),
                Error::SubmissionRejected { .. }
            ));
        }
    }

    #[test]
    fn test_transport_noise_stays_transient() {
        let err = classify_revert("connection reset by peer".to_string());
        assert!(matches!(err, Error::Network { .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn test_status_wire_shape() {
        let status = AttestationStatus {
            is_attested: true,
            last_record_id: Some(B256::repeat_byte(7)),
        };
        let json = serde_json::to_value(status).unwrap();
        assert!(json.get("isAttested").is_some());
        assert!(json.get("lastRecordId").is_some());

        let none: AttestationStatus =
            serde_json::from_str(r#"{"isAttested":false,"lastRecordId":null}"#).unwrap();
        assert_eq!(none.last_record_id, None);
        assert!(!none.is_attested);
    }
}
