//! Persistent record shapes for wallets and users.
//!
//! Field names serialize in camelCase so records are interchangeable with
//! the document store's existing collections.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::claim::unix_now;

/// Public credential material associated with a wallet at enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialMaterial {
    /// Public key, encoded as the enrolling client produced it.
    pub public_key: String,
    /// Credential identifier raw bytes, base64url.
    pub raw_id: String,
}

/// Synchronization state of a locally cached record relative to the remote
/// store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncState {
    /// The record is known to be persisted remotely.
    #[default]
    Synced,
    /// The local write succeeded but the remote write has not; the record
    /// must be treated as durable locally only.
    PendingRemote,
}

/// One wallet known to the system, keyed by its account address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecord {
    /// Account address, the record's primary key.
    pub account_address: Address,
    /// Credential material captured at enrollment, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<CredentialMaterial>,
    /// Identity that enrolled this wallet, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_identity_id: Option<String>,
    /// Whether the account contract has been deployed.
    pub is_deployed: bool,
    /// Unix seconds at record creation.
    pub created_at: u64,
    /// Unix seconds at deployment, once deployed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployed_at: Option<u64>,
    /// Reference to the deployment transaction, once deployed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_tx_ref: Option<String>,
    /// Unix seconds of the last mutation, when tracked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<u64>,
    /// Local-versus-remote durability marker; absent in remote documents.
    #[serde(default)]
    pub sync: SyncState,
}

impl WalletRecord {
    /// Fresh, undeployed record created now.
    #[must_use]
    pub fn new(
        account_address: Address,
        credential: Option<CredentialMaterial>,
        owner_identity_id: Option<String>,
    ) -> Self {
        Self {
            account_address,
            credential,
            owner_identity_id,
            is_deployed: false,
            created_at: unix_now(),
            deployed_at: None,
            deployment_tx_ref: None,
            updated_at: None,
            sync: SyncState::default(),
        }
    }
}

/// One enrolled user in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Stable user identifier (the identity the issuer hashes).
    pub user_id: String,
    /// Wallet the user enrolled with, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<Address>,
    /// Public credential info captured at enrollment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_public_info: Option<CredentialMaterial>,
    /// Whether an attestation has been recorded for this user. Flips to
    /// `true` at most once.
    pub attested: bool,
    /// Reference to the attesting transaction, once attested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attestation_tx_ref: Option<String>,
    /// Unix seconds at record creation.
    pub created_at: u64,
    /// Unix seconds when the attestation landed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attested_at: Option<u64>,
}

impl UserRecord {
    /// Fresh, unattested record created now.
    #[must_use]
    pub fn new(
        user_id: String,
        wallet_address: Option<Address>,
        credential_public_info: Option<CredentialMaterial>,
    ) -> Self {
        Self {
            user_id,
            wallet_address,
            credential_public_info,
            attested: false,
            attestation_tx_ref: None,
            created_at: unix_now(),
            attested_at: None,
        }
    }
}
