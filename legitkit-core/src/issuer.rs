//! Claim issuance: replay-guarded EIP-712 signing with the admin key.

use std::sync::Arc;

use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use alloy::sol_types::{eip712_domain, Eip712Domain, SolStruct};
use alloy_primitives::{Address, Bytes, B256};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::claim::{self, ClaimParams, DEFAULT_CLAIM_TTL_SECS};
use crate::contract::Claim;
use crate::error::Error;
use crate::registry::AttestationLedger;
use crate::replay::ReplayGuard;

/// EIP-712 domain name shared by all registry deployments.
pub const DOMAIN_NAME: &str = "UryuDAO";

/// EIP-712 domain version.
pub const DOMAIN_VERSION: &str = "1";

/// Static configuration for an [`IssuerService`].
#[derive(Debug, Clone)]
pub struct IssuerConfig {
    /// Application name; its hash becomes every claim's `appId` tag.
    pub app_name: String,
    /// Chain the verifying contract is deployed on.
    pub chain_id: u64,
    /// Address of the verifying registry contract. Signatures are bound to
    /// it and are invalid against any other deployment.
    pub verifying_contract: Address,
    /// Claim validity window in seconds.
    pub claim_ttl_secs: u64,
}

impl IssuerConfig {
    /// Configuration with the default one-year claim validity.
    #[must_use]
    pub const fn new(app_name: String, chain_id: u64, verifying_contract: Address) -> Self {
        Self {
            app_name,
            chain_id,
            verifying_contract,
            claim_ttl_secs: DEFAULT_CLAIM_TTL_SECS,
        }
    }
}

/// A claim together with the admin signature over its EIP-712 digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedClaim {
    /// The signed claim, immutable from here on.
    pub claim: Claim,
    /// 65-byte ECDSA signature (r ‖ s ‖ v).
    pub signature: Bytes,
}

/// Outcome of an issuance request.
///
/// `AlreadyAttested` is an expected business result, not a failure, and
/// carries no signature material at all: an account that cannot use a
/// signature must never receive one.
#[derive(Debug, Clone)]
pub enum IssueOutcome {
    /// A fresh claim was signed for the account.
    Issued(SignedClaim),
    /// The account already holds an attestation; nothing was signed.
    AlreadyAttested,
}

/// Signs claims with the exclusively-held admin key after consulting the
/// replay guard. The key and the identity pepper never leave this service.
#[derive(Debug)]
pub struct IssuerService<L> {
    signer: PrivateKeySigner,
    pepper: SecretString,
    app_tag: B256,
    domain: Eip712Domain,
    claim_ttl_secs: u64,
    guard: ReplayGuard<L>,
}

impl<L: AttestationLedger> IssuerService<L> {
    /// Builds the service from configuration, the admin key and the pepper.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when the signing key does not parse;
    /// this is fatal at startup, not a per-request condition.
    pub fn new(
        config: IssuerConfig,
        admin_key_hex: &str,
        pepper: SecretString,
        ledger: Arc<L>,
    ) -> Result<Self, Error> {
        let signer: PrivateKeySigner =
            admin_key_hex
                .trim()
                .parse()
                .map_err(|err| Error::Configuration {
                    error: format!("admin signing key unusable: {err}"),
                })?;

        let domain = eip712_domain! {
            name: DOMAIN_NAME,
            version: DOMAIN_VERSION,
            chain_id: config.chain_id,
            verifying_contract: config.verifying_contract,
        };

        Ok(Self {
            signer,
            pepper,
            app_tag: claim::derive_tag(&config.app_name),
            domain,
            claim_ttl_secs: config.claim_ttl_secs,
            guard: ReplayGuard::new(ledger),
        })
    }

    /// Address of the signing key; must match the contract's `ADMIN`.
    #[must_use]
    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }

    /// The EIP-712 domain this issuer signs under.
    #[must_use]
    pub const fn domain(&self) -> &Eip712Domain {
        &self.domain
    }

    /// Issues a signed claim binding `identity_id` to `account`, or reports
    /// that the account is already attested (without producing a signature).
    ///
    /// Each call draws a fresh nonce, so issuance is deterministic in
    /// content but never in output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty identity or the zero
    /// address, [`Error::Signing`] when the key fails to sign.
    pub async fn issue(&self, identity_id: &str, account: Address) -> Result<IssueOutcome, Error> {
        if identity_id.trim().is_empty() {
            return Err(Error::invalid_input("identity_id", "must not be empty"));
        }
        if account == Address::ZERO {
            return Err(Error::invalid_input("account", "must not be the zero address"));
        }

        if self.guard.is_already_attested(account).await {
            tracing::info!(%account, "refusing to sign: account already attested");
            return Ok(IssueOutcome::AlreadyAttested);
        }

        // a single timestamp keeps expiresAt exactly issuedAt + ttl
        let issued_at = claim::unix_now();
        let claim = claim::new_claim(ClaimParams {
            app_tag: self.app_tag,
            user_hash: claim::hash_identity(identity_id, &self.pepper),
            wallet: account,
            nonce: None,
            issued_at: Some(issued_at),
            expires_at: Some(issued_at.saturating_add(self.claim_ttl_secs)),
        })?;

        let signature = self.sign(&claim)?;
        tracing::info!(%account, "claim signed");
        Ok(IssueOutcome::Issued(SignedClaim { claim, signature }))
    }

    fn sign(&self, claim: &Claim) -> Result<Bytes, Error> {
        let digest = claim.eip712_signing_hash(&self.domain);
        let signature = self
            .signer
            .sign_hash_sync(&digest)
            .map_err(|err| Error::Signing {
                error: err.to_string(),
            })?;
        Ok(Bytes::copy_from_slice(&signature.as_bytes()))
    }
}
