//! Claim construction, tag derivation and identity hashing.
//!
//! All hashes are keccak256 so they match what the registry contract
//! computes on-chain. The identity hash is peppered with a server-side
//! secret; the raw identifier never appears in a claim.

use std::time::{SystemTime, UNIX_EPOCH};

use alloy_primitives::{keccak256, Address, B256};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};

use crate::contract::Claim;
use crate::error::Error;

/// Sentinel expiry meaning the claim never expires.
pub const NEVER_EXPIRES: u64 = 0;

/// Default claim validity window: one year.
pub const DEFAULT_CLAIM_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Derives the fixed-size domain tag for an application name.
///
/// Deterministic and stable across calls: `derive_tag("app1")` is always the
/// same 32 bytes.
#[must_use]
pub fn derive_tag(name: &str) -> B256 {
    keccak256(name.as_bytes())
}

/// Hashes a user identifier together with the server-side pepper.
///
/// The result is irreversible as long as the pepper stays secret; two
/// deployments with different peppers produce unrelated hashes for the same
/// identifier.
#[must_use]
pub fn hash_identity(identifier: &str, pepper: &SecretString) -> B256 {
    keccak256(format!("{identifier}:{}", pepper.expose_secret()).as_bytes())
}

/// Inputs for [`new_claim`]. `nonce`, `issued_at` and `expires_at` default
/// at construction time (fresh randomness, current time, never expires).
#[derive(Debug, Clone)]
pub struct ClaimParams {
    /// Application domain tag, from [`derive_tag`].
    pub app_tag: B256,
    /// Peppered identity hash, from [`hash_identity`].
    pub user_hash: B256,
    /// The wallet the claim vouches for.
    pub wallet: Address,
    /// Single-use nonce; defaults to 32 cryptographically random bytes.
    pub nonce: Option<B256>,
    /// Issuance time in Unix seconds; defaults to now.
    pub issued_at: Option<u64>,
    /// Expiry in Unix seconds; defaults to [`NEVER_EXPIRES`].
    pub expires_at: Option<u64>,
}

/// Constructs a claim, applying defaults and validating the time invariant.
///
/// Pure construction with no side effects beyond drawing nonce randomness.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] when the wallet is the zero address or
/// when `expires_at` precedes `issued_at` (and is not [`NEVER_EXPIRES`]).
pub fn new_claim(params: ClaimParams) -> Result<Claim, Error> {
    if params.wallet == Address::ZERO {
        return Err(Error::invalid_input("wallet", "must not be the zero address"));
    }

    let issued_at = params.issued_at.unwrap_or_else(unix_now);
    let expires_at = params.expires_at.unwrap_or(NEVER_EXPIRES);
    if expires_at != NEVER_EXPIRES && expires_at < issued_at {
        return Err(Error::invalid_input("expires_at", "expiry precedes issuance"));
    }

    Ok(Claim {
        appId: params.app_tag,
        userHash: params.user_hash,
        wallet: params.wallet,
        nonce: params.nonce.unwrap_or_else(random_nonce),
        issuedAt: issued_at,
        expiresAt: expires_at,
    })
}

/// Draws a fresh 32-byte nonce from the OS RNG.
#[must_use]
pub fn random_nonce() -> B256 {
    let mut bytes = [0_u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    B256::from(bytes)
}

/// Current Unix time in seconds.
#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Whether `claim` is expired at `now`. Never-expiring claims never are.
#[must_use]
pub fn is_expired(claim: &Claim, now: u64) -> bool {
    claim.expiresAt != NEVER_EXPIRES && claim.expiresAt < now
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn params(wallet: Address) -> ClaimParams {
        ClaimParams {
            app_tag: derive_tag("app1"),
            user_hash: derive_tag("someone"),
            wallet,
            nonce: None,
            issued_at: None,
            expires_at: None,
        }
    }

    #[test]
    fn test_tag_derivation_is_deterministic() {
        assert_eq!(derive_tag("app1"), derive_tag("app1"));
        assert_ne!(derive_tag("app1"), derive_tag("app2"));
        assert_eq!(derive_tag("app1"), keccak256(b"app1"));
    }

    #[test]
    fn test_identity_hash_depends_on_pepper() {
        let pepper_a = SecretString::from("pepper-a");
        let pepper_b = SecretString::from("pepper-b");
        assert_eq!(
            hash_identity("user@example.com", &pepper_a),
            hash_identity("user@example.com", &pepper_a)
        );
        assert_ne!(
            hash_identity("user@example.com", &pepper_a),
            hash_identity("user@example.com", &pepper_b)
        );
        // the raw identifier alone never reproduces the hash
        assert_ne!(
            hash_identity("user@example.com", &pepper_a),
            keccak256(b"user@example.com")
        );
    }

    #[test]
    fn test_defaults_applied() {
        let before = unix_now();
        let claim = new_claim(params(Address::repeat_byte(0xAA))).unwrap();
        assert!(claim.issuedAt >= before);
        assert_eq!(claim.expiresAt, NEVER_EXPIRES);
        assert_ne!(claim.nonce, B256::ZERO);
    }

    #[test]
    fn test_nonces_are_pairwise_distinct() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let claim = new_claim(params(Address::repeat_byte(0x11))).unwrap();
            assert!(seen.insert(claim.nonce), "nonce repeated");
        }
    }

    #[test]
    fn test_rejects_zero_wallet() {
        let err = new_claim(params(Address::ZERO)).unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }

    #[test]
    fn test_rejects_expiry_before_issuance() {
        let mut p = params(Address::repeat_byte(0x22));
        p.issued_at = Some(1_000);
        p.expires_at = Some(999);
        assert!(matches!(
            new_claim(p).unwrap_err(),
            Error::InvalidInput { .. }
        ));
    }

    #[test]
    fn test_zero_expiry_means_never_expires() {
        let mut p = params(Address::repeat_byte(0x22));
        p.issued_at = Some(u64::MAX);
        p.expires_at = Some(NEVER_EXPIRES);
        let claim = new_claim(p).unwrap();
        assert!(!is_expired(&claim, u64::MAX));
    }

    #[test]
    fn test_expiry_check() {
        let mut p = params(Address::repeat_byte(0x33));
        p.issued_at = Some(100);
        p.expires_at = Some(200);
        let claim = new_claim(p).unwrap();
        assert!(!is_expired(&claim, 200));
        assert!(is_expired(&claim, 201));
    }

    #[test]
    fn test_claim_serializes_with_wire_field_names() {
        let mut p = params(Address::repeat_byte(0x44));
        p.issued_at = Some(1_700_000_000);
        p.expires_at = Some(1_700_000_000 + DEFAULT_CLAIM_TTL_SECS);
        let claim = new_claim(p).unwrap();

        let json = serde_json::to_value(&claim).unwrap();
        assert!(json.get("appId").is_some());
        assert!(json.get("userHash").is_some());
        assert!(json.get("wallet").is_some());
        assert!(json.get("issuedAt").is_some());
        assert!(json.get("expiresAt").is_some());

        let back: Claim = serde_json::from_value(json).unwrap();
        assert_eq!(back, claim);
    }
}
