//! Generated bindings for the `LegitRegistry712` contract.
//!
//! The registry stores a per-wallet attested flag, the UID of the last
//! recorded attestation and the set of consumed claim nonces. Nonce
//! consumption is atomic inside `submitAttestation`, which is what makes the
//! contract the final arbiter of replay protection.

alloy::sol! {
    /// On-chain registry recording at most one successful attestation per wallet.
    #[sol(rpc)]
    contract LegitRegistry712 {
        /// One assertion of association between an application, a hashed
        /// user identity and a wallet. Hashed and signed per EIP-712.
        #[derive(Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
        struct Claim {
            bytes32 appId;
            bytes32 userHash;
            address wallet;
            bytes32 nonce;
            uint64 issuedAt;
            uint64 expiresAt;
        }

        /// Emitted once per recorded attestation; `uid` is the permanent record id.
        event Attested(
            bytes32 indexed uid,
            address indexed wallet,
            bytes32 appId,
            bytes32 userHash,
            uint64 issuedAt,
            uint64 expiresAt,
            bytes32 nonce,
            address admin,
            bytes adminSignature
        );

        /// Emitted when an attestation is revoked by the admin.
        event Revoked(address indexed wallet);

        /// The signer address claims must be signed by.
        function ADMIN() external view returns (address);

        /// Records `c` after verifying the admin signature, expiry and nonce
        /// freshness. Reverts on replay; the nonce transitions unused→used
        /// exactly once.
        function submitAttestation(Claim calldata c, bytes calldata adminSignature) external;

        /// Whether `wallet` holds a recorded attestation.
        function isLegit(address wallet) external view returns (bool);

        /// UID of the last attestation recorded for `wallet` (zero when none).
        function lastUID(address wallet) external view returns (bytes32);

        /// Whether `nonce` has been consumed.
        function usedNonce(bytes32 nonce) external view returns (bool);

        /// EIP-712 struct hash of `c` (diagnostic).
        function hashClaim(Claim calldata c) external pure returns (bytes32);

        /// Full EIP-712 digest of `c` under this deployment's domain (diagnostic).
        function typedDigest(Claim calldata c) external view returns (bytes32);

        /// Recovers the signer of `adminSignature` over `c` (diagnostic).
        function recoverSigner(Claim calldata c, bytes calldata adminSignature) external view returns (address);
    }
}

pub use LegitRegistry712::Claim;
