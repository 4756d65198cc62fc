//! Core SDK for the LegitRegistry attestation protocol.
//!
//! A trusted issuer co-signs EIP-712 claims binding an application tag, a
//! peppered identity hash and a wallet address; the `LegitRegistry712`
//! contract records at most one successful attestation per wallet and
//! consumes each claim nonce exactly once. This crate provides the claim
//! model, the issuer service, the registry client, the dual-tier wallet
//! record store and the workflow that sequences them.
use strum::EnumString;

/// Network a registry deployment lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Environment {
    /// Sepolia testnet (the reference deployment).
    Sepolia,
    /// Ethereum mainnet.
    Mainnet,
}

impl Environment {
    /// EIP-155 chain id for this environment.
    #[must_use]
    pub const fn chain_id(&self) -> u64 {
        match self {
            Self::Sepolia => 11_155_111,
            Self::Mainnet => 1,
        }
    }

    /// Public RPC endpoint used when no explicit RPC URL is configured.
    #[must_use]
    pub const fn default_rpc_url(&self) -> &'static str {
        match self {
            Self::Sepolia => "https://ethereum-sepolia-rpc.publicnode.com",
            Self::Mainnet => "https://ethereum-rpc.publicnode.com",
        }
    }
}

mod error;
pub use error::*;

pub mod claim;
pub mod contract;
pub mod issuer;
pub mod records;
pub mod registry;
pub mod replay;
pub mod storage;
pub mod testing;
pub mod workflow;

// private modules
mod http_request;
