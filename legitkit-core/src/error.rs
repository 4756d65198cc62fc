use alloy_primitives::B256;
use thiserror::Error;

/// Error outputs from `LegitKit`.
///
/// "Already attested" is deliberately absent: it is an expected business
/// outcome and surfaces as [`crate::issuer::IssueOutcome::AlreadyAttested`],
/// never as an error.
#[derive(Debug, Error)]
pub enum Error {
    /// The presented input is not valid for the requested operation.
    #[error("invalid_input: {attribute}: {reason}")]
    InvalidInput {
        /// Name of the offending attribute.
        attribute: String,
        /// Why the value was rejected.
        reason: String,
    },
    /// Unexpected error serializing or deserializing information.
    #[error("serialization_error: {error}")]
    Serialization {
        /// Underlying serializer message.
        error: String,
    },
    /// Network failure with details. Safe to retry on read paths.
    #[error("network_error: {url} (status: {status:?}): {error}")]
    Network {
        /// The URL the request targeted.
        url: String,
        /// HTTP status code, when a response was received.
        status: Option<u16>,
        /// Underlying transport message.
        error: String,
    },
    /// Local or remote record store failure.
    #[error("storage_error: {error}")]
    Storage {
        /// What went wrong.
        error: String,
    },
    /// Missing or unusable credentials/keys. Fatal at startup, not per-request.
    #[error("configuration_error: {error}")]
    Configuration {
        /// What is misconfigured.
        error: String,
    },
    /// The signing key failed to produce a signature.
    #[error("signing_error: {error}")]
    Signing {
        /// Underlying signer message.
        error: String,
    },
    /// The authoritative store already holds this nonce or attestation.
    /// Terminal for the claim: re-issue instead of retrying it.
    #[error("replay_rejected: {reason}")]
    ReplayRejected {
        /// Rejection reason reported by the store.
        reason: String,
    },
    /// The authoritative store rejected the submission for a reason other
    /// than replay (expired claim, bad signature, reverted transaction).
    #[error("submission_rejected: {reason}")]
    SubmissionRejected {
        /// Rejection reason reported by the store.
        reason: String,
    },
    /// The transaction was broadcast but not confirmed in time. The caller
    /// must re-query attestation status before retrying: the submission may
    /// still have landed.
    #[error("confirmation_timeout: transaction {tx_hash} was not confirmed in time")]
    ConfirmationTimeout {
        /// Hash of the broadcast transaction.
        tx_hash: B256,
    },
    /// The operation is not valid in the current workflow state.
    #[error("invalid_state: {reason}")]
    InvalidState {
        /// Why the operation was refused.
        reason: String,
    },
}

impl Error {
    /// Shorthand for an [`Error::InvalidInput`].
    pub fn invalid_input(attribute: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            attribute: attribute.into(),
            reason: reason.into(),
        }
    }

    /// Whether retrying (with backoff) can plausibly succeed.
    ///
    /// A [`Error::ConfirmationTimeout`] is transient but the caller must
    /// re-check status first; see the variant documentation.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::ConfirmationTimeout { .. }
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            url: err
                .url()
                .map_or_else(|| "<unknown>".to_string(), ToString::to_string),
            status: err.status().map(|s| s.as_u16()),
            error: err.to_string(),
        }
    }
}
