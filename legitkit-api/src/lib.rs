//! HTTP issuer service for the `LegitRegistry` attestation protocol.
//!
//! Exposes claim issuance and status lookup over a small authenticated
//! JSON API; all signing happens server-side so the admin key never
//! leaves the process.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use legitkit_core::issuer::{IssueOutcome, IssuerService, SignedClaim};
use legitkit_core::registry::{AttestationLedger, AttestationStatus};

pub mod auth;
pub mod error;

use auth::{auth_middleware, AuthConfig};
use error::ApiError;

/// Shared service handles available to all routes.
pub struct AppState<L> {
    /// The claim issuer holding the admin key.
    pub issuer: Arc<IssuerService<L>>,
    /// The authoritative attestation ledger.
    pub ledger: Arc<L>,
}

impl<L> Clone for AppState<L> {
    fn clone(&self) -> Self {
        Self {
            issuer: Arc::clone(&self.issuer),
            ledger: Arc::clone(&self.ledger),
        }
    }
}

/// Request body for `POST /claim`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    /// Stable identity of the requesting user.
    pub identity_id: String,
    /// Wallet address the claim should vouch for.
    pub account: Address,
}

/// Response body for `POST /claim`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ClaimResponse {
    /// A fresh claim was signed.
    Issued(SignedClaim),
    /// The account already holds an attestation; no signature is returned.
    AlreadyAttested {
        /// Always `true`.
        #[serde(rename = "alreadyAttested")]
        already_attested: bool,
    },
}

/// Builds the API router over the given state and auth configuration.
pub fn app<L>(state: AppState<L>, auth: AuthConfig) -> Router
where
    L: AttestationLedger + 'static,
{
    Router::new()
        .route("/claim", post(issue_claim::<L>))
        .route("/status/{account}", get(attestation_status::<L>))
        .layer(from_fn(auth_middleware))
        .layer(Extension(auth))
        .with_state(state)
}

/// `POST /claim`: sign a claim for the given identity and account, unless
/// the account is already attested.
///
/// Malformed bodies (missing fields, bad addresses, invalid JSON) are a
/// `400`, not the extractor's default `422`.
async fn issue_claim<L: AttestationLedger>(
    State(state): State<AppState<L>>,
    request: Result<Json<ClaimRequest>, JsonRejection>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let Json(request) = request.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    if request.identity_id.trim().is_empty() {
        return Err(ApiError::BadRequest("identityId is required".to_string()));
    }

    let outcome = state
        .issuer
        .issue(&request.identity_id, request.account)
        .await?;
    Ok(Json(match outcome {
        IssueOutcome::Issued(signed) => ClaimResponse::Issued(signed),
        IssueOutcome::AlreadyAttested => ClaimResponse::AlreadyAttested {
            already_attested: true,
        },
    }))
}

/// `GET /status/{account}`: current attestation status of an account.
async fn attestation_status<L: AttestationLedger>(
    State(state): State<AppState<L>>,
    Path(account): Path<Address>,
) -> Result<Json<AttestationStatus>, ApiError> {
    Ok(Json(state.ledger.status(account).await?))
}
