//! Remote record stores reached over HTTP.
//!
//! The wallet store and the user directory are plain document APIs; this
//! module defines the traits the rest of the crate programs against and
//! the HTTP implementations used in production.

use std::future::Future;

use alloy_primitives::Address;
use serde::Serialize;

use crate::error::Error;
use crate::http_request::Request;
use crate::records::{UserRecord, WalletRecord};

/// Durable, shared wallet store. Methods return `Send` futures.
pub trait RemoteWalletStore: Send + Sync {
    /// Persists `record`, replacing any existing document for its address.
    fn save(&self, record: &WalletRecord) -> impl Future<Output = Result<(), Error>> + Send;

    /// All wallet records owned by `owner`.
    fn find_by_owner(
        &self,
        owner: &str,
    ) -> impl Future<Output = Result<Vec<WalletRecord>, Error>> + Send;

    /// The record for `account`, if one exists.
    fn find_by_address(
        &self,
        account: Address,
    ) -> impl Future<Output = Result<Option<WalletRecord>, Error>> + Send;

    /// Marks the wallet deployed. At-least-once: repeat calls are accepted.
    fn update_deployment(
        &self,
        account: Address,
        tx_ref: &str,
        deployed_at: u64,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Deletes the record for `account`. Deleting an absent record succeeds.
    fn delete(&self, account: Address) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Directory of enrolled users. Methods return `Send` futures.
pub trait UserDirectory: Send + Sync {
    /// Creates the user record unless one already exists; creating an
    /// existing user is not an error.
    fn create_if_absent(
        &self,
        record: &UserRecord,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Looks up a user by id.
    fn find(&self, user_id: &str)
        -> impl Future<Output = Result<Option<UserRecord>, Error>> + Send;

    /// Records that the user's attestation landed in `tx_ref` at
    /// `attested_at`. Flips `attested` at most once.
    fn mark_attested(
        &self,
        user_id: &str,
        tx_ref: &str,
        attested_at: u64,
    ) -> impl Future<Output = Result<(), Error>> + Send;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeploymentPatch<'a> {
    is_deployed: bool,
    deployed_at: u64,
    deployment_tx_ref: &'a str,
}

/// [`RemoteWalletStore`] over a document-store HTTP API.
pub struct HttpWalletStore {
    base_url: String,
    request: Request,
}

impl HttpWalletStore {
    /// Client for the store rooted at `base_url`.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            request: Request::new(),
        }
    }

    fn wallet_url(&self, account: Address) -> String {
        format!("{}/wallets/{account}", self.base_url)
    }
}

impl RemoteWalletStore for HttpWalletStore {
    async fn save(&self, record: &WalletRecord) -> Result<(), Error> {
        let url = self.wallet_url(record.account_address);
        let response = self
            .request
            .handle(self.request.put(&url).json(record))
            .await?;
        ensure_success(&url, &response)
    }

    async fn find_by_owner(&self, owner: &str) -> Result<Vec<WalletRecord>, Error> {
        let url = format!("{}/wallets", self.base_url);
        let response = self
            .request
            .handle(self.request.get(&url).query(&[("owner", owner)]))
            .await?;
        ensure_success(&url, &response)?;
        Ok(response.json().await?)
    }

    async fn find_by_address(&self, account: Address) -> Result<Option<WalletRecord>, Error> {
        let url = self.wallet_url(account);
        let response = self.request.handle(self.request.get(&url)).await?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        ensure_success(&url, &response)?;
        Ok(Some(response.json().await?))
    }

    async fn update_deployment(
        &self,
        account: Address,
        tx_ref: &str,
        deployed_at: u64,
    ) -> Result<(), Error> {
        let url = self.wallet_url(account);
        let patch = DeploymentPatch {
            is_deployed: true,
            deployed_at,
            deployment_tx_ref: tx_ref,
        };
        let response = self
            .request
            .handle(self.request.patch(&url).json(&patch))
            .await?;
        ensure_success(&url, &response)
    }

    async fn delete(&self, account: Address) -> Result<(), Error> {
        let url = self.wallet_url(account);
        let response = self.request.handle(self.request.delete(&url)).await?;
        if response.status().as_u16() == 404 {
            return Ok(());
        }
        ensure_success(&url, &response)
    }
}

/// [`UserDirectory`] over a document-store HTTP API.
pub struct HttpUserDirectory {
    base_url: String,
    request: Request,
}

impl HttpUserDirectory {
    /// Client for the directory rooted at `base_url`.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            request: Request::new(),
        }
    }
}

impl UserDirectory for HttpUserDirectory {
    async fn create_if_absent(&self, record: &UserRecord) -> Result<(), Error> {
        let url = format!("{}/users", self.base_url);
        let response = self
            .request
            .handle(self.request.post(&url).json(record))
            .await?;
        // 409 means the user already exists, which is the desired end state
        if response.status().as_u16() == 409 {
            return Ok(());
        }
        ensure_success(&url, &response)
    }

    async fn find(&self, user_id: &str) -> Result<Option<UserRecord>, Error> {
        let url = format!("{}/users/{user_id}", self.base_url);
        let response = self.request.handle(self.request.get(&url)).await?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        ensure_success(&url, &response)?;
        Ok(Some(response.json().await?))
    }

    async fn mark_attested(
        &self,
        user_id: &str,
        tx_ref: &str,
        attested_at: u64,
    ) -> Result<(), Error> {
        let url = format!("{}/users/{user_id}/attestation", self.base_url);
        let body = serde_json::json!({
            "attestationTxRef": tx_ref,
            "attestedAt": attested_at,
        });
        let response = self
            .request
            .handle(self.request.post(&url).json(&body))
            .await?;
        ensure_success(&url, &response)
    }
}

fn ensure_success(url: &str, response: &reqwest::Response) -> Result<(), Error> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(Error::Network {
            url: url.to_string(),
            status: Some(status.as_u16()),
            error: format!("unexpected status {status}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet(byte: u8) -> WalletRecord {
        WalletRecord::new(Address::repeat_byte(byte), None, Some("alice@example.com".to_string()))
    }

    #[tokio::test]
    async fn test_save_puts_record_by_address() {
        let mut server = mockito::Server::new_async().await;
        let record = wallet(0x11);
        let put = server
            .mock("PUT", format!("/wallets/{}", record.account_address).as_str())
            .match_header("content-type", "application/json")
            .with_status(200)
            .create_async()
            .await;

        let store = HttpWalletStore::new(&server.url());
        store.save(&record).await.unwrap();
        put.assert_async().await;
    }

    #[tokio::test]
    async fn test_find_by_owner_filters_with_query() {
        let mut server = mockito::Server::new_async().await;
        let records = vec![wallet(0x11), wallet(0x22)];
        let get = server
            .mock("GET", "/wallets")
            .match_query(mockito::Matcher::UrlEncoded(
                "owner".to_string(),
                "alice@example.com".to_string(),
            ))
            .with_status(200)
            .with_body(serde_json::to_string(&records).unwrap())
            .create_async()
            .await;

        let store = HttpWalletStore::new(&server.url());
        let found = store.find_by_owner("alice@example.com").await.unwrap();
        assert_eq!(found, records);
        get.assert_async().await;
    }

    #[tokio::test]
    async fn test_absent_wallet_is_none_not_an_error() {
        let mut server = mockito::Server::new_async().await;
        let account = Address::repeat_byte(0x33);
        server
            .mock("GET", format!("/wallets/{account}").as_str())
            .with_status(404)
            .create_async()
            .await;

        let store = HttpWalletStore::new(&server.url());
        assert_eq!(store.find_by_address(account).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_deployment_patch_shape() {
        let mut server = mockito::Server::new_async().await;
        let account = Address::repeat_byte(0x44);
        let patch = server
            .mock("PATCH", format!("/wallets/{account}").as_str())
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "isDeployed": true,
                "deployedAt": 1_700_000_000,
                "deploymentTxRef": "0xabc",
            })))
            .with_status(200)
            .create_async()
            .await;

        let store = HttpWalletStore::new(&server.url());
        store
            .update_deployment(account, "0xabc", 1_700_000_000)
            .await
            .unwrap();
        patch.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_tolerates_absent_record() {
        let mut server = mockito::Server::new_async().await;
        let account = Address::repeat_byte(0x55);
        server
            .mock("DELETE", format!("/wallets/{account}").as_str())
            .with_status(404)
            .create_async()
            .await;

        let store = HttpWalletStore::new(&server.url());
        store.delete(account).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_user_tolerates_conflict() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/users")
            .with_status(409)
            .create_async()
            .await;

        let directory = HttpUserDirectory::new(&server.url());
        let record = UserRecord::new("alice@example.com".to_string(), None, None);
        directory.create_if_absent(&record).await.unwrap();
    }

    #[tokio::test]
    async fn test_mark_attested_posts_tx_reference() {
        let mut server = mockito::Server::new_async().await;
        let post = server
            .mock("POST", "/users/alice@example.com/attestation")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "attestationTxRef": "0xfeed",
                "attestedAt": 1_700_000_001,
            })))
            .with_status(200)
            .create_async()
            .await;

        let directory = HttpUserDirectory::new(&server.url());
        directory
            .mark_attested("alice@example.com", "0xfeed", 1_700_000_001)
            .await
            .unwrap();
        post.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_failure_surfaces_as_network_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/users")
            .with_status(500)
            .expect_at_least(1)
            .create_async()
            .await;

        let directory = HttpUserDirectory::new(&server.url());
        let record = UserRecord::new("alice@example.com".to_string(), None, None);
        let err = directory.create_if_absent(&record).await.unwrap_err();
        assert!(matches!(err, Error::Network { .. }));
    }
}
