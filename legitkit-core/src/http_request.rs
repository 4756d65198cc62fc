//! HTTP transport shared by the remote record stores. Applies timeouts, a
//! user agent and exponential-backoff retries for transient failures.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Method, RequestBuilder, Response};

use crate::error::Error;

pub(crate) struct Request {
    client: reqwest::Client,
    timeout: Duration,
    max_retries: u32,
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}

impl Request {
    pub(crate) fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3, // total attempts = 4
        }
    }

    fn req(&self, method: Method, url: &str) -> RequestBuilder {
        self.client.request(method, url).timeout(self.timeout).header(
            "User-Agent",
            format!("legitkit-core/{}", env!("CARGO_PKG_VERSION")),
        )
    }

    pub(crate) fn get(&self, url: &str) -> RequestBuilder {
        self.req(Method::GET, url)
    }

    pub(crate) fn post(&self, url: &str) -> RequestBuilder {
        self.req(Method::POST, url)
    }

    pub(crate) fn put(&self, url: &str) -> RequestBuilder {
        self.req(Method::PUT, url)
    }

    pub(crate) fn patch(&self, url: &str) -> RequestBuilder {
        self.req(Method::PATCH, url)
    }

    pub(crate) fn delete(&self, url: &str) -> RequestBuilder {
        self.req(Method::DELETE, url)
    }

    /// Sends a request built by the methods above, retrying transient
    /// failures (429, 5xx, timeouts, connect errors) with backoff.
    pub(crate) async fn handle(&self, request_builder: RequestBuilder) -> Result<Response, Error> {
        let Some(template) = request_builder.try_clone() else {
            // streaming bodies cannot be replayed, send once
            return execute(request_builder).await.map_err(Into::into);
        };

        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(self.max_retries as usize);

        (|| async {
            let request_builder = template.try_clone().ok_or_else(|| {
                AttemptError::permanent(
                    "<unknown>".to_string(),
                    None,
                    "request cannot be retried because it is not cloneable".to_string(),
                )
            })?;
            execute(request_builder).await
        })
        .retry(backoff)
        .when(AttemptError::is_retryable)
        .await
        .map_err(Into::into)
    }
}

#[derive(Debug)]
struct AttemptError {
    url: String,
    status: Option<u16>,
    error: String,
    retryable: bool,
}

impl AttemptError {
    const fn retryable(url: String, status: Option<u16>, error: String) -> Self {
        Self {
            url,
            status,
            error,
            retryable: true,
        }
    }

    const fn permanent(url: String, status: Option<u16>, error: String) -> Self {
        Self {
            url,
            status,
            error,
            retryable: false,
        }
    }

    const fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl From<AttemptError> for Error {
    fn from(value: AttemptError) -> Self {
        Self::Network {
            url: value.url,
            status: value.status,
            error: value.error,
        }
    }
}

async fn execute(request_builder: RequestBuilder) -> Result<Response, AttemptError> {
    let (client, request) = request_builder.build_split();
    let request = request.map_err(|err| {
        AttemptError::permanent(
            err.url()
                .map_or_else(|| "<unknown>".to_string(), ToString::to_string),
            None,
            format!("request build failed: {err}"),
        )
    })?;
    let url = request.url().to_string();

    match client.execute(request).await {
        Ok(response) => {
            let status = response.status().as_u16();
            if status == 429 || (500..600).contains(&status) {
                return Err(AttemptError::retryable(
                    url,
                    Some(status),
                    format!("request error with bad status code {status}"),
                ));
            }
            Ok(response)
        }
        Err(err) if err.is_timeout() || err.is_connect() => Err(AttemptError::retryable(
            url,
            None,
            format!("request timeout/connect error: {err}"),
        )),
        Err(err) => Err(AttemptError::permanent(
            url,
            None,
            format!("request failed: {err}"),
        )),
    }
}
