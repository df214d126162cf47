//! Retrying HTTP fetcher for node sysinfo documents.
//!
//! Mesh links lose packets as a matter of course, so every fetch gets a
//! small budget of retries with a uniformly random jitter sleep before each
//! attempt to keep a crawl from synchronizing its hammering. Keep-alive is
//! disabled: a full-mesh crawl touches thousands of distinct hosts once
//! each, and idle pooled connections to battery-powered radios are pure
//! leak.
//!
//! Nodes redirect `/` to their status UI; the only redirect a fetch may
//! follow is the node's own `/a/sysinfo` alias, and only once. Anything
//! else is answered with the redirect response itself.

use std::time::Duration;

use rand::Rng;
use reqwest::{redirect, StatusCode};

use crate::sysinfo::{DecodeError, SysinfoResponse};

/// Fetch failed after exhausting the retry budget, or the body was
/// undecodable.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to get url after {retries} retries: {source}")]
    Exhausted { retries: u32, source: reqwest::Error },
    #[error("received non-200 status code ({status}) after {retries} retries")]
    BadStatus { status: StatusCode, retries: u32 },
    #[error("failed to read response body: {0}")]
    Body(reqwest::Error),
    #[error("failed to decode response body: {0}")]
    Decode(#[from] DecodeError),
}

impl FetchError {
    /// Whether the failure was a plain timeout; the walker logs those at
    /// debug level since they are routine on a large mesh.
    pub fn is_timeout(&self) -> bool {
        match self {
            FetchError::Exhausted { source, .. } => source.is_timeout(),
            FetchError::Body(err) => err.is_timeout(),
            _ => false,
        }
    }
}

/// HTTP client with per-attempt timeout, bounded retries, and pre-attempt
/// jitter.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    retries: u32,
    jitter: Duration,
}

impl Fetcher {
    pub fn new(timeout: Duration, retries: u32, jitter: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(0)
            .redirect(redirect::Policy::custom(|attempt| {
                if attempt.url().path() == "/a/sysinfo" && attempt.previous().len() <= 1 {
                    attempt.follow()
                } else {
                    attempt.stop()
                }
            }))
            .build()
            .expect("reqwest client construction");
        Self {
            client,
            retries,
            jitter,
        }
    }

    async fn jitter_sleep(&self) {
        if self.jitter.is_zero() {
            return;
        }
        let nanos = rand::thread_rng().gen_range(0..self.jitter.as_nanos());
        tokio::time::sleep(Duration::from_nanos(nanos as u64)).await;
    }

    /// GET a sysinfo URL, retrying on connection errors and non-200 status.
    /// The final error names the retry count.
    pub async fn get(&self, url: &str) -> Result<SysinfoResponse, FetchError> {
        self.jitter_sleep().await;

        let mut attempt = 0;
        let response = loop {
            attempt += 1;
            match self.client.get(url).send().await {
                Ok(response) if response.status() == StatusCode::OK => break response,
                Ok(response) => {
                    if attempt >= self.retries {
                        return Err(FetchError::BadStatus {
                            status: response.status(),
                            retries: self.retries,
                        });
                    }
                    self.jitter_sleep().await;
                }
                Err(source) => {
                    if attempt >= self.retries {
                        return Err(FetchError::Exhausted {
                            retries: self.retries,
                            source,
                        });
                    }
                    self.jitter_sleep().await;
                }
            }
        };

        let body = response.bytes().await.map_err(FetchError::Body)?;
        Ok(SysinfoResponse::decode(&body)?)
    }
}
