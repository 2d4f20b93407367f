use std::fs::File;
use std::path::Path;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::error::SlError;

pub const HGNC_COMPLETE_SET_URL: &str =
    "https://storage.googleapis.com/public-download-files/hgnc/tsv/tsv/hgnc_complete_set.txt";

/// Source of the HGNC complete set.
pub trait AuthorityClient: Send + Sync {
    fn source_url(&self) -> &str;
    fn download_hgnc(&self, destination: &Path) -> Result<(), SlError>;
}

#[derive(Clone)]
pub struct HgncHttpClient {
    client: Client,
    url: String,
}

impl HgncHttpClient {
    pub fn new() -> Result<Self, SlError> {
        Self::with_url(HGNC_COMPLETE_SET_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Result<Self, SlError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("slh/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| SlError::Filesystem(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|err| SlError::HgncHttp(err.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    fn send_with_retries(&self) -> Result<reqwest::blocking::Response, SlError> {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            match self.client.get(&self.url).send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        debug!(status, attempt, "retrying HGNC download");
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        debug!(error = %err, attempt, "retrying HGNC download");
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Err(SlError::HgncHttp(err.to_string()));
                }
            }
        }
    }
}

impl AuthorityClient for HgncHttpClient {
    fn source_url(&self) -> &str {
        &self.url
    }

    fn download_hgnc(&self, destination: &Path) -> Result<(), SlError> {
        let mut response = self.send_with_retries()?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "HGNC request failed".to_string());
            return Err(SlError::HgncStatus { status, message });
        }
        let mut file =
            File::create(destination).map_err(|err| SlError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| SlError::HgncHttp(err.to_string()))?;
        Ok(())
    }
}

fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(200));
    }

    #[test]
    fn client_keeps_url() {
        let client = HgncHttpClient::with_url("http://localhost/hgnc.txt").unwrap();
        assert_eq!(client.source_url(), "http://localhost/hgnc.txt");
    }
}
