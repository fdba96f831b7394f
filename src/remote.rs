use std::sync::Arc;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;

use crate::error::DashError;

pub trait RemoteClient: Send + Sync {
    fn get_json(&self, url: &str) -> Result<Value, DashError>;
}

impl<T: RemoteClient + ?Sized> RemoteClient for Arc<T> {
    fn get_json(&self, url: &str) -> Result<Value, DashError> {
        (**self).get_json(url)
    }
}

#[derive(Clone)]
pub struct HttpRemoteClient {
    client: Client,
}

impl HttpRemoteClient {
    pub fn new() -> Result<Self, DashError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("ghg-dashboard/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| DashError::FetchHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| DashError::FetchHttp(err.to_string()))?;
        Ok(Self { client })
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, DashError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "payload request failed".to_string());
        Err(DashError::FetchStatus { status, message })
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, DashError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(DashError::FetchHttp(err.to_string()));
                }
            }
        }
    }
}

impl RemoteClient for HttpRemoteClient {
    fn get_json(&self, url: &str) -> Result<Value, DashError> {
        let response = self.send_with_retries(|| self.client.get(url))?;
        let response = Self::handle_status(response)?;
        response
            .json()
            .map_err(|err| DashError::PayloadParse(err.to_string()))
    }
}

pub fn resolve_url(base: &str, filepath: &str) -> String {
    let base = base.trim_end_matches('/');
    let filepath = filepath.trim_start_matches('/');
    if base.is_empty() {
        return filepath.to_string();
    }
    format!("{base}/{filepath}")
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_url_joins_once() {
        assert_eq!(
            resolve_url("https://data.example.org/ghg/", "/co2/TAC.json"),
            "https://data.example.org/ghg/co2/TAC.json"
        );
        assert_eq!(
            resolve_url("https://data.example.org", "a.json"),
            "https://data.example.org/a.json"
        );
        assert_eq!(resolve_url("", "a.json"), "a.json");
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(404));
    }
}
