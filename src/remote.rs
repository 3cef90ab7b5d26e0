//! HTTP status source: latest release tag (GitHub) and HDD/USD price
//! (CoinGecko).
//!
//! Both endpoints are plain unauthenticated GETs; only a User-Agent is sent,
//! which GitHub requires.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::warn;

use crate::{config::Config, error::FetchError, poller::StatusSource};

const USER_AGENT: &str = concat!("hddcoin-status/", env!("CARGO_PKG_VERSION"));

fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|e| {
            warn!("build reqwest client ({e}), using defaults");
            Client::new()
        })
}

/// Live endpoints configured in `Config`.
#[derive(Debug, Clone)]
pub struct RemoteStatus {
    client:      Client,
    release_url: String,
    price_url:   String,
}

impl RemoteStatus {
    pub fn new(config: &Config) -> Self {
        Self {
            client:      http_client(config.request_timeout()),
            release_url: config.release_api_url.clone(),
            price_url:   config.price_api_url.clone(),
        }
    }

    async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Network { url: url.to_owned(), source })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status { url: url.to_owned(), status: status.as_u16() });
        }

        let body = resp
            .text()
            .await
            .map_err(|source| FetchError::Network { url: url.to_owned(), source })?;

        serde_json::from_str(&body)
            .map_err(|source| FetchError::Decode { url: url.to_owned(), source })
    }
}

impl StatusSource for RemoteStatus {
    async fn latest_version(&self) -> Result<String, FetchError> {
        let v = self.get_json(&self.release_url).await?;
        release_tag(&v).ok_or_else(|| FetchError::MissingField {
            url:   self.release_url.clone(),
            field: "tag_name",
        })
    }

    async fn exchange_rate(&self) -> Result<f64, FetchError> {
        let v = self.get_json(&self.price_url).await?;
        usd_price(&v).ok_or_else(|| FetchError::MissingField {
            url:   self.price_url.clone(),
            field: "market_data.current_price.usd",
        })
    }
}

// ── Response parsing ─────────────────────────────────────────────────────────

/// `tag_name` of a GitHub release object.
fn release_tag(v: &Value) -> Option<String> {
    v["tag_name"]
        .as_str()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
}

/// `market_data.current_price.usd` of a CoinGecko coin object.
fn usd_price(v: &Value) -> Option<f64> {
    v["market_data"]["current_price"]["usd"].as_f64()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn release_tag_extraction() {
        let v = json!({ "tag_name": "1.3.0", "html_url": "https://example.invalid" });
        assert_eq!(release_tag(&v).as_deref(), Some("1.3.0"));
        assert_eq!(release_tag(&json!({ "tag_name": "" })), None);
        assert_eq!(release_tag(&json!({ "message": "Not Found" })), None);
        assert_eq!(release_tag(&json!({ "tag_name": 13 })), None);
    }

    #[test]
    fn usd_price_extraction() {
        let v = json!({ "market_data": { "current_price": { "usd": 0.0312, "eur": 0.029 } } });
        assert_eq!(usd_price(&v), Some(0.0312));
        assert_eq!(usd_price(&json!({ "market_data": { "current_price": {} } })), None);
        assert_eq!(usd_price(&json!({ "market_data": null })), None);
        assert_eq!(usd_price(&json!({ "market_data": { "current_price": { "usd": 2 } } })), Some(2.0));
    }

    #[test]
    fn client_uses_configured_urls() {
        let cfg = Config {
            release_api_url: "http://127.0.0.1:9/release".into(),
            price_api_url: "http://127.0.0.1:9/price".into(),
            ..Config::default()
        };
        let remote = RemoteStatus::new(&cfg);
        assert_eq!(remote.release_url, "http://127.0.0.1:9/release");
        assert_eq!(remote.price_url, "http://127.0.0.1:9/price");
    }
}
