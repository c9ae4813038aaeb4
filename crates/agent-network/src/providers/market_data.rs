use super::{MarketData, MarketDataProvider, ProviderResult};
use crate::error::ProviderError;
use async_trait::async_trait;
use dealflow_common::MarketDataConfig;
use reqwest::{Client, StatusCode, Url};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Quote lookups over HTTP: `GET {base_url}/quote/{symbol}`
#[derive(Debug, Clone)]
pub struct HttpMarketData {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpMarketData {
    pub fn new(base_url: impl AsRef<str>, timeout: Duration) -> ProviderResult<Self> {
        let base_url = Url::parse(base_url.as_ref().trim()).map_err(|e| {
            ProviderError::unavailable(format!("invalid market data URL: {}", e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ProviderError::unavailable(format!(
                "market data URL cannot take a path: {}",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::unavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// `{base_url}/quote/{symbol}`, with the symbol escaped as one path segment
    fn quote_url(&self, symbol: &str) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("quote").push(symbol);
        }
        url
    }
}

/// Pick the configured provider, or [`NoMarketData`] when no endpoint is set
pub fn from_config(config: &MarketDataConfig) -> ProviderResult<Arc<dyn MarketDataProvider>> {
    match &config.base_url {
        Some(url) if !url.trim().is_empty() => Ok(Arc::new(HttpMarketData::new(
            url,
            Duration::from_secs(config.timeout_secs),
        )?)),
        _ => Ok(Arc::new(NoMarketData)),
    }
}

#[async_trait]
impl MarketDataProvider for HttpMarketData {
    #[instrument(skip(self))]
    async fn lookup(&self, symbol: &str) -> ProviderResult<Option<MarketData>> {
        let url = self.quote_url(symbol);

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(self.timeout)
            } else {
                ProviderError::unavailable(e.to_string())
            }
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!("No quote for {}", symbol);
                Ok(None)
            }
            StatusCode::TOO_MANY_REQUESTS => Err(ProviderError::RateLimited),
            status if !status.is_success() => Err(ProviderError::unavailable(format!(
                "quote endpoint returned HTTP {}",
                status
            ))),
            _ => {
                let mut data: MarketData = response
                    .json()
                    .await
                    .map_err(|e| ProviderError::malformed(e.to_string()))?;
                if data.symbol.is_empty() {
                    data.symbol = symbol.to_string();
                }
                Ok(Some(data))
            }
        }
    }
}

/// Used when market data is disabled; every symbol is unknown
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMarketData;

#[async_trait]
impl MarketDataProvider for NoMarketData {
    async fn lookup(&self, _symbol: &str) -> ProviderResult<Option<MarketData>> {
        Ok(None)
    }
}
