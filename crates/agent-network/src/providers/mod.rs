//! Capability providers the agents call out to
//!
//! Agents only see the [`LlmProvider`] and [`MarketDataProvider`] traits, so
//! the HTTP implementations here can be swapped for scripted ones in tests.

pub mod llm;
pub mod market_data;

pub use llm::OpenAiCompatibleLlm;
pub use market_data::{HttpMarketData, NoMarketData};

use crate::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Text completion
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, system: &str, user: &str, temperature: f32) -> ProviderResult<String>;
}

/// Company lookup by ticker symbol. `Ok(None)` means the symbol is unknown.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn lookup(&self, symbol: &str) -> ProviderResult<Option<MarketData>>;
}

/// Quote data for one listed company. Money amounts are absolute USD.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub revenue: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub employees: Option<u64>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub ebitda: Option<f64>,
    #[serde(default)]
    pub ev_revenue: Option<f64>,
    #[serde(default)]
    pub ev_ebitda: Option<f64>,
}
