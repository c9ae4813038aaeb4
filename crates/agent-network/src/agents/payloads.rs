//! Typed views of agent payloads
//!
//! Payloads travel as open JSON on [`AgentResult::result`]; these structs are
//! what the agents produce and what downstream consumers read back.

use crate::providers::MarketData;
use dealflow_common::{AgentResult, Mode};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::{ORCHESTRATOR, TARGET_FINDER, VALUER};

/// Accepts `"100"`, `100` or `null` for free-text numeric columns
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorPayload {
    pub workflow_type: Mode,
    pub rationale: String,
    pub next_step: String,
}

/// One acquisition candidate, optionally enriched with market data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetCandidate {
    pub company_name: String,
    #[serde(default)]
    pub location: String,
    /// USD millions, as written by the model
    #[serde(default, deserialize_with = "string_or_number")]
    pub estimated_revenue: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub estimated_ebitda_margin: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub strategic_fit_score: String,
    #[serde(default)]
    pub investment_highlights: String,
    #[serde(default)]
    pub source_rationale: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    /// Absolute USD
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue_ttm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employees: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

impl TargetCandidate {
    pub fn apply_market_data(&mut self, ticker: &str, data: &MarketData) {
        self.ticker = Some(ticker.to_string());
        self.market_cap = data.market_cap;
        self.sector = data.sector.clone();
        self.industry = data.industry.clone();
        self.revenue_ttm = data.revenue;
        self.employees = data.employees;
        self.website = data.website.clone();
    }

    pub fn is_enriched(&self) -> bool {
        self.ticker.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetFinderPayload {
    pub targets: Vec<TargetCandidate>,
    pub target_count: usize,
    pub analysis_summary: String,
    pub search_criteria: String,
}

/// Inputs behind the valuation; amounts in USD millions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialAnalysis {
    /// `"estimated"` or `"market_data"`
    pub data_source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    pub revenue: f64,
    pub ebitda_margin: f64,
    pub ebitda: f64,
    pub market_cap: f64,
    pub ev_revenue: f64,
    pub ev_ebitda: f64,
    /// Listed peers in the target's sector
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comparables: Vec<MarketData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyMetrics {
    pub revenue: f64,
    pub ebitda: f64,
    pub market_cap: f64,
    pub ev_revenue_multiple: f64,
    pub ev_ebitda_multiple: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationRange {
    pub low: f64,
    pub mid: f64,
    pub high: f64,
    pub methodology: String,
}

/// Where the Valuer took its target from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationBasis {
    TargetFinder,
    DealFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuerPayload {
    pub target_company: String,
    pub basis: ValuationBasis,
    pub financial_analysis: FinancialAnalysis,
    pub key_metrics: KeyMetrics,
    pub valuation_range: ValuationRange,
    pub valuation_analysis: String,
    pub methodology: String,
}

/// Tagged view over any known agent's payload
#[derive(Debug, Clone, PartialEq)]
pub enum AgentPayload {
    Orchestrator(OrchestratorPayload),
    TargetFinder(TargetFinderPayload),
    Valuer(ValuerPayload),
    Other(Value),
}

impl AgentPayload {
    /// Decode a successful result by agent name. Unknown agents or payloads
    /// that do not match their agent's shape come back as `Other`.
    pub fn from_result(result: &AgentResult) -> Option<Self> {
        if !result.is_success() {
            return None;
        }
        let typed = match result.agent_name.as_str() {
            ORCHESTRATOR => result.payload().ok().map(Self::Orchestrator),
            TARGET_FINDER => result.payload().ok().map(Self::TargetFinder),
            VALUER => result.payload().ok().map(Self::Valuer),
            _ => None,
        };
        Some(typed.unwrap_or_else(|| Self::Other(result.result.clone())))
    }
}
