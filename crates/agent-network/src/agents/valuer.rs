//! Valuation of the lead candidate
//!
//! Numbers come from a simple revenue-multiple model; the model-written
//! narrative rides alongside them in `valuation_analysis`.

use super::{
    base::TypedAgent,
    payloads::{
        AgentPayload, FinancialAnalysis, KeyMetrics, TargetCandidate, TargetFinderPayload,
        ValuationBasis, ValuationRange, ValuerPayload,
    },
    TARGET_FINDER, VALUER,
};
use crate::error::{AgentError, AgentOutcome};
use crate::providers::{LlmProvider, MarketData, MarketDataProvider};
use async_trait::async_trait;
use dealflow_common::WorkflowState;
use std::sync::Arc;
use tracing::{debug, info, instrument};

const SYSTEM_PROMPT: &str = "You are a corporate finance valuation specialist. \
Write structured, well-reasoned valuation memos.";

const REVENUE_MULTIPLES: (f64, f64, f64) = (2.0, 4.0, 6.0);
const DEFAULT_EBITDA_MARGIN: f64 = 0.15;
const RANGE_METHODOLOGY: &str = "Multiple-based estimation";
const VALUATION_METHODOLOGY: &str = "DCF, Comparable Companies, Precedent Transactions";
const NARRATIVE_PREVIEW_CHARS: usize = 500;

const SECTOR_PEERS: &[(&str, &[&str])] = &[
    ("Technology", &["MSFT", "AAPL", "GOOGL"]),
    ("Healthcare", &["JNJ", "PFE", "UNH"]),
    ("Financial Services", &["JPM", "BAC", "WFC"]),
    ("Consumer Cyclical", &["AMZN", "TSLA", "HD"]),
    ("Industrials", &["BA", "CAT", "GE"]),
];
const BENCHMARK_PEERS: &[&str] = &["SPY"];

pub struct ValuerAgent {
    llm: Arc<dyn LlmProvider>,
    market: Arc<dyn MarketDataProvider>,
    temperature: f32,
}

/// Revenue in USD millions from strings like `"100"`, `"$100M"` or `"1.5B"`.
/// Anything unparseable is zero.
pub fn parse_revenue_millions(raw: &str) -> f64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    let billions = cleaned.ends_with(['B', 'b']);
    let number = cleaned.trim_end_matches(['M', 'm', 'B', 'b']);

    match number.parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => {
            if billions {
                value * 1000.0
            } else {
                value
            }
        }
        _ => 0.0,
    }
}

/// Peer tickers for a sector; unlisted sectors get the market benchmark
pub fn peer_tickers(sector: &str) -> &'static [&'static str] {
    SECTOR_PEERS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(sector.trim()))
        .map(|(_, peers)| *peers)
        .unwrap_or(BENCHMARK_PEERS)
}

/// One line per successful upstream result, for the valuation prompt
pub fn previous_analysis(state: &WorkflowState) -> String {
    let lines: Vec<String> = state
        .agent_results
        .values()
        .filter(|result| result.agent_name != VALUER)
        .filter_map(|result| {
            let line = match AgentPayload::from_result(result)? {
                AgentPayload::Orchestrator(p) => {
                    format!("routed to {} ({})", p.workflow_type, p.rationale)
                }
                AgentPayload::TargetFinder(p) => {
                    let names: Vec<&str> = p
                        .targets
                        .iter()
                        .map(|t| t.company_name.as_str())
                        .collect();
                    format!("{} targets identified: {}", p.target_count, names.join(", "))
                }
                AgentPayload::Valuer(p) => format!(
                    "{} valued at ${:.1}M mid",
                    p.target_company, p.valuation_range.mid
                ),
                AgentPayload::Other(value) => value.to_string(),
            };
            Some(format!("- {}: {}", result.agent_name, line))
        })
        .collect();

    if lines.is_empty() {
        "None".to_string()
    } else {
        lines.join("\n")
    }
}

fn format_multiple(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{:.2}", v))
}

/// EBITDA margin as a fraction; `"18%"` and `"18"` both give 0.18
pub fn parse_margin(raw: &str) -> f64 {
    let trimmed = raw.trim();
    let number = trimmed.trim_end_matches('%').trim();
    match number.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => {
            if trimmed.ends_with('%') || value > 1.0 {
                value / 100.0
            } else {
                value
            }
        }
        _ => DEFAULT_EBITDA_MARGIN,
    }
}

/// Low/mid/high at fixed revenue multiples; zero revenue gives a zero range
pub fn estimate_range(revenue_millions: f64) -> ValuationRange {
    let (low, mid, high) = if revenue_millions > 0.0 {
        (
            revenue_millions * REVENUE_MULTIPLES.0,
            revenue_millions * REVENUE_MULTIPLES.1,
            revenue_millions * REVENUE_MULTIPLES.2,
        )
    } else {
        (0.0, 0.0, 0.0)
    };
    ValuationRange {
        low,
        mid,
        high,
        methodology: RANGE_METHODOLOGY.to_string(),
    }
}

impl FinancialAnalysis {
    fn estimated(target: &TargetCandidate) -> Self {
        let mut revenue = parse_revenue_millions(&target.estimated_revenue);
        if let Some(ttm) = target.revenue_ttm.filter(|r| *r > 0.0) {
            revenue = ttm / 1_000_000.0;
        }
        let ebitda_margin = parse_margin(&target.estimated_ebitda_margin);

        Self {
            data_source: "estimated".to_string(),
            ticker: target.ticker.clone(),
            revenue,
            ebitda_margin,
            ebitda: revenue * ebitda_margin,
            market_cap: target.market_cap.unwrap_or(0.0) / 1_000_000.0,
            ev_revenue: 0.0,
            ev_ebitda: 0.0,
            comparables: Vec::new(),
        }
    }

    fn apply_market_data(&mut self, data: &MarketData) {
        self.data_source = "market_data".to_string();
        if let Some(revenue) = data.revenue.filter(|r| *r > 0.0) {
            self.revenue = revenue / 1_000_000.0;
        }
        self.ebitda = match data.ebitda {
            Some(ebitda) => ebitda / 1_000_000.0,
            None => self.revenue * self.ebitda_margin,
        };
        if let Some(cap) = data.market_cap {
            self.market_cap = cap / 1_000_000.0;
        }
        self.ev_revenue = data.ev_revenue.unwrap_or(0.0);
        self.ev_ebitda = data.ev_ebitda.unwrap_or(0.0);
    }

    fn key_metrics(&self) -> KeyMetrics {
        KeyMetrics {
            revenue: self.revenue,
            ebitda: self.ebitda,
            market_cap: self.market_cap,
            ev_revenue_multiple: self.ev_revenue,
            ev_ebitda_multiple: self.ev_ebitda,
        }
    }

    fn describe(&self) -> String {
        let mut text = format!("Data Source: {}\n\nKey Metrics (USD M):\n", self.data_source);
        text.push_str(&format!("- revenue: {:.2}\n", self.revenue));
        text.push_str(&format!("- ebitda_margin: {:.2}\n", self.ebitda_margin));
        text.push_str(&format!("- ebitda: {:.2}\n", self.ebitda));
        if self.market_cap > 0.0 {
            text.push_str(&format!("- market_cap: {:.2}\n", self.market_cap));
        }
        if self.ev_revenue > 0.0 {
            text.push_str(&format!("- ev_revenue: {:.2}\n", self.ev_revenue));
        }
        if self.ev_ebitda > 0.0 {
            text.push_str(&format!("- ev_ebitda: {:.2}\n", self.ev_ebitda));
        }
        if !self.comparables.is_empty() {
            text.push_str(&format!(
                "\nComparable Companies ({} companies):\n",
                self.comparables.len()
            ));
            for peer in &self.comparables {
                text.push_str(&format!(
                    "- {}: EV/Rev: {}, EV/EBITDA: {}\n",
                    peer.symbol,
                    format_multiple(peer.ev_revenue),
                    format_multiple(peer.ev_ebitda)
                ));
            }
        }
        text
    }
}

impl ValuerAgent {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        market: Arc<dyn MarketDataProvider>,
        temperature: f32,
    ) -> Self {
        Self {
            llm,
            market,
            temperature,
        }
    }

    /// Lead candidate from a successful target search
    fn select_target(state: &WorkflowState) -> AgentOutcome<TargetCandidate> {
        let result = state.successful_result(TARGET_FINDER).ok_or_else(|| {
            AgentError::invalid_state("no successful target_finder result to value")
        })?;
        let payload: TargetFinderPayload = result
            .payload()
            .map_err(|e| AgentError::invalid_state(format!("unreadable target list: {}", e)))?;
        payload
            .targets
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::invalid_state("target list is empty"))
    }

    /// Target assembled from the request's deal metadata
    fn target_from_deal(state: &WorkflowState) -> TargetCandidate {
        TargetCandidate {
            company_name: state
                .deal
                .company_name
                .clone()
                .unwrap_or_else(|| "Target Company".to_string()),
            industry: state.deal.industry.clone(),
            ..Default::default()
        }
    }

    async fn analyze(&self, target: &TargetCandidate) -> FinancialAnalysis {
        let mut analysis = FinancialAnalysis::estimated(target);
        let Some(ticker) = &target.ticker else {
            return analysis;
        };

        let mut sector = target.sector.clone();
        match self.market.lookup(ticker).await {
            Ok(Some(data)) => {
                analysis.apply_market_data(&data);
                sector = data.sector.or(sector);
            }
            Ok(None) => debug!("No market data for {}", ticker),
            Err(e) => debug!("Market data lookup for {} failed: {}", ticker, e),
        }

        if let Some(sector) = sector.filter(|s| !s.trim().is_empty()) {
            analysis.comparables = self.comparables(&sector, ticker).await;
        }
        analysis
    }

    /// Quotes for the sector's peers; misses and failures are skipped
    async fn comparables(&self, sector: &str, own_ticker: &str) -> Vec<MarketData> {
        let mut peers = Vec::new();
        for symbol in peer_tickers(sector) {
            if symbol.eq_ignore_ascii_case(own_ticker) {
                continue;
            }
            match self.market.lookup(symbol).await {
                Ok(Some(data)) => peers.push(data),
                Ok(None) => debug!("No quote for peer {}", symbol),
                Err(e) => debug!("Peer lookup for {} failed: {}", symbol, e),
            }
        }
        peers
    }
}

#[async_trait]
impl TypedAgent for ValuerAgent {
    type Output = ValuerPayload;

    fn name(&self) -> &str {
        VALUER
    }

    #[instrument(skip_all, fields(workflow_id = %state.workflow_id))]
    async fn run(&self, state: &WorkflowState) -> AgentOutcome<ValuerPayload> {
        let (target, basis) = match Self::select_target(state) {
            Ok(target) => (target, ValuationBasis::TargetFinder),
            Err(e) => {
                info!("Valuing from deal metadata instead: {}", e);
                (Self::target_from_deal(state), ValuationBasis::DealFallback)
            }
        };

        let analysis = self.analyze(&target).await;
        let industry = target
            .industry
            .as_deref()
            .or(state.deal.industry.as_deref())
            .unwrap_or("Not specified");

        let prompt = format!(
            "Perform a comprehensive valuation analysis for the following target:\n\n\
             Target: {}\n\
             Industry: {}\n\n\
             Financial Data Available:\n{}\n\
             Previous Analysis:\n{}\n\n\
             Original request: {}\n\n\
             Please provide:\n\
             1. DCF valuation with 5-year projections\n\
             2. Comparable company analysis\n\
             3. Precedent transaction analysis\n\
             4. Sensitivity analysis on key assumptions\n\
             5. Valuation summary and recommendation\n\n\
             Structure your response with clear sections and supporting rationale.",
            target.company_name,
            industry,
            analysis.describe(),
            previous_analysis(state),
            state.user_query
        );

        let narrative = self
            .llm
            .complete(SYSTEM_PROMPT, &prompt, self.temperature)
            .await?;

        Ok(ValuerPayload {
            target_company: target.company_name,
            basis,
            key_metrics: analysis.key_metrics(),
            valuation_range: estimate_range(analysis.revenue),
            financial_analysis: analysis,
            valuation_analysis: narrative,
            methodology: VALUATION_METHODOLOGY.to_string(),
        })
    }

    fn summarize(&self, output: &ValuerPayload) -> String {
        let range = &output.valuation_range;
        let preview: String = output
            .valuation_analysis
            .chars()
            .take(NARRATIVE_PREVIEW_CHARS)
            .collect();
        let ellipsis = if output.valuation_analysis.chars().count() > NARRATIVE_PREVIEW_CHARS {
            "..."
        } else {
            ""
        };

        format!(
            "Valuation analysis complete for {}: ${:.1}M - ${:.1}M (mid ${:.1}M, {}).\n\n{}{}",
            output.target_company, range.low, range.high, range.mid, range.methodology, preview, ellipsis
        )
    }
}
