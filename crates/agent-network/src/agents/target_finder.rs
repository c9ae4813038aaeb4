//! Acquisition target search
//!
//! The model is asked for a markdown table of candidates. Each parsed row is
//! then offered to the market-data provider under a few guessed tickers;
//! the first hit enriches the candidate, misses and lookup errors leave it as is.

use super::{base::TypedAgent, payloads::TargetCandidate, payloads::TargetFinderPayload, TARGET_FINDER};
use crate::error::{AgentError, AgentOutcome};
use crate::providers::{LlmProvider, MarketDataProvider};
use async_trait::async_trait;
use dealflow_common::WorkflowState;
use std::sync::Arc;
use tracing::{debug, info, instrument};

const SYSTEM_PROMPT: &str = "You are an M&A origination analyst. You propose realistic \
acquisition targets and always answer with a markdown table.";

const MAX_TICKER_GUESSES: usize = 3;
const SUMMARY_LISTING_LIMIT: usize = 5;

pub struct TargetFinderAgent {
    llm: Arc<dyn LlmProvider>,
    market: Arc<dyn MarketDataProvider>,
    temperature: f32,
}

impl TargetFinderAgent {
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

    fn build_prompt(state: &WorkflowState) -> String {
        let mut prompt = format!(
            "Based on the following acquisition criteria, identify potential targets:\n\n\
             Buyer Query: {}\n",
            state.user_query
        );
        if let Some(industry) = &state.deal.industry {
            prompt.push_str(&format!("Industry focus: {}\n", industry));
        }
        if let Some(size) = &state.deal.deal_size {
            prompt.push_str(&format!("Indicative deal size: {}\n", size));
        }
        prompt.push_str(
            "\nPlease provide 8-12 acquisition targets in the following format:\n\n\
             | Company Name | Location | Est. Revenue (USD M) | Est. EBITDA Margin | \
             Strategic Fit Score (1-5) | Key Investment Highlights | Source/Rationale |\n\n\
             Focus on realistic companies that would be genuine strategic fits.",
        );
        prompt
    }

    async fn enrich(&self, mut candidate: TargetCandidate) -> TargetCandidate {
        for ticker in guess_tickers(&candidate.company_name) {
            match self.market.lookup(&ticker).await {
                Ok(Some(data)) => {
                    debug!("Enriched {} via {}", candidate.company_name, ticker);
                    candidate.apply_market_data(&ticker, &data);
                    break;
                }
                Ok(None) => continue,
                Err(e) => {
                    debug!(
                        "Lookup of {} for {} failed: {}",
                        ticker, candidate.company_name, e
                    );
                    continue;
                }
            }
        }
        candidate
    }
}

/// Rows of the first markdown-ish table in `response`.
///
/// A line counts as table-like when it contains `|`. Header and separator
/// lines are skipped; rows with fewer than six cells are dropped. Table-like
/// output that yields no row at all is malformed. No table means no targets.
pub fn parse_target_table(response: &str) -> AgentOutcome<Vec<TargetCandidate>> {
    let mut saw_table = false;
    let mut targets = Vec::new();

    for line in response.lines() {
        if !line.contains('|') {
            continue;
        }
        saw_table = true;
        if line.contains("Company Name") || line.contains("---") {
            continue;
        }

        let cells: Vec<&str> = line
            .split('|')
            .map(str::trim)
            .filter(|cell| !cell.is_empty())
            .collect();
        if cells.len() < 6 {
            continue;
        }

        targets.push(TargetCandidate {
            company_name: cells[0].to_string(),
            location: cells[1].to_string(),
            estimated_revenue: cells[2].to_string(),
            estimated_ebitda_margin: cells[3].to_string(),
            strategic_fit_score: cells[4].to_string(),
            investment_highlights: cells[5].to_string(),
            source_rationale: cells.get(6).map(|s| s.to_string()).unwrap_or_default(),
            ..Default::default()
        });
    }

    if saw_table && targets.is_empty() {
        return Err(AgentError::malformed(
            "target table contained no parseable rows",
        ));
    }
    Ok(targets)
}

/// Up to three plausible ticker symbols for a company name
pub fn guess_tickers(company_name: &str) -> Vec<String> {
    let cleaned = company_name.replace([',', '.'], "");
    let words: Vec<&str> = cleaned.split_whitespace().collect();
    let mut guesses: Vec<String> = Vec::new();

    if words.len() >= 2 {
        let initials: String = words
            .iter()
            .take(3)
            .filter_map(|word| word.chars().next())
            .collect();
        guesses.push(initials.to_uppercase());
    }

    if let Some(first) = words.first() {
        guesses.push(first.to_uppercase());
    }

    if company_name.contains("Corp") {
        let stem: String = company_name
            .replace("Corporation", "")
            .replace("Corp", "")
            .trim()
            .replace(' ', "")
            .chars()
            .take(4)
            .collect();
        if !stem.is_empty() {
            guesses.push(stem.to_uppercase());
        }
    }

    let mut unique = Vec::with_capacity(guesses.len());
    for guess in guesses {
        if !unique.contains(&guess) {
            unique.push(guess);
        }
    }
    unique.truncate(MAX_TICKER_GUESSES);
    unique
}

#[async_trait]
impl TypedAgent for TargetFinderAgent {
    type Output = TargetFinderPayload;

    fn name(&self) -> &str {
        TARGET_FINDER
    }

    #[instrument(skip_all, fields(workflow_id = %state.workflow_id))]
    async fn run(&self, state: &WorkflowState) -> AgentOutcome<TargetFinderPayload> {
        let prompt = Self::build_prompt(state);
        let response = self
            .llm
            .complete(SYSTEM_PROMPT, &prompt, self.temperature)
            .await?;

        let candidates = parse_target_table(&response)?;
        let mut targets = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            targets.push(self.enrich(candidate).await);
        }

        info!(
            "Identified {} targets ({} enriched)",
            targets.len(),
            targets.iter().filter(|t| t.is_enriched()).count()
        );

        Ok(TargetFinderPayload {
            target_count: targets.len(),
            targets,
            analysis_summary: response,
            search_criteria: state.user_query.clone(),
        })
    }

    fn summarize(&self, output: &TargetFinderPayload) -> String {
        if output.targets.is_empty() {
            return "Target search completed but no specific targets were identified.".to_string();
        }

        let mut summary = format!("Found {} potential targets:\n", output.target_count);
        for (i, target) in output.targets.iter().take(SUMMARY_LISTING_LIMIT).enumerate() {
            summary.push_str(&format!(
                "\n{}. {}\n   - Revenue: {}\n   - Strategic Fit: {}/5\n   - Highlights: {}\n",
                i + 1,
                target.company_name,
                or_na(&target.estimated_revenue),
                or_na(&target.strategic_fit_score),
                or_na(&target.investment_highlights),
            ));
        }
        if output.targets.len() > SUMMARY_LISTING_LIMIT {
            summary.push_str(&format!(
                "\n...and {} more.",
                output.targets.len() - SUMMARY_LISTING_LIMIT
            ));
        }
        summary
    }
}

fn or_na(value: &str) -> &str {
    if value.is_empty() {
        "N/A"
    } else {
        value
    }
}
