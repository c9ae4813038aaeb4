//! Request classification
//!
//! A keyword pass gives a deterministic first answer; the model is then asked
//! to confirm it. The model's reply can only move the answer to another known
//! mode, never to something unparseable.

use super::{base::TypedAgent, payloads::OrchestratorPayload, ORCHESTRATOR};
use crate::error::{AgentError, AgentOutcome};
use crate::providers::LlmProvider;
use async_trait::async_trait;
use dealflow_common::{Mode, WorkflowState};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const SYSTEM_PROMPT: &str = "You are the routing desk of an investment bank. \
Classify each client request as buyer-side M&A (buyer_ma), sell-side M&A (seller_ma) \
or an initial public offering (ipo).";

const BUY_SIDE_KEYWORDS: &[&str] = &[
    "acquire",
    "acquisition",
    "buy",
    "target",
    "merger",
    "m&a",
    "purchase",
];
const SELLER_IN_DEAL_KEYWORDS: &[&str] = &["sell", "selling", "divest", "exit", "buyer"];
const IPO_KEYWORDS: &[&str] = &["ipo", "public", "listing", "public offering", "go public"];
const SELL_SIDE_KEYWORDS: &[&str] = &["sell", "selling", "divest", "exit", "sale"];

pub struct OrchestratorAgent {
    llm: Arc<dyn LlmProvider>,
    temperature: f32,
}

impl OrchestratorAgent {
    pub fn new(llm: Arc<dyn LlmProvider>, temperature: f32) -> Self {
        Self { llm, temperature }
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Deterministic first pass over the lowercased query
pub fn classify_keywords(query: &str) -> (Mode, &'static str) {
    let query = query.to_lowercase();

    if contains_any(&query, BUY_SIDE_KEYWORDS) {
        if contains_any(&query, SELLER_IN_DEAL_KEYWORDS) {
            (Mode::SellerMa, "Detected seller-side M&A keywords in query")
        } else {
            (Mode::BuyerMa, "Detected buyer-side M&A keywords in query")
        }
    } else if contains_any(&query, IPO_KEYWORDS) {
        (Mode::Ipo, "Detected IPO-related keywords in query")
    } else if contains_any(&query, SELL_SIDE_KEYWORDS) {
        (Mode::SellerMa, "Detected seller-side keywords in query")
    } else {
        (Mode::BuyerMa, "Defaulting to buyer-led M&A workflow")
    }
}

/// First recognizable mode token in a model reply, checked in the order
/// seller_ma, ipo, buyer_ma.
pub fn parse_mode_reply(reply: &str) -> Option<Mode> {
    let reply = reply.to_lowercase();
    [
        ("seller_ma", Mode::SellerMa),
        ("ipo", Mode::Ipo),
        ("buyer_ma", Mode::BuyerMa),
    ]
    .into_iter()
    .find(|(token, _)| reply.contains(token))
    .map(|(_, mode)| mode)
}

#[async_trait]
impl TypedAgent for OrchestratorAgent {
    type Output = OrchestratorPayload;

    fn name(&self) -> &str {
        ORCHESTRATOR
    }

    #[instrument(skip_all, fields(workflow_id = %state.workflow_id))]
    async fn run(&self, state: &WorkflowState) -> AgentOutcome<OrchestratorPayload> {
        let query = state.user_query.trim();
        if query.is_empty() {
            return Err(AgentError::invalid_state("user query is empty"));
        }

        let (keyword_mode, keyword_rationale) = classify_keywords(query);
        debug!("Keyword routing suggests {}", keyword_mode);

        let prompt = format!(
            "Analyze this query and confirm the workflow type: {}\n\n\
             Initial assessment: {} - {}\n\n\
             Respond with either 'buyer_ma', 'seller_ma', or 'ipo' and provide a brief rationale.",
            query, keyword_mode, keyword_rationale
        );

        let (mode, rationale) = match self.llm.complete(SYSTEM_PROMPT, &prompt, self.temperature).await {
            Ok(reply) => match parse_mode_reply(&reply) {
                Some(mode) => (mode, reply),
                None => {
                    warn!("Model reply named no workflow type, keeping {}", keyword_mode);
                    (keyword_mode, keyword_rationale.to_string())
                }
            },
            Err(e) => {
                warn!("Model review failed, using keyword routing: {}", e);
                (keyword_mode, keyword_rationale.to_string())
            }
        };

        info!("Routed request to {}", mode);
        Ok(OrchestratorPayload {
            workflow_type: mode,
            rationale,
            next_step: format!("{}_workflow", mode),
        })
    }

    fn summarize(&self, output: &OrchestratorPayload) -> String {
        format!(
            "Workflow routing: {}\n\n{}",
            output.workflow_type.as_str().to_uppercase(),
            output.rationale
        )
    }
}
