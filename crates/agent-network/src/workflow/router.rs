use dealflow_common::Mode;
use serde_json::Value;
use tracing::warn;

/// Mode named by an orchestrator payload's `workflow_type`.
///
/// Missing, unrecognized or `unknown` values fall back to buyer-side M&A;
/// routing never fails.
pub fn route(payload: &Value) -> Mode {
    let raw = payload.get("workflow_type").and_then(Value::as_str);

    match raw.map(str::parse::<Mode>) {
        Some(Ok(mode)) if mode.is_routed() => mode,
        _ => {
            warn!("Unroutable workflow_type {:?}, defaulting to buyer_ma", raw);
            Mode::BuyerMa
        }
    }
}
