use dealflow_common::types::*;
use serde_json::json;

#[test]
fn test_workflow_id_creation() {
    let id1 = WorkflowId::new();
    let id2 = WorkflowId::new();

    assert_ne!(id1, id2);
    assert_eq!(id1, id1);
}

#[test]
fn test_workflow_id_from_string() {
    let id_str = "test-workflow-123".to_string();
    let id = WorkflowId::from_string(id_str.clone());

    assert_eq!(id.0, id_str);
    assert_eq!(id.to_string(), id_str);
}

#[test]
fn test_mode_names() {
    assert_eq!(Mode::BuyerMa.as_str(), "buyer_ma");
    assert_eq!(Mode::SellerMa.as_str(), "seller_ma");
    assert_eq!(Mode::Ipo.as_str(), "ipo");
    assert_eq!(Mode::Unknown.as_str(), "unknown");
    assert_eq!("IPO".parse::<Mode>().unwrap(), Mode::Ipo);
    assert!("spinoff".parse::<Mode>().is_err());
}

#[test]
fn test_mode_serializes_snake_case() {
    assert_eq!(serde_json::to_value(Mode::SellerMa).unwrap(), json!("seller_ma"));
    let mode: Mode = serde_json::from_value(json!("buyer_ma")).unwrap();
    assert_eq!(mode, Mode::BuyerMa);
}

#[test]
fn test_status_round_trips_through_text() {
    for status in [
        WorkflowStatus::Pending,
        WorkflowStatus::Routing,
        WorkflowStatus::Executing,
        WorkflowStatus::Completed,
        WorkflowStatus::Failed,
    ] {
        assert_eq!(status.as_str().parse::<WorkflowStatus>().unwrap(), status);
    }
}

#[test]
fn test_status_allows_skipping_forward() {
    assert!(WorkflowStatus::Pending.can_transition_to(WorkflowStatus::Failed));
    assert!(WorkflowStatus::Routing.can_transition_to(WorkflowStatus::Executing));
    assert!(WorkflowStatus::Executing.can_transition_to(WorkflowStatus::Completed));
}

#[test]
fn test_agent_result_constructors() {
    let ok = AgentResult::success("valuer", json!({"methodology": "x"}), 1.25);
    assert!(ok.is_success());
    assert!(ok.error_message.is_none());

    let err = AgentResult::error("valuer", "provider unavailable", -1.0);
    assert_eq!(err.status, AgentStatus::Error);
    assert_eq!(err.result, serde_json::Value::Null);
    assert_eq!(err.execution_time, 0.0);
    assert_eq!(err.error_message.as_deref(), Some("provider unavailable"));
}

#[test]
fn test_agent_result_payload_typed_view() {
    #[derive(serde::Deserialize)]
    struct Counted {
        target_count: usize,
    }

    let result = AgentResult::success("target_finder", json!({"target_count": 3}), 0.1);
    let view: Counted = result.payload().unwrap();
    assert_eq!(view.target_count, 3);
}

#[test]
fn test_deal_info_optional_fields() {
    let deal: DealInfo = serde_json::from_value(json!({"industry": "SaaS"})).unwrap();
    assert_eq!(deal.industry.as_deref(), Some("SaaS"));
    assert!(deal.company_name.is_none());
    assert!(!deal.is_empty());
    assert!(DealInfo::default().is_empty());
}

#[test]
fn test_workflow_state_starts_pending() {
    let state = WorkflowState::new(WorkflowId::new(), "Find targets", DealInfo::default());

    assert_eq!(state.status, WorkflowStatus::Pending);
    assert_eq!(state.mode, Mode::Unknown);
    assert!(state.messages.is_empty());
    assert!(state.agent_results.is_empty());
    assert!(state.current_agent.is_none());
}

#[test]
fn test_successful_result_ignores_errors() {
    let mut state = WorkflowState::new(WorkflowId::new(), "q", DealInfo::default());
    state.apply_result(AgentResult::error("target_finder", "boom", 0.2));

    assert!(state.result("target_finder").is_some());
    assert!(state.successful_result("target_finder").is_none());
}

#[test]
fn test_message_role_text() {
    let message = Message::new(Role::Assistant, "hello");
    assert_eq!(message.role.to_string(), "assistant");
    assert_eq!("USER".parse::<Role>().unwrap(), Role::User);
}
