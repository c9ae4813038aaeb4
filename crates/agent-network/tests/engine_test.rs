//! End-to-end workflow runs through the service, worker pool and engine

mod common;

use common::*;
use dealflow_common::{AgentStatus, DealInfo, Mode, Role, WorkflowId, WorkflowStatus};
use dealflow_network::agents::{ValuationBasis, ValuerPayload, ORCHESTRATOR, TARGET_FINDER, VALUER};
use dealflow_network::error::{EngineError, ProviderError};
use dealflow_network::{AgentPool, StatusEventType, StatusStream, WorkflowEngine, WorkflowService};
use dealflow_storage::WorkflowStore;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

fn service_with(store: Arc<dyn WorkflowStore>, pool: AgentPool) -> WorkflowService {
    WorkflowService::new(store, pool, &engine_config(2, 16))
}

fn happy_pool() -> AgentPool {
    standard_pool(Arc::new(ScriptedLlm::happy()), Arc::new(StaticMarketData::empty()))
}

fn agent_names(snapshot: &dealflow_common::WorkflowSnapshot) -> Vec<&str> {
    snapshot
        .agent_results
        .iter()
        .map(|r| r.agent_name.as_str())
        .collect()
}

#[tokio::test]
async fn buyer_request_runs_full_pipeline() {
    init_test_logging();
    let (_dir, store) = setup_store().await;
    let service = service_with(store, happy_pool());

    let id = service.start("Find acquisition targets in fintech").await.unwrap();
    let snapshot = wait_for_terminal(&service, &id).await;

    assert_eq!(snapshot.workflow.status, WorkflowStatus::Completed);
    assert_eq!(snapshot.workflow.mode, Mode::BuyerMa);
    assert_eq!(snapshot.current_agent, None);
    assert_eq!(agent_names(&snapshot), vec![ORCHESTRATOR, TARGET_FINDER, VALUER]);
    assert!(snapshot
        .agent_results
        .iter()
        .all(|r| r.status == AgentStatus::Success));

    let contents: Vec<&str> = snapshot.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(snapshot.messages[0].role, Role::User);
    assert_eq!(contents[0], "Find acquisition targets in fintech");
    assert_eq!(
        contents[1],
        "Workflow routing: BUYER_MA\n\nDetected buyer-side M&A keywords in query"
    );
    assert!(contents[2].starts_with("Found 3 potential targets:"));
    assert!(contents[3].starts_with("Valuation analysis complete for Ledgerly Inc"));
    assert_eq!(
        contents[4],
        "Buy-side M&A analysis complete: 2 of 2 steps succeeded. All results are available in the detailed view."
    );
    assert_eq!(snapshot.message_count, 5);
    assert_eq!(snapshot.agent_count, 3);

    let valuation: ValuerPayload = snapshot.result(VALUER).unwrap().payload().unwrap();
    assert_eq!(valuation.basis, ValuationBasis::TargetFinder);
    assert_eq!(valuation.valuation_range.mid, 400.0);

    service.shutdown().await;
}

#[tokio::test]
async fn seller_request_uses_the_deal_pipeline() {
    let (_dir, store) = setup_store().await;
    let service = service_with(store, happy_pool());

    let id = service
        .start("We are selling our company and need a buyer")
        .await
        .unwrap();
    let snapshot = wait_for_terminal(&service, &id).await;

    assert_eq!(snapshot.workflow.status, WorkflowStatus::Completed);
    assert_eq!(snapshot.workflow.mode, Mode::SellerMa);
    assert_eq!(agent_names(&snapshot), vec![ORCHESTRATOR, TARGET_FINDER, VALUER]);
    assert!(snapshot.messages[1]
        .content
        .starts_with("Workflow routing: SELLER_MA"));
    assert!(snapshot
        .messages
        .last()
        .unwrap()
        .content
        .starts_with("Sell-side M&A analysis complete"));
}

#[tokio::test]
async fn ipo_request_values_from_deal_metadata() {
    let (_dir, store) = setup_store().await;
    let service = service_with(store, happy_pool());

    let deal = DealInfo {
        company_name: Some("Northwind Analytics".to_string()),
        industry: Some("Software".to_string()),
        deal_size: Some("$500M".to_string()),
    };
    let id = service
        .start_with_deal("Plan an IPO for our SaaS business", deal.clone())
        .await
        .unwrap();
    let snapshot = wait_for_terminal(&service, &id).await;

    assert_eq!(snapshot.workflow.mode, Mode::Ipo);
    assert_eq!(snapshot.deal, deal);
    assert_eq!(agent_names(&snapshot), vec![ORCHESTRATOR, VALUER]);

    let valuation: ValuerPayload = snapshot.result(VALUER).unwrap().payload().unwrap();
    assert_eq!(valuation.basis, ValuationBasis::DealFallback);
    assert_eq!(valuation.target_company, "Northwind Analytics");
    assert!(snapshot
        .messages
        .last()
        .unwrap()
        .content
        .starts_with("IPO analysis complete: 1 of 1 steps succeeded."));
}

#[tokio::test]
async fn routing_failure_fails_the_workflow() {
    let (_dir, store) = setup_store().await;
    let pool = happy_pool().with_agent(Arc::new(BrokenOrchestrator));
    let service = service_with(store, pool);

    let id = service.start("Find acquisition targets in fintech").await.unwrap();
    let snapshot = wait_for_terminal(&service, &id).await;

    assert_eq!(snapshot.workflow.status, WorkflowStatus::Failed);
    assert_eq!(snapshot.workflow.mode, Mode::Unknown);
    assert_eq!(agent_names(&snapshot), vec![ORCHESTRATOR]);

    let routing = snapshot.result(ORCHESTRATOR).unwrap();
    assert_eq!(routing.status, AgentStatus::Error);
    assert_eq!(
        routing.error_message.as_deref(),
        Some("provider unavailable: routing model offline")
    );
    assert_eq!(
        snapshot.messages.last().unwrap().content,
        "Workflow routing failed: provider unavailable: routing model offline"
    );
}

#[tokio::test]
async fn downstream_failure_does_not_stop_the_pipeline() {
    let (_dir, store) = setup_store().await;
    let llm = ScriptedLlm::happy().failing(Stage::Targets, ProviderError::RateLimited);
    let service = service_with(
        store,
        standard_pool(Arc::new(llm), Arc::new(StaticMarketData::empty())),
    );

    let id = service.start("Find acquisition targets in fintech").await.unwrap();
    let snapshot = wait_for_terminal(&service, &id).await;

    assert_eq!(snapshot.workflow.status, WorkflowStatus::Completed);
    let finder = snapshot.result(TARGET_FINDER).unwrap();
    assert_eq!(finder.status, AgentStatus::Error);
    assert!(finder.error_message.as_deref().unwrap().starts_with("provider unavailable"));

    let valuer = snapshot.result(VALUER).unwrap();
    assert_eq!(valuer.status, AgentStatus::Success);
    let valuation: ValuerPayload = valuer.payload().unwrap();
    assert_eq!(valuation.basis, ValuationBasis::DealFallback);

    let contents: Vec<&str> = snapshot.messages.iter().map(|m| m.content.as_str()).collect();
    assert!(contents.iter().any(|c| c.starts_with("target_finder error: provider unavailable")));
    assert!(contents
        .last()
        .unwrap()
        .starts_with("Buy-side M&A analysis complete: 1 of 2 steps succeeded."));
}

#[tokio::test]
async fn unregistered_agent_is_recorded_as_error() {
    let (_dir, store) = setup_store().await;
    let llm: Arc<ScriptedLlm> = Arc::new(ScriptedLlm::happy());
    let pool = AgentPool::new()
        .with_agent(Arc::new(dealflow_network::agents::OrchestratorAgent::new(llm.clone(), 0.0)))
        .with_agent(Arc::new(dealflow_network::agents::TargetFinderAgent::new(
            llm,
            Arc::new(StaticMarketData::empty()),
            0.0,
        )));
    let service = service_with(store, pool);

    let id = service.start("Find acquisition targets in fintech").await.unwrap();
    let snapshot = wait_for_terminal(&service, &id).await;

    assert_eq!(snapshot.workflow.status, WorkflowStatus::Completed);
    assert_eq!(
        snapshot.result(VALUER).unwrap().error_message.as_deref(),
        Some("invalid state: agent valuer is not registered")
    );
}

#[tokio::test]
async fn run_budget_bounds_slow_agents() {
    let (_dir, store) = setup_store().await;
    let pool = happy_pool().with_agent(Arc::new(SlowAgent {
        name: TARGET_FINDER,
        delay: Duration::from_secs(30),
    }));
    let mut config = engine_config(1, 4);
    config.run_budget_secs = 1;
    let service = WorkflowService::new(store, pool, &config);

    let id = service.start("Find acquisition targets in fintech").await.unwrap();
    let snapshot = wait_for_terminal(&service, &id).await;

    assert_eq!(snapshot.workflow.status, WorkflowStatus::Completed);
    assert_eq!(
        snapshot.result(TARGET_FINDER).unwrap().error_message.as_deref(),
        Some("provider unavailable: workflow time budget exhausted")
    );
}

#[tokio::test]
async fn oversized_run_budget_still_runs() {
    let (_dir, store) = setup_store().await;
    let mut config = engine_config(1, 4);
    config.run_budget_secs = u64::MAX;
    let service = WorkflowService::new(store, happy_pool(), &config);

    let id = service.start("Find acquisition targets in fintech").await.unwrap();
    let snapshot = wait_for_terminal(&service, &id).await;

    assert_eq!(snapshot.workflow.status, WorkflowStatus::Completed);
    assert_eq!(service.in_flight(), 0);
}

#[tokio::test]
async fn polled_progress_never_regresses() {
    let (_dir, store) = setup_store().await;
    let gate = Arc::new(Semaphore::new(0));
    let llm = ScriptedLlm::happy().gated(gate.clone());
    let service = service_with(
        store,
        standard_pool(Arc::new(llm), Arc::new(StaticMarketData::empty())),
    );

    let id = service.start("Find acquisition targets in fintech").await.unwrap();

    let mut last_rank = 0;
    let mut ranks_seen = BTreeSet::new();
    let mut finished: BTreeMap<String, String> = BTreeMap::new();
    let mut released = 0;
    for _ in 0..1000 {
        let snapshot = service.get_status(&id).await.unwrap().unwrap();

        let rank = snapshot.workflow.status.rank();
        assert!(rank >= last_rank, "status went back to {}", snapshot.workflow.status);
        last_rank = rank;
        ranks_seen.insert(rank);

        for result in &snapshot.agent_results {
            let encoded = serde_json::to_string(result).unwrap();
            match finished.get(&result.agent_name) {
                Some(first) => assert_eq!(
                    first, &encoded,
                    "{} changed after it finished",
                    result.agent_name
                ),
                None if result.status.is_finished() => {
                    finished.insert(result.agent_name.clone(), encoded);
                }
                None => {}
            }
        }

        if snapshot.workflow.status.is_terminal() {
            break;
        }
        // Let one model call through at a time, once an agent is waiting on it
        let waiting = snapshot
            .agent_results
            .iter()
            .any(|r| r.status == AgentStatus::InProgress);
        if waiting && gate.available_permits() == 0 {
            gate.add_permits(1);
            released += 1;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(last_rank, WorkflowStatus::Completed.rank());
    assert!(ranks_seen.contains(&WorkflowStatus::Routing.rank()));
    assert!(ranks_seen.contains(&WorkflowStatus::Executing.rank()));
    assert_eq!(finished.len(), 3);
    assert!(released >= 3);
}

#[tokio::test]
async fn storage_failure_mid_pipeline_leaves_last_written_state() {
    let (_dir, sqlite) = setup_store().await;
    let store = Arc::new(FailingStore::new(sqlite.clone(), TARGET_FINDER));
    let service = service_with(store, happy_pool());

    // Accepted before the run hits the failing write
    let id = service.start("Find acquisition targets in fintech").await.unwrap();
    service.shutdown().await;

    let snapshot = sqlite.snapshot(&id).await.unwrap().unwrap();
    assert_eq!(snapshot.workflow.status, WorkflowStatus::Executing);
    assert_eq!(snapshot.workflow.mode, Mode::BuyerMa);
    assert_eq!(snapshot.current_agent.as_deref(), Some(TARGET_FINDER));
    assert_eq!(
        snapshot.result(TARGET_FINDER).unwrap().status,
        AgentStatus::InProgress
    );
    assert!(snapshot.result(VALUER).is_none());
}

#[tokio::test]
async fn status_events_follow_the_run() {
    let (_dir, store) = setup_store().await;
    let service = service_with(store, happy_pool());
    let mut events = service.subscribe();

    let id = service.start("Find acquisition targets in fintech").await.unwrap();

    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(10), events.recv())
            .await
            .expect("timed out waiting for status events")
            .unwrap();
        if event.workflow_id != id {
            continue;
        }
        let terminal = event.event_type.is_terminal();
        seen.push(event);
        if terminal {
            break;
        }
    }

    let kinds: Vec<StatusEventType> = seen.iter().map(|e| e.event_type).collect();
    assert_eq!(
        kinds,
        vec![
            StatusEventType::WorkflowStarted,
            StatusEventType::AgentStarted,
            StatusEventType::AgentCompleted,
            StatusEventType::WorkflowRouted,
            StatusEventType::AgentStarted,
            StatusEventType::AgentCompleted,
            StatusEventType::AgentStarted,
            StatusEventType::AgentCompleted,
            StatusEventType::WorkflowCompleted,
        ]
    );

    // Workflow-level statuses never move backwards
    let ranks: Vec<u8> = seen
        .iter()
        .filter_map(|e| e.event_type.workflow_status())
        .map(|s| s.rank())
        .collect();
    assert!(ranks.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn messages_are_time_ordered_and_snapshots_stable() {
    let (_dir, store) = setup_store().await;
    let service = service_with(store, happy_pool());

    let id = service.start("Find acquisition targets in fintech").await.unwrap();
    let first = wait_for_terminal(&service, &id).await;
    let second = service.get_status(&id).await.unwrap().unwrap();

    assert!(first
        .messages
        .windows(2)
        .all(|w| w[0].timestamp <= w[1].timestamp));
    assert_eq!(
        serde_json::to_value(&first).unwrap(),
        serde_json::to_value(&second).unwrap()
    );
}

#[tokio::test]
async fn concurrent_workflows_stay_isolated() {
    let (_dir, store) = setup_store().await;
    let service = WorkflowService::new(store, happy_pool(), &engine_config(3, 16));

    let mut ids = Vec::new();
    for i in 0..6 {
        let query = if i % 2 == 0 {
            "Find acquisition targets in fintech"
        } else {
            "Plan an IPO for our SaaS business"
        };
        ids.push(service.start(query).await.unwrap());
    }

    for (i, id) in ids.iter().enumerate() {
        let snapshot = wait_for_terminal(&service, id).await;
        assert_eq!(snapshot.workflow.id, *id);
        assert_eq!(snapshot.workflow.status, WorkflowStatus::Completed);
        let expected = if i % 2 == 0 { 3 } else { 2 };
        assert_eq!(snapshot.agent_count, expected);
        assert_eq!(snapshot.messages[0].content, snapshot.workflow.user_query);
    }

    let recent = service.list_recent(10).await.unwrap();
    assert_eq!(recent.len(), 6);
    assert_eq!(recent[0].id, ids[5]);
    service.shutdown().await;
    assert_eq!(service.in_flight(), 0);
}

#[tokio::test]
async fn engine_does_not_rerun_finished_workflows() {
    let (_dir, store) = setup_store().await;
    let llm = Arc::new(ScriptedLlm::happy());
    let pool = standard_pool(llm.clone(), Arc::new(StaticMarketData::empty()));
    let engine = WorkflowEngine::new(
        store.clone(),
        Arc::new(pool),
        Arc::new(StatusStream::new()),
        Duration::from_secs(30),
    );

    let state = store
        .create("Plan an IPO for our SaaS business", &DealInfo::default())
        .await
        .unwrap();
    assert_eq!(engine.run(&state.workflow_id).await.unwrap(), WorkflowStatus::Completed);
    let calls = llm.calls().len();

    assert_eq!(engine.run(&state.workflow_id).await.unwrap(), WorkflowStatus::Completed);
    assert_eq!(llm.calls().len(), calls);
}

#[tokio::test]
async fn engine_reports_unknown_workflow() {
    let (_dir, store) = setup_store().await;
    let engine = WorkflowEngine::new(
        store,
        Arc::new(happy_pool()),
        Arc::new(StatusStream::new()),
        Duration::from_secs(30),
    );

    let err = engine.run(&WorkflowId::new()).await.unwrap_err();
    assert!(matches!(err, EngineError::WorkflowNotFound(_)));
}
