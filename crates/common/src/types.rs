use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for workflow runs
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Classified workflow type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    BuyerMa,
    SellerMa,
    Ipo,
    #[default]
    Unknown,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::BuyerMa => "buyer_ma",
            Mode::SellerMa => "seller_ma",
            Mode::Ipo => "ipo",
            Mode::Unknown => "unknown",
        }
    }

    pub fn is_routed(&self) -> bool {
        !matches!(self, Mode::Unknown)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buyer_ma" => Ok(Self::BuyerMa),
            "seller_ma" => Ok(Self::SellerMa),
            "ipo" => Ok(Self::Ipo),
            "unknown" => Ok(Self::Unknown),
            _ => Err(format!("Unknown mode: {}", s)),
        }
    }
}

/// Workflow-level status. Variants are declared in lifecycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    Routing,
    Executing,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Pending => "pending",
            WorkflowStatus::Routing => "routing",
            WorkflowStatus::Executing => "executing",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
        }
    }

    /// Position in the lifecycle; both terminal states share the last rank.
    pub fn rank(&self) -> u8 {
        match self {
            WorkflowStatus::Pending => 0,
            WorkflowStatus::Routing => 1,
            WorkflowStatus::Executing => 2,
            WorkflowStatus::Completed | WorkflowStatus::Failed => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStatus::Completed | WorkflowStatus::Failed)
    }

    /// Forward-only: never into `pending`, never out of a terminal state,
    /// never to a lower rank. Re-asserting the current status is allowed.
    pub fn can_transition_to(&self, next: WorkflowStatus) -> bool {
        if *self == next {
            return true;
        }
        if next == WorkflowStatus::Pending || self.is_terminal() {
            return false;
        }
        next.rank() >= self.rank()
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "routing" => Ok(Self::Routing),
            "executing" => Ok(Self::Executing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown workflow status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// Entry in a workflow's message log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    InProgress,
    Success,
    Error,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::InProgress => "in_progress",
            AgentStatus::Success => "success",
            AgentStatus::Error => "error",
        }
    }

    pub fn is_finished(&self) -> bool {
        !matches!(self, AgentStatus::InProgress)
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_progress" => Ok(Self::InProgress),
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown agent status: {}", s)),
        }
    }
}

/// Outcome of one agent execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent_name: String,
    pub status: AgentStatus,
    /// Agent-specific payload; `null` unless status is success
    pub result: Value,
    /// Seconds
    pub execution_time: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl AgentResult {
    pub fn in_progress(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            status: AgentStatus::InProgress,
            result: Value::Null,
            execution_time: 0.0,
            timestamp: Utc::now(),
            error_message: None,
        }
    }

    pub fn success(agent_name: impl Into<String>, result: Value, execution_time: f64) -> Self {
        Self {
            agent_name: agent_name.into(),
            status: AgentStatus::Success,
            result,
            execution_time: execution_time.max(0.0),
            timestamp: Utc::now(),
            error_message: None,
        }
    }

    pub fn error(
        agent_name: impl Into<String>,
        error_message: impl Into<String>,
        execution_time: f64,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            status: AgentStatus::Error,
            result: Value::Null,
            execution_time: execution_time.max(0.0),
            timestamp: Utc::now(),
            error_message: Some(error_message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AgentStatus::Success
    }

    /// Deserialize the stored JSON payload into a typed view
    pub fn payload<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.result.clone())
    }
}

/// Optional deal metadata supplied with a request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DealInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    /// Free text such as "100M" or "1.5B"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deal_size: Option<String>,
}

impl DealInfo {
    pub fn is_empty(&self) -> bool {
        self.company_name.is_none() && self.industry.is_none() && self.deal_size.is_none()
    }
}

/// The aggregate threaded through one workflow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub workflow_id: WorkflowId,
    pub mode: Mode,
    pub user_query: String,
    pub status: WorkflowStatus,
    pub messages: Vec<Message>,
    pub agent_results: BTreeMap<String, AgentResult>,
    pub current_agent: Option<String>,
    #[serde(default)]
    pub deal: DealInfo,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowState {
    pub fn new(workflow_id: WorkflowId, user_query: impl Into<String>, deal: DealInfo) -> Self {
        let now = Utc::now();
        Self {
            workflow_id,
            mode: Mode::Unknown,
            user_query: user_query.into(),
            status: WorkflowStatus::Pending,
            messages: Vec::new(),
            agent_results: BTreeMap::new(),
            current_agent: None,
            deal,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn push_message(&mut self, message: Message) {
        self.updated_at = message.timestamp.max(self.updated_at);
        self.messages.push(message);
    }

    /// Mirror of the store upsert: replaces the entry and tracks `current_agent`.
    pub fn apply_result(&mut self, result: AgentResult) {
        self.current_agent = match result.status {
            AgentStatus::InProgress => Some(result.agent_name.clone()),
            _ => None,
        };
        self.updated_at = result.timestamp.max(self.updated_at);
        self.agent_results.insert(result.agent_name.clone(), result);
    }

    pub fn set_status(&mut self, status: WorkflowStatus, mode: Option<Mode>) {
        self.status = status;
        if let Some(mode) = mode {
            if !self.mode.is_routed() {
                self.mode = mode;
            }
        }
        self.updated_at = Utc::now();
    }

    pub fn result(&self, agent_name: &str) -> Option<&AgentResult> {
        self.agent_results.get(agent_name)
    }

    /// Result of a prior agent, only when it succeeded
    pub fn successful_result(&self, agent_name: &str) -> Option<&AgentResult> {
        self.result(agent_name).filter(|r| r.is_success())
    }
}

/// Lightweight row for listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub id: WorkflowId,
    pub user_query: String,
    pub mode: Mode,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Read-only view returned to pollers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSnapshot {
    pub workflow: WorkflowSummary,
    pub current_agent: Option<String>,
    pub deal: DealInfo,
    /// Ordered by completion
    pub agent_results: Vec<AgentResult>,
    pub messages: Vec<Message>,
    pub agent_count: usize,
    pub message_count: usize,
}

impl WorkflowSnapshot {
    pub fn result(&self, agent_name: &str) -> Option<&AgentResult> {
        self.agent_results.iter().find(|r| r.agent_name == agent_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_never_returns_to_pending() {
        assert!(WorkflowStatus::Pending.can_transition_to(WorkflowStatus::Routing));
        assert!(!WorkflowStatus::Routing.can_transition_to(WorkflowStatus::Pending));
        assert!(!WorkflowStatus::Executing.can_transition_to(WorkflowStatus::Routing));
        assert!(WorkflowStatus::Routing.can_transition_to(WorkflowStatus::Failed));
    }

    #[test]
    fn terminal_states_are_final() {
        assert!(!WorkflowStatus::Completed.can_transition_to(WorkflowStatus::Failed));
        assert!(!WorkflowStatus::Failed.can_transition_to(WorkflowStatus::Completed));
        assert!(WorkflowStatus::Completed.can_transition_to(WorkflowStatus::Completed));
    }

    #[test]
    fn apply_result_tracks_current_agent() {
        let mut state = WorkflowState::new(WorkflowId::new(), "q", DealInfo::default());
        state.apply_result(AgentResult::in_progress("valuer"));
        assert_eq!(state.current_agent.as_deref(), Some("valuer"));

        state.apply_result(AgentResult::success("valuer", serde_json::json!({}), 0.5));
        assert!(state.current_agent.is_none());
        assert!(state.successful_result("valuer").is_some());
    }

    #[test]
    fn mode_is_set_once() {
        let mut state = WorkflowState::new(WorkflowId::new(), "q", DealInfo::default());
        state.set_status(WorkflowStatus::Executing, Some(Mode::Ipo));
        state.set_status(WorkflowStatus::Completed, Some(Mode::BuyerMa));
        assert_eq!(state.mode, Mode::Ipo);
    }
}
