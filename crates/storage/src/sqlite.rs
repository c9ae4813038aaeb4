use crate::error::{StoreError, StoreResult};
use crate::store::WorkflowStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dealflow_common::{
    AgentResult, AgentStatus, DealInfo, Message, Mode, Role, WorkflowId, WorkflowSnapshot,
    WorkflowState, WorkflowStatus, WorkflowSummary,
};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, instrument};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed [`WorkflowStore`].
///
/// Mutations open a transaction whose first statement is a write, so the
/// write lock is taken (waiting up to the busy timeout) before anything is
/// read. That keeps read-check-write sequences such as status validation
/// serialized across connections.
#[derive(Clone)]
pub struct SqliteWorkflowStore {
    pool: SqlitePool,
}

struct LoadedWorkflow {
    summary: WorkflowSummary,
    current_agent: Option<String>,
    deal: DealInfo,
    results: Vec<AgentResult>,
    messages: Vec<Message>,
}

impl SqliteWorkflowStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");

        let mut options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Each in-memory connection is its own database
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("Connected to SQLite workflow store at {}", database_url);
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn load(&self, id: &WorkflowId) -> StoreResult<Option<LoadedWorkflow>> {
        let mut tx = self.pool.begin().await?;
        let loaded = load_workflow(&mut tx, id).await?;
        tx.commit().await?;
        Ok(loaded)
    }
}

/// Bump `updated_at`, taking the write lock. Fails with `NotFound` when the row is missing.
async fn touch(conn: &mut SqliteConnection, id: &WorkflowId, now: DateTime<Utc>) -> StoreResult<()> {
    let updated = sqlx::query("UPDATE workflows SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(id.as_str())
        .execute(&mut *conn)
        .await?;

    if updated.rows_affected() == 0 {
        return Err(StoreError::not_found(id));
    }
    Ok(())
}

fn parse_column<T: FromStr<Err = String>>(row: &SqliteRow, column: &str) -> StoreResult<T> {
    let raw: String = row.try_get(column)?;
    raw.parse::<T>()
        .map_err(|e| StoreError::corrupt(format!("{}: {}", column, e)))
}

fn summary_from_row(row: &SqliteRow) -> StoreResult<WorkflowSummary> {
    Ok(WorkflowSummary {
        id: WorkflowId::from_string(row.try_get("id")?),
        user_query: row.try_get("user_query")?,
        mode: parse_column(row, "mode")?,
        status: parse_column(row, "status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn agent_result_from_row(row: &SqliteRow) -> StoreResult<AgentResult> {
    let payload: String = row.try_get("result")?;
    Ok(AgentResult {
        agent_name: row.try_get("agent_name")?,
        status: parse_column::<AgentStatus>(row, "status")?,
        result: serde_json::from_str(&payload)
            .map_err(|e| StoreError::corrupt(format!("agent result payload: {}", e)))?,
        execution_time: row.try_get("execution_time")?,
        timestamp: row.try_get("updated_at")?,
        error_message: row.try_get("error_message")?,
    })
}

fn message_from_row(row: &SqliteRow) -> StoreResult<Message> {
    Ok(Message {
        role: parse_column::<Role>(row, "role")?,
        content: row.try_get("content")?,
        timestamp: row.try_get("timestamp")?,
    })
}

async fn load_workflow(
    conn: &mut SqliteConnection,
    id: &WorkflowId,
) -> StoreResult<Option<LoadedWorkflow>> {
    let row = sqlx::query(
        r#"
        SELECT id, user_query, mode, status, current_agent, deal, created_at, updated_at
        FROM workflows
        WHERE id = ?
        "#,
    )
    .bind(id.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let summary = summary_from_row(&row)?;
    let current_agent: Option<String> = row.try_get("current_agent")?;
    let deal_json: String = row.try_get("deal")?;
    let deal: DealInfo = serde_json::from_str(&deal_json)
        .map_err(|e| StoreError::corrupt(format!("deal: {}", e)))?;

    let results = sqlx::query(
        r#"
        SELECT agent_name, status, result, execution_time, error_message, updated_at
        FROM agent_results
        WHERE workflow_id = ?
        ORDER BY seq ASC
        "#,
    )
    .bind(id.as_str())
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .map(agent_result_from_row)
    .collect::<StoreResult<Vec<_>>>()?;

    let messages = sqlx::query(
        "SELECT role, content, timestamp FROM messages WHERE workflow_id = ? ORDER BY id ASC",
    )
    .bind(id.as_str())
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .map(message_from_row)
    .collect::<StoreResult<Vec<_>>>()?;

    Ok(Some(LoadedWorkflow {
        summary,
        current_agent,
        deal,
        results,
        messages,
    }))
}

#[async_trait]
impl WorkflowStore for SqliteWorkflowStore {
    #[instrument(skip(self, deal))]
    async fn create(&self, user_query: &str, deal: &DealInfo) -> StoreResult<WorkflowState> {
        let state = WorkflowState::new(WorkflowId::new(), user_query, deal.clone());
        let deal_json = serde_json::to_string(&state.deal)?;

        sqlx::query(
            r#"
            INSERT INTO workflows (id, user_query, mode, status, current_agent, deal, created_at, updated_at)
            VALUES (?, ?, ?, ?, NULL, ?, ?, ?)
            "#,
        )
        .bind(state.workflow_id.as_str())
        .bind(&state.user_query)
        .bind(state.mode.as_str())
        .bind(state.status.as_str())
        .bind(deal_json)
        .bind(state.created_at)
        .bind(state.updated_at)
        .execute(&self.pool)
        .await?;

        debug!("Created workflow {}", state.workflow_id);
        Ok(state)
    }

    async fn append_message(
        &self,
        id: &WorkflowId,
        role: Role,
        content: &str,
    ) -> StoreResult<Message> {
        let mut message = Message::new(role, content);

        let mut tx = self.pool.begin().await?;
        touch(&mut tx, id, message.timestamp).await?;

        // Log timestamps never go backwards, even if the wall clock does
        let last: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT timestamp FROM messages WHERE workflow_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(id.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(last) = last {
            message.timestamp = message.timestamp.max(last);
        }

        sqlx::query(
            "INSERT INTO messages (workflow_id, role, content, timestamp) VALUES (?, ?, ?, ?)",
        )
        .bind(id.as_str())
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.timestamp)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(message)
    }

    async fn record_agent_result(
        &self,
        id: &WorkflowId,
        result: &AgentResult,
    ) -> StoreResult<AgentResult> {
        let now = Utc::now();
        let payload = serde_json::to_string(&result.result)?;

        let mut tx = self.pool.begin().await?;
        touch(&mut tx, id, now).await?;

        let seq: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM agent_results WHERE workflow_id = ?",
        )
        .bind(id.as_str())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO agent_results
                (workflow_id, agent_name, status, result, execution_time, error_message, seq, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (workflow_id, agent_name) DO UPDATE SET
                status = excluded.status,
                result = excluded.result,
                execution_time = excluded.execution_time,
                error_message = excluded.error_message,
                seq = excluded.seq,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(id.as_str())
        .bind(&result.agent_name)
        .bind(result.status.as_str())
        .bind(payload)
        .bind(result.execution_time)
        .bind(result.error_message.as_deref())
        .bind(seq)
        .bind(result.timestamp)
        .bind(result.timestamp)
        .execute(&mut *tx)
        .await?;

        match result.status {
            AgentStatus::InProgress => {
                sqlx::query("UPDATE workflows SET current_agent = ? WHERE id = ?")
                    .bind(&result.agent_name)
                    .bind(id.as_str())
                    .execute(&mut *tx)
                    .await?;
            }
            AgentStatus::Success | AgentStatus::Error => {
                sqlx::query(
                    "UPDATE workflows SET current_agent = NULL WHERE id = ? AND current_agent = ?",
                )
                .bind(id.as_str())
                .bind(&result.agent_name)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        debug!(
            "Recorded {} for agent {} on workflow {}",
            result.status, result.agent_name, id
        );
        Ok(result.clone())
    }

    #[instrument(skip(self))]
    async fn set_status(
        &self,
        id: &WorkflowId,
        status: WorkflowStatus,
        mode: Option<Mode>,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        touch(&mut tx, id, Utc::now()).await?;

        let row = sqlx::query("SELECT status, mode FROM workflows WHERE id = ?")
            .bind(id.as_str())
            .fetch_one(&mut *tx)
            .await?;
        let current: WorkflowStatus = parse_column(&row, "status")?;
        let existing_mode: Mode = parse_column(&row, "mode")?;

        if !current.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                workflow_id: id.to_string(),
                from: current,
                to: status,
            });
        }

        let next_mode = match mode {
            Some(requested) if requested.is_routed() => {
                if existing_mode.is_routed() && existing_mode != requested {
                    return Err(StoreError::ModeAlreadySet {
                        workflow_id: id.to_string(),
                        existing: existing_mode,
                        requested,
                    });
                }
                requested
            }
            _ => existing_mode,
        };

        sqlx::query(
            r#"
            UPDATE workflows
            SET status = ?,
                mode = ?,
                current_agent = CASE WHEN ? THEN NULL ELSE current_agent END
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(next_mode.as_str())
        .bind(status.is_terminal())
        .bind(id.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: &WorkflowId) -> StoreResult<Option<WorkflowState>> {
        let Some(loaded) = self.load(id).await? else {
            return Ok(None);
        };

        let LoadedWorkflow {
            summary,
            current_agent,
            deal,
            results,
            messages,
        } = loaded;

        Ok(Some(WorkflowState {
            workflow_id: summary.id,
            mode: summary.mode,
            user_query: summary.user_query,
            status: summary.status,
            messages,
            agent_results: results
                .into_iter()
                .map(|r| (r.agent_name.clone(), r))
                .collect(),
            current_agent,
            deal,
            created_at: summary.created_at,
            updated_at: summary.updated_at,
        }))
    }

    async fn snapshot(&self, id: &WorkflowId) -> StoreResult<Option<WorkflowSnapshot>> {
        let Some(loaded) = self.load(id).await? else {
            return Ok(None);
        };

        Ok(Some(WorkflowSnapshot {
            agent_count: loaded.results.len(),
            message_count: loaded.messages.len(),
            workflow: loaded.summary,
            current_agent: loaded.current_agent,
            deal: loaded.deal,
            agent_results: loaded.results,
            messages: loaded.messages,
        }))
    }

    async fn list_recent(&self, limit: usize) -> StoreResult<Vec<WorkflowSummary>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        sqlx::query(
            r#"
            SELECT id, user_query, mode, status, created_at, updated_at
            FROM workflows
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(summary_from_row)
        .collect()
    }
}
