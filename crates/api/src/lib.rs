//! # Dealflow HTTP API
//!
//! REST boundary over the [`WorkflowService`](dealflow_network::WorkflowService).
//! Runs are started asynchronously and polled for progress.
//!
//! ```text
//! ┌─────────────────────┐
//! │   REST Endpoints    │ <- /workflows, /workflows/:id, /health
//! ├─────────────────────┤
//! │  Workflow Service   │ <- admission, queue backpressure
//! ├─────────────────────┤
//! │  Execution Manager  │ <- fixed worker pool
//! ├─────────────────────┤
//! │   Workflow Engine   │ <- routing and agent pipelines
//! └─────────────────────┘
//! ```
//!
//! ## Usage
//!
//! 1. **POST** `/workflows` with `{"query": ..., "deal": {...}}`; the response
//!    is `202 Accepted` with the new `workflow_id`
//! 2. **GET** `/workflows/{workflow_id}` until `workflow.status` is
//!    `completed` or `failed`
//! 3. **GET** `/workflows?limit=N` lists the most recent runs
//!
//! ## Error Handling
//!
//! Every failure is an [`ErrorResponse`] with a machine-readable `code`.
//! Internal failures carry only an opaque `error_id`; the details are logged
//! server-side under that id.

pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use server::{AppState, DealflowServer};
pub use types::*;
