//! Batch export engine
//!
//! The pipeline is strictly one-directional: the driver asks the planner for
//! the next `EntityId` range, the query builder for that range's FOR JSON
//! query, the invoker to run the external bulk-export tool against it, and
//! the outcome evaluator for a verdict — then advances or halts.
//!
//! - `planner`: export state and contiguous batch ranges
//! - `query`: per-batch FOR JSON query and the max-id probe
//! - `invoker`: bcp/sqlcmd invocation behind the [`BulkTool`] seam
//! - `outcome`: Success/Failure classification with reproduction diagnostics
//! - `driver`: the run loop tying it all together
//! - `progress`: per-batch progress bar

pub mod driver;
pub mod invoker;
pub mod outcome;
pub mod planner;
pub mod progress;
pub mod query;

// Re-export the types callers typically need
pub use driver::{ExportDriver, JobConfig, RunReport};
pub use invoker::{AuthMode, BcpTool, BulkTool, ConnectionInfo, ToolOutcome};
pub use outcome::{Evaluation, FailureDiagnostic, evaluate};
pub use planner::{BatchPlanner, BatchRange, ExportState};
pub use progress::ProgressTracker;
pub use query::QueryBuilder;
