//! Export driver orchestrating the batch loop
//!
//! The driver owns the whole run: it creates the output directory, snapshots
//! the maximum entity id, then walks the planner's ranges one at a time —
//! build query, derive output path, invoke the bulk tool, classify the
//! outcome — advancing on success and halting the entire run on the first
//! failure. Batches are strictly sequential; at most one external process is
//! ever in flight and no batch is retried.

use std::path::PathBuf;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info};

use crate::error::{ExportError, Result};

use super::invoker::BulkTool;
use super::outcome::{evaluate, Evaluation, FailureDiagnostic};
use super::planner::{BatchPlanner, ExportState};
use super::progress::ProgressTracker;
use super::query::QueryBuilder;

/// Immutable description of one export job.
///
/// Resolved once from config and CLI arguments; the only mutable state of a
/// run lives in [`ExportState`].
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Source table holding the entity-merge records.
    pub table: String,
    /// Community identifier embedded once per output file.
    pub community_id: String,
    /// Directory the sequence-numbered files are written to.
    pub output_directory: PathBuf,
    /// File name prefix; files are named `<prefix><sequence>.json`.
    pub file_prefix: String,
    /// Entity ids per batch.
    pub batch_size: i64,
    /// Re-probe the maximum entity id before each batch instead of relying
    /// on the init-time snapshot. The maximum only ever grows.
    pub refresh_max_id: bool,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Number of batches exported (equals the number of files written).
    pub batches_exported: u32,
    /// The snapshot maximum the run covered, if any records existed.
    pub max_entity_id: Option<i64>,
    /// Output files in emission order.
    pub files: Vec<PathBuf>,
    /// Wall-clock duration of the run.
    pub elapsed_ms: u64,
}

/// Driver for one export run.
pub struct ExportDriver {
    tool: Box<dyn BulkTool>,
    job: JobConfig,
    show_progress: bool,
}

impl ExportDriver {
    /// Create a driver.
    ///
    /// # Arguments
    /// * `tool` - External bulk-export capability
    /// * `job` - Resolved job description
    /// * `show_progress` - Whether to render a progress bar
    pub fn new(tool: Box<dyn BulkTool>, job: JobConfig, show_progress: bool) -> Self {
        Self {
            tool,
            job,
            show_progress,
        }
    }

    /// Execute the run to completion or the first failure.
    ///
    /// # Returns
    /// * `Result<RunReport>` - Summary on normal completion; the first
    ///   directory, probe, or batch failure aborts the run
    pub async fn run(&self) -> Result<RunReport> {
        let start_time = Instant::now();

        // Init: idempotent directory creation, then the one-time snapshot.
        tokio::fs::create_dir_all(&self.job.output_directory)
            .await
            .map_err(|e| ExportError::DirectoryCreation {
                path: self.job.output_directory.clone(),
                message: e.to_string(),
            })?;

        let queries = QueryBuilder::new(&self.job.table, &self.job.community_id);

        let Some(max_id) = self.probe_max_id(&queries).await? else {
            info!("source table holds no records, nothing to export");
            return Ok(RunReport {
                batches_exported: 0,
                max_entity_id: None,
                files: Vec::new(),
                elapsed_ms: start_time.elapsed().as_millis() as u64,
            });
        };

        let total_batches = (max_id + self.job.batch_size - 1) / self.job.batch_size;
        info!(max_id, total_batches, "starting export run");

        let planner = BatchPlanner::new(self.job.batch_size);
        let mut state = ExportState::new(Some(max_id));
        let tracker = ProgressTracker::new(Some(total_batches as u64), self.show_progress);
        let mut files = Vec::new();

        loop {
            if self.job.refresh_max_id {
                if let Some(fresh) = self.probe_max_id(&queries).await? {
                    state.raise_max_id(fresh);
                }
            }

            let Some(range) = planner.next(&state) else {
                break;
            };

            let sequence = state.sequence;
            let query = queries.batch_document(&range);
            let file_name = format!("{}{}.json", self.job.file_prefix, sequence);
            let output_path = self.job.output_directory.join(&file_name);

            // Progress signal before the attempt, carrying the sequence.
            info!(
                sequence,
                start = range.start,
                end = range.end,
                file = %file_name,
                "exporting batch"
            );
            tracker.batch_started(sequence, &file_name);

            let outcome = self.tool.export(&query, &output_path).await?;
            match evaluate(outcome) {
                Evaluation::Success => {
                    debug!(sequence, "batch exported");
                    tracker.batch_finished(sequence);
                    files.push(output_path);
                    state.advance(self.job.batch_size);
                }
                Evaluation::Failure(diagnostic) => {
                    tracker.finish();
                    error!(sequence, %diagnostic, "bulk export failed, halting run");
                    return Err(ExportError::BatchFailed {
                        sequence,
                        diagnostic,
                    }
                    .into());
                }
            }
        }

        tracker.finish();

        let report = RunReport {
            batches_exported: state.sequence - 1,
            max_entity_id: state.max_id,
            files,
            elapsed_ms: start_time.elapsed().as_millis() as u64,
        };
        info!(
            batches = report.batches_exported,
            elapsed_ms = report.elapsed_ms,
            "export run completed"
        );
        Ok(report)
    }

    /// Capture the current maximum entity id, or `None` for an empty table.
    async fn probe_max_id(&self, queries: &QueryBuilder) -> Result<Option<i64>> {
        let outcome = self.tool.query_scalar(&queries.max_entity_id()).await?;
        if outcome.exit_status != 0 {
            return Err(ExportError::MaxIdProbe(FailureDiagnostic {
                exit_status: outcome.exit_status,
                command: outcome.command,
                captured_output: outcome.captured_output,
            })
            .into());
        }

        match parse_scalar_id(&outcome.captured_output) {
            Ok(max_id) => Ok(max_id),
            Err(()) => Err(ExportError::MaxIdProbe(FailureDiagnostic {
                exit_status: outcome.exit_status,
                command: outcome.command,
                captured_output: outcome.captured_output,
            })
            .into()),
        }
    }
}

/// Parse a scalar id from captured probe output.
///
/// The first non-empty line is the value; `NULL` or no output at all means
/// the table is empty.
fn parse_scalar_id(output: &str) -> std::result::Result<Option<i64>, ()> {
    let Some(line) = output.lines().map(str::trim).find(|l| !l.is_empty()) else {
        return Ok(None);
    };
    if line.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    line.parse::<i64>().map(Some).map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MergexError;
    use crate::exporter::invoker::ToolOutcome;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    /// Mock bulk tool recording invocations and writing files like bcp does.
    ///
    /// Clones share state, so a test can keep one handle for assertions and
    /// box the other into the driver.
    #[derive(Clone)]
    struct MockBulkTool {
        /// Scalar probe responses, consumed in order; the last one sticks.
        scalar_responses: Arc<Mutex<Vec<String>>>,
        /// Exports recorded as (query, output path).
        exports: Arc<Mutex<Vec<(String, PathBuf)>>>,
        /// Export invocation (1-based) that should fail, if any.
        fail_on: Option<usize>,
    }

    impl MockBulkTool {
        fn new(max_id: &str) -> Self {
            Self {
                scalar_responses: Arc::new(Mutex::new(vec![max_id.to_string()])),
                exports: Arc::new(Mutex::new(Vec::new())),
                fail_on: None,
            }
        }

        fn failing_on(max_id: &str, invocation: usize) -> Self {
            Self {
                fail_on: Some(invocation),
                ..Self::new(max_id)
            }
        }

        fn exports(&self) -> Vec<(String, PathBuf)> {
            self.exports.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BulkTool for MockBulkTool {
        async fn export(&self, query: &str, output_path: &Path) -> Result<ToolOutcome> {
            let mut exports = self.exports.lock().unwrap();
            exports.push((query.to_string(), output_path.to_path_buf()));
            let invocation = exports.len();

            if self.fail_on == Some(invocation) {
                return Ok(ToolOutcome {
                    exit_status: 1,
                    captured_output: "SQLState = 08001, connection reset".to_string(),
                    command: format!("bcp \"{query}\" queryout {}", output_path.display()),
                });
            }

            std::fs::write(output_path, "{}").unwrap();
            Ok(ToolOutcome {
                exit_status: 0,
                captured_output: "rows copied.".to_string(),
                command: format!("bcp \"{query}\" queryout {}", output_path.display()),
            })
        }

        async fn query_scalar(&self, query: &str) -> Result<ToolOutcome> {
            let mut responses = self.scalar_responses.lock().unwrap();
            let value = if responses.len() > 1 {
                responses.remove(0)
            } else {
                responses[0].clone()
            };
            Ok(ToolOutcome {
                exit_status: 0,
                captured_output: value,
                command: format!("sqlcmd -Q \"{query}\""),
            })
        }
    }

    fn job(dir: &Path, batch_size: i64) -> JobConfig {
        JobConfig {
            table: "PostScript_AllianceMerge".to_string(),
            community_id: "LosAngeles".to_string(),
            output_directory: dir.to_path_buf(),
            file_prefix: "Export".to_string(),
            batch_size,
            refresh_max_id: false,
        }
    }

    #[tokio::test]
    async fn test_empty_source_completes_without_invocations() {
        // Scenario A: no records → zero batches, zero files.
        let dir = tempfile::tempdir().unwrap();
        let tool = MockBulkTool::new("NULL");
        let driver = ExportDriver::new(Box::new(tool.clone()), job(dir.path(), 2500), false);

        let report = driver.run().await.unwrap();
        assert_eq!(report.batches_exported, 0);
        assert_eq!(report.max_entity_id, None);
        assert!(report.files.is_empty());
        assert!(tool.exports().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_three_batches_in_order() {
        // Scenario B: maxId 6000, batch 2500 → Export1..3.json.
        let dir = tempfile::tempdir().unwrap();
        let tool = MockBulkTool::new("6000");
        let driver = ExportDriver::new(Box::new(tool.clone()), job(dir.path(), 2500), false);

        let report = driver.run().await.unwrap();
        assert_eq!(report.batches_exported, 3);
        assert_eq!(report.max_entity_id, Some(6000));

        let exports = tool.exports();
        assert_eq!(exports.len(), 3);
        assert!(exports[0].0.contains("BETWEEN 1 AND 2500"));
        assert!(exports[1].0.contains("BETWEEN 2501 AND 5000"));
        assert!(exports[2].0.contains("BETWEEN 5001 AND 7500"));

        for n in 1..=3 {
            let path = dir.path().join(format!("Export{n}.json"));
            assert!(path.exists(), "missing {}", path.display());
            assert_eq!(exports[n - 1].1, path);
        }
        assert_eq!(report.files.len(), 3);
    }

    #[tokio::test]
    async fn test_failure_halts_run_and_preserves_prior_files() {
        // Scenario C: batch 2 fails → Export1.json exists, 2 and 3 absent.
        let dir = tempfile::tempdir().unwrap();
        let tool = MockBulkTool::failing_on("6000", 2);
        let driver = ExportDriver::new(Box::new(tool.clone()), job(dir.path(), 2500), false);

        let err = driver.run().await.unwrap_err();
        let MergexError::Export(ExportError::BatchFailed {
            sequence,
            diagnostic,
        }) = err
        else {
            panic!("expected BatchFailed, got {err}");
        };
        assert_eq!(sequence, 2);
        assert!(diagnostic.captured_output.contains("SQLState = 08001"));
        assert!(diagnostic.command.contains("BETWEEN 2501 AND 5000"));

        assert_eq!(tool.exports().len(), 2);
        assert!(dir.path().join("Export1.json").exists());
        assert!(!dir.path().join("Export2.json").exists());
        assert!(!dir.path().join("Export3.json").exists());
    }

    #[tokio::test]
    async fn test_invocation_count_is_ceiling_of_batches() {
        for (max_id, batch_size, expected) in [("2500", 2500, 1u32), ("2501", 2500, 2)] {
            let dir = tempfile::tempdir().unwrap();
            let tool = Box::new(MockBulkTool::new(max_id));
            let driver = ExportDriver::new(tool, job(dir.path(), batch_size), false);
            let report = driver.run().await.unwrap();
            assert_eq!(report.batches_exported, expected);
        }
    }

    #[tokio::test]
    async fn test_creates_nested_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let tool = Box::new(MockBulkTool::new("10"));
        let driver = ExportDriver::new(tool, job(&nested, 2500), false);

        driver.run().await.unwrap();
        assert!(nested.join("Export1.json").exists());
    }

    #[tokio::test]
    async fn test_probe_failure_aborts_before_any_batch() {
        struct FailingProbe;

        #[async_trait]
        impl BulkTool for FailingProbe {
            async fn export(&self, _query: &str, _path: &Path) -> Result<ToolOutcome> {
                panic!("no batch may run when the probe fails");
            }

            async fn query_scalar(&self, _query: &str) -> Result<ToolOutcome> {
                Ok(ToolOutcome {
                    exit_status: 4,
                    captured_output: "Login failed for user".to_string(),
                    command: "sqlcmd -Q ...".to_string(),
                })
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let driver = ExportDriver::new(Box::new(FailingProbe), job(dir.path(), 2500), false);
        let err = driver.run().await.unwrap_err();
        assert!(matches!(
            err,
            MergexError::Export(ExportError::MaxIdProbe(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_extends_run_when_maximum_grows() {
        let dir = tempfile::tempdir().unwrap();
        // Init snapshot 2500, later probes see 5000.
        let tool = MockBulkTool::new("2500");
        tool.scalar_responses.lock().unwrap().push("5000".to_string());
        let mut config = job(dir.path(), 2500);
        config.refresh_max_id = true;
        let driver = ExportDriver::new(Box::new(tool.clone()), config, false);

        let report = driver.run().await.unwrap();
        assert_eq!(report.batches_exported, 2);
        assert_eq!(report.max_entity_id, Some(5000));
    }

    #[test]
    fn test_parse_scalar_id() {
        assert_eq!(parse_scalar_id("6000"), Ok(Some(6000)));
        assert_eq!(parse_scalar_id("\n  42  \n"), Ok(Some(42)));
        assert_eq!(parse_scalar_id("NULL"), Ok(None));
        assert_eq!(parse_scalar_id("null"), Ok(None));
        assert_eq!(parse_scalar_id(""), Ok(None));
        assert_eq!(parse_scalar_id("   \n  "), Ok(None));
        assert_eq!(parse_scalar_id("not a number"), Err(()));
    }
}
