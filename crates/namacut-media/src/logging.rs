//! Structured export job logging.
//!
//! Every line carries the job ID and operation so concurrent log output from
//! the UI and the export monitor can be told apart.

use tracing::{debug, error, info, warn, Span};

use namacut_models::{Completion, CompletionReason, JobId};

/// Job logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
}

impl JobLogger {
    /// Create a new job logger for a specific job and operation
    /// (e.g. `"export"`, `"abort"`).
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Log the start of a job operation.
    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    /// Progress is chatty; kept at debug level.
    pub fn log_progress(&self, fraction: f64) {
        debug!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job progress: {:.1}%", fraction * 100.0
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job error: {}", message
        );
    }

    /// Log a job's completion at the level its outcome deserves.
    ///
    /// Aborts are user intent and are logged at info, not as errors.
    pub fn log_completion(&self, completion: &Completion) {
        let output = completion.output_path.display();
        match completion.reason {
            CompletionReason::Success => info!(
                job_id = %self.job_id,
                operation = %self.operation,
                "Job completed: {}", output
            ),
            CompletionReason::Aborted => info!(
                job_id = %self.job_id,
                operation = %self.operation,
                "Job aborted: {}", output
            ),
            CompletionReason::Failed => error!(
                job_id = %self.job_id,
                operation = %self.operation,
                exit_code = ?completion.exit_code,
                "Job failed: {} ({})", output, completion.diagnostics.join(" | ")
            ),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Create a tracing span for this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}
