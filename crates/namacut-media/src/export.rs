//! Export process manager.
//!
//! Owns at most one encoder process at a time. The process writes to a
//! sibling temp file; a monitor task parses its diagnostic stream into
//! progress events and either commits the temp file with an atomic rename or
//! discards it on failure and abort.
//!
//! Events for one job arrive in order on the job's channel: `Started`, zero
//! or more non-decreasing `Progress`, then exactly one `Completed`.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;

use namacut_models::{
    validate_range, Completion, CompletionReason, ExportEvent, JobId, JobState, TimeRange,
};

use crate::codec::CodecSpec;
use crate::command::build_export_command;
use crate::config::ExportConfig;
use crate::error::{MediaError, MediaResult};
use crate::filters::FilterChain;
use crate::fs_utils::{commit_atomic, remove_debris, remove_if_exists, temp_output_path};
use crate::logging::JobLogger;
use crate::plan::ExportPlan;
use crate::progress::{split_segments, ProgressTracker};

const READ_CHUNK_BYTES: usize = 4096;

/// Parameters of one export.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub start_secs: f64,
    pub end_secs: f64,
    pub filter_chain: Option<FilterChain>,
    pub codec: CodecSpec,
    /// Probed source duration; the range is checked against it when known.
    pub source_duration: Option<f64>,
}

impl ExportRequest {
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        start_secs: f64,
        end_secs: f64,
        filter_chain: Option<FilterChain>,
        codec: CodecSpec,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            start_secs,
            end_secs,
            filter_chain,
            codec,
            source_duration: None,
        }
    }

    /// Request carrying a plan's filter chain and codec arguments.
    pub fn from_plan(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        start_secs: f64,
        end_secs: f64,
        plan: &ExportPlan,
    ) -> Self {
        Self::new(
            input,
            output,
            start_secs,
            end_secs,
            plan.filter_chain.clone(),
            plan.codec.clone(),
        )
    }

    pub fn with_source_duration(mut self, duration: f64) -> Self {
        self.source_duration = Some(duration);
        self
    }
}

/// The single job slot guarded by the manager's mutex.
#[derive(Debug, Default)]
struct Slot {
    state: JobState,
    job_id: Option<JobId>,
    cancel: Option<watch::Sender<bool>>,
    /// Set once the monitor has settled the outcome; aborts are refused
    /// from then on.
    settled: bool,
}

/// Handle to a started export.
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    output: PathBuf,
    temp_output: PathBuf,
    events: mpsc::UnboundedReceiver<ExportEvent>,
    task: JoinHandle<Completion>,
}

impl JobHandle {
    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    pub fn temp_output_path(&self) -> &Path {
        &self.temp_output
    }

    /// Next event; `None` once `Completed` has been delivered and the
    /// monitor has exited.
    pub async fn recv(&mut self) -> Option<ExportEvent> {
        self.events.recv().await
    }

    /// Wait for the job to finish, discarding any undelivered events.
    pub async fn wait(self) -> MediaResult<Completion> {
        self.task
            .await
            .map_err(|e| MediaError::Io(std::io::Error::other(e)))
    }
}

/// Map a completion onto the error taxonomy: failures become
/// [`MediaError::ProcessFailure`] and aborts [`MediaError::Aborted`].
pub fn completion_result(completion: Completion) -> MediaResult<Completion> {
    match completion.reason {
        CompletionReason::Success => Ok(completion),
        CompletionReason::Aborted => Err(MediaError::Aborted),
        CompletionReason::Failed => Err(MediaError::process_failure(
            completion.exit_code,
            completion.diagnostics,
        )),
    }
}

/// Supervisor for one export at a time.
///
/// Cheap to clone; clones share the same slot, so `abort()` may be called
/// from any clone while another awaits events.
#[derive(Debug, Clone)]
pub struct ExportManager {
    config: Arc<ExportConfig>,
    slot: Arc<Mutex<Slot>>,
}

impl Default for ExportManager {
    fn default() -> Self {
        Self::new(ExportConfig::default())
    }
}

impl ExportManager {
    pub fn new(config: ExportConfig) -> Self {
        Self {
            config: Arc::new(config),
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn state(&self) -> JobState {
        lock_slot(&self.slot).state
    }

    /// ID of the job currently owning the slot, if one is active.
    pub fn current_job(&self) -> Option<JobId> {
        let slot = lock_slot(&self.slot);
        if slot.state.is_active() {
            slot.job_id.clone()
        } else {
            None
        }
    }

    /// Start an export. Must be called from within a Tokio runtime.
    ///
    /// Rejected without spawning anything when the input is missing, the
    /// range is invalid, a filter chain is paired with a stream copy, or
    /// another job is running or aborting.
    pub fn start(&self, request: ExportRequest) -> MediaResult<JobHandle> {
        if !request.input.is_file() {
            return Err(MediaError::input_error(&request.input, "file not found"));
        }
        if request.input == request.output {
            return Err(MediaError::unsupported("output path is the input path"));
        }
        let range = validate_range(request.start_secs, request.end_secs, request.source_duration)?;

        let mut slot = lock_slot(&self.slot);
        if slot.state.is_active() {
            return Err(MediaError::AlreadyInProgress);
        }

        let temp_output = temp_output_path(&request.output, &self.config.temp_marker);
        let command = build_export_command(
            &request.input,
            &temp_output,
            range,
            request.filter_chain.as_ref(),
            &request.codec,
        )?;
        let args = command.build_args();

        let job_id = JobId::new();
        let logger = JobLogger::new(&job_id, "export");

        let mut child = Command::new(&self.config.ffmpeg_program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => MediaError::FfmpegNotFound,
                _ => MediaError::Io(e),
            })?;
        let stderr = child.stderr.take();

        logger.log_start(&format!(
            "{} -> {} [{}]",
            request.input.display(),
            request.output.display(),
            if request.codec.is_stream_copy() {
                "stream copy"
            } else {
                "re-encode"
            }
        ));
        tracing::debug!(job_id = %job_id, "{} {}", self.config.ffmpeg_program, args.join(" "));

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        slot.state = JobState::Running;
        slot.job_id = Some(job_id.clone());
        slot.cancel = Some(cancel_tx);
        slot.settled = false;
        drop(slot);

        let _ = events_tx.send(ExportEvent::Started {
            job_id: job_id.clone(),
            output_path: request.output.clone(),
            started_at: Utc::now(),
        });

        let monitor = Monitor {
            job_id: job_id.clone(),
            output: request.output.clone(),
            temp_output: temp_output.clone(),
            range,
            config: Arc::clone(&self.config),
            slot: Arc::clone(&self.slot),
            events: events_tx,
            logger: logger.clone(),
        };
        let task = tokio::spawn(
            monitor
                .run(child, stderr, cancel_rx)
                .instrument(logger.create_span()),
        );

        Ok(JobHandle {
            id: job_id,
            output: request.output,
            temp_output,
            events: events_rx,
            task,
        })
    }

    /// Request cancellation of the running job.
    ///
    /// Returns `false` when nothing was running, including a job already
    /// aborting or one whose encoder has exited and whose output is being
    /// committed or discarded.
    pub fn abort(&self) -> bool {
        let mut slot = lock_slot(&self.slot);
        if slot.state != JobState::Running || slot.settled {
            return false;
        }
        slot.state = JobState::Aborting;
        if let Some(cancel) = &slot.cancel {
            let _ = cancel.send(true);
        }
        if let Some(job_id) = &slot.job_id {
            JobLogger::new(job_id, "abort").log_start("termination requested");
        }
        true
    }
}

fn lock_slot(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    // A panic while holding the lock leaves the slot data intact
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Resolves once cancellation has been requested.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// How the encoder run ended, before commit.
enum Outcome {
    Exited(ExitStatus),
    AbortRequested,
}

struct Monitor {
    job_id: JobId,
    output: PathBuf,
    temp_output: PathBuf,
    range: TimeRange,
    config: Arc<ExportConfig>,
    slot: Arc<Mutex<Slot>>,
    events: mpsc::UnboundedSender<ExportEvent>,
    logger: JobLogger,
}

impl Monitor {
    async fn run(
        self,
        mut child: Child,
        stderr: Option<ChildStderr>,
        mut cancel: watch::Receiver<bool>,
    ) -> Completion {
        let mut tracker = ProgressTracker::new(self.range.duration(), self.config.diagnostic_lines);

        let outcome = self
            .supervise(&mut child, stderr, &mut cancel, &mut tracker)
            .await;

        let completion = match outcome {
            Ok(Outcome::AbortRequested) => self.abort(&mut child).await,
            Ok(Outcome::Exited(status)) if !self.settle() => {
                tracing::debug!(?status, "Encoder exited after abort request");
                self.discard_aborted().await
            }
            Ok(Outcome::Exited(status)) if status.success() => self.commit(&tracker).await,
            Ok(Outcome::Exited(status)) => {
                self.fail(status.code(), tracker.diagnostics()).await
            }
            Err(e) => {
                self.logger.log_error(&format!("monitor error: {}", e));
                let _ = child.start_kill();
                let _ = tokio::time::timeout(self.config.kill_grace, child.wait()).await;
                if self.settle() {
                    let mut diagnostics = tracker.diagnostics();
                    diagnostics.push(e.to_string());
                    self.fail(None, diagnostics).await
                } else {
                    self.discard_aborted().await
                }
            }
        };

        self.finish(completion)
    }

    /// Pump diagnostics until the stream closes, then wait for exit; an
    /// abort request interrupts either phase.
    async fn supervise(
        &self,
        child: &mut Child,
        stderr: Option<ChildStderr>,
        cancel: &mut watch::Receiver<bool>,
        tracker: &mut ProgressTracker,
    ) -> std::io::Result<Outcome> {
        if let Some(mut stderr) = stderr {
            let mut buf = vec![0u8; READ_CHUNK_BYTES];
            let mut pending: Vec<u8> = Vec::new();

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled(cancel) => return Ok(Outcome::AbortRequested),
                    read = stderr.read(&mut buf) => {
                        let n = read?;
                        if n == 0 {
                            self.consume(&pending, tracker);
                            break;
                        }
                        pending.extend_from_slice(&buf[..n]);
                        if let Some(last) = pending.iter().rposition(|b| *b == b'\r' || *b == b'\n') {
                            let complete: Vec<u8> = pending.drain(..=last).collect();
                            self.consume(&complete, tracker);
                        }
                    }
                }
            }
        }

        tokio::select! {
            biased;
            _ = cancelled(cancel) => Ok(Outcome::AbortRequested),
            status = child.wait() => Ok(Outcome::Exited(status?)),
        }
    }

    fn consume(&self, bytes: &[u8], tracker: &mut ProgressTracker) {
        let text = String::from_utf8_lossy(bytes);
        for line in split_segments(&text) {
            if let Some(fraction) = tracker.feed_line(line) {
                self.logger.log_progress(fraction);
                let _ = self.events.send(ExportEvent::Progress {
                    job_id: self.job_id.clone(),
                    fraction,
                });
            }
        }
    }

    /// Claim the outcome for commit or failure handling.
    ///
    /// Returns `false` when an abort got there first. Once this returns
    /// `true`, `abort()` is refused, so the output is never renamed into
    /// place after an abort was acknowledged.
    fn settle(&self) -> bool {
        let mut slot = lock_slot(&self.slot);
        if slot.state != JobState::Running {
            return false;
        }
        slot.settled = true;
        true
    }

    /// SIGTERM, then a kill after the grace period.
    async fn abort(&self, child: &mut Child) -> Completion {
        request_termination(child);

        match tokio::time::timeout(self.config.terminate_grace, child.wait()).await {
            Ok(status) => tracing::debug!(?status, "Encoder terminated"),
            Err(_) => {
                self.logger
                    .log_warning("encoder ignored termination request; killing");
                if let Err(e) = child.start_kill() {
                    tracing::debug!("Kill failed: {}", e);
                }
                if tokio::time::timeout(self.config.kill_grace, child.wait())
                    .await
                    .is_err()
                {
                    self.logger.log_warning("encoder not reaped after kill");
                }
            }
        }

        self.discard_aborted().await
    }

    async fn discard_aborted(&self) -> Completion {
        remove_if_exists(&self.temp_output).await;
        Completion::aborted(self.job_id.clone(), self.output.clone())
    }

    async fn commit(&self, tracker: &ProgressTracker) -> Completion {
        match commit_atomic(&self.temp_output, &self.output).await {
            Ok(()) => {
                tracing::debug!(progress = tracker.percentage(), "Committed output");
                Completion::succeeded(self.job_id.clone(), self.output.clone())
            }
            Err(e) => {
                self.logger.log_warning(&format!("commit failed: {}", e));
                remove_if_exists(&self.temp_output).await;
                let mut diagnostics = tracker.diagnostics();
                diagnostics.push(format!("failed to move output into place: {}", e));
                Completion::failed(self.job_id.clone(), self.output.clone(), Some(0), diagnostics)
            }
        }
    }

    async fn fail(&self, exit_code: Option<i32>, diagnostics: Vec<String>) -> Completion {
        remove_if_exists(&self.temp_output).await;
        remove_debris(&self.output, self.config.min_output_bytes).await;
        Completion::failed(self.job_id.clone(), self.output.clone(), exit_code, diagnostics)
    }

    /// Release the slot, then deliver the single `Completed` event.
    fn finish(self, completion: Completion) -> Completion {
        {
            let mut slot = lock_slot(&self.slot);
            slot.state = completion.final_state();
            slot.cancel = None;
            slot.settled = false;
        }
        self.logger.log_completion(&completion);
        let _ = self.events.send(ExportEvent::Completed(completion.clone()));
        completion
    }
}

#[cfg(unix)]
fn request_termination(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    match child.id() {
        Some(pid) => {
            if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                tracing::debug!("SIGTERM failed: {}", e);
            }
        }
        None => tracing::debug!("Encoder already reaped"),
    }
}

#[cfg(not(unix))]
fn request_termination(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        tracing::debug!("Terminate failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::select_codec_parameters;
    use namacut_models::{QualityMode, VideoCodec};
    use tempfile::TempDir;

    fn copy_spec() -> CodecSpec {
        select_codec_parameters("original", VideoCodec::H264, QualityMode::Auto).unwrap()
    }

    #[tokio::test]
    async fn test_start_rejects_missing_input() {
        let dir = TempDir::new().unwrap();
        let manager = ExportManager::default();
        let request = ExportRequest::new(
            dir.path().join("missing.mp4"),
            dir.path().join("out.mp4"),
            0.0,
            1.0,
            None,
            copy_spec(),
        );

        let err = manager.start(request).unwrap_err();
        assert!(matches!(err, MediaError::InputError { .. }));
        assert_eq!(manager.state(), JobState::Idle);
    }

    #[tokio::test]
    async fn test_start_rejects_bad_range() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.mp4");
        std::fs::write(&input, b"x").unwrap();
        let manager = ExportManager::default();

        let backwards = ExportRequest::new(&input, dir.path().join("a.mp4"), 5.0, 2.0, None, copy_spec());
        assert!(matches!(
            manager.start(backwards).unwrap_err(),
            MediaError::InvalidTimeRange(_)
        ));

        let too_long = ExportRequest::new(&input, dir.path().join("a.mp4"), 0.0, 12.0, None, copy_spec())
            .with_source_duration(10.0);
        assert!(manager.start(too_long).unwrap_err().is_rejected_before_spawn());
        assert_eq!(manager.state(), JobState::Idle);
    }

    #[tokio::test]
    async fn test_start_rejects_output_equal_to_input() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.mp4");
        std::fs::write(&input, b"x").unwrap();

        let err = ExportManager::default()
            .start(ExportRequest::new(&input, &input, 0.0, 1.0, None, copy_spec()))
            .unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedCombination(_)));
    }

    #[tokio::test]
    async fn test_missing_encoder_reported() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.mp4");
        std::fs::write(&input, b"x").unwrap();
        let manager = ExportManager::new(
            ExportConfig::default().with_ffmpeg("/nonexistent/namacut-ffmpeg"),
        );

        let err = manager
            .start(ExportRequest::new(&input, dir.path().join("out.mp4"), 0.0, 1.0, None, copy_spec()))
            .unwrap_err();
        assert!(matches!(err, MediaError::FfmpegNotFound));
        assert_eq!(manager.state(), JobState::Idle);
    }

    #[test]
    fn test_completion_result_maps_outcomes() {
        let id = JobId::new();
        let ok = Completion::succeeded(id.clone(), "out.mp4".into());
        assert_eq!(completion_result(ok.clone()).unwrap(), ok);

        let aborted = completion_result(Completion::aborted(id.clone(), "out.mp4".into()));
        assert!(aborted.unwrap_err().is_user_abort());

        let failed = Completion::failed(id, "out.mp4".into(), Some(1), vec!["boom".into()]);
        match completion_result(failed) {
            Err(MediaError::ProcessFailure {
                exit_code,
                diagnostics,
            }) => {
                assert_eq!(exit_code, Some(1));
                assert_eq!(diagnostics, vec!["boom".to_string()]);
            }
            other => panic!("expected ProcessFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_abort_refused_once_settled() {
        let manager = ExportManager::default();
        let (cancel, _rx) = watch::channel(false);
        {
            let mut slot = lock_slot(&manager.slot);
            slot.state = JobState::Running;
            slot.job_id = Some(JobId::new());
            slot.cancel = Some(cancel);
            slot.settled = true;
        }

        assert!(!manager.abort());
        assert_eq!(manager.state(), JobState::Running);
    }

    #[test]
    fn test_abort_when_idle_is_noop() {
        let manager = ExportManager::default();
        assert!(!manager.abort());
        assert_eq!(manager.state(), JobState::Idle);
        assert!(manager.current_job().is_none());
    }
}
