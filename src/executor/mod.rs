//! Trial orchestration
//!
//! A [`TestSession`] owns the accumulated samples of one BER run. Each trial
//! generates a payload, hands the blocking write/poll-read exchange to the
//! [`WorkerPool`] and folds the resulting [`LoopbackSample`] into the
//! session. Only one run is in flight per session at a time; the running
//! flag is observable from other tasks through a [`ProgressHandle`].

pub mod pool;

pub use pool::{SystemResources, WorkerPool};

use crate::{
    defaults::LOOP_CHECK_PAYLOAD,
    error::{AppError, Result},
    logging::TrialLogger,
    models::{Config, LoopbackSample},
    pattern::PatternGenerator,
    stats,
    transport::{self, SharedPort},
    types::{FrameMode, FrameStructure, PatternKind},
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Pause after a skipped trial failure so a dead link does not spin the loop
const FAILED_TRIAL_BACKOFF: Duration = Duration::from_millis(100);

/// What a timed run does when a single trial fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrialErrorPolicy {
    /// Stop the run and return the error
    Abort,
    /// Count recoverable failures and keep going. Non-recoverable errors
    /// still abort.
    #[default]
    Skip,
}

/// Outcome of a loop check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopStatus {
    /// The payload came back unchanged
    Succeeded,
    /// Nothing, or only part of the payload, came back in time
    TimedOut,
    /// Something came back that is not the payload
    Mismatched,
}

impl LoopStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, LoopStatus::Succeeded)
    }

    pub fn describe(&self) -> &'static str {
        match self {
            LoopStatus::Succeeded => "loop check succeeded",
            LoopStatus::TimedOut => "loop check failed: timeout",
            LoopStatus::Mismatched => "loop check failed: data mismatch",
        }
    }
}

#[derive(Debug, Default)]
struct ProgressState {
    running: AtomicBool,
    /// (progress, due_time)
    timing: Mutex<(f64, f64)>,
}

/// Cloneable view of a session's run state
#[derive(Debug, Clone, Default)]
pub struct ProgressHandle {
    state: Arc<ProgressState>,
}

impl ProgressHandle {
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    /// Fraction of the timed run elapsed. May exceed 1.0 after the last trial.
    pub fn progress(&self) -> f64 {
        self.timing().0
    }

    /// Seconds left in the timed run, rounded to one decimal. May be negative
    /// after the last trial.
    pub fn due_time(&self) -> f64 {
        self.timing().1
    }

    fn timing(&self) -> (f64, f64) {
        *self.state.timing.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_timing(&self, progress: f64, due_time: f64) {
        *self.state.timing.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = (progress, due_time);
    }

    /// Mark the session running until the returned guard is dropped
    fn start(&self) -> Result<RunningGuard> {
        self.state.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| AppError::test_execution("A run is already in progress on this session"))?;
        Ok(RunningGuard { handle: self.clone() })
    }
}

/// Clears the running flag on every exit path of a run
struct RunningGuard {
    handle: ProgressHandle,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.handle.state.running.store(false, Ordering::SeqCst);
    }
}

/// Per-run trial parameters derived from the configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialPlan {
    /// Fixed payload length, or `None` to draw one per trial
    pub frame_length: Option<usize>,
    pub min_length: usize,
    pub max_length: usize,
    /// Echo deadline for each trial
    pub data_timeout: Duration,
    pub duration: Duration,
}

impl TrialPlan {
    pub fn from_config(config: &Config) -> Self {
        let frame_length = match config.frame_mode {
            FrameMode::Fixed => Some(config.max_frame_length),
            FrameMode::Random => None,
        };

        Self {
            frame_length,
            min_length: config.frame_min_limit,
            max_length: config.max_frame_length,
            data_timeout: config.data_timeout(),
            duration: config.test_duration(),
        }
    }
}

/// Accumulated loopback trials over one transport
pub struct TestSession {
    port: SharedPort,
    frame: FrameStructure,
    pool: WorkerPool,
    generator: PatternGenerator,
    samples: Vec<LoopbackSample>,
    estimated_baudrate: Option<u32>,
    progress: ProgressHandle,
    failed_trials: usize,
    error_policy: TrialErrorPolicy,
    logger: Option<TrialLogger>,
}

impl TestSession {
    /// Session over `port` with the default pool, cyclic payloads and no
    /// logging. The caller keeps ownership of closing the port.
    pub fn new(port: SharedPort, frame: FrameStructure) -> Self {
        Self {
            port,
            frame,
            pool: WorkerPool::detect(),
            generator: PatternGenerator::default(),
            samples: Vec::new(),
            estimated_baudrate: None,
            progress: ProgressHandle::default(),
            failed_trials: 0,
            error_policy: TrialErrorPolicy::default(),
            logger: None,
        }
    }

    pub fn with_pool(mut self, pool: WorkerPool) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_pattern(mut self, kind: PatternKind) -> Self {
        let (min, max) = self.generator.bounds();
        self.generator = PatternGenerator::new(kind).with_bounds(min, max);
        self
    }

    pub fn with_error_policy(mut self, policy: TrialErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn with_logger(mut self, logger: TrialLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Run a single trial. Prior samples are discarded; on success the
    /// returned list holds exactly the new sample. Transport failures
    /// propagate and record nothing.
    pub async fn run_once(&mut self, frame_length: Option<usize>, timeout: Duration) -> Result<&[LoopbackSample]> {
        let _running = self.progress.start()?;
        self.clear_run_state();

        let run = self.begin_run("single trial").await;
        let generator = self.generator;
        let result = self.trial(&generator, frame_length, timeout).await;
        self.end_run(run, "single trial", result.is_ok()).await;
        result?;
        self.progress.set_timing(1.0, 0.0);

        Ok(&self.samples)
    }

    /// Repeat trials back to back while the elapsed time is within
    /// `duration`. The deadline is only checked between trials, so the last
    /// trial can finish past it.
    pub async fn run_for(
        &mut self,
        duration: Duration,
        frame_length: Option<usize>,
        timeout: Duration,
        min_length: Option<usize>,
        max_length: Option<usize>,
    ) -> Result<&[LoopbackSample]> {
        let _running = self.progress.start()?;
        self.clear_run_state();

        let (default_min, default_max) = self.generator.bounds();
        let generator = self.generator
            .with_bounds(min_length.unwrap_or(default_min), max_length.unwrap_or(default_max));

        let run = self.begin_run("timed run").await;
        let start = Instant::now();
        let result = self.repeat_trials(&generator, duration, frame_length, timeout).await;
        self.end_run(run, "timed run", result.is_ok()).await;
        result?;

        if let Some(logger) = &self.logger {
            logger.log_run_summary(self.counter(), self.failed_trials, start.elapsed(), self.bit_error_rate()).await;
        }

        Ok(&self.samples)
    }

    async fn repeat_trials(
        &mut self,
        generator: &PatternGenerator,
        duration: Duration,
        frame_length: Option<usize>,
        timeout: Duration,
    ) -> Result<()> {
        let total = duration.as_secs_f64();
        let start = Instant::now();

        while start.elapsed() <= duration {
            if let Err(error) = self.trial(generator, frame_length, timeout).await {
                let skip = self.error_policy == TrialErrorPolicy::Skip && error.is_recoverable();
                if let Some(logger) = &self.logger {
                    logger.log_trial_failure(self.counter() + self.failed_trials + 1, &error, skip).await;
                }
                if !skip {
                    return Err(error);
                }
                self.failed_trials += 1;
                tokio::time::sleep(FAILED_TRIAL_BACKOFF).await;
            }

            let elapsed = start.elapsed().as_secs_f64();
            let progress = if total > 0.0 { elapsed / total } else { 1.0 };
            let due_time = ((total - elapsed) * 10.0).round() / 10.0;
            self.progress.set_timing(progress, due_time);
        }
        Ok(())
    }

    async fn begin_run(&self, mode: &str) -> Option<String> {
        match &self.logger {
            Some(logger) => Some(logger.begin_run(mode).await),
            None => None,
        }
    }

    async fn end_run(&self, run: Option<String>, mode: &str, success: bool) {
        if let (Some(logger), Some(id)) = (&self.logger, run) {
            logger.end_run(&id, mode, success).await;
        }
    }

    /// Echo the fixed loop-check payload once. Records no sample.
    pub async fn loop_check(&mut self, timeout: Duration) -> Result<LoopStatus> {
        let _running = self.progress.start()?;

        let port = Arc::clone(&self.port);
        let exchange = self.pool.run(move || {
            let mut guard = transport::lock(&port)?;
            let exchange = transport::echo_exchange(&mut **guard, LOOP_CHECK_PAYLOAD, timeout)?;
            Ok(exchange)
        }).await?;

        let status = if exchange.is_complete() {
            LoopStatus::Succeeded
        } else if LOOP_CHECK_PAYLOAD.starts_with(&exchange.received) {
            LoopStatus::TimedOut
        } else {
            LoopStatus::Mismatched
        };

        if let Some(logger) = &self.logger {
            logger.log_loop_check(exchange.received.len(), LOOP_CHECK_PAYLOAD.len(), status.describe()).await;
        }
        Ok(status)
    }

    async fn trial(&mut self, generator: &PatternGenerator, frame_length: Option<usize>, timeout: Duration) -> Result<()> {
        let data = generator.generate(frame_length);
        let port = Arc::clone(&self.port);
        let frame = self.frame;

        let sample = self.pool.run(move || {
            let mut guard = transport::lock(&port)?;
            let exchange = transport::echo_exchange(&mut **guard, &data, timeout)?;
            Ok(LoopbackSample::new(exchange.sent, exchange.received, exchange.elapsed, frame))
        }).await?;

        if let Some(logger) = &self.logger {
            let trial = self.counter() + self.failed_trials + 1;
            if sample.is_length_mismatch() {
                logger.log_length_mismatch(trial, sample.sent().len(), sample.received().len()).await;
            }
            logger.log_trial(trial, &sample).await;
        }

        if let Some(baudrate) = self.process(sample) {
            if let Some(logger) = &self.logger {
                logger.log_baudrate_estimate(self.avg_data_rate(), baudrate).await;
            }
        }
        Ok(())
    }

    /// Append a sample. The first time the average data rate becomes
    /// positive the baud rate is estimated and cached for the rest of the
    /// session; returns the estimate when it was made by this call.
    pub fn process(&mut self, sample: LoopbackSample) -> Option<u32> {
        self.samples.push(sample);

        if self.estimated_baudrate.is_some() {
            return None;
        }
        let data_rate = self.avg_data_rate();
        if data_rate > 0.0 {
            self.estimated_baudrate = stats::estimate_baudrate(data_rate, self.frame.frame_size());
            return self.estimated_baudrate;
        }
        None
    }

    /// Drop all samples and run progress. The cached baud estimate is kept.
    pub fn reset(&mut self) {
        self.clear_run_state();
    }

    fn clear_run_state(&mut self) {
        self.samples.clear();
        self.failed_trials = 0;
        self.progress.set_timing(0.0, 0.0);
    }

    pub fn samples(&self) -> &[LoopbackSample] {
        &self.samples
    }

    /// Completed trials in the current run
    pub fn counter(&self) -> usize {
        self.samples.len()
    }

    /// Trials skipped after a recoverable failure in the current run
    pub fn failed_trials(&self) -> usize {
        self.failed_trials
    }

    pub fn frame_structure(&self) -> FrameStructure {
        self.frame
    }

    pub fn port(&self) -> &SharedPort {
        &self.port
    }

    pub fn is_running(&self) -> bool {
        self.progress.is_running()
    }

    pub fn progress(&self) -> f64 {
        self.progress.progress()
    }

    pub fn due_time(&self) -> f64 {
        self.progress.due_time()
    }

    pub fn progress_handle(&self) -> ProgressHandle {
        self.progress.clone()
    }

    pub fn estimated_baudrate(&self) -> Option<u32> {
        self.estimated_baudrate
    }

    pub fn total_frames_transmitted(&self) -> usize {
        self.samples.iter().map(LoopbackSample::total_frames).sum()
    }

    /// Bytes echoed back, whether or not they were correct
    pub fn total_frames_received(&self) -> usize {
        self.samples.iter().map(|s| s.received().len()).sum()
    }

    /// Transmitted minus received. Negative when the link echoed extra bytes.
    pub fn total_frames_lost(&self) -> i64 {
        self.total_frames_transmitted() as i64 - self.total_frames_received() as i64
    }

    pub fn total_bits(&self) -> f64 {
        self.samples.iter().map(LoopbackSample::total_bits).sum()
    }

    pub fn total_error_frames(&self) -> usize {
        self.samples.iter().map(LoopbackSample::total_error_frames).sum()
    }

    pub fn total_error_bits(&self) -> f64 {
        self.samples.iter().map(LoopbackSample::total_error_bits).sum()
    }

    pub fn bit_error_rate(&self) -> f64 {
        stats::bit_error_rate(self.total_error_bits(), self.total_bits())
    }

    /// Mean round-trip time per trial in seconds
    pub fn avg_propagation_time(&self) -> f64 {
        self.mean(|s| s.elapsed().as_secs_f64())
    }

    /// Mean of the per-trial data rates in bytes/second
    pub fn avg_data_rate(&self) -> f64 {
        self.mean(LoopbackSample::data_rate)
    }

    pub fn avg_frames_received(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.total_frames_received() as f64 / self.counter() as f64
    }

    /// Round-trip time not spent clocking bits at the estimated baud rate,
    /// in seconds. Zero until a baud rate has been estimated.
    pub fn avg_travel_time(&self) -> f64 {
        match self.estimated_baudrate {
            Some(baudrate) if baudrate > 0 => {
                self.avg_propagation_time()
                    - self.avg_frames_received() / f64::from(baudrate) * self.frame.frame_size()
            }
            _ => 0.0,
        }
    }

    fn mean(&self, metric: impl Fn(&LoopbackSample) -> f64) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().map(metric).sum::<f64>() / self.samples.len() as f64
    }
}

impl std::fmt::Debug for TestSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestSession")
            .field("frame", &self.frame)
            .field("samples", &self.samples.len())
            .field("failed_trials", &self.failed_trials)
            .field("estimated_baudrate", &self.estimated_baudrate)
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::shared;
    use crate::transport::testing::{BrokenPort, EchoPort};
    use tokio_test::assert_ok;

    fn session(port: SharedPort) -> TestSession {
        TestSession::new(port, FrameStructure::default()).with_pool(WorkerPool::new(2))
    }

    fn sample(sent: &[u8], received: &[u8], millis: u64) -> LoopbackSample {
        LoopbackSample::new(sent.to_vec(), received.to_vec(), Duration::from_millis(millis), FrameStructure::default())
    }

    #[tokio::test]
    async fn test_run_once_clean_echo() {
        let mut session = session(shared(EchoPort::new().chunked(7)));
        let samples = assert_ok!(session.run_once(Some(32), Duration::from_secs(1)).await);

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].sent().len(), 32);
        assert!(samples[0].is_clean());
        assert!(!session.is_running());
        assert_eq!(session.progress(), 1.0);
        assert_eq!(session.due_time(), 0.0);
        assert_eq!(session.total_frames_lost(), 0);
    }

    #[tokio::test]
    async fn test_run_once_discards_previous_samples() {
        let mut session = session(shared(EchoPort::new()));
        assert_ok!(session.run_once(Some(4), Duration::from_secs(1)).await);
        assert_ok!(session.run_once(Some(8), Duration::from_secs(1)).await);

        assert_eq!(session.counter(), 1);
        assert_eq!(session.samples()[0].sent().len(), 8);
    }

    #[tokio::test]
    async fn test_running_flag_reset_after_transport_failure() {
        let mut session = session(shared(BrokenPort));
        let handle = session.progress_handle();

        let err = session.run_once(None, Duration::from_millis(50)).await.unwrap_err();
        assert_eq!(err.category(), "TRANSPORT");
        assert!(!session.is_running());
        assert!(!handle.is_running());
        assert!(session.samples().is_empty());
    }

    #[tokio::test]
    async fn test_timed_out_trial_counts_everything_lost() {
        let mut session = session(shared(EchoPort::with_corruption(|_| Vec::new())));
        let samples = assert_ok!(session.run_once(Some(10), Duration::from_millis(20)).await);

        assert!(samples[0].received().is_empty());
        assert_eq!(session.total_frames_lost(), 10);
        assert_eq!(session.total_error_frames(), 10);
        assert_eq!(session.total_error_bits(), 100.0);
        assert_eq!(session.estimated_baudrate(), None);
    }

    #[tokio::test]
    async fn test_run_for_accumulates_until_deadline() {
        let mut session = session(shared(EchoPort::new()));
        let samples = assert_ok!(session
            .run_for(Duration::from_millis(50), None, Duration::from_secs(1), Some(4), Some(16))
            .await);

        assert!(!samples.is_empty());
        assert!(samples.iter().all(|s| (4..=16).contains(&s.sent().len())));
        assert!(session.progress() > 0.5);
        assert!(session.due_time() <= 0.1);
        assert!(!session.is_running());
    }

    #[tokio::test]
    async fn test_run_for_skips_recoverable_failures() {
        let mut session = session(shared(BrokenPort));
        assert_ok!(session.run_for(Duration::from_millis(50), Some(8), Duration::from_millis(10), None, None).await);

        assert_eq!(session.counter(), 0);
        assert!(session.failed_trials() >= 1);
        assert!(!session.is_running());
    }

    #[tokio::test]
    async fn test_run_for_abort_policy_propagates() {
        let mut session = session(shared(BrokenPort)).with_error_policy(TrialErrorPolicy::Abort);
        let result = session.run_for(Duration::from_millis(50), Some(8), Duration::from_millis(10), None, None).await;

        assert!(result.is_err());
        assert!(!session.is_running());
    }

    #[tokio::test]
    async fn test_loop_check_statuses() {
        let mut ok = session(shared(EchoPort::new()));
        assert_eq!(assert_ok!(ok.loop_check(Duration::from_secs(1)).await), LoopStatus::Succeeded);

        let mut silent = session(shared(EchoPort::with_corruption(|_| Vec::new())));
        assert_eq!(assert_ok!(silent.loop_check(Duration::from_millis(20)).await), LoopStatus::TimedOut);

        let mut garbled = session(shared(EchoPort::with_corruption(|_| b"lopo".to_vec())));
        assert_eq!(assert_ok!(garbled.loop_check(Duration::from_millis(20)).await), LoopStatus::Mismatched);
        assert!(garbled.samples().is_empty());
    }

    #[test]
    fn test_aggregates() {
        let mut session = session(shared(EchoPort::new()));
        assert_eq!(session.bit_error_rate(), 0.0);
        assert_eq!(session.avg_propagation_time(), 0.0);
        assert_eq!(session.avg_frames_received(), 0.0);

        session.process(sample(b"AAAA", b"AAAA", 1000));
        session.process(sample(b"AB", b"AC", 500));

        let flipped = f64::from((b'B' ^ b'C').count_ones());
        assert_eq!(session.counter(), 2);
        assert_eq!(session.total_frames_transmitted(), 6);
        assert_eq!(session.total_frames_received(), 6);
        assert_eq!(session.total_bits(), 60.0);
        assert_eq!(session.total_error_frames(), 1);
        assert_eq!(session.total_error_bits(), flipped);
        assert_eq!(session.bit_error_rate(), flipped / 60.0);
        assert!((session.avg_propagation_time() - 0.75).abs() < 1e-9);
        assert!((session.avg_data_rate() - 4.0).abs() < 1e-9);
        assert_eq!(session.avg_frames_received(), 3.0);
    }

    #[test]
    fn test_clean_run_never_reports_zero_ber() {
        let mut session = session(shared(EchoPort::new()));
        session.process(sample(b"AAAA", b"AAAA", 10));
        assert_eq!(session.bit_error_rate(), 1.0 / 41.0);
    }

    #[test]
    fn test_baudrate_estimated_once() {
        let mut session = session(shared(EchoPort::new()));
        assert_eq!(session.avg_travel_time(), 0.0);

        // 500 bytes/s at 10 bits/frame snaps to 9600
        assert_eq!(session.process(sample(&[b'A'; 500], &[b'A'; 500], 1000)), Some(9600));
        assert_eq!(session.estimated_baudrate(), Some(9600));

        // A much faster sample does not move the estimate
        assert_eq!(session.process(sample(&[b'A'; 500], &[b'A'; 500], 10)), None);
        assert_eq!(session.estimated_baudrate(), Some(9600));

        let expected = session.avg_propagation_time() - 500.0 / 9600.0 * 10.0;
        assert!((session.avg_travel_time() - expected).abs() < 1e-12);

        session.reset();
        assert_eq!(session.counter(), 0);
        assert_eq!(session.estimated_baudrate(), Some(9600));
    }

    #[test]
    fn test_empty_echo_does_not_trigger_estimate() {
        let mut session = session(shared(EchoPort::new()));
        assert_eq!(session.process(sample(b"ABCD", b"", 100)), None);
        assert_eq!(session.estimated_baudrate(), None);
        assert_eq!(session.avg_travel_time(), 0.0);
    }

    #[test]
    fn test_trial_plan_from_config() {
        let config = Config::default();
        let plan = TrialPlan::from_config(&config);
        assert_eq!(plan.frame_length, Some(config.max_frame_length));
        assert_eq!(plan.duration, Duration::from_secs(10));

        let random = Config { frame_mode: FrameMode::Random, ..Config::default() };
        let plan = TrialPlan::from_config(&random);
        assert_eq!(plan.frame_length, None);
        assert_eq!((plan.min_length, plan.max_length), (random.frame_min_limit, random.max_frame_length));
    }

    #[tokio::test]
    async fn test_with_logger_runs_quietly() {
        let logger = TrialLogger::new(&Config { enable_color: false, ..Config::default() });
        let mut session = session(shared(EchoPort::with_corruption(|d| d[1..].to_vec())))
            .with_pattern(PatternKind::Random)
            .with_logger(logger);
        let samples = assert_ok!(session.run_once(Some(6), Duration::from_millis(20)).await);
        assert!(samples[0].is_length_mismatch());
        assert_eq!(assert_ok!(session.loop_check(Duration::from_millis(20)).await), LoopStatus::Mismatched);
    }

    #[tokio::test]
    async fn test_runs_close_their_correlation_id() {
        let logger = TrialLogger::new(&Config { enable_color: false, ..Config::default() });

        let mut clean = session(shared(EchoPort::new())).with_logger(logger.clone());
        assert_ok!(clean.run_for(Duration::from_millis(30), Some(4), Duration::from_millis(50), None, None).await);
        assert!(logger.logger().correlation_id().await.is_none());

        let mut broken = session(shared(BrokenPort))
            .with_error_policy(TrialErrorPolicy::Abort)
            .with_logger(logger.clone());
        assert!(broken.run_once(Some(4), Duration::from_millis(10)).await.is_err());
        assert!(logger.logger().correlation_id().await.is_none());
    }
}
