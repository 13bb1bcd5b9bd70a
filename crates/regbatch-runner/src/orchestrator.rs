//! Sequential batch orchestrator
//!
//! One job at a time: generate → record `pending` → dispatch (or mock) →
//! classify → record terminal state → delay. The network dispatch and the
//! delay race the batch cancellation token. Mock latency always runs out so
//! a simulated job still reaches a terminal state.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;

use regbatch_core::classify::{self, Classification};
use regbatch_core::{
    BatchReport, BatchState, ConfigError, JobRecord, RunConfig, build_payload, classify_response,
    dispatch_url, generate_credential,
};

use crate::log::JobLog;
use crate::transport::{HttpTransport, PreparedRequest, Transport, TransportError};

/// Drives batches against a [`Transport`].
pub struct Orchestrator {
    transport: Arc<dyn Transport>,
    log: JobLog,
    control: Arc<Mutex<Control>>,
}

/// Shared between the orchestrator and its [`StopHandle`]s.
#[derive(Default)]
struct Control {
    state: BatchState,
    /// Present while a batch loop is active.
    token: Option<CancellationToken>,
}

/// Cloneable handle that stops the running batch (e.g. from a signal handler).
#[derive(Clone)]
pub struct StopHandle {
    control: Arc<Mutex<Control>>,
}

impl StopHandle {
    /// Signal cancellation and mark the batch `stopped`. No-op when idle.
    pub fn stop(&self) {
        let mut control = lock(&self.control);
        if let Some(token) = &control.token {
            token.cancel();
            control.state = BatchState::Stopped;
            tracing::info!("batch stop requested");
        }
    }
}

/// Why the loop ended.
enum Exit {
    Exhausted,
    Cancelled,
}

/// Outcome of a single dispatch that was not cancelled.
type JobResult = Result<Classification, TransportError>;

impl Orchestrator {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            log: JobLog::new(),
            control: Arc::new(Mutex::new(Control::default())),
        }
    }

    /// Orchestrator backed by [`HttpTransport`] with the config's timeout.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn http(config: &RunConfig) -> Result<Self, RunnerError> {
        let transport = HttpTransport::new(Duration::from_secs(config.timeout_secs))
            .map_err(|e| RunnerError::Client(e.to_string()))?;
        Ok(Self::new(Arc::new(transport)))
    }

    #[must_use]
    pub fn log(&self) -> &JobLog {
        &self.log
    }

    #[must_use]
    pub fn state(&self) -> BatchState {
        lock(&self.control).state
    }

    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            control: Arc::clone(&self.control),
        }
    }

    /// Stop the running batch. Records already terminal are left alone; a
    /// record in flight stays `pending`.
    pub fn stop(&self) {
        self.stop_handle().stop();
    }

    /// Run one batch to completion (or until stopped).
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::AlreadyRunning`] if a batch loop is active and
    /// [`RunnerError::Config`] if the config is invalid. Neither touches the
    /// log.
    pub async fn start(&self, config: &RunConfig) -> Result<BatchReport, RunnerError> {
        self.start_with_token(config, CancellationToken::new()).await
    }

    /// Like [`start`](Self::start), but the batch also ends when `token` is
    /// cancelled, e.g. a child of an application-wide shutdown token.
    ///
    /// # Errors
    ///
    /// Same as [`start`](Self::start).
    pub async fn start_with_token(
        &self,
        config: &RunConfig,
        token: CancellationToken,
    ) -> Result<BatchReport, RunnerError> {
        {
            let mut control = lock(&self.control);
            if control.token.is_some() {
                return Err(RunnerError::AlreadyRunning);
            }
            config.validate()?;

            control.token = Some(token.clone());
            control.state = BatchState::Running;
        }
        self.log.clear();

        tracing::info!(
            count = config.count,
            mock = config.use_mock_mode,
            proxy = config.use_proxy,
            content_type = %config.content_type,
            "batch started"
        );

        let exit = self.run_loop(config, &token).await;

        let state = {
            let mut control = lock(&self.control);
            control.token = None;
            // A stop that lands after the last job finished does not demote
            // a completed batch.
            control.state = match exit {
                Exit::Exhausted => BatchState::Completed,
                Exit::Cancelled => BatchState::Stopped,
            };
            control.state
        };

        let report = BatchReport::new(state, self.log.snapshot(), config.count);
        tracing::info!(
            state = %state,
            success = report.stats.success,
            failed = report.stats.failed,
            pending = report.stats.pending,
            "batch finished"
        );
        Ok(report)
    }

    async fn run_loop(&self, config: &RunConfig, token: &CancellationToken) -> Exit {
        let mut rng = SmallRng::from_entropy();
        let url = dispatch_url(config);
        let delay = Duration::from_millis(config.delay_ms);

        for index in 0..config.count {
            if token.is_cancelled() {
                return Exit::Cancelled;
            }

            let credential = generate_credential(&mut rng, &config.email_domain);
            let id = format!("{:016x}", rng.r#gen::<u64>());
            let email = credential.email.clone();
            self.log
                .push(JobRecord::pending(id.clone(), credential.clone(), Utc::now()));

            let result = if config.use_mock_mode {
                let latency = classify::mock_latency(&mut rng);
                let outcome = classify::mock_outcome(&mut rng);
                tokio::time::sleep(latency).await;
                Some(Ok(outcome))
            } else {
                let payload = build_payload(&credential, &config.invite_code, &config.field_mapping);
                let encoded = payload.encode(config.content_type);
                let request = PreparedRequest {
                    url: url.clone(),
                    headers: encoded.headers(),
                    body: encoded.body,
                };
                tracing::debug!(index, url = %request.url, content_type = encoded.content_type, "dispatching");
                cancellable(token, self.dispatch(&request)).await
            };

            let Some(result) = result else {
                // In-flight job is left pending.
                tracing::info!(index, %email, "job interrupted by stop");
                return Exit::Cancelled;
            };

            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(index, %email, error = %e, "transport failure");
                    Classification {
                        success: false,
                        message: e.record_message(),
                    }
                }
            };

            tracing::info!(
                index,
                %email,
                success = outcome.success,
                message = %outcome.message,
                "job finished"
            );
            self.log.finish(&id, outcome);

            if token.is_cancelled() {
                return Exit::Cancelled;
            }
            if index + 1 < config.count
                && cancellable(token, tokio::time::sleep(delay)).await.is_none()
            {
                return Exit::Cancelled;
            }
        }

        Exit::Exhausted
    }

    async fn dispatch(&self, request: &PreparedRequest) -> JobResult {
        let response = self.transport.send(request).await?;
        tracing::debug!(status = response.status, bytes = response.body.len(), "response received");
        Ok(classify_response(response.status, &response.body))
    }
}

/// Run `fut` unless the token fires first; `None` means cancelled.
async fn cancellable<F: Future>(token: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        () = token.cancelled() => None,
        out = fut => Some(out),
    }
}

fn lock(control: &Mutex<Control>) -> MutexGuard<'_, Control> {
    control.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("a batch is already running")]
    AlreadyRunning,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("HTTP client error: {0}")]
    Client(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use regbatch_core::JobStatus;
    use regbatch_core::classify::SUCCESS_MESSAGE;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    /// Replays scripted responses and counts calls.
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<RawResponseSpec, TransportError>>>,
        latency: Duration,
        calls: AtomicUsize,
        seen: Mutex<Vec<PreparedRequest>>,
    }

    type RawResponseSpec = (u16, &'static str);

    impl ScriptedTransport {
        fn new(script: Vec<Result<RawResponseSpec, TransportError>>) -> Arc<Self> {
            Self::with_latency(script, Duration::ZERO)
        }

        fn with_latency(
            script: Vec<Result<RawResponseSpec, TransportError>>,
            latency: Duration,
        ) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                latency,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(
            &self,
            request: &PreparedRequest,
        ) -> Result<crate::transport::RawResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request.clone());
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok((200, "{}")));
            next.map(|(status, body)| crate::transport::RawResponse {
                status,
                body: body.to_string(),
            })
        }
    }

    fn network_config(count: u32) -> RunConfig {
        RunConfig {
            count,
            delay_ms: 0,
            ..RunConfig::default()
        }
    }

    #[tokio::test]
    async fn classifies_each_job_in_order() {
        let transport = ScriptedTransport::new(vec![
            Ok((200, r#"{"ok": true}"#)),
            Ok((200, r#"{"success": false, "message": "x"}"#)),
            Ok((500, r#"{"error": "bad"}"#)),
        ]);
        let orch = Orchestrator::new(transport.clone());

        let report = orch.start(&network_config(3)).await.unwrap();

        assert_eq!(report.state, BatchState::Completed);
        assert_eq!(report.records.len(), 3);
        assert_eq!(report.records[0].status, JobStatus::Success);
        assert_eq!(report.records[0].message.as_deref(), Some(SUCCESS_MESSAGE));
        assert_eq!(report.records[1].message.as_deref(), Some("x"));
        assert_eq!(report.records[2].message.as_deref(), Some("bad"));
        assert_eq!(report.stats.success, 1);
        assert_eq!(report.stats.failed, 2);
        assert_eq!(transport.calls(), 3);
        assert_eq!(orch.state(), BatchState::Completed);
    }

    #[tokio::test]
    async fn request_carries_payload_and_headers() {
        let transport = ScriptedTransport::new(vec![]);
        let orch = Orchestrator::new(transport.clone());
        let config = RunConfig {
            invite_code: "INV".into(),
            ..network_config(1)
        };

        let report = orch.start(&config).await.unwrap();

        let seen = transport.seen.lock().unwrap();
        let request = &seen[0];
        assert_eq!(request.url, config.target_url);
        assert!(request
            .headers
            .contains(&("Content-Type".to_string(), "application/json".to_string())));
        let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
        assert_eq!(body["email"], report.records[0].email.as_str());
        assert_eq!(body["password"], report.records[0].password.as_str());
        assert_eq!(body["password_confirmation"], report.records[0].password.as_str());
        assert_eq!(body["invite_code"], "INV");
    }

    #[tokio::test]
    async fn proxy_rewrites_dispatch_url() {
        let transport = ScriptedTransport::new(vec![]);
        let orch = Orchestrator::new(transport.clone());
        let config = RunConfig {
            use_proxy: true,
            ..network_config(1)
        };

        orch.start(&config).await.unwrap();

        let seen = transport.seen.lock().unwrap();
        assert_eq!(
            seen[0].url,
            "https://corsproxy.io/?http%3A%2F%2Flocalhost%3A8080%2Fapi%2Fregister"
        );
    }

    #[tokio::test]
    async fn transport_failure_marks_job_failed_and_continues() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Connect("refused".into())),
            Ok((200, "")),
        ]);
        let orch = Orchestrator::new(transport);

        let report = orch.start(&network_config(2)).await.unwrap();

        assert_eq!(report.records[0].status, JobStatus::Failed);
        assert_eq!(
            report.records[0].message.as_deref(),
            Some(crate::transport::CONNECT_FAILURE_MESSAGE)
        );
        assert_eq!(report.records[1].status, JobStatus::Success);
    }

    #[tokio::test]
    async fn invalid_config_rejected_before_any_job() {
        let transport = ScriptedTransport::new(vec![]);
        let orch = Orchestrator::new(transport.clone());

        let err = orch.start(&network_config(0)).await.unwrap_err();

        assert!(matches!(err, RunnerError::Config(_)));
        assert!(orch.log().is_empty());
        assert_eq!(transport.calls(), 0);
        assert_eq!(orch.state(), BatchState::Idle);
    }

    #[tokio::test]
    async fn stop_before_start_is_noop() {
        let transport = ScriptedTransport::new(vec![]);
        let orch = Orchestrator::new(transport.clone());
        orch.stop();
        assert_eq!(orch.state(), BatchState::Idle);

        let report = orch.start(&network_config(2)).await.unwrap();
        assert_eq!(report.records.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_delay_ends_batch_promptly() {
        let transport = ScriptedTransport::new(vec![]);
        let orch = Orchestrator::new(transport.clone());
        let config = RunConfig {
            count: 5,
            delay_ms: 60_000,
            ..RunConfig::default()
        };

        let began = Instant::now();
        let (report, ()) = tokio::join!(orch.start(&config), async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            orch.stop();
        });
        let report = report.unwrap();

        assert!(began.elapsed() < Duration::from_secs(1));
        assert_eq!(report.state, BatchState::Stopped);
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].status, JobStatus::Success);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_mid_flight_leaves_job_pending() {
        let transport = ScriptedTransport::with_latency(vec![], Duration::from_secs(10));
        let orch = Orchestrator::new(transport.clone());

        let config = network_config(3);
        let (report, ()) = tokio::join!(orch.start(&config), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            orch.stop();
        });
        let report = report.unwrap();

        assert_eq!(report.state, BatchState::Stopped);
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].status, JobStatus::Pending);
        assert_eq!(report.records[0].message, None);
        assert_eq!(report.stats.pending, 1);
    }

    #[tokio::test]
    async fn cancelled_token_runs_no_jobs() {
        let transport = ScriptedTransport::new(vec![]);
        let orch = Orchestrator::new(transport.clone());
        let token = CancellationToken::new();
        token.cancel();

        let report = orch
            .start_with_token(&network_config(3), token)
            .await
            .unwrap();

        assert_eq!(report.state, BatchState::Stopped);
        assert!(report.records.is_empty());
        assert_eq!(report.stats.total, 3);
        assert_eq!(transport.calls(), 0);
        assert_eq!(orch.state(), BatchState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_mock_latency_finishes_current_job() {
        let transport = ScriptedTransport::new(vec![]);
        let orch = Orchestrator::new(transport.clone());
        let config = RunConfig {
            count: 3,
            delay_ms: 1000,
            use_mock_mode: true,
            ..RunConfig::default()
        };

        let (report, ()) = tokio::join!(orch.start(&config), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            orch.stop();
        });
        let report = report.unwrap();

        assert_eq!(report.state, BatchState::Stopped);
        assert_eq!(report.records.len(), 1);
        assert!(report.records[0].status.is_terminal());
        assert!(report.records[0].message.is_some());
        assert_eq!(report.stats.pending, 0);
    }

    #[tokio::test]
    async fn stop_after_last_job_keeps_completed() {
        let transport = ScriptedTransport::new(vec![]);
        let orch = Orchestrator::new(transport);
        let mut rx = orch.log().subscribe();
        let config = network_config(1);

        let stopper = async {
            while rx.changed().await.is_ok() {
                if rx.borrow_and_update().first().is_some_and(|r| r.status.is_terminal()) {
                    orch.stop();
                    break;
                }
            }
        };
        let (report, ()) = tokio::join!(orch.start(&config), stopper);
        let report = report.unwrap();

        assert_eq!(report.state, BatchState::Completed);
        assert_eq!(orch.state(), BatchState::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn mock_run_timing_matches_latency_plus_delays() {
        let transport = ScriptedTransport::new(vec![]);
        let orch = Orchestrator::new(transport.clone());
        let config = RunConfig {
            count: 4,
            delay_ms: 1000,
            use_mock_mode: true,
            ..RunConfig::default()
        };

        let began = Instant::now();
        let report = orch.start(&config).await.unwrap();
        let elapsed = began.elapsed();

        assert_eq!(report.records.len(), 4);
        assert_eq!(report.stats.pending, 0);
        assert_eq!(transport.calls(), 0);
        // 3 gaps of 1s plus 4 mock latencies in [100ms, 600ms)
        assert!(elapsed >= Duration::from_millis(3000 + 400));
        assert!(elapsed < Duration::from_millis(3000 + 2400));
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_while_running_is_refused() {
        let transport = ScriptedTransport::new(vec![]);
        let orch = Orchestrator::new(transport);
        let config = RunConfig {
            count: 2,
            delay_ms: 5_000,
            ..RunConfig::default()
        };

        let (first, second) = tokio::join!(orch.start(&config), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            orch.start(&config).await
        });

        assert!(first.is_ok());
        assert!(matches!(second, Err(RunnerError::AlreadyRunning)));
    }

    #[tokio::test]
    async fn restart_clears_previous_log() {
        let transport = ScriptedTransport::new(vec![]);
        let orch = Orchestrator::new(transport);

        orch.start(&network_config(3)).await.unwrap();
        assert_eq!(orch.log().len(), 3);

        let report = orch.start(&network_config(1)).await.unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(orch.log().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn observers_see_pending_before_terminal() {
        let transport = ScriptedTransport::with_latency(vec![], Duration::from_millis(200));
        let orch = Orchestrator::new(transport);
        let mut rx = orch.log().subscribe();

        let watcher = async {
            let mut saw_pending = false;
            loop {
                if rx.changed().await.is_err() {
                    break;
                }
                let snapshot = rx.borrow_and_update().clone();
                if snapshot.first().is_some_and(|r| r.status == JobStatus::Pending) {
                    saw_pending = true;
                }
                if snapshot.first().is_some_and(|r| r.status.is_terminal()) {
                    break;
                }
            }
            saw_pending
        };

        let config = network_config(1);
        let (report, saw_pending) = tokio::join!(orch.start(&config), watcher);
        assert!(report.is_ok());
        assert!(saw_pending);
    }
}
