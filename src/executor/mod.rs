//! Burst execution engine
//!
//! The orchestrator turns a `TestConfig` into a staggered sequence of
//! spawned requests. Results stream back over a channel in completion
//! order; the summary is produced once every request has settled.

use crate::{
    client::DelayEndpoint,
    error::{AppError, Result},
    logging::RunLogger,
    models::{Outcome, RequestResult, RequestTask, TestConfig, TestSummary},
};
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

/// Runs bursts against a delay endpoint, one at a time
pub struct Orchestrator {
    endpoint: Arc<dyn DelayEndpoint>,
    in_progress: Arc<AtomicBool>,
    logger: RunLogger,
}

/// Clears the single-flight latch when the run ends, even by panic
struct RunGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl Orchestrator {
    pub fn new(endpoint: Arc<dyn DelayEndpoint>) -> Self {
        Self::with_logger(endpoint, RunLogger::quiet())
    }

    pub fn with_logger(endpoint: Arc<dyn DelayEndpoint>, logger: RunLogger) -> Self {
        Self {
            endpoint,
            in_progress: Arc::new(AtomicBool::new(false)),
            logger,
        }
    }

    /// Whether a burst is currently in flight
    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Start a burst.
    ///
    /// Returns `Ok(None)` if a burst is already running, whatever the
    /// config. Otherwise returns `Err(Validation)` for a request count
    /// outside `1..=MAX_REQUESTS` without dispatching anything.
    pub async fn run(&self, config: TestConfig) -> Result<Option<TestRun>> {
        if self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.logger.log_busy().await;
            return Ok(None);
        }
        let guard = RunGuard { flag: self.in_progress.clone() };

        if let Err(error) = config.validate() {
            drop(guard);
            self.logger.log_rejected(&error).await;
            return Err(error);
        }

        let run_id = Uuid::new_v4().to_string();
        self.logger.log_run_started(&run_id, &config, &self.endpoint.describe()).await;

        let (result_tx, result_rx) = mpsc::unbounded_channel();
        let (summary_tx, summary_rx) = oneshot::channel();
        let scheduler = Scheduler {
            endpoint: self.endpoint.clone(),
            logger: self.logger.clone(),
            run_id: run_id.clone(),
        };

        tokio::spawn(async move {
            let summary = scheduler.execute(config, result_tx).await;
            drop(guard);
            let _ = summary_tx.send(summary);
        });

        Ok(Some(TestRun {
            run_id,
            config,
            results: result_rx,
            summary: summary_rx,
        }))
    }
}

/// Handle to a running burst
pub struct TestRun {
    run_id: String,
    config: TestConfig,
    results: mpsc::UnboundedReceiver<RequestResult>,
    summary: oneshot::Receiver<TestSummary>,
}

impl TestRun {
    /// Correlation id of this run, also attached to its log records
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    /// Next settled request, in completion order. `None` once every
    /// request has been reported.
    pub async fn next_result(&mut self) -> Option<RequestResult> {
        self.results.recv().await
    }

    /// Wait for the aggregate summary
    pub async fn summary(self) -> Result<TestSummary> {
        self.summary
            .await
            .map_err(|_| AppError::test_execution("Burst ended without producing a summary"))
    }

    /// Drain all results, then return them with the summary
    pub async fn collect(mut self) -> Result<(Vec<RequestResult>, TestSummary)> {
        let mut results = Vec::with_capacity(self.config.scheduled_count() as usize);
        while let Some(result) = self.next_result().await {
            results.push(result);
        }
        let summary = self.summary().await?;
        Ok((results, summary))
    }
}

struct Scheduler {
    endpoint: Arc<dyn DelayEndpoint>,
    logger: RunLogger,
    run_id: String,
}

struct InFlight {
    task: RequestTask,
    dispatched_at: Instant,
    handle: JoinHandle<bool>,
}

impl Scheduler {
    async fn execute(self, config: TestConfig, results: mpsc::UnboundedSender<RequestResult>) -> TestSummary {
        let count = config.scheduled_count();
        let mut in_flight = Vec::with_capacity(count as usize);
        let started = Instant::now();

        for task in config.tasks() {
            self.logger.log_dispatch(&self.run_id, &task).await;

            let handle = tokio::spawn(execute_request(
                self.endpoint.clone(),
                task,
                results.clone(),
                self.logger.clone(),
                self.run_id.clone(),
            ));
            in_flight.push(InFlight { task, dispatched_at: Instant::now(), handle });

            let pause = task.launch_delay_after_previous;
            if task.index < count && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
        }

        let (meta, handles): (Vec<_>, Vec<_>) = in_flight
            .into_iter()
            .map(|f| ((f.task, f.dispatched_at), f.handle))
            .unzip();

        let mut success_count = 0;
        for ((task, dispatched_at), joined) in meta.into_iter().zip(join_all(handles).await) {
            match joined {
                Ok(true) => success_count += 1,
                Ok(false) => {}
                Err(join_error) => {
                    // The request task died before reporting; report it here
                    let result = RequestResult::new(
                        task.index,
                        dispatched_at.elapsed(),
                        task.target_endpoint_delay_secs,
                        Outcome::Failure { message: format!("Request task failed: {}", join_error) },
                    );
                    self.logger.log_result(&self.run_id, &result).await;
                    let _ = results.send(result);
                }
            }
        }
        drop(results);

        let summary = TestSummary::new(started.elapsed(), success_count, count);
        self.logger.log_run_complete(&self.run_id, &summary).await;
        summary
    }
}

async fn execute_request(
    endpoint: Arc<dyn DelayEndpoint>,
    task: RequestTask,
    results: mpsc::UnboundedSender<RequestResult>,
    logger: RunLogger,
    run_id: String,
) -> bool {
    let started = Instant::now();
    let outcome = match endpoint.delay(task.target_endpoint_delay_secs).await {
        Ok(payload) => Outcome::Success(payload),
        Err(error) => Outcome::Failure { message: error.detail().to_string() },
    };

    let result = RequestResult::new(task.index, started.elapsed(), task.target_endpoint_delay_secs, outcome);
    logger.log_result(&run_id, &result).await;

    let success = result.is_success();
    // The receiver may have been dropped; the summary still counts this one
    let _ = results.send(result);
    success
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResponsePayload;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Endpoint that sleeps for the requested delay on the tokio clock
    #[derive(Default)]
    struct FakeEndpoint {
        calls: Mutex<Vec<(Instant, f64)>>,
        fail_on: Vec<f64>,
        panic_on: Vec<f64>,
    }

    impl FakeEndpoint {
        fn failing_on(delays: &[f64]) -> Self {
            Self { fail_on: delays.to_vec(), ..Default::default() }
        }

        fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().iter().map(|(t, _)| *t).collect()
        }
    }

    #[async_trait]
    impl DelayEndpoint for FakeEndpoint {
        async fn delay(&self, seconds: f64) -> Result<ResponsePayload> {
            self.calls.lock().unwrap().push((Instant::now(), seconds));
            tokio::time::sleep(Duration::from_secs_f64(seconds)).await;

            if self.panic_on.contains(&seconds) {
                panic!("endpoint exploded");
            }
            if self.fail_on.contains(&seconds) {
                return Err(AppError::http_request("HTTP 503: Service Unavailable"));
            }
            Ok(ResponsePayload {
                method: Some("GET".to_string()),
                ..Default::default()
            })
        }

        fn describe(&self) -> String {
            "fake".to_string()
        }
    }

    fn config(count: i64, delay: i64, delay_inc: i64, endpoint: f64, endpoint_inc: f64) -> TestConfig {
        TestConfig {
            request_count: count,
            initial_launch_delay_ms: delay,
            launch_delay_increment_ms: delay_inc,
            initial_endpoint_delay_secs: endpoint,
            endpoint_delay_increment_secs: endpoint_inc,
        }
    }

    fn orchestrator(endpoint: &Arc<FakeEndpoint>) -> Orchestrator {
        Orchestrator::new(endpoint.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn test_launches_are_staggered_by_increasing_pauses() {
        let endpoint = Arc::new(FakeEndpoint::default());
        let run = orchestrator(&endpoint).run(config(3, 20, 10, 0.0, 0.0)).await.unwrap().unwrap();
        run.collect().await.unwrap();

        let times = endpoint.call_times();
        assert_eq!(times.len(), 3);
        let first_gap = times[1] - times[0];
        let second_gap = times[2] - times[1];
        assert!(first_gap >= Duration::from_millis(20) && first_gap < Duration::from_millis(21), "{:?}", first_gap);
        assert!(second_gap >= Duration::from_millis(30) && second_gap < Duration::from_millis(31), "{:?}", second_gap);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay_dispatches_back_to_back() {
        let endpoint = Arc::new(FakeEndpoint::default());
        let run = orchestrator(&endpoint).run(config(5, 0, 0, 1.0, 0.0)).await.unwrap().unwrap();
        let (_, summary) = run.collect().await.unwrap();

        let times = endpoint.call_times();
        assert!(times.iter().all(|t| *t == times[0]));
        assert!(summary.total_duration() < Duration::from_millis(1010));
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_arrive_in_completion_order() {
        let endpoint = Arc::new(FakeEndpoint::default());
        // Later requests ask for shorter delays, so they finish first
        let run = orchestrator(&endpoint).run(config(10, 0, 0, 1.0, -0.1)).await.unwrap().unwrap();
        let (results, summary) = run.collect().await.unwrap();

        assert_eq!(results.len(), 10);
        let indices: HashSet<u32> = results.iter().map(|r| r.index).collect();
        assert_eq!(indices, (1..=10).collect());
        assert_eq!(results[0].index, 10);
        assert_eq!(results[9].index, 1);
        assert_eq!(summary.success_count, 10);
        assert_eq!(summary.success_rate_percent, 100.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_abort_the_run() {
        let endpoint = Arc::new(FakeEndpoint::failing_on(&[2.0]));
        let run = orchestrator(&endpoint).run(config(3, 20, 0, 1.0, 1.0)).await.unwrap().unwrap();
        let (results, summary) = run.collect().await.unwrap();

        assert_eq!(results.len(), 3);
        let failed = results.iter().find(|r| r.index == 2).unwrap();
        assert_eq!(failed.error_message(), Some("HTTP 503: Service Unavailable"));
        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.failure_count(), 1);
        assert_eq!(summary.success_rate_percent, 66.7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_duration_spans_first_dispatch_to_last_settle() {
        let endpoint = Arc::new(FakeEndpoint::default());
        let run = orchestrator(&endpoint).run(config(3, 20, 0, 1.0, 1.0)).await.unwrap().unwrap();
        let summary = run.summary().await.unwrap();

        // Third request starts at 40ms and waits 3s
        let total = summary.total_duration();
        assert!(total >= Duration::from_millis(3040) && total < Duration::from_millis(3050), "{:?}", total);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_failures_still_produce_summary() {
        let endpoint = Arc::new(FakeEndpoint::failing_on(&[0.5]));
        let run = orchestrator(&endpoint).run(config(4, 0, 0, 0.5, 0.0)).await.unwrap().unwrap();
        let (results, summary) = run.collect().await.unwrap();

        assert_eq!(results.len(), 4);
        assert_eq!(summary.success_count, 0);
        assert_eq!(summary.success_rate_percent, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_run_is_ignored_while_first_is_active() {
        let endpoint = Arc::new(FakeEndpoint::default());
        let orchestrator = orchestrator(&endpoint);

        let first = orchestrator.run(config(2, 10, 0, 1.0, 0.0)).await.unwrap().unwrap();
        assert!(orchestrator.is_running());
        assert!(orchestrator.run(config(2, 10, 0, 1.0, 0.0)).await.unwrap().is_none());

        first.collect().await.unwrap();
        assert!(!orchestrator.is_running());
        assert_eq!(endpoint.call_times().len(), 2);

        let again = orchestrator.run(config(1, 0, 0, 0.0, 0.0)).await.unwrap();
        assert!(again.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_check_precedes_validation() {
        let endpoint = Arc::new(FakeEndpoint::default());
        let orchestrator = orchestrator(&endpoint);

        let first = orchestrator.run(config(2, 10, 0, 1.0, 0.0)).await.unwrap().unwrap();
        // An invalid count while busy is still a no-op, not a rejection
        let second = orchestrator.run(config(0, 10, 0, 1.0, 0.0)).await;
        assert!(matches!(second, Ok(None)), "{:?}", second.map(|r| r.is_some()));
        assert!(orchestrator.is_running());

        first.collect().await.unwrap();
        assert_eq!(endpoint.call_times().len(), 2);

        // Once idle, the same config is rejected and the latch is released again
        let error = orchestrator.run(config(0, 10, 0, 1.0, 0.0)).await.err().unwrap();
        assert!(matches!(error, AppError::Validation(_)));
        assert!(!orchestrator.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_counts_are_rejected_without_dispatch() {
        let endpoint = Arc::new(FakeEndpoint::default());
        let orchestrator = orchestrator(&endpoint);

        for count in [0, -3, 100_001] {
            let error = orchestrator.run(config(count, 20, 0, 1.0, 0.0)).await.err().unwrap();
            assert!(matches!(error, AppError::Validation(_)), "count {}: {:?}", count, error);
        }
        assert!(!orchestrator.is_running());
        assert!(endpoint.call_times().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_request_is_reported_as_failure() {
        let endpoint = Arc::new(FakeEndpoint { panic_on: vec![2.0], ..Default::default() });
        let run = orchestrator(&endpoint).run(config(3, 0, 0, 1.0, 1.0)).await.unwrap().unwrap();
        let (results, summary) = run.collect().await.unwrap();

        assert_eq!(results.len(), 3);
        let failed = results.iter().find(|r| r.index == 2).unwrap();
        assert!(failed.error_message().unwrap().starts_with("Request task failed"));
        assert_eq!(summary.success_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_carry_requested_delay() {
        let endpoint = Arc::new(FakeEndpoint::default());
        let run = orchestrator(&endpoint).run(config(3, 0, 0, 0.5, 0.25)).await.unwrap().unwrap();
        let (mut results, _) = run.collect().await.unwrap();
        results.sort_by_key(|r| r.index);

        let delays: Vec<f64> = results.iter().map(|r| r.requested_delay_secs).collect();
        assert_eq!(delays, vec![0.5, 0.75, 1.0]);
        assert!(results[2].duration() >= Duration::from_secs(1));
    }
}
