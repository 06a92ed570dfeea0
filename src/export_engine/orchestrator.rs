//! Download orchestrator
//!
//! Central state machine of the export engine: a bounded set of
//! concurrently fetching orders, a FIFO queue for the overflow, per-order
//! de-duplication, classified retry with exponential backoff, a session
//! cache of fetched payloads, and a broadcast status projection.
//!
//! Everything runs cooperatively on the tokio runtime; the only
//! suspension points are the network fetch and explicit timers (backoff,
//! artifact cleanup). Queue and active-set mutations happen under one
//! short-lived lock that is never held across an await. Slot release is
//! tied to a guard's `Drop` so it runs exactly once per task, even on an
//! unexpected early return, because releasing the slot is also what
//! drains the next queued order.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::events::{StatusReceiver, StatusSender, TaskStatusEvent, STATUS_CHANNEL_CAPACITY};
use super::tasks::{DownloadTask, ExportError, TaskState};
use crate::domain::OrderLine;
use crate::infrastructure::config::DownloadConfig;
use crate::infrastructure::csv_export::{export_filename, to_csv};
use crate::infrastructure::export_sink::{ExportArtifact, ExportSink};
use crate::infrastructure::order_query::{OrderFetcher, OrderPayload};
use crate::infrastructure::parsing::{map_to_order_line, MappingContext, RowSource};

/// Orchestrator tuning; see [`DownloadConfig`] for the file-loadable form.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_concurrent_downloads: usize,
    pub max_retry_attempts: u32,
    pub retry_base_delay: Duration,
    pub artifact_cleanup_delay: Duration,
    pub site: String,
    pub discount_factor: f64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&DownloadConfig::default())
    }
}

impl From<&DownloadConfig> for OrchestratorConfig {
    fn from(config: &DownloadConfig) -> Self {
        Self {
            max_concurrent_downloads: config.max_concurrent_downloads,
            max_retry_attempts: config.max_retry_attempts,
            retry_base_delay: config.retry_base_delay(),
            artifact_cleanup_delay: config.artifact_cleanup_delay(),
            site: config.site.clone(),
            discount_factor: config.discount_factor,
        }
    }
}

/// What `submit` did with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A slot was free; the task is fetching.
    Started,
    /// All slots busy; the task waits in the FIFO queue.
    Queued,
    /// The order is already active or queued; nothing changed.
    Deduplicated,
    /// An errored or finished task was re-armed and restarted.
    Rearmed,
}

struct EngineState {
    active: HashSet<String>,
    queue: VecDeque<String>,
    tasks: HashMap<String, DownloadTask>,
}

struct Inner {
    config: OrchestratorConfig,
    fetcher: Arc<dyn OrderFetcher>,
    sink: Arc<dyn ExportSink>,
    state: Mutex<EngineState>,
    cache: Mutex<HashMap<(String, String), OrderPayload>>,
    events: StatusSender,
}

/// Bounded-concurrency export orchestrator.
///
/// Cheap to clone; all clones share one engine. Construct one instance
/// per page session — the cache lives exactly as long as the instance.
#[derive(Clone)]
pub struct ExportOrchestrator {
    inner: Arc<Inner>,
}

impl ExportOrchestrator {
    #[must_use]
    pub fn new(
        config: OrchestratorConfig,
        fetcher: Arc<dyn OrderFetcher>,
        sink: Arc<dyn ExportSink>,
    ) -> Self {
        let (events, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                config,
                fetcher,
                sink,
                state: Mutex::new(EngineState {
                    active: HashSet::new(),
                    queue: VecDeque::new(),
                    tasks: HashMap::new(),
                }),
                cache: Mutex::new(HashMap::new()),
                events,
            }),
        }
    }

    /// Requests an export for one order number.
    ///
    /// De-duplicates against active and queued work; re-arms terminal
    /// tasks. Validation failures are reported to the status projection
    /// and returned, consuming no retry attempt.
    pub fn submit(&self, order_number: &str) -> Result<SubmitOutcome, ExportError> {
        let order = order_number.trim();
        if !is_valid_order_number(order) {
            let error = ExportError::InvalidOrderNumber(order_number.to_string());
            self.inner.emit(
                TaskStatusEvent::new(order_number, TaskState::Error, 0)
                    .with_message(error.user_message()),
            );
            return Err(error);
        }

        let (outcome, start) = {
            let mut state = self.inner.lock_state();

            if state.active.contains(order) {
                debug!(order, "submit de-duplicated against active task");
                return Ok(SubmitOutcome::Deduplicated);
            }
            // an already-queued order keeps its FIFO position
            if state.queue.iter().any(|queued| queued == order) {
                debug!(order, "submit de-duplicated against queued task");
                return Ok(SubmitOutcome::Deduplicated);
            }

            let rearmed = match state.tasks.get_mut(order) {
                Some(task) => {
                    // terminal task: manual re-trigger resets the retry
                    // counter and the stored error
                    task.rearm();
                    true
                }
                None => {
                    state.tasks.insert(order.to_string(), DownloadTask::new(order));
                    false
                }
            };

            if state.active.len() < self.inner.config.max_concurrent_downloads {
                state.active.insert(order.to_string());
                set_task_state(&mut state, order, TaskState::Loading);
                let outcome = if rearmed {
                    SubmitOutcome::Rearmed
                } else {
                    SubmitOutcome::Started
                };
                (outcome, true)
            } else {
                state.queue.push_back(order.to_string());
                set_task_state(&mut state, order, TaskState::Pending);
                let outcome = if rearmed {
                    SubmitOutcome::Rearmed
                } else {
                    SubmitOutcome::Queued
                };
                (outcome, false)
            }
        };

        if start {
            spawn_task(Arc::clone(&self.inner), order.to_string());
        } else {
            self.inner
                .emit(TaskStatusEvent::new(order, TaskState::Pending, 0));
            info!(order, "export queued, all slots busy");
        }
        Ok(outcome)
    }

    /// Drops a queued (not yet loading) task. Safe: no resources were
    /// allocated for it. Returns whether anything was removed.
    pub fn discard_queued(&self, order_number: &str) -> bool {
        let mut state = self.inner.lock_state();
        let before = state.queue.len();
        state.queue.retain(|queued| queued != order_number);
        let removed = state.queue.len() != before;
        if removed {
            state.tasks.remove(order_number);
            debug!(order = order_number, "queued task discarded");
        }
        removed
    }

    /// Removes a terminal (success/error) task from the projection. The
    /// audit trail stays until the consumer clears it explicitly.
    pub fn clear(&self, order_number: &str) -> bool {
        let mut state = self.inner.lock_state();
        match state.tasks.get(order_number) {
            Some(task) if task.state.is_terminal() => {
                state.tasks.remove(order_number);
                true
            }
            _ => false,
        }
    }

    /// Subscribes to task state transitions.
    #[must_use]
    pub fn subscribe(&self) -> StatusReceiver {
        self.inner.events.subscribe()
    }

    /// Clone of one task's current projection.
    #[must_use]
    pub fn task(&self, order_number: &str) -> Option<DownloadTask> {
        self.inner.lock_state().tasks.get(order_number).cloned()
    }

    /// Snapshot of all known tasks, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<DownloadTask> {
        let state = self.inner.lock_state();
        let mut tasks: Vec<_> = state.tasks.values().cloned().collect();
        tasks.sort_by_key(|t| t.created_at);
        tasks
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.inner.lock_state().active.len()
    }

    #[must_use]
    pub fn queued_count(&self) -> usize {
        self.inner.lock_state().queue.len()
    }

    /// Whether a payload for this order is already cached.
    #[must_use]
    pub fn is_cached(&self, order_number: &str) -> bool {
        let key = (order_number.to_string(), self.inner.config.site.clone());
        self.inner
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&key)
    }
}

/// Order numbers are short portal identifiers; anything with whitespace
/// or exotic characters is a UI bug upstream.
fn is_valid_order_number(order: &str) -> bool {
    !order.is_empty()
        && order.len() <= 32
        && order
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/'))
}

fn set_task_state(state: &mut EngineState, order: &str, task_state: TaskState) {
    if let Some(task) = state.tasks.get_mut(order) {
        task.state = task_state;
    }
}

/// Releases the concurrency slot exactly once and drains the queue.
struct SlotGuard {
    inner: Arc<Inner>,
    order: String,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let next = {
            let mut state = self.inner.lock_state();
            state.active.remove(&self.order);
            match state.queue.pop_front() {
                Some(next) => {
                    state.active.insert(next.clone());
                    set_task_state(&mut state, &next, TaskState::Loading);
                    Some(next)
                }
                None => None,
            }
        };
        if let Some(next) = next {
            debug!(order = %next, "slot freed, draining queue");
            spawn_task(Arc::clone(&self.inner), next);
        }
    }
}

fn spawn_task(inner: Arc<Inner>, order: String) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let _slot = SlotGuard {
            inner: Arc::clone(&inner),
            order: order.clone(),
        };

        match Inner::execute(&inner, &order).await {
            Ok(line_count) => {
                inner.update_task(&order, |task| {
                    task.state = TaskState::Success;
                    task.last_error = None;
                });
                inner.emit(TaskStatusEvent::new(&order, TaskState::Success, 0));
                info!(order, line_count, "export delivered");
            }
            Err(error) => {
                let message = error.user_message();
                inner.update_task(&order, |task| {
                    task.state = TaskState::Error;
                    task.last_error = Some(message.clone());
                });
                inner.emit(
                    TaskStatusEvent::new(&order, TaskState::Error, 0).with_message(&message),
                );
                warn!(order, %error, "export failed");
            }
        }
    })
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update_task(&self, order: &str, update: impl FnOnce(&mut DownloadTask)) {
        let mut state = self.lock_state();
        if let Some(task) = state.tasks.get_mut(order) {
            update(task);
        }
    }

    fn emit(&self, event: TaskStatusEvent) {
        // nobody listening is fine
        let _ = self.events.send(event);
    }

    /// Fetch (cache-first), map, serialize, deliver.
    async fn execute(inner: &Arc<Self>, order: &str) -> Result<usize, ExportError> {
        let site = inner.config.site.clone();
        let cache_key = (order.to_string(), site.clone());

        let cached = inner
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&cache_key)
            .cloned();

        let payload = match cached {
            Some(payload) => {
                debug!(order, "cache hit, bypassing fetch and retry machinery");
                inner.emit(TaskStatusEvent::new(order, TaskState::Loading, 0));
                payload
            }
            None => inner.fetch_with_retry(order, &site, cache_key).await?,
        };

        let rows = payload.extract_rows();
        let mut context = MappingContext {
            discount_factor: inner.config.discount_factor,
            external_order_number: payload.order_number.clone(),
            internal_order_number: None,
        };
        if let Some(internal) = payload
            .internal_order_number
            .as_ref()
            .filter(|n| !n.is_empty())
        {
            context = context.with_internal_order_number(internal.clone());
        }

        let lines: Vec<OrderLine> = rows
            .iter()
            .map(|row| map_to_order_line(row, &context))
            .collect();

        let csv = to_csv(&lines)?;
        let artifact = ExportArtifact {
            filename: export_filename(order),
            content: csv,
        };
        let handle = inner.sink.deliver(artifact).await?;

        // mirror the original's object-URL revocation: release after a
        // fixed delay so slow consumers still reach the artifact
        let sink = Arc::clone(&inner.sink);
        let cleanup_delay = inner.config.artifact_cleanup_delay;
        tokio::spawn(async move {
            sleep(cleanup_delay).await;
            sink.release(handle).await;
        });

        Ok(lines.len())
    }

    /// Attempt loop: `max_retry_attempts` total attempts, backoff
    /// `base * 2^(attempt-1)` between retryable failures. Retries keep
    /// the concurrency slot; they never re-enter the FIFO queue.
    async fn fetch_with_retry(
        self: &Arc<Self>,
        order: &str,
        site: &str,
        cache_key: (String, String),
    ) -> Result<OrderPayload, ExportError> {
        let mut attempt: u32 = 1;
        loop {
            self.update_task(order, |task| task.state = TaskState::Loading);
            self.emit(TaskStatusEvent::new(order, TaskState::Loading, attempt));

            match self.fetcher.fetch_order(site, order).await {
                Ok(payload) => {
                    self.cache
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(cache_key, payload.clone());
                    return Ok(payload);
                }
                Err(error) if error.is_retryable() && attempt < self.config.max_retry_attempts => {
                    let backoff = self.config.retry_base_delay * 2u32.pow(attempt - 1);
                    warn!(
                        order,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        %error,
                        "retryable fetch failure, backing off"
                    );
                    self.update_task(order, |task| task.retry_count = attempt);
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(error) => {
                    self.update_task(order, |task| {
                        task.retry_count = if error.is_retryable() { attempt } else { attempt - 1 };
                    });
                    return Err(error.into());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::export_sink::MemorySink;
    use crate::infrastructure::order_query::FetchError;
    use async_trait::async_trait;

    /// Fetcher that never completes; for observing intermediate states.
    struct StalledFetcher;

    #[async_trait]
    impl OrderFetcher for StalledFetcher {
        async fn fetch_order(
            &self,
            _site: &str,
            _order: &str,
        ) -> Result<OrderPayload, FetchError> {
            sleep(Duration::from_secs(3600)).await;
            Err(FetchError::Timeout)
        }
    }

    fn stalled_orchestrator() -> ExportOrchestrator {
        ExportOrchestrator::new(
            OrchestratorConfig::default(),
            Arc::new(StalledFetcher),
            Arc::new(MemorySink::new()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_bound_holds_at_two_loading_tasks() {
        let orchestrator = stalled_orchestrator();

        for order in ["A1", "A2", "A3", "A4", "A5"] {
            orchestrator.submit(order).unwrap();
        }
        tokio::task::yield_now().await;

        assert_eq!(orchestrator.active_count(), 2);
        assert_eq!(orchestrator.queued_count(), 3);

        let loading = orchestrator
            .snapshot()
            .into_iter()
            .filter(|t| t.state == TaskState::Loading)
            .count();
        assert_eq!(loading, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn resubmitting_a_loading_order_is_a_no_op() {
        let orchestrator = stalled_orchestrator();

        assert_eq!(orchestrator.submit("A1").unwrap(), SubmitOutcome::Started);
        tokio::task::yield_now().await;
        assert_eq!(
            orchestrator.submit("A1").unwrap(),
            SubmitOutcome::Deduplicated
        );
        assert_eq!(orchestrator.snapshot().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn resubmitting_a_queued_order_is_a_no_op() {
        let orchestrator = stalled_orchestrator();

        for order in ["A1", "A2", "A3"] {
            orchestrator.submit(order).unwrap();
        }
        tokio::task::yield_now().await;
        // A3 sits in the queue; a duplicate request must not touch it
        assert_eq!(
            orchestrator.submit("A3").unwrap(),
            SubmitOutcome::Deduplicated
        );

        assert_eq!(orchestrator.queued_count(), 1);
    }

    #[tokio::test]
    async fn invalid_order_numbers_are_rejected_without_a_task() {
        let orchestrator = stalled_orchestrator();
        let mut events = orchestrator.subscribe();

        let result = orchestrator.submit("   ");
        assert!(matches!(result, Err(ExportError::InvalidOrderNumber(_))));
        assert!(orchestrator.snapshot().is_empty());

        let event = events.recv().await.unwrap();
        assert_eq!(event.state, TaskState::Error);
    }

    #[test]
    fn order_number_validation() {
        assert!(is_valid_order_number("DE4711/08"));
        assert!(is_valid_order_number("A-1_b"));
        assert!(!is_valid_order_number(""));
        assert!(!is_valid_order_number("with space"));
        assert!(!is_valid_order_number("umläut"));
    }

    #[tokio::test(start_paused = true)]
    async fn discard_queued_removes_only_queued_tasks() {
        let orchestrator = stalled_orchestrator();
        for order in ["A1", "A2", "A3"] {
            orchestrator.submit(order).unwrap();
        }
        tokio::task::yield_now().await;

        assert!(orchestrator.discard_queued("A3"));
        assert!(!orchestrator.discard_queued("A1")); // loading, not queued
        assert_eq!(orchestrator.queued_count(), 0);
        assert!(orchestrator.task("A3").is_none());
    }
}
