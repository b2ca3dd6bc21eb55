//! The delivery pipeline: non-blocking submission, the background flush
//! worker, retry backoff, and the health surface.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::filter::{FilterReason, ObservationFilter};
use super::observation::{OutboundObservation, Priority};
use super::queue::{DeliveryQueue, Envelope};
use super::transport::{Transport, TransportResult};
use super::wire::{payload_for, SenderIdentity};

/// Tuning knobs for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Payloads sent per flush round; also the queue depth that triggers
    /// an early flush.
    pub batch_size: usize,
    /// Fixed pause between consecutive sends inside a round, to stay
    /// under endpoint rate limits.
    pub send_interval: Duration,
    /// How often the worker flushes when nothing else triggers it.
    pub flush_interval: Duration,
    /// First delay after a failing round; doubles per consecutive
    /// failing round.
    pub retry_backoff_base: Duration,
    /// Upper bound for the doubled delay.
    pub retry_backoff_cap: Duration,
    /// Longest the teardown flush may run before abandoning the backlog
    /// to the journal.
    pub shutdown_drain: Duration,
    /// Initial connectivity belief.
    pub start_online: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            send_interval: Duration::from_millis(250),
            flush_interval: Duration::from_secs(5),
            retry_backoff_base: Duration::from_secs(1),
            retry_backoff_cap: Duration::from_secs(60),
            shutdown_drain: Duration::from_secs(3),
            start_online: true,
        }
    }
}

/// Point-in-time pipeline snapshot for callers and operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineHealth {
    pub queue_size: usize,
    pub delivered: u64,
    pub failed: u64,
    pub filtered: u64,
    pub requeued: u64,
    pub is_online: bool,
    pub last_error: Option<String>,
}

/// Where a submitted observation went.
#[derive(Debug)]
pub enum Submission {
    /// Dropped before queueing; nothing will be sent.
    Filtered(FilterReason),
    /// Waiting in the queue for the next flush.
    Queued { queue_size: usize },
    /// Transmission started right away.
    Immediate(ImmediateSend),
}

impl Submission {
    #[must_use]
    pub fn is_filtered(&self) -> bool {
        matches!(self, Submission::Filtered(_))
    }

    #[must_use]
    pub fn is_queued(&self) -> bool {
        matches!(self, Submission::Queued { .. })
    }
}

/// Handle onto an in-flight immediate send. Dropping it does not cancel
/// the transmission.
#[derive(Debug)]
pub struct ImmediateSend {
    handle: JoinHandle<TransportResult>,
}

impl ImmediateSend {
    /// Waits for the transmission outcome.
    pub async fn outcome(self) -> TransportResult {
        self.handle.await.unwrap_or_else(|err| TransportResult::NetworkError {
            message: format!("send task failed: {err}"),
        })
    }
}

struct PipelineState {
    queue: DeliveryQueue,
    online: bool,
    failed_rounds: u32,
    next_flush_at: Option<Instant>,
    last_error: Option<String>,
}

#[derive(Default)]
struct Counters {
    delivered: AtomicU64,
    failed: AtomicU64,
    filtered: AtomicU64,
    requeued: AtomicU64,
}

struct PipelineInner {
    config: PipelineConfig,
    sender: SenderIdentity,
    filter: ObservationFilter,
    transport: Arc<dyn Transport>,
    state: Mutex<PipelineState>,
    counters: Counters,
    wake: Notify,
    shutdown: watch::Sender<bool>,
}

impl PipelineInner {
    fn state(&self) -> MutexGuard<'_, PipelineState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Accepts observations and moves them to the endpoint without ever
/// blocking or failing the caller.
pub struct DeliveryPipeline {
    inner: Arc<PipelineInner>,
}

impl DeliveryPipeline {
    #[must_use]
    pub fn new(
        config: PipelineConfig,
        sender: SenderIdentity,
        filter: ObservationFilter,
        transport: Arc<dyn Transport>,
        queue: DeliveryQueue,
    ) -> Self {
        let state = PipelineState {
            queue,
            online: config.start_online,
            failed_rounds: 0,
            next_flush_at: None,
            last_error: None,
        };
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(PipelineInner {
                config,
                sender,
                filter,
                transport,
                state: Mutex::new(state),
                counters: Counters::default(),
                wake: Notify::new(),
                shutdown,
            }),
        }
    }

    /// Starts the background flush worker.
    pub fn spawn_worker(&self) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let shutdown = self.inner.shutdown.subscribe();
        tokio::spawn(run_worker(inner, shutdown))
    }

    /// Hands one observation to the pipeline and returns immediately.
    ///
    /// Filtered observations are dropped on the spot. When connectivity
    /// is believed available, or the observation is high priority, a send
    /// task starts right away; everything else queues for the next flush.
    pub fn submit(&self, observation: OutboundObservation) -> Submission {
        if let Some(reason) = self.inner.filter.evaluate(&observation) {
            self.inner.counters.filtered.fetch_add(1, Ordering::Relaxed);
            debug!(kind = observation.kind, reason = %reason, "observation filtered");
            return Submission::Filtered(reason);
        }

        let payload = payload_for(&observation, &self.inner.sender);
        let envelope = Envelope::new(&observation, payload);

        let online = self.inner.state().online;
        if online || observation.priority == Priority::High {
            // An immediate send needs a runtime to run on; without one
            // the observation degrades to the queued path.
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                let inner = Arc::clone(&self.inner);
                let handle = runtime.spawn(send_immediate(inner, envelope));
                return Submission::Immediate(ImmediateSend { handle });
            }
            debug!(
                kind = observation.kind,
                "no async runtime for immediate send, queueing"
            );
        }

        let queue_size = {
            let mut state = self.inner.state();
            state.queue.push(envelope);
            state.queue.len()
        };
        if queue_size >= self.inner.config.batch_size {
            self.inner.wake.notify_one();
        }
        debug!(kind = observation.kind, queue_size, "observation queued");
        Submission::Queued { queue_size }
    }

    /// Updates the connectivity belief. Regaining connectivity clears any
    /// retry backoff and wakes the worker to drain the backlog.
    pub fn set_online(&self, online: bool) {
        let changed = {
            let mut state = self.inner.state();
            let was = state.online;
            state.online = online;
            if online {
                state.failed_rounds = 0;
                state.next_flush_at = None;
            }
            was != online
        };
        if changed {
            info!(online, "connectivity belief updated");
        }
        if online {
            self.inner.wake.notify_one();
        }
    }

    /// Drains the queue now, round by round, until it is empty or a
    /// whole round makes no progress. Runs regardless of the
    /// connectivity belief; failed sends return to the queue as usual.
    pub async fn flush_now(&self) {
        loop {
            let before = self.inner.state().queue.len();
            if before == 0 {
                return;
            }
            let outcome = flush_round(&self.inner).await;
            conclude_round(&self.inner, &outcome);
            if self.inner.state().queue.len() >= before {
                return;
            }
        }
    }

    #[must_use]
    pub fn health(&self) -> PipelineHealth {
        let state = self.inner.state();
        PipelineHealth {
            queue_size: state.queue.len(),
            delivered: self.inner.counters.delivered.load(Ordering::Relaxed),
            failed: self.inner.counters.failed.load(Ordering::Relaxed),
            filtered: self.inner.counters.filtered.load(Ordering::Relaxed),
            requeued: self.inner.counters.requeued.load(Ordering::Relaxed),
            is_online: state.online,
            last_error: state.last_error.clone(),
        }
    }

    /// Stops the worker and makes one bounded final drain.
    ///
    /// The optional summary goes out at high priority so it is attempted
    /// even when the pipeline believes it is offline. Outcomes are not
    /// reported; whatever cannot be sent inside the drain budget stays in
    /// the journal for the next session.
    pub async fn shutdown(&self, summary: Option<OutboundObservation>) {
        info!(
            queue_size = self.inner.state().queue.len(),
            "delivery pipeline shutting down"
        );
        let final_send =
            summary.map(|observation| self.submit(observation.with_priority(Priority::High)));
        let _ = self.inner.shutdown.send(true);

        let drain = async {
            if let Some(Submission::Immediate(send)) = final_send {
                let _ = send.outcome().await;
            }
            self.flush_now().await;
        };
        if tokio::time::timeout(self.inner.config.shutdown_drain, drain)
            .await
            .is_err()
        {
            warn!(
                queue_size = self.inner.state().queue.len(),
                "shutdown drain timed out, backlog remains journaled"
            );
        }
    }
}

/// One spawned send, used for the immediate path.
async fn send_immediate(inner: Arc<PipelineInner>, envelope: Envelope) -> TransportResult {
    let result = inner.transport.send(&envelope.payload).await;
    match &result {
        TransportResult::Delivered => {
            inner.counters.delivered.fetch_add(1, Ordering::Relaxed);
            note_success(&inner);
        },
        TransportResult::Rejected { status } => {
            note_failure(&inner, format!("webhook status {status}"), false);
            requeue_failed(&inner, envelope);
        },
        TransportResult::NetworkError { message } => {
            note_failure(&inner, message.clone(), true);
            requeue_failed(&inner, envelope);
        },
    }
    result
}

struct RoundOutcome {
    delivered: usize,
    failed: usize,
}

/// Sends up to one batch from the queue front, pacing consecutive sends.
/// A network error aborts the round since further sends would only pile
/// onto a dead connection; rejections keep the round going.
async fn flush_round(inner: &Arc<PipelineInner>) -> RoundOutcome {
    let mut outcome = RoundOutcome {
        delivered: 0,
        failed: 0,
    };
    let batch = inner.config.batch_size.max(1);
    for slot in 0..batch {
        let envelope = inner.state().queue.pop();
        let Some(envelope) = envelope else {
            break;
        };
        if slot > 0 {
            tokio::time::sleep(inner.config.send_interval).await;
        }
        match inner.transport.send(&envelope.payload).await {
            TransportResult::Delivered => {
                outcome.delivered += 1;
                inner.counters.delivered.fetch_add(1, Ordering::Relaxed);
                note_success(inner);
            },
            TransportResult::Rejected { status } => {
                outcome.failed += 1;
                note_failure(inner, format!("webhook status {status}"), false);
                requeue_failed(inner, envelope);
            },
            TransportResult::NetworkError { message } => {
                outcome.failed += 1;
                note_failure(inner, message, true);
                requeue_failed(inner, envelope);
                break;
            },
        }
    }
    debug!(
        delivered = outcome.delivered,
        failed = outcome.failed,
        "flush round finished"
    );
    outcome
}

fn conclude_round(inner: &Arc<PipelineInner>, outcome: &RoundOutcome) {
    let mut state = inner.state();
    if outcome.failed > 0 {
        state.failed_rounds = state.failed_rounds.saturating_add(1);
        let delay = backoff_delay(&inner.config, state.failed_rounds);
        state.next_flush_at = Some(Instant::now() + delay);
        debug!(
            failed_rounds = state.failed_rounds,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "flush round had failures, backing off"
        );
    } else if outcome.delivered > 0 {
        state.failed_rounds = 0;
        state.next_flush_at = None;
    }
}

/// Doubles the base delay per consecutive failing round, capped.
fn backoff_delay(config: &PipelineConfig, failed_rounds: u32) -> Duration {
    let exponent = failed_rounds.saturating_sub(1).min(16);
    config
        .retry_backoff_base
        .saturating_mul(2u32.saturating_pow(exponent))
        .min(config.retry_backoff_cap)
}

fn note_success(inner: &Arc<PipelineInner>) {
    let mut state = inner.state();
    if !state.online {
        info!("delivery succeeded, connectivity belief restored");
    }
    state.online = true;
}

fn note_failure(inner: &Arc<PipelineInner>, message: String, network: bool) {
    inner.counters.failed.fetch_add(1, Ordering::Relaxed);
    let mut state = inner.state();
    if network && state.online {
        info!("network error, connectivity belief dropped");
        state.online = false;
    }
    state.last_error = Some(message);
}

fn requeue_failed(inner: &Arc<PipelineInner>, envelope: Envelope) {
    inner.counters.requeued.fetch_add(1, Ordering::Relaxed);
    let mut state = inner.state();
    state.queue.requeue(envelope);
}

async fn run_worker(inner: Arc<PipelineInner>, mut shutdown: watch::Receiver<bool>) {
    debug!("delivery worker started");
    loop {
        tokio::select! {
            _ = inner.wake.notified() => {},
            () = tokio::time::sleep(inner.config.flush_interval) => {},
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            },
        }
        if *shutdown.borrow() {
            break;
        }
        if !should_flush(&inner) {
            continue;
        }
        let outcome = flush_round(&inner).await;
        conclude_round(&inner, &outcome);
    }
    debug!("delivery worker stopped");
}

fn should_flush(inner: &Arc<PipelineInner>) -> bool {
    let state = inner.state();
    if state.queue.is_empty() || !state.online {
        return false;
    }
    match state.next_flush_at {
        Some(at) => Instant::now() >= at,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::filter::ExclusionRules;
    use crate::delivery::transport::ScriptedTransport;

    fn quick_config() -> PipelineConfig {
        PipelineConfig {
            batch_size: 10,
            send_interval: Duration::from_millis(1),
            flush_interval: Duration::from_secs(60),
            retry_backoff_base: Duration::from_millis(20),
            retry_backoff_cap: Duration::from_millis(100),
            shutdown_drain: Duration::from_secs(2),
            start_online: true,
        }
    }

    fn pipeline_with(
        transport: Arc<ScriptedTransport>,
        config: PipelineConfig,
    ) -> DeliveryPipeline {
        DeliveryPipeline::new(
            config,
            SenderIdentity {
                username: "Cohort".to_string(),
                avatar_url: None,
            },
            ObservationFilter::new(1.0, ExclusionRules::default()),
            transport,
            DeliveryQueue::new(),
        )
    }

    fn observation(kind: &str) -> OutboundObservation {
        OutboundObservation::new(kind, "CalmHeron1204")
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        for _ in 0..400 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached within two seconds");
    }

    #[tokio::test]
    async fn filtered_observation_never_reaches_transport() {
        let transport = Arc::new(ScriptedTransport::delivering());
        let pipeline = DeliveryPipeline::new(
            quick_config(),
            SenderIdentity {
                username: "Cohort".to_string(),
                avatar_url: None,
            },
            ObservationFilter::new(0.0, ExclusionRules::default()),
            transport.clone(),
            DeliveryQueue::new(),
        );

        let submission = pipeline.submit(observation("page_view"));
        assert!(submission.is_filtered());
        assert_eq!(transport.sent_count(), 0);
        let health = pipeline.health();
        assert_eq!(health.filtered, 1);
        assert_eq!(health.queue_size, 0);
    }

    #[tokio::test]
    async fn online_submission_sends_immediately() {
        let transport = Arc::new(ScriptedTransport::delivering());
        let pipeline = pipeline_with(transport.clone(), quick_config());

        let Submission::Immediate(send) = pipeline.submit(observation("page_view")) else {
            panic!("expected immediate submission while online");
        };
        assert!(send.outcome().await.is_delivered());
        assert_eq!(transport.sent_count(), 1);

        let health = pipeline.health();
        assert_eq!(health.delivered, 1);
        assert_eq!(health.queue_size, 0);
        assert!(health.is_online);
    }

    #[tokio::test]
    async fn offline_submission_queues() {
        let transport = Arc::new(ScriptedTransport::delivering());
        let config = PipelineConfig {
            start_online: false,
            ..quick_config()
        };
        let pipeline = pipeline_with(transport.clone(), config);

        let submission = pipeline.submit(observation("page_view"));
        assert!(matches!(submission, Submission::Queued { queue_size: 1 }));
        assert_eq!(transport.sent_count(), 0);
        assert_eq!(pipeline.health().queue_size, 1);
    }

    #[tokio::test]
    async fn high_priority_attempts_even_while_offline() {
        let transport = Arc::new(ScriptedTransport::failing("cable unplugged"));
        let config = PipelineConfig {
            start_online: false,
            ..quick_config()
        };
        let pipeline = pipeline_with(transport.clone(), config);

        let Submission::Immediate(send) =
            pipeline.submit(observation("error").with_priority(Priority::High))
        else {
            panic!("high priority should bypass the offline queue");
        };
        assert!(send.outcome().await.is_network_error());
        assert_eq!(transport.sent_count(), 1);

        let health = pipeline.health();
        assert_eq!(health.failed, 1);
        assert_eq!(health.requeued, 1);
        assert_eq!(health.queue_size, 1);
        assert!(!health.is_online);
        assert_eq!(health.last_error.as_deref(), Some("cable unplugged"));
    }

    #[tokio::test]
    async fn failed_immediate_send_flips_belief_offline() {
        let transport = Arc::new(ScriptedTransport::failing("dns failure"));
        let pipeline = pipeline_with(transport, quick_config());

        let Submission::Immediate(send) = pipeline.submit(observation("page_view")) else {
            panic!("expected immediate submission while online");
        };
        send.outcome().await;

        let health = pipeline.health();
        assert!(!health.is_online);
        assert_eq!(health.queue_size, 1);

        // Follow-up submissions now take the queued path.
        assert!(pipeline.submit(observation("page_view")).is_queued());
    }

    #[tokio::test]
    async fn flush_round_caps_at_batch_size_in_fifo_order() {
        let transport = Arc::new(ScriptedTransport::delivering());
        let config = PipelineConfig {
            start_online: false,
            ..quick_config()
        };
        let pipeline = pipeline_with(transport.clone(), config);

        for i in 0..12 {
            pipeline.submit(observation(&format!("observation_{i:02}")));
        }
        assert_eq!(pipeline.health().queue_size, 12);

        let outcome = flush_round(&pipeline.inner).await;
        assert_eq!(outcome.delivered, 10);
        assert_eq!(pipeline.health().queue_size, 2);

        let titles: Vec<String> = transport
            .sent()
            .iter()
            .map(|p| p.embeds[0].title.clone())
            .collect();
        let expected: Vec<String> = (0..10).map(|i| format!("Observation {i:02}")).collect();
        assert_eq!(titles, expected);

        let outcome = flush_round(&pipeline.inner).await;
        assert_eq!(outcome.delivered, 2);
        assert_eq!(pipeline.health().queue_size, 0);
    }

    #[tokio::test]
    async fn flush_now_drains_everything() {
        let transport = Arc::new(ScriptedTransport::delivering());
        let config = PipelineConfig {
            start_online: false,
            ..quick_config()
        };
        let pipeline = pipeline_with(transport.clone(), config);

        for i in 0..15 {
            pipeline.submit(observation(&format!("observation_{i:02}")));
        }
        pipeline.flush_now().await;

        assert_eq!(pipeline.health().queue_size, 0);
        assert_eq!(pipeline.health().delivered, 15);
        assert_eq!(transport.sent_count(), 15);
    }

    #[tokio::test]
    async fn backlog_converges_once_the_transport_heals() {
        let transport = Arc::new(ScriptedTransport::failing("dns failure"));
        let config = PipelineConfig {
            start_online: false,
            ..quick_config()
        };
        let pipeline = pipeline_with(transport.clone(), config);

        for i in 0..15 {
            pipeline.submit(observation(&format!("observation_{i:02}")));
        }

        // While the transport is down a flush makes no progress; the
        // backlog must survive intact.
        pipeline.flush_now().await;
        let stalled = pipeline.health();
        assert_eq!(stalled.queue_size, 15);
        assert_eq!(stalled.delivered, 0);
        assert!(stalled.requeued >= 1);
        assert!(!stalled.is_online);

        transport.set_default(TransportResult::Delivered);
        pipeline.flush_now().await;

        let healed = pipeline.health();
        assert_eq!(healed.queue_size, 0);
        assert_eq!(healed.delivered, 15);
        assert!(healed.is_online);

        // Retries may duplicate sends, but every observation arrives.
        let distinct: std::collections::BTreeSet<String> = transport
            .sent()
            .iter()
            .map(|p| p.embeds[0].title.clone())
            .collect();
        assert_eq!(distinct.len(), 15);
    }

    #[tokio::test]
    async fn rejected_round_backs_off_but_stays_online() {
        let transport = Arc::new(ScriptedTransport::rejecting(500));
        let config = PipelineConfig {
            start_online: false,
            ..quick_config()
        };
        let pipeline = pipeline_with(transport.clone(), config);
        pipeline.submit(observation("a"));
        pipeline.submit(observation("b"));
        pipeline.set_online(true);

        pipeline.flush_now().await;

        let health = pipeline.health();
        assert_eq!(health.queue_size, 2);
        assert_eq!(health.failed, 2);
        assert_eq!(health.requeued, 2);
        assert_eq!(health.last_error.as_deref(), Some("webhook status 500"));
        assert!(pipeline.inner.state().next_flush_at.is_some());
        // Rejections mean the endpoint is reachable, so the belief holds.
        assert!(health.is_online);
        assert_eq!(transport.sent_count(), 2);
    }

    #[tokio::test]
    async fn network_error_aborts_the_round() {
        let transport = Arc::new(ScriptedTransport::failing("socket refused"));
        let config = PipelineConfig {
            start_online: false,
            ..quick_config()
        };
        let pipeline = pipeline_with(transport.clone(), config);
        for kind in ["a", "b", "c"] {
            pipeline.submit(observation(kind));
        }

        pipeline.flush_now().await;

        // Only the first payload was attempted; the rest never left the
        // queue once the connection proved dead.
        assert_eq!(transport.sent_count(), 1);
        assert_eq!(pipeline.health().queue_size, 3);
        assert!(!pipeline.health().is_online);
    }

    #[tokio::test]
    async fn worker_flushes_when_connectivity_returns() {
        let transport = Arc::new(ScriptedTransport::delivering());
        let config = PipelineConfig {
            batch_size: 3,
            start_online: false,
            ..quick_config()
        };
        let pipeline = pipeline_with(transport.clone(), config);
        let worker = pipeline.spawn_worker();

        for kind in ["a", "b", "c"] {
            pipeline.submit(observation(kind));
        }
        // Batch threshold reached, but the worker holds off while offline.
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(transport.sent_count(), 0);

        pipeline.set_online(true);
        wait_until(|| pipeline.health().delivered == 3).await;
        assert_eq!(pipeline.health().queue_size, 0);

        pipeline.shutdown(None).await;
        let _ = worker.await;
    }

    #[tokio::test]
    async fn delivery_success_restores_online_belief() {
        let transport = Arc::new(ScriptedTransport::delivering());
        let config = PipelineConfig {
            start_online: false,
            ..quick_config()
        };
        let pipeline = pipeline_with(transport, config);
        pipeline.submit(observation("queued_while_offline"));

        pipeline.flush_now().await;
        assert!(pipeline.health().is_online);
    }

    #[tokio::test]
    async fn shutdown_sends_summary_and_drains() {
        let transport = Arc::new(ScriptedTransport::delivering());
        let config = PipelineConfig {
            start_online: false,
            ..quick_config()
        };
        let pipeline = pipeline_with(transport.clone(), config);
        let worker = pipeline.spawn_worker();

        pipeline.submit(observation("queued_a"));
        pipeline.submit(observation("queued_b"));
        pipeline
            .shutdown(Some(observation("session_summary")))
            .await;

        assert_eq!(transport.sent_count(), 3);
        assert_eq!(pipeline.health().queue_size, 0);
        let _ = worker.await;
    }

    #[tokio::test]
    async fn shutdown_without_worker_still_drains() {
        let transport = Arc::new(ScriptedTransport::delivering());
        let config = PipelineConfig {
            start_online: false,
            ..quick_config()
        };
        let pipeline = pipeline_with(transport.clone(), config);
        pipeline.submit(observation("only"));
        pipeline.shutdown(None).await;
        assert_eq!(transport.sent_count(), 1);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let config = PipelineConfig {
            retry_backoff_base: Duration::from_secs(1),
            retry_backoff_cap: Duration::from_secs(60),
            ..PipelineConfig::default()
        };
        assert_eq!(backoff_delay(&config, 1), Duration::from_secs(1));
        assert_eq!(backoff_delay(&config, 2), Duration::from_secs(2));
        assert_eq!(backoff_delay(&config, 3), Duration::from_secs(4));
        assert_eq!(backoff_delay(&config, 7), Duration::from_secs(60));
        assert_eq!(backoff_delay(&config, 30), Duration::from_secs(60));
    }
}
