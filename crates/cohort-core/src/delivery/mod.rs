//! Observation delivery to the webhook endpoint.
//!
//! Submission is non-blocking: the caller hands an observation to
//! [`DeliveryPipeline::submit`] and continues immediately. Each accepted
//! observation takes one of these paths:
//!
//! ```text
//!                      ┌─ Filtered (sampling / exclusion rule)
//!   submit ────────────┤
//!                      ├─ Immediate ── transport ──┬─ Delivered
//!                      │   (online or high prio)   └─ Failed ── requeued at tail
//!                      │
//!                      └─ Queued ── Flushing ── transport ──┬─ Delivered
//!                           ▲        (FIFO, paced, batched) └─ Failed ─┐
//!                           └────────────────────────────────────────────┘
//! ```
//!
//! Delivery is at-least-once: a payload that fails transmission returns to
//! the queue tail and is retried on a later flush with exponential backoff
//! between failing rounds. Duplicates are possible, losses are not, except
//! at teardown where the final flush is fire-and-forget.

mod filter;
mod observation;
mod pipeline;
mod queue;
mod transport;
mod wire;

pub use filter::{ExclusionRules, FilterReason, ObservationFilter};
pub use observation::{OutboundObservation, Priority};
pub use pipeline::{
    DeliveryPipeline, ImmediateSend, PipelineConfig, PipelineHealth, Submission,
};
pub use queue::{DeliveryQueue, Envelope, QUEUE_JOURNAL_KEY};
pub use transport::{HttpTransport, ScriptedTransport, Transport, TransportResult};
pub use wire::{payload_for, Embed, EmbedField, SenderIdentity, WirePayload};
