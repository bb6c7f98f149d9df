//! Durable outbound dispatch: job queue, send pipeline and worker.

pub mod pipeline;
pub mod queue;
pub mod worker;

pub use pipeline::{DispatchReport, PipelineError, SendPipeline};
pub use queue::OutboundQueue;
pub use worker::{backoff_delay, OutboundWorker};
