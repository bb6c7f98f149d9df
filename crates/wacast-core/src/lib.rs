//! Wacast core: campaign materialization, planning and outbound dispatch.
//!
//! The modules here form the pipeline between a stored campaign and the
//! provider wire:
//!
//! - [`template`]: template schema resolution (snapshot or upstream store)
//! - [`materialize`]: variable mapping + button resolution per recipient
//! - [`planner`]: read-only dispatch plan computation
//! - [`payload`]: provider message payload construction + idempotency keys
//! - [`provider`]: provider adapter seam and sender resolution
//! - [`outbound`]: durable job queue and the dispatch worker
//! - [`retry`]: failed-recipient retry on top of the send ledger

pub mod materialize;
pub mod outbound;
pub mod payload;
pub mod planner;
pub mod provider;
pub mod retry;
pub mod template;
