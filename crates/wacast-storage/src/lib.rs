//! Wacast storage layer
//!
//! Postgres is the single source of truth for campaign, recipient and job
//! state; there is no separate in-memory queue.

pub mod db;
pub mod models;
pub mod repository;

pub use db::DatabasePool;
