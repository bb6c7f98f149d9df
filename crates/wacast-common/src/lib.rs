//! Wacast common types and utilities

pub mod config;
pub mod error;
pub mod types;

pub use error::{Error, Result};
