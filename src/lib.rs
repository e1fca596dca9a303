//! ReplyPilot — comment automation pipeline.

pub mod classify;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fingerprint;
pub mod pipeline;
pub mod platform;
pub mod queue;
pub mod response;
pub mod retry;
pub mod rules;
pub mod safety;
pub mod store;

pub use error::{Error, Result};
