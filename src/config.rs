//! Configuration types.

use std::time::Duration;

use crate::retry::RetryPolicy;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// How many pending comments one batch run claims at most.
    pub batch_size: usize,
    /// Interval between batch runs.
    pub batch_interval: Duration,
    /// Interval between staleness sweeps.
    pub sweep_interval: Duration,
    /// A `processing` row older than this is considered abandoned and reset.
    pub stale_processing_threshold: Duration,
    /// A `pending` row untouched for this long is surfaced by the sweep.
    pub stale_pending_threshold: Duration,
    /// Default TTL for response cache entries.
    pub cache_ttl: Duration,
    /// Retry policy for platform dispatch calls.
    pub dispatch_retry: RetryPolicy,
    /// Retry policy for AI generation calls.
    pub generation_retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 25,
            batch_interval: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(300), // 5 minutes
            stale_processing_threshold: Duration::from_secs(600), // 10 minutes
            stale_pending_threshold: Duration::from_secs(3600), // 1 hour
            cache_ttl: Duration::from_secs(7 * 24 * 3600), // 1 week
            dispatch_retry: RetryPolicy::default(),
            generation_retry: RetryPolicy::default(),
        }
    }
}
