//! Outbound alerting.
//!
//! The pipeline hands every cycle's ranked opportunities to a `Notifier`.
//! Deduplication, throttling and delivery are the notifier's business;
//! nothing it does can fail the cycle.

pub mod telegram;

use async_trait::async_trait;
use tracing::debug;

use crate::types::Opportunity;

/// Receives the ranked opportunity list once per cycle.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Fire-and-forget: delivery errors are logged, never returned.
    async fn notify(&self, opportunities: &[Opportunity]);
}

/// Notifier used when no channel is configured.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, opportunities: &[Opportunity]) {
        debug!(count = opportunities.len(), "Notifier disabled, skipping alerts");
    }
}
