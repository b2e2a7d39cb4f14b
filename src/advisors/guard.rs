use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::types::AdvisorKind;
use crate::error::{AdvisorError, AdvisorResult};

/// Run one advisor call under its own timeout.
///
/// A timeout becomes [`AdvisorError::Timeout`]; the caller decides how to
/// degrade.
pub async fn guarded<T, F>(kind: AdvisorKind, timeout_ms: u64, call: F) -> AdvisorResult<T>
where
    F: Future<Output = AdvisorResult<T>>,
{
    let start = Instant::now();
    let outcome = tokio::time::timeout(Duration::from_millis(timeout_ms), call).await;
    debug!(
        advisor = %kind,
        latency_ms = start.elapsed().as_millis(),
        "Advisor call finished"
    );
    match outcome {
        Ok(result) => result,
        Err(_) => Err(AdvisorError::Timeout {
            advisor: kind.to_string(),
            timeout_ms,
        }),
    }
}

/// Advisors that failed or timed out during one turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DegradedAdvisors(Vec<AdvisorKind>);

impl DegradedAdvisors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unwrap a successful result, or log the failure, record the advisor and
    /// return `None`.
    pub fn absorb<T>(&mut self, kind: AdvisorKind, result: AdvisorResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(advisor = %kind, error = %e, "Advisor degraded to no-op for this turn");
                if !self.0.contains(&kind) {
                    self.0.push(kind);
                }
                None
            }
        }
    }

    pub fn contains(&self, kind: AdvisorKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn kinds(&self) -> &[AdvisorKind] {
        &self.0
    }
}
