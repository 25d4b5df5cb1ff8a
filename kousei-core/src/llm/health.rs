//! health.rs - Shared, cached reachability checks for the LLM backend.
//!
//! Callers that arrive while a probe is in flight wait on the same probe instead of
//! starting their own; the outcome is then cached for a TTL.
//!
//! License: MIT OR APACHE 2.0

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};
use tokio::sync::Mutex;

use super::{LlmClient, LlmError};

#[derive(Debug, Clone)]
struct CachedHealth {
    checked_at: Instant,
    result: Result<(), LlmError>,
}

pub struct HealthMonitor {
    client: Arc<dyn LlmClient>,
    ttl: Duration,
    state: Mutex<Option<CachedHealth>>,
    probes: AtomicU64,
}

impl HealthMonitor {
    pub fn new(client: Arc<dyn LlmClient>, ttl: Duration) -> Self {
        Self {
            client,
            ttl,
            state: Mutex::new(None),
            probes: AtomicU64::new(0),
        }
    }

    /// Returns the cached result when fresh, otherwise probes once.
    pub async fn check(&self) -> Result<(), LlmError> {
        // The lock is held across the probe so concurrent callers share its result.
        let mut state = self.state.lock().await;
        if let Some(cached) = state.as_ref() {
            if cached.checked_at.elapsed() < self.ttl {
                return cached.result.clone();
            }
        }

        self.probes.fetch_add(1, Ordering::SeqCst);
        let result = self.client.health_check().await;
        match &result {
            Ok(()) => debug!("LLM health probe succeeded."),
            Err(e) => warn!("LLM health probe failed: {}", e),
        }
        *state = Some(CachedHealth {
            checked_at: Instant::now(),
            result: result.clone(),
        });
        result
    }

    pub async fn is_healthy(&self) -> bool {
        self.check().await.is_ok()
    }

    /// Drops the cached result so the next check probes again.
    pub async fn invalidate(&self) {
        *self.state.lock().await = None;
    }

    /// Number of probes actually sent to the backend.
    pub fn probe_count(&self) -> u64 {
        self.probes.load(Ordering::SeqCst)
    }
}
