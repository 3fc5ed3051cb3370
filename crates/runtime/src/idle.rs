//! Idle-gated click dispatch for selections that do not come from a pointer
//! (gazetteer hits, picks in the 3D view).
//!
//! The target engine must finish loading the requested view before a
//! synthesized click can be answered, so the dispatcher polls
//! [`MapAdapter::is_idle`] with exponential backoff. The number of checks is
//! bounded; exhaustion surfaces [`DispatchError::IdleTimeout`].

use std::time::Duration;

use foundation::math::GeoPoint;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::adapter::MapAdapter;

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdlePolicy {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Total number of idle checks, including the first one.
    pub max_attempts: u32,
}

impl Default for IdlePolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 20,
            max_delay_ms: 320,
            multiplier: 2.0,
            max_attempts: 50,
        }
    }
}

impl IdlePolicy {
    /// Delay after the `attempt`-th failed check (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.min(i32::MAX as u32) as i32);
        let ms = (self.initial_delay_ms as f64 * factor).min(self.max_delay_ms as f64);
        Duration::from_millis(ms.max(0.0) as u64)
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DispatchError {
    #[error("map engine not idle after {attempts} checks ({waited:?})")]
    IdleTimeout { attempts: u32, waited: Duration },
}

/// Waits until `adapter` reports idle. Returns the number of checks made.
pub async fn wait_until_idle(
    adapter: &dyn MapAdapter,
    policy: &IdlePolicy,
) -> Result<u32, DispatchError> {
    let mut waited = Duration::ZERO;
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 0..max_attempts {
        if adapter.is_idle() {
            return Ok(attempt + 1);
        }
        if attempt + 1 == max_attempts {
            break;
        }
        let delay = policy.delay_for(attempt);
        waited += delay;
        tokio::time::sleep(delay).await;
    }

    warn!(
        "{:?} engine still busy after {max_attempts} checks",
        adapter.engine()
    );
    Err(DispatchError::IdleTimeout {
        attempts: max_attempts,
        waited,
    })
}

#[derive(Debug, Clone, Default)]
pub struct IdleGatedDispatcher {
    policy: IdlePolicy,
}

impl IdleGatedDispatcher {
    pub fn new(policy: IdlePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &IdlePolicy {
        &self.policy
    }

    /// Waits for the engine to settle, then fires a synthetic click at `target`.
    pub async fn dispatch_click(
        &self,
        adapter: &dyn MapAdapter,
        target: GeoPoint,
    ) -> Result<(), DispatchError> {
        let checks = wait_until_idle(adapter, &self.policy).await?;
        debug!(
            "firing synthetic click on {:?} after {checks} idle checks",
            adapter.engine()
        );
        adapter.fire_click(target);
        Ok(())
    }
}
