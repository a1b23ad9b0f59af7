use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::SessionConfig;
use crate::error::{PlaybackError, Result};

/// Ceiling on consecutive recovery attempts, for callers driving `recover`.
///
/// Sessions never consult a budget themselves.
#[derive(Debug)]
pub struct RecoveryBudget {
    max_attempts: u32,
    attempts: AtomicU32,
}

impl RecoveryBudget {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            attempts: AtomicU32::new(0),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.max_consecutive_recoveries)
    }

    /// Claim one attempt. Returns the 1-based attempt number.
    pub fn begin(&self) -> Result<u32> {
        match self
            .attempts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.max_attempts).then_some(n + 1)
            }) {
            Ok(previous) => Ok(previous + 1),
            Err(attempts) => Err(PlaybackError::RecoveryBudgetExhausted { attempts }),
        }
    }

    /// Call once playback is healthy again.
    pub fn reset(&self) {
        self.attempts.store(0, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempts())
    }
}
