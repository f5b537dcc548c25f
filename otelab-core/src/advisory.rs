//! Advisory cache shared with a background news/context collaborator.
//!
//! The collaborator publishes an `Advisory` from its own thread. The engine never
//! blocks on it: each bar it attempts one non-blocking read and, when the lock is
//! contended, keeps the last snapshot it managed to read. Staleness is accepted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock, TryLockError};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advisory {
    /// Scales new position size; expected in [0, 1].
    pub risk_multiplier: f64,
    pub entries_blocked: bool,
    pub updated_at: DateTime<Utc>,
}

impl Advisory {
    pub fn neutral(updated_at: DateTime<Utc>) -> Self {
        Self {
            risk_multiplier: 1.0,
            entries_blocked: false,
            updated_at,
        }
    }

    /// Multiplier clamped to [0, 1]. A non-finite value counts as 0.
    pub fn effective_multiplier(&self) -> f64 {
        if self.risk_multiplier.is_finite() {
            self.risk_multiplier.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Writer-side handle. Cloning shares the same slot.
#[derive(Debug, Clone, Default)]
pub struct AdvisoryCache {
    slot: Arc<RwLock<Option<Advisory>>>,
}

impl AdvisoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, advisory: Advisory) {
        let mut slot = self.slot.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(advisory);
    }

    pub fn clear(&self) {
        let mut slot = self.slot.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = None;
    }

    /// One non-blocking read. `None` when a writer holds the lock.
    pub fn try_snapshot(&self) -> Option<Option<Advisory>> {
        match self.slot.try_read() {
            Ok(guard) => Some(guard.clone()),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner().clone()),
            Err(TryLockError::WouldBlock) => None,
        }
    }
}

/// Engine-side view: the last advisory successfully read.
#[derive(Debug, Clone, Default)]
pub struct AdvisoryReader {
    cache: Option<AdvisoryCache>,
    last_good: Option<Advisory>,
}

impl AdvisoryReader {
    pub fn new(cache: AdvisoryCache) -> Self {
        Self {
            cache: Some(cache),
            last_good: None,
        }
    }

    /// Reader with no collaborator attached; always neutral.
    pub fn detached() -> Self {
        Self::default()
    }

    /// Try to pick up a newer advisory.
    pub fn refresh(&mut self) -> Option<&Advisory> {
        if let Some(cache) = &self.cache {
            match cache.try_snapshot() {
                Some(snapshot) => self.last_good = snapshot,
                None => debug!("Advisory cache contended; keeping last snapshot"),
            }
        }
        self.last_good.as_ref()
    }

    pub fn current(&self) -> Option<&Advisory> {
        self.last_good.as_ref()
    }

    /// 1.0 when no advisory has been seen.
    pub fn risk_multiplier(&self) -> f64 {
        self.last_good
            .as_ref()
            .map(Advisory::effective_multiplier)
            .unwrap_or(1.0)
    }

    pub fn entries_blocked(&self) -> bool {
        self.last_good
            .as_ref()
            .map(|a| a.entries_blocked)
            .unwrap_or(false)
    }
}
