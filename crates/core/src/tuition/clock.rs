//! Time source for ledger timestamps.
//!
//! Repositories stamp records and movements with the clock they were built
//! with, so summaries can be reproduced at a fixed instant in tests.

use std::fmt::Debug;
use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Provides the current instant.
pub trait Clock: Send + Sync + Debug {
    /// Current UTC instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Shared handle to the wall clock.
#[must_use]
pub fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}
