use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Tunables for the distribution service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionConfig {
    /// Lead credits charged per offer sent.
    pub credits_per_distribution: u32,
    /// Minutes an offer stays open before it expires.
    pub response_window_minutes: u32,
}

impl DistributionConfig {
    pub fn response_window(&self) -> Duration {
        Duration::minutes(i64::from(self.response_window_minutes))
    }
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            credits_per_distribution: 1,
            response_window_minutes: 60,
        }
    }
}

/// Source of "now" for timestamps and capacity days.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
