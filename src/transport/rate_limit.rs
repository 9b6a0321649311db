//! Leaky-bucket pacing for outbound requests.
//!
//! Tokens leave the bucket at a fixed interval of `period / rate`. A caller that
//! arrives before its slot waits for it while holding the bucket, so callers
//! are served one at a time and in arrival order. There is no queue limit and
//! no cancellation: waiting is the only form of backpressure.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Evenly spaced request pacing.
#[derive(Debug)]
pub struct LeakyBucket {
    interval: Duration,
    // Instant the most recent token was released at.
    last: Mutex<Option<Instant>>,
}

impl LeakyBucket {
    /// Release `rate` tokens per `period`.
    ///
    /// A zero rate disables pacing.
    pub fn new(rate: u32, period: Duration) -> Self {
        let interval = if rate == 0 {
            Duration::ZERO
        } else {
            period / rate
        };
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    /// Release `requests_per_minute` tokens per minute.
    pub fn per_minute(requests_per_minute: u32) -> Self {
        Self::new(requests_per_minute, Duration::from_secs(60))
    }

    /// Pacing disabled; every take returns immediately.
    pub fn unlimited() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Time between two released tokens.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for the next token.
    ///
    /// Returns the instant the token was released at.
    pub async fn take(&self) -> Instant {
        let mut last = self.last.lock().await;
        let now = Instant::now();

        let slot = match *last {
            Some(previous) if self.interval > Duration::ZERO => {
                let next = previous + self.interval;
                if next > now {
                    tokio::time::sleep(next - now).await;
                    next
                } else {
                    now
                }
            }
            _ => now,
        };

        *last = Some(slot);
        slot
    }
}
