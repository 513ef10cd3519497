use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;

/// Default spacing between the end of one model call and the start of the next.
pub const DEFAULT_PACING: Duration = Duration::from_secs(20);

/// Gate around model calls.
///
/// `acquire` before a call, `release` once it has finished, success or not.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn acquire(&self);
    async fn release(&self);
}

/// Single-slot bucket that refills `interval` after the previous call completed.
///
/// `acquire` takes the slot and holds it until `release`, so concurrent callers
/// queue behind each other. The first call goes through immediately.
pub struct IntervalLimiter {
    interval: Duration,
    slot: Semaphore,
    held: AtomicBool,
    next_allowed: Mutex<Option<Instant>>,
}

impl IntervalLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            slot: Semaphore::new(1),
            held: AtomicBool::new(false),
            next_allowed: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[async_trait]
impl RateLimiter for IntervalLimiter {
    async fn acquire(&self) {
        // The semaphore is never closed.
        if let Ok(permit) = self.slot.acquire().await {
            permit.forget();
            self.held.store(true, Ordering::SeqCst);
        }

        let deadline = *self.next_allowed.lock().await;
        if let Some(deadline) = deadline {
            if deadline > Instant::now() {
                tracing::debug!(
                    wait_ms = deadline.saturating_duration_since(Instant::now()).as_millis() as u64,
                    "pacing model call"
                );
                tokio::time::sleep_until(deadline).await;
            }
        }
    }

    async fn release(&self) {
        *self.next_allowed.lock().await = Some(Instant::now() + self.interval);
        // A release without a matching acquire must not mint a second slot.
        if self.held.swap(false, Ordering::SeqCst) {
            self.slot.add_permits(1);
        }
    }
}

/// No pacing at all. For tests and one-off runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unpaced;

#[async_trait]
impl RateLimiter for Unpaced {
    async fn acquire(&self) {}
    async fn release(&self) {}
}
