use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Single in-flight flag: at most one holder of a permit at a time.
#[derive(Debug, Clone, Default)]
pub struct InFlightGuard {
    busy: Arc<AtomicBool>,
}

/// Held while work runs; dropping it clears the flag, also on panic or abort.
#[derive(Debug)]
pub struct InFlightPermit {
    busy: Arc<AtomicBool>,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when another permit is still alive.
    pub fn try_acquire(&self) -> Option<InFlightPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightPermit {
                busy: self.busy.clone(),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_the_permit_is_dropped() {
        let guard = InFlightGuard::new();
        let permit = guard.try_acquire().unwrap();
        assert!(guard.is_busy());
        assert!(guard.try_acquire().is_none());
        assert!(guard.clone().try_acquire().is_none());

        drop(permit);
        assert!(!guard.is_busy());
        assert!(guard.try_acquire().is_some());
    }

    #[tokio::test]
    async fn aborted_task_releases_the_flag() {
        let guard = InFlightGuard::new();
        let permit = guard.try_acquire().unwrap();
        let handle = tokio::spawn(async move {
            let _permit = permit;
            std::future::pending::<()>().await;
        });
        handle.abort();
        let _ = handle.await;
        assert!(!guard.is_busy());
    }
}
