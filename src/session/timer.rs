use std::pin::Pin;
use std::time::Duration;
use tokio::time::Sleep;

/// Single-slot deferred action: arming replaces whatever was pending.
///
/// The sleep lives inside the slot, so polling `fired()` from a
/// `select!` that picks another branch loses nothing.
#[derive(Debug, Default)]
pub struct PendingTimer {
    sleep: Option<Pin<Box<Sleep>>>,
}

impl PendingTimer {
    pub fn arm(&mut self, after: Duration) {
        self.sleep = Some(Box::pin(tokio::time::sleep(after)));
    }

    pub fn cancel(&mut self) {
        self.sleep = None;
    }

    #[cfg(test)]
    pub fn is_armed(&self) -> bool {
        self.sleep.is_some()
    }

    /// Completes once the armed timer expires; never completes while idle
    pub async fn fired(&mut self) {
        match self.sleep.as_mut() {
            Some(sleep) => {
                sleep.as_mut().await;
                self.sleep = None;
            }
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Instant};

    #[tokio::test(start_paused = true)]
    async fn rearming_pushes_the_deadline_back() {
        let start = Instant::now();
        let mut timer = PendingTimer::default();
        timer.arm(Duration::from_millis(300));
        tokio::time::sleep(Duration::from_millis(200)).await;
        timer.arm(Duration::from_millis(300));

        timer.fired().await;
        assert_eq!(start.elapsed().as_millis(), 500);
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_and_cancelled_timers_never_fire() {
        let mut timer = PendingTimer::default();
        assert!(timeout(Duration::from_secs(10), timer.fired()).await.is_err());

        timer.arm(Duration::from_millis(10));
        timer.cancel();
        assert!(timeout(Duration::from_secs(10), timer.fired()).await.is_err());
    }
}
