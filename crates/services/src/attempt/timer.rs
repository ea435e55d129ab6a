//! Countdown that fires a callback once when it reaches zero.
//!
//! Time is measured with tokio's monotonic clock against a fixed deadline, so
//! late wakeups shorten the next sleep instead of stretching the countdown.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug)]
struct TimerShared {
    remaining_ticks: AtomicU32,
    cancelled: AtomicBool,
    fired: AtomicBool,
    wake: Notify,
}

/// Handle to a running countdown task.
///
/// Dropping the handle cancels the countdown.
#[derive(Debug)]
pub struct Timer {
    shared: Arc<TimerShared>,
    deadline: Instant,
    tick: Duration,
    handle: JoinHandle<()>,
}

fn ticks_in(left: Duration, tick: Duration) -> u32 {
    let ticks = left.as_nanos().div_ceil(tick.as_nanos().max(1));
    u32::try_from(ticks).unwrap_or(u32::MAX)
}

impl Timer {
    /// Start counting down `ticks` ticks of length `tick` on the current runtime.
    ///
    /// `on_expiry` runs at most once, inside the timer task, and never after
    /// [`Timer::cancel`] has been observed.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start<F, Fut>(ticks: u32, tick: Duration, on_expiry: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let tick = tick.max(Duration::from_millis(1));
        let deadline = Instant::now() + tick * ticks;
        let shared = Arc::new(TimerShared {
            remaining_ticks: AtomicU32::new(ticks),
            cancelled: AtomicBool::new(false),
            fired: AtomicBool::new(false),
            wake: Notify::new(),
        });

        let task_shared = Arc::clone(&shared);
        let handle = tokio::spawn(async move {
            loop {
                if task_shared.cancelled.load(Ordering::Acquire) {
                    return;
                }
                let left = deadline.saturating_duration_since(Instant::now());
                let ticks_left = ticks_in(left, tick);
                task_shared
                    .remaining_ticks
                    .store(ticks_left, Ordering::Release);
                if ticks_left == 0 {
                    break;
                }
                let next_tick = deadline - tick * (ticks_left - 1);
                tokio::select! {
                    biased;
                    () = task_shared.wake.notified() => {}
                    () = tokio::time::sleep_until(next_tick) => {}
                }
            }

            if task_shared.cancelled.load(Ordering::Acquire)
                || task_shared.fired.swap(true, Ordering::AcqRel)
            {
                return;
            }
            tracing::debug!("countdown reached zero");
            on_expiry().await;
        });

        Self {
            shared,
            deadline,
            tick,
            handle,
        }
    }

    /// Stop the countdown. The expiry callback will not start after this returns.
    ///
    /// A callback that is already running is left to finish.
    pub fn cancel(&self) {
        if !self.shared.cancelled.swap(true, Ordering::AcqRel) {
            self.shared.wake.notify_one();
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.shared.fired.load(Ordering::Acquire)
    }

    /// Whole ticks left, as last published by the countdown task.
    #[must_use]
    pub fn remaining_ticks(&self) -> u32 {
        self.shared.remaining_ticks.load(Ordering::Acquire)
    }

    /// Time left until the deadline, measured now.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    #[must_use]
    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Whether the countdown task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_timer(ticks: u32, fired: &Arc<AtomicUsize>) -> Timer {
        let fired = Arc::clone(fired);
        Timer::start(ticks, Duration::from_secs(1), move || async move {
            fired.fetch_add(1, Ordering::SeqCst);
        })
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_at_deadline() {
        let fired = Arc::new(AtomicUsize::new(0));
        let timer = counting_timer(600, &fired);

        tokio::time::advance(Duration::from_secs(599)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(timer.remaining_ticks(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(timer.remaining_ticks(), 0);
        assert!(timer.has_fired());

        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn remaining_ticks_count_down() {
        let fired = Arc::new(AtomicUsize::new(0));
        let timer = counting_timer(10, &fired);
        settle().await;
        assert_eq!(timer.remaining_ticks(), 10);

        tokio::time::advance(Duration::from_secs(3)).await;
        settle().await;
        assert_eq!(timer.remaining_ticks(), 7);
        assert_eq!(timer.remaining(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let fired = Arc::new(AtomicUsize::new(0));
        let timer = counting_timer(5, &fired);

        tokio::time::advance(Duration::from_secs(2)).await;
        timer.cancel();
        settle().await;
        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(timer.is_cancelled());
        assert!(!timer.has_fired());
        assert!(timer.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ticks_fire_immediately() {
        let fired = Arc::new(AtomicUsize::new(0));
        let _timer = counting_timer(0, &fired);
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
