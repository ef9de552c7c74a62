//! Fixed-window admission control for background tasks.
//!
//! [`ThrottledExecutor`] admits at most `max_per_window` tasks per window
//! and queues the rest in submission order. A repeating job resets the
//! window counter and drains the backlog. Only the admission rate is
//! capped: admitted tasks are spawned and run concurrently, and their
//! outcomes are never observed by the executor.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

use crate::enrich::lock_or_recover;
use crate::error::{EnrichError, EnrichResult};

/// An opaque unit of background work.
pub type QueueTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Queue and counter for one rate window.
///
/// Pure state machine: [`push`](Self::push) enqueues, [`admit`](Self::admit)
/// pops as many items as the remaining quota allows, and
/// [`reset`](Self::reset) starts a new window.
pub struct ThrottleWindow<T> {
    max_per_window: u32,
    admitted: u32,
    backlog: VecDeque<T>,
    max_backlog: Option<usize>,
}

impl<T> ThrottleWindow<T> {
    #[must_use]
    pub fn new(max_per_window: u32) -> Self {
        Self {
            max_per_window,
            admitted: 0,
            backlog: VecDeque::new(),
            max_backlog: None,
        }
    }

    /// Reject new items once `limit` items are waiting and the current
    /// window has no quota left.
    #[must_use]
    pub fn with_max_backlog(mut self, limit: usize) -> Self {
        self.max_backlog = Some(limit);
        self
    }

    /// Append an item to the back of the queue.
    pub fn push(&mut self, item: T) -> EnrichResult<()> {
        if let Some(limit) = self.max_backlog {
            if self.admitted >= self.max_per_window && self.backlog.len() >= limit {
                return Err(EnrichError::BacklogFull { limit });
            }
        }
        self.backlog.push_back(item);
        Ok(())
    }

    /// Pop queued items, oldest first, while the window has quota left.
    pub fn admit(&mut self) -> Vec<T> {
        let mut ready = Vec::new();
        while self.admitted < self.max_per_window {
            let Some(item) = self.backlog.pop_front() else {
                break;
            };
            self.admitted += 1;
            ready.push(item);
        }
        ready
    }

    /// Start a new window.
    pub fn reset(&mut self) {
        self.admitted = 0;
    }

    pub fn pending(&self) -> usize {
        self.backlog.len()
    }

    pub const fn admitted(&self) -> u32 {
        self.admitted
    }

    pub const fn max_per_window(&self) -> u32 {
        self.max_per_window
    }
}

impl<T> fmt::Debug for ThrottleWindow<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrottleWindow")
            .field("max_per_window", &self.max_per_window)
            .field("admitted", &self.admitted)
            .field("pending", &self.backlog.len())
            .field("max_backlog", &self.max_backlog)
            .finish()
    }
}

/// Rate-limited, fire-and-forget task runner.
///
/// Must be created inside a tokio runtime. The window-reset job stops when
/// the executor is shut down or dropped; tasks already admitted keep
/// running, queued ones are discarded.
#[derive(Debug)]
pub struct ThrottledExecutor {
    window: Arc<Mutex<ThrottleWindow<QueueTask>>>,
    period: Duration,
    reset_job: JoinHandle<()>,
}

impl ThrottledExecutor {
    /// Admit at most `max_per_window` tasks per `period`, with an unbounded
    /// backlog.
    pub fn new(max_per_window: u32, period: Duration) -> Self {
        Self::start(ThrottleWindow::new(max_per_window), period)
    }

    /// Like [`new`](Self::new), but reject submissions once `max_backlog`
    /// tasks are waiting.
    pub fn with_max_backlog(max_per_window: u32, period: Duration, max_backlog: usize) -> Self {
        Self::start(
            ThrottleWindow::new(max_per_window).with_max_backlog(max_backlog),
            period,
        )
    }

    fn start(window: ThrottleWindow<QueueTask>, period: Duration) -> Self {
        let window = Arc::new(Mutex::new(window));
        let shared = Arc::clone(&window);
        let first_reset = Instant::now() + period;

        let reset_job = tokio::spawn(async move {
            let mut ticker = interval_at(first_reset, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let ready = {
                    let mut window = lock_or_recover(&shared);
                    window.reset();
                    let ready = window.admit();
                    if window.pending() > 0 {
                        log::debug!(
                            "Rate window reset: {} admitted, {} still queued",
                            ready.len(),
                            window.pending()
                        );
                    }
                    ready
                };
                launch(ready);
            }
        });

        Self {
            window,
            period,
            reset_job,
        }
    }

    /// Queue `task` and admit it right away if the window has quota left.
    ///
    /// The task runs exactly once, at its turn in submission order, unless
    /// the executor is dropped first.
    pub fn submit<F>(&self, task: F) -> EnrichResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let ready = {
            let mut window = lock_or_recover(&self.window);
            window.push(Box::pin(task))?;
            window.admit()
        };
        launch(ready);
        Ok(())
    }

    /// Number of tasks waiting for a window slot.
    pub fn pending(&self) -> usize {
        lock_or_recover(&self.window).pending()
    }

    /// Number of tasks admitted in the current window.
    pub fn admitted_in_window(&self) -> u32 {
        lock_or_recover(&self.window).admitted()
    }

    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Stop the window-reset job. Tasks still queued will not be admitted
    /// beyond the current window's remaining quota.
    pub fn shutdown(&self) {
        self.reset_job.abort();
    }
}

impl Drop for ThrottledExecutor {
    fn drop(&mut self) {
        self.reset_job.abort();
    }
}

fn launch(tasks: Vec<QueueTask>) {
    for task in tasks {
        tokio::spawn(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Let spawned tasks run to completion on the paused test runtime.
    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    fn counting_task(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = Arc::clone(counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_window_admits_up_to_quota() {
        let mut window = ThrottleWindow::new(2);
        for i in 0..5 {
            window.push(i).unwrap();
        }
        assert_eq!(window.admit(), vec![0, 1]);
        assert_eq!(window.admit(), Vec::<i32>::new());
        assert_eq!(window.pending(), 3);
        assert_eq!(window.admitted(), 2);
    }

    #[test]
    fn test_window_is_fifo_across_resets() {
        let mut window = ThrottleWindow::new(2);
        let mut order = Vec::new();
        for i in 0..5 {
            window.push(i).unwrap();
            order.extend(window.admit());
        }
        while window.pending() > 0 {
            window.reset();
            order.extend(window.admit());
        }
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_window_never_exceeds_quota_and_admits_everything_once() {
        for quota in 1..=4u32 {
            let mut window = ThrottleWindow::new(quota);
            let mut seen = Vec::new();
            for batch in 0..6 {
                for j in 0..(batch * 3) % 7 {
                    window.push(batch * 10 + j).unwrap();
                }
                let admitted = window.admit();
                assert!(admitted.len() <= quota as usize);
                seen.extend(admitted);
                window.reset();
            }
            while window.pending() > 0 {
                let admitted = window.admit();
                assert!(admitted.len() <= quota as usize);
                seen.extend(admitted);
                window.reset();
            }
            let mut sorted = seen.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), seen.len(), "no item admitted twice");
            assert_eq!(seen, sorted, "admission order matches submission order");
        }
    }

    #[test]
    fn test_window_backlog_limit() {
        let mut window = ThrottleWindow::new(1).with_max_backlog(2);
        window.push("a").unwrap();
        assert_eq!(window.admit(), vec!["a"]);
        window.push("b").unwrap();
        window.push("c").unwrap();
        let err = window.push("d").unwrap_err();
        assert!(matches!(err, EnrichError::BacklogFull { limit: 2 }));
        assert_eq!(window.pending(), 2);

        window.reset();
        assert_eq!(window.admit(), vec!["b"]);
        assert!(window.push("d").is_ok());
    }

    #[test]
    fn test_backlog_limit_does_not_block_immediate_admission() {
        let mut window = ThrottleWindow::new(3).with_max_backlog(0);
        window.push(1).unwrap();
        assert_eq!(window.admit(), vec![1]);
        window.push(2).unwrap();
        assert_eq!(window.admit(), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_five_tasks_quota_two_drain_over_three_windows() {
        let executor = ThrottledExecutor::new(2, Duration::from_secs(60));
        let ran = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            executor.submit(counting_task(&ran)).unwrap();
        }
        settle().await;
        assert_eq!(ran.load(Ordering::SeqCst), 2);
        assert_eq!(executor.pending(), 3);
        assert_eq!(executor.admitted_in_window(), 2);

        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(ran.load(Ordering::SeqCst), 4);
        assert_eq!(executor.pending(), 1);

        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(ran.load(Ordering::SeqCst), 5);
        assert_eq!(executor.pending(), 0);
        assert_eq!(executor.admitted_in_window(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_admitted_before_window_ends() {
        let executor = ThrottledExecutor::new(1, Duration::from_secs(60));
        let ran = Arc::new(AtomicUsize::new(0));

        executor.submit(counting_task(&ran)).unwrap();
        executor.submit(counting_task(&ran)).unwrap();
        settle().await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(59)).await;
        settle().await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(ran.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_task_does_not_stop_the_executor() {
        let executor = ThrottledExecutor::new(1, Duration::from_secs(60));
        let ran = Arc::new(AtomicUsize::new(0));

        executor
            .submit(async {
                panic!("task failure");
            })
            .unwrap();
        executor.submit(counting_task(&ran)).unwrap();
        settle().await;

        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_window_resets() {
        let executor = ThrottledExecutor::new(1, Duration::from_secs(60));
        let ran = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            executor.submit(counting_task(&ran)).unwrap();
        }
        settle().await;
        drop(executor);

        tokio::time::advance(Duration::from_secs(180)).await;
        settle().await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_executor_rejects_when_backlog_full() {
        let executor = ThrottledExecutor::with_max_backlog(1, Duration::from_secs(60), 1);
        let ran = Arc::new(AtomicUsize::new(0));

        executor.submit(counting_task(&ran)).unwrap();
        executor.submit(counting_task(&ran)).unwrap();
        let err = executor.submit(counting_task(&ran)).unwrap_err();
        assert!(matches!(err, EnrichError::BacklogFull { .. }));
        assert_eq!(executor.pending(), 1);
    }
}
