//! Fixed-period background jobs with a stop handle.
//!
//! A job runs inline in the timer loop, so a slow run delays the next one instead
//! of overlapping it; ticks missed meanwhile are skipped, not replayed. Stopping
//! (or dropping) the handle aborts the task, which also cancels a request that is
//! still in flight.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

#[derive(Default)]
struct PollStats {
    runs: AtomicU64,
    in_flight: AtomicBool,
}

pub struct PollHandle {
    name: &'static str,
    task: Option<JoinHandle<()>>,
    stats: Arc<PollStats>,
}

impl PollHandle {
    /// Completed runs so far.
    pub fn runs(&self) -> u64 { self.stats.runs.load(Ordering::Acquire) }

    pub fn is_in_flight(&self) -> bool { self.stats.in_flight.load(Ordering::Acquire) }

    pub fn is_running(&self) -> bool { self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false) }

    pub fn stop(mut self) { self.abort(); }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(target: "poller", "poller '{}' stopped after {} runs", self.name, self.runs());
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) { self.abort(); }
}

/// Run `job` now and then every `period` until the handle is stopped.
pub fn spawn_poller<F, Fut>(name: &'static str, period: Duration, mut job: F) -> PollHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let stats = Arc::new(PollStats::default());
    let task_stats = stats.clone();
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            task_stats.in_flight.store(true, Ordering::Release);
            job().await;
            task_stats.in_flight.store(false, Ordering::Release);
            task_stats.runs.fetch_add(1, Ordering::AcqRel);
        }
    });
    debug!(target: "poller", "poller '{}' started period_ms={}", name, period.as_millis());
    PollHandle { name, task: Some(task), stats }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(start_paused = true)]
    async fn runs_immediately_then_every_period() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let handle = spawn_poller("count", Duration::from_secs(30), move || {
            let h = h.clone();
            async move { h.fetch_add(1, Ordering::SeqCst); }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(handle.runs(), 3);
        handle.stop();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_jobs_never_overlap() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (a, p) = (active.clone(), peak.clone());
        let handle = spawn_poller("slow", Duration::from_millis(10), move || {
            let (a, p) = (a.clone(), p.clone());
            async move {
                let now = a.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(45)).await;
                a.fetch_sub(1, Ordering::SeqCst);
            }
        });
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        // one run per ~50ms, never one per tick
        assert!(handle.runs() <= 11, "runs={}", handle.runs());
        drop(handle);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels_in_flight_job() {
        let finished = Arc::new(AtomicBool::new(false));
        let f = finished.clone();
        let handle = spawn_poller("hang", Duration::from_secs(1), move || {
            let f = f.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                f.store(true, Ordering::SeqCst);
            }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_in_flight());
        drop(handle);
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }
}
