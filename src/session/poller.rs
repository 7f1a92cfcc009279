use log::debug;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::api::models::PeerId;

struct PollTask {
    peer: PeerId,
    handle: JoinHandle<()>,
}

/// Shortest refresh period; tokio intervals reject a zero period.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Fixed-interval refresh for the open chat. Holds at most one task.
pub struct Poller {
    interval: Duration,
    task: Option<PollTask>,
}

impl Poller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(MIN_POLL_INTERVAL),
            task: None,
        }
    }

    /// Runs `tick(peer)` every interval, first one interval from now.
    /// Any task already running is aborted first.
    pub fn start<F, Fut>(&mut self, peer: PeerId, mut tick: F)
    where
        F: FnMut(PeerId) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.stop();
        let period = self.interval;
        let first = Instant::now() + period;
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(first, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                debug!("Polling messages for {}", peer);
                tick(peer).await;
            }
        });
        self.task = Some(PollTask { peer, handle });
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            debug!("Stopping message poll for {}", task.peer);
            task.handle.abort();
        }
    }

    pub fn peer(&self) -> Option<PeerId> {
        self.task.as_ref().map(|t| t.peer)
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.handle.is_finished())
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    fn recorder() -> (Arc<Mutex<Vec<PeerId>>>, impl FnMut(PeerId) -> std::future::Ready<()> + Send + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |peer| {
            sink.lock().unwrap().push(peer);
            std::future::ready(())
        })
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_interval() {
        let (seen, tick) = recorder();
        let mut poller = Poller::new(Duration::from_secs(3));
        poller.start(7, tick);
        settle().await;
        assert!(seen.lock().unwrap().is_empty());

        for _ in 0..3 {
            time::advance(Duration::from_secs(3)).await;
            settle().await;
        }
        assert_eq!(*seen.lock().unwrap(), vec![7, 7, 7]);
        assert_eq!(poller.peer(), Some(7));
        assert!(poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_previous_task() {
        let (seen, tick_a) = recorder();
        let sink = Arc::clone(&seen);
        let tick_b = move |peer| {
            sink.lock().unwrap().push(peer);
            std::future::ready(())
        };
        let mut poller = Poller::new(Duration::from_secs(3));
        poller.start(7, tick_a);
        time::advance(Duration::from_secs(2)).await;
        poller.start(9, tick_b);
        for _ in 0..4 {
            time::advance(Duration::from_secs(1)).await;
            settle().await;
        }
        // t=6: only the second task has fired (at t=5)
        assert_eq!(*seen.lock().unwrap(), vec![9]);
        assert_eq!(poller.peer(), Some(9));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_polling() {
        let (seen, tick) = recorder();
        let mut poller = Poller::new(Duration::from_secs(3));
        poller.start(7, tick);
        time::advance(Duration::from_secs(3)).await;
        settle().await;
        poller.stop();
        assert!(!poller.is_running());
        time::advance(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(*seen.lock().unwrap(), vec![7]);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_clamped_and_keeps_ticking() {
        let (seen, tick) = recorder();
        let mut poller = Poller::new(Duration::ZERO);
        poller.start(7, tick);
        for _ in 0..3 {
            time::advance(MIN_POLL_INTERVAL).await;
            settle().await;
        }
        assert_eq!(*seen.lock().unwrap(), vec![7, 7, 7]);
        assert!(poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_poller_aborts_task() {
        let (seen, tick) = recorder();
        let poller = {
            let mut p = Poller::new(Duration::from_secs(3));
            p.start(7, tick);
            p
        };
        drop(poller);
        time::advance(Duration::from_secs(9)).await;
        settle().await;
        assert!(seen.lock().unwrap().is_empty());
    }
}
