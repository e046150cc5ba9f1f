//! Debounced delivery of a message after a quiet period.
//!
//! Every `schedule` supersedes the previous one: its timer is aborted and
//! its token stops being current, so anything tagged with the old token can
//! be recognised as stale when it arrives.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct Debouncer<M> {
    tx: mpsc::UnboundedSender<M>,
    token: u64,
    timer: Option<JoinHandle<()>>,
}

impl<M: Send + 'static> Debouncer<M> {
    pub fn new(tx: mpsc::UnboundedSender<M>) -> Self {
        Self {
            tx,
            token: 0,
            timer: None,
        }
    }

    /// Sends `make(token)` after `delay` unless superseded first.
    pub fn schedule<F>(&mut self, delay: Duration, make: F) -> u64
    where
        F: FnOnce(u64) -> M + Send + 'static,
    {
        self.cancel();
        let token = self.token;
        let tx = self.tx.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(make(token)).is_err() {
                tracing::debug!(token, "debounce receiver gone");
            }
        }));
        token
    }

    /// Invalidates the current token and aborts a pending timer.
    pub fn cancel(&mut self) {
        self.token += 1;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    pub fn is_current(&self, token: u64) -> bool {
        token == self.token
    }

    pub fn token(&self) -> u64 {
        self.token
    }
}

impl<M> Drop for Debouncer<M> {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut debouncer = Debouncer::new(tx);
        let token = debouncer.schedule(Duration::from_millis(300), |t| t);

        tokio::time::sleep(Duration::from_millis(299)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(rx.recv().await, Some(token));
        assert!(debouncer.is_current(token));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_schedules_fire_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut debouncer = Debouncer::new(tx);

        let mut last = 0;
        for _ in 0..5 {
            last = debouncer.schedule(Duration::from_millis(300), |t| t);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(rx.try_recv(), Ok(last));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_invalidates() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut debouncer = Debouncer::new(tx);
        let token = debouncer.schedule(Duration::from_millis(50), |t| t);
        debouncer.cancel();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
        assert!(!debouncer.is_current(token));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokens_increase() {
        let (tx, _rx) = mpsc::unbounded_channel::<u64>();
        let mut debouncer = Debouncer::new(tx);
        let a = debouncer.schedule(Duration::from_millis(10), |t| t);
        let b = debouncer.schedule(Duration::from_millis(10), |t| t);
        assert!(b > a);
        assert!(!debouncer.is_current(a));
        assert!(debouncer.is_current(b));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_into_closed_channel_quietly() {
        let (tx, rx) = mpsc::unbounded_channel::<u64>();
        let mut debouncer = Debouncer::new(tx);
        drop(rx);
        debouncer.schedule(Duration::from_millis(10), |t| t);

        let timer = debouncer.timer.take().unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(timer.await.is_ok());
    }
}
