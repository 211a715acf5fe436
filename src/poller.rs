// Settlement poller: repeating status-check loop against the gateway.
// Fixed interval, no backoff, no attempt cutoff; transient gateway errors
// never stop the loop. Only the owning coordinator decides when a session
// ends, so the poller just reports what it sees.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::gateway::{GatewayError, PaymentGateway, SettlementState};
use crate::settlement_counter_inc;

/// One message per tick: either the gateway's answer or the transient
/// error that stood in for it.
#[derive(Debug, Clone)]
pub enum PollUpdate {
    Observation(SettlementState),
    TransientError(GatewayError),
}

pub struct SettlementPoller {
    gateway: Arc<dyn PaymentGateway>,
    interval: Duration,
}

impl SettlementPoller {
    pub fn new(gateway: Arc<dyn PaymentGateway>, interval: Duration) -> Self {
        Self { gateway, interval }
    }

    /// Begin polling `order_code`. The first status check happens only after
    /// the first interval elapses; there is no immediate check. Updates are
    /// forwarded in response-arrival order on `updates`.
    pub fn start(&self, order_code: String, updates: mpsc::Sender<PollUpdate>) -> PollerHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let gateway = Arc::clone(&self.gateway);
        let interval = self.interval;

        let task = tokio::spawn(async move {
            debug!(order_code = %order_code, interval_ms = interval.as_millis() as u64, "settlement poller started");
            loop {
                tokio::select! {
                    // Biased so that stop wins even when a tick became ready
                    // in the same wakeup; an in-flight request future is
                    // dropped here and its result never forwarded.
                    biased;
                    _ = stop_rx.changed() => break,
                    update = async {
                        tokio::time::sleep(interval).await;
                        match gateway.get_payment_status(&order_code).await {
                            Ok(state) => PollUpdate::Observation(state),
                            Err(e) => PollUpdate::TransientError(e),
                        }
                    } => {
                        if let PollUpdate::TransientError(e) = &update {
                            settlement_counter_inc!("paylink.poll.transient_error");
                            debug!(order_code = %order_code, error = %e, "transient poll error, will retry next interval");
                        }
                        if updates.send(update).await.is_err() {
                            // Receiver gone: the owning session is over.
                            break;
                        }
                    }
                }
            }
            debug!(order_code = %order_code, "settlement poller stopped");
        });

        PollerHandle {
            stop_tx,
            _task: task,
        }
    }
}

/// Owning handle for one polling loop. Stopping is idempotent and dropping
/// the handle stops the loop, so an abnormal teardown path cannot leak a
/// timer.
pub struct PollerHandle {
    stop_tx: watch::Sender<bool>,
    _task: JoinHandle<()>,
}

impl PollerHandle {
    /// Cancel future polls. Safe to call any number of times, including
    /// while a poll is in flight; that poll's result is discarded.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{init_tracing, MockGateway};

    const INTERVAL: Duration = Duration::from_secs(3);

    fn poller(gateway: &Arc<MockGateway>) -> SettlementPoller {
        init_tracing();
        SettlementPoller::new(Arc::clone(gateway) as Arc<dyn PaymentGateway>, INTERVAL)
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_check_before_first_interval() {
        let gateway = Arc::new(MockGateway::with_statuses(vec![Ok(
            SettlementState::Pending,
        )]));
        let (tx, _rx) = mpsc::channel(16);
        let handle = poller(&gateway).start("oc1".to_string(), tx);

        tokio::time::advance(INTERVAL - Duration::from_millis(1)).await;
        tokio::task::yield_now().await;
        assert_eq!(gateway.status_calls(), 0);

        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_observations_forwarded_in_order() {
        let gateway = Arc::new(MockGateway::with_statuses(vec![
            Ok(SettlementState::Pending),
            Ok(SettlementState::Settled),
        ]));
        let (tx, mut rx) = mpsc::channel(16);
        let _handle = poller(&gateway).start("oc1".to_string(), tx);

        match rx.recv().await.unwrap() {
            PollUpdate::Observation(SettlementState::Pending) => {}
            other => panic!("unexpected update: {other:?}"),
        }
        match rx.recv().await.unwrap() {
            PollUpdate::Observation(SettlementState::Settled) => {}
            other => panic!("unexpected update: {other:?}"),
        }
        assert_eq!(gateway.status_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_do_not_stop_the_loop() {
        let gateway = Arc::new(MockGateway::with_statuses(vec![
            Err(GatewayError::Unavailable("down".to_string())),
            Err(GatewayError::Unavailable("down".to_string())),
            Err(GatewayError::Unavailable("down".to_string())),
            Ok(SettlementState::Settled),
        ]));
        let (tx, mut rx) = mpsc::channel(16);
        let _handle = poller(&gateway).start("oc1".to_string(), tx);

        let mut errors = 0;
        loop {
            match rx.recv().await.unwrap() {
                PollUpdate::TransientError(e) => {
                    assert!(e.is_transient());
                    errors += 1;
                }
                PollUpdate::Observation(SettlementState::Settled) => break,
                other => panic!("unexpected update: {other:?}"),
            }
        }
        assert_eq!(errors, 3);
        assert_eq!(gateway.status_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let gateway = Arc::new(MockGateway::with_statuses(vec![]));
        let (tx, _rx) = mpsc::channel(16);
        let handle = poller(&gateway).start("oc1".to_string(), tx);

        // Stop before any tick ever elapsed, then stop again
        handle.stop();
        handle.stop();
        assert_eq!(gateway.status_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_wins_when_tick_is_ready() {
        let gateway = Arc::new(MockGateway::always_pending());
        let (tx, _rx) = mpsc::channel(16);
        let handle = poller(&gateway).start("oc1".to_string(), tx);

        // Let the loop register its first sleep, then signal stop and make
        // the tick ready in the same wakeup; the stop arm must win.
        tokio::task::yield_now().await;
        handle.stop();
        tokio::time::advance(INTERVAL).await;
        tokio::task::yield_now().await;
        assert_eq!(gateway.status_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_ticks_after_stop() {
        let gateway = Arc::new(MockGateway::always_pending());
        let (tx, mut rx) = mpsc::channel(16);
        let handle = poller(&gateway).start("oc1".to_string(), tx);

        // Let a couple of ticks happen
        rx.recv().await.unwrap();
        rx.recv().await.unwrap();
        let calls_at_stop = gateway.status_calls();
        handle.stop();
        tokio::task::yield_now().await;

        // Simulate the passage of many more intervals
        tokio::time::advance(INTERVAL * 10).await;
        tokio::task::yield_now().await;
        assert_eq!(gateway.status_calls(), calls_at_stop);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_the_loop() {
        let gateway = Arc::new(MockGateway::always_pending());
        let (tx, mut rx) = mpsc::channel(16);
        let handle = poller(&gateway).start("oc1".to_string(), tx);

        rx.recv().await.unwrap();
        let calls_at_drop = gateway.status_calls();
        drop(handle);
        tokio::task::yield_now().await;

        tokio::time::advance(INTERVAL * 10).await;
        tokio::task::yield_now().await;
        assert_eq!(gateway.status_calls(), calls_at_drop);
    }
}
