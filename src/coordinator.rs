// Coordinator for one payment flow: creates the payment with the gateway,
// renders the scannable code, runs the settlement poller and fires the
// completion callback exactly once. The driver task is the sole owner of
// the session, so every event funnels through one place in arrival order.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::gateway::{PaymentCreated, PaymentGateway};
use crate::poller::{PollUpdate, SettlementPoller};
use crate::qr::{CodeRenderer, RenderOptions};
use crate::session::{PaymentSession, SessionSnapshot, SessionStatus};
use crate::settings::FlowSettings;
use crate::settlement_counter_inc;

/// Handed to the completion callback, exactly once per settled session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettledPayment {
    pub invoice_id: String,
    pub gateway_payment_id: String,
    pub order_code: String,
}

pub struct PaymentFlow {
    gateway: Arc<dyn PaymentGateway>,
    renderer: Arc<dyn CodeRenderer>,
    settings: FlowSettings,
    render_options: RenderOptions,
}

impl PaymentFlow {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        renderer: Arc<dyn CodeRenderer>,
        settings: FlowSettings,
    ) -> Self {
        Self {
            gateway,
            renderer,
            settings,
            render_options: RenderOptions::default(),
        }
    }

    pub fn with_render_options(mut self, render_options: RenderOptions) -> Self {
        self.render_options = render_options;
        self
    }

    /// Start a payment flow for one invoice/amount pair. The caller must not
    /// start two flows for the same invoice concurrently (disable the pay
    /// action once a session exists).
    pub fn start<F>(
        &self,
        invoice_id: impl Into<String>,
        amount_minor: i64,
        on_settled: F,
    ) -> SessionHandle
    where
        F: FnOnce(SettledPayment) + Send + 'static,
    {
        let session = PaymentSession::new(invoice_id, amount_minor);
        self.spawn(session, None, on_settled)
    }

    /// Re-attach to a payment that was already created with the gateway,
    /// e.g. after the embedding view was reloaded. Skips creation and goes
    /// straight to rendering and polling. Persisting `PaymentCreated`
    /// across reloads is the caller's responsibility.
    pub fn resume<F>(
        &self,
        invoice_id: impl Into<String>,
        amount_minor: i64,
        created: PaymentCreated,
        on_settled: F,
    ) -> SessionHandle
    where
        F: FnOnce(SettledPayment) + Send + 'static,
    {
        let session = PaymentSession::new(invoice_id, amount_minor);
        self.spawn(session, Some(created), on_settled)
    }

    fn spawn<F>(
        &self,
        session: PaymentSession,
        resume_from: Option<PaymentCreated>,
        on_settled: F,
    ) -> SessionHandle
    where
        F: FnOnce(SettledPayment) + Send + 'static,
    {
        let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let driver = Driver {
            gateway: Arc::clone(&self.gateway),
            renderer: Arc::clone(&self.renderer),
            settings: self.settings.clone(),
            render_options: self.render_options,
            session,
            snapshot_tx,
            cancel_rx,
        };
        let task = tokio::spawn(driver.run(resume_from, on_settled));

        SessionHandle {
            snapshot_rx,
            cancel_tx,
            _task: task,
        }
    }
}

/// Handle the embedding application holds for one in-flight payment.
/// Dropping it is equivalent to calling `cancel()`.
pub struct SessionHandle {
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    cancel_tx: watch::Sender<bool>,
    _task: JoinHandle<()>,
}

impl SessionHandle {
    /// Read-only snapshot of the session as of now.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Stream of snapshots, one per state change. Survives the handle; a
    /// caller may keep the stream and drop the handle to cancel.
    pub fn updates(&self) -> tokio_stream::wrappers::WatchStream<SessionSnapshot> {
        tokio_stream::wrappers::WatchStream::new(self.snapshot_rx.clone())
    }

    /// Cancel the flow. Idempotent; a no-op once the session is terminal.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        let _ = self.cancel_tx.send(true);
    }
}

struct Driver {
    gateway: Arc<dyn PaymentGateway>,
    renderer: Arc<dyn CodeRenderer>,
    settings: FlowSettings,
    render_options: RenderOptions,
    session: PaymentSession,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    cancel_rx: watch::Receiver<bool>,
}

impl Driver {
    async fn run<F>(mut self, resume_from: Option<PaymentCreated>, on_settled: F)
    where
        F: FnOnce(SettledPayment) + Send + 'static,
    {
        let created = match resume_from {
            Some(created) => created,
            None => {
                let invoice_id = self.session.invoice_id().to_string();
                let amount_minor = self.session.amount_minor();
                let create = self.gateway.create_payment(&invoice_id, amount_minor);
                tokio::select! {
                    _ = self.cancel_rx.changed() => {
                        self.session.cancel();
                        settlement_counter_inc!("paylink.session.cancelled");
                        self.publish();
                        return;
                    }
                    result = create => match result {
                        Ok(created) => created,
                        Err(e) => {
                            settlement_counter_inc!("paylink.create.failed");
                            self.session.create_failed(e.to_string());
                            self.publish();
                            return;
                        }
                    },
                }
            }
        };

        // Keep the correlation identifiers for the completion callback
        // before the session takes ownership of them.
        let gateway_payment_id = created.gateway_payment_id.clone();
        let order_code = created.order_code.clone();
        let raw_payload = created.raw_payload.clone();

        self.session.create_succeeded(created);
        settlement_counter_inc!("paylink.create.success");

        // A render failure is surfaced in the snapshot but does not end the
        // session; settlement may still complete via checkout_url.
        self.session
            .set_code(self.renderer.render(&raw_payload, &self.render_options));
        self.publish();

        let poller = SettlementPoller::new(Arc::clone(&self.gateway), self.settings.poll_interval);
        let (updates_tx, mut updates_rx) = mpsc::channel(16);
        let poller_handle = poller.start(order_code.clone(), updates_tx);

        let deadline = tokio::time::sleep(self.settings.max_wait);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = self.cancel_rx.changed() => {
                    poller_handle.stop();
                    self.session.cancel();
                    settlement_counter_inc!("paylink.session.cancelled");
                    self.publish();
                    return;
                }
                _ = &mut deadline => {
                    poller_handle.stop();
                    self.session.time_out();
                    settlement_counter_inc!("paylink.session.timed_out");
                    self.publish();
                    return;
                }
                update = updates_rx.recv() => match update {
                    Some(PollUpdate::Observation(state)) => {
                        if !self.session.observe(state) {
                            continue;
                        }
                        self.publish();
                        match self.session.status() {
                            SessionStatus::Settled => {
                                poller_handle.stop();
                                settlement_counter_inc!("paylink.session.settled");
                                debug!(
                                    invoice_id = %self.session.invoice_id(),
                                    order_code = %order_code,
                                    "payment settled, notifying caller"
                                );
                                on_settled(SettledPayment {
                                    invoice_id: self.session.invoice_id().to_string(),
                                    gateway_payment_id,
                                    order_code,
                                });
                                return;
                            }
                            SessionStatus::Failed { .. } => {
                                poller_handle.stop();
                                settlement_counter_inc!("paylink.session.failed");
                                return;
                            }
                            _ => {}
                        }
                    }
                    Some(PollUpdate::TransientError(e)) => {
                        self.session.record_poll_error(&e);
                        self.publish();
                    }
                    // Poller gone without a stop from us; treat as teardown.
                    None => {
                        self.session.cancel();
                        self.publish();
                        return;
                    }
                },
            }
        }
    }

    fn publish(&self) {
        let _ = self.snapshot_tx.send(self.session.snapshot());
    }
}
