// Payment session state machine: lifecycle of a single payment attempt with
// one-way terminal latches. Terminal states absorb every later event, which
// is what makes overlapping async callbacks (late poll results, cancel racing
// settlement) safe without locks.

use tracing::{debug, warn};

use crate::gateway::{GatewayError, PaymentCreated, SettlementState};
use crate::qr::ScannableCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Created,
    AwaitingSettlement,
    Settled,
    Failed { reason: String },
    Cancelled,
    TimedOut,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Settled
                | SessionStatus::Failed { .. }
                | SessionStatus::Cancelled
                | SessionStatus::TimedOut
        )
    }
}

/// Read-only view of a session, published to the consuming UI layer.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub invoice_id: String,
    pub status: SessionStatus,
    pub raw_payload: Option<String>,
    pub checkout_url: Option<String>,
    pub code: Option<ScannableCode>,
    pub render_error: Option<String>,
    /// Last transient error observed while polling; diagnostics only,
    /// never affects `status`.
    pub last_error: Option<String>,
}

pub struct PaymentSession {
    invoice_id: String,
    amount_minor: i64,
    gateway_payment_id: Option<String>,
    order_code: Option<String>,
    raw_payload: Option<String>,
    checkout_url: Option<String>,
    code: Option<ScannableCode>,
    render_error: Option<String>,
    status: SessionStatus,
    last_error: Option<String>,
}

impl PaymentSession {
    pub fn new(invoice_id: impl Into<String>, amount_minor: i64) -> Self {
        Self {
            invoice_id: invoice_id.into(),
            amount_minor,
            gateway_payment_id: None,
            order_code: None,
            raw_payload: None,
            checkout_url: None,
            code: None,
            render_error: None,
            status: SessionStatus::Created,
            last_error: None,
        }
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn invoice_id(&self) -> &str {
        &self.invoice_id
    }

    pub fn amount_minor(&self) -> i64 {
        self.amount_minor
    }

    pub fn gateway_payment_id(&self) -> Option<&str> {
        self.gateway_payment_id.as_deref()
    }

    pub fn order_code(&self) -> Option<&str> {
        self.order_code.as_deref()
    }

    pub fn raw_payload(&self) -> Option<&str> {
        self.raw_payload.as_deref()
    }

    /// Created -> AwaitingSettlement. Sets the gateway identifiers exactly
    /// once; returns false (and changes nothing) from any other state.
    pub fn create_succeeded(&mut self, created: PaymentCreated) -> bool {
        if self.status != SessionStatus::Created {
            self.ignore("create_succeeded");
            return false;
        }
        debug!(
            invoice_id = %self.invoice_id,
            gateway_payment_id = %created.gateway_payment_id,
            order_code = %created.order_code,
            "payment created, awaiting settlement"
        );
        self.gateway_payment_id = Some(created.gateway_payment_id);
        self.order_code = Some(created.order_code);
        self.raw_payload = Some(created.raw_payload);
        self.checkout_url = created.checkout_url;
        self.status = SessionStatus::AwaitingSettlement;
        true
    }

    /// Created -> Failed, preserving the gateway's reason verbatim.
    pub fn create_failed(&mut self, reason: impl Into<String>) -> bool {
        if self.status != SessionStatus::Created {
            self.ignore("create_failed");
            return false;
        }
        let reason = reason.into();
        warn!(invoice_id = %self.invoice_id, reason = %reason, "payment creation failed");
        self.status = SessionStatus::Failed { reason };
        true
    }

    /// Apply one poll observation. Returns true iff the state changed, i.e.
    /// exactly once for the first `Settled` or `Failed` observation. Repeats,
    /// late arrivals after a terminal state and `Pending` are all no-ops.
    pub fn observe(&mut self, state: SettlementState) -> bool {
        if self.status != SessionStatus::AwaitingSettlement {
            self.ignore("observe");
            return false;
        }
        match state {
            SettlementState::Pending => false,
            SettlementState::Settled => {
                debug!(invoice_id = %self.invoice_id, "settlement observed");
                self.status = SessionStatus::Settled;
                true
            }
            SettlementState::Failed => {
                warn!(invoice_id = %self.invoice_id, "gateway reported settlement failure");
                self.status = SessionStatus::Failed {
                    reason: "gateway reported settlement failure".to_string(),
                };
                true
            }
        }
    }

    /// Any non-terminal state -> Cancelled.
    pub fn cancel(&mut self) -> bool {
        if self.status.is_terminal() {
            self.ignore("cancel");
            return false;
        }
        debug!(invoice_id = %self.invoice_id, "session cancelled");
        self.status = SessionStatus::Cancelled;
        true
    }

    /// Any non-terminal state -> TimedOut. Distinct from `Failed` so callers
    /// can tell "gateway said no" from "gave up waiting".
    pub fn time_out(&mut self) -> bool {
        if self.status.is_terminal() {
            self.ignore("time_out");
            return false;
        }
        warn!(invoice_id = %self.invoice_id, "settlement wait deadline expired");
        self.status = SessionStatus::TimedOut;
        true
    }

    /// Record a transient polling error for diagnostics. Never touches
    /// `status`; a no-op once terminal.
    pub fn record_poll_error(&mut self, err: &GatewayError) {
        if self.status.is_terminal() {
            self.ignore("record_poll_error");
            return;
        }
        self.last_error = Some(err.to_string());
    }

    /// Attach the rendering outcome. A render failure does not fail the
    /// session: settlement may still complete via `checkout_url`.
    pub fn set_code(&mut self, rendered: Result<ScannableCode, crate::qr::RenderError>) {
        match rendered {
            Ok(code) => self.code = Some(code),
            Err(e) => {
                warn!(invoice_id = %self.invoice_id, error = %e, "scannable code rendering failed");
                self.render_error = Some(e.to_string());
            }
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            invoice_id: self.invoice_id.clone(),
            status: self.status.clone(),
            raw_payload: self.raw_payload.clone(),
            checkout_url: self.checkout_url.clone(),
            code: self.code.clone(),
            render_error: self.render_error.clone(),
            last_error: self.last_error.clone(),
        }
    }

    fn ignore(&self, event: &str) {
        debug!(
            invoice_id = %self.invoice_id,
            status = ?self.status,
            event = event,
            "event ignored in current state"
        );
    }
}
