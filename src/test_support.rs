// Scripted gateway and renderer doubles shared by the poller and
// coordinator tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};

use async_trait::async_trait;

use crate::gateway::{GatewayError, PaymentCreated, PaymentGateway, SettlementState};
use crate::qr::{CodeRenderer, RenderError, RenderOptions, ScannableCode};

static INIT_TRACING: Once = Once::new();

/// Install a test subscriber once per process. Honors RUST_LOG, so a noisy
/// run is `RUST_LOG=debug cargo test -- --nocapture`.
pub(crate) fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub(crate) fn sample_created() -> PaymentCreated {
    PaymentCreated {
        gateway_payment_id: "p1".to_string(),
        order_code: "oc1".to_string(),
        raw_payload: "payload".to_string(),
        checkout_url: Some("https://pay/oc1".to_string()),
    }
}

pub(crate) struct MockGateway {
    create_result: Mutex<Option<Result<PaymentCreated, GatewayError>>>,
    statuses: Mutex<VecDeque<Result<SettlementState, GatewayError>>>,
    create_calls: AtomicUsize,
    status_calls: AtomicUsize,
}

impl MockGateway {
    pub(crate) fn new(
        create_result: Result<PaymentCreated, GatewayError>,
        statuses: Vec<Result<SettlementState, GatewayError>>,
    ) -> Self {
        Self {
            create_result: Mutex::new(Some(create_result)),
            statuses: Mutex::new(statuses.into_iter().collect()),
            create_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        }
    }

    /// Creation succeeds with the sample payment; statuses play out in order,
    /// then `Pending` forever.
    pub(crate) fn with_statuses(statuses: Vec<Result<SettlementState, GatewayError>>) -> Self {
        Self::new(Ok(sample_created()), statuses)
    }

    pub(crate) fn always_pending() -> Self {
        Self::with_statuses(Vec::new())
    }

    pub(crate) fn failing_create(err: GatewayError) -> Self {
        Self::new(Err(err), Vec::new())
    }

    pub(crate) fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_payment(
        &self,
        _invoice_id: &str,
        _amount_minor: i64,
    ) -> Result<PaymentCreated, GatewayError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.create_result
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(GatewayError::Unavailable("create replayed".to_string())))
    }

    async fn get_payment_status(&self, _order_code: &str) -> Result<SettlementState, GatewayError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(SettlementState::Pending))
    }
}

pub(crate) struct MockRenderer {
    pub(crate) fail: bool,
}

impl MockRenderer {
    pub(crate) fn ok() -> Self {
        Self { fail: false }
    }

    pub(crate) fn failing() -> Self {
        Self { fail: true }
    }
}

impl CodeRenderer for MockRenderer {
    fn render(
        &self,
        raw_payload: &str,
        _options: &RenderOptions,
    ) -> Result<ScannableCode, RenderError> {
        if self.fail {
            Err(RenderError::Malformed("scripted failure".to_string()))
        } else {
            Ok(ScannableCode {
                svg: format!("<svg data-payload=\"{raw_payload}\"/>"),
                modules: 21,
            })
        }
    }
}
