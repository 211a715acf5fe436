// Payment settlement coordinator: create a payment link with a remote
// gateway, render the scannable payload, poll for settlement, notify the
// embedding application exactly once when the payment completes.

pub mod coordinator;
pub mod gateway;
pub mod metrics;
pub mod poller;
pub mod qr;
pub mod session;
pub mod settings;

#[cfg(test)]
pub(crate) mod test_support;

pub use coordinator::{PaymentFlow, SessionHandle, SettledPayment};
pub use gateway::errors::GatewayError;
pub use gateway::rest::RestGateway;
pub use gateway::{PaymentCreated, PaymentGateway, SettlementState};
pub use poller::{PollUpdate, PollerHandle, SettlementPoller};
pub use qr::{CodeRenderer, ErrorCorrection, QrSvgRenderer, RenderError, RenderOptions, ScannableCode};
pub use session::{PaymentSession, SessionSnapshot, SessionStatus};
pub use settings::{Config, FlowSettings, GatewaySettings};
