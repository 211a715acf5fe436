// Payment gateway boundary: the two remote operations the settlement flow
// depends on, with gateway status vocabulary normalized before it leaves
// this module.

pub mod errors;
pub mod rest;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use self::errors::GatewayError;

/// Settlement state of a payment as the rest of the crate sees it.
/// Gateway-specific vocabulary never escapes this module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementState {
    Pending,
    Settled,
    Failed,
}

/// Everything the gateway hands back on successful payment creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCreated {
    pub gateway_payment_id: String,
    /// Gateway-correlatable code used to query settlement status.
    pub order_code: String,
    /// Opaque payload to be rendered as a scannable code.
    pub raw_payload: String,
    /// Optional redirect-based completion path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment request for one invoice. Fails with
    /// `Unavailable` on transient conditions or `InvalidRequest` when the
    /// invoice/amount is rejected outright.
    async fn create_payment(
        &self,
        invoice_id: &str,
        amount_minor: i64,
    ) -> Result<PaymentCreated, GatewayError>;

    /// Query the settlement state for a previously created payment.
    /// `Unavailable` here means "ask again later", distinct from a
    /// definitive `SettlementState::Failed` business answer.
    async fn get_payment_status(&self, order_code: &str) -> Result<SettlementState, GatewayError>;
}

/// Translate the gateway's status strings into the fixed three-state set.
/// Unknown vocabulary is a decode error; it never reaches the state machine.
pub fn normalize_status(raw: &str) -> Result<SettlementState, GatewayError> {
    match raw.to_ascii_uppercase().as_str() {
        "PENDING" | "PROCESSING" | "CREATED" => Ok(SettlementState::Pending),
        "PAID" | "SUCCESS" | "COMPLETED" | "SETTLED" => Ok(SettlementState::Settled),
        "FAILED" | "CANCELLED" | "CANCELED" | "EXPIRED" | "DECLINED" => Ok(SettlementState::Failed),
        other => Err(GatewayError::Decode(format!(
            "unknown settlement status: {other}"
        ))),
    }
}
