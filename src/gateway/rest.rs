// Gateway REST client
// Implements the two payment-link endpoints with amount preconditions and
// common auth headers. No retries here: creation failures are terminal by
// contract and polling retry policy belongs to the settlement poller.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, instrument};

use crate::gateway::errors::{map_http_error, GatewayError};
use crate::gateway::{normalize_status, PaymentCreated, PaymentGateway, SettlementState};
use crate::settings::GatewaySettings;

#[derive(Clone)]
pub struct RestGateway {
    pub(crate) http: Client,
    pub(crate) base_url: String,
    pub(crate) client_id: String,
    pub(crate) api_key: String,
    pub(crate) currency: String,
}

// POST /v1/payment-links request body
#[derive(Debug, Clone, Serialize)]
struct CreatePaymentLinkRequest<'a> {
    invoice_id: &'a str,
    amount: i64,
    currency: &'a str,
}

// Payment-link resource as returned by both endpoints
#[derive(Debug, Clone, Deserialize)]
struct PaymentLinkResource {
    payment_id: String,
    order_code: String,
    status: String,
    #[serde(default)]
    qr_payload: Option<String>,
    #[serde(default)]
    checkout_url: Option<String>,
}

impl RestGateway {
    // Build reqwest client with rustls and timeout from cfg, store cfg fields.
    pub fn new(cfg: GatewaySettings) -> Result<Self, GatewayError> {
        let timeout =
            Duration::from_millis(if cfg.timeout_ms > 0 { cfg.timeout_ms } else { 15_000 });
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            client_id: cfg.client_id,
            api_key: cfg.api_key,
            currency: cfg.currency,
        })
    }

    fn apply_common_headers(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut req = req.header("x-api-key", &self.api_key);
        if !self.client_id.is_empty() {
            req = req.header("x-client-id", &self.client_id);
        }
        req
    }

    async fn send_for_resource(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<PaymentLinkResource, GatewayError> {
        let resp = req
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;
        if status.is_success() {
            serde_json::from_str::<PaymentLinkResource>(&text)
                .map_err(|e| GatewayError::Decode(e.to_string()))
        } else {
            Err(map_http_error(status.as_u16(), &text))
        }
    }
}

#[async_trait::async_trait]
impl PaymentGateway for RestGateway {
    // POST /v1/payment-links
    #[instrument(skip(self), fields(method = "POST", path = "/v1/payment-links", invoice_id = %invoice_id))]
    async fn create_payment(
        &self,
        invoice_id: &str,
        amount_minor: i64,
    ) -> Result<PaymentCreated, GatewayError> {
        // Enforce a positive amount before anything leaves the process
        if amount_minor <= 0 {
            return Err(GatewayError::InvalidRequest(
                "amount must be positive minor units".to_string(),
            ));
        }

        info!(
            target: "gateway",
            method = "POST",
            path = "/v1/payment-links",
            invoice_id = %invoice_id,
            amount_minor = amount_minor,
            currency = %self.currency,
            "gateway request"
        );

        let url = format!("{}/v1/payment-links", self.base_url);
        let body = CreatePaymentLinkRequest {
            invoice_id,
            amount: amount_minor,
            currency: &self.currency,
        };
        let req = self.apply_common_headers(self.http.post(url).json(&body));
        let resource = self.send_for_resource(req).await?;

        let raw_payload = resource.qr_payload.ok_or_else(|| {
            GatewayError::Decode("payment link created without qr_payload".to_string())
        })?;

        Ok(PaymentCreated {
            gateway_payment_id: resource.payment_id,
            order_code: resource.order_code,
            raw_payload,
            checkout_url: resource.checkout_url,
        })
    }

    // GET /v1/payment-links/{order_code}
    #[instrument(skip(self), fields(method = "GET", path = "/v1/payment-links/{order_code}", order_code = %order_code))]
    async fn get_payment_status(&self, order_code: &str) -> Result<SettlementState, GatewayError> {
        info!(
            target: "gateway",
            method = "GET",
            path = "/v1/payment-links/{order_code}",
            order_code = %order_code,
            "gateway request"
        );

        let url = format!("{}/v1/payment-links/{}", self.base_url, order_code);
        let req = self.apply_common_headers(self.http.get(url));
        let resource = self.send_for_resource(req).await?;
        normalize_status(&resource.status)
    }
}
