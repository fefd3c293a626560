//! cko-client
//!
//! Client for the order-intake backend.
//!
//! This crate owns the backend abstraction ([`CheckoutApi`]) and its reqwest
//! implementation. It does **not** retry and sets no per-request timeout;
//! retry cadence belongs to the reconciliation runtime.

mod error;

pub use error::ApiError;

use async_trait::async_trait;
use cko_schemas::{
    format_minor_units, EmailStatusResponse, HealthResponse, NotifyRequest, NotifyResponse,
    OrderRecord, OrderStatusResponse, PaymentFormResponse,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

pub const EP_PREPARE_ORDER: &str = "payment/prepare-order";
pub const EP_PAYMENT_FORM: &str = "api/payment-form";
pub const EP_ORDER_STATUS: &str = "payment/order-status";
pub const EP_NOTIFY_SUCCESS: &str = "payment/cashfree-success";
pub const EP_EMAIL_STATUS: &str = "email-status";
pub const EP_HEALTH: &str = "health";

/// Backend contract used by checkout and reconciliation.
///
/// Object-safe; callers hold `Arc<dyn CheckoutApi>`.
#[async_trait]
pub trait CheckoutApi: Send + Sync {
    /// `POST /payment/prepare-order`. Any 2xx is success.
    async fn prepare_order(&self, record: &OrderRecord) -> Result<(), ApiError>;

    /// `GET /api/payment-form/:amount`. `amount` is minor units; the path
    /// carries the major-unit decimal (`15600` -> `156.00`).
    ///
    /// Returns the gateway URL. `success: false` or an empty URL is
    /// [`ApiError::Rejected`].
    async fn payment_form(&self, amount: i64) -> Result<Url, ApiError>;

    /// `GET /payment/order-status/:orderId`.
    async fn order_status(&self, order_id: &str) -> Result<OrderStatusResponse, ApiError>;

    /// `POST /payment/cashfree-success`.
    async fn notify_success(&self, req: &NotifyRequest) -> Result<NotifyResponse, ApiError>;

    /// `GET /email-status/:orderId`.
    async fn email_status(&self, order_id: &str) -> Result<EmailStatusResponse, ApiError>;

    /// `GET /health`.
    async fn health(&self) -> Result<HealthResponse, ApiError>;
}

/// reqwest-backed [`CheckoutApi`].
#[derive(Debug, Clone)]
pub struct HttpCheckoutApi {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpCheckoutApi {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ApiError::Config(format!("invalid backend url '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::Config(format!(
                "backend url '{base_url}' cannot carry paths"
            )));
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base path + `endpoint` + extra segments. Segments are percent-encoded,
    /// so an order id can never escape its path position.
    fn url(&self, endpoint: &str, extra: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        {
            let mut segs = url
                .path_segments_mut()
                .map_err(|_| ApiError::Config(format!("backend url '{}' cannot carry paths", self.base_url)))?;
            segs.pop_if_empty();
            segs.extend(endpoint.split('/'));
            segs.extend(extra);
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        extra: &[&str],
    ) -> Result<T, ApiError> {
        let url = self.url(endpoint, extra)?;
        tracing::debug!(%url, "backend GET");
        let body = checked_body(endpoint, self.http.get(url)).await?;
        decode(endpoint, &body)
    }

    async fn post_body<B: Serialize + Sync>(
        &self,
        endpoint: &'static str,
        body: &B,
    ) -> Result<String, ApiError> {
        let url = self.url(endpoint, &[])?;
        tracing::debug!(%url, "backend POST");
        checked_body(endpoint, self.http.post(url).json(body)).await
    }
}

fn transport(endpoint: &str, e: reqwest::Error) -> ApiError {
    ApiError::Transport {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    }
}

/// Send, then fail on any non-2xx status. Returns the raw body.
async fn checked_body(endpoint: &str, req: reqwest::RequestBuilder) -> Result<String, ApiError> {
    let resp = req.send().await.map_err(|e| transport(endpoint, e))?;
    let status = resp.status();
    let body = resp.text().await.map_err(|e| transport(endpoint, e))?;

    if !status.is_success() {
        return Err(ApiError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

/// An empty 2xx body decodes as `{}` so all-optional responses still parse.
fn decode<T: DeserializeOwned>(endpoint: &str, body: &str) -> Result<T, ApiError> {
    let raw = if body.trim().is_empty() { "{}" } else { body };
    serde_json::from_str(raw).map_err(|e| ApiError::Decode {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

#[async_trait]
impl CheckoutApi for HttpCheckoutApi {
    async fn prepare_order(&self, record: &OrderRecord) -> Result<(), ApiError> {
        // No response contract beyond the status code.
        self.post_body(EP_PREPARE_ORDER, record).await?;
        Ok(())
    }

    async fn payment_form(&self, amount: i64) -> Result<Url, ApiError> {
        let amount_s = format_minor_units(amount);
        let resp: PaymentFormResponse = self.get_json(EP_PAYMENT_FORM, &[amount_s.as_str()]).await?;

        let rejected = |message: String| ApiError::Rejected {
            endpoint: EP_PAYMENT_FORM.to_string(),
            message,
        };
        if !resp.success {
            return Err(rejected("success=false".to_string()));
        }
        if resp.payment_form_url.trim().is_empty() {
            return Err(rejected("empty paymentFormUrl".to_string()));
        }
        Url::parse(resp.payment_form_url.trim())
            .map_err(|e| rejected(format!("invalid paymentFormUrl: {e}")))
    }

    async fn order_status(&self, order_id: &str) -> Result<OrderStatusResponse, ApiError> {
        self.get_json(EP_ORDER_STATUS, &[order_id]).await
    }

    async fn notify_success(&self, req: &NotifyRequest) -> Result<NotifyResponse, ApiError> {
        let body = self.post_body(EP_NOTIFY_SUCCESS, req).await?;
        decode(EP_NOTIFY_SUCCESS, &body)
    }

    async fn email_status(&self, order_id: &str) -> Result<EmailStatusResponse, ApiError> {
        self.get_json(EP_EMAIL_STATUS, &[order_id]).await
    }

    async fn health(&self) -> Result<HealthResponse, ApiError> {
        self.get_json(EP_HEALTH, &[]).await
    }
}

// -----------------
// Tests (no network)
// -----------------
