//! Request and response bodies of the order-intake backend.
//!
//! Every optional field defaults so partially populated responses still
//! decode; the reconciliation logic decides what an absent field means.

use serde::{Deserialize, Serialize};

use crate::OrderRecord;

// ---------------------------------------------------------------------------
// GET /api/payment-form/:amount
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentFormResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub payment_form_url: String,
}

// ---------------------------------------------------------------------------
// GET /payment/order-status/:orderId
// ---------------------------------------------------------------------------

/// Status string reported by the order-status endpoint.
///
/// Unknown strings are kept verbatim in `Other` so a new backend status
/// decodes cleanly and is treated as "not resolved yet".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RemoteOrderStatus {
    Success,
    NotFound,
    Pending,
    Other(String),
}

impl From<String> for RemoteOrderStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "SUCCESS" => RemoteOrderStatus::Success,
            "NOT_FOUND" => RemoteOrderStatus::NotFound,
            "PENDING" => RemoteOrderStatus::Pending,
            _ => RemoteOrderStatus::Other(s),
        }
    }
}

impl From<RemoteOrderStatus> for String {
    fn from(s: RemoteOrderStatus) -> Self {
        match s {
            RemoteOrderStatus::Success => "SUCCESS".to_string(),
            RemoteOrderStatus::NotFound => "NOT_FOUND".to_string(),
            RemoteOrderStatus::Pending => "PENDING".to_string(),
            RemoteOrderStatus::Other(other) => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusResponse {
    #[serde(default)]
    pub status: Option<RemoteOrderStatus>,
    #[serde(default)]
    pub processed: bool,
    #[serde(default)]
    pub emails_sent: Option<u32>,
    #[serde(default)]
    pub missed_call_status: Option<MissedCallStatus>,
}

impl OrderStatusResponse {
    pub fn with_status(status: RemoteOrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// `{status: "SUCCESS", processed: true}` and nothing less.
    pub fn is_settled(&self) -> bool {
        self.processed && self.status == Some(RemoteOrderStatus::Success)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(RemoteOrderStatus::NotFound)
    }
}

// ---------------------------------------------------------------------------
// Missed-call status (shared by notify + email-status)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MissedCallStatus {
    Pending,
    Success,
    Other(String),
}

impl From<String> for MissedCallStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => MissedCallStatus::Pending,
            "success" => MissedCallStatus::Success,
            _ => MissedCallStatus::Other(s),
        }
    }
}

impl From<MissedCallStatus> for String {
    fn from(s: MissedCallStatus) -> Self {
        match s {
            MissedCallStatus::Pending => "pending".to_string(),
            MissedCallStatus::Success => "success".to_string(),
            MissedCallStatus::Other(other) => other,
        }
    }
}

// ---------------------------------------------------------------------------
// POST /payment/cashfree-success
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyRequest {
    pub order_id: String,
    #[serde(default)]
    pub payment_id: Option<String>,
    pub status: String,
    pub payment_success: bool,
    #[serde(default)]
    pub order_data: Option<OrderRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub emails_sent: Option<u32>,
    #[serde(default)]
    pub email_errors: Vec<String>,
    #[serde(default)]
    pub missed_call_status: Option<MissedCallStatus>,
    #[serde(default)]
    pub data_source: Option<String>,
}

// ---------------------------------------------------------------------------
// GET /email-status/:orderId
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailStatusResponse {
    #[serde(default)]
    pub emails_sent: Option<u32>,
    #[serde(default)]
    pub email_errors: Vec<String>,
    #[serde(default)]
    pub missed_call_status: Option<MissedCallStatus>,
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HealthResponse {
    #[serde(default)]
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settled_requires_success_and_processed() {
        let r: OrderStatusResponse =
            serde_json::from_str(r#"{"status":"SUCCESS","processed":true}"#).unwrap();
        assert!(r.is_settled());

        let r: OrderStatusResponse = serde_json::from_str(r#"{"status":"SUCCESS"}"#).unwrap();
        assert!(!r.is_settled(), "processed defaults to false");
    }

    #[test]
    fn unknown_status_is_kept_verbatim() {
        let r: OrderStatusResponse = serde_json::from_str(r#"{"status":"AUTHORIZING"}"#).unwrap();
        assert_eq!(
            r.status,
            Some(RemoteOrderStatus::Other("AUTHORIZING".to_string()))
        );
        assert!(!r.is_settled());
        assert!(!r.is_not_found());
    }

    #[test]
    fn empty_status_body_decodes() {
        let r: OrderStatusResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(r, OrderStatusResponse::default());
    }

    #[test]
    fn email_status_decodes_missed_call() {
        let r: EmailStatusResponse = serde_json::from_str(
            r#"{"emailsSent":2,"emailErrors":[],"missedCallStatus":"success"}"#,
        )
        .unwrap();
        assert_eq!(r.emails_sent, Some(2));
        assert_eq!(r.missed_call_status, Some(MissedCallStatus::Success));
    }

    #[test]
    fn notify_request_uses_camel_case() {
        let req = NotifyRequest {
            order_id: "AS_1".to_string(),
            payment_id: Some("pay_9".to_string()),
            status: "SUCCESS".to_string(),
            payment_success: true,
            order_data: None,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["orderId"], "AS_1");
        assert_eq!(v["paymentSuccess"], true);
        assert_eq!(v["paymentId"], "pay_9");
    }
}
