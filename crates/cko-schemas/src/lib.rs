//! cko-schemas
//!
//! Order records and endpoint payloads shared by every checkout crate.
//!
//! All JSON is camelCase on the wire so records written to the local cache
//! and records posted to the order-intake endpoint have the same shape.
//! Money is integer minor units (paise); no floats cross this boundary.

mod wire;

pub use wire::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Minor units per major currency unit (100 paise = 1 rupee).
pub const MINOR_UNITS_SCALE: i64 = 100;

// ---------------------------------------------------------------------------
// Order record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetails {
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: String,
    pub name: String,
    pub quantity: u32,
    /// Unit price in minor units.
    pub price: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    pub items: Vec<OrderItem>,
    pub subtotal: i64,
    #[serde(default)]
    pub delivery_fee: i64,
    #[serde(default)]
    pub convenience_fee: i64,
    #[serde(default)]
    pub dog_donation: i64,
    #[serde(default)]
    pub is_pre_reservation: bool,
    #[serde(default)]
    pub delivery_time: Option<String>,
    #[serde(default)]
    pub special_instructions: Option<String>,
}

impl OrderDetails {
    /// Everything the customer owes for this order; `None` if the sum
    /// does not fit in an `i64`.
    pub fn total(&self) -> Option<i64> {
        self.subtotal
            .checked_add(self.delivery_fee)?
            .checked_add(self.convenience_fee)?
            .checked_add(self.dog_donation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentBreakdown {
    pub total: i64,
    pub pre_order_payment: i64,
    pub remaining_payment: i64,
    pub convenience_fee: i64,
    pub dog_donation: i64,
}

/// Settlement status of a cached record. Only the reconciliation flow moves
/// it from `Pending` to `Success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Success,
}

/// Persisted snapshot of one checkout, keyed by `order_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub order_id: String,
    pub user_details: UserDetails,
    pub order_details: OrderDetails,
    pub vendor_email: String,
    pub vendor_phone: String,
    pub restaurant_id: String,
    pub restaurant_name: String,
    /// Remaining payment due on delivery. Computed once by [`OrderRecord::prepare`].
    pub amount: i64,
    pub total_order_value: i64,
    pub payment_breakdown: PaymentBreakdown,
    /// Creation time, epoch millis.
    pub timestamp: i64,
    #[serde(default)]
    pub payment_status: PaymentStatus,
}

/// Everything the storefront knows before an order is prepared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutDraft {
    pub order_id: String,
    pub user_details: UserDetails,
    pub order_details: OrderDetails,
    pub vendor_email: String,
    pub vendor_phone: String,
    pub restaurant_id: String,
    pub restaurant_name: String,
    /// Amount collected up front (pre-reservation deposit), minor units.
    #[serde(default)]
    pub pre_order_payment: i64,
}

/// Why a draft could not become an [`OrderRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidOrder {
    MissingField(&'static str),
    EmptyCart,
    NegativeAmount { field: &'static str, value: i64 },
    AmountOverflow,
}

impl fmt::Display for InvalidOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidOrder::MissingField(field) => write!(f, "invalid order: missing {field}"),
            InvalidOrder::EmptyCart => write!(f, "invalid order: cart has no items"),
            InvalidOrder::NegativeAmount { field, value } => {
                write!(f, "invalid order: {field} is negative ({value})")
            }
            InvalidOrder::AmountOverflow => write!(f, "invalid order: total is out of range"),
        }
    }
}

impl std::error::Error for InvalidOrder {}

impl OrderRecord {
    /// Freeze a draft into a record.
    ///
    /// The remaining amount is `total - pre_order_payment`, clamped at zero,
    /// and is never recomputed after this call.
    pub fn prepare(draft: CheckoutDraft, now_ms: i64) -> Result<Self, InvalidOrder> {
        if draft.order_id.trim().is_empty() {
            return Err(InvalidOrder::MissingField("orderId"));
        }
        if draft.user_details.email.trim().is_empty() {
            return Err(InvalidOrder::MissingField("userDetails.email"));
        }
        if draft.order_details.items.is_empty() {
            return Err(InvalidOrder::EmptyCart);
        }

        let d = &draft.order_details;
        for (field, value) in [
            ("subtotal", d.subtotal),
            ("deliveryFee", d.delivery_fee),
            ("convenienceFee", d.convenience_fee),
            ("dogDonation", d.dog_donation),
            ("preOrderPayment", draft.pre_order_payment),
        ] {
            if value < 0 {
                return Err(InvalidOrder::NegativeAmount { field, value });
            }
        }

        let total = d.total().ok_or(InvalidOrder::AmountOverflow)?;
        let remaining = (total - draft.pre_order_payment).max(0);

        Ok(Self {
            payment_breakdown: PaymentBreakdown {
                total,
                pre_order_payment: draft.pre_order_payment,
                remaining_payment: remaining,
                convenience_fee: d.convenience_fee,
                dog_donation: d.dog_donation,
            },
            order_id: draft.order_id,
            user_details: draft.user_details,
            order_details: draft.order_details,
            vendor_email: draft.vendor_email,
            vendor_phone: draft.vendor_phone,
            restaurant_id: draft.restaurant_id,
            restaurant_name: draft.restaurant_name,
            amount: remaining,
            total_order_value: total,
            timestamp: now_ms,
            payment_status: PaymentStatus::Pending,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fresh order identifier: `AS_<millis>_<8 hex>`.
pub fn new_order_id(now_ms: i64) -> String {
    let simple = uuid::Uuid::new_v4().simple().to_string();
    format!("AS_{}_{}", now_ms, &simple[..8])
}

/// Render minor units as a plain decimal string (`12345` -> `"123.45"`).
pub fn format_minor_units(v: i64) -> String {
    let sign = if v < 0 { "-" } else { "" };
    let abs = v.unsigned_abs();
    let scale = MINOR_UNITS_SCALE as u64;
    format!("{}{}.{:02}", sign, abs / scale, abs % scale)
}
