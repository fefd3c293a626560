//! cko-testkit
//!
//! Deterministic doubles for scenario tests: a scripted backend, a recording
//! environment, and canned orders. No network, no wall clock.

mod api;
mod env;

pub use api::{transport_error, ApiCall, ScriptedApi};
pub use env::RecordingEnv;

use cko_schemas::{
    CheckoutDraft, OrderDetails, OrderItem, OrderRecord, OrderStatusResponse, RemoteOrderStatus,
    UserDetails,
};

/// Two dosas at 9000 with 2000 delivery, 500 fee, 100 donation and 5000
/// paid up front.
pub fn sample_draft(order_id: &str) -> CheckoutDraft {
    CheckoutDraft {
        order_id: order_id.to_string(),
        user_details: UserDetails {
            full_name: "Asha Rao".to_string(),
            email: "asha@example.com".to_string(),
            phone_number: "9990001111".to_string(),
        },
        order_details: OrderDetails {
            items: vec![OrderItem {
                id: "m1".to_string(),
                name: "Masala Dosa".to_string(),
                quantity: 2,
                price: 9_000,
            }],
            subtotal: 18_000,
            delivery_fee: 2_000,
            convenience_fee: 500,
            dog_donation: 100,
            is_pre_reservation: false,
            delivery_time: None,
            special_instructions: None,
        },
        vendor_email: "kitchen@example.com".to_string(),
        vendor_phone: "8880002222".to_string(),
        restaurant_id: "r-1".to_string(),
        restaurant_name: "Dosa Corner".to_string(),
        pre_order_payment: 5_000,
    }
}

/// [`sample_draft`] prepared; `amount` is 15600.
pub fn sample_record(order_id: &str) -> OrderRecord {
    // Fixed draft; cannot fail validation.
    match OrderRecord::prepare(sample_draft(order_id), 1_700_000_000_000) {
        Ok(r) => r,
        Err(e) => panic!("sample draft invalid: {e}"),
    }
}

pub fn settled_status() -> OrderStatusResponse {
    OrderStatusResponse {
        status: Some(RemoteOrderStatus::Success),
        processed: true,
        ..OrderStatusResponse::default()
    }
}

pub fn pending_status() -> OrderStatusResponse {
    OrderStatusResponse::with_status(RemoteOrderStatus::Pending)
}

pub fn not_found_status() -> OrderStatusResponse {
    OrderStatusResponse::with_status(RemoteOrderStatus::NotFound)
}
