//! Order preparation and the payment redirect.

use cko_cache::{OrderCache, OrderCacheExt};
use cko_client::CheckoutApi;
use cko_schemas::{format_minor_units, OrderRecord};
use tracing::{info, warn};
use url::Url;

use crate::CheckoutError;

/// Where to send the customer's browser next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRedirect {
    pub order_id: String,
    pub url: Url,
}

/// Persist, prepare, and build the gateway redirect for `record`.
///
/// Order of effects: `order_<id>` cache write, current-order marker,
/// `prepare-order`, `payment-form(amount)`. The cache entries are written
/// first so they survive the redirect even if the gateway never returns.
/// Nothing is retried.
pub async fn submit_checkout(
    api: &dyn CheckoutApi,
    cache: &dyn OrderCache,
    record: &OrderRecord,
    return_base: &Url,
) -> Result<PaymentRedirect, CheckoutError> {
    let order_id = record.order_id.as_str();

    cache.put_order(record)?;
    cache.set_current_order_id(order_id)?;

    api.prepare_order(record).await.map_err(|source| {
        warn!(order_id, error = %source, "prepare-order failed");
        CheckoutError::HardApi {
            stage: "prepare-order",
            source,
        }
    })?;

    let form_url = api.payment_form(record.amount).await.map_err(|source| {
        warn!(order_id, error = %source, "payment-form failed");
        CheckoutError::HardApi {
            stage: "payment-form",
            source,
        }
    })?;

    let url = build_payment_redirect(&form_url, record, return_base)?;
    info!(order_id, amount = record.amount, "checkout prepared; redirecting to gateway");
    Ok(PaymentRedirect {
        order_id: order_id.to_string(),
        url,
    })
}

/// `<return_base>/order-confirmation?order_id=<id>&source=cashfree`
pub fn return_url(return_base: &Url, order_id: &str) -> Result<Url, CheckoutError> {
    let mut url = return_base.clone();
    url.path_segments_mut()
        .map_err(|_| CheckoutError::InvalidReturnBase(return_base.to_string()))?
        .pop_if_empty()
        .push("order-confirmation");
    url.set_query(None);
    url.query_pairs_mut()
        .append_pair("order_id", order_id)
        .append_pair("source", "cashfree");
    Ok(url)
}

/// Gateway form URL plus customer and return parameters.
///
/// Existing query parameters on `form_url` are kept.
pub fn build_payment_redirect(
    form_url: &Url,
    record: &OrderRecord,
    return_base: &Url,
) -> Result<Url, CheckoutError> {
    let ret = return_url(return_base, &record.order_id)?;
    let user = &record.user_details;

    let mut url = form_url.clone();
    url.query_pairs_mut()
        .append_pair("order_id", &record.order_id)
        .append_pair("amount", &format_minor_units(record.amount))
        .append_pair("customer_name", &user.full_name)
        .append_pair("customer_email", &user.email)
        .append_pair("customer_phone", &user.phone_number)
        .append_pair("return_url", ret.as_str());
    Ok(url)
}
