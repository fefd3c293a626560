//! Return-path resolution.
//!
//! The gateway is not consistent about where it sends the customer back.
//! Accepted shapes:
//!
//! | Pattern                          | Route parameter          |
//! |----------------------------------|--------------------------|
//! | `/forms/response/:responseToken` | the token                |
//! | `/forms/response/*`              | first sub-path segment   |
//! | `/cashfree-response`             | none                     |
//! | `/payment-success`               | none                     |
//! | `/order-confirmation`            | none                     |
//!
//! Order-id precedence is fixed: `order_id` query, `orderId` query, route
//! parameter, cached current-order marker. Blank values are skipped.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReturnRoute {
    FormsResponseToken { token: String },
    FormsResponseWildcard { rest: String },
    CashfreeResponse,
    PaymentSuccess,
    OrderConfirmation,
}

const FORMS_RESPONSE_PREFIX: &str = "/forms/response/";

impl ReturnRoute {
    /// Match a URL path against the accepted return shapes.
    /// A single trailing slash is tolerated on the flat routes.
    pub fn parse(path: &str) -> Option<Self> {
        if let Some(rest) = path.strip_prefix(FORMS_RESPONSE_PREFIX) {
            let rest = rest.trim_end_matches('/');
            if !rest.is_empty() && !rest.contains('/') {
                return Some(ReturnRoute::FormsResponseToken {
                    token: rest.to_string(),
                });
            }
            return Some(ReturnRoute::FormsResponseWildcard {
                rest: rest.to_string(),
            });
        }

        let flat = if path.len() > 1 {
            path.trim_end_matches('/')
        } else {
            path
        };
        match flat {
            "/forms/response" => Some(ReturnRoute::FormsResponseWildcard {
                rest: String::new(),
            }),
            "/cashfree-response" => Some(ReturnRoute::CashfreeResponse),
            "/payment-success" => Some(ReturnRoute::PaymentSuccess),
            "/order-confirmation" => Some(ReturnRoute::OrderConfirmation),
            _ => None,
        }
    }

    /// The path-carried candidate order id, if this shape has one.
    pub fn route_param(&self) -> Option<&str> {
        match self {
            ReturnRoute::FormsResponseToken { token } => Some(token.as_str()),
            ReturnRoute::FormsResponseWildcard { rest } => {
                rest.split('/').find(|seg| !seg.trim().is_empty())
            }
            _ => None,
        }
    }

    pub fn pattern(&self) -> &'static str {
        match self {
            ReturnRoute::FormsResponseToken { .. } => "/forms/response/:responseToken",
            ReturnRoute::FormsResponseWildcard { .. } => "/forms/response/*",
            ReturnRoute::CashfreeResponse => "/cashfree-response",
            ReturnRoute::PaymentSuccess => "/payment-success",
            ReturnRoute::OrderConfirmation => "/order-confirmation",
        }
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReturnUrlError {
    Unparseable { url: String, message: String },
}

impl fmt::Display for ReturnUrlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnUrlError::Unparseable { url, message } => {
                write!(f, "return url '{url}' could not be parsed: {message}")
            }
        }
    }
}

impl std::error::Error for ReturnUrlError {}

/// Everything the return page can see: its route and its query string.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReturnRequest {
    pub route: Option<ReturnRoute>,
    /// First value wins for repeated keys.
    pub query: BTreeMap<String, String>,
    /// Route parameter supplied by an external router; overrides the one
    /// derived from `route` when set.
    pub route_param: Option<String>,
}

impl ReturnRequest {
    /// Build from a path and an optional raw query string (no leading `?`).
    pub fn from_parts(path: &str, raw_query: Option<&str>) -> Self {
        let mut query = BTreeMap::new();
        if let Some(raw) = raw_query {
            for (k, v) in url::form_urlencoded::parse(raw.as_bytes()) {
                query.entry(k.into_owned()).or_insert_with(|| v.into_owned());
            }
        }
        Self {
            route: ReturnRoute::parse(path),
            query,
            route_param: None,
        }
    }

    /// Parse an absolute URL, or a path with query (`/payment-success?order_id=1`).
    pub fn from_url(raw: &str) -> Result<Self, ReturnUrlError> {
        let parsed = match Url::parse(raw) {
            Ok(u) => u,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = Url::parse("http://return.local/").map_err(|e| unparseable(raw, e))?;
                base.join(raw).map_err(|e| unparseable(raw, e))?
            }
            Err(e) => return Err(unparseable(raw, e)),
        };
        Ok(Self::from_parts(parsed.path(), parsed.query()))
    }

    pub fn with_route_param(mut self, param: impl Into<String>) -> Self {
        self.route_param = Some(param.into());
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .get(key)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    fn effective_route_param(&self) -> Option<&str> {
        self.route_param
            .as_deref()
            .or_else(|| self.route.as_ref().and_then(ReturnRoute::route_param))
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Gateway payment reference, when the gateway passed one back.
    pub fn payment_id(&self) -> Option<&str> {
        self.query_value("payment_id")
            .or_else(|| self.query_value("paymentId"))
    }
}

fn unparseable(raw: &str, e: url::ParseError) -> ReturnUrlError {
    ReturnUrlError::Unparseable {
        url: raw.to_string(),
        message: e.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    QueryOrderId,
    QueryOrderIdCamel,
    RouteParam,
    CachedMarker,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub order_id: String,
    pub source: ResolutionSource,
}

/// Resolve the order id for a return request. `None` is the terminal
/// no-order-id outcome: the poller must not be entered.
pub fn resolve_order_id(req: &ReturnRequest, cached_marker: Option<&str>) -> Option<Resolution> {
    let cached = cached_marker.map(str::trim).filter(|s| !s.is_empty());

    let candidates = [
        (req.query_value("order_id"), ResolutionSource::QueryOrderId),
        (req.query_value("orderId"), ResolutionSource::QueryOrderIdCamel),
        (req.effective_route_param(), ResolutionSource::RouteParam),
        (cached, ResolutionSource::CachedMarker),
    ];

    candidates
        .into_iter()
        .find_map(|(value, source)| {
            value.map(|v| Resolution {
                order_id: v.to_string(),
                source,
            })
        })
}
