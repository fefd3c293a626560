//! Scripted [`CheckoutApi`].
//!
//! Each endpoint answers from a FIFO script; once the script is empty it
//! repeats its fallback forever. Every call is recorded.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use cko_client::{ApiError, CheckoutApi};
use cko_schemas::{
    EmailStatusResponse, HealthResponse, NotifyRequest, NotifyResponse, OrderRecord,
    OrderStatusResponse,
};
use url::Url;

use crate::pending_status;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    PrepareOrder(String),
    PaymentForm(i64),
    OrderStatus(String),
    Notify(NotifyRequest),
    EmailStatus(String),
    Health,
}

/// What an unreachable backend looks like.
pub fn transport_error(endpoint: &str) -> ApiError {
    ApiError::Transport {
        endpoint: endpoint.to_string(),
        message: "connection refused".to_string(),
    }
}

struct Script<T> {
    queue: VecDeque<Result<T, ApiError>>,
    fallback: Result<T, ApiError>,
}

impl<T: Clone> Script<T> {
    fn new(fallback: Result<T, ApiError>) -> Self {
        Self {
            queue: VecDeque::new(),
            fallback,
        }
    }

    fn next(&mut self) -> Result<T, ApiError> {
        self.queue
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

pub struct ScriptedApi {
    prepare: Mutex<Script<()>>,
    payment_form: Mutex<Script<Url>>,
    status: Mutex<Script<OrderStatusResponse>>,
    notify: Mutex<Script<NotifyResponse>>,
    email: Mutex<Script<EmailStatusResponse>>,
    health: Mutex<Script<HealthResponse>>,
    calls: Mutex<Vec<ApiCall>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

impl Default for ScriptedApi {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedApi {
    /// Healthy backend whose orders stay pending and whose notifications
    /// report two emails sent.
    pub fn new() -> Self {
        let form = Url::parse("https://payments.example/form/test")
            .map_err(|e| ApiError::Config(e.to_string()));
        Self {
            prepare: Mutex::new(Script::new(Ok(()))),
            payment_form: Mutex::new(Script::new(form)),
            status: Mutex::new(Script::new(Ok(pending_status()))),
            notify: Mutex::new(Script::new(Ok(NotifyResponse {
                success: true,
                emails_sent: Some(2),
                ..NotifyResponse::default()
            }))),
            email: Mutex::new(Script::new(Ok(EmailStatusResponse {
                emails_sent: Some(2),
                ..EmailStatusResponse::default()
            }))),
            health: Mutex::new(Script::new(Ok(HealthResponse {
                status: Some("ok".to_string()),
            }))),
            calls: Mutex::new(Vec::new()),
        }
    }

    // --- scripting -------------------------------------------------------

    pub fn push_status(self, r: Result<OrderStatusResponse, ApiError>) -> Self {
        lock(&self.status).queue.push_back(r);
        self
    }

    pub fn status_fallback(self, r: Result<OrderStatusResponse, ApiError>) -> Self {
        lock(&self.status).fallback = r;
        self
    }

    pub fn push_email(self, r: Result<EmailStatusResponse, ApiError>) -> Self {
        lock(&self.email).queue.push_back(r);
        self
    }

    pub fn email_fallback(self, r: Result<EmailStatusResponse, ApiError>) -> Self {
        lock(&self.email).fallback = r;
        self
    }

    pub fn push_notify(self, r: Result<NotifyResponse, ApiError>) -> Self {
        lock(&self.notify).queue.push_back(r);
        self
    }

    pub fn prepare_fallback(self, r: Result<(), ApiError>) -> Self {
        lock(&self.prepare).fallback = r;
        self
    }

    pub fn payment_form_fallback(self, r: Result<Url, ApiError>) -> Self {
        lock(&self.payment_form).fallback = r;
        self
    }

    pub fn push_health(self, r: Result<HealthResponse, ApiError>) -> Self {
        lock(&self.health).queue.push_back(r);
        self
    }

    // --- inspection ------------------------------------------------------

    pub fn calls(&self) -> Vec<ApiCall> {
        lock(&self.calls).clone()
    }

    pub fn status_calls(&self) -> usize {
        self.count(|c| matches!(c, ApiCall::OrderStatus(_)))
    }

    pub fn email_calls(&self) -> usize {
        self.count(|c| matches!(c, ApiCall::EmailStatus(_)))
    }

    pub fn notifications(&self) -> Vec<NotifyRequest> {
        lock(&self.calls)
            .iter()
            .filter_map(|c| match c {
                ApiCall::Notify(req) => Some(req.clone()),
                _ => None,
            })
            .collect()
    }

    fn count(&self, f: impl Fn(&ApiCall) -> bool) -> usize {
        lock(&self.calls).iter().filter(|c| f(c)).count()
    }

    fn record(&self, call: ApiCall) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl CheckoutApi for ScriptedApi {
    async fn prepare_order(&self, record: &OrderRecord) -> Result<(), ApiError> {
        self.record(ApiCall::PrepareOrder(record.order_id.clone()));
        lock(&self.prepare).next()
    }

    async fn payment_form(&self, amount: i64) -> Result<Url, ApiError> {
        self.record(ApiCall::PaymentForm(amount));
        lock(&self.payment_form).next()
    }

    async fn order_status(&self, order_id: &str) -> Result<OrderStatusResponse, ApiError> {
        self.record(ApiCall::OrderStatus(order_id.to_string()));
        lock(&self.status).next()
    }

    async fn notify_success(&self, req: &NotifyRequest) -> Result<NotifyResponse, ApiError> {
        self.record(ApiCall::Notify(req.clone()));
        lock(&self.notify).next()
    }

    async fn email_status(&self, order_id: &str) -> Result<EmailStatusResponse, ApiError> {
        self.record(ApiCall::EmailStatus(order_id.to_string()));
        lock(&self.email).next()
    }

    async fn health(&self) -> Result<HealthResponse, ApiError> {
        self.record(ApiCall::Health);
        lock(&self.health).next()
    }
}
