//! Secondary email-status watch.
//!
//! Runs beside the status poller and only feeds the display. One safety
//! net: if the backend reports zero emails sent, the notification is
//! re-triggered once. "Once" is guarded by a [`RetriggerLatch`]; the
//! default latch is shared by the whole process so a second return page
//! never re-triggers again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use cko_schemas::{EmailStatusResponse, MissedCallStatus, NotifyResponse};

/// One-shot flag. Cloning shares the flag.
#[derive(Clone, Debug, Default)]
pub struct RetriggerLatch(Arc<AtomicBool>);

impl RetriggerLatch {
    /// A fresh, unclaimed latch (tests, per-session isolation).
    pub fn new() -> Self {
        Self::default()
    }

    /// The latch shared by every watch in this process.
    pub fn process_wide() -> Self {
        static LATCH: OnceLock<RetriggerLatch> = OnceLock::new();
        LATCH.get_or_init(RetriggerLatch::new).clone()
    }

    /// `true` exactly once across all clones.
    pub fn try_claim(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_claimed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Ask the runtime to re-send the success notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Retrigger {
    pub order_id: String,
}

#[derive(Clone, Debug)]
pub struct EmailWatch {
    order_id: String,
    emails_sent: Option<u32>,
    email_errors: Vec<String>,
    missed_call_status: Option<MissedCallStatus>,
    latch: RetriggerLatch,
}

impl EmailWatch {
    pub fn new(order_id: impl Into<String>, latch: RetriggerLatch) -> Self {
        Self {
            order_id: order_id.into(),
            emails_sent: None,
            email_errors: Vec::new(),
            missed_call_status: None,
            latch,
        }
    }

    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    pub fn emails_sent(&self) -> Option<u32> {
        self.emails_sent
    }

    pub fn email_errors(&self) -> &[String] {
        &self.email_errors
    }

    pub fn missed_call_status(&self) -> Option<&MissedCallStatus> {
        self.missed_call_status.as_ref()
    }

    /// Absent fields leave the previous value in place.
    pub fn on_email_status(&mut self, resp: &EmailStatusResponse) -> Option<Retrigger> {
        if let Some(n) = resp.emails_sent {
            self.emails_sent = Some(n);
        }
        if !resp.email_errors.is_empty() {
            self.email_errors = resp.email_errors.clone();
        }
        if let Some(mc) = &resp.missed_call_status {
            self.missed_call_status = Some(mc.clone());
        }

        if resp.emails_sent == Some(0) && self.latch.try_claim() {
            return Some(Retrigger {
                order_id: self.order_id.clone(),
            });
        }
        None
    }

    /// Fold the notification response into the display fields.
    pub fn on_notify_response(&mut self, resp: &NotifyResponse) {
        if let Some(n) = resp.emails_sent {
            self.emails_sent = Some(n);
        }
        if !resp.email_errors.is_empty() {
            self.email_errors = resp.email_errors.clone();
        }
        if let Some(mc) = &resp.missed_call_status {
            self.missed_call_status = Some(mc.clone());
        }
    }
}
