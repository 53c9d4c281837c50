//! Scan debouncing
//!
//! A decoder reports the same symbol many times per second while the camera
//! rests on it. The debouncer accepts one decode, then ignores everything
//! until a short cooldown elapses. Ignored decodes are dropped, not queued.
//!
//! Both timers (re-arm and display expiry) are tokio tasks; they are aborted
//! when the debouncer is dropped.

use crate::models::CategoryId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Default delay before the next decode is accepted
pub const DEFAULT_REARM_COOLDOWN: Duration = Duration::from_millis(200);
/// Default time an accepted scan stays on screen
pub const DEFAULT_DISPLAY_WINDOW: Duration = Duration::from_millis(2000);

/// One raw symbol read by the external decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeEvent {
    pub symbol_value: String,
    pub timestamp: Instant,
}

impl DecodeEvent {
    pub fn now(symbol_value: impl Into<String>) -> Self {
        Self {
            symbol_value: symbol_value.into(),
            timestamp: Instant::now(),
        }
    }
}

/// A decode that passed the debouncer and should be recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedScan {
    pub value: String,
    pub category_id: Option<CategoryId>,
    pub scanned_at: Instant,
}

/// Sent to the presentation layer when an accepted scan should stop being shown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayExpired {
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Armed,
    Cooldown,
}

/// Two-state gate between the decoder and the aggregator.
///
/// Must be used from within a tokio runtime.
pub struct ScanDebouncer {
    armed: Arc<AtomicBool>,
    cooldown: Duration,
    display_window: Duration,
    category_id: Option<CategoryId>,
    display_tx: Option<UnboundedSender<DisplayExpired>>,
    rearm_task: Option<JoinHandle<()>>,
    display_task: Option<JoinHandle<()>>,
}

impl ScanDebouncer {
    pub fn new(cooldown: Duration, display_window: Duration) -> Self {
        Self {
            armed: Arc::new(AtomicBool::new(true)),
            cooldown,
            display_window,
            category_id: None,
            display_tx: None,
            rearm_task: None,
            display_task: None,
        }
    }

    /// Receive [`DisplayExpired`] signals on `tx`
    pub fn with_display_channel(mut self, tx: UnboundedSender<DisplayExpired>) -> Self {
        self.display_tx = Some(tx);
        self
    }

    /// Category attached to subsequent accepted scans
    pub fn select_category(&mut self, category_id: Option<CategoryId>) {
        self.category_id = category_id;
    }

    pub fn selected_category(&self) -> Option<&CategoryId> {
        self.category_id.as_ref()
    }

    /// Forget a selected category that has just been removed
    pub fn on_category_removed(&mut self, category_id: &CategoryId) {
        if self.category_id.as_ref() == Some(category_id) {
            self.category_id = None;
        }
    }

    pub fn state(&self) -> DebounceState {
        if self.armed.load(Ordering::Acquire) {
            DebounceState::Armed
        } else {
            DebounceState::Cooldown
        }
    }

    /// Gate one raw decode. Returns the scan to record, or `None` if dropped.
    pub fn on_decode(&mut self, event: DecodeEvent) -> Option<AcceptedScan> {
        let value = event.symbol_value.as_str();
        if value.trim().is_empty() {
            log::debug!("Ignoring blank decode");
            return None;
        }

        // Armed -> Cooldown, exactly once per cooldown period
        if self
            .armed
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }

        self.schedule_rearm();
        self.schedule_display_expiry(value);

        log::debug!("Accepted scan: {} ({:?})", value, self.category_id);
        Some(AcceptedScan {
            value: value.to_string(),
            category_id: self.category_id.clone(),
            scanned_at: event.timestamp,
        })
    }

    fn schedule_rearm(&mut self) {
        let armed = Arc::clone(&self.armed);
        let deadline = Instant::now() + self.cooldown;
        if let Some(previous) = self.rearm_task.take() {
            previous.abort();
        }
        self.rearm_task = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            armed.store(true, Ordering::Release);
        }));
    }

    fn schedule_display_expiry(&mut self, value: &str) {
        let Some(tx) = self.display_tx.clone() else {
            return;
        };
        let deadline = Instant::now() + self.display_window;
        let value = value.to_string();
        // A newer scan replaces the one on screen
        if let Some(previous) = self.display_task.take() {
            previous.abort();
        }
        self.display_task = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = tx.send(DisplayExpired { value });
        }));
    }
}

impl Default for ScanDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_REARM_COOLDOWN, DEFAULT_DISPLAY_WINDOW)
    }
}

impl Drop for ScanDebouncer {
    fn drop(&mut self) {
        for task in [self.rearm_task.take(), self.display_task.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
    }
}
