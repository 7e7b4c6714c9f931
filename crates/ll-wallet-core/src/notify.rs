use ll_api_types::{NotificationLevel, NotificationView};
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use tracing::{info, warn};

pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 100;

/// User-visible, fire-and-forget notices.
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
}

/// Bounded in-memory notification feed, polled by the front end.
pub struct NotificationLog {
    inner: Mutex<LogState>,
    capacity: usize,
}

#[derive(Default)]
struct LogState {
    entries: VecDeque<NotificationView>,
    last_seq: u64,
}

impl Default for NotificationLog {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_CAPACITY)
    }
}

impl NotificationLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LogState::default()),
            capacity: capacity.max(1),
        }
    }

    /// Notifications with `seq > after`, oldest first.
    pub fn after(&self, after: u64) -> Vec<NotificationView> {
        let state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .entries
            .iter()
            .filter(|entry| entry.seq > after)
            .cloned()
            .collect()
    }

    pub fn last_seq(&self) -> u64 {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).last_seq
    }

    fn push(&self, level: NotificationLevel, message: &str) {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.last_seq += 1;
        let seq = state.last_seq;
        state.entries.push_back(NotificationView {
            seq,
            level,
            message: message.to_owned(),
        });
        while state.entries.len() > self.capacity {
            state.entries.pop_front();
        }
    }
}

impl Notifier for NotificationLog {
    fn success(&self, message: &str) {
        info!(notification = message, "success");
        self.push(NotificationLevel::Success, message);
    }

    fn error(&self, message: &str) {
        warn!(notification = message, "error");
        self.push(NotificationLevel::Error, message);
    }
}
