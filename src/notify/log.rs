use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use super::{Level, Notification, Notifier};

/// Writes notifications to the log, or to a buffer for tests.
#[derive(Default)]
pub struct LogNotifier {
    buffer: Option<Arc<Mutex<Vec<Notification>>>>,
}

impl LogNotifier {
    pub fn new() -> Self {
        LogNotifier { buffer: None }
    }

    pub fn with_buffer(buffer: Arc<Mutex<Vec<Notification>>>) -> Self {
        LogNotifier {
            buffer: Some(buffer),
        }
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        if let Some(buffer) = &self.buffer {
            buffer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(notification);
            return;
        }
        match notification.level {
            Level::Error => warn!(title = %notification.title, "{}", notification.message),
            Level::Success | Level::Info => {
                info!(title = %notification.title, "{}", notification.message)
            }
        }
    }
}
