//! User-facing notifications ("toasts") for settled mutations.
//!
//! Notifications are a mutation observer, decoupled from cache consistency.
//! Swapping the [`Notifier`] replaces UI toasts with log lines or an
//! in-process event emitter.

#[cfg(feature = "emitter")]
mod emitter;
mod log;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::NotificationConfig;
use crate::mutation::{MutationContext, MutationKind, MutationObserver, Outcome};

#[cfg(feature = "emitter")]
pub use emitter::EmitterNotifier;
pub use log::LogNotifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Error,
    Info,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Success => write!(f, "success"),
            Level::Error => write!(f, "error"),
            Level::Info => write!(f, "info"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: Level,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: Level::Info,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Sink for notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Turns settled mutations into notifications.
///
/// One notification per settled mutation at most. Mutations whose scope was
/// disposed before they settled stay silent.
pub struct NotifyObserver {
    notifier: Arc<dyn Notifier>,
    config: NotificationConfig,
}

impl NotifyObserver {
    pub fn new(notifier: Arc<dyn Notifier>, config: NotificationConfig) -> Self {
        Self { notifier, config }
    }
}

#[async_trait]
impl MutationObserver for NotifyObserver {
    async fn on_settle(&self, ctx: &MutationContext, outcome: Outcome<'_>) {
        if ctx.is_detached() {
            return;
        }
        match outcome {
            Outcome::Succeeded if self.config.success => {
                self.notifier.notify(Notification::success(
                    "Success",
                    format!("{} {} successfully", ctx.label, past_tense(ctx.kind)),
                ));
            }
            Outcome::Failed(error) if self.config.errors => {
                let reason = error
                    .backend()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| error.to_string());
                self.notifier.notify(Notification::error(
                    "Error",
                    format!("Failed to {} {}: {}", ctx.kind, ctx.label, reason),
                ));
            }
            _ => {}
        }
    }
}

fn past_tense(kind: MutationKind) -> &'static str {
    match kind {
        MutationKind::Create => "created",
        MutationKind::Update => "updated",
        MutationKind::Delete => "deleted",
        MutationKind::Custom(_) => "saved",
    }
}
