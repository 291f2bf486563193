//! Activity log: one `activity_logs` row per successful admin mutation.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use crate::backend::{Auth, Backend};
use crate::entities::ActivityLog;
use crate::mutation::{MutationContext, MutationObserver, Resolution};
use crate::record::{to_row, Record};

/// Mutation observer writing the activity log.
///
/// Logging failures are reported with `warn!` and never affect the mutation.
pub struct ActivityLogger {
    backend: Arc<dyn Backend>,
    auth: Option<Arc<dyn Auth>>,
}

impl ActivityLogger {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            auth: None,
        }
    }

    /// Attribute entries to the signed-in admin.
    pub fn with_auth(mut self, auth: Arc<dyn Auth>) -> Self {
        self.auth = Some(auth);
        self
    }

    async fn entry(&self, ctx: &MutationContext) -> ActivityLog {
        let user_id = match &self.auth {
            Some(auth) => auth.session().await.map(|s| s.user_id),
            None => None,
        };
        ActivityLog {
            action: ctx.kind.to_string(),
            entity_type: ctx.table.to_string(),
            entity_id: ctx.entity_id.clone(),
            details: Some(json!({ "label": ctx.label, "key": ctx.key.to_string() })),
            user_id,
            ..Default::default()
        }
    }
}

#[async_trait]
impl MutationObserver for ActivityLogger {
    async fn after_settle(&self, ctx: &MutationContext, resolution: Resolution) {
        if resolution != Resolution::Reconciled || ctx.table == ActivityLog::TABLE {
            return;
        }
        let entry = self.entry(ctx).await;
        let row = match to_row(&entry) {
            Ok(row) => row,
            Err(err) => {
                warn!(error = %err, "activity entry not serializable");
                return;
            }
        };
        if let Err(err) = self.backend.insert(ActivityLog::TABLE, row).await {
            warn!(table = ctx.table, error = %err, "failed to write activity log");
        }
    }
}
