use async_trait::async_trait;
use sqlx::PgPool;
use tracing::warn;

use crate::db;

/// Best-effort audit trail. Implementations must never let a write failure
/// escape to the caller: the audit log is observability, not part of the
/// primary operation's outcome.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, op_type: &str, status: &str, detail: &str);
}

pub struct DbAudit {
    pool: PgPool,
}

impl DbAudit {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for DbAudit {
    async fn record(&self, op_type: &str, status: &str, detail: &str) {
        if let Err(e) = db::operation_log_queries::insert(&self.pool, op_type, status, detail).await
        {
            warn!("Failed to write operation log ({}/{}): {}", op_type, status, e);
        }
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Captures entries in memory so tests can assert on the audit trail.
    #[derive(Default)]
    pub struct MemoryAudit {
        pub entries: Mutex<Vec<(String, String, String)>>,
    }

    impl MemoryAudit {
        pub fn statuses(&self, op_type: &str) -> Vec<String> {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .filter(|(t, _, _)| t == op_type)
                .map(|(_, s, _)| s.clone())
                .collect()
        }
    }

    #[async_trait]
    impl AuditSink for MemoryAudit {
        async fn record(&self, op_type: &str, status: &str, detail: &str) {
            self.entries.lock().unwrap().push((
                op_type.to_string(),
                status.to_string(),
                detail.to_string(),
            ));
        }
    }
}
