//! Reconciliation flags held in process memory.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::guard;
use crate::domain::AccountId;
use crate::domain::ports::{
    FlagReason, ReconciliationFlag, ReconciliationLog, ReconciliationLogError,
};

#[derive(Debug, Default)]
pub struct MemoryReconciliationLog {
    flags: Mutex<HashMap<AccountId, ReconciliationFlag>>,
}

impl MemoryReconciliationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every open flag, oldest first.
    pub fn flags(&self) -> Vec<ReconciliationFlag> {
        let mut flags: Vec<_> = self
            .flags
            .lock()
            .map(|flags| flags.values().cloned().collect())
            .unwrap_or_default();
        flags.sort_by_key(|flag| flag.flagged_at);
        flags
    }
}

#[async_trait]
impl ReconciliationLog for MemoryReconciliationLog {
    async fn record(&self, flag: &ReconciliationFlag) -> Result<(), ReconciliationLogError> {
        let mut flags = guard(&self.flags, ReconciliationLogError::query)?;
        flags.insert(flag.account_id, flag.clone());
        Ok(())
    }

    async fn resolve(&self, account_id: &AccountId) -> Result<(), ReconciliationLogError> {
        let mut flags = guard(&self.flags, ReconciliationLogError::query)?;
        flags.remove(account_id);
        Ok(())
    }

    async fn due(
        &self,
        pending_cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ReconciliationFlag>, ReconciliationLogError> {
        let flags = guard(&self.flags, ReconciliationLogError::query)?;
        let mut due: Vec<_> = flags
            .values()
            .filter(|flag| {
                flag.reason == FlagReason::CompensationFailed || flag.flagged_at <= pending_cutoff
            })
            .cloned()
            .collect();
        due.sort_by_key(|flag| flag.flagged_at);
        due.truncate(limit);
        Ok(due)
    }
}
