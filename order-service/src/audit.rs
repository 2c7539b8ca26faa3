use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::*;
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

pub const DEFAULT_AUDIT_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PermissionAuditEntry {
    pub at: DateTime<Utc>,
    pub user_id: Uuid,
    pub role: Role,
    pub resource: Resource,
    pub action: Action,
    pub decision: Decision,
}

/// Bounded log of recent permission checks. Oldest entries are dropped
/// once `capacity` is reached; nothing is persisted.
pub struct PermissionAuditLog {
    entries: Mutex<VecDeque<PermissionAuditEntry>>,
    capacity: usize,
}

impl PermissionAuditLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn record(&self, entry: PermissionAuditEntry) {
        match entry.decision {
            Decision::Allow => debug!(
                user_id = %entry.user_id,
                role = %entry.role,
                resource = %entry.resource,
                action = %entry.action,
                "Permission granted"
            ),
            Decision::Deny => warn!(
                user_id = %entry.user_id,
                role = %entry.role,
                resource = %entry.resource,
                action = %entry.action,
                "Permission denied"
            ),
        }

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Up to `limit` entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<PermissionAuditEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().rev().take(limit).cloned().collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for PermissionAuditLog {
    fn default() -> Self {
        Self::new(DEFAULT_AUDIT_CAPACITY)
    }
}
