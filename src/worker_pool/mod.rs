//! WorkerPool - system-wide session capacity
//!
//! ## Responsibilities
//!
//! - Fixed budget of concurrently running stream sessions
//! - Leases issued per session, returned to the pool on Drop
//!
//! Each lease covers one capture thread and one processing thread.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Lease bookkeeping entry
#[derive(Debug, Clone, Serialize)]
pub struct LeaseInfo {
    pub lease_id: Uuid,
    pub camera_id: String,
    pub acquired_at: DateTime<Utc>,
}

/// Pool status snapshot
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    pub capacity: usize,
    pub in_use: usize,
    pub leases: Vec<LeaseInfo>,
}

struct PoolInner {
    capacity: usize,
    leases: Mutex<HashMap<Uuid, LeaseInfo>>,
}

impl PoolInner {
    fn leases(&self) -> MutexGuard<'_, HashMap<Uuid, LeaseInfo>> {
        match self.leases.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Shared worker pool
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                capacity,
                leases: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Take a slot for `camera_id`, failing with `OverCapacity` when exhausted
    pub fn try_acquire(&self, camera_id: &str) -> Result<WorkerLease> {
        let mut leases = self.inner.leases();
        if leases.len() >= self.inner.capacity {
            tracing::warn!(
                camera_id = %camera_id,
                capacity = self.inner.capacity,
                "Worker pool exhausted"
            );
            return Err(Error::OverCapacity(format!(
                "all {} session slots are in use",
                self.inner.capacity
            )));
        }

        let info = LeaseInfo {
            lease_id: Uuid::new_v4(),
            camera_id: camera_id.to_string(),
            acquired_at: Utc::now(),
        };
        let lease_id = info.lease_id;
        leases.insert(lease_id, info);

        tracing::debug!(
            lease_id = %lease_id,
            camera_id = %camera_id,
            in_use = leases.len(),
            "Worker lease acquired"
        );

        Ok(WorkerLease {
            lease_id,
            camera_id: camera_id.to_string(),
            pool: self.inner.clone(),
        })
    }

    pub fn in_use(&self) -> usize {
        self.inner.leases().len()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn status(&self) -> PoolStatus {
        let leases = self.inner.leases();
        let mut entries: Vec<LeaseInfo> = leases.values().cloned().collect();
        entries.sort_by_key(|l| l.acquired_at);
        PoolStatus {
            capacity: self.inner.capacity,
            in_use: entries.len(),
            leases: entries,
        }
    }
}

/// Session slot - released on Drop
pub struct WorkerLease {
    lease_id: Uuid,
    camera_id: String,
    pool: Arc<PoolInner>,
}

impl WorkerLease {
    pub fn lease_id(&self) -> Uuid {
        self.lease_id
    }

    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }
}

impl Drop for WorkerLease {
    fn drop(&mut self) {
        self.pool.leases().remove(&self.lease_id);
        tracing::debug!(
            lease_id = %self.lease_id,
            camera_id = %self.camera_id,
            "Worker lease released"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_enforced() {
        let pool = WorkerPool::new(2);
        let a = pool.try_acquire("a").unwrap();
        let _b = pool.try_acquire("b").unwrap();
        assert!(matches!(pool.try_acquire("c"), Err(Error::OverCapacity(_))));

        drop(a);
        assert_eq!(pool.in_use(), 1);
        let c = pool.try_acquire("c").unwrap();
        assert_eq!(c.camera_id(), "c");
    }

    #[test]
    fn test_status_lists_leases() {
        let pool = WorkerPool::new(3);
        let lease = pool.try_acquire("lobby").unwrap();
        let status = pool.status();
        assert_eq!(status.capacity, 3);
        assert_eq!(status.in_use, 1);
        assert_eq!(status.leases[0].lease_id, lease.lease_id());
    }
}
