//! Processing engine: the concurrency gate
//!
//! Bounds how many chunk-processing invocations run simultaneously and
//! tracks the current job per session. The two concerns are deliberately
//! separate:
//!
//! - A [`JobGuard`] is the session's registry entry, held for a whole
//!   producer epoch. It carries no permit, so an idle or paused session
//!   costs nothing at the gate.
//! - A [`ChunkPermit`] is one slot at the semaphore, acquired around each
//!   decode+DSP invocation and released the moment that work finishes.
//!
//! Job identity is a fresh `Uuid` per submission, never the session key
//! alone. Cleanup (explicit cancel or guard drop) verifies the registry
//! still maps the session to *this* job before removing the entry. Without
//! the check, a rapid track-skip that supersedes job N with job N+1 lets
//! N's late cleanup delete N+1's bookkeeping.
//!
//! Jobs are cooperatively cancelled between chunks, never killed mid-chunk.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};
use uuid::Uuid;

/// Live view of the active-job registry entry for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveJob {
    pub job_id: Uuid,
}

/// Handle to a registered job. Dropping the guard removes the registry
/// entry if (and only if) it still belongs to this job.
pub struct JobGuard {
    engine: Arc<ProcessingEngine>,
    session_key: Uuid,
    job_id: Uuid,
}

impl JobGuard {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn session_key(&self) -> Uuid {
        self.session_key
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.engine.release(self.session_key, self.job_id);
    }
}

/// One slot at the concurrency gate, held only while a chunk is actually
/// being decoded and mastered.
#[derive(Debug)]
pub struct ChunkPermit {
    _permit: OwnedSemaphorePermit,
}

/// Global concurrency gate with a per-session active-job registry.
pub struct ProcessingEngine {
    semaphore: Arc<Semaphore>,
    registry: Mutex<HashMap<Uuid, ActiveJob>>,
    max_jobs: usize,
}

impl ProcessingEngine {
    pub fn new(max_jobs: usize) -> Arc<Self> {
        let max_jobs = max_jobs.max(1);
        info!("processing engine gate: {} concurrent jobs", max_jobs);
        Arc::new(Self {
            semaphore: Arc::new(Semaphore::new(max_jobs)),
            registry: Mutex::new(HashMap::new()),
            max_jobs,
        })
    }

    pub fn max_jobs(&self) -> usize {
        self.max_jobs
    }

    /// Register a job for a session. The new job supersedes any previous
    /// registry entry for the session; the superseded job's guard will fail
    /// its identity check on release and leave this entry alone.
    pub fn submit(self: &Arc<Self>, session_key: Uuid) -> JobGuard {
        let job_id = Uuid::new_v4();
        let previous = self
            .registry
            .lock()
            .expect("registry lock poisoned")
            .insert(session_key, ActiveJob { job_id });
        if let Some(prev) = previous {
            debug!(
                "session {} job {} superseded by {}",
                session_key, prev.job_id, job_id
            );
        }
        JobGuard {
            engine: Arc::clone(self),
            session_key,
            job_id,
        }
    }

    /// Acquire a processing slot, waiting for one to free up. Slots cycle
    /// at chunk granularity, so the wait is bounded by one chunk's worth of
    /// work per queued job ahead of this one.
    pub async fn acquire(self: &Arc<Self>) -> Result<ChunkPermit> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| Error::Internal("engine semaphore closed".to_string()))?;
        Ok(ChunkPermit { _permit: permit })
    }

    /// Acquire a processing slot without waiting. `CapacityExceeded` when
    /// the gate is full; callers should retry with backoff rather than
    /// treat it as fatal.
    pub fn try_acquire(self: &Arc<Self>) -> Result<ChunkPermit> {
        let permit = Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .map_err(|_| {
                Error::CapacityExceeded(format!(
                    "all {} processing slots busy",
                    self.max_jobs
                ))
            })?;
        Ok(ChunkPermit { _permit: permit })
    }

    /// Explicitly cancel a job. Equivalent to dropping the guard; provided
    /// so call sites can make cancellation visible.
    pub fn cancel(&self, guard: JobGuard) {
        drop(guard);
    }

    /// Identity-checked removal: only the entry belonging to `job_id` is
    /// removed. A stale guard releasing after being superseded is a no-op.
    fn release(&self, session_key: Uuid, job_id: Uuid) {
        let mut registry = self.registry.lock().expect("registry lock poisoned");
        match registry.get(&session_key) {
            Some(active) if active.job_id == job_id => {
                registry.remove(&session_key);
            }
            Some(active) => {
                debug!(
                    "session {}: stale release of job {} (current is {}), keeping entry",
                    session_key, job_id, active.job_id
                );
            }
            None => {}
        }
    }

    /// Current job for a session, if any
    pub fn current_job(&self, session_key: Uuid) -> Option<ActiveJob> {
        self.registry
            .lock()
            .expect("registry lock poisoned")
            .get(&session_key)
            .copied()
    }

    /// Number of chunk invocations currently holding slots
    pub fn active_count(&self) -> usize {
        self.max_jobs - self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn permit_released_on_drop() {
        let engine = ProcessingEngine::new(1);

        let permit = engine.acquire().await.unwrap();
        assert_eq!(engine.active_count(), 1);
        assert!(engine.try_acquire().is_err());

        drop(permit);
        assert_eq!(engine.active_count(), 0);
        assert!(engine.try_acquire().is_ok());
    }

    #[tokio::test]
    async fn try_acquire_reports_capacity() {
        let engine = ProcessingEngine::new(2);
        let _a = engine.acquire().await.unwrap();
        let _b = engine.acquire().await.unwrap();

        let err = match engine.try_acquire() {
            Err(e) => e,
            Ok(_) => panic!("expected the gate to be full"),
        };
        assert!(matches!(err, Error::CapacityExceeded(_)));
    }

    #[tokio::test]
    async fn registered_job_holds_no_slot() {
        // The registry entry is bookkeeping only; an idle session must not
        // pin a processing slot.
        let engine = ProcessingEngine::new(1);
        let _job = engine.submit(Uuid::new_v4());

        assert_eq!(engine.active_count(), 0);
        assert!(engine.try_acquire().is_ok());
    }

    #[tokio::test]
    async fn stale_cancellation_keeps_successor_entry() {
        let engine = ProcessingEngine::new(4);
        let session = Uuid::new_v4();

        // Job A, then job B supersedes it on the same session key
        let guard_a = engine.submit(session);
        let guard_b = engine.submit(session);
        let job_b = guard_b.job_id();

        // A's late cancellation must not delete B's bookkeeping
        engine.cancel(guard_a);
        assert_eq!(
            engine.current_job(session),
            Some(ActiveJob { job_id: job_b })
        );

        drop(guard_b);
        assert_eq!(engine.current_job(session), None);
    }

    #[tokio::test]
    async fn release_order_b_then_a_also_safe() {
        let engine = ProcessingEngine::new(4);
        let session = Uuid::new_v4();

        let guard_a = engine.submit(session);
        let guard_b = engine.submit(session);

        // B finishes first and clears the entry; A's release finds nothing
        drop(guard_b);
        assert_eq!(engine.current_job(session), None);
        drop(guard_a);
        assert_eq!(engine.current_job(session), None);
    }
}
