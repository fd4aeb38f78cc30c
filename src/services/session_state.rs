//! Session State & Circuit Breaker: process-wide counters and
//! the active MCP session id, plus a refusal circuit breaker over
//! `task(start)` calls.
//!
//! An `Arc<RwLock<...>>`-guarded counter set behind a config struct, `check`
//! before the action and `record_*` after it. A single global "consecutive
//! starts without a complete" counter, not one per task chain.

use tokio::sync::RwLock;

use crate::domain::error::{TaskWingError, TaskWingResult};

#[derive(Debug, Clone, Copy)]
pub struct SessionStateConfig {
    /// Number of consecutive `task(start)` calls without an intervening
    /// `task(complete)` before further starts are refused.
    pub consecutive_start_threshold: u32,
}

impl Default for SessionStateConfig {
    fn default() -> Self {
        Self {
            consecutive_start_threshold: 5,
        }
    }
}

/// Process-wide counters, reset when the process restarts (not persisted to
/// `state.json` — only the active plan pointer survives a restart, via
/// `MemoryStore::get_active_plan`/`set_active_plan`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub tasks_started: u64,
    pub tasks_completed: u64,
    pub consecutive_starts_without_complete: u32,
}

#[derive(Debug, Default)]
struct Inner {
    active_mcp_session_id: Option<String>,
    counters: Counters,
}

pub struct SessionStateService {
    config: SessionStateConfig,
    inner: RwLock<Inner>,
}

impl SessionStateService {
    pub fn new(config: SessionStateConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(Inner::default()),
        }
    }

    pub async fn begin_mcp_session(&self, session_id: impl Into<String>) {
        self.inner.write().await.active_mcp_session_id = Some(session_id.into());
    }

    pub async fn end_mcp_session(&self) {
        self.inner.write().await.active_mcp_session_id = None;
    }

    pub async fn active_mcp_session_id(&self) -> Option<String> {
        self.inner.read().await.active_mcp_session_id.clone()
    }

    /// Record a `task(start)` call. Returns `TaskWingError::Refusal` once
    /// `consecutive_start_threshold` starts have happened with no
    /// intervening `task(complete)`.
    pub async fn record_task_start(&self) -> TaskWingResult<()> {
        let mut inner = self.inner.write().await;
        if inner.counters.consecutive_starts_without_complete >= self.config.consecutive_start_threshold {
            return Err(TaskWingError::Refusal(format!(
                "{} consecutive task starts without a complete",
                inner.counters.consecutive_starts_without_complete
            )));
        }
        inner.counters.tasks_started += 1;
        inner.counters.consecutive_starts_without_complete += 1;
        Ok(())
    }

    /// Record a `task(complete)` call, resetting the consecutive-start
    /// counter that drives the circuit breaker.
    pub async fn record_task_complete(&self) {
        let mut inner = self.inner.write().await;
        inner.counters.tasks_completed += 1;
        inner.counters.consecutive_starts_without_complete = 0;
    }

    pub async fn counters(&self) -> Counters {
        self.inner.read().await.counters
    }

    pub async fn reset(&self) {
        let mut inner = self.inner.write().await;
        inner.counters = Counters::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_below_threshold_are_allowed() {
        let service = SessionStateService::new(SessionStateConfig {
            consecutive_start_threshold: 3,
        });
        for _ in 0..3 {
            service.record_task_start().await.unwrap();
        }
        let counters = service.counters().await;
        assert_eq!(counters.tasks_started, 3);
        assert_eq!(counters.consecutive_starts_without_complete, 3);
    }

    #[tokio::test]
    async fn starts_past_threshold_are_refused_with_circuit_breaker_hint() {
        let service = SessionStateService::new(SessionStateConfig {
            consecutive_start_threshold: 2,
        });
        service.record_task_start().await.unwrap();
        service.record_task_start().await.unwrap();
        let err = service.record_task_start().await.unwrap_err();
        assert!(matches!(err, TaskWingError::Refusal(_)));
        assert_eq!(err.default_hint(), Some("circuit breaker engaged"));
    }

    #[tokio::test]
    async fn a_complete_resets_the_consecutive_counter() {
        let service = SessionStateService::new(SessionStateConfig {
            consecutive_start_threshold: 2,
        });
        service.record_task_start().await.unwrap();
        service.record_task_complete().await;
        service.record_task_start().await.unwrap();
        service.record_task_start().await.unwrap();
        assert_eq!(service.counters().await.consecutive_starts_without_complete, 2);
    }

    #[tokio::test]
    async fn mcp_session_id_tracks_begin_and_end() {
        let service = SessionStateService::new(SessionStateConfig::default());
        assert_eq!(service.active_mcp_session_id().await, None);
        service.begin_mcp_session("session-1").await;
        assert_eq!(service.active_mcp_session_id().await, Some("session-1".to_string()));
        service.end_mcp_session().await;
        assert_eq!(service.active_mcp_session_id().await, None);
    }
}
