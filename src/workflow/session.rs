use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::workflow::intake::IntakeController;
use crate::workflow::GradingResult;

/// Where a session's grading state machine currently sits. `Reading` and
/// `Requesting` are the in-flight phases guarded against re-entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum RunPhase {
    Idle,
    Reading,
    Requesting,
    Succeeded,
    Failed,
}

impl RunPhase {
    pub(crate) fn is_in_flight(self) -> bool {
        matches!(self, RunPhase::Reading | RunPhase::Requesting)
    }
}

/// All UI-bound state for one authenticated visit: the two upload slots, the
/// run phase, and the last published result. Owned exclusively by the
/// session; nothing here crosses session boundaries.
#[derive(Debug)]
pub(crate) struct GradingSession {
    intake: IntakeController,
    phase: RunPhase,
    last_result: Option<GradingResult>,
}

pub(crate) type SharedSession = Arc<Mutex<GradingSession>>;

impl GradingSession {
    pub(crate) fn new() -> Self {
        Self { intake: IntakeController::default(), phase: RunPhase::Idle, last_result: None }
    }

    pub(crate) fn intake(&self) -> &IntakeController {
        &self.intake
    }

    pub(crate) fn intake_mut(&mut self) -> &mut IntakeController {
        &mut self.intake
    }

    pub(crate) fn phase(&self) -> RunPhase {
        self.phase
    }

    pub(crate) fn last_result(&self) -> Option<&GradingResult> {
        self.last_result.as_ref()
    }

    pub(crate) fn begin_reading(&mut self) {
        self.phase = RunPhase::Reading;
    }

    pub(crate) fn begin_requesting(&mut self) {
        self.phase = RunPhase::Requesting;
    }

    /// Publishes a fresh result. The prior result is replaced, never merged.
    pub(crate) fn complete(&mut self, result: GradingResult) {
        self.last_result = Some(result);
        self.phase = RunPhase::Succeeded;
    }

    /// Terminal failure. The last published result, if any, stays as it was.
    pub(crate) fn fail(&mut self) {
        self.phase = RunPhase::Failed;
    }
}

/// In-memory registry of live sessions, keyed by the id carried in the
/// bearer token. Sessions are never persisted; a restart clears them all.
#[derive(Clone)]
pub(crate) struct SessionStore {
    inner: Arc<Mutex<HashMap<String, SharedSession>>>,
}

impl SessionStore {
    pub(crate) fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Creates a fresh session and returns its id.
    pub(crate) async fn create(&self) -> String {
        let id = Uuid::new_v4().to_string();
        let session = Arc::new(Mutex::new(GradingSession::new()));
        self.inner.lock().await.insert(id.clone(), session);
        id
    }

    pub(crate) async fn get(&self, id: &str) -> Option<SharedSession> {
        self.inner.lock().await.get(id).cloned()
    }

    pub(crate) async fn remove(&self, id: &str) -> bool {
        self.inner.lock().await.remove(id).is_some()
    }

    pub(crate) async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_creates_and_removes_sessions() {
        let store = SessionStore::new();
        assert_eq!(store.len().await, 0);

        let id = store.create().await;
        assert!(store.get(&id).await.is_some());
        assert_eq!(store.len().await, 1);

        assert!(store.remove(&id).await);
        assert!(store.get(&id).await.is_none());
        assert!(!store.remove(&id).await);
    }

    #[tokio::test]
    async fn each_login_gets_an_isolated_session() {
        let store = SessionStore::new();
        let first = store.create().await;
        let second = store.create().await;
        assert_ne!(first, second);

        let session = store.get(&first).await.expect("first session");
        session.lock().await.begin_reading();

        let other = store.get(&second).await.expect("second session");
        assert_eq!(other.lock().await.phase(), RunPhase::Idle);
    }

    #[test]
    fn in_flight_phases() {
        assert!(RunPhase::Reading.is_in_flight());
        assert!(RunPhase::Requesting.is_in_flight());
        assert!(!RunPhase::Idle.is_in_flight());
        assert!(!RunPhase::Succeeded.is_in_flight());
        assert!(!RunPhase::Failed.is_in_flight());
    }
}
