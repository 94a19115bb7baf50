use std::sync::Arc;

use crate::core::config::Settings;
use crate::core::security::{CredentialVerifier, StaticCredentials};
use crate::services::evaluator::EvaluatorClient;
use crate::workflow::orchestrator::GradingOrchestrator;
use crate::workflow::session::SessionStore;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    sessions: SessionStore,
    orchestrator: GradingOrchestrator,
    credentials: Arc<dyn CredentialVerifier>,
}

impl AppState {
    pub(crate) fn new(settings: Settings, evaluator: EvaluatorClient) -> Self {
        let credentials = Arc::new(StaticCredentials::from_settings(&settings));
        Self {
            inner: Arc::new(InnerState {
                settings,
                sessions: SessionStore::new(),
                orchestrator: GradingOrchestrator::new(evaluator),
                credentials,
            }),
        }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }

    pub(crate) fn orchestrator(&self) -> &GradingOrchestrator {
        &self.inner.orchestrator
    }

    pub(crate) fn credentials(&self) -> &dyn CredentialVerifier {
        self.inner.credentials.as_ref()
    }
}
