use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::config::Settings;

/// The single outbound payload: both documents already decoded to text.
/// Field names follow the evaluator's wire contract.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EvaluationRequest {
    pub(crate) student_answers: String,
    pub(crate) answer_key: String,
}

/// Shape-checked evaluator response. Deserialization rejects a body with a
/// missing or mistyped field; semantic invariants are checked by the caller.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EvaluationPayload {
    pub(crate) score: f64,
    pub(crate) total_questions: u32,
    pub(crate) wrong_answers: Vec<WrongAnswerPayload>,
    pub(crate) feedback: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WrongAnswerPayload {
    pub(crate) question: String,
    pub(crate) student_answer: String,
    pub(crate) correct_answer: String,
}

#[derive(Debug, Error)]
pub(crate) enum EvaluatorError {
    #[error("evaluator request timed out")]
    Timeout,
    #[error("failed to reach evaluator")]
    Transport(#[source] reqwest::Error),
    #[error("evaluator returned status {0}")]
    Status(StatusCode),
    #[error("evaluator response is malformed: {0}")]
    Malformed(String),
}

/// HTTP client for the external grading service. One request per grading
/// run, bearer credential attached per call, no retries.
#[derive(Debug, Clone)]
pub(crate) struct EvaluatorClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl EvaluatorClient {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let evaluator = settings.evaluator();
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(evaluator.connect_timeout_seconds))
            .timeout(Duration::from_secs(evaluator.request_timeout_seconds))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: evaluator.base_url.trim_end_matches('/').to_string(),
            api_key: evaluator.api_key.clone(),
        })
    }

    /// Issues exactly one call to the evaluator and shape-checks the reply.
    /// A non-success status fails without reading the body.
    pub(crate) async fn evaluate(
        &self,
        request: &EvaluationRequest,
    ) -> Result<EvaluationPayload, EvaluatorError> {
        let timer = Instant::now();
        let url = format!("{}/grade-exam", self.base_url);

        tracing::info!(
            student_bytes = request.student_answers.len(),
            key_bytes = request.answer_key.len(),
            "Sending evaluation request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(EvaluatorError::Status(status));
        }

        let payload = response
            .json::<EvaluationPayload>()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    EvaluatorError::Timeout
                } else {
                    EvaluatorError::Malformed(err.to_string())
                }
            })?;

        tracing::info!(
            duration_seconds = timer.elapsed().as_secs_f64(),
            total_questions = payload.total_questions,
            "Evaluation completed"
        );

        Ok(payload)
    }
}

fn classify_request_error(err: reqwest::Error) -> EvaluatorError {
    if err.is_timeout() {
        EvaluatorError::Timeout
    } else {
        EvaluatorError::Transport(err)
    }
}
