use std::time::Instant;

use thiserror::Error;

use crate::services::evaluator::{
    EvaluationPayload, EvaluationRequest, EvaluatorClient, EvaluatorError,
};
use crate::workflow::intake::{DocumentRole, UploadSlot};
use crate::workflow::session::SharedSession;
use crate::workflow::{GradingResult, WrongAnswer};

/// The evaluator scores on a fixed 0-10 scale.
pub(crate) const MAX_SCORE: f64 = 10.0;

#[derive(Debug, Error)]
pub(crate) enum WorkflowError {
    /// Grading was triggered before both documents were selected. Checked
    /// before any state transition; no I/O has happened.
    #[error("both documents are required")]
    Precondition,
    /// A grading run is already reading or requesting for this session.
    /// Not a run failure: the running cycle is left untouched.
    #[error("a grading run is already in progress")]
    InFlight,
    #[error("{role} document could not be read as text")]
    Decode { role: DocumentRole },
    #[error("grading service failed")]
    Service(#[source] EvaluatorError),
    #[error("grading service timed out")]
    Timeout,
}

impl From<EvaluatorError> for WorkflowError {
    fn from(err: EvaluatorError) -> Self {
        match err {
            EvaluatorError::Timeout => WorkflowError::Timeout,
            other => WorkflowError::Service(other),
        }
    }
}

/// Drives one session's grading runs: decode both slots, issue the single
/// evaluator call, interpret the reply into a `GradingResult`. Holds no
/// per-session state itself, so one orchestrator serves every session.
#[derive(Debug, Clone)]
pub(crate) struct GradingOrchestrator {
    evaluator: EvaluatorClient,
}

impl GradingOrchestrator {
    pub(crate) fn new(evaluator: EvaluatorClient) -> Self {
        Self { evaluator }
    }

    pub(crate) async fn analyze(
        &self,
        session: &SharedSession,
    ) -> Result<GradingResult, WorkflowError> {
        // Guard and precondition are decided under one lock so two callers
        // cannot both enter the reading phase.
        let (student_slot, key_slot) = {
            let mut guard = session.lock().await;
            if guard.phase().is_in_flight() {
                return Err(WorkflowError::InFlight);
            }
            let Some(slots) = guard.intake().both_slots() else {
                return Err(WorkflowError::Precondition);
            };
            guard.begin_reading();
            slots
        };

        let timer = Instant::now();
        let outcome = self.run(session, student_slot, key_slot).await;

        let mut guard = session.lock().await;
        match outcome {
            Ok(result) => {
                metrics::counter!("grading_runs_total", "outcome" => "succeeded").increment(1);
                metrics::histogram!("grading_run_duration_seconds")
                    .record(timer.elapsed().as_secs_f64());
                tracing::info!(
                    score = result.score,
                    total_questions = result.total_questions,
                    wrong_answers = result.wrong_answers.len(),
                    duration_seconds = timer.elapsed().as_secs_f64(),
                    "Grading run succeeded"
                );
                guard.complete(result.clone());
                Ok(result)
            }
            Err(err) => {
                metrics::counter!("grading_runs_total", "outcome" => outcome_label(&err))
                    .increment(1);
                guard.fail();
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        session: &SharedSession,
        student: UploadSlot,
        key: UploadSlot,
    ) -> Result<GradingResult, WorkflowError> {
        // Both decodes proceed independently; a failure on either side
        // aborts before any request is sent.
        let (student_answers, answer_key) = tokio::try_join!(
            decode_document(DocumentRole::Student, student),
            decode_document(DocumentRole::Key, key),
        )?;

        session.lock().await.begin_requesting();

        let request = EvaluationRequest { student_answers, answer_key };
        let payload = self.evaluator.evaluate(&request).await?;

        interpret_payload(payload)
    }
}

async fn decode_document(role: DocumentRole, slot: UploadSlot) -> Result<String, WorkflowError> {
    let UploadSlot { bytes, filename, .. } = slot;

    let decoded = tokio::task::spawn_blocking(move || String::from_utf8(bytes))
        .await
        .map_err(|err| {
            tracing::error!(%role, error = %err, "Decode task failed");
            WorkflowError::Decode { role }
        })?
        .map_err(|err| {
            tracing::warn!(%role, file = %filename, error = %err, "Document is not valid text");
            WorkflowError::Decode { role }
        })?;

    if decoded.trim().is_empty() {
        tracing::warn!(%role, file = %filename, "Document decoded to empty text");
        return Err(WorkflowError::Decode { role });
    }

    Ok(decoded)
}

/// Semantic checks on an already shape-checked payload. The score and the
/// wrong-answer list are passed through as reported; only their consistency
/// is verified here.
fn interpret_payload(payload: EvaluationPayload) -> Result<GradingResult, WorkflowError> {
    if !(0.0..=MAX_SCORE).contains(&payload.score) {
        return Err(shape_violation(format!(
            "score {} is outside the 0-{MAX_SCORE} scale",
            payload.score
        )));
    }

    if payload.wrong_answers.len() as u64 > u64::from(payload.total_questions) {
        return Err(shape_violation(format!(
            "{} wrong answers reported for {} questions",
            payload.wrong_answers.len(),
            payload.total_questions
        )));
    }

    Ok(GradingResult {
        score: payload.score,
        total_questions: payload.total_questions,
        wrong_answers: payload
            .wrong_answers
            .into_iter()
            .map(|item| WrongAnswer {
                question: item.question,
                student_answer: item.student_answer,
                correct_answer: item.correct_answer,
            })
            .collect(),
        feedback: payload.feedback,
    })
}

fn shape_violation(detail: String) -> WorkflowError {
    WorkflowError::Service(EvaluatorError::Malformed(detail))
}

fn outcome_label(err: &WorkflowError) -> &'static str {
    match err {
        WorkflowError::Decode { .. } => "decode_failed",
        WorkflowError::Timeout => "timeout",
        _ => "service_failed",
    }
}
