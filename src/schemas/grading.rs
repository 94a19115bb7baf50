use serde::Serialize;

use crate::workflow::intake::{DocumentRole, UploadSlot};
use crate::workflow::session::{GradingSession, RunPhase};
use crate::workflow::{GradingResult, WrongAnswer};

#[derive(Debug, Serialize)]
pub(crate) struct UploadAck {
    pub(crate) message: String,
    pub(crate) role: DocumentRole,
    pub(crate) filename: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct DocumentInfo {
    pub(crate) filename: String,
    pub(crate) content_type: String,
    pub(crate) size_bytes: u64,
}

impl DocumentInfo {
    fn from_slot(slot: &UploadSlot) -> Self {
        Self {
            filename: slot.filename.clone(),
            content_type: slot.content_type.clone(),
            size_bytes: slot.bytes.len() as u64,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct WorkflowStatusResponse {
    pub(crate) phase: RunPhase,
    pub(crate) ready: bool,
    pub(crate) in_flight: bool,
    pub(crate) student_document: Option<DocumentInfo>,
    pub(crate) key_document: Option<DocumentInfo>,
    pub(crate) has_result: bool,
    pub(crate) accepted_extensions: Vec<String>,
}

impl WorkflowStatusResponse {
    pub(crate) fn from_session(
        session: &GradingSession,
        accepted_extensions: Vec<String>,
    ) -> Self {
        let intake = session.intake();
        Self {
            phase: session.phase(),
            ready: intake.is_ready(),
            in_flight: session.phase().is_in_flight(),
            student_document: intake.slot(DocumentRole::Student).map(DocumentInfo::from_slot),
            key_document: intake.slot(DocumentRole::Key).map(DocumentInfo::from_slot),
            has_result: session.last_result().is_some(),
            accepted_extensions,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct WrongAnswerResponse {
    pub(crate) question: String,
    pub(crate) student_answer: String,
    pub(crate) correct_answer: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct GradingResultResponse {
    pub(crate) score: f64,
    pub(crate) total_questions: u32,
    pub(crate) correct_count: u32,
    pub(crate) wrong_answers: Vec<WrongAnswerResponse>,
    pub(crate) feedback: String,
}

impl GradingResultResponse {
    pub(crate) fn from_result(result: &GradingResult) -> Self {
        Self {
            score: result.score,
            total_questions: result.total_questions,
            correct_count: result.correct_count(),
            wrong_answers: result.wrong_answers.iter().map(wrong_answer_to_response).collect(),
            feedback: result.feedback.clone(),
        }
    }
}

fn wrong_answer_to_response(item: &WrongAnswer) -> WrongAnswerResponse {
    WrongAnswerResponse {
        question: item.question.clone(),
        student_answer: item.student_answer.clone(),
        correct_answer: item.correct_answer.clone(),
    }
}
