pub(crate) mod intake;
pub(crate) mod orchestrator;
pub(crate) mod session;

/// One graded item the student got wrong, in the order the evaluator
/// reported it.
#[derive(Debug, Clone)]
pub(crate) struct WrongAnswer {
    pub(crate) question: String,
    pub(crate) student_answer: String,
    pub(crate) correct_answer: String,
}

/// The validated outcome of one grading run, ready for display. Replaced
/// wholesale by the next successful run; failures never touch it.
#[derive(Debug, Clone)]
pub(crate) struct GradingResult {
    pub(crate) score: f64,
    pub(crate) total_questions: u32,
    pub(crate) wrong_answers: Vec<WrongAnswer>,
    pub(crate) feedback: String,
}

impl GradingResult {
    /// Derived locally, never reported by the evaluator. Construction
    /// guarantees `wrong_answers.len() <= total_questions`, so this cannot
    /// underflow.
    pub(crate) fn correct_count(&self) -> u32 {
        self.total_questions - self.wrong_answers.len() as u32
    }
}
