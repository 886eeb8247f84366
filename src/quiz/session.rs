use std::sync::Arc;

use log::{info, warn};

use crate::quiz::config::EngineConfig;
use crate::quiz::error::SessionError;
use crate::quiz::grader::EssayGrader;
use crate::quiz::ladder;
use crate::quiz::scoring;
use crate::quiz::store::QuestionStore;
use crate::quiz::{Answers, AssessmentState, AttemptResult, Question, PASSING_THRESHOLD};

#[derive(Debug, Clone, Default)]
enum Attempt {
    #[default]
    Idle,
    InProgress {
        questions: Vec<Question>,
    },
    Submitted {
        result: AttemptResult,
    },
}

/// Runs assessment attempts for one student.
///
/// The caller owns the [`AssessmentState`]: it is handed in at construction,
/// only changes through [`advance`](Self::advance), and can be read back with
/// [`state`](Self::state) to persist it. Methods take `&mut self`, so
/// attempts for one session never interleave.
pub struct AssessmentSession {
    store: Arc<dyn QuestionStore>,
    grader: Arc<dyn EssayGrader>,
    config: EngineConfig,
    state: AssessmentState,
    attempt: Attempt,
}

impl AssessmentSession {
    pub fn new(
        store: Arc<dyn QuestionStore>,
        grader: Arc<dyn EssayGrader>,
        config: EngineConfig,
        state: AssessmentState,
    ) -> Self {
        Self {
            store,
            grader,
            config,
            state,
            attempt: Attempt::Idle,
        }
    }

    pub fn state(&self) -> AssessmentState {
        self.state
    }

    /// Questions of the attempt in progress, if any.
    pub fn questions(&self) -> Option<&[Question]> {
        match &self.attempt {
            Attempt::InProgress { questions } => Some(questions),
            _ => None,
        }
    }

    /// The submitted result still waiting for [`advance`](Self::advance).
    pub fn pending_result(&self) -> Option<&AttemptResult> {
        match &self.attempt {
            Attempt::Submitted { result } => Some(result),
            _ => None,
        }
    }

    /// Loads the question set for the current state and starts an attempt.
    ///
    /// An empty set is [`SessionError::NoContent`], which won't go away by
    /// retrying. Calling this again before submitting restarts the attempt.
    /// Once answers are submitted the result has to be applied with
    /// [`advance`](Self::advance) first, otherwise a failed attempt could be
    /// retaken at the same variant forever.
    pub async fn begin(&mut self) -> Result<&[Question], SessionError> {
        if let Attempt::Submitted { result } = &self.attempt {
            return Err(SessionError::PendingAdvance(result.set_id));
        }
        self.attempt = Attempt::Idle;

        let AssessmentState { level, variant } = self.state;
        let questions = self.store.load_question_set(level, variant).await?;
        if questions.is_empty() {
            warn!("No questions for level {} variant {}", level, variant);
            return Err(SessionError::NoContent { level, variant });
        }

        info!(
            "Starting attempt at {} with {} questions",
            self.state,
            questions.len()
        );
        self.attempt = Attempt::InProgress { questions };
        Ok(self.questions().unwrap_or_default())
    }

    /// Grades the attempt and works out the next ladder state without
    /// applying it.
    ///
    /// Unanswered multiple-choice questions count as wrong; unanswered essays
    /// are graded as empty text.
    pub async fn submit_answers(
        &mut self,
        answers: &Answers,
    ) -> Result<AttemptResult, SessionError> {
        let questions = match &self.attempt {
            Attempt::Idle => return Err(SessionError::NotStarted),
            Attempt::Submitted { .. } => return Err(SessionError::AlreadySubmitted),
            Attempt::InProgress { questions } => questions,
        };

        let unanswered = questions
            .iter()
            .filter(|q| !answers.contains_key(&q.id))
            .count();
        if unanswered > 0 {
            info!("{} of {} questions left unanswered", unanswered, questions.len());
        }

        let report = scoring::score(questions, answers, &self.grader, &self.config).await;
        let passed = report.score >= PASSING_THRESHOLD;
        let transition = ladder::transition(self.state, passed);

        let result = AttemptResult {
            set_id: self.state.set_id(),
            score: report.score,
            passed,
            prior_state: self.state,
            next_state: transition.next,
            outcome: transition.outcome,
            message: transition.message,
            breakdown: report.items,
        };

        info!(
            "Attempt at {} scored {} ({:?})",
            result.set_id, result.score, result.outcome
        );
        if result.fallback_count() > 0 {
            warn!(
                "{} essay answers in {} were scored with the fallback",
                result.fallback_count(),
                result.set_id
            );
        }

        self.attempt = Attempt::Submitted {
            result: result.clone(),
        };
        Ok(result)
    }

    /// Applies the submitted result's next state. A second call without a new
    /// submission is rejected, so a transition is never applied twice.
    pub fn advance(&mut self) -> Result<AssessmentState, SessionError> {
        match std::mem::take(&mut self.attempt) {
            Attempt::Submitted { result } => {
                info!("Advancing from {} to {}", self.state, result.next_state);
                self.state = result.next_state;
                Ok(self.state)
            }
            other => {
                self.attempt = other;
                Err(SessionError::NothingToAdvance)
            }
        }
    }
}
