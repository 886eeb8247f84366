use std::sync::Arc;

use log::{debug, warn};
use tokio::task::JoinSet;

use crate::quiz::config::{EngineConfig, ScoringPolicy};
use crate::quiz::error::GradeError;
use crate::quiz::grader::{EssayGrade, EssayGrader};
use crate::quiz::{Answers, Question, QuestionId, QuestionKind};

/// How a single question's score was obtained.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Grading {
    /// Multiple choice, compared against the marked option.
    Deterministic { correct: bool },
    /// Essay scored by the external grader.
    Graded { score: f64, feedback: String },
    /// Essay the grader couldn't score; `score` is the configured fallback.
    Fallback { score: u8, reason: String },
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QuestionScore {
    pub question_id: QuestionId,
    pub kind: QuestionKind,
    /// The part of the 100 points this question is worth.
    pub share: f64,
    pub earned: f64,
    pub grading: Grading,
}

impl QuestionScore {
    pub fn used_fallback(&self) -> bool {
        matches!(self.grading, Grading::Fallback { .. })
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScoreReport {
    /// 0..=100, rounded once from the unrounded sum of `items`.
    pub score: u8,
    pub items: Vec<QuestionScore>,
}

/// Scores one attempt.
///
/// Essay questions are graded concurrently, each call bounded by
/// `config.grading_timeout`. A failed, timed-out or panicked grading call
/// only affects its own question, which gets `config.essay_fallback_score`.
pub async fn score(
    questions: &[Question],
    answers: &Answers,
    grader: &Arc<dyn EssayGrader>,
    config: &EngineConfig,
) -> ScoreReport {
    if questions.is_empty() {
        return ScoreReport {
            score: 0,
            items: Vec::new(),
        };
    }

    let shares = shares(questions, config.scoring_policy);
    let mut essay_results = grade_essays(questions, answers, grader, config).await;

    let items: Vec<QuestionScore> = questions
        .iter()
        .zip(shares)
        .enumerate()
        .map(|(idx, (question, share))| match question.kind {
            QuestionKind::MultipleChoice => score_multiple_choice(question, answers, share),
            QuestionKind::Essay => {
                let result = essay_results[idx].take().unwrap_or_else(|| {
                    Err(GradeError::Aborted("grading task did not finish".into()))
                });
                score_essay(question, result, share, config.essay_fallback_score)
            }
        })
        .collect();

    // Sum in question order, round once
    let total: f64 = items.iter().map(|item| item.earned).sum();
    let score = total.round().clamp(0.0, 100.0) as u8;

    debug!(
        "Scored {} questions: {} ({} fallbacks)",
        items.len(),
        score,
        items.iter().filter(|i| i.used_fallback()).count()
    );

    ScoreReport { score, items }
}

fn shares(questions: &[Question], policy: ScoringPolicy) -> Vec<f64> {
    let equal = 100.0 / questions.len() as f64;
    match policy {
        ScoringPolicy::EqualShare => vec![equal; questions.len()],
        ScoringPolicy::Weighted => {
            let total: u64 = questions.iter().map(|q| u64::from(q.points)).sum();
            if total == 0 {
                return vec![equal; questions.len()];
            }
            questions
                .iter()
                .map(|q| 100.0 * f64::from(q.points) / total as f64)
                .collect()
        }
    }
}

fn score_multiple_choice(question: &Question, answers: &Answers, share: f64) -> QuestionScore {
    let correct_option = question.correct_option();
    if correct_option.is_none() {
        warn!(
            "Question {} has no valid correct option, counting it as wrong",
            question.id
        );
    }
    let correct = match (answers.get(&question.id), correct_option) {
        (Some(given), Some(expected)) => given == expected,
        _ => false,
    };

    QuestionScore {
        question_id: question.id.clone(),
        kind: question.kind,
        share,
        earned: if correct { share } else { 0.0 },
        grading: Grading::Deterministic { correct },
    }
}

fn score_essay(
    question: &Question,
    result: Result<EssayGrade, GradeError>,
    share: f64,
    fallback_score: u8,
) -> QuestionScore {
    // A NaN or infinite score would poison the whole sum
    let result = result.and_then(|grade| {
        if grade.score.is_finite() {
            Ok(grade)
        } else {
            Err(GradeError::MalformedResponse(format!(
                "score is not a number: {}",
                grade.score
            )))
        }
    });

    let (earned, grading) = match result {
        Ok(grade) => {
            let external = grade.score.clamp(0.0, 100.0);
            (
                share * external / 100.0,
                Grading::Graded {
                    score: external,
                    feedback: grade.feedback,
                },
            )
        }
        Err(e) => {
            warn!(
                "Essay grading failed for question {}, using fallback score {}: {}",
                question.id, fallback_score, e
            );
            (
                share * f64::from(fallback_score) / 100.0,
                Grading::Fallback {
                    score: fallback_score,
                    reason: e.to_string(),
                },
            )
        }
    };

    QuestionScore {
        question_id: question.id.clone(),
        kind: question.kind,
        share,
        earned,
        grading,
    }
}

/// Grades every essay concurrently. The result is indexed like `questions`;
/// non-essay slots and slots whose task panicked stay `None`.
async fn grade_essays(
    questions: &[Question],
    answers: &Answers,
    grader: &Arc<dyn EssayGrader>,
    config: &EngineConfig,
) -> Vec<Option<Result<EssayGrade, GradeError>>> {
    let mut results: Vec<Option<Result<EssayGrade, GradeError>>> =
        (0..questions.len()).map(|_| None).collect();
    let mut tasks = JoinSet::new();

    for (idx, question) in questions.iter().enumerate() {
        if question.kind != QuestionKind::Essay {
            continue;
        }
        let grader = Arc::clone(grader);
        let prompt = question.prompt.clone();
        let answer = answers.get(&question.id).cloned().unwrap_or_default();
        let reference = question.answer_key.clone();
        let timeout = config.grading_timeout;

        tasks.spawn(async move {
            let call = grader.grade_with_reference(&prompt, &answer, reference.as_deref());
            let result = match tokio::time::timeout(timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(GradeError::Timeout(timeout.as_millis())),
            };
            (idx, result)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((idx, result)) => results[idx] = Some(result),
            Err(e) => warn!("Essay grading task failed: {}", e),
        }
    }

    results
}
