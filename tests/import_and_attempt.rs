use std::sync::Arc;

use adaptive_quiz::parse_questions_from_text;
use adaptive_quiz::quiz::config::EngineConfig;
use adaptive_quiz::quiz::error::GradeError;
use adaptive_quiz::quiz::grader::{EssayGrade, EssayGrader};
use adaptive_quiz::quiz::ladder::LadderOutcome;
use adaptive_quiz::quiz::session::AssessmentSession;
use adaptive_quiz::quiz::store::{
    InMemoryProfileStore, InMemoryQuestionStore, ProfileStore, QuestionStore,
};
use adaptive_quiz::quiz::{Answers, AssessmentState, QuestionId, QuestionSetId, Variant};
use async_trait::async_trait;

const LEVEL_TWO_A: &str = "\
[PG] Choose the past tense of \"go\".
A. goed
B. went *
C. gone

[ESSAY] Tell us about your last holiday.
KEY: past simple tense
";

const LEVEL_TWO_B: &str = "\
[PG] Choose the past tense of \"eat\".
A. ate *
B. eated
";

/// Grades by keyword, the way a rubric-following grader would.
struct KeywordGrader;

#[async_trait]
impl EssayGrader for KeywordGrader {
    async fn grade_essay(&self, _prompt: &str, answer: &str) -> Result<EssayGrade, GradeError> {
        let score = if answer.contains("went") { 90.0 } else { 20.0 };
        Ok(EssayGrade {
            score,
            feedback: format!("scored {}", score),
        })
    }
}

async fn store_with_level_two() -> Arc<InMemoryQuestionStore> {
    let store = InMemoryQuestionStore::new();
    store
        .save_questions(
            QuestionSetId::new(2, Variant::A),
            parse_questions_from_text(LEVEL_TWO_A),
        )
        .await
        .expect("save A");
    store
        .save_questions(
            QuestionSetId::new(2, Variant::B),
            parse_questions_from_text(LEVEL_TWO_B),
        )
        .await
        .expect("save B");
    Arc::new(store)
}

fn answers(pairs: &[(&str, &str)]) -> Answers {
    pairs
        .iter()
        .map(|(id, text)| (QuestionId::from(*id), text.to_string()))
        .collect()
}

#[tokio::test]
async fn imported_set_can_be_passed() {
    let mut session = AssessmentSession::new(
        store_with_level_two().await,
        Arc::new(KeywordGrader),
        EngineConfig::default(),
        AssessmentState::new(2, Variant::A),
    );

    let questions = session.begin().await.expect("level 2 A has content");
    assert_eq!(questions.len(), 2);

    let result = session
        .submit_answers(&answers(&[
            ("q1", "went"),
            ("q2", "We went to the sea and swam."),
        ]))
        .await
        .expect("submit");
    // 50 + 50 * 0.9
    assert_eq!(result.score, 95);
    assert_eq!(result.outcome, LadderOutcome::Mastered);

    let profiles = InMemoryProfileStore::new();
    if result.passed {
        profiles
            .record_skill_level("s1", "grammar", result.prior_state.level)
            .await
            .expect("record");
    }
    assert_eq!(profiles.skill_level("s1", "grammar").await, Some(2));
}

#[tokio::test]
async fn failing_moves_to_remedial_variant_then_runs_out_of_content() {
    let mut session = AssessmentSession::new(
        store_with_level_two().await,
        Arc::new(KeywordGrader),
        EngineConfig::default(),
        AssessmentState::new(2, Variant::A),
    );

    session.begin().await.expect("level 2 A has content");
    let result = session
        .submit_answers(&answers(&[("q1", "gone"), ("q2", "I stay home.")]))
        .await
        .expect("submit");
    // 0 + 50 * 0.2
    assert_eq!(result.score, 10);
    assert!(!result.passed);
    assert_eq!(session.advance().expect("advance"), AssessmentState::new(2, Variant::B));

    session.begin().await.expect("level 2 B has content");
    session
        .submit_answers(&answers(&[("q1", "eated")]))
        .await
        .expect("submit");
    assert_eq!(session.advance().expect("advance"), AssessmentState::new(2, Variant::C));

    // nobody authored 2-C
    let err = session.begin().await.expect_err("no content");
    assert_eq!(err.to_string(), "no content for level 2 variant C");
    assert!(!err.is_retryable());
}
