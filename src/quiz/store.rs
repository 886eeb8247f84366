use std::collections::HashMap;

use async_trait::async_trait;
use log::debug;
use tokio::sync::RwLock;

use crate::quiz::error::StoreError;
use crate::quiz::{Question, QuestionSetId, Variant};

/// Where question sets live. Persistence is someone else's problem.
#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// An unknown (level, variant) pair yields an empty set, not an error.
    async fn load_question_set(
        &self,
        level: u32,
        variant: Variant,
    ) -> Result<Vec<Question>, StoreError>;

    /// Replaces the whole set.
    async fn save_questions(
        &self,
        set_id: QuestionSetId,
        questions: Vec<Question>,
    ) -> Result<(), StoreError>;
}

/// Receives skill-level updates. The engine never calls it itself; callers
/// send the command when an attempt reports a pass.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn record_skill_level(
        &self,
        student_id: &str,
        skill: &str,
        level: u32,
    ) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct InMemoryQuestionStore {
    sets: RwLock<HashMap<QuestionSetId, Vec<Question>>>,
}

impl InMemoryQuestionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_ids(&self) -> Vec<QuestionSetId> {
        let mut ids: Vec<QuestionSetId> = self.sets.read().await.keys().copied().collect();
        ids.sort_by_key(|id| (id.level, id.variant));
        ids
    }
}

#[async_trait]
impl QuestionStore for InMemoryQuestionStore {
    async fn load_question_set(
        &self,
        level: u32,
        variant: Variant,
    ) -> Result<Vec<Question>, StoreError> {
        let id = QuestionSetId::new(level, variant);
        let mut questions = self.sets.read().await.get(&id).cloned().unwrap_or_default();
        questions.sort_by_key(|q| q.order);
        Ok(questions)
    }

    async fn save_questions(
        &self,
        set_id: QuestionSetId,
        questions: Vec<Question>,
    ) -> Result<(), StoreError> {
        debug!("Saving {} questions to set {}", questions.len(), set_id);
        self.sets.write().await.insert(set_id, questions);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SkillLevelRecord {
    pub student_id: String,
    pub skill: String,
    pub level: u32,
}

/// Keeps every command it receives, in order.
#[derive(Default)]
pub struct InMemoryProfileStore {
    records: RwLock<Vec<SkillLevelRecord>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<SkillLevelRecord> {
        self.records.read().await.clone()
    }

    /// Latest level recorded for a student's skill.
    pub async fn skill_level(&self, student_id: &str, skill: &str) -> Option<u32> {
        self.records
            .read()
            .await
            .iter()
            .rev()
            .find(|r| r.student_id == student_id && r.skill == skill)
            .map(|r| r.level)
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn record_skill_level(
        &self,
        student_id: &str,
        skill: &str,
        level: u32,
    ) -> Result<(), StoreError> {
        self.records.write().await.push(SkillLevelRecord {
            student_id: student_id.to_string(),
            skill: skill.to_string(),
            level,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stores_are_object_safe() {
        fn _question_store(_: Box<dyn QuestionStore>) {}
        fn _profile_store(_: Box<dyn ProfileStore>) {}
    }

    #[tokio::test]
    async fn test_unknown_set_is_empty() {
        let store = InMemoryQuestionStore::new();
        let questions = store
            .load_question_set(9, Variant::C)
            .await
            .expect("in-memory load");
        assert!(questions.is_empty());
    }

    #[tokio::test]
    async fn test_save_replaces_and_load_orders() {
        let store = InMemoryQuestionStore::new();
        let id = QuestionSetId::new(2, Variant::B);
        store
            .save_questions(id, vec![Question::essay("old", "old", None).with_order(1)])
            .await
            .expect("save");
        store
            .save_questions(
                id,
                vec![
                    Question::essay("q2", "second", None).with_order(2),
                    Question::essay("q1", "first", None).with_order(1),
                ],
            )
            .await
            .expect("save");

        let loaded = store.load_question_set(2, Variant::B).await.expect("load");
        let prompts: Vec<&str> = loaded.iter().map(|q| q.prompt.as_str()).collect();
        assert_eq!(prompts, vec!["first", "second"]);
        assert_eq!(store.set_ids().await, vec![id]);
    }

    #[tokio::test]
    async fn test_profile_store_keeps_latest_level() {
        let profiles = InMemoryProfileStore::new();
        profiles.record_skill_level("s1", "reading", 1).await.expect("record");
        profiles.record_skill_level("s1", "reading", 2).await.expect("record");
        profiles.record_skill_level("s2", "reading", 5).await.expect("record");

        assert_eq!(profiles.skill_level("s1", "reading").await, Some(2));
        assert_eq!(profiles.skill_level("s1", "writing").await, None);
        assert_eq!(profiles.records().await.len(), 3);
    }
}
