pub mod config;
pub mod error;
pub mod grader;
pub mod ladder;
pub mod parser;
pub mod scoring;
pub mod session;
pub mod store;

use std::collections::HashMap;
use std::fmt;

/// Minimal score (inclusive) that counts as a pass.
pub const PASSING_THRESHOLD: u8 = 70;

/// Submitted answers, keyed by the id of the question they answer.
pub type Answers = HashMap<QuestionId, String>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct QuestionId(String);

impl QuestionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QuestionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for QuestionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum QuestionKind {
    MultipleChoice,
    Essay,
}

impl QuestionKind {
    /// Points a question is worth when the source text doesn't say.
    pub fn default_points(&self) -> u32 {
        match self {
            QuestionKind::MultipleChoice => 1,
            QuestionKind::Essay => 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub kind: QuestionKind,
    pub prompt: String,
    /// Empty for essays.
    pub options: Vec<String>,
    pub correct_option_index: Option<usize>,
    pub answer_key: Option<String>,
    pub points: u32,
    /// 1-based position within the containing set.
    pub order: usize,
}

impl Question {
    pub fn multiple_choice(
        id: impl Into<QuestionId>,
        prompt: impl Into<String>,
        options: Vec<String>,
        correct_option_index: Option<usize>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: QuestionKind::MultipleChoice,
            prompt: prompt.into(),
            options,
            correct_option_index,
            answer_key: None,
            points: QuestionKind::MultipleChoice.default_points(),
            order: 0,
        }
    }

    pub fn essay(
        id: impl Into<QuestionId>,
        prompt: impl Into<String>,
        answer_key: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: QuestionKind::Essay,
            prompt: prompt.into(),
            options: Vec::new(),
            correct_option_index: None,
            answer_key,
            points: QuestionKind::Essay.default_points(),
            order: 0,
        }
    }

    pub fn with_order(mut self, order: usize) -> Self {
        self.order = order;
        self
    }

    pub fn with_points(mut self, points: u32) -> Self {
        self.points = points;
        self
    }

    /// The text of the option marked correct, if the marking is valid.
    pub fn correct_option(&self) -> Option<&str> {
        self.correct_option_index
            .and_then(|idx| self.options.get(idx))
            .map(String::as_str)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum Variant {
    /// First attempt.
    A,
    /// First remediation.
    B,
    /// Last-chance remediation.
    C,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Variant::A => "A",
            Variant::B => "B",
            Variant::C => "C",
        };
        f.write_str(letter)
    }
}

impl std::str::FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Variant::A),
            "B" => Ok(Variant::B),
            "C" => Ok(Variant::C),
            other => Err(format!("unknown variant '{}'", other)),
        }
    }
}

/// Where a student currently sits on the remediation ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct AssessmentState {
    pub level: u32,
    pub variant: Variant,
}

impl AssessmentState {
    /// Levels below 1 are clamped to the floor.
    pub fn new(level: u32, variant: Variant) -> Self {
        Self {
            level: level.max(1),
            variant,
        }
    }

    pub fn set_id(&self) -> QuestionSetId {
        QuestionSetId::new(self.level, self.variant)
    }
}

impl Default for AssessmentState {
    fn default() -> Self {
        Self::new(1, Variant::A)
    }
}

impl fmt::Display for AssessmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "level {} variant {}", self.level, self.variant)
    }
}

/// Identity of the question set for one (level, variant) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct QuestionSetId {
    pub level: u32,
    pub variant: Variant,
}

impl QuestionSetId {
    pub fn new(level: u32, variant: Variant) -> Self {
        Self { level, variant }
    }
}

impl fmt::Display for QuestionSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}-{}", self.level, self.variant)
    }
}

impl std::str::FromStr for QuestionSetId {
    type Err = String;

    // Accepts the `L{level}-{variant}` form produced by `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .trim()
            .strip_prefix(['L', 'l'])
            .ok_or_else(|| format!("question set id '{}' must start with 'L'", s))?;
        let (level, variant) = rest
            .split_once('-')
            .ok_or_else(|| format!("question set id '{}' is missing a variant", s))?;
        let level: u32 = level
            .parse()
            .map_err(|_| format!("invalid level in question set id '{}'", s))?;
        if level == 0 {
            return Err(format!("level in question set id '{}' must be at least 1", s));
        }
        Ok(Self::new(level, variant.parse()?))
    }
}

/// Outcome of one completed assessment attempt.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AttemptResult {
    pub set_id: QuestionSetId,
    pub score: u8,
    pub passed: bool,
    pub prior_state: AssessmentState,
    pub next_state: AssessmentState,
    pub outcome: ladder::LadderOutcome,
    pub message: String,
    pub breakdown: Vec<scoring::QuestionScore>,
}

impl AttemptResult {
    /// Failing C at level 1: the ladder can't go lower, a teacher has to step in.
    pub fn needs_teacher(&self) -> bool {
        self.outcome == ladder::LadderOutcome::FloorReached
    }

    /// Number of essay items whose score came from the fallback.
    pub fn fallback_count(&self) -> usize {
        self.breakdown.iter().filter(|s| s.used_fallback()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_level_is_clamped_to_floor() {
        assert_eq!(AssessmentState::new(0, Variant::B).level, 1);
        assert_eq!(AssessmentState::new(4, Variant::B).level, 4);
    }

    #[test]
    fn test_variants_are_ordered() {
        assert!(Variant::A < Variant::B);
        assert!(Variant::B < Variant::C);
    }

    #[test]
    fn test_set_id_display_and_parse() {
        let id = QuestionSetId::new(3, Variant::B);
        assert_eq!(id.to_string(), "L3-B");
        assert_eq!("l3-b".parse::<QuestionSetId>(), Ok(id));
        assert!("L0-A".parse::<QuestionSetId>().is_err());
        assert!("3-A".parse::<QuestionSetId>().is_err());
        assert!("L3-D".parse::<QuestionSetId>().is_err());
    }

    #[test]
    fn test_correct_option_requires_valid_index() {
        let q = Question::multiple_choice("q1", "2+2?", vec!["3".into(), "4".into()], Some(1));
        assert_eq!(q.correct_option(), Some("4"));

        let q = Question::multiple_choice("q1", "2+2?", vec!["3".into()], Some(5));
        assert_eq!(q.correct_option(), None);
    }
}
