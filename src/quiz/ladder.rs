//! The remediation ladder: A → B → C, then drop a level and start over at A.

use crate::quiz::{AssessmentState, Variant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LadderOutcome {
    /// Passed; the curriculum decides what comes next.
    Mastered,
    /// Failed the first attempt, retake as variant B.
    Remediate,
    /// Failed the first remediation, one more try as variant C.
    LastChance,
    /// Failed C, moved one level down.
    Demoted,
    /// Failed C at level 1. Route to a teacher instead of looping.
    FloorReached,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: AssessmentState,
    pub outcome: LadderOutcome,
    pub message: String,
}

pub fn transition(state: AssessmentState, passed: bool) -> Transition {
    let level = state.level.max(1);

    let (next, outcome) = if passed {
        (state, LadderOutcome::Mastered)
    } else {
        match state.variant {
            Variant::A => (
                AssessmentState::new(level, Variant::B),
                LadderOutcome::Remediate,
            ),
            Variant::B => (
                AssessmentState::new(level, Variant::C),
                LadderOutcome::LastChance,
            ),
            Variant::C if level > 1 => (
                AssessmentState::new(level - 1, Variant::A),
                LadderOutcome::Demoted,
            ),
            Variant::C => (AssessmentState::new(1, Variant::A), LadderOutcome::FloorReached),
        }
    };

    Transition {
        next,
        outcome,
        message: describe(state, next, outcome),
    }
}

fn describe(prior: AssessmentState, next: AssessmentState, outcome: LadderOutcome) -> String {
    match outcome {
        LadderOutcome::Mastered => format!("Well done! You have mastered level {}.", prior.level),
        LadderOutcome::Remediate => format!(
            "Not quite there yet. Let's review and retake level {} with variant {}.",
            next.level, next.variant
        ),
        LadderOutcome::LastChance => format!(
            "Still some gaps. Last chance at level {}: variant {}.",
            next.level, next.variant
        ),
        LadderOutcome::Demoted => format!(
            "Level {} looks too hard for now. Moving back to level {}, variant {}.",
            prior.level, next.level, next.variant
        ),
        LadderOutcome::FloorReached => format!(
            "Level {} is the lowest level and all variants were attempted. Please contact your teacher.",
            next.level
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(level: u32, variant: Variant) -> AssessmentState {
        AssessmentState::new(level, variant)
    }

    #[test]
    fn test_transition_table() {
        let cases = [
            (state(2, Variant::A), true, state(2, Variant::A), LadderOutcome::Mastered),
            (state(2, Variant::A), false, state(2, Variant::B), LadderOutcome::Remediate),
            (state(2, Variant::B), true, state(2, Variant::B), LadderOutcome::Mastered),
            (state(2, Variant::B), false, state(2, Variant::C), LadderOutcome::LastChance),
            (state(2, Variant::C), true, state(2, Variant::C), LadderOutcome::Mastered),
            (state(2, Variant::C), false, state(1, Variant::A), LadderOutcome::Demoted),
        ];
        for (prior, passed, expected, outcome) in cases {
            let t = transition(prior, passed);
            assert_eq!(t.next, expected, "{} passed={}", prior, passed);
            assert_eq!(t.outcome, outcome, "{} passed={}", prior, passed);
        }
    }

    #[test]
    fn test_drop_from_level_three() {
        let t = transition(state(3, Variant::C), false);
        assert_eq!(t.next, state(2, Variant::A));
        assert!(t.message.contains("level 2"));
    }

    #[test]
    fn test_floor_clamp() {
        let t = transition(state(1, Variant::C), false);
        assert_eq!(t.next, state(1, Variant::A));
        assert_eq!(t.outcome, LadderOutcome::FloorReached);
        assert!(t.message.contains("contact your teacher"));
    }

    #[test]
    fn test_passing_never_changes_level() {
        for level in [1, 2, 7, 40] {
            let t = transition(state(level, Variant::A), true);
            assert_eq!(t.next.level, level);
            assert_eq!(t.outcome, LadderOutcome::Mastered);
        }
    }

    #[test]
    fn test_messages_are_deterministic() {
        let a = transition(state(4, Variant::B), false);
        let b = transition(state(4, Variant::B), false);
        assert_eq!(a, b);
    }
}
