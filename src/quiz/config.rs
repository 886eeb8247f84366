use std::time::Duration;

use log::warn;

/// Essay score (0..=100) substituted when the grader fails or times out.
pub const ESSAY_FALLBACK_SCORE: u8 = 60;

pub const DEFAULT_GRADING_TIMEOUT: Duration = Duration::from_secs(15);

/// How the 100 points of an attempt are split across its questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ScoringPolicy {
    /// Every question is worth `100 / n`, whatever its `points`.
    #[default]
    EqualShare,
    /// Each question is worth `100 * points / total_points`.
    Weighted,
}

impl std::str::FromStr for ScoringPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "equal" | "equal_share" | "equalshare" => Ok(ScoringPolicy::EqualShare),
            "weighted" | "points" => Ok(ScoringPolicy::Weighted),
            other => Err(format!("unknown scoring policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub essay_fallback_score: u8,
    pub grading_timeout: Duration,
    pub scoring_policy: ScoringPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            essay_fallback_score: ESSAY_FALLBACK_SCORE,
            grading_timeout: DEFAULT_GRADING_TIMEOUT,
            scoring_policy: ScoringPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Reads overrides from the environment (and `.env`, if present).
    ///
    /// Recognised variables: `QUIZ_FALLBACK_SCORE`, `QUIZ_GRADING_TIMEOUT_SECS`
    /// and `QUIZ_SCORING_POLICY`. Invalid values are logged and ignored.
    pub fn from_env() -> Self {
        // A missing .env file is fine, the variables may come from the shell
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup("QUIZ_FALLBACK_SCORE") {
            match raw.trim().parse::<u8>() {
                Ok(score) if score <= 100 => config.essay_fallback_score = score,
                _ => warn!("Ignoring QUIZ_FALLBACK_SCORE={:?}, expected 0..=100", raw),
            }
        }

        if let Some(raw) = lookup("QUIZ_GRADING_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.grading_timeout = Duration::from_secs(secs),
                _ => warn!("Ignoring QUIZ_GRADING_TIMEOUT_SECS={:?}", raw),
            }
        }

        if let Some(raw) = lookup("QUIZ_SCORING_POLICY") {
            match raw.parse() {
                Ok(policy) => config.scoring_policy = policy,
                Err(e) => warn!("Ignoring QUIZ_SCORING_POLICY: {}", e),
            }
        }

        config
    }

    pub fn with_grading_timeout(mut self, timeout: Duration) -> Self {
        self.grading_timeout = timeout;
        self
    }

    pub fn with_fallback_score(mut self, score: u8) -> Self {
        self.essay_fallback_score = score.min(100);
        self
    }

    pub fn with_scoring_policy(mut self, policy: ScoringPolicy) -> Self {
        self.scoring_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_overrides() {
        let config = EngineConfig::from_lookup(|_| None);
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.essay_fallback_score, 60);
        assert_eq!(config.scoring_policy, ScoringPolicy::EqualShare);
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            ("QUIZ_FALLBACK_SCORE", "0"),
            ("QUIZ_GRADING_TIMEOUT_SECS", "3"),
            ("QUIZ_SCORING_POLICY", "weighted"),
        ]));
        assert_eq!(config.essay_fallback_score, 0);
        assert_eq!(config.grading_timeout, Duration::from_secs(3));
        assert_eq!(config.scoring_policy, ScoringPolicy::Weighted);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            ("QUIZ_FALLBACK_SCORE", "250"),
            ("QUIZ_GRADING_TIMEOUT_SECS", "0"),
            ("QUIZ_SCORING_POLICY", "random"),
        ]));
        assert_eq!(config, EngineConfig::default());
    }
}
