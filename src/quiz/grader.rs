use async_trait::async_trait;
use chatgpt::client::ChatGPT;
use chatgpt::types::CompletionResponse;
use log::debug;

use crate::quiz::error::GradeError;

/// Result of grading one essay answer.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EssayGrade {
    /// 0..=100
    pub score: f64,
    #[serde(default)]
    pub feedback: String,
}

/// External essay-grading collaborator.
///
/// Implementations may fail or hang; the aggregator wraps every call in a
/// timeout and substitutes the fallback score, so they don't need to.
#[async_trait]
pub trait EssayGrader: Send + Sync {
    async fn grade_essay(&self, prompt: &str, answer: &str) -> Result<EssayGrade, GradeError>;

    /// Same as [`grade_essay`](Self::grade_essay), with the author's reference
    /// answer when the question has one. Graders that can't use it ignore it.
    async fn grade_with_reference(
        &self,
        prompt: &str,
        answer: &str,
        _reference: Option<&str>,
    ) -> Result<EssayGrade, GradeError> {
        self.grade_essay(prompt, answer).await
    }
}

/// Grades essays by asking ChatGPT for a JSON verdict.
pub struct ChatGptEssayGrader {
    chat_gpt: ChatGPT,
}

impl ChatGptEssayGrader {
    pub fn new(chat_gpt: ChatGPT) -> Self {
        Self { chat_gpt }
    }

    fn build_prompt(question: &str, answer: &str, reference: Option<&str>) -> String {
        let reference = reference
            .map(|r| format!("The teacher's reference answer is: \"{}\".\n", r))
            .unwrap_or_default();
        format!(
            "You are an English tutor grading a student's written answer.
        The question was: \"{}\".
        {}The student answered: \"{}\".
        Grade the answer from 0 to 100 and give one or two sentences of feedback addressed to the student.
        Reply with a JSON object only, in the form {{\"score\": <number>, \"feedback\": \"<text>\"}}.",
            question, reference, answer
        )
    }
}

#[async_trait]
impl EssayGrader for ChatGptEssayGrader {
    async fn grade_essay(&self, prompt: &str, answer: &str) -> Result<EssayGrade, GradeError> {
        self.grade_with_reference(prompt, answer, None).await
    }

    async fn grade_with_reference(
        &self,
        prompt: &str,
        answer: &str,
        reference: Option<&str>,
    ) -> Result<EssayGrade, GradeError> {
        debug!("Grading essay answer for question: {:?}", prompt);
        let request = Self::build_prompt(prompt, answer, reference);

        let response: CompletionResponse = self.chat_gpt.send_message(&request).await?;
        let content = response.message().clone().content;

        debug!("Completion: {:?}", content);

        parse_grade_reply(&content)
    }
}

/// Pulls the `{"score": .., "feedback": ..}` object out of a model reply,
/// tolerating code fences or chatter around it.
pub fn parse_grade_reply(reply: &str) -> Result<EssayGrade, GradeError> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => return Err(GradeError::MalformedResponse(reply.to_string())),
    };

    let grade: EssayGrade = serde_json::from_str(json)
        .map_err(|e| GradeError::MalformedResponse(format!("{}: {}", e, json)))?;

    if !grade.score.is_finite() {
        return Err(GradeError::MalformedResponse(format!(
            "score is not a number: {}",
            json
        )));
    }
    Ok(grade)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json_reply() {
        let grade = parse_grade_reply(r#"{"score": 85, "feedback": "Good use of tenses."}"#)
            .expect("valid reply");
        assert_eq!(grade.score, 85.0);
        assert_eq!(grade.feedback, "Good use of tenses.");
    }

    #[test]
    fn test_parse_fenced_reply() {
        let reply = "Sure!\n```json\n{\"score\": 40.5, \"feedback\": \"Too short.\"}\n```";
        let grade = parse_grade_reply(reply).expect("valid reply");
        assert_eq!(grade.score, 40.5);
    }

    #[test]
    fn test_missing_feedback_defaults_to_empty() {
        let grade = parse_grade_reply(r#"{"score": 10}"#).expect("valid reply");
        assert_eq!(grade.feedback, "");
    }

    #[test]
    fn test_malformed_replies_are_errors() {
        for reply in [
            "I think this deserves a B.",
            "} backwards {",
            r#"{"feedback": "no score"}"#,
            r#"{"score": "ninety"}"#,
        ] {
            assert!(
                matches!(parse_grade_reply(reply), Err(GradeError::MalformedResponse(_))),
                "{}",
                reply
            );
        }
    }

    #[test]
    fn test_prompt_mentions_reference_only_when_present() {
        let with = ChatGptEssayGrader::build_prompt("Q", "A", Some("R"));
        assert!(with.contains("reference answer is: \"R\""));
        let without = ChatGptEssayGrader::build_prompt("Q", "A", None);
        assert!(!without.contains("reference answer"));
    }
}
