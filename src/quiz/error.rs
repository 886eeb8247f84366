use thiserror::Error;

use super::{QuestionSetId, Variant};

/// Reasons an essay couldn't be graded by the external grader.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GradeError {
    #[error("grader backend error: {0}")]
    Backend(String),

    #[error("grader returned an unreadable reply: {0}")]
    MalformedResponse(String),

    #[error("grader did not answer within {0} ms")]
    Timeout(u128),

    #[error("grading task aborted: {0}")]
    Aborted(String),
}

impl From<chatgpt::err::Error> for GradeError {
    fn from(err: chatgpt::err::Error) -> Self {
        GradeError::Backend(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("question set {0} could not be loaded: {1}")]
    Load(QuestionSetId, String),

    #[error("question set {0} could not be saved: {1}")]
    Save(QuestionSetId, String),
}

#[derive(Error, Debug)]
pub enum SessionError {
    /// Content-authoring gap; retrying won't help.
    #[error("no content for level {level} variant {variant}")]
    NoContent { level: u32, variant: Variant },

    #[error("no attempt in progress; call begin() first")]
    NotStarted,

    #[error("answers for this attempt were already submitted")]
    AlreadySubmitted,

    /// A submitted result must be applied before the next attempt starts.
    #[error("attempt at {0} was submitted but not advanced")]
    PendingAdvance(QuestionSetId),

    #[error("there is no submitted attempt to advance from")]
    NothingToAdvance,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    /// Whether the caller may sensibly retry the same call later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SessionError::Store(_))
    }
}
