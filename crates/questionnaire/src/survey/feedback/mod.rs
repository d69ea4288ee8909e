//! Feedback sections: configuration, weights, and per-attempt scoring.

mod config;
mod scorer;
mod weights;

pub use config::{
    eligibility, Eligibility, FeedbackConfig, FeedbackMessage, FeedbackSection, IneligibleReason,
    SectionAssignment,
};
pub use scorer::{attempt_feedback, question_scores, score_attempt, SectionFeedback, SectionScore};
pub use weights::{ScoreCalculation, Weight, WeightError};

use super::domain::QuestionId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeedbackError {
    #[error("sections without questions: {0:?}")]
    SectionsNotSet(Vec<u32>),
    #[error("section {section} is outside 1..={count}")]
    SectionOutOfRange { section: u32, count: u32 },
    #[error("question {0} is not part of the survey")]
    UnknownQuestion(QuestionId),
    #[error("question {question} cannot be used for feedback: {reason:?}")]
    Ineligible {
        question: QuestionId,
        reason: IneligibleReason,
    },
    #[error("question {0} has plain membership and may belong to one section only")]
    MultipleMemberships(QuestionId),
    #[error(transparent)]
    Weight(#[from] WeightError),
}
