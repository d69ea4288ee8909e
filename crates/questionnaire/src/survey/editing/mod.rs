//! Authoring workflow: adding, ordering, branching and deleting questions.

mod context;
mod service;

pub use context::EditingContext;
pub use service::SurveyEditor;

use serde::{Deserialize, Serialize};

use super::dependency::{DeletionPlan, DependencyError};
use super::domain::{
    Combinator, DependencyAnswer, DependencyId, Polarity, QuestionId, QuestionKind, RateMode,
    SurveyId,
};
use super::feedback::FeedbackError;
use super::repository::RepositoryError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceDraft {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

/// Author input for a new question. Unset fields fall back to the [`EditingContext`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionDraft {
    #[serde(default)]
    pub kind: Option<QuestionKind>,
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub choices: Vec<ChoiceDraft>,
    /// 1-based insert position; appends when unset.
    #[serde(default)]
    pub position: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyDraft {
    pub parent: QuestionId,
    pub answer: DependencyAnswer,
    #[serde(default)]
    pub polarity: Polarity,
    #[serde(default)]
    pub combinator: Combinator,
}

/// Author acknowledgement required before destructive deletions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confirmation {
    #[default]
    Unconfirmed,
    Confirmed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletionOutcome {
    /// Target first, then cascaded descendants.
    pub deleted: Vec<QuestionId>,
    pub detached: Vec<(QuestionId, DependencyId)>,
    pub responses_removed: usize,
    pub attempts_removed: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum EditingError {
    #[error("survey {0} not found")]
    SurveyNotFound(SurveyId),
    #[error("question {0} not found")]
    QuestionNotFound(QuestionId),
    #[error("no question type selected")]
    MissingKind,
    #[error("{kind} questions need at least one choice")]
    MissingChoices { kind: &'static str },
    #[error("rate scale needs at least 2 slots, got {0}")]
    RateScaleTooShort(u32),
    #[error("rate mode {mode:?} needs at least 2 choices without a value, got {found}")]
    RateChoicesTooFew { mode: RateMode, found: usize },
    #[error("position {position} is outside 1..={max}")]
    InvalidPosition { position: u32, max: u32 },
    #[error("question {0} takes no answers")]
    NotAnswerable(QuestionId),
    #[error("survey {0} does not use branching")]
    BranchingDisabled(SurveyId),
    #[error("question {child} cannot depend on answer {answer:?} of question {parent}")]
    InvalidDependencyAnswer {
        child: QuestionId,
        parent: QuestionId,
        answer: DependencyAnswer,
    },
    #[error("deleting question {} needs confirmation", .0.target)]
    ConfirmationRequired(Box<DeletionPlan>),
    #[error(transparent)]
    Dependency(#[from] DependencyError),
    #[error(transparent)]
    Feedback(#[from] FeedbackError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
