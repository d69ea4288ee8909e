use std::collections::BTreeSet;

use super::domain::{
    Attempt, DependencyId, Question, QuestionId, ResponseId, ResponseRow, Survey, SurveyId,
};
use super::feedback::FeedbackConfig;

/// Storage abstraction so the editing and attempt workflows can be exercised in isolation.
///
/// Questions are returned with their choices and dependency records embedded,
/// including soft-deleted ones.
pub trait SurveyRepository: Send + Sync {
    fn survey(&self, id: SurveyId) -> Result<Option<Survey>, RepositoryError>;
    fn save_survey(&self, survey: Survey) -> Result<(), RepositoryError>;

    fn questions(&self, survey: SurveyId) -> Result<Vec<Question>, RepositoryError>;
    /// Stores a new question, assigning question and choice ids.
    fn insert_question(&self, question: Question) -> Result<Question, RepositoryError>;
    /// Replaces the stored state of every given question.
    fn update_questions(&self, questions: &[Question]) -> Result<(), RepositoryError>;
    /// First unused dependency id, above every stored dependency record.
    fn next_dependency_id(&self) -> Result<DependencyId, RepositoryError>;

    fn responses(
        &self,
        survey: SurveyId,
        filter: Option<&BTreeSet<ResponseId>>,
    ) -> Result<Vec<ResponseRow>, RepositoryError>;
    /// Number of attempts holding at least one row for the question.
    fn response_count(&self, question: QuestionId) -> Result<usize, RepositoryError>;
    fn delete_responses(&self, question: QuestionId) -> Result<usize, RepositoryError>;

    fn attempts(&self, survey: SurveyId) -> Result<Vec<Attempt>, RepositoryError>;
    /// First unused attempt id across every survey in the store.
    fn next_response_id(&self) -> Result<ResponseId, RepositoryError>;
    fn record_attempt(&self, attempt: Attempt, rows: Vec<ResponseRow>)
        -> Result<(), RepositoryError>;
    /// Removes every attempt of the survey with its rows.
    fn delete_attempts(&self, survey: SurveyId) -> Result<usize, RepositoryError>;

    fn feedback(&self, survey: SurveyId) -> Result<FeedbackConfig, RepositoryError>;
    fn save_feedback(&self, survey: SurveyId, config: FeedbackConfig)
        -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
