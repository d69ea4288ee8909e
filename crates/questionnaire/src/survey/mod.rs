pub mod attempts;
pub mod dependency;
pub mod domain;
pub mod editing;
pub mod feedback;
pub mod import;
pub mod repository;
pub mod responses;

#[cfg(test)]
pub(crate) mod tests;

pub use attempts::{AttemptReceipt, AttemptService, Submission, SubmissionError};
pub use dependency::{resolve_visibility, DependencyError, DependencyGraph, Visibility};
pub use editing::{EditingContext, EditingError, SurveyEditor};
pub use feedback::{score_attempt, FeedbackConfig, FeedbackSection, ScoreCalculation, Weight};
pub use import::{ImportedResponses, ResponseImportError, ResponseImporter, SurveyDocument};
pub use repository::{RepositoryError, SurveyRepository};
pub use responses::{aggregate, analyze, QuestionReport, QuestionSummary};
