//! Question dependency graph: structure, visibility, deletion impact, and page layout checks.

mod deletion;
mod graph;
mod pages;
mod visibility;

pub use deletion::{plan_deletion, DeletionPlan, DependentQuestion};
pub use graph::DependencyGraph;
pub use pages::{plan_page_break_repair, validate_page_breaks, PageBreakIssue, PageBreakRepair};
pub use visibility::{resolve_visibility, Visibility};

use super::domain::QuestionId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DependencyError {
    #[error("cyclic dependency: {}", render_path(.path))]
    Cycle { path: Vec<QuestionId> },
    #[error("question {child} depends on unknown question {parent}")]
    UnknownParent { child: QuestionId, parent: QuestionId },
    #[error("question {child} depends on question {parent}, which is not positioned before it")]
    ParentNotEarlier { child: QuestionId, parent: QuestionId },
    #[error("question {child} has {count} dependencies but single-parent branching allows one")]
    TooManyParents { child: QuestionId, count: usize },
    #[error("question {0} is not part of the survey")]
    UnknownQuestion(QuestionId),
}

fn render_path(path: &[QuestionId]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}
