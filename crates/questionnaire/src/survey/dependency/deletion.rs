use serde::Serialize;

use super::{DependencyError, DependencyGraph};
use crate::survey::domain::{
    Dependency, DependencyId, NavigationMode, Question, QuestionId, QuestionKind,
};

/// A question reached from the deletion target through dependency edges.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependentQuestion {
    pub question: QuestionId,
    pub position: u32,
    pub reference: String,
    /// True when the question has a dependency record pointing at the target itself.
    pub direct: bool,
    pub dependencies: Vec<Dependency>,
}

/// What deleting a question would touch, presented to the author before anything changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeletionPlan {
    pub target: QuestionId,
    pub target_reference: String,
    pub navigation: NavigationMode,
    pub page_break: bool,
    pub response_count: usize,
    pub descendants: Vec<DependentQuestion>,
}

impl DeletionPlan {
    pub fn requires_confirmation(&self) -> bool {
        !self.page_break && (self.response_count > 0 || !self.descendants.is_empty())
    }

    /// Questions soft-deleted together with the target.
    ///
    /// Single-parent branching removes the whole subtree; multi-parent branching keeps
    /// every descendant and only detaches the records naming the target.
    pub fn cascaded_questions(&self) -> Vec<QuestionId> {
        if self.navigation.is_advanced() {
            Vec::new()
        } else {
            self.descendants.iter().map(|child| child.question).collect()
        }
    }

    /// Dependency records removed from surviving questions.
    pub fn detached_dependencies(&self) -> Vec<(QuestionId, DependencyId)> {
        if !self.navigation.is_advanced() {
            return Vec::new();
        }

        self.descendants
            .iter()
            .filter(|child| child.direct)
            .flat_map(|child| {
                child
                    .dependencies
                    .iter()
                    .filter(|dependency| dependency.parent == self.target)
                    .map(move |dependency| (child.question, dependency.id))
            })
            .collect()
    }

    pub fn direct(&self) -> impl Iterator<Item = &DependentQuestion> {
        self.descendants.iter().filter(|child| child.direct)
    }

    pub fn indirect(&self) -> impl Iterator<Item = &DependentQuestion> {
        self.descendants.iter().filter(|child| !child.direct)
    }
}

pub fn plan_deletion(
    questions: &[Question],
    navigation: NavigationMode,
    target: QuestionId,
    response_count: usize,
) -> Result<DeletionPlan, DependencyError> {
    let question = questions
        .iter()
        .find(|question| question.id == target && !question.deleted)
        .ok_or(DependencyError::UnknownQuestion(target))?;

    let descendants = if navigation.has_dependencies() {
        let graph = DependencyGraph::build(questions)?;
        graph
            .descendants(target)?
            .into_iter()
            .filter_map(|id| questions.iter().find(|question| question.id == id))
            .map(|child| DependentQuestion {
                question: child.id,
                position: child.position,
                reference: child.reference(),
                direct: child
                    .dependencies
                    .iter()
                    .any(|dependency| dependency.parent == target),
                dependencies: child.dependencies.clone(),
            })
            .collect()
    } else {
        Vec::new()
    };

    Ok(DeletionPlan {
        target,
        target_reference: question.reference(),
        navigation,
        page_break: question.kind == QuestionKind::PageBreak,
        response_count,
        descendants,
    })
}
