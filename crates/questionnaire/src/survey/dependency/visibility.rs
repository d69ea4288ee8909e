use std::collections::BTreeMap;

use serde::Serialize;

use super::{DependencyError, DependencyGraph};
use crate::survey::domain::{
    Answers, Combinator, Dependency, NavigationMode, Polarity, Question, QuestionId,
};

/// Display decision for every live question of a survey.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Visibility(BTreeMap<QuestionId, bool>);

impl Visibility {
    pub fn is_visible(&self, id: QuestionId) -> bool {
        self.0.get(&id).copied().unwrap_or(false)
    }

    pub fn get(&self, id: QuestionId) -> Option<bool> {
        self.0.get(&id).copied()
    }

    pub fn visible(&self) -> impl Iterator<Item = QuestionId> + '_ {
        self.0
            .iter()
            .filter(|(_, shown)| **shown)
            .map(|(id, _)| *id)
    }

    pub fn hidden(&self) -> impl Iterator<Item = QuestionId> + '_ {
        self.0
            .iter()
            .filter(|(_, shown)| !**shown)
            .map(|(id, _)| *id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Decides which questions are shown for the given answers.
///
/// Questions are evaluated in position order, so a condition only ever reads
/// the answer and visibility of an earlier question. A condition whose parent
/// is hidden never holds, whatever its polarity; this applies to single-parent
/// and multi-parent branching alike.
pub fn resolve_visibility(
    questions: &[Question],
    navigation: NavigationMode,
    answers: &Answers,
) -> Result<Visibility, DependencyError> {
    let graph = DependencyGraph::build(questions)?;
    graph.ensure_parents_precede()?;

    let mut ordered: Vec<&Question> = questions.iter().filter(|question| !question.deleted).collect();
    ordered.sort_by_key(|question| (question.position, question.id));

    let mut decided: BTreeMap<QuestionId, bool> = BTreeMap::new();
    for question in ordered {
        let shown = if !navigation.has_dependencies() || question.dependencies.is_empty() {
            true
        } else {
            if !navigation.is_advanced() && question.dependencies.len() > 1 {
                return Err(DependencyError::TooManyParents {
                    child: question.id,
                    count: question.dependencies.len(),
                });
            }
            evaluate(&question.dependencies, answers, &decided)
        };
        decided.insert(question.id, shown);
    }

    Ok(Visibility(decided))
}

fn evaluate(
    dependencies: &[Dependency],
    answers: &Answers,
    decided: &BTreeMap<QuestionId, bool>,
) -> bool {
    let mut records = dependencies.iter();
    let Some(first) = records.next() else {
        return true;
    };

    records.fold(condition_holds(first, answers, decided), |acc, record| {
        match record.combinator {
            Combinator::And => acc && condition_holds(record, answers, decided),
            Combinator::Or => acc || condition_holds(record, answers, decided),
        }
    })
}

fn condition_holds(
    dependency: &Dependency,
    answers: &Answers,
    decided: &BTreeMap<QuestionId, bool>,
) -> bool {
    if !decided.get(&dependency.parent).copied().unwrap_or(false) {
        return false;
    }

    let given = answers
        .get(&dependency.parent)
        .map(|answer| answer.matches(dependency.answer))
        .unwrap_or(false);

    match dependency.polarity {
        Polarity::Is => given,
        Polarity::IsNot => !given,
    }
}
