use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{
    ChoiceDraft, Confirmation, DeletionOutcome, DependencyDraft, EditingContext, EditingError,
    QuestionDraft,
};
use crate::survey::dependency::{
    plan_deletion, plan_page_break_repair, validate_page_breaks, DeletionPlan, DependencyError,
    DependencyGraph, PageBreakIssue, PageBreakRepair,
};
use crate::survey::domain::{
    Choice, ChoiceId, Dependency, DependencyAnswer, DependencyId, Question, QuestionId,
    QuestionKind, RateMode, Survey, SurveyId,
};
use crate::survey::feedback::{FeedbackConfig, SectionAssignment};
use crate::survey::repository::SurveyRepository;

/// Service applying author edits to a survey through the repository.
pub struct SurveyEditor<R> {
    repository: Arc<R>,
}

impl<R> SurveyEditor<R>
where
    R: SurveyRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    fn load(&self, survey: SurveyId) -> Result<(Survey, Vec<Question>), EditingError> {
        let survey = self
            .repository
            .survey(survey)?
            .ok_or(EditingError::SurveyNotFound(survey))?;
        let questions = self.repository.questions(survey.id)?;
        Ok((survey, questions))
    }

    /// Add a question, inheriting the required flag and type from the context.
    pub fn add_question(
        &self,
        context: &mut EditingContext,
        survey: SurveyId,
        draft: QuestionDraft,
    ) -> Result<Question, EditingError> {
        let kind = draft
            .kind
            .or(context.last_kind)
            .ok_or(EditingError::MissingKind)?;
        let required = !kind.is_structural() && draft.required.unwrap_or(context.required);

        let stored = self.insert(survey, kind, required, draft)?;
        context.remember(&stored);
        Ok(stored)
    }

    pub fn add_page_break(
        &self,
        survey: SurveyId,
        position: Option<u32>,
    ) -> Result<Question, EditingError> {
        let draft = QuestionDraft {
            position,
            ..QuestionDraft::default()
        };
        self.insert(survey, QuestionKind::PageBreak, false, draft)
    }

    fn insert(
        &self,
        survey: SurveyId,
        kind: QuestionKind,
        required: bool,
        draft: QuestionDraft,
    ) -> Result<Question, EditingError> {
        validate_choices(kind, &draft.choices)?;
        let (survey, questions) = self.load(survey)?;

        let max = live_count(&questions) + 1;
        let position = match draft.position {
            None => max,
            Some(position) if (1..=max).contains(&position) => position,
            Some(position) => return Err(EditingError::InvalidPosition { position, max }),
        };

        let shifted: Vec<Question> = questions
            .into_iter()
            .filter(|question| !question.deleted && question.position >= position)
            .map(|mut question| {
                question.position += 1;
                question
            })
            .collect();
        if !shifted.is_empty() {
            self.repository.update_questions(&shifted)?;
        }

        let question = Question {
            id: QuestionId::default(),
            survey_id: survey.id,
            kind,
            position,
            required,
            name: draft.name.filter(|name| !name.trim().is_empty()),
            content: draft.content,
            choices: draft
                .choices
                .into_iter()
                .map(|choice| Choice {
                    id: ChoiceId::default(),
                    question_id: QuestionId::default(),
                    content: choice.content,
                    value: choice.value,
                })
                .collect(),
            dependencies: Vec::new(),
            deleted: false,
        };
        let stored = self.repository.insert_question(question)?;
        info!(
            survey = %survey.id,
            question = %stored.id,
            kind = stored.kind.label(),
            position = stored.position,
            "question added"
        );
        Ok(stored)
    }

    /// Move a question to a new 1-based position, keeping every parent before its children.
    pub fn move_question(
        &self,
        survey: SurveyId,
        question: QuestionId,
        position: u32,
    ) -> Result<Vec<Question>, EditingError> {
        let (survey, questions) = self.load(survey)?;
        let mut live = live_sorted(&questions);
        let index = live
            .iter()
            .position(|candidate| candidate.id == question)
            .ok_or(EditingError::QuestionNotFound(question))?;
        let max = live.len() as u32;
        if position == 0 || position > max {
            return Err(EditingError::InvalidPosition { position, max });
        }

        let moved = live.remove(index);
        live.insert(position as usize - 1, moved);
        assign_positions(&mut live);

        if survey.navigation.has_dependencies() {
            DependencyGraph::build(&live)?.ensure_parents_precede()?;
        }
        self.repository.update_questions(&live)?;
        debug!(survey = %survey.id, question = %question, position, "question moved");
        Ok(live)
    }

    pub fn toggle_required(
        &self,
        context: &mut EditingContext,
        survey: SurveyId,
        question: QuestionId,
    ) -> Result<bool, EditingError> {
        let (_, questions) = self.load(survey)?;
        let mut target = find_live(&questions, question)?.clone();
        if target.kind.is_structural() {
            return Err(EditingError::NotAnswerable(question));
        }
        target.required = !target.required;
        self.repository
            .update_questions(std::slice::from_ref(&target))?;
        context.remember(&target);
        Ok(target.required)
    }

    /// Replace the dependency records of a question.
    ///
    /// The whole survey is re-checked, so cycles and forward references are
    /// rejected before anything is stored.
    pub fn set_dependencies(
        &self,
        survey: SurveyId,
        question: QuestionId,
        drafts: Vec<DependencyDraft>,
    ) -> Result<Question, EditingError> {
        let (survey, mut questions) = self.load(survey)?;
        if !survey.navigation.has_dependencies() && !drafts.is_empty() {
            return Err(EditingError::BranchingDisabled(survey.id));
        }
        if !survey.navigation.is_advanced() && drafts.len() > 1 {
            return Err(DependencyError::TooManyParents {
                child: question,
                count: drafts.len(),
            }
            .into());
        }
        find_live(&questions, question)?;

        for draft in &drafts {
            let Some(parent) = questions
                .iter()
                .find(|candidate| candidate.id == draft.parent && !candidate.deleted)
            else {
                return Err(DependencyError::UnknownParent {
                    child: question,
                    parent: draft.parent,
                }
                .into());
            };
            if !accepts_answer(parent, draft.answer) {
                return Err(EditingError::InvalidDependencyAnswer {
                    child: question,
                    parent: draft.parent,
                    answer: draft.answer,
                });
            }
        }

        let first = self.repository.next_dependency_id()?;
        let records: Vec<Dependency> = drafts
            .into_iter()
            .zip(first.0..)
            .map(|(draft, id)| Dependency {
                id: DependencyId(id),
                parent: draft.parent,
                answer: draft.answer,
                polarity: draft.polarity,
                combinator: draft.combinator,
            })
            .collect();

        let mut updated = None;
        for candidate in questions.iter_mut() {
            if candidate.id == question {
                candidate.dependencies = records.clone();
                updated = Some(candidate.clone());
            }
        }

        let graph = DependencyGraph::build(&questions)?;
        graph.ensure_parents_precede()?;

        let updated = updated.ok_or(EditingError::QuestionNotFound(question))?;
        self.repository
            .update_questions(std::slice::from_ref(&updated))?;
        info!(
            survey = %survey.id,
            question = %question,
            dependencies = updated.dependencies.len(),
            "dependencies updated"
        );
        Ok(updated)
    }

    pub fn plan_deletion(
        &self,
        survey: SurveyId,
        question: QuestionId,
    ) -> Result<DeletionPlan, EditingError> {
        let (survey, questions) = self.load(survey)?;
        let response_count = self.repository.response_count(question)?;
        Ok(plan_deletion(
            &questions,
            survey.navigation,
            question,
            response_count,
        )?)
    }

    /// Soft-delete a question and apply the cascade rules of the survey's branching mode.
    pub fn delete_question(
        &self,
        survey: SurveyId,
        question: QuestionId,
        confirmation: Confirmation,
    ) -> Result<DeletionOutcome, EditingError> {
        let (survey, mut questions) = self.load(survey)?;
        let response_count = self.repository.response_count(question)?;
        let plan = plan_deletion(&questions, survey.navigation, question, response_count)?;

        if plan.requires_confirmation() && confirmation != Confirmation::Confirmed {
            return Err(EditingError::ConfirmationRequired(Box::new(plan)));
        }

        let mut deleted = vec![question];
        deleted.extend(plan.cascaded_questions());
        let detached = plan.detached_dependencies();

        for candidate in questions.iter_mut() {
            if deleted.contains(&candidate.id) {
                candidate.deleted = true;
            } else {
                candidate
                    .dependencies
                    .retain(|dependency| !detached.contains(&(candidate.id, dependency.id)));
            }
        }
        renumber(&mut questions);
        self.repository.update_questions(&questions)?;

        let mut responses_removed = 0;
        for id in &deleted {
            responses_removed += self.repository.delete_responses(*id)?;
        }

        let mut feedback = self.repository.feedback(survey.id)?;
        if prune_feedback(&mut feedback, &deleted) {
            self.repository.save_feedback(survey.id, feedback)?;
        }

        let answerable_left = questions
            .iter()
            .any(|candidate| !candidate.deleted && !candidate.kind.is_structural());
        let attempts_removed = if answerable_left {
            0
        } else {
            self.repository.delete_attempts(survey.id)?
        };

        if deleted.len() > 1 {
            warn!(
                survey = %survey.id,
                question = %question,
                cascaded = deleted.len() - 1,
                "deleted dependent questions with their parent"
            );
        }
        info!(
            survey = %survey.id,
            question = %question,
            responses_removed,
            attempts_removed,
            "question deleted"
        );

        Ok(DeletionOutcome {
            deleted,
            detached,
            responses_removed,
            attempts_removed,
        })
    }

    pub fn validate_page_breaks(
        &self,
        survey: SurveyId,
    ) -> Result<Vec<PageBreakIssue>, EditingError> {
        let (_, questions) = self.load(survey)?;
        Ok(validate_page_breaks(&questions))
    }

    /// Drop useless page breaks and add one before every dependent question
    /// that shares a page with a parent.
    pub fn repair_page_breaks(&self, survey: SurveyId) -> Result<PageBreakRepair, EditingError> {
        let (survey, questions) = self.load(survey)?;
        let repair = plan_page_break_repair(&questions);
        if repair.is_empty() {
            return Ok(repair);
        }

        let mut changed: Vec<Question> = Vec::new();
        let mut breaks = Vec::new();
        let mut position = 0;
        for mut question in live_sorted(&questions) {
            if repair.remove.contains(&question.id) {
                question.deleted = true;
                changed.push(question);
                continue;
            }
            if repair.insert_before.contains(&question.id) {
                position += 1;
                breaks.push(position);
            }
            position += 1;
            question.position = position;
            changed.push(question);
        }
        self.repository.update_questions(&changed)?;

        for position in breaks {
            self.repository
                .insert_question(page_break(survey.id, position))?;
        }
        info!(
            survey = %survey.id,
            removed = repair.remove.len(),
            inserted = repair.insert_before.len(),
            "page breaks repaired"
        );
        Ok(repair)
    }

    /// Store the section assignments and the section count on the survey.
    pub fn save_feedback_sections(
        &self,
        survey: SurveyId,
        count: u32,
        assignments: &[SectionAssignment],
    ) -> Result<FeedbackConfig, EditingError> {
        let (mut survey, questions) = self.load(survey)?;
        let mut config = self.repository.feedback(survey.id)?;
        let removed = config.save_assignments(count, assignments, &questions)?;
        if !removed.is_empty() {
            debug!(survey = %survey.id, removed = ?removed, "surplus feedback sections removed");
        }
        self.repository.save_feedback(survey.id, config.clone())?;

        survey.feedback_sections = count;
        self.repository.save_survey(survey)?;
        Ok(config)
    }
}

fn validate_choices(kind: QuestionKind, choices: &[ChoiceDraft]) -> Result<(), EditingError> {
    if kind.uses_choices() && choices.is_empty() {
        return Err(EditingError::MissingChoices { kind: kind.label() });
    }
    if let QuestionKind::Rate(settings) = kind {
        if settings.length < 2 {
            return Err(EditingError::RateScaleTooShort(settings.length));
        }
        if settings.mode == RateMode::NoDuplicates {
            let found = choices.iter().filter(|choice| choice.value.is_none()).count();
            if found < 2 {
                return Err(EditingError::RateChoicesTooFew {
                    mode: settings.mode,
                    found,
                });
            }
        }
    }
    Ok(())
}

fn accepts_answer(parent: &Question, answer: DependencyAnswer) -> bool {
    match (parent.kind, answer) {
        (QuestionKind::YesNo, DependencyAnswer::Yes | DependencyAnswer::No) => true,
        (
            QuestionKind::Radio
            | QuestionKind::Dropdown
            | QuestionKind::Checkbox
            | QuestionKind::Rate(_),
            DependencyAnswer::Choice(choice),
        ) => parent.choice(choice).is_some(),
        _ => false,
    }
}

fn prune_feedback(config: &mut FeedbackConfig, deleted: &[QuestionId]) -> bool {
    let mut changed = false;
    for section in config.sections.iter_mut() {
        for id in deleted {
            changed |= section.calculation.remove(*id).is_some();
        }
    }
    changed
}

fn page_break(survey: SurveyId, position: u32) -> Question {
    Question {
        id: QuestionId::default(),
        survey_id: survey,
        kind: QuestionKind::PageBreak,
        position,
        required: false,
        name: None,
        content: String::new(),
        choices: Vec::new(),
        dependencies: Vec::new(),
        deleted: false,
    }
}

fn find_live(questions: &[Question], id: QuestionId) -> Result<&Question, EditingError> {
    questions
        .iter()
        .find(|question| question.id == id && !question.deleted)
        .ok_or(EditingError::QuestionNotFound(id))
}

fn live_count(questions: &[Question]) -> u32 {
    questions.iter().filter(|question| !question.deleted).count() as u32
}

fn live_sorted(questions: &[Question]) -> Vec<Question> {
    let mut live: Vec<Question> = questions
        .iter()
        .filter(|question| !question.deleted)
        .cloned()
        .collect();
    live.sort_by_key(|question| (question.position, question.id));
    live
}

fn assign_positions(ordered: &mut [Question]) {
    for (index, question) in ordered.iter_mut().enumerate() {
        question.position = index as u32 + 1;
    }
}

/// Dense 1-based positions for live questions, preserving their order.
fn renumber(questions: &mut [Question]) {
    let mut order: Vec<usize> = (0..questions.len())
        .filter(|index| !questions[*index].deleted)
        .collect();
    order.sort_by_key(|index| (questions[*index].position, questions[*index].id));
    for (rank, index) in order.into_iter().enumerate() {
        questions[index].position = rank as u32 + 1;
    }
}
