use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use chrono::{TimeZone, Utc};

use crate::survey::domain::{
    Attempt, Choice, ChoiceId, Combinator, Dependency, DependencyAnswer, DependencyId,
    NavigationMode, Polarity, Question, QuestionId, QuestionKind, QuestionnaireId, RateMode,
    RateSettings, ResponseId, ResponseRow, ResponseValue, Survey, SurveyId, UserId,
};
use crate::survey::feedback::FeedbackConfig;
use crate::survey::repository::{RepositoryError, SurveyRepository};

pub(crate) const SURVEY: SurveyId = SurveyId(1);

pub(crate) fn survey(navigation: NavigationMode) -> Survey {
    Survey {
        id: SURVEY,
        name: "Course evaluation".to_string(),
        navigation,
        feedback_sections: 0,
    }
}

pub(crate) fn question(id: u64, position: u32, kind: QuestionKind) -> Question {
    Question {
        id: QuestionId(id),
        survey_id: SURVEY,
        kind,
        position,
        required: false,
        name: None,
        content: format!("Question {id}"),
        choices: Vec::new(),
        dependencies: Vec::new(),
        deleted: false,
    }
}

pub(crate) fn rate(length: u32, mode: RateMode) -> QuestionKind {
    QuestionKind::Rate(RateSettings { length, mode })
}

pub(crate) fn with_choices(mut question: Question, choices: &[(u64, Option<f64>)]) -> Question {
    question.choices = choices
        .iter()
        .map(|(id, value)| Choice {
            id: ChoiceId(*id),
            question_id: question.id,
            content: format!("Choice {id}"),
            value: *value,
        })
        .collect();
    question
}

pub(crate) fn named(mut question: Question, name: &str) -> Question {
    question.name = Some(name.to_string());
    question.required = true;
    question
}

pub(crate) fn dependency(id: u64, parent: u64, answer: DependencyAnswer) -> Dependency {
    Dependency {
        id: DependencyId(id),
        parent: QuestionId(parent),
        answer,
        polarity: Polarity::Is,
        combinator: Combinator::And,
    }
}

pub(crate) fn depends_on(mut question: Question, dependencies: Vec<Dependency>) -> Question {
    question.dependencies = dependencies;
    question
}

pub(crate) fn rank_row(response: u64, question: u64, choice: u64, rank: i32) -> ResponseRow {
    ResponseRow {
        response: ResponseId(response),
        question: QuestionId(question),
        value: ResponseValue::Rank {
            choice: ChoiceId(choice),
            rank,
        },
    }
}

pub(crate) fn value_row(response: u64, question: u64, value: ResponseValue) -> ResponseRow {
    ResponseRow {
        response: ResponseId(response),
        question: QuestionId(question),
        value,
    }
}

pub(crate) fn attempt(id: u64, user: u64, group: Option<u64>) -> Attempt {
    Attempt {
        id: ResponseId(id),
        questionnaire: QuestionnaireId(1),
        survey: SURVEY,
        user: UserId(user),
        group: group.map(crate::survey::domain::GroupId),
        submitted_at: Utc
            .with_ymd_and_hms(2024, 3, 1, 9, 0, 0)
            .single()
            .expect("valid timestamp"),
    }
}

pub(crate) fn ids(values: &[u64]) -> BTreeSet<ResponseId> {
    values.iter().copied().map(ResponseId).collect()
}

#[derive(Debug, Default)]
struct State {
    surveys: BTreeMap<SurveyId, Survey>,
    questions: BTreeMap<QuestionId, Question>,
    rows: Vec<ResponseRow>,
    attempts: Vec<Attempt>,
    feedback: BTreeMap<SurveyId, FeedbackConfig>,
}

#[derive(Debug, Default)]
pub(crate) struct MemoryRepository {
    state: Mutex<State>,
}

impl MemoryRepository {
    pub(crate) fn seeded(survey: Survey, questions: Vec<Question>) -> Self {
        let repository = Self::default();
        {
            let mut state = repository.state.lock().expect("lock");
            for question in questions {
                state.questions.insert(question.id, question);
            }
            state.surveys.insert(survey.id, survey);
        }
        repository
    }

    pub(crate) fn with_attempt(self, attempt: Attempt, rows: Vec<ResponseRow>) -> Self {
        self.record_attempt(attempt, rows).expect("seed attempt");
        self
    }

    pub(crate) fn question(&self, id: u64) -> Question {
        self.state
            .lock()
            .expect("lock")
            .questions
            .get(&QuestionId(id))
            .cloned()
            .expect("question present")
    }

    pub(crate) fn live_positions(&self) -> Vec<(QuestionId, u32)> {
        let state = self.state.lock().expect("lock");
        let mut live: Vec<(QuestionId, u32)> = state
            .questions
            .values()
            .filter(|question| !question.deleted)
            .map(|question| (question.id, question.position))
            .collect();
        live.sort_by_key(|(_, position)| *position);
        live
    }

    pub(crate) fn row_count(&self) -> usize {
        self.state.lock().expect("lock").rows.len()
    }
}

impl SurveyRepository for MemoryRepository {
    fn survey(&self, id: SurveyId) -> Result<Option<Survey>, RepositoryError> {
        Ok(self.state.lock().expect("lock").surveys.get(&id).cloned())
    }

    fn save_survey(&self, survey: Survey) -> Result<(), RepositoryError> {
        self.state
            .lock()
            .expect("lock")
            .surveys
            .insert(survey.id, survey);
        Ok(())
    }

    fn questions(&self, survey: SurveyId) -> Result<Vec<Question>, RepositoryError> {
        Ok(self
            .state
            .lock()
            .expect("lock")
            .questions
            .values()
            .filter(|question| question.survey_id == survey)
            .cloned()
            .collect())
    }

    fn insert_question(&self, mut question: Question) -> Result<Question, RepositoryError> {
        let mut state = self.state.lock().expect("lock");
        let next_question = state.questions.keys().map(|id| id.0).max().unwrap_or(0) + 1;
        let mut next_choice = state
            .questions
            .values()
            .flat_map(|question| question.choices.iter().map(|choice| choice.id.0))
            .max()
            .unwrap_or(0)
            + 1;
        question.id = QuestionId(next_question);
        for choice in question.choices.iter_mut() {
            choice.id = ChoiceId(next_choice);
            choice.question_id = question.id;
            next_choice += 1;
        }
        state.questions.insert(question.id, question.clone());
        Ok(question)
    }

    fn update_questions(&self, questions: &[Question]) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("lock");
        for question in questions {
            if !state.questions.contains_key(&question.id) {
                return Err(RepositoryError::NotFound);
            }
            state.questions.insert(question.id, question.clone());
        }
        Ok(())
    }

    fn next_dependency_id(&self) -> Result<DependencyId, RepositoryError> {
        let state = self.state.lock().expect("lock");
        let highest = state
            .questions
            .values()
            .flat_map(|question| question.dependencies.iter().map(|dependency| dependency.id.0))
            .max()
            .unwrap_or(0);
        Ok(DependencyId(highest + 1))
    }

    fn responses(
        &self,
        survey: SurveyId,
        filter: Option<&BTreeSet<ResponseId>>,
    ) -> Result<Vec<ResponseRow>, RepositoryError> {
        let state = self.state.lock().expect("lock");
        let attempts: BTreeSet<ResponseId> = state
            .attempts
            .iter()
            .filter(|attempt| attempt.survey == survey)
            .map(|attempt| attempt.id)
            .collect();
        Ok(state
            .rows
            .iter()
            .filter(|row| attempts.contains(&row.response))
            .filter(|row| filter.map_or(true, |ids| ids.contains(&row.response)))
            .cloned()
            .collect())
    }

    fn response_count(&self, question: QuestionId) -> Result<usize, RepositoryError> {
        let state = self.state.lock().expect("lock");
        Ok(state
            .rows
            .iter()
            .filter(|row| row.question == question)
            .map(|row| row.response)
            .collect::<BTreeSet<_>>()
            .len())
    }

    fn delete_responses(&self, question: QuestionId) -> Result<usize, RepositoryError> {
        let mut state = self.state.lock().expect("lock");
        let before = state.rows.len();
        state.rows.retain(|row| row.question != question);
        Ok(before - state.rows.len())
    }

    fn attempts(&self, survey: SurveyId) -> Result<Vec<Attempt>, RepositoryError> {
        Ok(self
            .state
            .lock()
            .expect("lock")
            .attempts
            .iter()
            .filter(|attempt| attempt.survey == survey)
            .cloned()
            .collect())
    }

    fn next_response_id(&self) -> Result<ResponseId, RepositoryError> {
        let state = self.state.lock().expect("lock");
        let highest = state.attempts.iter().map(|attempt| attempt.id.0).max().unwrap_or(0);
        Ok(ResponseId(highest + 1))
    }

    fn record_attempt(
        &self,
        attempt: Attempt,
        rows: Vec<ResponseRow>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("lock");
        if state.attempts.iter().any(|stored| stored.id == attempt.id) {
            return Err(RepositoryError::Conflict);
        }
        state.attempts.push(attempt);
        state.rows.extend(rows);
        Ok(())
    }

    fn delete_attempts(&self, survey: SurveyId) -> Result<usize, RepositoryError> {
        let mut state = self.state.lock().expect("lock");
        let removed: BTreeSet<ResponseId> = state
            .attempts
            .iter()
            .filter(|attempt| attempt.survey == survey)
            .map(|attempt| attempt.id)
            .collect();
        state.attempts.retain(|attempt| attempt.survey != survey);
        state.rows.retain(|row| !removed.contains(&row.response));
        Ok(removed.len())
    }

    fn feedback(&self, survey: SurveyId) -> Result<FeedbackConfig, RepositoryError> {
        Ok(self
            .state
            .lock()
            .expect("lock")
            .feedback
            .get(&survey)
            .cloned()
            .unwrap_or_default())
    }

    fn save_feedback(
        &self,
        survey: SurveyId,
        config: FeedbackConfig,
    ) -> Result<(), RepositoryError> {
        self.state
            .lock()
            .expect("lock")
            .feedback
            .insert(survey, config);
        Ok(())
    }
}

/// Repository whose every call fails, for error propagation tests.
pub(crate) struct UnavailableRepository;

impl UnavailableRepository {
    fn down<T>() -> Result<T, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

impl SurveyRepository for UnavailableRepository {
    fn survey(&self, _: SurveyId) -> Result<Option<Survey>, RepositoryError> {
        Self::down()
    }
    fn save_survey(&self, _: Survey) -> Result<(), RepositoryError> {
        Self::down()
    }
    fn questions(&self, _: SurveyId) -> Result<Vec<Question>, RepositoryError> {
        Self::down()
    }
    fn insert_question(&self, _: Question) -> Result<Question, RepositoryError> {
        Self::down()
    }
    fn update_questions(&self, _: &[Question]) -> Result<(), RepositoryError> {
        Self::down()
    }
    fn next_dependency_id(&self) -> Result<DependencyId, RepositoryError> {
        Self::down()
    }
    fn responses(
        &self,
        _: SurveyId,
        _: Option<&BTreeSet<ResponseId>>,
    ) -> Result<Vec<ResponseRow>, RepositoryError> {
        Self::down()
    }
    fn response_count(&self, _: QuestionId) -> Result<usize, RepositoryError> {
        Self::down()
    }
    fn delete_responses(&self, _: QuestionId) -> Result<usize, RepositoryError> {
        Self::down()
    }
    fn attempts(&self, _: SurveyId) -> Result<Vec<Attempt>, RepositoryError> {
        Self::down()
    }
    fn next_response_id(&self) -> Result<ResponseId, RepositoryError> {
        Self::down()
    }
    fn record_attempt(&self, _: Attempt, _: Vec<ResponseRow>) -> Result<(), RepositoryError> {
        Self::down()
    }
    fn delete_attempts(&self, _: SurveyId) -> Result<usize, RepositoryError> {
        Self::down()
    }
    fn feedback(&self, _: SurveyId) -> Result<FeedbackConfig, RepositoryError> {
        Self::down()
    }
    fn save_feedback(&self, _: SurveyId, _: FeedbackConfig) -> Result<(), RepositoryError> {
        Self::down()
    }
}
