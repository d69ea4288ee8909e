use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use questionnaire::mobile::domain::{Capability, QuestionnaireRecord};
use questionnaire::mobile::{DirectoryError, QuestionnaireDirectory};
use questionnaire::survey::domain::{
    Attempt, ChoiceId, CourseId, DependencyId, Question, QuestionId, QuestionnaireId, ResponseId,
    ResponseRow, Survey, SurveyId, UserId,
};
use questionnaire::survey::{
    FeedbackConfig, ImportedResponses, RepositoryError, SurveyDocument, SurveyRepository,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Debug, Default)]
struct SurveyStore {
    surveys: HashMap<SurveyId, Survey>,
    questions: BTreeMap<QuestionId, Question>,
    attempts: Vec<Attempt>,
    rows: Vec<ResponseRow>,
    feedback: HashMap<SurveyId, FeedbackConfig>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemorySurveyRepository {
    store: Arc<Mutex<SurveyStore>>,
}

impl InMemorySurveyRepository {
    pub(crate) fn from_document(document: SurveyDocument) -> Self {
        let repository = Self::default();
        if let Ok(mut store) = repository.store.lock() {
            let survey_id = document.survey.id;
            store.surveys.insert(survey_id, document.survey);
            store.feedback.insert(survey_id, document.feedback);
            for question in document.questions {
                store.questions.insert(question.id, question);
            }
        }
        repository
    }

    /// Loads previously exported attempts; every imported response becomes one attempt.
    pub(crate) fn with_responses(
        self,
        questionnaire: QuestionnaireId,
        survey: SurveyId,
        imported: ImportedResponses,
    ) -> Self {
        if let Ok(mut store) = self.store.lock() {
            let submitted_at = Utc::now();
            for response in imported.response_ids() {
                let group = imported
                    .groups
                    .iter()
                    .find(|(_, members)| members.contains(&response))
                    .map(|(group, _)| *group);
                store.attempts.push(Attempt {
                    id: response,
                    questionnaire,
                    survey,
                    user: UserId(response.0),
                    group,
                    submitted_at,
                });
            }
            store.rows.extend(imported.rows);
        }
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, SurveyStore>, RepositoryError> {
        self.store
            .lock()
            .map_err(|_| RepositoryError::Unavailable("survey store mutex poisoned".to_string()))
    }
}

impl SurveyRepository for InMemorySurveyRepository {
    fn survey(&self, id: SurveyId) -> Result<Option<Survey>, RepositoryError> {
        Ok(self.lock()?.surveys.get(&id).cloned())
    }

    fn save_survey(&self, survey: Survey) -> Result<(), RepositoryError> {
        self.lock()?.surveys.insert(survey.id, survey);
        Ok(())
    }

    fn questions(&self, survey: SurveyId) -> Result<Vec<Question>, RepositoryError> {
        Ok(self
            .lock()?
            .questions
            .values()
            .filter(|question| question.survey_id == survey)
            .cloned()
            .collect())
    }

    fn insert_question(&self, mut question: Question) -> Result<Question, RepositoryError> {
        let mut store = self.lock()?;
        let next_question = store.questions.keys().map(|id| id.0).max().unwrap_or(0) + 1;
        let mut next_choice = store
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
        store.questions.insert(question.id, question.clone());
        Ok(question)
    }

    fn update_questions(&self, questions: &[Question]) -> Result<(), RepositoryError> {
        let mut store = self.lock()?;
        if questions
            .iter()
            .any(|question| !store.questions.contains_key(&question.id))
        {
            return Err(RepositoryError::NotFound);
        }
        for question in questions {
            store.questions.insert(question.id, question.clone());
        }
        Ok(())
    }

    fn next_dependency_id(&self) -> Result<DependencyId, RepositoryError> {
        let store = self.lock()?;
        let highest = store
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
        let store = self.lock()?;
        let attempts: BTreeSet<ResponseId> = store
            .attempts
            .iter()
            .filter(|attempt| attempt.survey == survey)
            .map(|attempt| attempt.id)
            .collect();
        Ok(store
            .rows
            .iter()
            .filter(|row| attempts.contains(&row.response))
            .filter(|row| filter.map_or(true, |ids| ids.contains(&row.response)))
            .cloned()
            .collect())
    }

    fn response_count(&self, question: QuestionId) -> Result<usize, RepositoryError> {
        Ok(self
            .lock()?
            .rows
            .iter()
            .filter(|row| row.question == question)
            .map(|row| row.response)
            .collect::<BTreeSet<_>>()
            .len())
    }

    fn delete_responses(&self, question: QuestionId) -> Result<usize, RepositoryError> {
        let mut store = self.lock()?;
        let before = store.rows.len();
        store.rows.retain(|row| row.question != question);
        Ok(before - store.rows.len())
    }

    fn attempts(&self, survey: SurveyId) -> Result<Vec<Attempt>, RepositoryError> {
        Ok(self
            .lock()?
            .attempts
            .iter()
            .filter(|attempt| attempt.survey == survey)
            .cloned()
            .collect())
    }

    fn next_response_id(&self) -> Result<ResponseId, RepositoryError> {
        let store = self.lock()?;
        let highest = store.attempts.iter().map(|attempt| attempt.id.0).max().unwrap_or(0);
        Ok(ResponseId(highest + 1))
    }

    fn record_attempt(
        &self,
        attempt: Attempt,
        rows: Vec<ResponseRow>,
    ) -> Result<(), RepositoryError> {
        let mut store = self.lock()?;
        if store.attempts.iter().any(|stored| stored.id == attempt.id) {
            return Err(RepositoryError::Conflict);
        }
        debug!(attempt = %attempt.id, rows = rows.len(), "attempt stored");
        store.attempts.push(attempt);
        store.rows.extend(rows);
        Ok(())
    }

    fn delete_attempts(&self, survey: SurveyId) -> Result<usize, RepositoryError> {
        let mut store = self.lock()?;
        let removed: BTreeSet<ResponseId> = store
            .attempts
            .iter()
            .filter(|attempt| attempt.survey == survey)
            .map(|attempt| attempt.id)
            .collect();
        store.attempts.retain(|attempt| attempt.survey != survey);
        store.rows.retain(|row| !removed.contains(&row.response));
        Ok(removed.len())
    }

    fn feedback(&self, survey: SurveyId) -> Result<FeedbackConfig, RepositoryError> {
        Ok(self
            .lock()?
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
        self.lock()?.feedback.insert(survey, config);
        Ok(())
    }
}

/// Stand-in for the course platform: activity records, enrolments and
/// per-user capabilities.
#[derive(Default, Clone)]
pub(crate) struct InMemoryDirectory {
    records: Arc<Mutex<Vec<QuestionnaireRecord>>>,
    enrolments: Arc<Mutex<BTreeSet<(CourseId, UserId)>>>,
    managers: Arc<Mutex<BTreeSet<UserId>>>,
    views: Arc<Mutex<Vec<(QuestionnaireId, UserId)>>>,
}

fn poisoned<T>(_: T) -> DirectoryError {
    DirectoryError::Unavailable("directory mutex poisoned".to_string())
}

impl InMemoryDirectory {
    pub(crate) fn with_record(self, record: QuestionnaireRecord) -> Self {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
        self
    }

    pub(crate) fn enrol(self, course: CourseId, user: UserId, manager: bool) -> Self {
        if let Ok(mut enrolments) = self.enrolments.lock() {
            enrolments.insert((course, user));
        }
        if manager {
            if let Ok(mut managers) = self.managers.lock() {
                managers.insert(user);
            }
        }
        self
    }
}

impl QuestionnaireDirectory for InMemoryDirectory {
    fn questionnaires_in_course(
        &self,
        course: CourseId,
        user: UserId,
    ) -> Result<Option<Vec<QuestionnaireRecord>>, DirectoryError> {
        if !self.enrolments.lock().map_err(poisoned)?.contains(&(course, user)) {
            return Ok(None);
        }
        Ok(Some(
            self.records
                .lock()
                .map_err(poisoned)?
                .iter()
                .filter(|record| record.course == course)
                .cloned()
                .collect(),
        ))
    }

    fn questionnaire(
        &self,
        id: QuestionnaireId,
    ) -> Result<Option<QuestionnaireRecord>, DirectoryError> {
        Ok(self
            .records
            .lock()
            .map_err(poisoned)?
            .iter()
            .find(|record| record.id == id)
            .cloned())
    }

    fn capabilities(
        &self,
        _id: QuestionnaireId,
        user: UserId,
    ) -> Result<Vec<Capability>, DirectoryError> {
        let manager = self.managers.lock().map_err(poisoned)?.contains(&user);
        Ok([
            (Capability::VIEW, true),
            (Capability::SUBMIT, !manager),
            (Capability::READ_OWN_RESPONSES, true),
            (Capability::READ_ALL_RESPONSES, manager),
        ]
        .into_iter()
        .map(|(name, enabled)| Capability {
            name: name.to_string(),
            enabled,
        })
        .collect())
    }

    fn record_view(&self, id: QuestionnaireId, user: UserId) -> Result<(), DirectoryError> {
        self.views.lock().map_err(poisoned)?.push((id, user));
        Ok(())
    }
}

pub(crate) const DEMO_SURVEY_JSON: &str =
    include_str!("../../../crates/questionnaire/fixtures/course_evaluation.json");
pub(crate) const DEMO_RESPONSES_CSV: &str =
    include_str!("../../../crates/questionnaire/fixtures/course_evaluation_responses.csv");

pub(crate) const DEMO_COURSE: CourseId = CourseId(10);
pub(crate) const DEMO_QUESTIONNAIRE: QuestionnaireId = QuestionnaireId(1);
pub(crate) const DEMO_MANAGER: UserId = UserId(2);
pub(crate) const DEMO_STUDENT: UserId = UserId(7);

pub(crate) fn demo_record(survey: SurveyId) -> QuestionnaireRecord {
    QuestionnaireRecord {
        id: DEMO_QUESTIONNAIRE,
        coursemodule: 31,
        course: DEMO_COURSE,
        survey,
        name: "End of term course evaluation".to_string(),
        intro: Some("Tell us how the term went.".to_string()),
        introformat: Some(1),
    }
}

pub(crate) fn demo_directory(survey: SurveyId) -> InMemoryDirectory {
    InMemoryDirectory::default()
        .with_record(demo_record(survey))
        .enrol(DEMO_COURSE, DEMO_MANAGER, true)
        .enrol(DEMO_COURSE, DEMO_STUDENT, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use questionnaire::survey::domain::{GroupId, NavigationMode};
    use questionnaire::survey::{AttemptService, ResponseImporter, Submission};
    use std::thread;

    fn attempt(id: u64, survey: SurveyId) -> Attempt {
        Attempt {
            id: ResponseId(id),
            questionnaire: DEMO_QUESTIONNAIRE,
            survey,
            user: DEMO_STUDENT,
            group: Some(GroupId(1)),
            submitted_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn demo_fixtures_load_into_the_store() {
        let document = SurveyDocument::from_reader(DEMO_SURVEY_JSON.as_bytes())
            .expect("fixture parses");
        let survey = document.survey.id;
        let repository = InMemorySurveyRepository::from_document(document);

        let stored = repository.survey(survey).expect("survey").expect("present");
        assert_eq!(stored.navigation, NavigationMode::Branching);
        assert_eq!(repository.questions(survey).expect("questions").len(), 7);
        assert_eq!(repository.feedback(survey).expect("feedback").sections.len(), 2);
    }

    #[test]
    fn imported_responses_become_attempts() {
        let document = SurveyDocument::from_reader(DEMO_SURVEY_JSON.as_bytes())
            .expect("fixture parses");
        let survey = document.survey.id;
        let imported = ResponseImporter::from_reader(DEMO_RESPONSES_CSV.as_bytes(), &document.questions)
            .expect("responses import");
        let repository = InMemorySurveyRepository::from_document(document).with_responses(
            DEMO_QUESTIONNAIRE,
            survey,
            imported,
        );

        let attempts = repository.attempts(survey).expect("attempts");
        assert_eq!(attempts.len(), 3);
        assert_eq!(attempts[2].group, Some(GroupId(2)));
        assert_eq!(repository.response_count(QuestionId(5)), Ok(1));
    }

    #[test]
    fn submissions_after_imported_responses_take_fresh_ids() {
        let document = SurveyDocument::from_reader(DEMO_SURVEY_JSON.as_bytes())
            .expect("fixture parses");
        let survey = document.survey.id;
        let imported = ResponseImporter::from_reader(DEMO_RESPONSES_CSV.as_bytes(), &document.questions)
            .expect("responses import");
        let repository = Arc::new(
            InMemorySurveyRepository::from_document(document).with_responses(
                DEMO_QUESTIONNAIRE,
                survey,
                imported,
            ),
        );
        let service = AttemptService::new(repository.clone());

        let submission: Submission = serde_json::from_value(serde_json::json!({
            "questionnaire": DEMO_QUESTIONNAIRE,
            "survey": survey,
            "user": DEMO_STUDENT,
            "answers": {
                "1": { "yes_no": true },
                "2": { "choices": [21] },
                "4": { "ranks": { "40": 2, "41": 2, "42": 2 } },
            },
        }))
        .expect("submission payload");

        let first = service.submit(submission.clone()).expect("first submission");
        assert_eq!(first.attempt.id, ResponseId(104));
        let second = service.submit(submission).expect("second submission");
        assert_eq!(second.attempt.id, ResponseId(105));
        assert_eq!(repository.attempts(survey).expect("attempts").len(), 5);
    }

    #[test]
    fn duplicate_attempts_conflict() {
        let repository = InMemorySurveyRepository::default();
        repository
            .record_attempt(attempt(1, SurveyId(1)), Vec::new())
            .expect("first insert");
        assert_eq!(
            repository.record_attempt(attempt(1, SurveyId(1)), Vec::new()),
            Err(RepositoryError::Conflict)
        );
        assert_eq!(repository.delete_attempts(SurveyId(1)), Ok(1));
    }

    #[test]
    fn poisoned_store_reports_unavailable() {
        let repository = InMemorySurveyRepository::default();
        let shared = repository.clone();
        let _ = thread::spawn(move || {
            let _guard = shared.store.lock().expect("lock");
            panic!("poison the store");
        })
        .join();

        assert!(matches!(
            repository.survey(SurveyId(1)),
            Err(RepositoryError::Unavailable(_))
        ));
    }

    #[test]
    fn directory_grants_read_all_to_managers_only() {
        let directory = demo_directory(SurveyId(1));
        let manager = directory
            .capabilities(DEMO_QUESTIONNAIRE, DEMO_MANAGER)
            .expect("capabilities");
        assert!(manager
            .iter()
            .any(|capability| capability.name == Capability::READ_ALL_RESPONSES
                && capability.enabled));

        let listed = directory
            .questionnaires_in_course(DEMO_COURSE, UserId(99))
            .expect("listing");
        assert!(listed.is_none());
    }
}
