use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::info;

use super::cache::{read_through, CacheKey, WsCache};
use super::domain::{
    AccessInformation, Analysis, AnalysisRequest, Capability, CoursesRequest,
    QuestionnaireRecord, QuestionnaireRequest, QuestionnairesByCourses, UserResponses,
    UserResponsesRequest, ViewStatus, Warning,
};
use super::MobileError;
use crate::survey::domain::{CourseId, QuestionnaireId, ResponseId, UserId};
use crate::survey::repository::SurveyRepository;
use crate::survey::responses;

/// Host-platform services: course enrolment, capabilities, view logging and completion.
pub trait QuestionnaireDirectory: Send + Sync {
    /// `None` when the user has no access to the course.
    fn questionnaires_in_course(
        &self,
        course: CourseId,
        user: UserId,
    ) -> Result<Option<Vec<QuestionnaireRecord>>, DirectoryError>;
    fn questionnaire(
        &self,
        id: QuestionnaireId,
    ) -> Result<Option<QuestionnaireRecord>, DirectoryError>;
    fn capabilities(
        &self,
        id: QuestionnaireId,
        user: UserId,
    ) -> Result<Vec<Capability>, DirectoryError>;
    /// Logs the view and marks the activity viewed for completion.
    fn record_view(&self, id: QuestionnaireId, user: UserId) -> Result<(), DirectoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Remote-procedure surface used by the mobile app.
pub struct MobileService<D, R, C> {
    directory: Arc<D>,
    surveys: Arc<R>,
    cache: Arc<C>,
}

impl<D, R, C> MobileService<D, R, C>
where
    D: QuestionnaireDirectory + 'static,
    R: SurveyRepository + 'static,
    C: WsCache + 'static,
{
    pub fn new(directory: Arc<D>, surveys: Arc<R>, cache: Arc<C>) -> Self {
        Self {
            directory,
            surveys,
            cache,
        }
    }

    fn questionnaire(&self, id: QuestionnaireId) -> Result<QuestionnaireRecord, MobileError> {
        self.directory
            .questionnaire(id)?
            .ok_or(MobileError::QuestionnaireNotFound(id))
    }

    pub fn questionnaires_by_courses(
        &self,
        user: UserId,
        request: CoursesRequest,
    ) -> Result<QuestionnairesByCourses, MobileError> {
        let mut questionnaires = Vec::new();
        let mut warnings = Vec::new();
        let courses: BTreeSet<CourseId> = request.courseids.into_iter().collect();

        for course in courses {
            let key = CacheKey::questionnaires(course, user);
            let listed: Option<Vec<QuestionnaireRecord>> =
                read_through(self.cache.as_ref(), &key, || {
                    self.directory
                        .questionnaires_in_course(course, user)
                        .map_err(MobileError::from)
                })?;
            match listed {
                Some(records) => questionnaires.extend(records.into_iter().map(Into::into)),
                None => warnings.push(Warning::no_access(course)),
            }
        }

        Ok(QuestionnairesByCourses {
            questionnaires,
            warnings,
        })
    }

    pub fn access_information(
        &self,
        user: UserId,
        request: QuestionnaireRequest,
    ) -> Result<AccessInformation, MobileError> {
        let id = request.questionnaireid;
        self.questionnaire(id)?;
        let key = CacheKey::access(id, user);
        read_through(self.cache.as_ref(), &key, || {
            let capabilities = self.directory.capabilities(id, user)?;
            Ok(AccessInformation {
                capabilities,
                warnings: Vec::new(),
            })
        })
    }

    /// Number of attempts the user submitted to the questionnaire.
    pub fn user_responses(
        &self,
        caller: UserId,
        request: UserResponsesRequest,
    ) -> Result<UserResponses, MobileError> {
        let record = self.questionnaire(request.questionnaireid)?;
        let user = request.userid.unwrap_or(caller);
        if user != caller {
            let access = self.access_information(
                caller,
                QuestionnaireRequest {
                    questionnaireid: record.id,
                },
            )?;
            if !access.allows(Capability::READ_ALL_RESPONSES) {
                return Err(MobileError::Forbidden(Capability::READ_ALL_RESPONSES));
            }
        }

        let responses = self
            .surveys
            .attempts(record.survey)?
            .into_iter()
            .filter(|attempt| attempt.questionnaire == record.id && attempt.user == user)
            .count();
        Ok(UserResponses {
            responses,
            warnings: Vec::new(),
        })
    }

    pub fn view(
        &self,
        user: UserId,
        request: QuestionnaireRequest,
    ) -> Result<ViewStatus, MobileError> {
        let record = self.questionnaire(request.questionnaireid)?;
        self.directory.record_view(record.id, user)?;
        info!(questionnaire = %record.id, user = %user, "questionnaire viewed");
        Ok(ViewStatus {
            status: true,
            warnings: Vec::new(),
        })
    }

    /// Per-question summaries, optionally limited to the attempts of one group.
    pub fn analysis(
        &self,
        user: UserId,
        request: AnalysisRequest,
    ) -> Result<Analysis, MobileError> {
        let record = self.questionnaire(request.questionnaireid)?;
        let access = self.access_information(
            user,
            QuestionnaireRequest {
                questionnaireid: record.id,
            },
        )?;
        if !access.allows(Capability::READ_ALL_RESPONSES) {
            return Err(MobileError::Forbidden(Capability::READ_ALL_RESPONSES));
        }

        let key = CacheKey::analysis(record.id, request.groupid);
        read_through(self.cache.as_ref(), &key, || {
            let attempts: BTreeSet<ResponseId> = self
                .surveys
                .attempts(record.survey)?
                .into_iter()
                .filter(|attempt| attempt.questionnaire == record.id)
                .filter(|attempt| request.groupid.map_or(true, |group| attempt.group == Some(group)))
                .map(|attempt| attempt.id)
                .collect();
            let questions = self.surveys.questions(record.survey)?;
            let rows = self.surveys.responses(record.survey, Some(&attempts))?;
            Ok(Analysis {
                questionnaireid: record.id,
                groupid: request.groupid,
                responses: attempts.len(),
                questions: responses::analyze(&questions, &rows, Some(&attempts)),
                warnings: Vec::new(),
            })
        })
    }

    /// Drops cached analysis after a new attempt so the next read recomputes it.
    pub fn attempt_recorded(&self, questionnaire: QuestionnaireId) -> usize {
        self.cache
            .invalidate_prefix(&CacheKey::analysis_prefix(questionnaire))
    }
}
