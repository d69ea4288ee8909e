use serde::{Deserialize, Serialize};

use crate::survey::domain::{CourseId, GroupId, QuestionnaireId, SurveyId, UserId};
use crate::survey::responses::QuestionReport;

/// Activity instance as known to the host course platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionnaireRecord {
    pub id: QuestionnaireId,
    pub coursemodule: u64,
    pub course: CourseId,
    pub survey: SurveyId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intro: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introformat: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub item: String,
    pub itemid: u64,
    pub warningcode: String,
    pub message: String,
}

impl Warning {
    pub fn no_access(course: CourseId) -> Self {
        Self {
            item: "course".to_string(),
            itemid: course.0,
            warningcode: "1".to_string(),
            message: "No access rights in course context".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionnaireSummary {
    pub id: QuestionnaireId,
    pub coursemodule: u64,
    pub course: CourseId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intro: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub introformat: Option<u8>,
}

impl From<QuestionnaireRecord> for QuestionnaireSummary {
    fn from(record: QuestionnaireRecord) -> Self {
        Self {
            id: record.id,
            coursemodule: record.coursemodule,
            course: record.course,
            name: record.name,
            intro: record.intro,
            introformat: record.introformat,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoursesRequest {
    #[serde(default)]
    pub courseids: Vec<CourseId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionnairesByCourses {
    pub questionnaires: Vec<QuestionnaireSummary>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionnaireRequest {
    pub questionnaireid: QuestionnaireId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    pub enabled: bool,
}

impl Capability {
    pub const VIEW: &'static str = "mod/questionnaire:view";
    pub const SUBMIT: &'static str = "mod/questionnaire:submit";
    pub const READ_OWN_RESPONSES: &'static str = "mod/questionnaire:readownresponses";
    pub const READ_ALL_RESPONSES: &'static str = "mod/questionnaire:readallresponseanytime";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessInformation {
    pub capabilities: Vec<Capability>,
    pub warnings: Vec<Warning>,
}

impl AccessInformation {
    pub fn allows(&self, name: &str) -> bool {
        self.capabilities
            .iter()
            .any(|capability| capability.name == name && capability.enabled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponsesRequest {
    pub questionnaireid: QuestionnaireId,
    /// Defaults to the caller.
    #[serde(default)]
    pub userid: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponses {
    pub responses: usize,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewStatus {
    pub status: bool,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub questionnaireid: QuestionnaireId,
    #[serde(default)]
    pub groupid: Option<GroupId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub questionnaireid: QuestionnaireId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groupid: Option<GroupId>,
    pub responses: usize,
    pub questions: Vec<QuestionReport>,
    pub warnings: Vec<Warning>,
}
