//! Loading survey definitions (JSON) and response exports (CSV) from disk.

mod parser;

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{
    ChoiceId, GroupId, Question, QuestionId, QuestionKind, ResponseId, ResponseRow, ResponseValue,
    Survey,
};
use super::feedback::FeedbackConfig;
use parser::ResponseRecord;

#[derive(Debug)]
pub enum ResponseImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Json(serde_json::Error),
    UnknownQuestion { line: usize, question: QuestionId },
    InvalidValue {
        line: usize,
        question: QuestionId,
        detail: String,
    },
}

impl std::fmt::Display for ResponseImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseImportError::Io(err) => write!(f, "failed to read import file: {}", err),
            ResponseImportError::Csv(err) => write!(f, "invalid response CSV data: {}", err),
            ResponseImportError::Json(err) => write!(f, "invalid survey definition: {}", err),
            ResponseImportError::UnknownQuestion { line, question } => {
                write!(f, "line {}: question {} is not in the survey", line, question)
            }
            ResponseImportError::InvalidValue {
                line,
                question,
                detail,
            } => write!(f, "line {}: question {}: {}", line, question, detail),
        }
    }
}

impl std::error::Error for ResponseImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResponseImportError::Io(err) => Some(err),
            ResponseImportError::Csv(err) => Some(err),
            ResponseImportError::Json(err) => Some(err),
            ResponseImportError::UnknownQuestion { .. }
            | ResponseImportError::InvalidValue { .. } => None,
        }
    }
}

impl From<std::io::Error> for ResponseImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ResponseImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<serde_json::Error> for ResponseImportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

/// A survey with its questions and feedback sections, as exchanged in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyDocument {
    pub survey: Survey,
    pub questions: Vec<Question>,
    #[serde(default)]
    pub feedback: FeedbackConfig,
}

impl SurveyDocument {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ResponseImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ResponseImportError> {
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Response rows read from an export, with the attempts of each group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedResponses {
    pub rows: Vec<ResponseRow>,
    pub groups: BTreeMap<GroupId, BTreeSet<ResponseId>>,
}

impl ImportedResponses {
    pub fn group(&self, group: GroupId) -> Option<&BTreeSet<ResponseId>> {
        self.groups.get(&group)
    }

    pub fn response_ids(&self) -> BTreeSet<ResponseId> {
        self.rows.iter().map(|row| row.response).collect()
    }
}

pub struct ResponseImporter;

impl ResponseImporter {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        questions: &[Question],
    ) -> Result<ImportedResponses, ResponseImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, questions)
    }

    /// Reads `Response,Question,Group,Choice,Rank,Text` rows, interpreting
    /// each value according to the kind of its question.
    pub fn from_reader<R: Read>(
        reader: R,
        questions: &[Question],
    ) -> Result<ImportedResponses, ResponseImportError> {
        let by_id: BTreeMap<QuestionId, &Question> = questions
            .iter()
            .filter(|question| !question.deleted)
            .map(|question| (question.id, question))
            .collect();

        let mut imported = ImportedResponses::default();
        let mut picked: BTreeSet<(ResponseId, QuestionId, ChoiceId)> = BTreeSet::new();
        for record in parser::parse_records(reader)? {
            let question_id = QuestionId(record.question);
            let question = by_id
                .get(&question_id)
                .ok_or(ResponseImportError::UnknownQuestion {
                    line: record.line,
                    question: question_id,
                })?;
            let response = ResponseId(record.response);
            if let Some(group) = record.group {
                imported
                    .groups
                    .entry(GroupId(group))
                    .or_default()
                    .insert(response);
            }
            let value = convert(question, &record)?;
            let choice = match &value {
                ResponseValue::Rank { choice, .. } | ResponseValue::Choice { choice } => {
                    Some(*choice)
                }
                _ => None,
            };
            if let Some(choice) = choice {
                if !picked.insert((response, question_id, choice)) {
                    return Err(ResponseImportError::InvalidValue {
                        line: record.line,
                        question: question_id,
                        detail: format!("choice {choice} repeated in response {response}"),
                    });
                }
            }
            imported.rows.push(ResponseRow {
                response,
                question: question_id,
                value,
            });
        }

        Ok(imported)
    }
}

fn convert(question: &Question, record: &ResponseRecord) -> Result<ResponseValue, ResponseImportError> {
    let invalid = |detail: String| ResponseImportError::InvalidValue {
        line: record.line,
        question: question.id,
        detail,
    };
    let text = || {
        record
            .text
            .clone()
            .ok_or_else(|| invalid("missing Text value".to_string()))
    };
    let choice = || -> Result<ChoiceId, ResponseImportError> {
        let raw = record
            .choice
            .as_deref()
            .ok_or_else(|| invalid("missing Choice value".to_string()))?;
        let id = raw
            .parse::<u64>()
            .map(ChoiceId)
            .map_err(|err| invalid(format!("choice {raw:?}: {err}")))?;
        question
            .choice(id)
            .map(|choice| choice.id)
            .ok_or_else(|| invalid(format!("unknown choice {id}")))
    };

    match question.kind {
        QuestionKind::YesNo => {
            let raw = text()?;
            match raw.to_ascii_lowercase().as_str() {
                "y" | "yes" | "1" | "true" => Ok(ResponseValue::YesNo { value: true }),
                "n" | "no" | "0" | "false" => Ok(ResponseValue::YesNo { value: false }),
                _ => Err(invalid(format!("{raw:?} is not yes or no"))),
            }
        }
        QuestionKind::Radio | QuestionKind::Dropdown | QuestionKind::Checkbox => {
            Ok(ResponseValue::Choice { choice: choice()? })
        }
        QuestionKind::Rate(_) => {
            let choice = choice()?;
            let raw = record
                .rank
                .as_deref()
                .ok_or_else(|| invalid("missing Rank value".to_string()))?;
            let rank = raw
                .parse::<i32>()
                .map_err(|err| invalid(format!("rank {raw:?}: {err}")))?;
            Ok(ResponseValue::Rank { choice, rank })
        }
        QuestionKind::Text | QuestionKind::Essay => Ok(ResponseValue::Text { text: text()? }),
        QuestionKind::Numeric => {
            let raw = text()?;
            let value = raw
                .parse::<f64>()
                .map_err(|err| invalid(format!("number {raw:?}: {err}")))?;
            Ok(ResponseValue::Number { value })
        }
        QuestionKind::Date => {
            let raw = text()?;
            let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map_err(|err| invalid(format!("date {raw:?}: {err}")))?;
            Ok(ResponseValue::Date { date })
        }
        QuestionKind::SectionText | QuestionKind::PageBreak => {
            Err(invalid("question takes no answers".to_string()))
        }
    }
}
