//! Attempt submission: visibility, required checks, row conversion and feedback.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::dependency::{resolve_visibility, DependencyError, Visibility};
use super::domain::{
    Answer, Answers, Attempt, ChoiceId, GroupId, Question, QuestionId, QuestionKind, QuestionnaireId,
    RateMode, ResponseId, ResponseRow, ResponseValue, SurveyId, UserId, NOT_APPLICABLE_RANK,
};
use super::feedback::{attempt_feedback, question_scores, SectionFeedback};
use super::repository::{RepositoryError, SurveyRepository};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub questionnaire: QuestionnaireId,
    pub survey: SurveyId,
    pub user: UserId,
    #[serde(default)]
    pub group: Option<GroupId>,
    #[serde(default)]
    pub answers: Answers,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptReceipt {
    pub attempt: Attempt,
    pub visibility: Visibility,
    /// Answers to hidden questions that were not stored.
    pub discarded: Vec<QuestionId>,
    pub rows: usize,
    pub feedback: Vec<SectionFeedback>,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("survey {0} not found")]
    SurveyNotFound(SurveyId),
    #[error("question {0} is not part of the survey")]
    UnknownQuestion(QuestionId),
    #[error("required questions left unanswered: {0:?}")]
    MissingRequired(Vec<QuestionId>),
    #[error("answer does not fit question {question}: {detail}")]
    AnswerMismatch { question: QuestionId, detail: String },
    #[error(transparent)]
    Dependency(#[from] DependencyError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Service recording attempts and computing their feedback.
pub struct AttemptService<R> {
    repository: Arc<R>,
}

impl<R> AttemptService<R>
where
    R: SurveyRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub fn submit(&self, submission: Submission) -> Result<AttemptReceipt, SubmissionError> {
        let survey = self
            .repository
            .survey(submission.survey)?
            .ok_or(SubmissionError::SurveyNotFound(submission.survey))?;
        let questions: Vec<Question> = self
            .repository
            .questions(survey.id)?
            .into_iter()
            .filter(|question| !question.deleted)
            .collect();

        if let Some(unknown) = submission
            .answers
            .keys()
            .find(|id| !questions.iter().any(|question| question.id == **id))
        {
            return Err(SubmissionError::UnknownQuestion(*unknown));
        }

        let visibility = resolve_visibility(&questions, survey.navigation, &submission.answers)?;

        let mut answers = submission.answers;
        let discarded: Vec<QuestionId> = answers
            .keys()
            .copied()
            .filter(|id| !visibility.is_visible(*id))
            .collect();
        for id in &discarded {
            answers.remove(id);
        }

        let missing: Vec<QuestionId> = questions
            .iter()
            .filter(|question| question.required && !question.kind.is_structural())
            .filter(|question| visibility.is_visible(question.id))
            .filter(|question| answers.get(&question.id).map_or(true, Answer::is_blank))
            .map(|question| question.id)
            .collect();
        if !missing.is_empty() {
            return Err(SubmissionError::MissingRequired(missing));
        }

        let response = self.repository.next_response_id()?;
        let mut rows = Vec::new();
        for question in &questions {
            if let Some(answer) = answers.get(&question.id) {
                rows.extend(answer_rows(question, answer, response)?);
            }
        }

        let attempt = Attempt {
            id: response,
            questionnaire: submission.questionnaire,
            survey: survey.id,
            user: submission.user,
            group: submission.group,
            submitted_at: Utc::now(),
        };
        let row_count = rows.len();

        let sections = self.repository.feedback(survey.id)?.resolved(&questions);
        let scores = question_scores(&questions, &rows, response);
        let feedback = attempt_feedback(&sections, &questions, &scores);

        self.repository.record_attempt(attempt.clone(), rows)?;
        info!(
            survey = %survey.id,
            attempt = %attempt.id,
            user = %attempt.user,
            rows = row_count,
            "attempt recorded"
        );

        Ok(AttemptReceipt {
            attempt,
            visibility,
            discarded,
            rows: row_count,
            feedback,
        })
    }
}

/// Converts one answer into the stored rows for its question kind.
pub fn answer_rows(
    question: &Question,
    answer: &Answer,
    response: ResponseId,
) -> Result<Vec<ResponseRow>, SubmissionError> {
    let mismatch = |detail: &str| SubmissionError::AnswerMismatch {
        question: question.id,
        detail: detail.to_string(),
    };
    let row = |value| ResponseRow {
        response,
        question: question.id,
        value,
    };

    if answer.is_blank() {
        return Ok(Vec::new());
    }

    match (question.kind, answer) {
        (QuestionKind::YesNo, Answer::YesNo(value)) => {
            Ok(vec![row(ResponseValue::YesNo { value: *value })])
        }
        (QuestionKind::Radio | QuestionKind::Dropdown, Answer::Choices(chosen)) => {
            if chosen.len() > 1 {
                return Err(mismatch("only one choice may be selected"));
            }
            choice_rows(question, chosen, response)
        }
        (QuestionKind::Checkbox, Answer::Choices(chosen)) => choice_rows(question, chosen, response),
        (QuestionKind::Rate(settings), Answer::Ranks(ranks)) => {
            let mut used = BTreeSet::new();
            let mut rows = Vec::with_capacity(ranks.len());
            for (choice, rank) in ranks {
                if question.choice(*choice).is_none() {
                    return Err(mismatch("unknown choice"));
                }
                let rank = *rank;
                if rank == NOT_APPLICABLE_RANK {
                    if settings.mode != RateMode::NotApplicable {
                        return Err(mismatch("not applicable is not offered"));
                    }
                } else if rank < 0 || rank >= settings.length as i32 {
                    return Err(mismatch("rank outside the scale"));
                } else if settings.mode == RateMode::NoDuplicates && !used.insert(rank) {
                    return Err(mismatch("rank used twice"));
                }
                rows.push(row(ResponseValue::Rank {
                    choice: *choice,
                    rank,
                }));
            }
            Ok(rows)
        }
        (QuestionKind::Text | QuestionKind::Essay, Answer::Text(text)) => {
            Ok(vec![row(ResponseValue::Text { text: text.clone() })])
        }
        (QuestionKind::Numeric, Answer::Number(value)) if value.is_finite() => {
            Ok(vec![row(ResponseValue::Number { value: *value })])
        }
        (QuestionKind::Date, Answer::Date(date)) => Ok(vec![row(ResponseValue::Date { date: *date })]),
        (QuestionKind::SectionText | QuestionKind::PageBreak, _) => {
            Err(mismatch("question takes no answers"))
        }
        _ => Err(mismatch("answer type does not match the question type")),
    }
}

fn choice_rows(
    question: &Question,
    chosen: &BTreeSet<ChoiceId>,
    response: ResponseId,
) -> Result<Vec<ResponseRow>, SubmissionError> {
    chosen
        .iter()
        .map(|choice| {
            question
                .choice(*choice)
                .map(|_| ResponseRow {
                    response,
                    question: question.id,
                    value: ResponseValue::Choice { choice: *choice },
                })
                .ok_or_else(|| SubmissionError::AnswerMismatch {
                    question: question.id,
                    detail: format!("unknown choice {choice}"),
                })
        })
        .collect()
}
