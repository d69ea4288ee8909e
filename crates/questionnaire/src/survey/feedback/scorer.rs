use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::config::FeedbackSection;
use crate::survey::domain::{Question, QuestionId, ResponseId, ResponseRow};
use crate::survey::responses;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionScore {
    pub section: u32,
    pub heading: String,
    pub score: f64,
}

/// Weighted section totals for one attempt.
///
/// A question contributes `score * factor` to every section it is assigned
/// to and nothing elsewhere; unanswered questions contribute 0.
pub fn score_attempt(
    sections: &[FeedbackSection],
    scores: &BTreeMap<QuestionId, f64>,
) -> Vec<SectionScore> {
    sections
        .iter()
        .map(|section| SectionScore {
            section: section.section,
            heading: section.heading.clone(),
            score: section
                .calculation
                .iter()
                .map(|(question, _)| {
                    scores.get(&question).copied().unwrap_or(0.0) * section.calculation.factor(question)
                })
                .sum(),
        })
        .collect()
}

/// Per-question scores earned by one attempt.
pub fn question_scores(
    questions: &[Question],
    rows: &[ResponseRow],
    response: ResponseId,
) -> BTreeMap<QuestionId, f64> {
    let only = BTreeSet::from([response]);
    questions
        .iter()
        .filter(|question| !question.deleted)
        .filter_map(|question| {
            responses::feedback_scores(question, rows, Some(&only))
                .remove(&response)
                .map(|score| (question.id, score))
        })
        .collect()
}

/// Section score with its bound and the message selected for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionFeedback {
    #[serde(flatten)]
    pub score: SectionScore,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Scores every section and picks its message, matching bands against the
/// percentage when the section has a known maximum.
pub fn attempt_feedback(
    sections: &[FeedbackSection],
    questions: &[Question],
    scores: &BTreeMap<QuestionId, f64>,
) -> Vec<SectionFeedback> {
    let by_id: BTreeMap<QuestionId, &Question> =
        questions.iter().map(|question| (question.id, question)).collect();

    sections
        .iter()
        .zip(score_attempt(sections, scores))
        .map(|(section, score)| {
            let max_score: Option<f64> = section
                .calculation
                .iter()
                .map(|(question, _)| {
                    by_id
                        .get(&question)
                        .and_then(|question| responses::max_score(question))
                        .map(|max| max * section.calculation.factor(question))
                })
                .sum();
            let percent = max_score
                .filter(|max| *max > 0.0)
                .map(|max| score.score / max * 100.0);
            let message = section
                .message_for(percent.unwrap_or(score.score))
                .map(|message| message.text.clone());
            SectionFeedback {
                score,
                max_score,
                percent,
                message,
            }
        })
        .collect()
}
