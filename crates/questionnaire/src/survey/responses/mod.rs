//! Per-question aggregation of stored response rows.
//!
//! Every question kind has one handler; adding a kind fails to compile until
//! [`aggregate`], [`feedback_scores`] and [`max_score`] cover it.

mod choice;
mod open;
mod rank;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub use choice::ChoiceCount;
pub use open::{DateCount, NumericSummary};
pub use rank::{RankChoiceStats, RankSummary};

use super::domain::{Question, QuestionId, QuestionKind, ResponseId, ResponseRow};

/// Restricts aggregation to a subset of attempts, e.g. one group.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseFilter<'a>(Option<&'a BTreeSet<ResponseId>>);

impl<'a> ResponseFilter<'a> {
    pub fn new(ids: Option<&'a BTreeSet<ResponseId>>) -> Self {
        Self(ids)
    }

    pub fn admits(&self, response: ResponseId) -> bool {
        self.0.map(|ids| ids.contains(&response)).unwrap_or(true)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "summary", rename_all = "snake_case")]
pub enum QuestionSummary {
    /// No choices or no admitted responses.
    Empty,
    YesNo {
        yes: usize,
        no: usize,
    },
    Choices {
        respondents: usize,
        choices: Vec<ChoiceCount>,
    },
    Rank(RankSummary),
    Text {
        entries: Vec<String>,
    },
    Numeric(NumericSummary),
    Dates {
        entries: Vec<DateCount>,
    },
}

impl QuestionSummary {
    pub fn is_empty(&self) -> bool {
        matches!(self, QuestionSummary::Empty)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionReport {
    pub question: QuestionId,
    pub position: u32,
    pub reference: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub summary: QuestionSummary,
}

pub fn aggregate(
    question: &Question,
    rows: &[ResponseRow],
    filter: Option<&BTreeSet<ResponseId>>,
) -> QuestionSummary {
    let filter = ResponseFilter::new(filter);
    let summary = match question.kind {
        QuestionKind::YesNo => {
            choice::yes_no_counts(question, rows, filter).map(|(yes, no)| QuestionSummary::YesNo { yes, no })
        }
        QuestionKind::Radio | QuestionKind::Dropdown | QuestionKind::Checkbox => {
            choice::choice_counts(question, rows, filter).map(|(respondents, choices)| {
                QuestionSummary::Choices {
                    respondents,
                    choices,
                }
            })
        }
        QuestionKind::Rate(settings) => {
            if question.choices.is_empty() {
                None
            } else {
                rank::summarize(question, settings, rows, filter).map(QuestionSummary::Rank)
            }
        }
        QuestionKind::Text | QuestionKind::Essay => {
            let entries = open::text_entries(question, rows, filter);
            (!entries.is_empty()).then_some(QuestionSummary::Text { entries })
        }
        QuestionKind::Numeric => {
            open::numeric_summary(question, rows, filter).map(QuestionSummary::Numeric)
        }
        QuestionKind::Date => {
            let entries = open::date_counts(question, rows, filter);
            (!entries.is_empty()).then_some(QuestionSummary::Dates { entries })
        }
        QuestionKind::SectionText | QuestionKind::PageBreak => None,
    };
    summary.unwrap_or(QuestionSummary::Empty)
}

/// Aggregates every answerable question of a survey, in position order.
pub fn analyze(
    questions: &[Question],
    rows: &[ResponseRow],
    filter: Option<&BTreeSet<ResponseId>>,
) -> Vec<QuestionReport> {
    let mut ordered: Vec<&Question> = questions
        .iter()
        .filter(|question| !question.deleted && !question.kind.is_structural())
        .collect();
    ordered.sort_by_key(|question| question.position);
    ordered
        .into_iter()
        .map(|question| QuestionReport {
            question: question.id,
            position: question.position,
            reference: question.reference(),
            kind: question.kind.label().to_string(),
            summary: aggregate(question, rows, filter),
        })
        .collect()
}

/// Score each admitted response earns on one question.
///
/// Responses without an answer to the question are absent from the map.
pub fn feedback_scores(
    question: &Question,
    rows: &[ResponseRow],
    filter: Option<&BTreeSet<ResponseId>>,
) -> BTreeMap<ResponseId, f64> {
    let filter = ResponseFilter::new(filter);
    match question.kind {
        QuestionKind::Rate(_) => rank::feedback_scores(question, rows, filter),
        QuestionKind::YesNo => choice::yes_no_scores(question, rows, filter),
        QuestionKind::Radio | QuestionKind::Dropdown => {
            choice::single_choice_scores(question, rows, filter)
        }
        QuestionKind::Checkbox
        | QuestionKind::Text
        | QuestionKind::Essay
        | QuestionKind::Date
        | QuestionKind::Numeric
        | QuestionKind::SectionText
        | QuestionKind::PageBreak => BTreeMap::new(),
    }
}

/// Highest score one response can earn on a question, when it is bounded.
pub fn max_score(question: &Question) -> Option<f64> {
    let highest = || {
        question
            .choices
            .iter()
            .filter_map(|choice| choice.value)
            .fold(None, |best: Option<f64>, value| {
                Some(best.map_or(value, |best| best.max(value)))
            })
    };
    match question.kind {
        QuestionKind::YesNo => Some(1.0),
        QuestionKind::Radio | QuestionKind::Dropdown => highest(),
        QuestionKind::Rate(settings) => {
            let values = rank::scale_values(question);
            let reachable = values
                .iter()
                .take(settings.length as usize)
                .copied()
                .fold(None, |best: Option<f64>, value| {
                    Some(best.map_or(value, |best| best.max(value)))
                });
            reachable.map(|best| best * question.choices.len() as f64)
        }
        QuestionKind::Checkbox
        | QuestionKind::Text
        | QuestionKind::Essay
        | QuestionKind::Date
        | QuestionKind::Numeric
        | QuestionKind::SectionText
        | QuestionKind::PageBreak => None,
    }
}
