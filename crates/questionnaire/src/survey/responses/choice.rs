use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::ResponseFilter;
use crate::survey::domain::{ChoiceId, Question, ResponseId, ResponseRow, ResponseValue};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceCount {
    pub choice: ChoiceId,
    pub content: String,
    pub count: usize,
}

fn admitted<'a>(
    question: &'a Question,
    rows: &'a [ResponseRow],
    filter: ResponseFilter<'a>,
) -> impl Iterator<Item = &'a ResponseRow> + 'a {
    rows.iter()
        .filter(move |row| row.question == question.id && filter.admits(row.response))
}

pub(super) fn yes_no_counts(
    question: &Question,
    rows: &[ResponseRow],
    filter: ResponseFilter<'_>,
) -> Option<(usize, usize)> {
    let mut yes = 0;
    let mut no = 0;
    for row in admitted(question, rows, filter) {
        if let ResponseValue::YesNo { value } = row.value {
            if value {
                yes += 1;
            } else {
                no += 1;
            }
        }
    }
    (yes + no > 0).then_some((yes, no))
}

/// Counts per choice for single and multiple choice questions.
pub(super) fn choice_counts(
    question: &Question,
    rows: &[ResponseRow],
    filter: ResponseFilter<'_>,
) -> Option<(usize, Vec<ChoiceCount>)> {
    if question.choices.is_empty() {
        return None;
    }

    let mut respondents: BTreeSet<ResponseId> = BTreeSet::new();
    let mut counts: BTreeMap<ChoiceId, usize> = BTreeMap::new();
    for row in admitted(question, rows, filter) {
        if let ResponseValue::Choice { choice } = row.value {
            respondents.insert(row.response);
            *counts.entry(choice).or_insert(0) += 1;
        }
    }

    if respondents.is_empty() {
        return None;
    }

    let mut choices: Vec<_> = question.choices.iter().collect();
    choices.sort_by_key(|choice| choice.id);
    let entries = choices
        .into_iter()
        .map(|choice| ChoiceCount {
            choice: choice.id,
            content: choice.content.clone(),
            count: counts.get(&choice.id).copied().unwrap_or(0),
        })
        .collect();

    Some((respondents.len(), entries))
}

pub(super) fn yes_no_scores(
    question: &Question,
    rows: &[ResponseRow],
    filter: ResponseFilter<'_>,
) -> BTreeMap<ResponseId, f64> {
    let mut scores = BTreeMap::new();
    for row in admitted(question, rows, filter) {
        if let ResponseValue::YesNo { value } = row.value {
            scores.insert(row.response, if value { 1.0 } else { 0.0 });
        }
    }
    scores
}

pub(super) fn single_choice_scores(
    question: &Question,
    rows: &[ResponseRow],
    filter: ResponseFilter<'_>,
) -> BTreeMap<ResponseId, f64> {
    let mut scores = BTreeMap::new();
    for row in admitted(question, rows, filter) {
        if let ResponseValue::Choice { choice } = row.value {
            let value = question
                .choice(choice)
                .and_then(|choice| choice.value)
                .unwrap_or(0.0);
            *scores.entry(row.response).or_insert(0.0) += value;
        }
    }
    scores
}
