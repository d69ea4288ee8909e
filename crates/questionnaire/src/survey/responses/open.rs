use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ResponseFilter;
use crate::survey::domain::{Question, ResponseRow, ResponseValue};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    pub count: usize,
    pub total: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateCount {
    pub date: NaiveDate,
    pub count: usize,
}

pub(super) fn text_entries(
    question: &Question,
    rows: &[ResponseRow],
    filter: ResponseFilter<'_>,
) -> Vec<String> {
    rows.iter()
        .filter(|row| row.question == question.id && filter.admits(row.response))
        .filter_map(|row| match &row.value {
            ResponseValue::Text { text } if !text.trim().is_empty() => Some(text.clone()),
            _ => None,
        })
        .collect()
}

pub(super) fn numeric_summary(
    question: &Question,
    rows: &[ResponseRow],
    filter: ResponseFilter<'_>,
) -> Option<NumericSummary> {
    let values: Vec<f64> = rows
        .iter()
        .filter(|row| row.question == question.id && filter.admits(row.response))
        .filter_map(|row| match row.value {
            ResponseValue::Number { value } if value.is_finite() => Some(value),
            _ => None,
        })
        .collect();

    if values.is_empty() {
        return None;
    }

    let total: f64 = values.iter().sum();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some(NumericSummary {
        count: values.len(),
        total,
        mean: total / values.len() as f64,
        min,
        max,
    })
}

pub(super) fn date_counts(
    question: &Question,
    rows: &[ResponseRow],
    filter: ResponseFilter<'_>,
) -> Vec<DateCount> {
    let mut counts: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for row in rows {
        if row.question != question.id || !filter.admits(row.response) {
            continue;
        }
        if let ResponseValue::Date { date } = row.value {
            *counts.entry(date).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .map(|(date, count)| DateCount { date, count })
        .collect()
}
