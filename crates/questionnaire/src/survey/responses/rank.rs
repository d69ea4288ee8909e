use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::ResponseFilter;
use crate::survey::domain::{
    ChoiceId, Question, RateSettings, ResponseId, ResponseRow, ResponseValue, NOT_APPLICABLE_RANK,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankChoiceStats {
    pub choice: ChoiceId,
    pub content: String,
    pub not_applicable: usize,
    /// Responses that ranked this choice (N/A excluded).
    pub answered: usize,
    /// Sum of 1-based ranks over `answered`.
    pub rank_sum: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_average: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankSummary {
    pub scale_length: u32,
    /// True for "no duplicates" questions with fewer slots than choices.
    pub restricted: bool,
    pub respondents: usize,
    pub choices: Vec<RankChoiceStats>,
}

/// Choice values ordered by choice id; index `n` scores a rank of `n`.
pub(crate) fn scale_values(question: &Question) -> Vec<f64> {
    let mut choices: Vec<_> = question.choices.iter().collect();
    choices.sort_by_key(|choice| choice.id);
    choices.into_iter().filter_map(|choice| choice.value).collect()
}

pub(crate) fn value_at(values: &[f64], rank: i32) -> f64 {
    usize::try_from(rank)
        .ok()
        .and_then(|idx| values.get(idx))
        .copied()
        .unwrap_or(0.0)
}

pub(super) fn summarize(
    question: &Question,
    settings: RateSettings,
    rows: &[ResponseRow],
    filter: ResponseFilter<'_>,
) -> Option<RankSummary> {
    let values = scale_values(question);
    let restricted = settings.is_restricted(question.choices.len());

    let mut respondents: BTreeSet<ResponseId> = BTreeSet::new();
    // One rank per (choice, response); a repeated row replaces the earlier one.
    let mut ranks: BTreeMap<ChoiceId, BTreeMap<ResponseId, i32>> = BTreeMap::new();
    for row in rows {
        if row.question != question.id || !filter.admits(row.response) {
            continue;
        }
        if let ResponseValue::Rank { choice, rank } = row.value {
            respondents.insert(row.response);
            ranks.entry(choice).or_default().insert(row.response, rank);
        }
    }

    if respondents.is_empty() {
        return None;
    }

    let total = respondents.len();
    let penalty = f64::from(settings.length) + 1.0;

    let mut choices: Vec<_> = question.choices.iter().collect();
    choices.sort_by_key(|choice| choice.id);

    let stats = choices
        .into_iter()
        .map(|choice| {
            let given: Vec<i32> = ranks
                .get(&choice.id)
                .map(|by_response| by_response.values().copied().collect())
                .unwrap_or_default();
            let not_applicable = given
                .iter()
                .filter(|rank| **rank == NOT_APPLICABLE_RANK)
                .count();
            let answered: Vec<i32> = given.iter().copied().filter(|rank| *rank >= 0).collect();
            let rank_sum: u64 = answered.iter().map(|rank| (*rank as u64) + 1).sum();
            let count = answered.len();

            let average = if restricted {
                let skipped = total.saturating_sub(count) as f64;
                Some((rank_sum as f64 + skipped * penalty) / total as f64)
            } else if count > 0 {
                Some(rank_sum as f64 / count as f64)
            } else {
                None
            };

            let value_average = if !restricted && !values.is_empty() && count > 0 {
                let weighted: f64 = answered.iter().map(|rank| value_at(&values, *rank)).sum();
                Some(weighted / count as f64)
            } else {
                None
            };

            RankChoiceStats {
                choice: choice.id,
                content: choice.content.clone(),
                not_applicable,
                answered: count,
                rank_sum,
                average,
                value_average,
            }
        })
        .collect();

    Some(RankSummary {
        scale_length: settings.length,
        restricted,
        respondents: total,
        choices: stats,
    })
}

/// Per-response score: the value at the rank position given to each choice.
pub(super) fn feedback_scores(
    question: &Question,
    rows: &[ResponseRow],
    filter: ResponseFilter<'_>,
) -> BTreeMap<ResponseId, f64> {
    let values = scale_values(question);
    let mut scores = BTreeMap::new();
    for row in rows {
        if row.question != question.id || !filter.admits(row.response) {
            continue;
        }
        if let ResponseValue::Rank { rank, .. } = row.value {
            *scores.entry(row.response).or_insert(0.0) += value_at(&values, rank);
        }
    }
    scores
}
