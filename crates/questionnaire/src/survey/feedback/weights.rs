use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::survey::domain::QuestionId;

/// Weight of a question inside a feedback section, in the range 0..=1 with
/// a 0.01 step. Stored as hundredths so encoding never loses precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Weight(u8);

impl Weight {
    pub const ZERO: Weight = Weight(0);
    pub const FULL: Weight = Weight(100);

    pub fn from_hundredths(hundredths: u8) -> Result<Self, WeightError> {
        if hundredths > 100 {
            return Err(WeightError::OutOfRange(f64::from(hundredths) / 100.0));
        }
        Ok(Self(hundredths))
    }

    pub fn hundredths(self) -> u8 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.0) / 100.0
    }
}

impl TryFrom<f64> for Weight {
    type Error = WeightError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(WeightError::OutOfRange(value));
        }
        let scaled = (value * 100.0).round();
        if (scaled - value * 100.0).abs() > 1e-6 {
            return Err(WeightError::TooPrecise(value));
        }
        Ok(Self(scaled as u8))
    }
}

impl From<Weight> for f64 {
    fn from(weight: Weight) -> Self {
        weight.as_f64()
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WeightError {
    #[error("weight {0} is outside 0..=1")]
    OutOfRange(f64),
    #[error("weight {0} has more than two decimal places")]
    TooPrecise(f64),
    #[error("invalid score calculation: {0}")]
    Malformed(String),
}

/// Questions assigned to one feedback section.
///
/// `None` marks plain membership, which counts with an implicit weight of 1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreCalculation(BTreeMap<QuestionId, Option<Weight>>);

impl ScoreCalculation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, question: QuestionId, weight: Option<Weight>) {
        self.0.insert(question, weight);
    }

    pub fn remove(&mut self, question: QuestionId) -> Option<Option<Weight>> {
        self.0.remove(&question)
    }

    pub fn contains(&self, question: QuestionId) -> bool {
        self.0.contains_key(&question)
    }

    /// Multiplier applied to the question's score; 0 when not assigned.
    pub fn factor(&self, question: QuestionId) -> f64 {
        match self.0.get(&question) {
            Some(Some(weight)) => weight.as_f64(),
            Some(None) => 1.0,
            None => 0.0,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (QuestionId, Option<Weight>)> + '_ {
        self.0.iter().map(|(question, weight)| (*question, *weight))
    }

    pub fn questions(&self) -> impl Iterator<Item = QuestionId> + '_ {
        self.0.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serialized form kept on the section record.
    pub fn encode(&self) -> Result<String, WeightError> {
        serde_json::to_string(self).map_err(|err| WeightError::Malformed(err.to_string()))
    }

    pub fn decode(raw: &str) -> Result<Self, WeightError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw).map_err(|err| WeightError::Malformed(err.to_string()))
    }
}

impl FromIterator<(QuestionId, Option<Weight>)> for ScoreCalculation {
    fn from_iter<T: IntoIterator<Item = (QuestionId, Option<Weight>)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
