use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::weights::{ScoreCalculation, Weight};
use super::FeedbackError;
use crate::survey::domain::{Question, QuestionId, QuestionKind, RateMode};

/// Interpretive text shown when a section score falls inside `[min_score, max_score]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackMessage {
    pub text: String,
    pub min_score: f64,
    pub max_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSection {
    /// 1-based section number.
    pub section: u32,
    pub heading: String,
    #[serde(default)]
    pub calculation: ScoreCalculation,
    #[serde(default)]
    pub messages: Vec<FeedbackMessage>,
}

impl FeedbackSection {
    pub fn new(section: u32) -> Self {
        Self {
            section,
            heading: format!("Section {section}"),
            calculation: ScoreCalculation::new(),
            messages: Vec::new(),
        }
    }

    /// Message whose band contains the score; the band with the highest lower
    /// bound wins where bands touch.
    pub fn message_for(&self, score: f64) -> Option<&FeedbackMessage> {
        self.messages
            .iter()
            .filter(|message| score >= message.min_score && score <= message.max_score)
            .max_by(|left, right| left.min_score.total_cmp(&right.min_score))
    }
}

/// Why a question cannot take part in feedback scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IneligibleReason {
    UnsupportedKind,
    UnsupportedRateMode,
    MissingValues,
    NotRequired,
    Unnamed,
    Dependent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Eligibility {
    Eligible,
    /// Section text shown as a heading in the section list, never scored.
    Label,
    Ineligible(IneligibleReason),
}

impl Eligibility {
    pub fn is_eligible(self) -> bool {
        matches!(self, Eligibility::Eligible)
    }
}

pub fn eligibility(question: &Question) -> Eligibility {
    let has_values = question.choices.iter().any(|choice| choice.value.is_some());
    let kind_check = match question.kind {
        QuestionKind::SectionText => return Eligibility::Label,
        QuestionKind::YesNo => None,
        QuestionKind::Radio | QuestionKind::Dropdown => {
            (!has_values).then_some(IneligibleReason::MissingValues)
        }
        QuestionKind::Rate(settings) => match settings.mode {
            RateMode::Normal | RateMode::Osgood if has_values => None,
            RateMode::Normal | RateMode::Osgood => Some(IneligibleReason::MissingValues),
            RateMode::NotApplicable | RateMode::NoDuplicates => {
                Some(IneligibleReason::UnsupportedRateMode)
            }
        },
        QuestionKind::Text
        | QuestionKind::Essay
        | QuestionKind::Checkbox
        | QuestionKind::Date
        | QuestionKind::Numeric
        | QuestionKind::PageBreak => Some(IneligibleReason::UnsupportedKind),
    };

    if let Some(reason) = kind_check {
        return Eligibility::Ineligible(reason);
    }
    if !question.required {
        return Eligibility::Ineligible(IneligibleReason::NotRequired);
    }
    if !question.has_name() {
        return Eligibility::Ineligible(IneligibleReason::Unnamed);
    }
    if question.is_dependent() {
        return Eligibility::Ineligible(IneligibleReason::Dependent);
    }
    Eligibility::Eligible
}

/// One question placed into one section by the author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionAssignment {
    pub question: QuestionId,
    pub section: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<Weight>,
}

/// Feedback sections of one survey.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackConfig {
    pub sections: Vec<FeedbackSection>,
}

impl FeedbackConfig {
    pub fn new(sections: Vec<FeedbackSection>) -> Self {
        let mut config = Self { sections };
        config.sections.sort_by_key(|section| section.section);
        config
    }

    pub fn section(&self, number: u32) -> Option<&FeedbackSection> {
        self.sections.iter().find(|section| section.section == number)
    }

    pub fn section_mut(&mut self, number: u32) -> Option<&mut FeedbackSection> {
        self.sections.iter_mut().find(|section| section.section == number)
    }

    /// Replaces the question assignments of sections `1..=count`.
    ///
    /// Every section must receive at least one question. Sections numbered
    /// above `count` are dropped together with their messages; the dropped
    /// numbers are returned.
    pub fn save_assignments(
        &mut self,
        count: u32,
        assignments: &[SectionAssignment],
        questions: &[Question],
    ) -> Result<Vec<u32>, FeedbackError> {
        let by_id: BTreeMap<QuestionId, &Question> = questions
            .iter()
            .filter(|question| !question.deleted)
            .map(|question| (question.id, question))
            .collect();

        let mut calculations: BTreeMap<u32, ScoreCalculation> = BTreeMap::new();
        let mut memberships: BTreeMap<QuestionId, (usize, bool)> = BTreeMap::new();
        for assignment in assignments {
            if assignment.section == 0 || assignment.section > count {
                return Err(FeedbackError::SectionOutOfRange {
                    section: assignment.section,
                    count,
                });
            }
            let question = by_id
                .get(&assignment.question)
                .ok_or(FeedbackError::UnknownQuestion(assignment.question))?;
            let reason = match eligibility(question) {
                Eligibility::Eligible => None,
                Eligibility::Label => Some(IneligibleReason::UnsupportedKind),
                Eligibility::Ineligible(reason) => Some(reason),
            };
            if let Some(reason) = reason {
                return Err(FeedbackError::Ineligible {
                    question: assignment.question,
                    reason,
                });
            }

            let entry = memberships.entry(assignment.question).or_insert((0, false));
            entry.0 += 1;
            entry.1 |= assignment.weight.is_none();
            if entry.0 > 1 && entry.1 {
                return Err(FeedbackError::MultipleMemberships(assignment.question));
            }

            calculations
                .entry(assignment.section)
                .or_default()
                .insert(assignment.question, assignment.weight);
        }

        let unset: Vec<u32> = (1..=count)
            .filter(|number| !calculations.contains_key(number))
            .collect();
        if !unset.is_empty() {
            return Err(FeedbackError::SectionsNotSet(unset));
        }

        let removed: Vec<u32> = self
            .sections
            .iter()
            .map(|section| section.section)
            .filter(|number| *number > count)
            .collect();
        self.sections.retain(|section| section.section <= count);

        for (number, calculation) in calculations {
            match self.section_mut(number) {
                Some(section) => section.calculation = calculation,
                None => {
                    let mut section = FeedbackSection::new(number);
                    section.calculation = calculation;
                    self.sections.push(section);
                }
            }
        }
        self.sections.sort_by_key(|section| section.section);

        Ok(removed)
    }

    /// Sections used for scoring.
    ///
    /// A single section that was never assigned collects every eligible
    /// question with plain membership.
    pub fn resolved(&self, questions: &[Question]) -> Vec<FeedbackSection> {
        match self.sections.as_slice() {
            [only] if only.calculation.is_empty() => {
                let mut section = only.clone();
                section.calculation = questions
                    .iter()
                    .filter(|question| !question.deleted && eligibility(question).is_eligible())
                    .map(|question| (question.id, None))
                    .collect();
                vec![section]
            }
            _ => self.sections.clone(),
        }
    }

    /// Questions referenced by any section.
    pub fn assigned_questions(&self) -> BTreeSet<QuestionId> {
        self.sections
            .iter()
            .flat_map(|section| section.calculation.questions())
            .collect()
    }
}
