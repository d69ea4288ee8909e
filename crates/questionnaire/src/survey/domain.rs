use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(
    /// Identifier of the reusable question set.
    SurveyId
);
id_newtype!(QuestionId);
id_newtype!(ChoiceId);
id_newtype!(
    /// Identifier of one submitted attempt; every response row carries it.
    ResponseId
);
id_newtype!(DependencyId);
id_newtype!(UserId);
id_newtype!(CourseId);
id_newtype!(GroupId);
id_newtype!(
    /// Identifier of an activity instance pointing at a survey.
    QuestionnaireId
);

/// Stored rank for a "not applicable" rate answer.
pub const NOT_APPLICABLE_RANK: i32 = -1;

/// How branching between questions is configured for a survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationMode {
    #[default]
    Linear,
    /// Single parent per question, one required answer.
    Branching,
    /// Several parents per question combined with AND/OR.
    AdvancedBranching,
}

impl NavigationMode {
    pub const fn has_dependencies(self) -> bool {
        !matches!(self, NavigationMode::Linear)
    }

    pub const fn is_advanced(self) -> bool {
        matches!(self, NavigationMode::AdvancedBranching)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Survey {
    pub id: SurveyId,
    pub name: String,
    #[serde(default)]
    pub navigation: NavigationMode,
    /// Number of configured feedback sections; 0 disables feedback, 1 is global feedback.
    #[serde(default)]
    pub feedback_sections: u32,
}

/// Scoring variant of a rate question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateMode {
    #[default]
    Normal,
    /// Adds a "not applicable" column.
    NotApplicable,
    /// Each scale slot may be used once; scale may be shorter than the choice list.
    NoDuplicates,
    /// Osgood semantic differential.
    Osgood,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSettings {
    /// Number of scale slots.
    pub length: u32,
    #[serde(default)]
    pub mode: RateMode,
}

impl RateSettings {
    /// True when fewer scale slots than choices exist and duplicates are forbidden.
    pub fn is_restricted(&self, choice_count: usize) -> bool {
        self.mode == RateMode::NoDuplicates && (self.length as usize) < choice_count
    }
}

/// Closed set of question kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    YesNo,
    Text,
    Essay,
    Radio,
    Checkbox,
    Dropdown,
    Rate(RateSettings),
    Date,
    Numeric,
    SectionText,
    PageBreak,
}

/// Storage family for the answers of a question kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseTable {
    Bool,
    Single,
    Multiple,
    Rank,
    Text,
    Date,
}

impl QuestionKind {
    /// Numeric type identifier used by stored surveys.
    pub const fn type_id(self) -> u16 {
        match self {
            QuestionKind::YesNo => 1,
            QuestionKind::Text => 2,
            QuestionKind::Essay => 3,
            QuestionKind::Radio => 4,
            QuestionKind::Checkbox => 5,
            QuestionKind::Dropdown => 6,
            QuestionKind::Rate(_) => 8,
            QuestionKind::Date => 9,
            QuestionKind::Numeric => 10,
            QuestionKind::PageBreak => 99,
            QuestionKind::SectionText => 100,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            QuestionKind::YesNo => "Yes/No",
            QuestionKind::Text => "Text Box",
            QuestionKind::Essay => "Essay Box",
            QuestionKind::Radio => "Radio Buttons",
            QuestionKind::Checkbox => "Check Boxes",
            QuestionKind::Dropdown => "Dropdown Box",
            QuestionKind::Rate(_) => "Rate (scale 1..5)",
            QuestionKind::Date => "Date",
            QuestionKind::Numeric => "Numeric",
            QuestionKind::SectionText => "Label",
            QuestionKind::PageBreak => "----- Page Break -----",
        }
    }

    pub const fn response_table(self) -> Option<ResponseTable> {
        match self {
            QuestionKind::YesNo => Some(ResponseTable::Bool),
            QuestionKind::Radio | QuestionKind::Dropdown => Some(ResponseTable::Single),
            QuestionKind::Checkbox => Some(ResponseTable::Multiple),
            QuestionKind::Rate(_) => Some(ResponseTable::Rank),
            QuestionKind::Text | QuestionKind::Essay | QuestionKind::Numeric => {
                Some(ResponseTable::Text)
            }
            QuestionKind::Date => Some(ResponseTable::Date),
            QuestionKind::SectionText | QuestionKind::PageBreak => None,
        }
    }

    /// Page breaks and labels carry no answers.
    pub const fn is_structural(self) -> bool {
        matches!(self, QuestionKind::SectionText | QuestionKind::PageBreak)
    }

    pub const fn uses_choices(self) -> bool {
        matches!(
            self,
            QuestionKind::Radio | QuestionKind::Checkbox | QuestionKind::Dropdown | QuestionKind::Rate(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub id: ChoiceId,
    pub question_id: QuestionId,
    pub content: String,
    /// Weight used by feedback scoring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

/// Whether the parent's answer must or must not match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    #[default]
    Is,
    IsNot,
}

/// How a dependency record combines with the result of the records before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Combinator {
    #[default]
    And,
    Or,
}

/// Parent answer a dependency refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyAnswer {
    Choice(ChoiceId),
    Yes,
    No,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub id: DependencyId,
    pub parent: QuestionId,
    pub answer: DependencyAnswer,
    #[serde(default)]
    pub polarity: Polarity,
    #[serde(default)]
    pub combinator: Combinator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub survey_id: SurveyId,
    #[serde(flatten)]
    pub kind: QuestionKind,
    /// 1-based, dense within the survey.
    pub position: u32,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub deleted: bool,
}

impl Question {
    pub fn has_name(&self) -> bool {
        self.name
            .as_deref()
            .map(|name| !name.trim().is_empty())
            .unwrap_or(false)
    }

    pub fn is_dependent(&self) -> bool {
        !self.dependencies.is_empty()
    }

    pub fn choice(&self, id: ChoiceId) -> Option<&Choice> {
        self.choices.iter().find(|choice| choice.id == id)
    }

    /// Human readable reference such as `3 (age)`.
    pub fn reference(&self) -> String {
        match self.name.as_deref().filter(|name| !name.trim().is_empty()) {
            Some(name) => format!("{} ({})", self.position, name),
            None => self.position.to_string(),
        }
    }
}

/// Answer given by a respondent to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Answer {
    YesNo(bool),
    Choices(BTreeSet<ChoiceId>),
    Ranks(BTreeMap<ChoiceId, i32>),
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl Answer {
    pub fn single(choice: ChoiceId) -> Self {
        Answer::Choices(BTreeSet::from([choice]))
    }

    /// Equality test used by dependency conditions. A ranked choice matches
    /// when it received any rank other than N/A.
    pub fn matches(&self, target: DependencyAnswer) -> bool {
        match (self, target) {
            (Answer::YesNo(value), DependencyAnswer::Yes) => *value,
            (Answer::YesNo(value), DependencyAnswer::No) => !*value,
            (Answer::Choices(chosen), DependencyAnswer::Choice(choice)) => chosen.contains(&choice),
            (Answer::Ranks(ranks), DependencyAnswer::Choice(choice)) => ranks
                .get(&choice)
                .map(|rank| *rank != NOT_APPLICABLE_RANK)
                .unwrap_or(false),
            _ => false,
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Answer::Choices(chosen) => chosen.is_empty(),
            Answer::Ranks(ranks) => ranks.is_empty(),
            Answer::Text(text) => text.trim().is_empty(),
            Answer::YesNo(_) | Answer::Number(_) | Answer::Date(_) => false,
        }
    }
}

/// Answers keyed by question, as submitted for one attempt.
pub type Answers = BTreeMap<QuestionId, Answer>;

/// One completed submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: ResponseId,
    pub questionnaire: QuestionnaireId,
    pub survey: SurveyId,
    pub user: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupId>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseValue {
    YesNo { value: bool },
    Choice { choice: ChoiceId },
    Rank { choice: ChoiceId, rank: i32 },
    Text { text: String },
    Number { value: f64 },
    Date { date: NaiveDate },
}

/// Stored per-question answer row. Rows are written once per attempt and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRow {
    pub response: ResponseId,
    pub question: QuestionId,
    #[serde(flatten)]
    pub value: ResponseValue,
}

impl ResponseRow {
    pub fn table(&self) -> ResponseTable {
        match self.value {
            ResponseValue::YesNo { .. } => ResponseTable::Bool,
            ResponseValue::Choice { .. } => ResponseTable::Single,
            ResponseValue::Rank { .. } => ResponseTable::Rank,
            ResponseValue::Text { .. } | ResponseValue::Number { .. } => ResponseTable::Text,
            ResponseValue::Date { .. } => ResponseTable::Date,
        }
    }
}
