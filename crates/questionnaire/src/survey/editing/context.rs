use serde::{Deserialize, Serialize};

use crate::survey::domain::{Question, QuestionKind};

/// Per-author editing state carried between requests.
///
/// New questions inherit the last chosen "required" flag and question type
/// unless the draft sets them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditingContext {
    pub required: bool,
    pub last_kind: Option<QuestionKind>,
}

impl EditingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn remember(&mut self, question: &Question) {
        if question.kind.is_structural() {
            return;
        }
        self.required = question.required;
        self.last_kind = Some(question.kind);
    }
}
