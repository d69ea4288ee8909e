use std::collections::HashMap;

use serde::Serialize;

use crate::survey::domain::{Question, QuestionId, QuestionKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum PageBreakIssue {
    /// A dependent question shares a page with (or precedes) one of its parents.
    MissingBreak { child: QuestionId, parent: QuestionId },
    /// Leading, trailing, or repeated page break.
    UselessBreak { page_break: QuestionId },
}

/// Changes that make the page layout consistent with the dependencies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageBreakRepair {
    pub remove: Vec<QuestionId>,
    pub insert_before: Vec<QuestionId>,
}

impl PageBreakRepair {
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.insert_before.is_empty()
    }
}

fn ordered(questions: &[Question]) -> Vec<&Question> {
    let mut ordered: Vec<&Question> = questions.iter().filter(|question| !question.deleted).collect();
    ordered.sort_by_key(|question| question.position);
    ordered
}

fn useless_breaks(ordered: &[&Question]) -> Vec<QuestionId> {
    let mut useless = Vec::new();
    let mut previous_was_break = true;
    for question in ordered {
        let is_break = question.kind == QuestionKind::PageBreak;
        if is_break && previous_was_break {
            useless.push(question.id);
        }
        previous_was_break = is_break;
    }
    if let Some(last) = ordered.last() {
        if last.kind == QuestionKind::PageBreak && !useless.contains(&last.id) {
            useless.push(last.id);
        }
    }
    useless
}

pub fn validate_page_breaks(questions: &[Question]) -> Vec<PageBreakIssue> {
    let ordered = ordered(questions);
    let useless = useless_breaks(&ordered);

    let mut pages: HashMap<QuestionId, u32> = HashMap::new();
    let mut page = 1;
    for question in &ordered {
        if question.kind == QuestionKind::PageBreak && !useless.contains(&question.id) {
            page += 1;
            continue;
        }
        pages.insert(question.id, page);
    }

    let mut issues: Vec<PageBreakIssue> = useless
        .into_iter()
        .map(|page_break| PageBreakIssue::UselessBreak { page_break })
        .collect();

    for question in &ordered {
        let Some(child_page) = pages.get(&question.id) else {
            continue;
        };
        for dependency in &question.dependencies {
            if let Some(parent_page) = pages.get(&dependency.parent) {
                if child_page <= parent_page {
                    issues.push(PageBreakIssue::MissingBreak {
                        child: question.id,
                        parent: dependency.parent,
                    });
                }
            }
        }
    }

    issues
}

/// Removes useless breaks and inserts one break before every child that needs it.
///
/// Inserting a break directly before a child moves it onto a fresh page, which is
/// later than every earlier-positioned parent.
pub fn plan_page_break_repair(questions: &[Question]) -> PageBreakRepair {
    let mut repair = PageBreakRepair::default();
    for issue in validate_page_breaks(questions) {
        match issue {
            PageBreakIssue::UselessBreak { page_break } => repair.remove.push(page_break),
            PageBreakIssue::MissingBreak { child, .. } => {
                if !repair.insert_before.contains(&child) {
                    repair.insert_before.push(child);
                }
            }
        }
    }
    repair
}
