use std::collections::BTreeMap;

use super::common::*;
use crate::survey::domain::{DependencyAnswer, QuestionId, QuestionKind, RateMode};
use crate::survey::feedback::{
    attempt_feedback, eligibility, score_attempt, Eligibility, FeedbackConfig, FeedbackError,
    FeedbackMessage, FeedbackSection, IneligibleReason, ScoreCalculation, SectionAssignment,
    Weight,
};

fn weight(value: f64) -> Option<Weight> {
    Some(Weight::try_from(value).expect("valid weight"))
}

fn assign(question: u64, section: u32, weight: Option<Weight>) -> SectionAssignment {
    SectionAssignment {
        question: QuestionId(question),
        section,
        weight,
    }
}

fn scored_questions() -> Vec<crate::survey::domain::Question> {
    vec![
        named(question(1, 1, QuestionKind::YesNo), "q1"),
        named(
            with_choices(question(2, 2, QuestionKind::Radio), &[(20, Some(4.0)), (21, Some(2.0))]),
            "q2",
        ),
        named(
            with_choices(
                question(3, 3, rate(2, RateMode::Normal)),
                &[(30, Some(1.0)), (31, Some(3.0))],
            ),
            "q3",
        ),
    ]
}

#[test]
fn weighted_question_contributes_to_each_of_its_sections() {
    let mut first = FeedbackSection::new(1);
    first.calculation.insert(QuestionId(1), weight(0.5));
    let mut second = FeedbackSection::new(2);
    second.calculation.insert(QuestionId(1), weight(0.25));
    let mut third = FeedbackSection::new(3);
    third.calculation.insert(QuestionId(2), None);

    let scores = BTreeMap::from([(QuestionId(1), 8.0)]);
    let totals = score_attempt(&[first, second, third], &scores);

    assert_eq!(totals[0].score, 4.0);
    assert_eq!(totals[1].score, 2.0);
    assert_eq!(totals[2].score, 0.0, "unanswered question adds nothing");
    assert_eq!(totals[0].heading, "Section 1");
}

#[test]
fn weight_map_keeps_two_decimals() {
    let calculation: ScoreCalculation = [
        (QuestionId(1), weight(0.5)),
        (QuestionId(2), None),
        (QuestionId(3), weight(1.0)),
    ]
    .into_iter()
    .collect();

    let encoded = calculation.encode().expect("encodes");
    let decoded = ScoreCalculation::decode(&encoded).expect("decodes");
    assert_eq!(decoded, calculation);
    assert_eq!(decoded.factor(QuestionId(1)), 0.5);
    assert_eq!(decoded.factor(QuestionId(2)), 1.0);
    assert_eq!(decoded.factor(QuestionId(9)), 0.0);

    assert!(Weight::try_from(0.125).is_err());
    assert!(Weight::try_from(1.5).is_err());
    assert!(ScoreCalculation::decode("{\"1\": 0.333}").is_err());
}

#[test]
fn every_section_needs_a_question() {
    let questions = scored_questions();
    let mut config = FeedbackConfig::default();

    let err = config
        .save_assignments(3, &[assign(1, 1, None), assign(2, 3, None)], &questions)
        .expect_err("section 2 empty");
    assert_eq!(err, FeedbackError::SectionsNotSet(vec![2]));
    assert!(config.sections.is_empty(), "failed save leaves config untouched");
}

#[test]
fn shrinking_the_count_drops_surplus_sections() {
    let questions = scored_questions();
    let mut config = FeedbackConfig::default();
    config
        .save_assignments(
            3,
            &[assign(1, 1, None), assign(2, 2, None), assign(3, 3, None)],
            &questions,
        )
        .expect("three sections");
    config.section_mut(1).expect("section 1").heading = "Engagement".to_string();

    let removed = config
        .save_assignments(1, &[assign(1, 1, weight(0.5)), assign(2, 1, None)], &questions)
        .expect("one section");

    assert_eq!(removed, vec![2, 3]);
    assert_eq!(config.sections.len(), 1);
    let section = config.section(1).expect("kept");
    assert_eq!(section.heading, "Engagement", "headings survive reassignment");
    assert_eq!(section.calculation.len(), 2);
    assert_eq!(section.calculation.factor(QuestionId(1)), 0.5);
}

#[test]
fn plain_membership_is_exclusive() {
    let questions = scored_questions();
    let mut config = FeedbackConfig::default();

    let err = config
        .save_assignments(2, &[assign(1, 1, None), assign(1, 2, weight(0.5))], &questions)
        .expect_err("plain membership twice");
    assert_eq!(err, FeedbackError::MultipleMemberships(QuestionId(1)));

    config
        .save_assignments(
            2,
            &[assign(1, 1, weight(0.5)), assign(1, 2, weight(0.5))],
            &questions,
        )
        .expect("weighted membership may repeat");
    assert_eq!(config.assigned_questions().len(), 1);
}

#[test]
fn assignments_are_checked_against_eligibility() {
    let mut questions = scored_questions();
    questions.push(question(4, 4, QuestionKind::Essay));
    let mut config = FeedbackConfig::default();

    assert_eq!(
        config.save_assignments(1, &[assign(4, 1, None)], &questions),
        Err(FeedbackError::Ineligible {
            question: QuestionId(4),
            reason: IneligibleReason::UnsupportedKind
        })
    );
    assert_eq!(
        config.save_assignments(1, &[assign(1, 2, None)], &questions),
        Err(FeedbackError::SectionOutOfRange {
            section: 2,
            count: 1
        })
    );
    assert_eq!(
        config.save_assignments(1, &[assign(99, 1, None)], &questions),
        Err(FeedbackError::UnknownQuestion(QuestionId(99)))
    );
}

#[test]
fn eligibility_rules() {
    let yes_no = named(question(1, 1, QuestionKind::YesNo), "q1");
    assert_eq!(eligibility(&yes_no), Eligibility::Eligible);

    let optional = question(2, 2, QuestionKind::YesNo);
    assert_eq!(
        eligibility(&optional),
        Eligibility::Ineligible(IneligibleReason::NotRequired)
    );

    let mut unnamed = named(question(3, 3, QuestionKind::YesNo), "q3");
    unnamed.name = Some("  ".to_string());
    assert_eq!(
        eligibility(&unnamed),
        Eligibility::Ineligible(IneligibleReason::Unnamed)
    );

    let dependent = depends_on(
        named(question(4, 4, QuestionKind::YesNo), "q4"),
        vec![dependency(1, 1, DependencyAnswer::Yes)],
    );
    assert_eq!(
        eligibility(&dependent),
        Eligibility::Ineligible(IneligibleReason::Dependent)
    );

    let valueless = named(
        with_choices(question(5, 5, QuestionKind::Dropdown), &[(50, None)]),
        "q5",
    );
    assert_eq!(
        eligibility(&valueless),
        Eligibility::Ineligible(IneligibleReason::MissingValues)
    );

    let no_duplicates = named(
        with_choices(
            question(6, 6, rate(2, RateMode::NoDuplicates)),
            &[(60, Some(1.0))],
        ),
        "q6",
    );
    assert_eq!(
        eligibility(&no_duplicates),
        Eligibility::Ineligible(IneligibleReason::UnsupportedRateMode)
    );

    assert_eq!(
        eligibility(&question(7, 7, QuestionKind::SectionText)),
        Eligibility::Label
    );
}

#[test]
fn lone_unassigned_section_collects_eligible_questions() {
    let mut questions = scored_questions();
    questions.push(question(4, 4, QuestionKind::Text));
    let config = FeedbackConfig::new(vec![FeedbackSection::new(1)]);

    let resolved = config.resolved(&questions);
    assert_eq!(resolved.len(), 1);
    let collected: Vec<QuestionId> = resolved[0].calculation.questions().collect();
    assert_eq!(collected, vec![QuestionId(1), QuestionId(2), QuestionId(3)]);
    assert!(resolved[0].calculation.iter().all(|(_, weight)| weight.is_none()));

    let two = FeedbackConfig::new(vec![FeedbackSection::new(2), FeedbackSection::new(1)]);
    assert_eq!(two.sections[0].section, 1);
    assert!(two.resolved(&questions).iter().all(|section| section.calculation.is_empty()));
}

#[test]
fn message_bands_are_inclusive_and_highest_floor_wins() {
    let mut section = FeedbackSection::new(1);
    section.messages = vec![
        FeedbackMessage {
            text: "Low".to_string(),
            min_score: 0.0,
            max_score: 50.0,
        },
        FeedbackMessage {
            text: "High".to_string(),
            min_score: 50.0,
            max_score: 100.0,
        },
    ];

    assert_eq!(section.message_for(0.0).map(|m| m.text.as_str()), Some("Low"));
    assert_eq!(section.message_for(50.0).map(|m| m.text.as_str()), Some("High"));
    assert_eq!(section.message_for(100.0).map(|m| m.text.as_str()), Some("High"));
    assert!(section.message_for(120.0).is_none());
}

#[test]
fn attempt_feedback_reports_percentages() {
    let questions = scored_questions();
    let mut section = FeedbackSection::new(1);
    section.calculation.insert(QuestionId(1), None);
    section.calculation.insert(QuestionId(2), None);
    section.messages.push(FeedbackMessage {
        text: "Solid".to_string(),
        min_score: 60.0,
        max_score: 100.0,
    });

    let scores = BTreeMap::from([(QuestionId(1), 1.0), (QuestionId(2), 2.0)]);
    let feedback = attempt_feedback(&[section], &questions, &scores);

    assert_eq!(feedback[0].score.score, 3.0);
    assert_eq!(feedback[0].max_score, Some(5.0));
    assert_eq!(feedback[0].percent, Some(60.0));
    assert_eq!(feedback[0].message.as_deref(), Some("Solid"));
}
