use std::collections::BTreeMap;
use std::sync::Arc;

use super::common::*;
use crate::survey::attempts::{answer_rows, AttemptService, Submission, SubmissionError};
use crate::survey::domain::{
    Answer, Answers, ChoiceId, DependencyAnswer, GroupId, NavigationMode, Question, QuestionId,
    QuestionKind, QuestionnaireId, RateMode, ResponseId, UserId,
};
use crate::survey::feedback::{FeedbackConfig, FeedbackSection};
use crate::survey::repository::SurveyRepository;

fn questions() -> Vec<Question> {
    vec![
        named(question(1, 1, QuestionKind::YesNo), "attended"),
        named(
            depends_on(
                with_choices(question(2, 2, QuestionKind::Radio), &[(20, Some(4.0)), (21, None)]),
                vec![dependency(1, 1, DependencyAnswer::Yes)],
            ),
            "session",
        ),
        question(3, 3, QuestionKind::Essay),
    ]
}

fn submission(answers: Answers) -> Submission {
    Submission {
        questionnaire: QuestionnaireId(1),
        survey: SURVEY,
        user: UserId(42),
        group: Some(GroupId(3)),
        answers,
    }
}

fn service() -> (Arc<MemoryRepository>, AttemptService<MemoryRepository>) {
    let repository = Arc::new(MemoryRepository::seeded(
        survey(NavigationMode::Branching),
        questions(),
    ));
    (repository.clone(), AttemptService::new(repository))
}

#[test]
fn answers_to_hidden_questions_are_discarded() {
    let (repository, service) = service();
    let answers = BTreeMap::from([
        (QuestionId(1), Answer::YesNo(false)),
        (QuestionId(2), Answer::single(ChoiceId(20))),
        (QuestionId(3), Answer::Text("Not this time".to_string())),
    ]);

    let receipt = service.submit(submission(answers)).expect("submitted");

    assert_eq!(receipt.discarded, vec![QuestionId(2)]);
    assert!(!receipt.visibility.is_visible(QuestionId(2)));
    assert_eq!(receipt.rows, 2);
    assert_eq!(receipt.attempt.user, UserId(42));
    assert_eq!(receipt.attempt.group, Some(GroupId(3)));

    let stored = repository.responses(SURVEY, None).expect("rows");
    assert!(stored.iter().all(|row| row.question != QuestionId(2)));
    assert_eq!(repository.attempts(SURVEY).expect("attempts").len(), 1);
}

#[test]
fn attempt_ids_follow_the_stored_attempts() {
    let repository = Arc::new(
        MemoryRepository::seeded(survey(NavigationMode::Branching), questions())
            .with_attempt(attempt(1, 7, None), Vec::new())
            .with_attempt(attempt(2, 8, None), Vec::new())
            .with_attempt(attempt(3, 9, None), Vec::new()),
    );
    let service = AttemptService::new(repository.clone());
    let answers = BTreeMap::from([(QuestionId(1), Answer::YesNo(false))]);

    let receipt = service.submit(submission(answers.clone())).expect("submitted");
    assert_eq!(receipt.attempt.id, ResponseId(4));
    let next = service.submit(submission(answers)).expect("submitted again");
    assert_eq!(next.attempt.id, ResponseId(5));
    assert_eq!(repository.attempts(SURVEY).expect("attempts").len(), 5);
}

#[test]
fn visible_required_questions_must_be_answered() {
    let (_, service) = service();

    match service.submit(submission(Answers::new())) {
        Err(SubmissionError::MissingRequired(missing)) => {
            assert_eq!(missing, vec![QuestionId(1)], "hidden q2 is not demanded");
        }
        other => panic!("expected missing answers, got {other:?}"),
    }

    let answers = BTreeMap::from([(QuestionId(1), Answer::YesNo(true))]);
    match service.submit(submission(answers)) {
        Err(SubmissionError::MissingRequired(missing)) => {
            assert_eq!(missing, vec![QuestionId(2)]);
        }
        other => panic!("expected missing answers, got {other:?}"),
    }
}

#[test]
fn unknown_questions_are_rejected() {
    let (repository, service) = service();
    let answers = BTreeMap::from([
        (QuestionId(1), Answer::YesNo(false)),
        (QuestionId(9), Answer::YesNo(true)),
    ]);

    assert!(matches!(
        service.submit(submission(answers)),
        Err(SubmissionError::UnknownQuestion(QuestionId(9)))
    ));
    assert!(repository.attempts(SURVEY).expect("attempts").is_empty());
}

#[test]
fn answers_must_fit_their_question() {
    let radio = with_choices(question(1, 1, QuestionKind::Radio), &[(10, None), (11, None)]);
    let two = Answer::Choices([ChoiceId(10), ChoiceId(11)].into_iter().collect());
    assert!(matches!(
        answer_rows(&radio, &two, ResponseId(1)),
        Err(SubmissionError::AnswerMismatch { .. })
    ));
    assert!(answer_rows(&radio, &Answer::YesNo(true), ResponseId(1)).is_err());
    assert!(answer_rows(&radio, &Answer::single(ChoiceId(99)), ResponseId(1)).is_err());

    let ranked = with_choices(
        question(2, 2, rate(3, RateMode::NoDuplicates)),
        &[(20, None), (21, None), (22, None), (23, None)],
    );
    let out_of_scale = Answer::Ranks(BTreeMap::from([(ChoiceId(20), 3)]));
    assert!(answer_rows(&ranked, &out_of_scale, ResponseId(1)).is_err());
    let not_applicable = Answer::Ranks(BTreeMap::from([(ChoiceId(20), -1)]));
    assert!(answer_rows(&ranked, &not_applicable, ResponseId(1)).is_err());
    let repeated = Answer::Ranks(BTreeMap::from([(ChoiceId(20), 0), (ChoiceId(21), 0)]));
    assert!(answer_rows(&ranked, &repeated, ResponseId(1)).is_err());

    let partial = Answer::Ranks(BTreeMap::from([(ChoiceId(20), 0), (ChoiceId(22), 2)]));
    let rows = answer_rows(&ranked, &partial, ResponseId(1)).expect("valid ranking");
    assert_eq!(rows.len(), 2);

    let with_na = with_choices(question(3, 3, rate(2, RateMode::NotApplicable)), &[(30, None)]);
    assert!(answer_rows(&with_na, &not_applicable_for(30), ResponseId(1)).is_ok());
}

fn not_applicable_for(choice: u64) -> Answer {
    Answer::Ranks(BTreeMap::from([(ChoiceId(choice), -1)]))
}

#[test]
fn feedback_is_computed_for_the_new_attempt() {
    let (repository, service) = service();
    repository
        .save_feedback(SURVEY, FeedbackConfig::new(vec![FeedbackSection::new(1)]))
        .expect("feedback stored");

    let answers = BTreeMap::from([
        (QuestionId(1), Answer::YesNo(true)),
        (QuestionId(2), Answer::single(ChoiceId(20))),
    ]);
    let receipt = service.submit(submission(answers)).expect("submitted");

    // q2 depends on q1, so only q1 is eligible for the lone section.
    assert_eq!(receipt.feedback.len(), 1);
    let section = &receipt.feedback[0];
    assert_eq!(section.score.score, 1.0);
    assert_eq!(section.max_score, Some(1.0));
    assert_eq!(section.percent, Some(100.0));
}

#[test]
fn repository_failures_abort_the_submission() {
    let service = AttemptService::new(Arc::new(UnavailableRepository));
    assert!(matches!(
        service.submit(submission(Answers::new())),
        Err(SubmissionError::Repository(_))
    ));
}
