use crate::infra::{
    demo_directory, InMemorySurveyRepository, DEMO_MANAGER, DEMO_QUESTIONNAIRE, DEMO_STUDENT,
};
use chrono::Duration;
use clap::Args;
use questionnaire::error::AppError;
use questionnaire::mobile::domain::AnalysisRequest;
use questionnaire::mobile::{MemoryCache, MobileService};
use questionnaire::survey::domain::{
    Answer, Answers, ChoiceId, DependencyAnswer, GroupId, NavigationMode, Question, QuestionKind,
    RateMode, RateSettings, Survey, SurveyId, UserId,
};
use questionnaire::survey::editing::{ChoiceDraft, DependencyDraft, QuestionDraft};
use questionnaire::survey::feedback::{FeedbackMessage, SectionAssignment, SectionFeedback, Weight};
use questionnaire::survey::{
    analyze, AttemptService, EditingContext, EditingError, QuestionReport, QuestionSummary,
    ResponseImporter, Submission, SurveyDocument, SurveyEditor, SurveyRepository,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct AnalyzeArgs {
    /// Survey definition exported as JSON
    #[arg(long)]
    pub(crate) survey: PathBuf,
    /// Response export (Response,Question,Group,Choice,Rank,Text)
    #[arg(long)]
    pub(crate) responses: PathBuf,
    /// Only count attempts submitted from this group
    #[arg(long)]
    pub(crate) group: Option<u64>,
    /// Print the summaries as JSON instead of text
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Skip the mobile analysis portion of the demo.
    #[arg(long)]
    pub(crate) skip_analysis: bool,
}

pub(crate) fn run_analysis(args: AnalyzeArgs) -> Result<(), AppError> {
    let AnalyzeArgs {
        survey,
        responses,
        group,
        json,
    } = args;

    let document = SurveyDocument::from_path(survey)?;
    let imported = ResponseImporter::from_path(responses, &document.questions)?;
    let filter = match group.map(GroupId) {
        Some(group) => Some(imported.group(group).cloned().unwrap_or_default()),
        None => None,
    };
    let reports = analyze(&document.questions, &imported.rows, filter.as_ref());

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    let respondents = filter
        .as_ref()
        .map_or_else(|| imported.response_ids().len(), |ids| ids.len());
    println!("{} ({} responses)", document.survey.name, respondents);
    render_reports(&reports);
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    println!("Questionnaire engine demo");
    let repository = Arc::new(InMemorySurveyRepository::default());
    let survey = author_survey(&repository)?;

    let questions = repository.questions(survey)?;
    println!("\nAuthored survey");
    for question in questions.iter().filter(|question| !question.deleted) {
        render_question(question, &questions);
    }

    let attempts = AttemptService::new(repository.clone());
    let mobile = MobileService::new(
        Arc::new(demo_directory(survey)),
        repository.clone(),
        Arc::new(MemoryCache::new(Duration::minutes(5))),
    );

    println!("\nSubmitted attempts");
    for (user, group, answers) in demo_answers(&questions) {
        let receipt = attempts.submit(Submission {
            questionnaire: DEMO_QUESTIONNAIRE,
            survey,
            user,
            group: Some(group),
            answers,
        })?;
        mobile.attempt_recorded(DEMO_QUESTIONNAIRE);
        println!(
            "  - attempt {} by user {} ({} rows, {} hidden answers discarded)",
            receipt.attempt.id,
            receipt.attempt.user,
            receipt.rows,
            receipt.discarded.len()
        );
        render_feedback(&receipt.feedback);
    }

    if args.skip_analysis {
        return Ok(());
    }

    let analysis = mobile.analysis(
        DEMO_MANAGER,
        AnalysisRequest {
            questionnaireid: DEMO_QUESTIONNAIRE,
            groupid: None,
        },
    )?;
    println!("\nAnalysis across {} attempts", analysis.responses);
    render_reports(&analysis.questions);
    Ok(())
}

fn author_survey(repository: &Arc<InMemorySurveyRepository>) -> Result<SurveyId, AppError> {
    let survey = SurveyId(1);
    repository.save_survey(Survey {
        id: survey,
        name: "Workshop feedback".to_string(),
        navigation: NavigationMode::Branching,
        feedback_sections: 0,
    })?;

    let editor = SurveyEditor::new(repository.clone());
    let mut context = EditingContext::new();

    let attended = editor.add_question(
        &mut context,
        survey,
        QuestionDraft {
            kind: Some(QuestionKind::YesNo),
            required: Some(true),
            name: Some("attended".to_string()),
            content: "Did you attend the whole workshop?".to_string(),
            ..QuestionDraft::default()
        },
    )?;
    let reason = editor.add_question(
        &mut context,
        survey,
        QuestionDraft {
            kind: Some(QuestionKind::Text),
            required: Some(false),
            content: "What made you leave early?".to_string(),
            ..QuestionDraft::default()
        },
    )?;
    let useful = editor.add_question(
        &mut context,
        survey,
        QuestionDraft {
            kind: Some(QuestionKind::Radio),
            required: Some(true),
            name: Some("useful".to_string()),
            content: "How useful was the workshop?".to_string(),
            choices: choices(&[("Not at all", 0.0), ("Somewhat", 2.0), ("Very", 4.0)]),
            ..QuestionDraft::default()
        },
    )?;
    let sessions = editor.add_question(
        &mut context,
        survey,
        QuestionDraft {
            kind: Some(QuestionKind::Rate(RateSettings {
                length: 3,
                mode: RateMode::Normal,
            })),
            name: Some("sessions".to_string()),
            content: "Rate each session".to_string(),
            choices: choices(&[("Keynote", 1.0), ("Hands-on lab", 2.0), ("Panel", 3.0)]),
            ..QuestionDraft::default()
        },
    )?;

    editor.set_dependencies(
        survey,
        reason.id,
        vec![DependencyDraft {
            parent: attended.id,
            answer: DependencyAnswer::No,
            polarity: Default::default(),
            combinator: Default::default(),
        }],
    )?;
    let repair = editor.repair_page_breaks(survey)?;
    println!(
        "Page breaks repaired: {} inserted, {} removed",
        repair.insert_before.len(),
        repair.remove.len()
    );

    let half = Weight::try_from(0.5).map_err(|err| EditingError::Feedback(err.into()))?;
    let mut config = editor.save_feedback_sections(
        survey,
        2,
        &[
            SectionAssignment {
                question: attended.id,
                section: 1,
                weight: None,
            },
            SectionAssignment {
                question: useful.id,
                section: 1,
                weight: Some(half),
            },
            SectionAssignment {
                question: sessions.id,
                section: 2,
                weight: None,
            },
        ],
    )?;

    let messages = [
        ("Participation", "Great participation", "Try to stay for all sessions"),
        ("Sessions", "Sessions were well received", "Sessions need rework"),
    ];
    for (section, (heading, high, low)) in config.sections.iter_mut().zip(messages) {
        section.heading = heading.to_string();
        section.messages = vec![
            FeedbackMessage {
                text: high.to_string(),
                min_score: 60.0,
                max_score: 100.0,
            },
            FeedbackMessage {
                text: low.to_string(),
                min_score: 0.0,
                max_score: 60.0,
            },
        ];
    }
    repository.save_feedback(survey, config)?;

    Ok(survey)
}

fn choices(entries: &[(&str, f64)]) -> Vec<ChoiceDraft> {
    entries
        .iter()
        .map(|(content, value)| ChoiceDraft {
            content: content.to_string(),
            value: Some(*value),
        })
        .collect()
}

fn demo_answers(questions: &[Question]) -> Vec<(UserId, GroupId, Answers)> {
    let find = |name: &str| {
        questions
            .iter()
            .find(|question| question.name.as_deref() == Some(name))
    };
    let choice_ids = |name: &str| -> Vec<ChoiceId> {
        find(name)
            .map(|question| question.choices.iter().map(|choice| choice.id).collect())
            .unwrap_or_default()
    };
    let attended = find("attended").map(|question| question.id);
    let reason = questions
        .iter()
        .find(|question| question.is_dependent())
        .map(|question| question.id);
    let useful = find("useful").map(|question| question.id);
    let sessions = find("sessions").map(|question| question.id);
    let useful_choices = choice_ids("useful");
    let session_choices = choice_ids("sessions");

    let build = |stayed: bool, usefulness: usize, ranks: [i32; 3], note: &str| {
        let mut answers = Answers::new();
        if let Some(id) = attended {
            answers.insert(id, Answer::YesNo(stayed));
        }
        if let Some(id) = reason.filter(|_| !note.is_empty()) {
            answers.insert(id, Answer::Text(note.to_string()));
        }
        if let (Some(id), Some(choice)) = (useful, useful_choices.get(usefulness)) {
            answers.insert(id, Answer::single(*choice));
        }
        if let Some(id) = sessions {
            let ranked: BTreeMap<ChoiceId, i32> =
                session_choices.iter().copied().zip(ranks).collect();
            answers.insert(id, Answer::Ranks(ranked));
        }
        answers
    };

    vec![
        (DEMO_STUDENT, GroupId(1), build(true, 2, [2, 1, 0], "")),
        (UserId(8), GroupId(1), build(false, 1, [1, 2, 1], "Train was late")),
        (UserId(9), GroupId(2), build(true, 0, [0, 0, 2], "")),
    ]
}

fn render_question(question: &Question, questions: &[Question]) {
    if question.kind == QuestionKind::PageBreak {
        println!("  ---- page break ----");
        return;
    }
    let required = if question.required { " *" } else { "" };
    println!(
        "  {}. [{}] {}{}",
        question.position,
        question.kind.label(),
        question.content,
        required
    );
    for dependency in &question.dependencies {
        let parent = questions
            .iter()
            .find(|candidate| candidate.id == dependency.parent)
            .map(Question::reference)
            .unwrap_or_else(|| dependency.parent.to_string());
        println!("       shown when {} is {:?}", parent, dependency.answer);
    }
}

fn render_feedback(feedback: &[SectionFeedback]) {
    for section in feedback {
        let percent = section
            .percent
            .map(|percent| format!(" ({percent:.0}%)"))
            .unwrap_or_default();
        println!(
            "      {}: {:.2}{}{}",
            section.score.heading,
            section.score.score,
            percent,
            section
                .message
                .as_deref()
                .map(|message| format!(" - {message}"))
                .unwrap_or_default()
        );
    }
}

fn render_reports(reports: &[QuestionReport]) {
    for report in reports {
        println!("  {} [{}]", report.reference, report.kind);
        match &report.summary {
            QuestionSummary::Empty => println!("      no responses"),
            QuestionSummary::YesNo { yes, no } => println!("      yes {yes}, no {no}"),
            QuestionSummary::Choices {
                respondents,
                choices,
            } => {
                println!("      {respondents} respondents");
                for choice in choices {
                    println!("      - {}: {}", choice.content, choice.count);
                }
            }
            QuestionSummary::Rank(summary) => {
                let mode = if summary.restricted {
                    " (restricted)"
                } else {
                    ""
                };
                println!(
                    "      scale 1..{}{}, {} respondents",
                    summary.scale_length, mode, summary.respondents
                );
                for choice in &summary.choices {
                    let average = choice
                        .average
                        .map(|average| format!("{average:.2}"))
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "      - {}: average {} ({} n/a)",
                        choice.content, average, choice.not_applicable
                    );
                }
            }
            QuestionSummary::Text { entries } => {
                for entry in entries {
                    println!("      \"{entry}\"");
                }
            }
            QuestionSummary::Numeric(summary) => println!(
                "      {} answers, mean {:.2} (min {}, max {})",
                summary.count, summary.mean, summary.min, summary.max
            ),
            QuestionSummary::Dates { entries } => {
                for entry in entries {
                    println!("      - {}: {}", entry.date, entry.count);
                }
            }
        }
    }
}
