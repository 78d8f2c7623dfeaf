//! Command parsing and pattern validation through the public API.
use gitquest::command::{
    compile_pattern, parse, validate_command_against_pattern, CommandValidator, FailureKind,
    OptionValue, PatternError, QuestStepInput,
};
use gitquest::config::ValidationConfig;
use gitquest::quest::{canonical_seed, QuestCommandStep, StepStatus};

#[test]
fn parse_commit_with_message_and_flag() {
    let parsed = parse("git commit -m \"message\" -a");
    assert_eq!(parsed.command, "git");
    assert_eq!(parsed.args, vec!["commit", "\"message\""]);
    assert_eq!(parsed.options.get("m"), Some(&OptionValue::Flag(true)));
    assert_eq!(parsed.options.get("a"), Some(&OptionValue::Flag(true)));
    assert_eq!(parsed.options.len(), 2);
}

#[test]
fn parse_long_options() {
    let parsed = parse("git log --oneline --max-count=5");
    assert_eq!(parsed.args, vec!["log"]);
    assert_eq!(parsed.options.get("oneline"), Some(&OptionValue::Flag(true)));
    assert_eq!(
        parsed.options.get("max-count"),
        Some(&OptionValue::Text("5".to_string()))
    );
}

#[test]
fn raw_regex_capture() {
    let outcome = validate_command_against_pattern(
        "git checkout -b feature/123",
        "^git checkout -b (.+)$",
        false,
    )
    .unwrap();
    assert!(outcome.is_valid);
    assert_eq!(outcome.matches, vec!["feature/123"]);
}

#[test]
fn flags_ignored_on_request() {
    let outcome = validate_command_against_pattern("git add -A", "^git add", true).unwrap();
    assert!(outcome.is_valid);
    assert!(outcome.matches.is_empty());
}

#[test]
fn malformed_patterns_are_errors_not_panics() {
    assert!(matches!(
        compile_pattern("git add [<file>"),
        Err(PatternError::UnclosedSquareBracket(_))
    ));
    assert!(validate_command_against_pattern("git add x", "git add <file", false).is_err());
}

#[test]
fn validator_never_fails_on_bad_patterns() {
    let validator = CommandValidator::default();
    let result = validator.validate_command("git status", "git status]", None);
    assert!(!result.success);
    assert_eq!(result.failure, Some(FailureKind::ValidationError));
}

#[test]
fn optional_and_required_steps() {
    let validator = CommandValidator::default();
    let optional = QuestCommandStep::new("q", 2, "status", "git status").optional();
    let verdict = validator.validate_quest_step(QuestStepInput {
        quest_id: "q",
        step_id: &optional.id,
        command: "git log",
        step: &optional,
    });
    assert!(verdict.success);
    assert_eq!(verdict.status, StepStatus::Skipped);

    let required = QuestCommandStep::new("q", 1, "init", "git init");
    let verdict = validator.validate_quest_step(QuestStepInput {
        quest_id: "q",
        step_id: &required.id,
        command: "git log",
        step: &required,
    });
    assert!(!verdict.success);
    assert_eq!(verdict.status, StepStatus::Failed);
}

#[test]
fn step_override_beats_validator_default() {
    let validator = CommandValidator::new(&ValidationConfig {
        ignore_flags_by_default: false,
        ..ValidationConfig::default()
    });
    let step = QuestCommandStep::new("q", 1, "add", "git add <path>").with_ignore_flags(true);
    let verdict = validator.validate_quest_step(QuestStepInput {
        quest_id: "q",
        step_id: &step.id,
        command: "git add -v README.md",
        step: &step,
    });
    assert_eq!(verdict.status, StepStatus::Completed);
    assert_eq!(verdict.matches, vec!["README.md"]);
}

#[test]
fn expected_commands_solve_their_own_steps() {
    let validator = CommandValidator::default();
    for world in canonical_seed().unwrap() {
        let (_, quests) = world.to_records().unwrap();
        for quest in quests {
            for step in &quest.steps {
                let verdict = validator.validate_quest_step(QuestStepInput {
                    quest_id: &quest.id,
                    step_id: &step.id,
                    command: &step.expected_pattern,
                    step,
                });
                assert_eq!(
                    verdict.status,
                    StepStatus::Completed,
                    "{} does not accept {}",
                    step.id,
                    step.expected_pattern
                );
            }
        }
    }
}
