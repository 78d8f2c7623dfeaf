//! Quest status rollup from step states.

use crate::quest::types::{PlayerQuestStep, QuestRecord, QuestStatus, StepStatus};

/// Index of the first step that is neither completed nor skipped.
pub fn current_step(steps: &[PlayerQuestStep]) -> Option<usize> {
    steps.iter().position(|s| !s.status.is_finished())
}

/// Derive the quest status from its steps.
///
/// Rules, first match wins:
/// completed and abandoned quests keep their status; every required step
/// completed gives `Completed`; a step asking for help gives `ReviewNeeded`;
/// an active step that failed `stuck_threshold` times gives `Stuck`; any
/// recorded attempt gives `InProgress`; otherwise `Starting`.
pub fn rollup(
    current: QuestStatus,
    steps: &[PlayerQuestStep],
    quest: &QuestRecord,
    stuck_threshold: usize,
) -> QuestStatus {
    if current.is_terminal() {
        return current;
    }

    if required_steps_done(steps, quest) {
        return QuestStatus::Completed;
    }

    if steps.iter().any(|s| s.status == StepStatus::NeedsHelp) {
        return QuestStatus::ReviewNeeded;
    }

    if let Some(active) = current_step(steps).map(|idx| &steps[idx]) {
        if active.status == StepStatus::Failed && active.failed_attempts.len() >= stuck_threshold {
            return QuestStatus::Stuck;
        }
    }

    if steps.iter().any(|s| s.attempts > 0) {
        QuestStatus::InProgress
    } else {
        QuestStatus::Starting
    }
}

fn is_optional(step: &PlayerQuestStep, quest: &QuestRecord) -> bool {
    quest
        .step(&step.quest_command_step_id)
        .map(|def| def.is_optional)
        .unwrap_or(false)
}

// A quest made only of optional steps completes once all of them are finished.
fn required_steps_done(steps: &[PlayerQuestStep], quest: &QuestRecord) -> bool {
    if steps.is_empty() {
        return false;
    }
    let mut required = steps.iter().filter(|s| !is_optional(s, quest)).peekable();
    if required.peek().is_none() {
        return steps.iter().all(|s| s.status.is_finished());
    }
    required.all(|s| s.status == StepStatus::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quest::types::{FailedAttempt, PlayerQuestRecord, QuestCommandStep};
    use chrono::Utc;

    fn quest() -> QuestRecord {
        QuestRecord::new("q", "w", "Q", "", 1)
            .with_step(QuestCommandStep::new("", 0, "init", "git init"))
            .with_step(QuestCommandStep::new("", 0, "status", "git status").optional())
            .with_step(QuestCommandStep::new("", 0, "add", "git add <path>"))
    }

    fn steps() -> Vec<PlayerQuestStep> {
        PlayerQuestRecord::new("alice", &quest(), Utc::now()).steps
    }

    fn fail(step: &mut PlayerQuestStep, times: usize) {
        for _ in 0..times {
            step.attempts += 1;
            step.failed_attempts.push(FailedAttempt {
                command: "git nope".to_string(),
                timestamp: Utc::now(),
                error: None,
            });
        }
        step.status = StepStatus::Failed;
    }

    #[test]
    fn fresh_quest_is_starting() {
        let steps = steps();
        assert_eq!(current_step(&steps), Some(0));
        assert_eq!(rollup(QuestStatus::Starting, &steps, &quest(), 3), QuestStatus::Starting);
    }

    #[test]
    fn required_steps_complete_the_quest() {
        let mut steps = steps();
        steps[0].status = StepStatus::Completed;
        steps[0].attempts = 1;
        steps[2].status = StepStatus::Completed;
        steps[2].attempts = 1;
        // optional step left pending
        assert_eq!(rollup(QuestStatus::InProgress, &steps, &quest(), 3), QuestStatus::Completed);
    }

    #[test]
    fn skipped_optional_step_moves_current() {
        let mut steps = steps();
        steps[0].status = StepStatus::Completed;
        steps[1].status = StepStatus::Skipped;
        assert_eq!(current_step(&steps), Some(2));
        steps[2].status = StepStatus::Completed;
        assert_eq!(current_step(&steps), None);
    }

    #[test]
    fn help_request_needs_review() {
        let mut steps = steps();
        steps[0].status = StepStatus::NeedsHelp;
        assert_eq!(
            rollup(QuestStatus::InProgress, &steps, &quest(), 3),
            QuestStatus::ReviewNeeded
        );
    }

    #[test]
    fn repeated_failures_get_stuck() {
        let mut steps = steps();
        fail(&mut steps[0], 2);
        assert_eq!(rollup(QuestStatus::Starting, &steps, &quest(), 3), QuestStatus::InProgress);
        fail(&mut steps[0], 1);
        assert_eq!(rollup(QuestStatus::InProgress, &steps, &quest(), 3), QuestStatus::Stuck);
    }

    #[test]
    fn terminal_status_is_sticky() {
        let mut steps = steps();
        fail(&mut steps[0], 5);
        assert_eq!(
            rollup(QuestStatus::Abandoned, &steps, &quest(), 3),
            QuestStatus::Abandoned
        );
        assert_eq!(
            rollup(QuestStatus::Completed, &steps, &quest(), 3),
            QuestStatus::Completed
        );
    }

    #[test]
    fn all_optional_quest_needs_every_step_finished() {
        let quest = QuestRecord::new("opt", "w", "Opt", "", 1)
            .with_step(QuestCommandStep::new("", 0, "status", "git status").optional())
            .with_step(QuestCommandStep::new("", 0, "log", "git log").optional());
        let mut steps = PlayerQuestRecord::new("alice", &quest, Utc::now()).steps;
        steps[0].status = StepStatus::Skipped;
        steps[0].attempts = 1;
        assert_eq!(rollup(QuestStatus::Starting, &steps, &quest, 3), QuestStatus::InProgress);
        steps[1].status = StepStatus::Completed;
        assert_eq!(rollup(QuestStatus::InProgress, &steps, &quest, 3), QuestStatus::Completed);
    }
}
