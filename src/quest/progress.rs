//! Step progress engine.
//!
//! Folds one validated submission into a player's step record: status,
//! attempt count, failure history, elapsed time and score. Everything here is
//! a pure function of the prior record, the verdict and the clock reading
//! passed in, which keeps scoring reproducible in tests.

use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::command::validator::StepValidation;
use crate::config::ScoringConfig;
use crate::quest::types::{FailedAttempt, PlayerQuestStep, StepStatus};

/// New step state plus the score it earned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepUpdate {
    pub step: PlayerQuestStep,
    /// Points added to the quest by this submission
    pub score_delta: u32,
    /// The step was already finished; the attempt was counted but nothing else changed
    pub replay: bool,
}

/// Seconds from `start` to `now`, floored. A start in the future counts as zero.
pub fn elapsed_seconds(start: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u64 {
    let Some(start) = start else {
        return 0;
    };
    let seconds = (now - start).num_seconds();
    if seconds < 0 {
        warn!(
            "negative step duration clamped to zero: start={} executed_at={}",
            start.to_rfc3339(),
            now.to_rfc3339()
        );
        return 0;
    }
    seconds as u64
}

/// Speed bonus: full within the target time, then one point less per decay interval.
pub fn time_bonus(time_spent: u64, scoring: &ScoringConfig) -> u32 {
    if time_spent <= scoring.target_seconds {
        return scoring.max_bonus;
    }
    let over = time_spent - scoring.target_seconds;
    let decay = over / scoring.bonus_decay_seconds.max(1);
    let decay = u32::try_from(decay).unwrap_or(u32::MAX);
    scoring.max_bonus.saturating_sub(decay)
}

/// Base points after the per-failure penalty, never below the configured floor.
pub fn base_points(prior_failures: usize, scoring: &ScoringConfig) -> u32 {
    let failures = u32::try_from(prior_failures).unwrap_or(u32::MAX);
    scoring
        .base_points
        .saturating_sub(scoring.attempt_penalty.saturating_mul(failures))
        .max(scoring.min_base_points.min(scoring.base_points))
}

/// Make `step` the active step. Finished steps are left alone.
pub fn activate_step(step: &mut PlayerQuestStep, now: DateTime<Utc>) {
    if step.status == StepStatus::Pending {
        step.status = StepStatus::InProgress;
        step.start_time = Some(now);
    }
}

/// Flag the step as needing help. Returns false for finished steps.
pub fn mark_needs_help(step: &mut PlayerQuestStep, now: DateTime<Utc>) -> bool {
    if step.status.is_finished() {
        return false;
    }
    if step.start_time.is_none() {
        step.start_time = Some(now);
    }
    step.status = StepStatus::NeedsHelp;
    true
}

/// Apply one submission to `prior`.
///
/// Every call counts as an attempt. A `Completed` verdict scores
/// `base_points(prior failures) + time_bonus(elapsed)`; `Failed` and
/// `Skipped` verdicts append to the failure history and score nothing.
pub fn apply_submission(
    prior: &PlayerQuestStep,
    verdict: &StepValidation,
    command: &str,
    now: DateTime<Utc>,
    scoring: &ScoringConfig,
) -> StepUpdate {
    let mut step = prior.clone();
    step.attempts = step.attempts.saturating_add(1);

    if prior.status.is_finished() {
        debug!(
            "submission on finished step {} counted as replay (attempts={})",
            prior.quest_command_step_id, step.attempts
        );
        return StepUpdate {
            step,
            score_delta: 0,
            replay: true,
        };
    }

    step.executed_at = Some(now);
    match verdict.status {
        StepStatus::Completed => {
            let start = prior.start_time.unwrap_or(now);
            step.time_spent = elapsed_seconds(Some(start), now);
            step.bonus_points = time_bonus(step.time_spent, scoring);
            let base = base_points(prior.failed_attempts.len(), scoring);
            step.score = base.saturating_add(step.bonus_points);
            step.status = StepStatus::Completed;
            StepUpdate {
                score_delta: step.score,
                step,
                replay: false,
            }
        }
        status => {
            let error = match status {
                StepStatus::Skipped => verdict.failure.map(|kind| kind.code().to_string()),
                _ => Some(verdict.message.clone()),
            };
            step.failed_attempts.push(FailedAttempt {
                command: command.to_string(),
                timestamp: now,
                error,
            });
            step.status = if status == StepStatus::Skipped {
                StepStatus::Skipped
            } else {
                StepStatus::Failed
            };
            if step.start_time.is_none() {
                step.start_time = Some(now);
            }
            StepUpdate {
                step,
                score_delta: 0,
                replay: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::validator::FailureKind;
    use crate::quest::types::QuestCommandStep;
    use chrono::Duration;

    fn fresh_step(start: DateTime<Utc>) -> PlayerQuestStep {
        let def = QuestCommandStep::new("q", 1, "init", "git init");
        let mut step = PlayerQuestStep::new("pq", &def);
        activate_step(&mut step, start);
        step
    }

    fn verdict(status: StepStatus) -> StepValidation {
        StepValidation {
            success: status != StepStatus::Failed,
            message: "nope".to_string(),
            status,
            matches: Vec::new(),
            failure: (status != StepStatus::Completed).then_some(FailureKind::NoMatch),
        }
    }

    #[test]
    fn flawless_first_attempt() {
        let scoring = ScoringConfig::default();
        let start = Utc::now();
        let step = fresh_step(start);
        assert_eq!(step.status, StepStatus::InProgress);

        let update = apply_submission(
            &step,
            &verdict(StepStatus::Completed),
            "git init",
            start + Duration::seconds(30),
            &scoring,
        );
        assert!(!update.replay);
        assert_eq!(update.step.status, StepStatus::Completed);
        assert_eq!(update.step.attempts, 1);
        assert_eq!(update.step.time_spent, 30);
        assert_eq!(update.step.bonus_points, 50);
        assert_eq!(update.step.score, 150);
        assert_eq!(update.score_delta, scoring.flawless_score());
    }

    #[test]
    fn failures_then_success_scores_less() {
        let scoring = ScoringConfig::default();
        let start = Utc::now();
        let mut step = fresh_step(start);
        for i in 0..2 {
            let update = apply_submission(
                &step,
                &verdict(StepStatus::Failed),
                "git nit",
                start + Duration::seconds(i),
                &scoring,
            );
            assert_eq!(update.score_delta, 0);
            step = update.step;
        }
        assert_eq!(step.status, StepStatus::Failed);
        assert_eq!(step.failed_attempts.len(), 2);
        assert_eq!(step.failed_attempts[0].error.as_deref(), Some("nope"));

        let update = apply_submission(
            &step,
            &verdict(StepStatus::Completed),
            "git init",
            start + Duration::seconds(10),
            &scoring,
        );
        assert_eq!(update.step.attempts, 3);
        assert_eq!(update.step.score, 80 + 50);
        assert!(update.step.score < scoring.flawless_score());
        assert_eq!(
            update.step.attempts as usize,
            update.step.failed_attempts.len() + 1
        );
    }

    #[test]
    fn bonus_decays_after_target() {
        let scoring = ScoringConfig::default();
        assert_eq!(time_bonus(0, &scoring), 50);
        assert_eq!(time_bonus(60, &scoring), 50);
        assert_eq!(time_bonus(69, &scoring), 50);
        assert_eq!(time_bonus(70, &scoring), 49);
        assert_eq!(time_bonus(160, &scoring), 40);
        assert_eq!(time_bonus(10_000, &scoring), 0);
    }

    #[test]
    fn penalty_is_monotonic_and_floored() {
        let scoring = ScoringConfig::default();
        let mut last = u32::MAX;
        for failures in 0..20 {
            let points = base_points(failures, &scoring);
            assert!(points <= last);
            last = points;
        }
        assert_eq!(base_points(0, &scoring), 100);
        assert_eq!(base_points(3, &scoring), 70);
        assert_eq!(base_points(50, &scoring), scoring.min_base_points);
    }

    #[test]
    fn huge_point_values_saturate() {
        let scoring = ScoringConfig {
            base_points: u32::MAX,
            ..ScoringConfig::default()
        };
        let now = Utc::now();
        let step = fresh_step(now);
        let update = apply_submission(&step, &verdict(StepStatus::Completed), "git init", now, &scoring);
        assert_eq!(update.step.score, u32::MAX);
        assert_eq!(update.score_delta, u32::MAX);
    }

    #[test]
    fn future_start_time_is_clamped() {
        let now = Utc::now();
        assert_eq!(elapsed_seconds(Some(now + Duration::seconds(30)), now), 0);
        assert_eq!(elapsed_seconds(None, now), 0);
        assert_eq!(elapsed_seconds(Some(now - Duration::milliseconds(2500)), now), 2);
    }

    #[test]
    fn skipped_records_failure_without_score() {
        let scoring = ScoringConfig::default();
        let now = Utc::now();
        let step = fresh_step(now);
        let update = apply_submission(&step, &verdict(StepStatus::Skipped), "git push", now, &scoring);
        assert_eq!(update.step.status, StepStatus::Skipped);
        assert_eq!(update.step.attempts, 1);
        assert_eq!(update.step.failed_attempts.len(), 1);
        assert_eq!(update.step.failed_attempts[0].error.as_deref(), Some("NO_MATCH"));
        assert_eq!(update.score_delta, 0);
    }

    #[test]
    fn replay_on_completed_step_only_counts() {
        let scoring = ScoringConfig::default();
        let now = Utc::now();
        let step = fresh_step(now);
        let done = apply_submission(&step, &verdict(StepStatus::Completed), "git init", now, &scoring).step;

        let again = apply_submission(
            &done,
            &verdict(StepStatus::Completed),
            "git init",
            now + Duration::seconds(5),
            &scoring,
        );
        assert!(again.replay);
        assert_eq!(again.step.attempts, 2);
        assert_eq!(again.step.score, done.score);
        assert_eq!(again.step.executed_at, done.executed_at);
        assert_eq!(again.score_delta, 0);
    }

    #[test]
    fn needs_help_keeps_timer_running() {
        let start = Utc::now();
        let mut step = fresh_step(start);
        assert!(mark_needs_help(&mut step, start + Duration::seconds(5)));
        assert_eq!(step.status, StepStatus::NeedsHelp);
        assert_eq!(step.start_time, Some(start));

        step.status = StepStatus::Completed;
        assert!(!mark_needs_help(&mut step, start));
    }

    #[test]
    fn activation_only_from_pending() {
        let start = Utc::now();
        let mut step = fresh_step(start);
        activate_step(&mut step, start + Duration::seconds(100));
        assert_eq!(step.start_time, Some(start));
    }
}
