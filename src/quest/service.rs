//! Quest progress service: registration, quest lifecycle and command submission.
//!
//! The service owns a repository, a command validator and the scoring rules.
//! Each public operation reads what it needs, applies the step engine and the
//! rollup, and writes the player-quest record back within the same call.
//! Operations taking a clock reading have an `_at` variant so tests can pin time.

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::command::validator::{CommandValidator, QuestStepInput, StepValidation};
use crate::config::{Config, ScoringConfig};
use crate::logutil::LogContext;
use crate::quest::errors::QuestError;
use crate::quest::progress;
use crate::quest::repository::QuestRepository;
use crate::quest::rollup::{current_step, rollup};
use crate::quest::types::{
    PlayerQuestRecord, PlayerQuestStep, PlayerRecord, QuestCommandStep, QuestRecord, QuestStatus,
    StepStatus, WorldRecord,
};
use crate::validation::validate_username;

/// Outcome of one command submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub validation: StepValidation,
    /// Step state after the submission
    pub step: PlayerQuestStep,
    pub quest_status: QuestStatus,
    pub quest_score: u64,
    /// Step the player should work on next, if any
    pub next_step: Option<QuestCommandStep>,
    pub replay: bool,
    /// This submission finished the quest
    pub quest_completed: bool,
}

/// What a player sees after asking for help.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HintResponse {
    pub step_id: String,
    pub step_number: u32,
    pub description: String,
    pub hint: String,
    pub expected_pattern: String,
}

pub struct QuestService<R: QuestRepository> {
    repo: R,
    validator: CommandValidator,
    scoring: ScoringConfig,
    stuck_threshold: usize,
}

impl<R: QuestRepository> QuestService<R> {
    pub fn new(repo: R, validator: CommandValidator, config: &Config) -> Self {
        Self {
            repo,
            validator,
            scoring: config.scoring.clone(),
            stuck_threshold: config.validation.stuck_threshold,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn validator(&self) -> &CommandValidator {
        &self.validator
    }

    /// Register a new player. Usernames are unique ignoring case.
    pub fn register_player(
        &self,
        username: &str,
        display_name: Option<&str>,
    ) -> Result<PlayerRecord, QuestError> {
        let username = validate_username(username)?;
        if self.repo.player_exists(&username)? {
            return Err(QuestError::InvalidState(format!(
                "username {} is already taken",
                username
            )));
        }
        let player = PlayerRecord::new(&username, display_name.unwrap_or(&username));
        self.repo.put_player(player.clone())?;
        info!("registered player {}", LogContext::new().with("user", &username));
        Ok(player)
    }

    pub fn list_worlds(&self) -> Result<Vec<WorldRecord>, QuestError> {
        self.repo.list_worlds()
    }

    /// Quests of a world in authoring order.
    pub fn quests_in_world(&self, world_id: &str) -> Result<Vec<QuestRecord>, QuestError> {
        let world = self.repo.get_world(world_id)?;
        world
            .quest_ids
            .iter()
            .map(|id| self.repo.get_quest(id))
            .collect()
    }

    /// Check if player can start a quest (prerequisites met, not active or completed)
    pub fn can_start_quest(&self, username: &str, quest_id: &str) -> Result<bool, QuestError> {
        let player = self.repo.get_player(username)?;
        let quest = self.repo.get_quest(quest_id)?;
        Ok(self.start_blocker(&player, &quest)?.is_none())
    }

    fn start_blocker(
        &self,
        player: &PlayerRecord,
        quest: &QuestRecord,
    ) -> Result<Option<String>, QuestError> {
        if let Some(existing) = self.repo.get_player_quest(&player.username, &quest.id)? {
            match existing.status {
                QuestStatus::Abandoned => {}
                QuestStatus::Completed => {
                    return Ok(Some(format!("quest {} is already completed", quest.id)))
                }
                _ => return Ok(Some(format!("quest {} is already in progress", quest.id))),
            }
        }
        let missing: Vec<&str> = quest
            .prerequisites
            .iter()
            .filter(|id| !player.has_completed(id))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Ok(Some(format!(
                "quest {} requires {} first",
                quest.id,
                missing.join(", ")
            )));
        }
        Ok(None)
    }

    pub fn start_quest(
        &self,
        username: &str,
        quest_id: &str,
    ) -> Result<PlayerQuestRecord, QuestError> {
        self.start_quest_at(username, quest_id, Utc::now())
    }

    /// Start (or restart an abandoned) quest. The first step becomes active.
    pub fn start_quest_at(
        &self,
        username: &str,
        quest_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PlayerQuestRecord, QuestError> {
        let player = self.repo.get_player(username)?;
        let quest = self.repo.get_quest(quest_id)?;
        if let Some(reason) = self.start_blocker(&player, &quest)? {
            return Err(QuestError::InvalidState(reason));
        }
        if quest.steps.is_empty() {
            return Err(QuestError::InvalidData(format!("quest {} has no steps", quest.id)));
        }

        let mut record = PlayerQuestRecord::new(&player.username, &quest, now);
        progress::activate_step(&mut record.steps[0], now);
        self.repo.put_player_quest(record.clone())?;
        info!(
            "quest started {}",
            LogContext::new()
                .with("user", &player.username)
                .with("quest", &quest.id)
        );
        Ok(record)
    }

    pub fn submit_command(
        &self,
        username: &str,
        quest_id: &str,
        command: &str,
    ) -> Result<SubmissionResult, QuestError> {
        self.submit_command_at(username, quest_id, command, Utc::now())
    }

    /// Submit a command for the quest's current step.
    pub fn submit_command_at(
        &self,
        username: &str,
        quest_id: &str,
        command: &str,
        now: DateTime<Utc>,
    ) -> Result<SubmissionResult, QuestError> {
        let record = self.active_record(username, quest_id)?;
        let idx = current_step(&record.steps).ok_or_else(|| {
            QuestError::InvalidState(format!("quest {} has no step left to solve", quest_id))
        })?;
        let step_id = record.steps[idx].quest_command_step_id.clone();
        self.submit_step_at(username, quest_id, &step_id, command, now)
    }

    pub fn submit_step(
        &self,
        username: &str,
        quest_id: &str,
        step_id: &str,
        command: &str,
    ) -> Result<SubmissionResult, QuestError> {
        self.submit_step_at(username, quest_id, step_id, command, Utc::now())
    }

    /// Submit a command for an explicit step.
    ///
    /// Only the current step accepts new work. A completed step may be
    /// submitted again; that counts an attempt and changes nothing else.
    pub fn submit_step_at(
        &self,
        username: &str,
        quest_id: &str,
        step_id: &str,
        command: &str,
        now: DateTime<Utc>,
    ) -> Result<SubmissionResult, QuestError> {
        let quest = self.repo.get_quest(quest_id)?;
        let mut record = self.active_record(username, quest_id)?;
        let definition = self.quest_step(quest_id, step_id)?;
        let idx = record.step_index(step_id).ok_or_else(|| {
            QuestError::InvalidData(format!("progress for {} has no row for step {}", quest_id, step_id))
        })?;

        let prior_status = record.steps[idx].status;
        match prior_status {
            StepStatus::Completed => {}
            StepStatus::Skipped => {
                return Err(QuestError::InvalidState(format!(
                    "step {} was skipped",
                    step_id
                )))
            }
            _ if record.status == QuestStatus::Completed => {
                return Err(QuestError::InvalidState(format!(
                    "quest {} is already completed",
                    quest_id
                )))
            }
            _ => {
                if current_step(&record.steps) != Some(idx) {
                    let expected = current_step(&record.steps)
                        .map(|i| record.steps[i].quest_command_step_id.clone())
                        .unwrap_or_default();
                    return Err(QuestError::InvalidState(format!(
                        "step {} is not the current step (expected {})",
                        step_id, expected
                    )));
                }
            }
        }

        let verdict = self.validator.validate_quest_step(QuestStepInput {
            quest_id,
            step_id,
            command,
            step: &definition,
        });
        let update =
            progress::apply_submission(&record.steps[idx], &verdict, command, now, &self.scoring);
        let replay = update.replay;
        record.steps[idx] = update.step;

        if !replay && record.steps[idx].status.is_finished() {
            if let Some(next) = record.steps.get_mut(idx + 1) {
                progress::activate_step(next, now);
            }
        }

        let previous = record.status;
        record.status = rollup(previous, &record.steps, &quest, self.stuck_threshold);
        let quest_completed = previous != QuestStatus::Completed && record.status == QuestStatus::Completed;
        if quest_completed {
            record.completed_at = Some(now);
        }

        let ctx = LogContext::new()
            .with("user", username)
            .with("quest", quest_id)
            .with("step", step_id)
            .with("status", record.steps[idx].status)
            .with("attempts", record.steps[idx].attempts);
        if replay {
            debug!("replayed step {}", ctx);
        } else {
            info!("step submission {}", ctx);
        }
        if previous != record.status {
            info!(
                "quest status {} -> {} {}",
                previous,
                record.status,
                LogContext::new().with("user", username).with("quest", quest_id)
            );
        }

        let next_step = current_step(&record.steps)
            .filter(|_| !record.status.is_terminal())
            .and_then(|i| quest.step(&record.steps[i].quest_command_step_id))
            .cloned();
        let result = SubmissionResult {
            validation: verdict,
            step: record.steps[idx].clone(),
            quest_status: record.status,
            quest_score: record.score(),
            next_step,
            replay,
            quest_completed,
        };
        self.repo.put_player_quest(record.clone())?;
        if quest_completed {
            self.credit_player(username, &record)?;
        }
        Ok(result)
    }

    /// Add a completed quest's score to the player. A quest is credited once.
    fn credit_player(&self, username: &str, record: &PlayerQuestRecord) -> Result<(), QuestError> {
        let mut player = self.repo.get_player(username)?;
        if player.has_completed(&record.quest_id) {
            debug!(
                "quest already credited {}",
                LogContext::new()
                    .with("user", &player.username)
                    .with("quest", &record.quest_id)
            );
            return Ok(());
        }
        player.total_score = player.total_score.saturating_add(record.score());
        player.completed_quests.push(record.quest_id.clone());
        info!(
            "quest completed {}",
            LogContext::new()
                .with("user", &player.username)
                .with("quest", &record.quest_id)
                .with("score", record.score())
                .with("total", player.total_score)
        );
        self.repo.put_player(player)
    }

    pub fn request_hint(&self, username: &str, quest_id: &str) -> Result<HintResponse, QuestError> {
        self.request_hint_at(username, quest_id, Utc::now())
    }

    /// Flag the current step as needing help and return its hint.
    pub fn request_hint_at(
        &self,
        username: &str,
        quest_id: &str,
        now: DateTime<Utc>,
    ) -> Result<HintResponse, QuestError> {
        let quest = self.repo.get_quest(quest_id)?;
        let mut record = self.active_record(username, quest_id)?;
        if record.status == QuestStatus::Completed {
            return Err(QuestError::InvalidState(format!(
                "quest {} is already completed",
                quest_id
            )));
        }
        let idx = current_step(&record.steps).ok_or_else(|| {
            QuestError::InvalidState(format!("quest {} has no step left to solve", quest_id))
        })?;
        let step_id = record.steps[idx].quest_command_step_id.clone();
        let definition = self.quest_step(quest_id, &step_id)?;

        progress::mark_needs_help(&mut record.steps[idx], now);
        record.status = rollup(record.status, &record.steps, &quest, self.stuck_threshold);
        info!(
            "hint requested {}",
            LogContext::new()
                .with("user", username)
                .with("quest", quest_id)
                .with("step", &step_id)
        );

        let response = HintResponse {
            step_id,
            step_number: definition.step_number,
            description: definition.description.clone(),
            hint: definition.hint.clone(),
            expected_pattern: definition.expected_pattern.clone(),
        };
        self.repo.put_player_quest(record)?;
        Ok(response)
    }

    /// Abandon a quest that is not completed yet.
    pub fn abandon_quest(
        &self,
        username: &str,
        quest_id: &str,
    ) -> Result<PlayerQuestRecord, QuestError> {
        let mut record = self.active_record(username, quest_id)?;
        if record.status == QuestStatus::Completed {
            return Err(QuestError::InvalidState(format!(
                "quest {} is already completed",
                quest_id
            )));
        }
        record.status = QuestStatus::Abandoned;
        self.repo.put_player_quest(record.clone())?;
        info!(
            "quest abandoned {}",
            LogContext::new().with("user", username).with("quest", quest_id)
        );
        Ok(record)
    }

    /// The player's record for a quest, in any status.
    pub fn quest_status(
        &self,
        username: &str,
        quest_id: &str,
    ) -> Result<PlayerQuestRecord, QuestError> {
        self.repo
            .get_player_quest(username, quest_id)?
            .ok_or_else(|| {
                QuestError::NotFound(format!("progress: {} on {}", username, quest_id))
            })
    }

    /// `(completed, total)` quests of a world for a player.
    pub fn world_progress(&self, username: &str, world_id: &str) -> Result<(usize, usize), QuestError> {
        let player = self.repo.get_player(username)?;
        let world = self.repo.get_world(world_id)?;
        let completed = world
            .quest_ids
            .iter()
            .filter(|id| player.has_completed(id))
            .count();
        Ok((completed, world.quest_ids.len()))
    }

    /// Players by total score, highest first; ties by username.
    pub fn leaderboard(&self, limit: usize) -> Result<Vec<PlayerRecord>, QuestError> {
        let mut players = self.repo.list_players()?;
        players.sort_by(|a, b| {
            b.total_score
                .cmp(&a.total_score)
                .then_with(|| a.username.to_lowercase().cmp(&b.username.to_lowercase()))
        });
        players.truncate(limit);
        Ok(players)
    }

    /// Record for a started quest that has not been abandoned.
    fn active_record(&self, username: &str, quest_id: &str) -> Result<PlayerQuestRecord, QuestError> {
        self.repo.get_player(username)?;
        match self.repo.get_player_quest(username, quest_id)? {
            None => Err(QuestError::InvalidState(format!(
                "quest {} has not been started",
                quest_id
            ))),
            Some(record) if record.status == QuestStatus::Abandoned => Err(
                QuestError::InvalidState(format!("quest {} was abandoned", quest_id)),
            ),
            Some(record) => Ok(record),
        }
    }

    fn quest_step(&self, quest_id: &str, step_id: &str) -> Result<QuestCommandStep, QuestError> {
        let step = self.repo.get_step(step_id)?;
        if step.quest_id != quest_id {
            return Err(QuestError::NotFound(format!(
                "step {} in quest {}",
                step_id, quest_id
            )));
        }
        Ok(step)
    }
}

/// Render a player's quest progress for the terminal.
pub fn format_quest_status(quest: &QuestRecord, record: &PlayerQuestRecord) -> String {
    let current = if record.status.is_terminal() {
        None
    } else {
        current_step(&record.steps)
    };
    let mut out = format!(
        "{} [{}] score {}\n",
        quest.name,
        record.status,
        record.score()
    );
    for (idx, step) in record.steps.iter().enumerate() {
        let definition = quest.step(&step.quest_command_step_id);
        let marker = match step.status {
            StepStatus::Completed => 'x',
            StepStatus::Skipped => '-',
            _ if current == Some(idx) => '>',
            _ => ' ',
        };
        let label = definition
            .map(|d| {
                if d.description.is_empty() {
                    d.expected_pattern.clone()
                } else {
                    d.description.clone()
                }
            })
            .unwrap_or_else(|| step.quest_command_step_id.clone());
        let optional = if definition.map(|d| d.is_optional).unwrap_or(false) {
            " (optional)"
        } else {
            ""
        };
        out.push_str(&format!(
            "  [{}] {}. {}{} - {}",
            marker, step.step_number, label, optional, step.status
        ));
        if step.attempts > 0 {
            let plural = if step.attempts == 1 { "" } else { "s" };
            out.push_str(&format!(", {} attempt{}", step.attempts, plural));
        }
        if step.status == StepStatus::Completed {
            out.push_str(&format!(", {} pts ({}s)", step.score, step.time_spent));
        }
        out.push('\n');
    }
    out
}
