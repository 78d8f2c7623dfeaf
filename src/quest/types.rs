use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const WORLD_SCHEMA_VERSION: u8 = 1;
pub const QUEST_SCHEMA_VERSION: u8 = 1;
pub const PLAYER_SCHEMA_VERSION: u8 = 1;
pub const PROGRESS_SCHEMA_VERSION: u8 = 1;

/// Status of one player's attempt at one quest step.
///
/// `Pending -> {InProgress, NeedsHelp} -> {Completed, Failed, Skipped}`.
/// A submission after `Failed` retries the step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Pending,
    InProgress,
    NeedsHelp,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    /// Completed and skipped steps accept no further progress.
    pub fn is_finished(self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Skipped)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Pending => "PENDING",
            StepStatus::InProgress => "IN_PROGRESS",
            StepStatus::NeedsHelp => "NEEDS_HELP",
            StepStatus::Completed => "COMPLETED",
            StepStatus::Failed => "FAILED",
            StepStatus::Skipped => "SKIPPED",
        }
    }
}

impl Default for StepStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rolled-up status of a player's quest.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestStatus {
    NotStarted,
    Starting,
    InProgress,
    Stuck,
    ReviewNeeded,
    Completed,
    Abandoned,
}

impl QuestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, QuestStatus::Completed | QuestStatus::Abandoned)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QuestStatus::NotStarted => "NOT_STARTED",
            QuestStatus::Starting => "STARTING",
            QuestStatus::InProgress => "IN_PROGRESS",
            QuestStatus::Stuck => "STUCK",
            QuestStatus::ReviewNeeded => "REVIEW_NEEDED",
            QuestStatus::Completed => "COMPLETED",
            QuestStatus::Abandoned => "ABANDONED",
        }
    }
}

impl Default for QuestStatus {
    fn default() -> Self {
        Self::NotStarted
    }
}

impl fmt::Display for QuestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A themed collection of quests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorldRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Display order among worlds
    pub position: u32,
    pub quest_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl WorldRecord {
    pub fn new(id: &str, name: &str, description: &str, position: u32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            position,
            quest_ids: Vec::new(),
            created_at: Utc::now(),
            schema_version: WORLD_SCHEMA_VERSION,
        }
    }

    pub fn with_quest(mut self, quest_id: &str) -> Self {
        self.quest_ids.push(quest_id.to_string());
        self
    }
}

/// One expected git command within a quest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestCommandStep {
    pub id: String,
    pub quest_id: String,
    /// 1-based, unique within the quest
    pub step_number: u32,
    /// Git sub-command the step is about, e.g. `commit`
    pub command_name: String,
    /// Pattern the submitted command must match
    pub command_regex: String,
    pub description: String,
    /// Human readable form of the expected command
    pub expected_pattern: String,
    pub hint: String,
    #[serde(default)]
    pub is_optional: bool,
    pub success_message: String,
    /// Overrides the validator's default flag handling when set
    #[serde(default)]
    pub ignore_flags: Option<bool>,
}

impl QuestCommandStep {
    pub fn new(quest_id: &str, step_number: u32, command_name: &str, command_regex: &str) -> Self {
        Self {
            id: Self::make_id(quest_id, step_number),
            quest_id: quest_id.to_string(),
            step_number,
            command_name: command_name.to_string(),
            command_regex: command_regex.to_string(),
            description: String::new(),
            expected_pattern: command_regex.to_string(),
            hint: String::new(),
            is_optional: false,
            success_message: String::new(),
            ignore_flags: None,
        }
    }

    pub fn make_id(quest_id: &str, step_number: u32) -> String {
        format!("{}-step-{}", quest_id, step_number)
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_expected_pattern(mut self, expected: &str) -> Self {
        self.expected_pattern = expected.to_string();
        self
    }

    pub fn with_hint(mut self, hint: &str) -> Self {
        self.hint = hint.to_string();
        self
    }

    pub fn with_success_message(mut self, message: &str) -> Self {
        self.success_message = message.to_string();
        self
    }

    pub fn with_ignore_flags(mut self, ignore: bool) -> Self {
        self.ignore_flags = Some(ignore);
        self
    }

    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }
}

/// Quest template: an ordered sequence of command steps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestRecord {
    pub id: String,
    pub world_id: String,
    pub name: String,
    pub description: String,
    pub difficulty: u8, // 1-5 difficulty rating
    #[serde(default)]
    pub prerequisites: Vec<String>, // Quest IDs that must be complete
    pub steps: Vec<QuestCommandStep>,
    pub created_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl QuestRecord {
    pub fn new(id: &str, world_id: &str, name: &str, description: &str, difficulty: u8) -> Self {
        Self {
            id: id.to_string(),
            world_id: world_id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            difficulty: difficulty.clamp(1, 5),
            prerequisites: Vec::new(),
            steps: Vec::new(),
            created_at: Utc::now(),
            schema_version: QUEST_SCHEMA_VERSION,
        }
    }

    /// Append a step, renumbering it to follow the existing ones.
    pub fn with_step(mut self, mut step: QuestCommandStep) -> Self {
        let number = self.steps.len() as u32 + 1;
        step.quest_id = self.id.clone();
        step.step_number = number;
        step.id = QuestCommandStep::make_id(&self.id, number);
        self.steps.push(step);
        self
    }

    pub fn with_prerequisite(mut self, quest_id: &str) -> Self {
        self.prerequisites.push(quest_id.to_string());
        self
    }

    pub fn step(&self, step_id: &str) -> Option<&QuestCommandStep> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    pub fn required_step_count(&self) -> usize {
        self.steps.iter().filter(|s| !s.is_optional).count()
    }
}

/// A registered player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerRecord {
    pub username: String,
    pub display_name: String,
    #[serde(default)]
    pub total_score: u64,
    #[serde(default)]
    pub completed_quests: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl PlayerRecord {
    pub fn new(username: &str, display_name: &str) -> Self {
        let now = Utc::now();
        Self {
            username: username.to_string(),
            display_name: display_name.to_string(),
            total_score: 0,
            completed_quests: Vec::new(),
            created_at: now,
            updated_at: now,
            schema_version: PLAYER_SCHEMA_VERSION,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn has_completed(&self, quest_id: &str) -> bool {
        self.completed_quests.iter().any(|q| q == quest_id)
    }
}

/// A rejected submission kept for review.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailedAttempt {
    pub command: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One player's progress on one quest step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerQuestStep {
    pub id: String,
    pub player_quest_id: String,
    pub quest_command_step_id: String,
    pub step_number: u32,
    pub status: StepStatus,
    pub start_time: Option<DateTime<Utc>>,
    /// Seconds between activation and the successful submission
    pub time_spent: u64,
    pub attempts: u32,
    pub failed_attempts: Vec<FailedAttempt>,
    pub score: u32,
    pub bonus_points: u32,
    pub executed_at: Option<DateTime<Utc>>,
}

impl PlayerQuestStep {
    pub fn new(player_quest_id: &str, step: &QuestCommandStep) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            player_quest_id: player_quest_id.to_string(),
            quest_command_step_id: step.id.clone(),
            step_number: step.step_number,
            status: StepStatus::Pending,
            start_time: None,
            time_spent: 0,
            attempts: 0,
            failed_attempts: Vec::new(),
            score: 0,
            bonus_points: 0,
            executed_at: None,
        }
    }
}

/// A player's run through one quest, with one step row per quest step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerQuestRecord {
    pub id: String,
    pub username: String,
    pub world_id: String,
    pub quest_id: String,
    pub status: QuestStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub steps: Vec<PlayerQuestStep>,
    pub schema_version: u8,
}

impl PlayerQuestRecord {
    /// Fresh record with every step `Pending` and status `Starting`.
    pub fn new(username: &str, quest: &QuestRecord, started_at: DateTime<Utc>) -> Self {
        let id = Uuid::new_v4().to_string();
        let steps = quest
            .steps
            .iter()
            .map(|step| PlayerQuestStep::new(&id, step))
            .collect();
        Self {
            id,
            username: username.to_string(),
            world_id: quest.world_id.clone(),
            quest_id: quest.id.clone(),
            status: QuestStatus::Starting,
            started_at,
            completed_at: None,
            steps,
            schema_version: PROGRESS_SCHEMA_VERSION,
        }
    }

    pub fn score(&self) -> u64 {
        self.steps.iter().map(|s| u64::from(s.score)).sum()
    }

    pub fn step(&self, step_id: &str) -> Option<&PlayerQuestStep> {
        self.steps.iter().find(|s| s.quest_command_step_id == step_id)
    }

    pub fn step_index(&self, step_id: &str) -> Option<usize> {
        self.steps
            .iter()
            .position(|s| s.quest_command_step_id == step_id)
    }
}
