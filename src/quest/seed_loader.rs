//! Seed data loaders for data-driven content initialization
//!
//! Worlds, their quests and the command steps of each quest are described in
//! JSON (see `data/seeds/worlds.json`, which is also compiled in as the
//! built-in seed). Patterns are compiled while loading so an authoring mistake
//! is reported before any player meets it.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::command::pattern::compile_pattern;
use crate::quest::errors::QuestError;
use crate::quest::types::{QuestCommandStep, QuestRecord, WorldRecord};
use crate::validation::validate_identifier;

const CANONICAL_SEED: &str = include_str!("../../data/seeds/worlds.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSeed {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub position: u32,
    #[serde(default)]
    pub quests: Vec<QuestSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestSeed {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: u8,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    pub steps: Vec<StepSeed>,
}

fn default_difficulty() -> u8 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSeed {
    pub command_name: String,
    pub pattern: String,
    #[serde(default)]
    pub description: String,
    /// Display form of the expected command; defaults to the pattern
    #[serde(default)]
    pub expected: Option<String>,
    #[serde(default)]
    pub hint: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub success_message: String,
    #[serde(default)]
    pub ignore_flags: Option<bool>,
}

impl WorldSeed {
    /// Convert to storage records, checking ids and patterns.
    pub fn to_records(&self) -> Result<(WorldRecord, Vec<QuestRecord>), QuestError> {
        validate_identifier(&self.id)
            .map_err(|e| QuestError::InvalidData(format!("world {}: {}", self.id, e)))?;

        let mut world = WorldRecord::new(&self.id, &self.name, &self.description, self.position);
        let mut quests = Vec::with_capacity(self.quests.len());
        for seed in &self.quests {
            let quest = seed.to_record(&self.id)?;
            world = world.with_quest(&quest.id);
            quests.push(quest);
        }
        Ok((world, quests))
    }
}

impl QuestSeed {
    pub fn to_record(&self, world_id: &str) -> Result<QuestRecord, QuestError> {
        validate_identifier(&self.id)
            .map_err(|e| QuestError::InvalidData(format!("quest {}: {}", self.id, e)))?;
        if self.steps.is_empty() {
            return Err(QuestError::InvalidData(format!(
                "quest {} has no steps",
                self.id
            )));
        }

        let mut quest = QuestRecord::new(
            &self.id,
            world_id,
            &self.name,
            &self.description,
            self.difficulty,
        );
        for prereq in &self.prerequisites {
            quest = quest.with_prerequisite(prereq);
        }
        for (idx, step) in self.steps.iter().enumerate() {
            compile_pattern(&step.pattern).map_err(|e| {
                QuestError::InvalidData(format!("quest {} step {}: {}", self.id, idx + 1, e))
            })?;
            quest = quest.with_step(step.to_step());
        }
        Ok(quest)
    }
}

impl StepSeed {
    fn to_step(&self) -> QuestCommandStep {
        let mut step = QuestCommandStep::new("", 0, &self.command_name, &self.pattern)
            .with_description(&self.description)
            .with_hint(&self.hint)
            .with_success_message(&self.success_message);
        if let Some(expected) = &self.expected {
            step = step.with_expected_pattern(expected);
        }
        if let Some(ignore) = self.ignore_flags {
            step = step.with_ignore_flags(ignore);
        }
        if self.optional {
            step = step.optional();
        }
        step
    }
}

/// Parse worlds from JSON text; `origin` names the source in errors.
pub fn parse_worlds(json: &str, origin: &str) -> Result<Vec<WorldSeed>, QuestError> {
    let worlds: Vec<WorldSeed> = serde_json::from_str(json).map_err(|source| QuestError::Seed {
        path: origin.to_string(),
        source,
    })?;
    check_prerequisites(&worlds)?;
    Ok(worlds)
}

/// Load worlds from a JSON seed file
pub fn load_worlds_from_json<P: AsRef<Path>>(path: P) -> Result<Vec<WorldSeed>, QuestError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    parse_worlds(&contents, &path.display().to_string())
}

/// Built-in worlds shipped with the binary.
pub fn canonical_seed() -> Result<Vec<WorldSeed>, QuestError> {
    parse_worlds(CANONICAL_SEED, "data/seeds/worlds.json")
}

fn check_prerequisites(worlds: &[WorldSeed]) -> Result<(), QuestError> {
    let known: Vec<&str> = worlds
        .iter()
        .flat_map(|w| w.quests.iter().map(|q| q.id.as_str()))
        .collect();
    for quest in worlds.iter().flat_map(|w| w.quests.iter()) {
        if let Some(missing) = quest
            .prerequisites
            .iter()
            .find(|p| !known.contains(&p.as_str()))
        {
            return Err(QuestError::InvalidData(format!(
                "quest {} requires unknown quest {}",
                quest.id, missing
            )));
        }
    }
    Ok(())
}
