//! Persistence seam for the quest-progress service.
//!
//! [`QuestRepository`] is what the service needs from storage: step and quest
//! lookup, player lookup, and read/write of a player's quest progress. The
//! sled-backed [`crate::quest::storage::GitQuestStore`] implements it for real
//! use; [`MemoryRepository`] is an isolated in-process double for tests.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::quest::errors::QuestError;
use crate::quest::types::{
    PlayerQuestRecord, PlayerRecord, QuestCommandStep, QuestRecord, WorldRecord,
};

pub trait QuestRepository {
    fn put_world(&self, world: WorldRecord) -> Result<(), QuestError>;
    fn get_world(&self, world_id: &str) -> Result<WorldRecord, QuestError>;
    /// All worlds ordered by `position`.
    fn list_worlds(&self) -> Result<Vec<WorldRecord>, QuestError>;

    fn put_quest(&self, quest: QuestRecord) -> Result<(), QuestError>;
    fn get_quest(&self, quest_id: &str) -> Result<QuestRecord, QuestError>;
    fn list_quest_ids(&self) -> Result<Vec<String>, QuestError>;

    fn put_player(&self, player: PlayerRecord) -> Result<(), QuestError>;
    fn get_player(&self, username: &str) -> Result<PlayerRecord, QuestError>;
    fn list_players(&self) -> Result<Vec<PlayerRecord>, QuestError>;

    fn get_player_quest(
        &self,
        username: &str,
        quest_id: &str,
    ) -> Result<Option<PlayerQuestRecord>, QuestError>;
    fn put_player_quest(&self, record: PlayerQuestRecord) -> Result<(), QuestError>;
    fn list_player_quests(&self, username: &str) -> Result<Vec<PlayerQuestRecord>, QuestError>;

    /// Look a step up by id across all quests.
    fn get_step(&self, step_id: &str) -> Result<QuestCommandStep, QuestError> {
        for quest_id in self.list_quest_ids()? {
            let quest = self.get_quest(&quest_id)?;
            if let Some(step) = quest.step(step_id) {
                return Ok(step.clone());
            }
        }
        Err(QuestError::NotFound(format!("step: {}", step_id)))
    }

    fn player_exists(&self, username: &str) -> Result<bool, QuestError> {
        match self.get_player(username) {
            Ok(_) => Ok(true),
            Err(QuestError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[derive(Default)]
struct MemoryState {
    worlds: BTreeMap<String, WorldRecord>,
    quests: BTreeMap<String, QuestRecord>,
    players: BTreeMap<String, PlayerRecord>,
    progress: BTreeMap<(String, String), PlayerQuestRecord>,
}

/// In-memory repository; every instance is independent.
#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, QuestError> {
        self.state
            .lock()
            .map_err(|_| QuestError::Internal("memory repository lock poisoned".to_string()))
    }
}

fn player_key(username: &str) -> String {
    username.to_lowercase()
}

impl QuestRepository for MemoryRepository {
    fn put_world(&self, world: WorldRecord) -> Result<(), QuestError> {
        self.lock()?.worlds.insert(world.id.clone(), world);
        Ok(())
    }

    fn get_world(&self, world_id: &str) -> Result<WorldRecord, QuestError> {
        self.lock()?
            .worlds
            .get(world_id)
            .cloned()
            .ok_or_else(|| QuestError::NotFound(format!("world: {}", world_id)))
    }

    fn list_worlds(&self) -> Result<Vec<WorldRecord>, QuestError> {
        let mut worlds: Vec<WorldRecord> = self.lock()?.worlds.values().cloned().collect();
        worlds.sort_by_key(|w| w.position);
        Ok(worlds)
    }

    fn put_quest(&self, quest: QuestRecord) -> Result<(), QuestError> {
        self.lock()?.quests.insert(quest.id.clone(), quest);
        Ok(())
    }

    fn get_quest(&self, quest_id: &str) -> Result<QuestRecord, QuestError> {
        self.lock()?
            .quests
            .get(quest_id)
            .cloned()
            .ok_or_else(|| QuestError::NotFound(format!("quest: {}", quest_id)))
    }

    fn list_quest_ids(&self) -> Result<Vec<String>, QuestError> {
        Ok(self.lock()?.quests.keys().cloned().collect())
    }

    fn put_player(&self, mut player: PlayerRecord) -> Result<(), QuestError> {
        player.touch();
        self.lock()?
            .players
            .insert(player_key(&player.username), player);
        Ok(())
    }

    fn get_player(&self, username: &str) -> Result<PlayerRecord, QuestError> {
        self.lock()?
            .players
            .get(&player_key(username))
            .cloned()
            .ok_or_else(|| QuestError::NotFound(format!("player: {}", username)))
    }

    fn list_players(&self) -> Result<Vec<PlayerRecord>, QuestError> {
        Ok(self.lock()?.players.values().cloned().collect())
    }

    fn get_player_quest(
        &self,
        username: &str,
        quest_id: &str,
    ) -> Result<Option<PlayerQuestRecord>, QuestError> {
        let key = (player_key(username), quest_id.to_string());
        Ok(self.lock()?.progress.get(&key).cloned())
    }

    fn put_player_quest(&self, record: PlayerQuestRecord) -> Result<(), QuestError> {
        let key = (player_key(&record.username), record.quest_id.clone());
        self.lock()?.progress.insert(key, record);
        Ok(())
    }

    fn list_player_quests(&self, username: &str) -> Result<Vec<PlayerQuestRecord>, QuestError> {
        let key = player_key(username);
        Ok(self
            .lock()?
            .progress
            .iter()
            .filter(|((user, _), _)| *user == key)
            .map(|(_, record)| record.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn players_are_case_insensitive() {
        let repo = MemoryRepository::new();
        repo.put_player(PlayerRecord::new("Alice", "Alice")).unwrap();
        assert!(repo.player_exists("alice").unwrap());
        assert!(!repo.player_exists("bob").unwrap());
        assert!(matches!(repo.get_player("bob"), Err(QuestError::NotFound(_))));
    }

    #[test]
    fn worlds_sorted_by_position() {
        let repo = MemoryRepository::new();
        repo.put_world(WorldRecord::new("b", "B", "", 2)).unwrap();
        repo.put_world(WorldRecord::new("a", "A", "", 1)).unwrap();
        let ids: Vec<String> = repo.list_worlds().unwrap().into_iter().map(|w| w.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn step_lookup_scans_quests() {
        let repo = MemoryRepository::new();
        let quest = QuestRecord::new("q1", "w", "Q", "", 1)
            .with_step(QuestCommandStep::new("", 0, "init", "git init"));
        repo.put_quest(quest).unwrap();
        assert_eq!(repo.get_step("q1-step-1").unwrap().command_name, "init");
        assert!(matches!(repo.get_step("nope"), Err(QuestError::NotFound(_))));
    }

    #[test]
    fn progress_is_scoped_per_player() {
        let repo = MemoryRepository::new();
        let quest = QuestRecord::new("q1", "w", "Q", "", 1);
        repo.put_player_quest(PlayerQuestRecord::new("alice", &quest, Utc::now()))
            .unwrap();
        assert!(repo.get_player_quest("ALICE", "q1").unwrap().is_some());
        assert!(repo.get_player_quest("bob", "q1").unwrap().is_none());
        assert_eq!(repo.list_player_quests("alice").unwrap().len(), 1);
        assert!(repo.list_player_quests("bob").unwrap().is_empty());
    }
}
