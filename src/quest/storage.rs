use std::path::{Path, PathBuf};

use log::info;
use sled::IVec;

use crate::quest::errors::QuestError;
use crate::quest::repository::QuestRepository;
use crate::quest::seed_loader::{canonical_seed, WorldSeed};
use crate::quest::types::{
    PlayerQuestRecord, PlayerRecord, QuestCommandStep, QuestRecord, WorldRecord,
    PLAYER_SCHEMA_VERSION, PROGRESS_SCHEMA_VERSION, QUEST_SCHEMA_VERSION, WORLD_SCHEMA_VERSION,
};

const TREE_PRIMARY: &str = "gitquest";
const TREE_PROGRESS: &str = "gitquest_progress";
const TREE_STEP_INDEX: &str = "gitquest_step_index";

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct GitQuestStoreBuilder {
    path: PathBuf,
    seed: Option<Vec<WorldSeed>>,
    ensure_seed: bool,
}

impl GitQuestStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            seed: None,
            ensure_seed: true,
        }
    }

    /// Opt out of seeding the built-in worlds (useful for targeted tests).
    pub fn without_seed(mut self) -> Self {
        self.ensure_seed = false;
        self
    }

    /// Seed from the given worlds instead of the built-in ones.
    pub fn with_seed(mut self, seed: Vec<WorldSeed>) -> Self {
        self.seed = Some(seed);
        self.ensure_seed = true;
        self
    }

    pub fn open(self) -> Result<GitQuestStore, QuestError> {
        let store = GitQuestStore::open_unseeded(&self.path)?;
        if self.ensure_seed {
            let seed = match self.seed {
                Some(seed) => seed,
                None => canonical_seed()?,
            };
            store.seed_if_needed(&seed)?;
        }
        Ok(store)
    }
}

/// Sled-backed persistence for worlds, quests, players and quest progress.
pub struct GitQuestStore {
    _db: sled::Db,
    primary: sled::Tree,
    progress: sled::Tree,
    step_index: sled::Tree,
}

impl GitQuestStore {
    /// Open (or create) the store rooted at `path`, inserting the built-in
    /// worlds when no world exists yet.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, QuestError> {
        GitQuestStoreBuilder::new(path.as_ref()).open()
    }

    fn open_unseeded<P: AsRef<Path>>(path: P) -> Result<Self, QuestError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let primary = db.open_tree(TREE_PRIMARY)?;
        let progress = db.open_tree(TREE_PROGRESS)?;
        let step_index = db.open_tree(TREE_STEP_INDEX)?;
        Ok(Self {
            _db: db,
            primary,
            progress,
            step_index,
        })
    }

    fn world_key(world_id: &str) -> Vec<u8> {
        format!("worlds:{}", world_id).into_bytes()
    }

    fn quest_key(quest_id: &str) -> Vec<u8> {
        format!("quests:{}", quest_id).into_bytes()
    }

    fn player_key(username: &str) -> Vec<u8> {
        format!("players:{}", username.to_lowercase()).into_bytes()
    }

    fn progress_prefix(username: &str) -> String {
        format!("progress:{}:", username.to_lowercase())
    }

    fn progress_key(username: &str, quest_id: &str) -> Vec<u8> {
        format!("{}{}", Self::progress_prefix(username), quest_id).into_bytes()
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, QuestError> {
        Ok(bincode::serialize(value)?)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(bytes: IVec) -> Result<T, QuestError> {
        Ok(bincode::deserialize::<T>(&bytes)?)
    }

    fn check_schema(entity: &'static str, expected: u8, found: u8) -> Result<(), QuestError> {
        if expected != found {
            return Err(QuestError::SchemaMismatch {
                entity,
                expected,
                found,
            });
        }
        Ok(())
    }

    /// Insert seed worlds and quests unless any world exists already.
    /// Returns the number of quests inserted.
    pub fn seed_if_needed(&self, seed: &[WorldSeed]) -> Result<usize, QuestError> {
        if self.primary.scan_prefix(b"worlds:").next().is_some() {
            return Ok(0);
        }
        let mut inserted = 0usize;
        for world_seed in seed {
            let (world, quests) = world_seed.to_records()?;
            for quest in quests {
                self.put_quest(quest)?;
                inserted += 1;
            }
            self.put_world(world)?;
        }
        info!("seeded {} worlds with {} quests", seed.len(), inserted);
        Ok(inserted)
    }
}

impl QuestRepository for GitQuestStore {
    fn put_world(&self, mut world: WorldRecord) -> Result<(), QuestError> {
        world.schema_version = WORLD_SCHEMA_VERSION;
        let bytes = Self::serialize(&world)?;
        self.primary.insert(Self::world_key(&world.id), bytes)?;
        self.primary.flush()?;
        Ok(())
    }

    fn get_world(&self, world_id: &str) -> Result<WorldRecord, QuestError> {
        let Some(bytes) = self.primary.get(Self::world_key(world_id))? else {
            return Err(QuestError::NotFound(format!("world: {}", world_id)));
        };
        let record: WorldRecord = Self::deserialize(bytes)?;
        Self::check_schema("world", WORLD_SCHEMA_VERSION, record.schema_version)?;
        Ok(record)
    }

    fn list_worlds(&self) -> Result<Vec<WorldRecord>, QuestError> {
        let mut worlds = Vec::new();
        for entry in self.primary.scan_prefix(b"worlds:") {
            let (_, value) = entry?;
            let record: WorldRecord = Self::deserialize(value)?;
            Self::check_schema("world", WORLD_SCHEMA_VERSION, record.schema_version)?;
            worlds.push(record);
        }
        worlds.sort_by_key(|w| w.position);
        Ok(worlds)
    }

    fn put_quest(&self, mut quest: QuestRecord) -> Result<(), QuestError> {
        quest.schema_version = QUEST_SCHEMA_VERSION;
        let bytes = Self::serialize(&quest)?;
        self.primary.insert(Self::quest_key(&quest.id), bytes)?;
        for step in &quest.steps {
            self.step_index
                .insert(step.id.as_bytes(), quest.id.as_bytes())?;
        }
        self.primary.flush()?;
        self.step_index.flush()?;
        Ok(())
    }

    fn get_quest(&self, quest_id: &str) -> Result<QuestRecord, QuestError> {
        let Some(bytes) = self.primary.get(Self::quest_key(quest_id))? else {
            return Err(QuestError::NotFound(format!("quest: {}", quest_id)));
        };
        let record: QuestRecord = Self::deserialize(bytes)?;
        Self::check_schema("quest", QUEST_SCHEMA_VERSION, record.schema_version)?;
        Ok(record)
    }

    fn list_quest_ids(&self) -> Result<Vec<String>, QuestError> {
        let mut ids = Vec::new();
        for entry in self.primary.scan_prefix(b"quests:") {
            let (key, _) = entry?;
            let text = String::from_utf8_lossy(&key);
            if let Some(id) = text.strip_prefix("quests:") {
                ids.push(id.to_string());
            }
        }
        Ok(ids)
    }

    fn get_step(&self, step_id: &str) -> Result<QuestCommandStep, QuestError> {
        let Some(quest_id) = self.step_index.get(step_id.as_bytes())? else {
            return Err(QuestError::NotFound(format!("step: {}", step_id)));
        };
        let quest_id = String::from_utf8_lossy(&quest_id).to_string();
        let quest = self.get_quest(&quest_id)?;
        quest
            .step(step_id)
            .cloned()
            .ok_or_else(|| QuestError::NotFound(format!("step: {}", step_id)))
    }

    fn put_player(&self, mut player: PlayerRecord) -> Result<(), QuestError> {
        player.schema_version = PLAYER_SCHEMA_VERSION;
        player.touch();
        let bytes = Self::serialize(&player)?;
        self.primary.insert(Self::player_key(&player.username), bytes)?;
        self.primary.flush()?;
        Ok(())
    }

    fn get_player(&self, username: &str) -> Result<PlayerRecord, QuestError> {
        let Some(bytes) = self.primary.get(Self::player_key(username))? else {
            return Err(QuestError::NotFound(format!("player: {}", username)));
        };
        let record: PlayerRecord = Self::deserialize(bytes)?;
        Self::check_schema("player", PLAYER_SCHEMA_VERSION, record.schema_version)?;
        Ok(record)
    }

    fn list_players(&self) -> Result<Vec<PlayerRecord>, QuestError> {
        let mut players = Vec::new();
        for entry in self.primary.scan_prefix(b"players:") {
            let (_, value) = entry?;
            let record: PlayerRecord = Self::deserialize(value)?;
            Self::check_schema("player", PLAYER_SCHEMA_VERSION, record.schema_version)?;
            players.push(record);
        }
        Ok(players)
    }

    fn get_player_quest(
        &self,
        username: &str,
        quest_id: &str,
    ) -> Result<Option<PlayerQuestRecord>, QuestError> {
        let Some(bytes) = self.progress.get(Self::progress_key(username, quest_id))? else {
            return Ok(None);
        };
        let record: PlayerQuestRecord = Self::deserialize(bytes)?;
        Self::check_schema("progress", PROGRESS_SCHEMA_VERSION, record.schema_version)?;
        Ok(Some(record))
    }

    fn put_player_quest(&self, mut record: PlayerQuestRecord) -> Result<(), QuestError> {
        record.schema_version = PROGRESS_SCHEMA_VERSION;
        let key = Self::progress_key(&record.username, &record.quest_id);
        let bytes = Self::serialize(&record)?;
        self.progress.insert(key, bytes)?;
        self.progress.flush()?;
        Ok(())
    }

    fn list_player_quests(&self, username: &str) -> Result<Vec<PlayerQuestRecord>, QuestError> {
        let prefix = Self::progress_prefix(username);
        let mut records = Vec::new();
        for entry in self.progress.scan_prefix(prefix.as_bytes()) {
            let (_, value) = entry?;
            let record: PlayerQuestRecord = Self::deserialize(value)?;
            Self::check_schema("progress", PROGRESS_SCHEMA_VERSION, record.schema_version)?;
            records.push(record);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn empty_store() -> (TempDir, GitQuestStore) {
        let dir = TempDir::new().expect("tempdir");
        let store = GitQuestStoreBuilder::new(dir.path())
            .without_seed()
            .open()
            .expect("store");
        (dir, store)
    }

    #[test]
    fn store_round_trip_player() {
        let (_dir, store) = empty_store();
        let mut player = PlayerRecord::new("Alice", "Alice");
        player.total_score = 42;
        store.put_player(player).expect("put");
        let fetched = store.get_player("alice").expect("get");
        assert_eq!(fetched.username, "Alice");
        assert_eq!(fetched.total_score, 42);
        assert_eq!(fetched.schema_version, PLAYER_SCHEMA_VERSION);
    }

    #[test]
    fn step_index_follows_quest_writes() {
        let (_dir, store) = empty_store();
        let quest = QuestRecord::new("q1", "basics", "Q1", "", 1)
            .with_step(QuestCommandStep::new("", 0, "init", "git init"))
            .with_step(QuestCommandStep::new("", 0, "status", "git status"));
        store.put_quest(quest).unwrap();

        assert_eq!(store.get_step("q1-step-2").unwrap().command_name, "status");

        assert_eq!(store.get_step("q1-step-1").unwrap().quest_id, "q1");
        assert!(matches!(store.get_step("q1-step-3"), Err(QuestError::NotFound(_))));
    }

    #[test]
    fn progress_round_trip() {
        let (_dir, store) = empty_store();
        let quest = QuestRecord::new("q1", "basics", "Q1", "", 1)
            .with_step(QuestCommandStep::new("", 0, "init", "git init"));
        let record = PlayerQuestRecord::new("bob", &quest, Utc::now());
        store.put_player_quest(record.clone()).unwrap();

        let fetched = store.get_player_quest("Bob", "q1").unwrap().unwrap();
        assert_eq!(fetched, record);
        assert!(store.get_player_quest("bob", "q2").unwrap().is_none());
        assert_eq!(store.list_player_quests("bob").unwrap().len(), 1);
    }

    #[test]
    fn seeding_only_happens_once() {
        let dir = TempDir::new().expect("tempdir");
        let first_count;
        {
            let store = GitQuestStoreBuilder::new(dir.path()).open().expect("store");
            let worlds = store.list_worlds().unwrap();
            assert!(!worlds.is_empty());
            first_count = store.list_quest_ids().unwrap().len();
            assert!(first_count > 0);
        }

        let store = GitQuestStoreBuilder::new(dir.path())
            .without_seed()
            .open()
            .expect("reopen store");
        let seed = canonical_seed().unwrap();
        assert_eq!(store.seed_if_needed(&seed).unwrap(), 0);
        assert_eq!(store.list_quest_ids().unwrap().len(), first_count);
    }
}
