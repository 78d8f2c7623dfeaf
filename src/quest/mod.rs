//! Quest data model, persistence and progress tracking.
//! Worlds group quests, quests are ordered command steps, and each player
//! gets one progress record per started quest. Storage is sled-backed with a
//! repository trait in front so the service can run against memory in tests.

pub mod errors;
pub mod progress;
pub mod repository;
pub mod rollup;
pub mod seed_loader;
pub mod service;
pub mod storage;
pub mod types;

pub use errors::QuestError;
pub use progress::{
    activate_step, apply_submission, base_points, elapsed_seconds, mark_needs_help, time_bonus,
    StepUpdate,
};
pub use repository::{MemoryRepository, QuestRepository};
pub use rollup::{current_step, rollup};
pub use seed_loader::{canonical_seed, load_worlds_from_json, parse_worlds, WorldSeed};
pub use service::{format_quest_status, HintResponse, QuestService, SubmissionResult};
pub use storage::{GitQuestStore, GitQuestStoreBuilder};
pub use types::*;
