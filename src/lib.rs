//! # gitquest - a quest engine for learning Git
//!
//! Players register, pick a quest inside a world and solve it step by step by
//! typing the Git command each step asks for. Every submission is matched
//! against the step's pattern, scored, and folded into the player's progress.
//!
//! ## Features
//!
//! - **Command Validation**: Tokenizer for shell-style Git commands, a small pattern language
//!   (`[optional]` segments, `<name>` captures, flag-insensitive matching) and a fail-safe validator.
//! - **Scoring**: Base points per step, a speed bonus and a penalty for earlier failed attempts.
//! - **Progress Tracking**: Per-step attempt history rolled up into a quest status
//!   (starting, in progress, stuck, review needed, completed, abandoned).
//! - **Persistence**: Sled-backed store with schema-versioned bincode records and JSON world seeds.
//! - **CLI**: `gitquest` binary for seeding, registration and playing quests from the terminal.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gitquest::command::CommandValidator;
//! use gitquest::config::Config;
//! use gitquest::quest::{GitQuestStore, QuestService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let store = GitQuestStore::open(config.storage.db_path())?;
//!     let service = QuestService::new(store, CommandValidator::new(&config.validation), &config);
//!
//!     service.register_player("alice", None)?;
//!     service.start_quest("alice", "first-repository")?;
//!     let result = service.submit_command("alice", "first-repository", "git init")?;
//!     println!("{}", result.validation.message);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`command`] - Command parser, pattern matcher and validator
//! - [`quest`] - Data model, storage, step scoring, status rollup and the quest service
//! - [`config`] - Configuration management and validation
//! - [`validation`] - Username and identifier rules
//! - [`logutil`] - Log escaping and `key=value` context helpers

pub mod command;
pub mod config;
pub mod logutil;
pub mod quest;
pub mod validation;
