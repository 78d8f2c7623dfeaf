//! Binary entrypoint for the gitquest CLI.
//!
//! Commands:
//! - `init` - write a starter `config.toml` and seed the quest store
//! - `seed [--file <path>]` - load worlds into an empty store
//! - `register <username>` - create a player
//! - `worlds` / `quests <world>` - browse content
//! - `start`, `submit`, `hint`, `abandon` - play a quest
//! - `status <user> [quest] [--json]` - show progress
//! - `leaderboard` - players by total score
//! - `check <command> <pattern>` - try a pattern without touching the store
//!
//! See the library crate docs for module-level details: `gitquest::`.
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, warn};

use gitquest::command::CommandValidator;
use gitquest::config::Config;
use gitquest::quest::{
    format_quest_status, load_worlds_from_json, GitQuestStore, GitQuestStoreBuilder,
    QuestRepository, QuestService, QuestStatus,
};

#[derive(Parser)]
#[command(name = "gitquest")]
#[command(about = "Learn Git by playing through command quests")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration and seed the built-in worlds
    Init,
    /// Seed worlds into an empty store
    Seed {
        /// JSON seed file (defaults to storage.seed_file, then the built-in worlds)
        #[arg(short, long)]
        file: Option<String>,
    },
    /// Register a player
    Register {
        username: String,
        /// Name shown on the leaderboard
        #[arg(long)]
        display_name: Option<String>,
    },
    /// List worlds
    Worlds {
        /// Show completion for this player
        #[arg(short, long)]
        user: Option<String>,
    },
    /// List the quests of a world
    Quests {
        world: String,
        /// Show which quests this player can start
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Start a quest
    Start { user: String, quest: String },
    /// Submit a git command for the current step
    Submit {
        user: String,
        quest: String,
        /// Target a specific step id instead of the current one
        #[arg(long)]
        step: Option<String>,
        /// The command, e.g. git commit -m "first"
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Ask for a hint on the current step
    Hint { user: String, quest: String },
    /// Abandon a quest
    Abandon { user: String, quest: String },
    /// Show progress for a player
    Status {
        user: String,
        quest: Option<String>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Show the top players
    Leaderboard {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Match a command against a pattern
    Check {
        command: String,
        pattern: String,
        /// Drop flags from the command before matching
        #[arg(long)]
        ignore_flags: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Init => {
            info!("Initializing new gitquest configuration");
            if tokio::fs::metadata(&cli.config).await.is_ok() {
                warn!("{} already exists; leaving it untouched", cli.config);
            } else {
                Config::create_default(&cli.config).await?;
                info!("Configuration file created at {}", cli.config);
            }
            let config = Config::load(&cli.config).await?;
            tokio::fs::create_dir_all(&config.storage.data_dir).await?;
            let store = open_store(&config)?;
            println!(
                "Store ready at {} with {} worlds.",
                config.storage.db_path().display(),
                store.list_worlds()?.len()
            );
        }
        Commands::Seed { file } => {
            let config = load_config(pre_config, &cli.config).await?;
            tokio::fs::create_dir_all(&config.storage.data_dir).await?;
            let store = GitQuestStoreBuilder::new(config.storage.db_path())
                .without_seed()
                .open()?;
            let worlds = match file.or_else(|| config.storage.seed_file.clone()) {
                Some(path) => load_worlds_from_json(&path)?,
                None => gitquest::quest::canonical_seed()?,
            };
            let inserted = store.seed_if_needed(&worlds)?;
            if inserted == 0 {
                println!("Store already has worlds; nothing seeded.");
            } else {
                println!("Seeded {} quests.", inserted);
            }
        }
        Commands::Register {
            username,
            display_name,
        } => {
            let service = open_service(pre_config, &cli.config).await?;
            let player = service.register_player(&username, display_name.as_deref())?;
            println!("Welcome, {}!", player.display_name);
        }
        Commands::Worlds { user } => {
            let service = open_service(pre_config, &cli.config).await?;
            for world in service.list_worlds()? {
                match &user {
                    Some(user) => {
                        let (done, total) = service.world_progress(user, &world.id)?;
                        println!("{:<12} {} ({}/{})", world.id, world.name, done, total);
                    }
                    None => println!("{:<12} {} - {}", world.id, world.name, world.description),
                }
            }
        }
        Commands::Quests { world, user } => {
            let service = open_service(pre_config, &cli.config).await?;
            for quest in service.quests_in_world(&world)? {
                let marker = match &user {
                    Some(user) => {
                        let player = service.repository().get_player(user)?;
                        if player.has_completed(&quest.id) {
                            "[done] "
                        } else if service.can_start_quest(user, &quest.id)? {
                            "[open] "
                        } else {
                            "[----] "
                        }
                    }
                    None => "",
                };
                println!(
                    "{}{:<20} {} (difficulty {}, {} steps)",
                    marker,
                    quest.id,
                    quest.name,
                    quest.difficulty,
                    quest.steps.len()
                );
            }
        }
        Commands::Start { user, quest } => {
            let service = open_service(pre_config, &cli.config).await?;
            service.start_quest(&user, &quest)?;
            let definition = service.repository().get_quest(&quest)?;
            println!("Quest started: {}", definition.name);
            if let Some(step) = definition.steps.first() {
                println!("Step 1: {}", step.description);
            }
        }
        Commands::Submit {
            user,
            quest,
            step,
            command,
        } => {
            let service = open_service(pre_config, &cli.config).await?;
            let command = command.join(" ");
            let result = match step {
                Some(step_id) => service.submit_step(&user, &quest, &step_id, &command)?,
                None => service.submit_command(&user, &quest, &command)?,
            };
            println!("{}", result.validation.message);
            if result.replay {
                println!("(step already completed; score unchanged)");
            } else if result.step.score > 0 {
                println!(
                    "+{} points ({} bonus, {}s)",
                    result.step.score, result.step.bonus_points, result.step.time_spent
                );
            }
            match result.quest_status {
                QuestStatus::Completed if result.quest_completed => {
                    println!("Quest complete! Score: {}", result.quest_score)
                }
                QuestStatus::Stuck => println!("Stuck? Try `gitquest hint {} {}`.", user, quest),
                _ => {}
            }
            if let Some(next) = result.next_step {
                println!("Next: {}", next.description);
            }
        }
        Commands::Hint { user, quest } => {
            let service = open_service(pre_config, &cli.config).await?;
            let hint = service.request_hint(&user, &quest)?;
            println!("Step {}: {}", hint.step_number, hint.description);
            println!("Hint: {}", hint.hint);
            println!("Expected: {}", hint.expected_pattern);
        }
        Commands::Abandon { user, quest } => {
            let service = open_service(pre_config, &cli.config).await?;
            service.abandon_quest(&user, &quest)?;
            println!("Quest {} abandoned.", quest);
        }
        Commands::Status { user, quest, json } => {
            let service = open_service(pre_config, &cli.config).await?;
            match quest {
                Some(quest_id) => {
                    let record = service.quest_status(&user, &quest_id)?;
                    if json {
                        println!("{}", serde_json::to_string_pretty(&record)?);
                    } else {
                        let definition = service.repository().get_quest(&quest_id)?;
                        print!("{}", format_quest_status(&definition, &record));
                    }
                }
                None => {
                    let player = service.repository().get_player(&user)?;
                    let records = service.repository().list_player_quests(&user)?;
                    if json {
                        let payload = serde_json::json!({
                            "player": player,
                            "quests": records,
                        });
                        println!("{}", serde_json::to_string_pretty(&payload)?);
                    } else {
                        println!("{} - total score {}", player.display_name, player.total_score);
                        for record in records {
                            println!("  {:<20} {:<14} {}", record.quest_id, record.status.as_str(), record.score());
                        }
                    }
                }
            }
        }
        Commands::Leaderboard { limit } => {
            let service = open_service(pre_config, &cli.config).await?;
            for (rank, player) in service.leaderboard(limit)?.iter().enumerate() {
                println!("{:>3}. {:<20} {}", rank + 1, player.display_name, player.total_score);
            }
        }
        Commands::Check {
            command,
            pattern,
            ignore_flags,
        } => {
            let config = load_config(pre_config, &cli.config).await?;
            let validator = CommandValidator::new(&config.validation);
            let result = validator.validate_command(&command, &pattern, Some(ignore_flags));
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.success {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Use the already loaded config, fall back to defaults when the file does not exist.
async fn load_config(pre_config: Option<Config>, path: &str) -> Result<Config> {
    if let Some(config) = pre_config {
        return Ok(config);
    }
    if tokio::fs::metadata(path).await.is_ok() {
        return Config::load(path).await;
    }
    warn!("{} not found; using default configuration", path);
    Ok(Config::default())
}

fn open_store(config: &Config) -> Result<GitQuestStore> {
    let mut builder = GitQuestStoreBuilder::new(config.storage.db_path());
    if let Some(path) = config.storage.seed_file.as_deref() {
        builder = builder.with_seed(load_worlds_from_json(path)?);
    }
    Ok(builder.open()?)
}

async fn open_service(pre_config: Option<Config>, path: &str) -> Result<QuestService<GitQuestStore>> {
    let config = load_config(pre_config, path).await?;
    tokio::fs::create_dir_all(&config.storage.data_dir).await?;
    let store = open_store(&config)?;
    let validator = CommandValidator::new(&config.validation);
    Ok(QuestService::new(store, validator, &config))
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match (verbosity, config) {
        (0, Some(cfg)) => cfg.logging.level_filter(),
        (0, None) => log::LevelFilter::Warn,
        (1, _) => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let file = config
        .as_ref()
        .and_then(|cfg| cfg.logging.file.as_ref())
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });

    if let Some(f) = file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Echo to the console only when someone is watching
        let is_tty = atty::is(atty::Stream::Stderr);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
