// Configuration loading and parsing (league.toml, engine.toml).

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::claim::ranking::id_cmp;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub league: LeagueConfig,
    pub jobs: JobsConfig,
    pub auction: AuctionConfig,
    pub db_path: String,
    /// Optional projection pool CSV imported at startup.
    pub pool_csv: Option<String>,
}

// ---------------------------------------------------------------------------
// league.toml structs
// ---------------------------------------------------------------------------

/// Wrapper for the top-level `[league]` table in league.toml.
#[derive(Debug, Clone, Deserialize)]
struct LeagueFile {
    league: LeagueConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeagueConfig {
    pub id: String,
    pub name: String,
    pub num_teams: usize,
    pub salary_cap: u32,
    /// Roster slot counts keyed by position string, e.g.
    /// `{"QB": 1, "RB": 2, "WR": 2, "TE": 1, "FLEX": 1, "BE": 6, "IR": 2}`.
    pub roster: HashMap<String, usize>,
    /// Team id -> display name.
    pub teams: HashMap<String, String>,
}

impl LeagueConfig {
    /// Team ids in initial waiver-priority order.
    ///
    /// The order is the deterministic id order (numeric-aware), so seeding
    /// is reproducible across runs regardless of map iteration order.
    pub fn team_ids_in_priority_order(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.teams.keys().cloned().collect();
        ids.sort_by(|a, b| id_cmp(a, b));
        ids
    }
}

// ---------------------------------------------------------------------------
// engine.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire engine.toml file.
#[derive(Debug, Clone, Deserialize)]
struct EngineFile {
    database: DatabaseSection,
    jobs: JobsConfig,
    #[serde(default)]
    auction: AuctionConfig,
    #[serde(default)]
    data: DataSection,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DataSection {
    pool: Option<String>,
}

/// Batch-job scheduling settings.
#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    pub waiver_interval_secs: u64,
    pub rfa_interval_secs: u64,
    pub transition_interval_secs: u64,
    /// When true, batches log intended outcomes without committing.
    #[serde(default)]
    pub dry_run: bool,
}

/// Auction optimizer settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AuctionConfig {
    /// Fraction of the salary cap the optimizer may spend; the remainder is
    /// reserved for bench fill.
    #[serde(default = "default_budget_headroom")]
    pub budget_headroom: f64,
}

fn default_budget_headroom() -> f64 {
    0.90
}

impl Default for AuctionConfig {
    fn default() -> Self {
        AuctionConfig {
            budget_headroom: default_budget_headroom(),
        }
    }
}

impl AuctionConfig {
    /// The optimizer's spendable budget for a given salary cap.
    pub fn cap_budget(&self, salary_cap: u32) -> u32 {
        (salary_cap as f64 * self.budget_headroom).floor() as u32
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

/// Default database location when engine.toml leaves `[database] path` unset.
fn default_db_path() -> String {
    directories::ProjectDirs::from("", "", "claimline")
        .map(|dirs| {
            dirs.data_dir()
                .join("claimline.db")
                .to_string_lossy()
                .to_string()
        })
        .unwrap_or_else(|| "claimline.db".to_string())
}

/// Load and validate configuration from `config/league.toml` and
/// `config/engine.toml`, relative to the given `base_dir`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- league.toml (required) ---
    let league_path = config_dir.join("league.toml");
    let league_text = read_file(&league_path)?;
    let league_file: LeagueFile =
        toml::from_str(&league_text).map_err(|e| ConfigError::ParseError {
            path: league_path.clone(),
            source: e,
        })?;
    let league = league_file.league;

    // --- engine.toml (required) ---
    let engine_path = config_dir.join("engine.toml");
    let engine_text = read_file(&engine_path)?;
    let engine_file: EngineFile =
        toml::from_str(&engine_text).map_err(|e| ConfigError::ParseError {
            path: engine_path.clone(),
            source: e,
        })?;

    let config = Config {
        league,
        jobs: engine_file.jobs,
        auction: engine_file.auction,
        db_path: engine_file.database.path.unwrap_or_else(default_db_path),
        pool_csv: engine_file.data.pool,
    };
    validate(&config)?;
    Ok(config)
}

/// Load configuration from `config/` under the current working directory.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    load_config_from(&cwd)
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    let league = &config.league;
    if league.id.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "league.id".into(),
            message: "must not be empty".into(),
        });
    }
    if league.num_teams < 2 {
        return Err(ConfigError::ValidationError {
            field: "league.num_teams".into(),
            message: "a league needs at least two teams".into(),
        });
    }
    if league.teams.len() != league.num_teams {
        return Err(ConfigError::ValidationError {
            field: "league.teams".into(),
            message: format!(
                "expected {} teams, found {}",
                league.num_teams,
                league.teams.len()
            ),
        });
    }
    if league.salary_cap == 0 {
        return Err(ConfigError::ValidationError {
            field: "league.salary_cap".into(),
            message: "must be positive".into(),
        });
    }
    if league.roster.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "league.roster".into(),
            message: "at least one roster slot is required".into(),
        });
    }
    for (key, interval) in [
        ("jobs.waiver_interval_secs", config.jobs.waiver_interval_secs),
        ("jobs.rfa_interval_secs", config.jobs.rfa_interval_secs),
        (
            "jobs.transition_interval_secs",
            config.jobs.transition_interval_secs,
        ),
    ] {
        if interval == 0 {
            return Err(ConfigError::ValidationError {
                field: key.into(),
                message: "must be positive".into(),
            });
        }
    }
    if !(0.0..=1.0).contains(&config.auction.budget_headroom)
        || config.auction.budget_headroom == 0.0
    {
        return Err(ConfigError::ValidationError {
            field: "auction.budget_headroom".into(),
            message: "must be in (0, 1]".into(),
        });
    }
    Ok(())
}
