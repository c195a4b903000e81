//! Daemon configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anvil_exec::{CraftingConfig, RetryPolicy, DEFAULT_MODIFIER_KEY};
use anvil_engine::{MASTERWORK_BASE_CHANCE, PERFECT_SALVAGE_BASE_CHANCE};

use crate::error::{DaemonError, DaemonResult};

// =============================================================================
// Configuration
// =============================================================================

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Crafting rules
    pub crafting: CraftingSettings,

    /// Inventory store
    pub store: StoreConfig,

    /// Event delivery
    pub events: EventsConfig,

    /// Emit logs as JSON lines
    pub log_json: bool,

    /// Environment (test, development, production)
    pub environment: Environment,
}

/// Crafting rule configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CraftingSettings {
    /// Base Masterwork chance (0.10 = 10%)
    pub masterwork_chance: f64,
    /// Base Perfect-Salvage chance (0.10 = 10%)
    pub perfect_salvage_chance: f64,
    /// Modifier key looked up for both chances
    pub modifier_key: String,
}

/// Inventory store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Longest wait for a user's inventory lock
    pub lock_timeout: Duration,
}

/// Event delivery configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventsConfig {
    /// Publish retries after the first attempt
    pub max_retries: u32,
    /// Base backoff delay
    pub retry_delay: Duration,
    /// JSONL file for undeliverable events
    pub dead_letter_path: PathBuf,
    /// How long shutdown waits for in-flight emissions
    pub shutdown_deadline: Duration,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> DaemonResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from a fixed set of variables.
    pub fn from_vars(vars: &HashMap<String, String>) -> DaemonResult<Self> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DaemonResult<Self> {
        let defaults = Self::default();

        let environment = match lookup("ANVIL_ENV") {
            Some(value) => Environment::from_str(&value)?,
            None => defaults.environment,
        };

        let crafting = CraftingSettings {
            masterwork_chance: load_chance(&lookup, "ANVIL_MASTERWORK_CHANCE", MASTERWORK_BASE_CHANCE)?,
            perfect_salvage_chance: load_chance(
                &lookup,
                "ANVIL_PERFECT_SALVAGE_CHANCE",
                PERFECT_SALVAGE_BASE_CHANCE,
            )?,
            modifier_key: lookup("ANVIL_MODIFIER_KEY")
                .filter(|key| !key.trim().is_empty())
                .unwrap_or(defaults.crafting.modifier_key),
        };

        let store = StoreConfig {
            lock_timeout: load_millis(&lookup, "ANVIL_LOCK_TIMEOUT_MS", defaults.store.lock_timeout)?,
        };

        let events = EventsConfig {
            max_retries: load_parsed(&lookup, "ANVIL_PUBLISH_MAX_RETRIES", defaults.events.max_retries)?,
            retry_delay: load_millis(
                &lookup,
                "ANVIL_PUBLISH_RETRY_DELAY_MS",
                defaults.events.retry_delay,
            )?,
            dead_letter_path: lookup("ANVIL_DEAD_LETTER_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.events.dead_letter_path),
            shutdown_deadline: load_millis(
                &lookup,
                "ANVIL_SHUTDOWN_DEADLINE_MS",
                defaults.events.shutdown_deadline,
            )?,
        };

        let log_json = load_parsed(&lookup, "ANVIL_LOG_JSON", defaults.log_json)?;

        Ok(Self { crafting, store, events, log_json, environment })
    }

    /// Create test configuration.
    pub fn test() -> Self {
        Self {
            crafting: CraftingSettings {
                masterwork_chance: 0.0,
                perfect_salvage_chance: 0.0,
                modifier_key: DEFAULT_MODIFIER_KEY.to_string(),
            },
            store: StoreConfig { lock_timeout: Duration::from_millis(500) },
            events: EventsConfig {
                max_retries: 1,
                retry_delay: Duration::from_millis(1),
                dead_letter_path: env::temp_dir().join("anvil_dead_letter.jsonl"),
                shutdown_deadline: Duration::from_secs(1),
            },
            log_json: false,
            environment: Environment::Test,
        }
    }

    /// Library configuration for the crafting service.
    pub fn crafting_config(&self) -> CraftingConfig {
        let defaults = CraftingConfig::default();
        CraftingConfig {
            masterwork: defaults.masterwork.with_base_chance(self.crafting.masterwork_chance),
            perfect_salvage: defaults
                .perfect_salvage
                .with_base_chance(self.crafting.perfect_salvage_chance),
            modifier_key: self.crafting.modifier_key.clone(),
            ..defaults
        }
    }

    /// Backoff schedule for the event publisher.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.events.max_retries,
            base_delay: self.events.retry_delay,
            ..RetryPolicy::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            crafting: CraftingSettings {
                masterwork_chance: MASTERWORK_BASE_CHANCE,
                perfect_salvage_chance: PERFECT_SALVAGE_BASE_CHANCE,
                modifier_key: DEFAULT_MODIFIER_KEY.to_string(),
            },
            store: StoreConfig { lock_timeout: Duration::from_secs(5) },
            events: EventsConfig {
                max_retries: retry.max_retries,
                retry_delay: retry.base_delay,
                dead_letter_path: PathBuf::from("logs/event_deadletter.jsonl"),
                shutdown_deadline: Duration::from_secs(10),
            },
            log_json: false,
            environment: Environment::Development,
        }
    }
}

impl FromStr for Environment {
    type Err = DaemonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(DaemonError::Config(format!(
                "Invalid ANVIL_ENV: {}. Expected: test, development, production",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

// =============================================================================
// Loaders
// =============================================================================

fn load_parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> DaemonResult<T> {
    match lookup(key) {
        Some(val) => val
            .trim()
            .parse::<T>()
            .map_err(|_| DaemonError::Config(format!("Invalid {} value: {}", key, val))),
        None => Ok(default),
    }
}

fn load_millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> DaemonResult<Duration> {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    load_parsed(lookup, key, default_ms).map(Duration::from_millis)
}

/// Chance in `[0, 1]`.
fn load_chance(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: f64,
) -> DaemonResult<f64> {
    let chance = load_parsed(lookup, key, default)?;
    if !(0.0..=1.0).contains(&chance) {
        return Err(DaemonError::Config(format!("{} must be within [0, 1], got {}", key, chance)));
    }
    Ok(chance)
}

// =============================================================================
// Tests
// =============================================================================
