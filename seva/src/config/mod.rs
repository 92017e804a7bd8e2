//! Configuration system for the `Seva` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/seva/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.
//!
//! The file may also replace the built-in household schedule:
//!
//! ```toml
//! [[schedule.tasks]]
//! name = "Kitchen"
//! capacity = 2
//! members = ["Het Bhai", "Avi Bhai"]
//!
//! [[schedule.tasks]]
//! name = "Grocery"
//! fixed_members = ["Bhagirath Bhai"]
//! rotate_slots = 1
//! members = ["Mann Bhai"]
//! ```

use std::path::PathBuf;
use std::time::Duration;

use seva_proto::assignment::AssignmentState;
use seva_proto::schedule::{Schedule, ScheduleError, Task};

use crate::render::DEFAULT_TIMESTAMP_FORMAT;
use crate::store::remote::RemoteOptions;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// The configured schedule is inconsistent.
    #[error("invalid schedule in config file: {0}")]
    Schedule(#[from] ScheduleError),

    /// A task entry sets a key that does not apply to its kind of task.
    #[error("task {task}: `{key}` cannot be combined with {kind}")]
    ConflictingTaskKey {
        /// Task name.
        task: String,
        /// The key that does not apply.
        key: &'static str,
        /// What the entry was recognized as.
        kind: &'static str,
    },
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    store: StoreFileConfig,
    ui: UiFileConfig,
    schedule: Option<ScheduleFileConfig>,
}

/// `[store]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct StoreFileConfig {
    url: Option<String>,
    token: Option<String>,
    connect_timeout_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
}

/// `[ui]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct UiFileConfig {
    timestamp_format: Option<String>,
}

/// `[schedule]` section of the config file.
#[derive(Debug, serde::Deserialize)]
struct ScheduleFileConfig {
    tasks: Vec<TaskFileConfig>,
}

/// One `[[schedule.tasks]]` entry.
///
/// A task with `fixed_members` is a fixed-role task; `members` then lists
/// only the rotating people of the default assignment. `capacity` belongs to
/// ordinary tasks and `rotate_slots` to fixed-role ones.
#[derive(Debug, serde::Deserialize)]
struct TaskFileConfig {
    name: String,
    capacity: Option<usize>,
    #[serde(default)]
    fixed_members: Vec<String>,
    rotate_slots: Option<usize>,
    #[serde(default)]
    members: Vec<String>,
}

impl ScheduleFileConfig {
    fn build(&self) -> Result<Schedule, ConfigError> {
        let mut tasks = Vec::with_capacity(self.tasks.len());
        let mut defaults = Vec::with_capacity(self.tasks.len());

        for entry in &self.tasks {
            if entry.fixed_members.is_empty() {
                if entry.rotate_slots.is_some() {
                    return Err(entry.conflict("rotate_slots", "an ordinary task"));
                }
                let capacity = entry.capacity.unwrap_or(entry.members.len());
                tasks.push(Task::ordinary(entry.name.clone(), capacity));
                defaults.push(entry.members.clone());
            } else {
                if entry.capacity.is_some() {
                    return Err(entry.conflict("capacity", "fixed_members"));
                }
                let slots = entry.rotate_slots.unwrap_or(0);
                tasks.push(Task::fixed_rotating(
                    entry.name.clone(),
                    entry.fixed_members.iter().cloned(),
                    slots,
                ));
                let mut group = entry.fixed_members.clone();
                group.extend(entry.members.iter().cloned());
                defaults.push(group);
            }
        }

        Ok(Schedule::new(tasks, AssignmentState::new(defaults))?)
    }
}

impl TaskFileConfig {
    fn conflict(&self, key: &'static str, kind: &'static str) -> ConfigError {
        ConfigError::ConflictingTaskKey {
            task: self.name.clone(),
            key,
            kind,
        }
    }
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Store server WebSocket URL. `None` means offline.
    pub store_url: Option<String>,
    /// Admin token presented to the store.
    pub token: Option<String>,
    /// Timeout for connecting to the store server.
    pub connect_timeout: Duration,
    /// Timeout for the handshake and write acknowledgments.
    pub request_timeout: Duration,
    /// Format of the "last updated" line (chrono format string).
    pub timestamp_format: String,
    /// Tasks and default assignment.
    pub schedule: Schedule,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            store_url: None,
            token: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            schedule: Schedule::household(),
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed, or if it defines an invalid schedule.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Self::resolve(cli, &file)
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let schedule = match &file.schedule {
            Some(custom) => custom.build()?,
            None => defaults.schedule,
        };

        Ok(Self {
            store_url: cli.store_url.clone().or_else(|| file.store.url.clone()),
            token: cli.token.clone().or_else(|| file.store.token.clone()),
            connect_timeout: file
                .store
                .connect_timeout_secs
                .map_or(defaults.connect_timeout, Duration::from_secs),
            request_timeout: file
                .store
                .request_timeout_secs
                .map_or(defaults.request_timeout, Duration::from_secs),
            timestamp_format: cli
                .timestamp_format
                .clone()
                .or_else(|| file.ui.timestamp_format.clone())
                .unwrap_or(defaults.timestamp_format),
            schedule,
        })
    }

    /// Connection options for [`RemoteStore`](crate::store::remote::RemoteStore).
    #[must_use]
    pub fn remote_options(&self) -> RemoteOptions {
        RemoteOptions {
            token: self.token.clone(),
            connect_timeout: self.connect_timeout,
            request_timeout: self.request_timeout,
        }
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Household seva assignments with weekly rotation")]
pub struct CliArgs {
    /// WebSocket URL of the seva store (e.g. `ws://127.0.0.1:9100/ws`).
    #[arg(long, env = "SEVA_STORE_URL")]
    pub store_url: Option<String>,

    /// Admin token; required to rotate or reset.
    #[arg(long, env = "SEVA_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Path to config file (default: `~/.config/seva/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Format of the "last updated" line (chrono format string).
    #[arg(long)]
    pub timestamp_format: Option<String>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "SEVA_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/seva.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// What to do (default: `show`).
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Client subcommands.
#[derive(clap::Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Print the current assignments.
    Show,
    /// Rotate everyone one task forward and store the result.
    Rotate,
    /// Restore the default assignments.
    Reset {
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
    /// Print the assignments as a shareable message.
    Share,
    /// Print next week's rotation without storing it.
    Preview,
    /// Keep printing the assignments whenever they change.
    Watch,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("seva").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
