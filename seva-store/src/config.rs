//! Configuration for the `Seva` document store.
//!
//! Values come from, highest priority first: CLI flags, environment
//! variables (through clap's `env`), `~/.config/seva-store/config.toml`,
//! then compiled defaults.
//!
//! ```toml
//! [server]
//! bind_addr = "0.0.0.0:9100"
//! max_payload_size = 65536
//!
//! [document]
//! data_file = "/var/lib/seva/assignments.json"
//! broadcast_capacity = 16
//!
//! [auth]
//! admin_tokens = ["s3cret"]
//! ```
//!
//! Unknown keys are rejected so a misspelled `admin_tokens` cannot silently
//! leave the store read-only.

use std::path::{Path, PathBuf};

/// Errors that can occur when loading store configuration.
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
}

/// The store config file. Every field is optional.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct StoreConfigFile {
    server: ServerSection,
    document: DocumentSection,
    auth: AuthSection,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ServerSection {
    bind_addr: Option<String>,
    max_payload_size: Option<usize>,
}

/// Where the assignment document lives and how changes fan out.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DocumentSection {
    data_file: Option<PathBuf>,
    broadcast_capacity: Option<usize>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct AuthSection {
    admin_tokens: Option<Vec<String>>,
}

/// CLI arguments for the store server.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Seva assignment document store")]
pub struct StoreCliArgs {
    /// Address to bind the store server to.
    #[arg(short, long, env = "SEVA_STORE_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/seva-store/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// JSON file the document is persisted to (in-memory only if unset).
    #[arg(long, env = "SEVA_STORE_DATA")]
    pub data_file: Option<PathBuf>,

    /// Admin token allowed to write; may be repeated.
    #[arg(long = "admin-token", env = "SEVA_ADMIN_TOKENS", value_delimiter = ',')]
    pub admin_tokens: Vec<String>,

    /// Maximum incoming frame size in bytes.
    #[arg(long)]
    pub max_payload_size: Option<usize>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "SEVA_STORE_LOG")]
    pub log_level: String,
}

/// Fully resolved store server configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Address to bind the server to (e.g., `0.0.0.0:9100`).
    pub bind_addr: String,
    /// Where the document is persisted, if anywhere.
    pub data_file: Option<PathBuf>,
    /// Tokens whose holders may write.
    pub admin_tokens: Vec<String>,
    /// Maximum allowed incoming frame size in bytes.
    pub max_payload_size: usize,
    /// Number of change notifications buffered per subscriber.
    pub broadcast_capacity: usize,
    pub log_level: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:9100".to_string(),
            data_file: None,
            admin_tokens: Vec::new(),
            max_payload_size: 64 * 1024,
            broadcast_capacity: 16,
            log_level: "info".to_string(),
        }
    }
}

impl StoreConfig {
    /// Loads the config file named by `--config`, or the default one if it
    /// exists, and layers the CLI on top.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an explicit `--config` file is missing, or
    /// any config file cannot be read or parsed.
    pub fn load(cli: &StoreCliArgs) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => read_config_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => read_config_file(&path)?,
                _ => StoreConfigFile::default(),
            },
        };
        Ok(Self::resolve(cli, file))
    }

    /// Admin tokens given on the command line replace the file's list.
    fn resolve(cli: &StoreCliArgs, file: StoreConfigFile) -> Self {
        let defaults = Self::default();
        let StoreConfigFile {
            server,
            document,
            auth,
        } = file;

        let admin_tokens = if cli.admin_tokens.is_empty() {
            auth.admin_tokens.unwrap_or(defaults.admin_tokens)
        } else {
            cli.admin_tokens.clone()
        };

        Self {
            bind_addr: cli
                .bind
                .clone()
                .or(server.bind_addr)
                .unwrap_or(defaults.bind_addr),
            data_file: cli.data_file.clone().or(document.data_file),
            admin_tokens,
            max_payload_size: cli
                .max_payload_size
                .or(server.max_payload_size)
                .unwrap_or(defaults.max_payload_size),
            broadcast_capacity: document
                .broadcast_capacity
                .unwrap_or(defaults.broadcast_capacity),
            log_level: cli.log_level.clone(),
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("seva-store").join("config.toml"))
}

fn read_config_file(path: &Path) -> Result<StoreConfigFile, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&contents)?)
}
