//! Node configuration.
//!
//! Settings live in an INI file (by default `~/.config/mediamesh/config.ini`)
//! loaded into [`ConfigFile`]. [`ConfigFile::to_node_config`] validates it
//! and produces the runtime [`NodeConfig`] the application is built from.
//!
//! ```ini
//! [node]
//! owner = Josh
//! advertised_url = http://192.168.1.20:4242
//! master_url = http://192.168.1.10:4242
//!
//! [paths]
//! media_root = /srv/media
//! ```

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::scanner::{DirectoryScanner, DEFAULT_EXTENSIONS, DEFAULT_IGNORED};
use crate::transfer::{
    RetryPolicy, TransferConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_STALL_TIMEOUT,
};

/// Default listen address.
pub const DEFAULT_LISTEN: &str = "0.0.0.0:4242";

/// Default period between scheduled sync runs (1 hour).
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 3600;

/// Default log level when neither the file nor `RUST_LOG` sets one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Name of the downloads folder created under the media root by default.
pub const DEFAULT_DOWNLOADS_DIR: &str = "Downloads";

/// Location of the configuration file.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mediamesh")
        .join("config.ini")
}

/// Location of the catalog database when none is configured.
pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mediamesh")
        .join("catalog.db")
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] ini::ParseError),

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("missing required setting [{section}] {key}")]
    Missing {
        section: &'static str,
        key: &'static str,
    },

    #[error("invalid value '{value}' for [{section}] {key}: {reason}")]
    Invalid {
        section: &'static str,
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("{} already exists (use --force to overwrite)", .0.display())]
    AlreadyExists(PathBuf),
}

/// `[node]`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeSection {
    pub owner: Option<String>,
    pub advertised_url: Option<String>,
    pub listen: Option<String>,
    pub master_url: Option<String>,
    pub allowed_owners: Vec<String>,
}

/// `[paths]`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathsSection {
    pub media_root: Option<PathBuf>,
    pub download_root: Option<PathBuf>,
    pub database: Option<PathBuf>,
}

/// `[auth]`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthSection {
    pub shared_secret: String,
    pub pin: String,
}

/// `[sync]`
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSection {
    pub interval_secs: u64,
    pub on_startup: bool,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            on_startup: true,
        }
    }
}

/// `[transfer]`
#[derive(Debug, Clone, PartialEq)]
pub struct TransferSection {
    pub stall_timeout_secs: u64,
    pub max_attempts: u32,
}

impl Default for TransferSection {
    fn default() -> Self {
        Self {
            stall_timeout_secs: DEFAULT_STALL_TIMEOUT.as_secs(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// `[scanner]`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScannerSection {
    /// Empty means the built-in list.
    pub extensions: Vec<String>,
    /// Empty means the built-in list.
    pub ignore: Vec<String>,
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSection {
    pub level: String,
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            directory: None,
        }
    }
}

/// Contents of the configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub node: NodeSection,
    pub paths: PathsSection,
    pub auth: AuthSection,
    pub sync: SyncSection,
    pub transfer: TransferSection,
    pub scanner: ScannerSection,
    pub logging: LoggingSection,
}

impl ConfigFile {
    /// Load from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file_noescape(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ini(&ini)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str_noescape(contents)?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let get = |section: &str, key: &str| -> Option<String> {
            ini.get_from(Some(section), key)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let mut config = ConfigFile::default();

        config.node.owner = get("node", "owner");
        config.node.advertised_url = get("node", "advertised_url");
        config.node.listen = get("node", "listen");
        config.node.master_url = get("node", "master_url");
        config.node.allowed_owners = split_list(get("node", "allowed_owners"));

        config.paths.media_root = get("paths", "media_root").map(PathBuf::from);
        config.paths.download_root = get("paths", "download_root").map(PathBuf::from);
        config.paths.database = get("paths", "database").map(PathBuf::from);

        config.auth.shared_secret = get("auth", "shared_secret").unwrap_or_default();
        config.auth.pin = get("auth", "pin").unwrap_or_default();

        if let Some(v) = get("sync", "interval_secs") {
            config.sync.interval_secs = parse_number("sync", "interval_secs", &v)?;
        }
        if let Some(v) = get("sync", "on_startup") {
            config.sync.on_startup = parse_bool("sync", "on_startup", &v)?;
        }

        if let Some(v) = get("transfer", "stall_timeout_secs") {
            config.transfer.stall_timeout_secs = parse_number("transfer", "stall_timeout_secs", &v)?;
        }
        if let Some(v) = get("transfer", "max_attempts") {
            config.transfer.max_attempts = parse_number("transfer", "max_attempts", &v)?;
        }

        config.scanner.extensions = split_list(get("scanner", "extensions"));
        config.scanner.ignore = split_list(get("scanner", "ignore"));

        if let Some(level) = get("logging", "level") {
            config.logging.level = level;
        }
        config.logging.directory = get("logging", "directory").map(PathBuf::from);

        Ok(config)
    }

    /// Validate the file and build the runtime configuration.
    pub fn to_node_config(&self) -> Result<NodeConfig, ConfigError> {
        let owner = self.node.owner.clone().ok_or(ConfigError::Missing {
            section: "node",
            key: "owner",
        })?;
        let advertised_url = self.node.advertised_url.clone().ok_or(ConfigError::Missing {
            section: "node",
            key: "advertised_url",
        })?;
        let media_root = self.paths.media_root.clone().ok_or(ConfigError::Missing {
            section: "paths",
            key: "media_root",
        })?;

        let listen = self.node.listen.as_deref().unwrap_or(DEFAULT_LISTEN);
        let listen = parse_listen(listen)?;

        let mut config = NodeConfig::new(owner, advertised_url, media_root)
            .with_listen(listen)
            .with_allowed_owners(self.node.allowed_owners.clone())
            .with_auth(self.auth.shared_secret.clone(), self.auth.pin.clone())
            .with_sync_interval(Duration::from_secs(self.sync.interval_secs))
            .with_sync_on_startup(self.sync.on_startup)
            .with_stall_timeout(Duration::from_secs(self.transfer.stall_timeout_secs))
            .with_max_attempts(self.transfer.max_attempts);

        if let Some(master) = &self.node.master_url {
            config = config.with_master_url(master.clone());
        }
        if let Some(dir) = &self.paths.download_root {
            config = config.with_download_root(dir.clone());
        }
        if let Some(db) = &self.paths.database {
            config = config.with_database(db.clone());
        }
        if !self.scanner.extensions.is_empty() {
            config = config.with_extensions(self.scanner.extensions.clone());
        }
        if !self.scanner.ignore.is_empty() {
            config = config.with_ignored(self.scanner.ignore.clone());
        }
        Ok(config)
    }
}

/// Runtime configuration of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    /// Identity of this node's owner.
    pub owner: String,
    /// Base URL other nodes use to reach this node.
    pub advertised_url: String,
    pub listen: SocketAddr,
    /// Upstream master; `None` makes this node a master.
    pub master_url: Option<String>,
    /// Owners a master accepts pushes from. Empty accepts anyone.
    pub allowed_owners: Vec<String>,
    pub media_root: PathBuf,
    pub download_root: PathBuf,
    pub database: PathBuf,
    pub shared_secret: String,
    pub pin: String,
    /// Zero disables the periodic sync.
    pub sync_interval: Duration,
    pub sync_on_startup: bool,
    pub stall_timeout: Duration,
    pub max_attempts: u32,
    pub extensions: Vec<String>,
    pub ignored: Vec<String>,
}

impl NodeConfig {
    pub fn new(
        owner: impl Into<String>,
        advertised_url: impl Into<String>,
        media_root: impl Into<PathBuf>,
    ) -> Self {
        let media_root = media_root.into();
        Self {
            owner: owner.into(),
            advertised_url: advertised_url.into().trim_end_matches('/').to_string(),
            listen: SocketAddr::from(([0, 0, 0, 0], 4242)),
            master_url: None,
            allowed_owners: Vec::new(),
            download_root: media_root.join(DEFAULT_DOWNLOADS_DIR),
            media_root,
            database: default_database_path(),
            shared_secret: String::new(),
            pin: String::new(),
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            sync_on_startup: true,
            stall_timeout: DEFAULT_STALL_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            ignored: DEFAULT_IGNORED.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_listen(mut self, listen: SocketAddr) -> Self {
        self.listen = listen;
        self
    }

    pub fn with_master_url(mut self, url: impl Into<String>) -> Self {
        self.master_url = Some(url.into());
        self
    }

    pub fn with_allowed_owners(mut self, owners: Vec<String>) -> Self {
        self.allowed_owners = owners;
        self
    }

    pub fn with_download_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_root = dir.into();
        self
    }

    pub fn with_database(mut self, path: impl Into<PathBuf>) -> Self {
        self.database = path.into();
        self
    }

    pub fn with_auth(mut self, secret: impl Into<String>, pin: impl Into<String>) -> Self {
        self.shared_secret = secret.into();
        self.pin = pin.into();
        self
    }

    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    pub fn with_sync_on_startup(mut self, enabled: bool) -> Self {
        self.sync_on_startup = enabled;
        self
    }

    pub fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn with_ignored(mut self, ignored: Vec<String>) -> Self {
        self.ignored = ignored;
        self
    }

    pub fn is_master(&self) -> bool {
        self.master_url.is_none()
    }

    pub fn transfer_config(&self) -> TransferConfig {
        TransferConfig::default()
            .with_stall_timeout(self.stall_timeout)
            .with_policy(RetryPolicy::exponential(self.max_attempts))
            .with_secret(self.shared_secret.clone())
    }

    pub fn scanner(&self) -> DirectoryScanner {
        DirectoryScanner::new(&self.media_root)
            .with_extensions(&self.extensions)
            .with_ignored(&self.ignored)
    }
}

/// Commented starting point written by `mediamesh config init`.
pub const CONFIG_TEMPLATE: &str = r#"# MediaMesh node configuration

[node]
# Identity of this node's owner (required)
owner =
# URL other nodes use to reach this node (required)
advertised_url = http://127.0.0.1:4242
listen = 0.0.0.0:4242
# Leave empty to run as the master
master_url =
# Owners allowed to push to this master, comma separated (empty allows all)
allowed_owners =

[paths]
# Directory whose contents are shared (required)
media_root =
# Where fetched files go (default: <media_root>/Downloads)
download_root =
# Catalog database (default: <data dir>/mediamesh/catalog.db)
database =

[auth]
# Sent between nodes; must match on every node
shared_secret =
# Required from people using the scan and download endpoints
pin =

[sync]
# Seconds between scheduled sync runs, 0 disables
interval_secs = 3600
on_startup = true

[transfer]
stall_timeout_secs = 45
max_attempts = 5

[scanner]
# Comma separated; empty uses the built-in lists
extensions =
ignore =

[logging]
level = info
# Directory for daily rolling log files (empty logs to stdout only)
directory =
"#;

/// Write [`CONFIG_TEMPLATE`] to `path`, creating parent directories.
pub fn write_template(path: &Path, force: bool) -> Result<(), ConfigError> {
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists(path.to_path_buf()));
    }
    let write_error = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_error)?;
    }
    fs::write(path, CONFIG_TEMPLATE).map_err(write_error)
}

fn split_list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_number<T>(section: &'static str, key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        section,
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(section: &'static str, key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(ConfigError::Invalid {
            section,
            key,
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

fn parse_listen(value: &str) -> Result<SocketAddr, ConfigError> {
    value.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
        section: "node",
        key: "listen",
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SATELLITE: &str = r#"
[node]
owner = Josh
advertised_url = http://josh.lan:4242/
listen = 127.0.0.1:5000
master_url = http://master.lan:4242
allowed_owners = Josh, Ana ,

[paths]
media_root = /srv/media
database = /var/lib/mediamesh/catalog.db

[auth]
shared_secret = s3cret
pin = 1234

[sync]
interval_secs = 0
on_startup = no

[transfer]
stall_timeout_secs = 10
max_attempts = 3

[scanner]
extensions = mkv, mp4
"#;

    #[test]
    fn test_parse_full_file() {
        let file = ConfigFile::parse(SATELLITE).unwrap();

        assert_eq!(file.node.owner.as_deref(), Some("Josh"));
        assert_eq!(file.node.allowed_owners, vec!["Josh", "Ana"]);
        assert_eq!(file.sync.interval_secs, 0);
        assert!(!file.sync.on_startup);
        assert_eq!(file.transfer.max_attempts, 3);
        assert_eq!(file.scanner.extensions, vec!["mkv", "mp4"]);
        assert!(file.scanner.ignore.is_empty());
        assert_eq!(file.logging.level, "info");
    }

    #[test]
    fn test_to_node_config() {
        let config = ConfigFile::parse(SATELLITE).unwrap().to_node_config().unwrap();

        assert_eq!(config.owner, "Josh");
        assert_eq!(config.advertised_url, "http://josh.lan:4242");
        assert_eq!(config.listen, "127.0.0.1:5000".parse().unwrap());
        assert!(!config.is_master());
        assert_eq!(config.download_root, PathBuf::from("/srv/media/Downloads"));
        assert_eq!(config.database, PathBuf::from("/var/lib/mediamesh/catalog.db"));
        assert_eq!(config.sync_interval, Duration::ZERO);
        assert_eq!(config.stall_timeout, Duration::from_secs(10));

        let transfer = config.transfer_config();
        assert_eq!(transfer.policy.max_attempts(), 3);
        assert_eq!(transfer.secret, "s3cret");
    }

    #[test]
    fn test_defaults_for_minimal_file() {
        let file = ConfigFile::parse(
            "[node]\nowner = Master\nadvertised_url = http://m:4242\n[paths]\nmedia_root = /m\n",
        )
        .unwrap();
        let config = file.to_node_config().unwrap();

        assert!(config.is_master());
        assert_eq!(config.listen, DEFAULT_LISTEN.parse().unwrap());
        assert_eq!(config.sync_interval, Duration::from_secs(3600));
        assert!(config.sync_on_startup);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.stall_timeout, Duration::from_secs(45));
        assert!(config.extensions.iter().any(|e| e == "mkv"));
    }

    #[test]
    fn test_missing_owner() {
        let file = ConfigFile::parse("[paths]\nmedia_root = /m\n").unwrap();
        let err = file.to_node_config().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Missing {
                section: "node",
                key: "owner"
            }
        ));
    }

    #[test]
    fn test_invalid_number() {
        let err = ConfigFile::parse("[transfer]\nmax_attempts = many\n").unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn test_template_parses_and_needs_owner() {
        let file = ConfigFile::parse(CONFIG_TEMPLATE).unwrap();
        assert_eq!(file.sync.interval_secs, 3600);
        assert!(file.to_node_config().is_err());
    }

    #[test]
    fn test_write_template_respects_force() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.ini");

        write_template(&path, false).unwrap();
        assert!(matches!(
            write_template(&path, false),
            Err(ConfigError::AlreadyExists(_))
        ));
        write_template(&path, true).unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded.logging.level, "info");
    }
}
