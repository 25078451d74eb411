//! Shared setup for commands that run a node.

use std::path::{Path, PathBuf};

use mediamesh::config::{config_file_path, ConfigFile, NodeConfig};
use mediamesh::logging::{init_logging, LoggingConfig, WorkerGuard};
use tokio::runtime::Runtime;
use tracing::info;

use crate::error::CliError;

/// Loads the configuration, installs logging and owns the runtime.
pub struct CliRunner {
    config_path: PathBuf,
    config: ConfigFile,
    runtime: Runtime,
    // Flushes the log file on drop.
    _log_guard: Option<WorkerGuard>,
}

impl CliRunner {
    pub fn new(config_path: Option<&Path>) -> Result<Self, CliError> {
        let config_path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(config_file_path);
        let config = ConfigFile::load_from(&config_path).map_err(|e| {
            CliError::Config(format!(
                "{}. Run 'mediamesh config init' to create a template.",
                e
            ))
        })?;

        let log_guard = init_logging(&LoggingConfig::from(&config.logging))?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(CliError::Runtime)?;

        Ok(Self {
            config_path,
            config,
            runtime,
            _log_guard: log_guard,
        })
    }

    pub fn log_startup(&self, command: &str) {
        info!(
            version = mediamesh::VERSION,
            command,
            config = %self.config_path.display(),
            "MediaMesh starting"
        );
    }

    pub fn node_config(&self) -> Result<NodeConfig, CliError> {
        Ok(self.config.to_node_config()?)
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }
}
