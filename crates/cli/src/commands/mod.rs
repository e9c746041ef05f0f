pub mod analyze;
pub mod doctor;
pub mod history;
pub mod init_db;
pub mod migrate;
pub mod onboard;
pub mod serve;

use std::path::{Path, PathBuf};

use vitalbot_config::{AppConfig, ConfigError};

/// Config file in effect: the `--config` argument or the default location.
pub fn config_file(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Load the config file plus environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    AppConfig::load_with_env(&config_file(path))
}
