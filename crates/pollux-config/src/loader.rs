//! Configuration loader with multi-source merging

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;

use crate::PolluxConfig;

/// Git-tracked project configuration.
const PROJECT_FILE: &str = "pollux.toml";
/// Gitignored overrides of [`PROJECT_FILE`].
const LOCAL_FILE: &str = "pollux.local.toml";

/// `~/.config/pollux/config.toml`, or its platform equivalent.
fn user_config_file() -> Option<PathBuf> {
    ProjectDirs::from("org", "Pollux", "pollux").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    user_config: bool,
}

impl ConfigLoader {
    /// Create a new config loader with default project directory (current dir)
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "POLLUX".to_string(),
            user_config: true,
        }
    }

    /// Set the project directory
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "POLLUX")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Skip ~/.config/pollux/config.toml
    pub fn without_user_config(mut self) -> Self {
        self.user_config = false;
        self
    }

    /// Configuration files that exist, lowest precedence first: user
    /// defaults, `pollux.toml`, then `pollux.local.toml`.
    pub fn config_files(&self) -> Vec<PathBuf> {
        let user = self.user_config.then(user_config_file).flatten();
        user.into_iter()
            .chain([
                self.project_dir.join(PROJECT_FILE),
                self.project_dir.join(LOCAL_FILE),
            ])
            .filter(|file| file.exists())
            .collect()
    }

    /// Load configuration from all sources with proper precedence
    ///
    /// Built-in defaults come first, then each of [`Self::config_files`],
    /// then environment variables (`POLLUX_CHECKING__ALPHA`, ...). Field
    /// names contain underscores, so nesting uses a double underscore. The
    /// merged result must pass [`PolluxConfig::validate`].
    pub fn load(self) -> Result<PolluxConfig> {
        let defaults = config::Config::try_from(&PolluxConfig::default())?;
        let files = self.config_files().into_iter().map(|file| {
            config::File::from(file)
                .required(false)
                .format(config::FileFormat::Toml)
        });
        let environment = config::Environment::with_prefix(&self.env_prefix)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true);

        let config = files
            .fold(config::Config::builder().add_source(defaults), |builder, file| {
                builder.add_source(file)
            })
            .add_source(environment)
            .build()
            .context("Failed to build configuration")?;

        let pollux_config: PolluxConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        pollux_config
            .validate()
            .context("Configuration failed validation")?;

        Ok(pollux_config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default(self) -> PolluxConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
