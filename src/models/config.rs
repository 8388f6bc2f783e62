// Instance Agent - Agent Configuration
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Agent configuration model.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::os::OsFamily;
use super::{Error, Result, CONFIG_DIR_NAME, CONFIG_FILE_NAME, SYSTEM_CONFIG_DIR};

/// Owner applied to every file the agent writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOwner {
    pub uid: u32,
    pub gid: u32,
}

impl Default for FileOwner {
    fn default() -> Self {
        Self { uid: 0, gid: 0 }
    }
}

/// Agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Filesystem root every configuration path is resolved against.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Force a backend instead of detecting the OS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_family: Option<OsFamily>,

    /// Change ownership of written files.
    #[serde(default = "default_true")]
    pub chown_files: bool,

    /// Owner for written files (root:root unless overridden).
    #[serde(default)]
    pub file_owner: FileOwner,

    /// Restart networking even when no file changed.
    #[serde(default)]
    pub restart_when_unchanged: bool,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Extra label → interface name mappings, consulted before the built-in table.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub interface_labels: BTreeMap<String, String>,
}

fn default_root() -> PathBuf {
    PathBuf::from("/")
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            os_family: None,
            chown_files: true,
            file_owner: FileOwner::default(),
            restart_when_unchanged: false,
            log_level: default_log_level(),
            interface_labels: BTreeMap::new(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigReadFailed(format!("{}: {}", path.display(), e)))?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644));
        }
        Ok(())
    }

    /// Load the configuration the agent should run with.
    ///
    /// An explicit path must exist. Otherwise the system file is tried,
    /// then the per-user config directory, then defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            info!("Loading configuration from {:?}", path);
            return Self::load_from_file(path);
        }

        for candidate in Self::search_paths() {
            if candidate.exists() {
                info!("Loading configuration from {:?}", candidate);
                return Self::load_from_file(&candidate);
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Candidate configuration file locations, most specific first.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![Path::new(SYSTEM_CONFIG_DIR)
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
        }
        paths
    }

    /// Owner to apply to written files, if ownership changes are enabled.
    pub fn owner(&self) -> Option<FileOwner> {
        self.chown_files.then_some(self.file_owner)
    }
}
