//! Configuration file handling for the cansock CLI

use anyhow::{Context, Result};
use cansock::TransportConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_INTERFACE: &str = "vcan0";

/// Configuration for the CLI tool
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Default interface name
    pub interface: Option<String>,
    /// Transport backing the socket
    pub transport: Option<TransportConfig>,
    /// `CAN_RAW_LOOPBACK` applied after opening
    pub loopback: Option<bool>,
    /// `CAN_RAW_RECV_OWN_MSGS` applied after opening
    pub recv_own_msgs: Option<bool>,
    /// Disable colored output
    pub no_color: Option<bool>,
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("cansock");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(&self, interface: Option<&str>, no_color: bool) -> MergedConfig {
        MergedConfig {
            interface: interface
                .map(String::from)
                .or_else(|| self.interface.clone())
                .unwrap_or_else(|| DEFAULT_INTERFACE.to_string()),
            transport: self.transport.clone().unwrap_or_default(),
            loopback: self.loopback,
            recv_own_msgs: self.recv_own_msgs,
            no_color: no_color || self.no_color.unwrap_or(false),
        }
    }
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone, PartialEq)]
pub struct MergedConfig {
    pub interface: String,
    pub transport: TransportConfig,
    pub loopback: Option<bool>,
    pub recv_own_msgs: Option<bool>,
    pub no_color: bool,
}
