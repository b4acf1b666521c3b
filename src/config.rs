//! Launcher configuration loaded from TOML.
//!
//! Lives at `~/.config/bisque-devices/devices.toml` (or under
//! `$XDG_CONFIG_HOME`). Every entry in `devices` is a raw device spec in the
//! same form accepted on the command line:
//!
//! ```toml
//! vfkit = "/opt/homebrew/bin/vfkit"
//! devices = [
//!     "virtio-blk,path=/Users/drew/vm/disk.img,deviceId=root",
//!     "virtio-serial,logFilePath=/tmp/console.log",
//!     "virtio-rng",
//! ]
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::devices::Device;
use crate::error::Result;

const APP_NAME: &str = "bisque-devices";
const CONFIG_FILE: &str = "devices.toml";

/// Root of `devices.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LauncherConfig {
    /// Hypervisor binary prefixed to the encoded arguments, if set.
    pub vfkit: Option<PathBuf>,
    /// Raw device specs, dispatched in order.
    pub devices: Vec<String>,
}

impl LauncherConfig {
    pub fn from_toml(s: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Read and parse the config file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("parse config {}", path.display()))?;
        info!(
            path = %path.display(),
            devices = config.devices.len(),
            "loaded launcher config"
        );
        Ok(config)
    }

    /// Load the default config file, or an empty config if it does not exist.
    pub fn load_default() -> anyhow::Result<Self> {
        let path = default_config_path();
        if !path.exists() {
            debug!(path = %path.display(), "no launcher config, using defaults");
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    /// Dispatch every device spec, stopping at the first bad one.
    pub fn parse_devices(&self) -> Result<Vec<Device>> {
        self.devices
            .iter()
            .map(|spec| Device::from_cmdline(spec))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// `$XDG_CONFIG_HOME/bisque-devices/`, else `$HOME/.config/bisque-devices/`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join(APP_NAME);
    }
    let home = std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"));
    home.join(".config").join(APP_NAME)
}

pub fn default_config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE)
}
