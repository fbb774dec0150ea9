//! Runtime configuration and datapath capacity constants.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Maximum entries of a dynamic-length (LPM) map.
///
/// Elements are not preallocated, so this can be bumped later.
pub const MAX_LPM_ENTRIES: u32 = 1024 * 64;

/// Maximum entries of a fixed-length (hash) map.
pub const MAX_HASH_ENTRIES: u32 = 1024 * 1024 * 20;

/// Name prefix shared by all prefilter maps.
pub const MAP_NAME_PREFIX: &str = "prefilter_cidr_";

/// Default directory maps are pinned under.
pub const DEFAULT_PIN_DIR: &str = "/sys/fs/bpf/tc/globals";

bitflags! {
    /// Feature markers the datapath is compiled with.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FilterFeatures: u32 {
        /// IPv4 prefilter is compiled in.
        const CIDR4_FILTER = 0b0001;
        /// IPv4 longest-prefix-match lookups are compiled in.
        const CIDR4_LPM_PREFILTER = 0b0010;
        /// IPv6 prefilter is compiled in.
        const CIDR6_FILTER = 0b0100;
        /// IPv6 longest-prefix-match lookups are compiled in.
        const CIDR6_LPM_PREFILTER = 0b1000;
    }
}

impl FilterFeatures {
    /// Marker names in header emission order.
    pub fn names(&self) -> Vec<&'static str> {
        self.iter_names().map(|(name, _)| name).collect()
    }
}

/// Prefilter configuration, read once at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreFilterConfig {
    /// Whether the XDP prefilter is active
    pub enable_xdp_prefilter: bool,
    /// Directory the CIDR maps are pinned under
    pub pin_dir: PathBuf,
}

impl PreFilterConfig {
    /// Create a config with the given enable flag and the default pin directory.
    pub fn new(enable_xdp_prefilter: bool) -> Self {
        Self {
            enable_xdp_prefilter,
            ..Self::default()
        }
    }

    /// Set the pin directory.
    pub fn with_pin_dir(mut self, pin_dir: impl Into<PathBuf>) -> Self {
        self.pin_dir = pin_dir.into();
        self
    }

    /// Parse a config from YAML text. Missing keys take their defaults.
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load a config from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}

impl Default for PreFilterConfig {
    fn default() -> Self {
        Self {
            enable_xdp_prefilter: false,
            pin_dir: PathBuf::from(DEFAULT_PIN_DIR),
        }
    }
}
