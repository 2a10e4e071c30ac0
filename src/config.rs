//! Resource configuration for release defaults.
//!
//! Resolution order: the directory named by `ENSEMBLDBRC`, then the user
//! config directory, then built-in defaults.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Environment variable naming the resource directory.
pub const RESOURCE_ENV: &str = "ENSEMBLDBRC";

const CONFIG_FILE: &str = "alnstore.toml";

/// Download and release defaults consumed by the installation tooling and
/// re-emitted by `exportrc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ensembl release the stores were built from.
    pub release: String,
    /// Download host.
    pub host: String,
    /// Remote path prefix on the host.
    pub remote_path: String,
    /// Species installed by default.
    pub species: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            release: "110".to_string(),
            host: "ftp.ensembl.org".to_string(),
            remote_path: "pub".to_string(),
            species: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration, returning it plus the file it came from (if any).
    pub fn load() -> (Self, Option<PathBuf>) {
        if let Ok(dir) = std::env::var(RESOURCE_ENV) {
            let dir = PathBuf::from(dir);
            if let Some(config) = Self::load_from_dir(&dir) {
                return (config, Some(dir.join(CONFIG_FILE)));
            }
        }
        if let Some(dir) = dirs::config_dir() {
            let dir = dir.join("alnstore");
            if let Some(config) = Self::load_from_dir(&dir) {
                return (config, Some(dir.join(CONFIG_FILE)));
            }
        }
        (Self::default(), None)
    }

    /// Load from `dir/alnstore.toml` if present and well-formed.
    pub fn load_from_dir(dir: &Path) -> Option<Self> {
        let content = fs::read_to_string(dir.join(CONFIG_FILE)).ok()?;
        toml::from_str(&content).ok()
    }

    /// Write the default configuration into `dir`, returning the file path.
    pub fn write_default(dir: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(CONFIG_FILE);
        let content = toml::to_string_pretty(&Config::default()).map_err(io::Error::other)?;
        fs::write(&path, content)?;
        Ok(path)
    }
}
