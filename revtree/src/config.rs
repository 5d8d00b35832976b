//! User configuration for revtree.
//!
//! Read once at startup from `$XDG_CONFIG_HOME/revtree/config.toml`, falling
//! back to `~/.config/revtree/config.toml`. Every key is optional. A missing
//! file means defaults; a malformed file also means defaults, with the parse
//! error reported on stderr before the terminal is taken over.

use std::path::PathBuf;

use revtree_core::BulkPolicy;
use serde::Deserialize;

/// Settings recognised in `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Theme name: `"dark"` or `"catppuccin-mocha"`.
    pub theme: String,
    /// What a directory toggle does with files whose reviewed state is still loading.
    pub bulk_policy: BulkPolicy,
    /// `EnvFilter` directive used when `REVTREE_LOG` is unset.
    pub log_level: String,
    /// Fold single-child directory chains into one row (`a/b/c`).
    pub compact_directories: bool,
    /// SQLite file holding reviewed flags, relative to the repository root.
    pub db_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: "catppuccin-mocha".to_owned(),
            bulk_policy: BulkPolicy::default(),
            log_level: "info".to_owned(),
            compact_directories: false,
            db_path: ".revtree/reviews.db".to_owned(),
        }
    }
}

impl Config {
    /// Loads the config file, falling back to defaults on any error.
    pub fn load() -> Self {
        let path = config_path();
        let raw = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(_) => return Self::default(),
        };
        match Self::parse(&raw) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("revtree: config parse error in {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }
}

/// Returns the path to the revtree config file.
///
/// Prefers `$XDG_CONFIG_HOME/revtree/config.toml`; falls back to
/// `~/.config/revtree/config.toml` when the env var is absent.
fn config_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        })
        .unwrap_or_else(|| PathBuf::from(".config"));
    base.join("revtree").join("config.toml")
}
