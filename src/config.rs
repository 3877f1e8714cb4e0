// Configuration file loading
//
// Settings come from a YAML file, by default `<config dir>/todostore/config.yml`:
//
//   backend: file          # file | sqlite | memory
//   data_dir: /some/where  # default: <data dir>/todostore
//   log_level: warn        # error | warn | info | debug | trace

use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::Level;

const APP_DIR: &str = "todostore";
const CONFIG_FILE: &str = "config.yml";

/// Which storage backend the store writes through to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// One JSON file per key in the data directory
    #[default]
    File,
    /// A SQLite database in the data directory
    Sqlite,
    /// Nothing is persisted past the current process
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub backend: BackendKind,
    pub data_dir: Option<PathBuf>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            data_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Default location of the config file, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load configuration from `path`, or from [`Config::default_path`].
    ///
    /// A missing file yields the defaults. A file that exists but does not
    /// parse, or names an unknown log level, is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read config file {}", path.display()));
            }
        };

        Self::parse(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse configuration from YAML text
    pub fn parse(content: &str) -> Result<Self> {
        // An empty YAML document deserializes as null
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(content).context("Failed to parse YAML")?;
        config.level()?;
        Ok(config)
    }

    /// Directory the file and sqlite backends keep their data in
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::data_dir()
                .map(|dir| dir.join(APP_DIR))
                .ok_or_else(|| eyre!("Could not determine a data directory; set data_dir in the config")),
        }
    }

    /// The configured log level
    pub fn level(&self) -> Result<Level> {
        self.log_level
            .parse::<Level>()
            .map_err(|_| eyre!("Invalid log level: {}", self.log_level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend, BackendKind::File);
        assert_eq!(config.data_dir, None);
        assert_eq!(config.level().unwrap(), Level::WARN);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = Config::load(Some(&temp.path().join("absent.yml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yml");
        fs::write(&path, "backend: sqlite\ndata_dir: /tmp/todos\nlog_level: debug\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.backend, BackendKind::Sqlite);
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/todos")));
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/tmp/todos"));
        assert_eq!(config.level().unwrap(), Level::DEBUG);
    }

    #[test]
    fn test_parse_partial_fills_defaults() {
        let config = Config::parse("backend: memory\n").unwrap();
        assert_eq!(config.backend, BackendKind::Memory);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_parse_empty_document() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
        assert_eq!(Config::parse("\n  \n").unwrap(), Config::default());
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        assert!(Config::parse("backend: postgres\n").is_err());
        assert!(Config::parse("log_level: loud\n").is_err());
        assert!(Config::parse("colour: blue\n").is_err());
    }

    #[test]
    fn test_load_malformed_file_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yml");
        fs::write(&path, "backend: [unclosed\n").unwrap();

        assert!(Config::load(Some(&path)).is_err());
    }
}
