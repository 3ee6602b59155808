//! Configuration file support for ngsfw.
//!
//! An `ngsfw.toml` file persists project settings so CLI flags do not
//! have to be repeated. The file is searched for in the current directory
//! and its parents, stopping at a repository root.
//!
//! ## Example Configuration
//!
//! ```toml
//! [project]
//! source = "/opt/src/ngstore"
//!
//! [build]
//! jobs = 8
//! targets = ["arm64-iPhoneOS", "x86_64-iPhoneSimulator"]
//! ```
//!
//! All keys are optional; CLI flags take precedence over file values.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// The default configuration file name.
pub const CONFIG_FILE_NAME: &str = "ngsfw.toml";

/// Root configuration structure for `ngsfw.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NgsfwConfig {
    /// Project-level configuration.
    pub project: ProjectSection,

    /// Build knobs.
    pub build: BuildSection,
}

/// Project-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProjectSection {
    /// Library source directory. The CLI `--repo` flag overrides it; the
    /// fallback is the current directory.
    pub source: Option<PathBuf>,
}

/// Build knobs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BuildSection {
    /// Parallel job hint for each target's build step.
    ///
    /// Defaults to one job per host core.
    pub jobs: Option<usize>,

    /// Target pairs to build, spelled like the build-tree directory names
    /// (e.g. `arm64-iPhoneOS`).
    ///
    /// Defaults to all five pairs.
    pub targets: Option<Vec<String>>,
}

impl NgsfwConfig {
    /// Loads configuration from the specified file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: NgsfwConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Attempts to find and load configuration from the current directory
    /// or any parent directory.
    ///
    /// # Returns
    ///
    /// * `Ok(Some((config, path)))` - Found and loaded configuration with its path
    /// * `Ok(None)` - No configuration file found
    /// * `Err` - If a config file was found but couldn't be parsed
    pub fn discover() -> Result<Option<(Self, PathBuf)>> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;
        Self::discover_from(&cwd)
    }

    /// Attempts to find and load configuration starting from the
    /// specified directory, walking up until a config file is found or a
    /// repository root (or the filesystem root) is reached.
    pub fn discover_from(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.is_file() {
                let config = Self::load_from_file(&config_path)?;
                return Ok(Some((config, config_path)));
            }

            // Stop at repository root or filesystem root
            if current.join(".git").exists() || !current.pop() {
                break;
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_config() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            r#"[project]
source = "/opt/src/ngstore"

[build]
jobs = 8
targets = ["arm64-iPhoneOS"]
"#,
        )
        .unwrap();

        let config = NgsfwConfig::load_from_file(&path).unwrap();
        assert_eq!(
            config.project.source,
            Some(PathBuf::from("/opt/src/ngstore"))
        );
        assert_eq!(config.build.jobs, Some(8));
        assert_eq!(config.build.targets, Some(vec!["arm64-iPhoneOS".into()]));
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "").unwrap();

        let config = NgsfwConfig::load_from_file(&path).unwrap();
        assert!(config.project.source.is_none());
        assert!(config.build.jobs.is_none());
        assert!(config.build.targets.is_none());
    }

    #[test]
    fn test_discover_walks_up_to_parent() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE_NAME), "[build]\njobs = 2\n").unwrap();
        let nested = tmp.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();

        let (config, path) = NgsfwConfig::discover_from(&nested).unwrap().unwrap();
        assert_eq!(config.build.jobs, Some(2));
        assert_eq!(path, tmp.path().join(CONFIG_FILE_NAME));
    }

    #[test]
    fn test_discover_stops_at_repository_root() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE_NAME), "[build]\njobs = 2\n").unwrap();
        let repo = tmp.path().join("repo");
        fs::create_dir_all(repo.join(".git")).unwrap();

        // The config above the repository root is not picked up.
        assert!(NgsfwConfig::discover_from(&repo).unwrap().is_none());
    }

    #[test]
    fn test_load_missing_file_errors() {
        let err = NgsfwConfig::load_from_file(Path::new("/nonexistent/ngsfw.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
