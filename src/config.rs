use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Overrides the directory holding `tooltool.py` (set by automation).
pub const EXTERNAL_TOOLS_ENV: &str = "EXTERNALTOOLSPATH";
/// Overrides the tooltool cache directory.
pub const TOOLTOOL_CACHE_ENV: &str = "TOOLTOOLCACHE";

const DEFAULT_TOOLTOOL_CACHE: &str = "/builds/tooltool_cache";
const DEFAULT_FALLBACK_TOOLS_DIR: &str = "mozharness/external_tools";
const TOOLTOOL_SCRIPT: &str = "tooltool.py";

/// Harness configuration, resolved once at startup and passed down by reference.
///
/// Layering is defaults, then an optional TOML file, then environment overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Directory containing the fetch tool when running under automation.
    pub external_tools_dir: Option<PathBuf>,
    /// Directory searched for the fetch tool when no override is set.
    pub fallback_tools_dir: PathBuf,
    /// Shared fetch cache used for non-local runs.
    pub tooltool_cache: PathBuf,
    /// Interpreter for `.py` fetch tools; looked up on PATH when unset.
    pub python: Option<PathBuf>,
    pub tar_program: PathBuf,
    pub unzip_program: PathBuf,
    pub user_agent: String,
    pub connect_timeout_secs: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            external_tools_dir: None,
            fallback_tools_dir: PathBuf::from(DEFAULT_FALLBACK_TOOLS_DIR),
            tooltool_cache: PathBuf::from(DEFAULT_TOOLTOOL_CACHE),
            python: None,
            tar_program: PathBuf::from("tar"),
            unzip_program: PathBuf::from("unzip"),
            user_agent: concat!("harness-fetch/", env!("CARGO_PKG_VERSION")).to_string(),
            connect_timeout_secs: 30,
        }
    }
}

impl HarnessConfig {
    /// Build the startup configuration.
    ///
    /// Reads `path` if given, otherwise the per-user config file when present,
    /// then applies the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::user_config_path().filter(|p| p.exists()),
        };

        let config = match file {
            Some(file) => {
                log::debug!("Loading config from {}", file.display());
                Self::from_file(&file)?
            }
            None => Self::default(),
        };

        Ok(config.with_env(|key| std::env::var(key).ok()))
    }

    /// `<config dir>/harness-fetch/config.toml`
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("harness-fetch").join("config.toml"))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply environment overrides using `lookup` as the variable source.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(EXTERNAL_TOOLS_ENV) {
            self.external_tools_dir = Some(PathBuf::from(dir));
        }
        if let Some(cache) = lookup(TOOLTOOL_CACHE_ENV) {
            self.tooltool_cache = PathBuf::from(cache);
        }
        self
    }

    /// Location of the fetch tool.
    pub fn tooltool_path(&self) -> PathBuf {
        self.external_tools_dir
            .as_deref()
            .unwrap_or(&self.fallback_tools_dir)
            .join(TOOLTOOL_SCRIPT)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_point_at_fallback_tools_and_builds_cache() {
        let cfg = HarnessConfig::default().with_env(env(&[]));
        assert_eq!(
            cfg.tooltool_path(),
            PathBuf::from("mozharness/external_tools/tooltool.py")
        );
        assert_eq!(cfg.tooltool_cache, PathBuf::from("/builds/tooltool_cache"));
    }

    #[test]
    fn environment_overrides_tools_dir_and_cache() {
        let cfg = HarnessConfig::default().with_env(env(&[
            (EXTERNAL_TOOLS_ENV, "/opt/tools"),
            (TOOLTOOL_CACHE_ENV, "/tmp/tt-cache"),
        ]));
        assert_eq!(cfg.tooltool_path(), PathBuf::from("/opt/tools/tooltool.py"));
        assert_eq!(cfg.tooltool_cache, PathBuf::from("/tmp/tt-cache"));
    }

    #[test]
    fn file_values_are_overridden_by_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
tooltool_cache = "/srv/cache"
tar_program = "/usr/bin/bsdtar"
connect_timeout_secs = 5
"#,
        )
        .unwrap();

        let cfg = HarnessConfig::from_file(&path).unwrap();
        assert_eq!(cfg.tar_program, PathBuf::from("/usr/bin/bsdtar"));
        assert_eq!(cfg.unzip_program, PathBuf::from("unzip"));
        assert_eq!(cfg.connect_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.tooltool_cache, PathBuf::from("/srv/cache"));

        let cfg = cfg.with_env(env(&[(TOOLTOOL_CACHE_ENV, "/env/cache")]));
        assert_eq!(cfg.tooltool_cache, PathBuf::from("/env/cache"));
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "connect_timeout_secs = \"soon\"").unwrap();

        let err = HarnessConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = HarnessConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
