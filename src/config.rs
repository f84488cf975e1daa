//! Bridge configuration
//!
//! ```toml
//! base_path = "/opt/game/nx/"
//! preload = ["Map.nx", "UI.nx"]
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Archives warmed at initialization when no preload list is given
pub const DEFAULT_PRELOAD: [&str; 5] = ["Map.nx", "Character.nx", "Item.nx", "String.nx", "UI.nx"];

/// Process-level settings for one bridge session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Directory prefix for archive files; always ends in a separator once normalized
    pub base_path: String,

    /// Archive names opened best-effort at initialization
    #[serde(default = "default_preload")]
    pub preload: Vec<String>,
}

fn default_preload() -> Vec<String> {
    DEFAULT_PRELOAD.iter().map(|s| s.to_string()).collect()
}

impl BridgeConfig {
    /// Config with the default preload set
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: normalize_base_path(base_path.into()),
            preload: default_preload(),
        }
    }

    /// Replace the preload set
    pub fn with_preload<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preload = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: BridgeConfig = toml::from_str(content)?;
        config.base_path = normalize_base_path(config.base_path);
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }
}

/// Append `/` unless the path already ends in `/` or `\`
///
/// An empty path stays empty so archive names resolve against the working
/// directory.
pub fn normalize_base_path(mut path: String) -> String {
    if !path.is_empty() && !path.ends_with('/') && !path.ends_with('\\') {
        path.push('/');
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_trailing_separator_is_appended() {
        assert_eq!(BridgeConfig::new("/data").base_path, "/data/");
        assert_eq!(BridgeConfig::new("/data/").base_path, "/data/");
        assert_eq!(BridgeConfig::new("C:\\nx\\").base_path, "C:\\nx\\");
        assert_eq!(BridgeConfig::new("").base_path, "");
    }

    #[test]
    fn test_default_preload_set() {
        let config = BridgeConfig::new("/data");
        assert_eq!(
            config.preload,
            vec!["Map.nx", "Character.nx", "Item.nx", "String.nx", "UI.nx"]
        );
    }

    #[test]
    fn test_toml_without_preload_uses_default() {
        let config = BridgeConfig::from_toml_str("base_path = \"/srv/nx\"").unwrap();
        assert_eq!(config.base_path, "/srv/nx/");
        assert_eq!(config.preload.len(), DEFAULT_PRELOAD.len());
    }

    #[test]
    fn test_from_file() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "base_path = \"/srv/nx/\"")?;
        writeln!(file, "preload = [\"Map.nx\"]")?;
        file.flush()?;

        let config = BridgeConfig::from_file(file.path())?;
        assert_eq!(config.base_path, "/srv/nx/");
        assert_eq!(config.preload, vec!["Map.nx"]);

        let roundtrip = BridgeConfig::from_toml_str(&config.to_toml_string()?)?;
        assert_eq!(roundtrip, config);
        Ok(())
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = BridgeConfig::from_toml_str("base_path = ");
        assert!(matches!(result, Err(crate::BridgeError::Config(_))));
    }
}
