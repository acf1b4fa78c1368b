/// Settings file for the jsirank CLI (~/.config/jsirank/config.toml).
///
/// Every field is optional. Values given on the command line take precedence.
use serde::Deserialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Deserialize, Default, Debug, Clone, PartialEq)]
pub struct JsirankConfig {
    pub oracle: Option<String>,
    pub noise_level: Option<f64>,
    pub seed: Option<u64>,
    pub pivot: Option<String>,
    pub regularization: Option<f64>,
}

const TEMPLATE: &str = "\
# jsirank configuration
# All values here can be overridden by CLI flags.

# Who answers the comparisons: \"interactive\" (you) or \"simulated\"
# oracle = \"interactive\"

# Simulated oracle only: 0.0 follows the strengths exactly, 1.0 is pure chance
# noise_level = 0.1

# Seed for the simulated oracle and random pivots
# seed = 42

# Pivot choice for the sort: \"first\" or \"random\"
# pivot = \"first\"

# Ghost-player regularization for the Bradley-Terry fit.
# 0.0 disables it. A small value (e.g. 0.01) lets undefeated items be fitted.
# regularization = 0.0
";

impl JsirankConfig {
    /// Read settings from `path`. A file that does not exist means no settings.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(format!("Failed to read config at {}: {e}", path.display())),
        };
        toml::from_str(&content).map_err(|e| format!("Failed to parse config at {}: {e}", path.display()))
    }

    /// Field-wise merge: every value set in `overrides` replaces the one in `self`.
    pub fn overridden_by(self, overrides: JsirankConfig) -> JsirankConfig {
        JsirankConfig {
            oracle: overrides.oracle.or(self.oracle),
            noise_level: overrides.noise_level.or(self.noise_level),
            seed: overrides.seed.or(self.seed),
            pivot: overrides.pivot.or(self.pivot),
            regularization: overrides.regularization.or(self.regularization),
        }
    }
}

/// `$HOME/.config/jsirank/config.toml`, or `None` when HOME is unset.
pub fn default_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config").join("jsirank").join("config.toml"))
}

/// Write the commented template to `path`, creating parent directories.
/// Fails with `AlreadyExists` rather than replacing an existing file.
pub fn write_template(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(TEMPLATE.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_means_no_settings() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(JsirankConfig::from_file(&dir.path().join("nope.toml")).unwrap(), JsirankConfig::default());
    }

    #[test]
    fn test_template_parses_to_all_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        write_template(&path).unwrap();

        assert_eq!(JsirankConfig::from_file(&path).unwrap(), JsirankConfig::default());
    }

    #[test]
    fn test_template_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "seed = 1\n").unwrap();

        let err = write_template(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "seed = 1\n");
    }

    #[test]
    fn test_from_file_values_and_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "oracle = \"simulated\"\nnoise_level = 0.25\nseed = 7\npivot = \"random\"\n").unwrap();

        let cfg = JsirankConfig::from_file(&path).unwrap();
        assert_eq!(cfg.oracle.as_deref(), Some("simulated"));
        assert_eq!(cfg.noise_level, Some(0.25));
        assert_eq!(cfg.seed, Some(7));
        assert_eq!(cfg.pivot.as_deref(), Some("random"));
        assert_eq!(cfg.regularization, None);

        std::fs::write(&path, "seed = \"seven\"\n").unwrap();
        assert!(JsirankConfig::from_file(&path).unwrap_err().contains("Failed to parse"));
    }

    #[test]
    fn test_command_line_values_win() {
        let file = JsirankConfig {
            oracle: Some("simulated".into()),
            seed: Some(1),
            regularization: Some(0.05),
            ..JsirankConfig::default()
        };
        let cli = JsirankConfig {
            seed: Some(9),
            pivot: Some("random".into()),
            ..JsirankConfig::default()
        };

        let merged = file.overridden_by(cli);
        assert_eq!(merged.oracle.as_deref(), Some("simulated"));
        assert_eq!(merged.seed, Some(9));
        assert_eq!(merged.pivot.as_deref(), Some("random"));
        assert_eq!(merged.regularization, Some(0.05));
        assert_eq!(merged.noise_level, None);
    }
}
