//! Driver configuration loaded from TOML
//!
//! ```toml
//! [expansion]
//! mode = "strict"
//!
//! [capture]
//! severity = "warning"
//! eager_calls = ["sequence"]
//! ```

use crate::ConfigError;
use anyhow::{Context, Result};
use rk_capture::CaptureConfig;
use rk_macro::ExpansionMode;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for one [`Compiler`](crate::Compiler)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    /// Macro expansion settings
    pub expansion: ExpansionConfig,
    /// Capture checker settings
    pub capture: CaptureConfig,
}

/// `[expansion]` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExpansionConfig {
    /// Whether skipped rules are reported
    pub mode: ExpansionMode,
}

impl DriverConfig {
    /// Parses a configuration document; missing tables take their defaults
    ///
    /// # Errors
    ///
    /// Fails on malformed TOML, unknown keys or values of the wrong type.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses the configuration file at `path`
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or does not parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rk_ir::Severity;
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let config = DriverConfig::from_toml_str("").expect("parses");
        assert_eq!(config, DriverConfig::default());
        assert_eq!(config.expansion.mode, ExpansionMode::Lenient);
        assert_eq!(config.capture.severity, Severity::Error);
    }

    #[test]
    fn every_key_is_read() {
        let config = DriverConfig::from_toml_str(
            r#"
            [expansion]
            mode = "strict"

            [capture]
            severity = "warning"
            eager_calls = ["sequence", "buildList"]
            "#,
        )
        .expect("parses");
        assert_eq!(config.expansion.mode, ExpansionMode::Strict);
        assert_eq!(config.capture.severity, Severity::Warning);
        assert_eq!(config.capture.eager_calls, vec!["sequence", "buildList"]);
    }

    #[test]
    fn unknown_keys_and_bad_values_are_rejected() {
        assert!(DriverConfig::from_toml_str("[expansoin]\nmode = \"strict\"").is_err());
        let error = DriverConfig::from_toml_str("[expansion]\nmode = \"eager\"").unwrap_err();
        assert!(error.to_string().starts_with("invalid driver configuration"));
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[capture]\nseverity = \"warning\"").expect("write");
        let config = DriverConfig::load(file.path()).expect("loads");
        assert_eq!(config.capture.severity, Severity::Warning);
    }

    #[test]
    fn load_names_the_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("reflekt.toml");
        let error = DriverConfig::load(&path).unwrap_err();
        assert!(format!("{error:#}").contains("reflekt.toml"));
    }
}
