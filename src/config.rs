//! Syntax configuration
//!
//! Loaded from TOML; every field is optional and falls back to Jinja's
//! defaults:
//!
//! ```toml
//! variable_start = "<<"
//! variable_end = ">>"
//! keep_trailing_newline = true
//! ```

use crate::error::{Result, TemplateError};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub variable_start: String,
    pub variable_end: String,
    pub block_start: String,
    pub block_end: String,
    pub comment_start: String,
    pub comment_end: String,
    /// Keep a single trailing newline of the source in the output
    pub keep_trailing_newline: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            variable_start: "{{".to_string(),
            variable_end: "}}".to_string(),
            block_start: "{%".to_string(),
            block_end: "%}".to_string(),
            comment_start: "{#".to_string(),
            comment_end: "#}".to_string(),
            keep_trailing_newline: false,
        }
    }
}

impl Config {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(source).map_err(|e| TemplateError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            TemplateError::ConfigError(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Config::from_toml_str(&source)
    }

    /// Delimiters must be non-empty and the three start markers distinct
    pub fn validate(&self) -> Result<()> {
        let delimiters = [
            ("variable_start", &self.variable_start),
            ("variable_end", &self.variable_end),
            ("block_start", &self.block_start),
            ("block_end", &self.block_end),
            ("comment_start", &self.comment_start),
            ("comment_end", &self.comment_end),
        ];
        if let Some((name, _)) = delimiters.iter().find(|(_, d)| d.is_empty()) {
            return Err(TemplateError::ConfigError(format!("{} must not be empty", name)));
        }

        let starts = [
            ("variable_start", &self.variable_start),
            ("block_start", &self.block_start),
            ("comment_start", &self.comment_start),
        ];
        for (i, (a, x)) in starts.iter().enumerate() {
            for (b, y) in &starts[i + 1..] {
                if x == y {
                    return Err(TemplateError::ConfigError(format!(
                        "{} and {} are both '{}'",
                        a, b, x
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.variable_start, "{{");
        assert_eq!(config.comment_end, "#}");
        assert!(!config.keep_trailing_newline);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            variable_start = "<<"
            variable_end = ">>"
            keep_trailing_newline = true
            "#,
        )
        .unwrap();
        assert_eq!(config.variable_start, "<<");
        assert_eq!(config.block_start, "{%");
        assert!(config.keep_trailing_newline);
    }

    #[test]
    fn test_invalid_configs() {
        let err = Config::from_toml_str(r#"block_start = """#).unwrap_err();
        assert!(matches!(err, TemplateError::ConfigError(_)));

        let err = Config::from_toml_str(r#"block_start = "{{""#).unwrap_err();
        assert!(err.to_string().contains("variable_start and block_start"));

        assert!(Config::from_toml_str("unknown_key = 1").is_err());
        assert!(Config::from_toml_str("variable_start = 3").is_err());
    }
}
