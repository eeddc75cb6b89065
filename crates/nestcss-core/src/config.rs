use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::compat::Browser;
use crate::context::Context;
use crate::error::CompileError;
use crate::parser::parse_value;

/// Compilation settings read from JSON:
///
/// ```json
/// {
///   "browsers": [{ "browser": "chrome", "version": 30 }],
///   "variables": { "primary": "#336699" }
/// }
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browsers: Vec<Browser>,
    pub variables: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid value for ${name}: {source}")]
    Variable {
        name: String,
        source: CompileError,
    },
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Builds a [`Context`], parsing each variable with the value parser.
    pub fn into_context(self) -> Result<Context, ConfigError> {
        let mut context = Context::new().with_browsers(self.browsers);
        for (name, text) in self.variables {
            let value = parse_value(&text).map_err(|source| ConfigError::Variable {
                name: name.clone(),
                source,
            })?;
            context.set_variable(name, value);
        }
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compat::BrowserType;
    use crate::value::Value;

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures/config")
            .join(name)
    }

    #[test]
    fn load_browsers_and_variables() {
        let config = Config::load(fixture("legacy.json")).expect("load config");
        assert_eq!(config.browsers.len(), 2);
        assert_eq!(config.browsers[0].kind, BrowserType::Chrome);
        let context = config.into_context().expect("build context");
        assert_eq!(context.target_version(BrowserType::Firefox), 15.0);
        assert_eq!(
            context.scope().resolve("gutter").unwrap(),
            Value::unit(12.0, "px")
        );
    }

    #[test]
    fn missing_sections_default() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert!(config.browsers.is_empty());
        assert!(config.variables.is_empty());
    }

    #[test]
    fn missing_file_error() {
        let err = Config::load(fixture("missing.json")).unwrap_err();
        assert!(err.to_string().contains("Could not read"));
    }

    #[test]
    fn unknown_browser_is_rejected() {
        let err = serde_json::from_str::<Config>(r#"{"browsers":[{"browser":"netscape","version":4}]}"#);
        assert!(err.is_err());
    }

    #[test]
    fn bad_variable_is_reported() {
        let mut config = Config::default();
        config.variables.insert("broken".into(), "'open".into());
        let err = config.into_context().unwrap_err();
        assert!(matches!(err, ConfigError::Variable { ref name, .. } if name == "broken"));
    }
}
