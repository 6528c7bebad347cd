use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:12315/api";
pub const DEFAULT_REFLOW_COMMAND: &str = "longdown";

/// Runtime settings, read once at startup and handed to whatever needs them.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Local HTTP API endpoint of the note app
    pub api_url: String,
    /// Bearer token for the API server, if it has one configured
    pub token: Option<String>,
    /// External markdown reflow tool invoked by the `longdown` command
    pub reflow_command: String,
    /// Limit on nested embed substitutions; unguarded when unset
    pub max_embed_depth: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            reflow_command: DEFAULT_REFLOW_COMMAND.to_string(),
            max_embed_depth: None,
        }
    }
}

impl Settings {
    /// Defaults overlaid by `LOGSEQ_*` environment variables.
    pub fn load() -> Result<Self> {
        Self::from_env(Environment::with_prefix("LOGSEQ"))
    }

    /// Values stay strings (tokens like `007` must survive); serde parses the numeric ones.
    fn from_env(env: Environment) -> Result<Self> {
        Config::builder()
            .set_default("api_url", DEFAULT_API_URL)?
            .set_default("reflow_command", DEFAULT_REFLOW_COMMAND)?
            .add_source(env)
            .build()
            .context("Failed to read LOGSEQ_* settings")?
            .try_deserialize()
            .context("Invalid LOGSEQ_* settings")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_api() {
        let s = Settings::default();
        assert_eq!(s.api_url, "http://127.0.0.1:12315/api");
        assert_eq!(s.reflow_command, "longdown");
        assert!(s.token.is_none());
        assert!(s.max_embed_depth.is_none());
    }

    fn env(vars: &[(&str, &str)]) -> Environment {
        let mut map = config::Map::new();
        for (k, v) in vars {
            map.insert(k.to_string(), v.to_string());
        }
        Environment::with_prefix("LOGSEQ").source(Some(map))
    }

    #[test]
    fn token_is_kept_verbatim() {
        let s = Settings::from_env(env(&[
            ("LOGSEQ_TOKEN", "007"),
            ("LOGSEQ_MAX_EMBED_DEPTH", "5"),
        ]))
        .unwrap();
        assert_eq!(s.token.as_deref(), Some("007"));
        assert_eq!(s.max_embed_depth, Some(5));
        assert_eq!(s.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn long_numeric_token_is_not_a_number() {
        let s = Settings::from_env(env(&[("LOGSEQ_TOKEN", "123456789012345678901234567890")])).unwrap();
        assert_eq!(s.token.as_deref(), Some("123456789012345678901234567890"));
    }

    #[test]
    fn env_overrides_defaults() {
        let s = Settings::from_env(env(&[
            ("LOGSEQ_API_URL", "http://localhost:9999/api"),
            ("LOGSEQ_REFLOW_COMMAND", "reflow"),
        ]))
        .unwrap();
        assert_eq!(s.api_url, "http://localhost:9999/api");
        assert_eq!(s.reflow_command, "reflow");
        assert!(s.token.is_none());
    }
}
