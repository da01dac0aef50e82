use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmSection,
    pub demo: DemoSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub model: String,
    /// Override for OpenAI-compatible endpoints.
    pub base_url: Option<String>,
    /// Environment variable holding the API key. Unset key means the REPL
    /// runs on rule-based parsing only.
    pub api_key_env: String,
}

/// The local REPL talks as a single seeded demo user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoSection {
    pub phone: String,
    pub name: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            llm: LlmSection::default(),
            demo: DemoSection::default(),
        }
    }
}

impl Default for LlmSection {
    fn default() -> Self {
        LlmSection {
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

impl Default for DemoSection {
    fn default() -> Self {
        DemoSection {
            phone: "+15550100".to_string(),
            name: "Alex".to_string(),
        }
    }
}

pub fn load(path: Option<PathBuf>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_parse_from_empty_toml() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.llm.api_key_env, "OPENAI_API_KEY");
        assert!(!cfg.demo.phone.is_empty());
    }

    #[test]
    fn test_partial_override() {
        let cfg: Config = toml::from_str("[llm]\nmodel = \"gpt-4o\"").unwrap();
        assert_eq!(cfg.llm.model, "gpt-4o");
        assert_eq!(cfg.demo.name, "Alex");
    }
}
