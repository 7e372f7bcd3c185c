use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "lmsd.toml";

/// Workspace-level configuration read from `lmsd.toml`. Every field is optional
/// in the file; missing fields take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub default_currency: String,
    pub min_withdrawal_cents: i64,
    pub certificate_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_currency: "USD".to_string(),
            min_withdrawal_cents: 1000,
            certificate_prefix: "LMS".to_string(),
        }
    }
}

impl Config {
    pub fn load(workspace: &Path) -> anyhow::Result<Self> {
        let path = workspace.join(CONFIG_FILE_NAME);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.to_string_lossy()))?;
        Self::parse(&raw).with_context(|| format!("invalid {}", path.to_string_lossy()))
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let cfg: Config = toml::from_str(raw)?;
        if cfg.min_withdrawal_cents < 0 {
            anyhow::bail!("min_withdrawal_cents must not be negative");
        }
        if cfg.default_currency.trim().len() != 3 {
            anyhow::bail!("default_currency must be a 3-letter code");
        }
        Ok(Config {
            default_currency: cfg.default_currency.trim().to_ascii_uppercase(),
            ..cfg
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = Config::parse("").expect("parse");
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let cfg = Config::parse("default_currency = \"eur\"\nmin_withdrawal_cents = 0\n")
            .expect("parse");
        assert_eq!(cfg.default_currency, "EUR");
        assert_eq!(cfg.min_withdrawal_cents, 0);
        assert_eq!(cfg.certificate_prefix, "LMS");
    }

    #[test]
    fn negative_minimum_is_rejected() {
        assert!(Config::parse("min_withdrawal_cents = -5").is_err());
    }
}
