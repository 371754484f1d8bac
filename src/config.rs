use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub evolution: EvolutionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    /// Marker that turns a chat message into a bot command
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Owner jid. Reserved for owner-only commands; no command reads it yet.
    #[serde(default)]
    pub owner: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EvolutionConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_instance_name")]
    pub instance_name: String,
    /// Local address the webhook receiver listens on
    #[serde(default = "default_webhook_bind")]
    pub webhook_bind: String,
    /// URL the gateway posts events to; must reach `webhook_bind`
    #[serde(default = "default_webhook_url")]
    pub webhook_url: String,
    /// Instance token the gateway puts in each webhook payload's `apikey`.
    /// Only needed for instances created with their own token.
    #[serde(default)]
    pub webhook_token: Option<String>,
}

impl EvolutionConfig {
    /// Token a webhook payload must carry to be accepted
    pub fn webhook_token(&self) -> &str {
        self.webhook_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.api_key)
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            owner: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: String::new(),
            instance_name: default_instance_name(),
            webhook_bind: default_webhook_bind(),
            webhook_url: default_webhook_url(),
            webhook_token: None,
        }
    }
}

fn default_prefix() -> String {
    "!".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_api_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_instance_name() -> String {
    "wabot".to_string()
}

fn default_webhook_bind() -> String {
    "127.0.0.1:8086".to_string()
}

fn default_webhook_url() -> String {
    "http://127.0.0.1:8086/webhook".to_string()
}

/// Port for the liveness endpoint: a parseable `PORT` value wins over the file.
pub fn resolve_port(configured: u16, env_port: Option<&str>) -> u16 {
    env_port
        .and_then(|p| p.trim().parse::<u16>().ok())
        .unwrap_or(configured)
}

impl Config {
    /// Load the config file, falling back to defaults when it does not exist,
    /// then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)?
        } else {
            info!(
                "Config file {} not found, using defaults",
                path.display()
            );
            Config::default()
        };

        let env_port = std::env::var("PORT").ok();
        config.server.port = resolve_port(config.server.port, env_port.as_deref());

        if let Ok(key) = std::env::var("EVOLUTION_API_KEY") {
            if !key.is_empty() {
                config.evolution.api_key = key;
            }
        }

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.bot.prefix.trim().is_empty() {
            anyhow::bail!("[bot] prefix must not be empty");
        }
        if self.evolution.instance_name.trim().is_empty() {
            anyhow::bail!("[evolution] instance_name must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.bot.prefix, "!");
        assert!(config.bot.owner.is_none());
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.evolution.instance_name, "wabot");
        assert_eq!(config.evolution.webhook_bind, "127.0.0.1:8086");
        assert!(config.evolution.webhook_token.is_none());
    }

    #[test]
    fn test_webhook_token_defaults_to_api_key() {
        let config = Config::parse("[evolution]\napi_key = \"secret\"\n").unwrap();
        assert_eq!(config.evolution.webhook_token(), "secret");

        let config = Config::parse(
            "[evolution]\napi_key = \"secret\"\nwebhook_token = \"instance-token\"\n",
        )
        .unwrap();
        assert_eq!(config.evolution.webhook_token(), "instance-token");
    }

    #[test]
    fn test_full_file() {
        let config = Config::parse(
            r#"
[bot]
prefix = "."
owner = "1234567890@s.whatsapp.net"

[server]
port = 8080

[evolution]
api_url = "http://gateway:8080"
api_key = "secret"
instance_name = "grupo"
webhook_bind = "127.0.0.1:9000"
webhook_url = "http://bot:9000/webhook"
"#,
        )
        .unwrap();
        assert_eq!(config.bot.prefix, ".");
        assert_eq!(
            config.bot.owner.as_deref(),
            Some("1234567890@s.whatsapp.net")
        );
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.evolution.api_url, "http://gateway:8080");
        assert_eq!(config.evolution.api_key, "secret");
        assert_eq!(config.evolution.instance_name, "grupo");
        assert_eq!(config.evolution.webhook_url, "http://bot:9000/webhook");
    }

    #[test]
    fn test_empty_prefix_rejected() {
        let err = Config::parse("[bot]\nprefix = \"  \"\n").unwrap_err();
        assert!(err.to_string().contains("prefix"));
    }

    #[test]
    fn test_env_port_wins() {
        assert_eq!(resolve_port(3000, Some("10000")), 10000);
    }

    #[test]
    fn test_invalid_env_port_ignored() {
        assert_eq!(resolve_port(3000, Some("abc")), 3000);
        assert_eq!(resolve_port(4000, None), 4000);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = Config::load(Path::new("/nonexistent/wabot-config.toml")).unwrap();
        assert_eq!(config.bot.prefix, "!");
    }
}
