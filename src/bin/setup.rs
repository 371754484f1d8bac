//! wabot setup wizard.
//!
//! Asks for the gateway connection details and bot settings in the terminal
//! and writes `config.toml` to the project root (`WABOT_ROOT`, default `.`).

use anyhow::{Context, Result};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

// ── Config formatting ──────────────────────────────────────────────────────────

struct ConfigParams<'a> {
    prefix: &'a str,
    owner: &'a str,
    port: u16,
    api_url: &'a str,
    api_key: &'a str,
    instance: &'a str,
    webhook_bind: &'a str,
    webhook_url: &'a str,
}

/// TOML string literal for `value`, quotes and backslashes escaped
fn quoted(value: &str) -> String {
    toml::Value::String(value.to_owned()).to_string()
}

/// Produces a valid config.toml string. Extracted so it can be unit-tested.
fn format_config(p: &ConfigParams<'_>) -> String {
    let owner_line = if p.owner.is_empty() {
        "# owner = \"1234567890@s.whatsapp.net\"".to_owned()
    } else {
        format!("owner = {}", quoted(&normalize_owner(p.owner)))
    };

    let prefix = quoted(p.prefix);
    let port = p.port;
    let api_url = quoted(p.api_url);
    let api_key = quoted(p.api_key);
    let instance = quoted(p.instance);
    let webhook_bind = quoted(p.webhook_bind);
    let webhook_url = quoted(p.webhook_url);

    format!(
        r#"[bot]
prefix = {prefix}
{owner_line}

[server]
# The PORT environment variable overrides this
port = {port}

[evolution]
api_url = {api_url}
# The EVOLUTION_API_KEY environment variable overrides this
api_key = {api_key}
instance_name = {instance}
webhook_bind = {webhook_bind}
webhook_url = {webhook_url}
"#
    )
}

/// Accept a bare phone number and turn it into a user jid
fn normalize_owner(owner: &str) -> String {
    if owner.contains('@') {
        owner.to_owned()
    } else {
        let digits: String = owner.chars().filter(char::is_ascii_digit).collect();
        format!("{digits}@s.whatsapp.net")
    }
}

// ── CLI wizard ─────────────────────────────────────────────────────────────────

fn run_cli(project_root: &Path) -> Result<()> {
    println!("=== wabot setup ===\n");

    let read_line = |prompt: &str| -> Result<String> {
        print!("{prompt}");
        io::stdout().flush()?;
        let mut buf = String::new();
        io::stdin().read_line(&mut buf)?;
        Ok(buf.trim().to_owned())
    };

    let or_default = |s: String, default: &str| {
        if s.is_empty() {
            default.to_owned()
        } else {
            s
        }
    };

    let api_url = or_default(
        read_line("Evolution API URL [http://127.0.0.1:8080]: ")?,
        "http://127.0.0.1:8080",
    );
    let api_key = read_line("Evolution API key: ")?;
    let instance = or_default(read_line("Instance name [wabot]: ")?, "wabot");
    let webhook_bind = or_default(
        read_line("Webhook listen address [127.0.0.1:8086]: ")?,
        "127.0.0.1:8086",
    );
    let webhook_url = or_default(
        read_line("Webhook URL reachable by the gateway [http://127.0.0.1:8086/webhook]: ")?,
        "http://127.0.0.1:8086/webhook",
    );
    let prefix = or_default(read_line("Command prefix [!]: ")?, "!");
    let owner = read_line("Owner phone number (optional): ")?;
    let port: u16 = or_default(read_line("Liveness port [3000]: ")?, "3000")
        .parse()
        .context("Port must be a number between 0 and 65535")?;

    let config = format_config(&ConfigParams {
        prefix: &prefix,
        owner: &owner,
        port,
        api_url: &api_url,
        api_key: &api_key,
        instance: &instance,
        webhook_bind: &webhook_bind,
        webhook_url: &webhook_url,
    });

    let config_path = project_root.join("config.toml");
    std::fs::write(&config_path, &config)
        .with_context(|| format!("Could not write {}", config_path.display()))?;

    println!("\n✓  config.toml saved to {}", config_path.display());
    println!("   Run the bot with:  cargo run");
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    // Resolve project root: prefer WABOT_ROOT env, fall back to cwd.
    let project_root =
        PathBuf::from(std::env::var("WABOT_ROOT").unwrap_or_else(|_| ".".to_string()));

    run_cli(&project_root)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
