//! Config command handlers

use anyhow::{bail, Context, Result};

use tandem_core::Config;

use crate::output::{Output, OutputFormat};

const VALID_KEYS: &str = "data_dir, database_name, endpoint, api_key, polling_enabled, \
                          poll_interval_ms, tombstones_enabled, push_on_change, \
                          start_online, request_timeout_secs, log_file";

/// Show current configuration
pub fn show(output: &Output) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "database_name": config.database_name,
                    "endpoint": config.endpoint,
                    "api_key_set": config.api_key.is_some(),
                    "polling_enabled": config.polling_enabled,
                    "poll_interval_ms": config.poll_interval_ms,
                    "tombstones_enabled": config.tombstones_enabled,
                    "push_on_change": config.push_on_change,
                    "start_online": config.start_online,
                    "request_timeout_secs": config.request_timeout_secs,
                    "log_file": config.log_file
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!("  data_dir:             {}", config.data_dir.display());
            println!("  database_name:        {}", config.database_name);
            println!(
                "  endpoint:             {}",
                config.endpoint.as_deref().unwrap_or("(not set)")
            );
            println!(
                "  api_key:              {}",
                if config.api_key.is_some() {
                    "(set)"
                } else {
                    "(not set)"
                }
            );
            println!("  polling_enabled:      {}", config.polling_enabled);
            println!("  poll_interval_ms:     {}", config.poll_interval_ms);
            println!("  tombstones_enabled:   {}", config.tombstones_enabled);
            println!("  push_on_change:       {}", config.push_on_change);
            println!("  start_online:         {}", config.start_online);
            println!("  request_timeout_secs: {}", config.request_timeout_secs);
            println!(
                "  log_file:             {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Config file: {}", Config::config_file_path().display());
        }
    }

    Ok(())
}

/// Set a configuration value and save it
pub fn set(key: String, value: String, output: &Output) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;
    apply(&mut config, &key, &value)?;
    config
        .save()
        .context("Failed to save configuration")?;

    let shown = if key == "api_key" { "(hidden)" } else { value.as_str() };
    output.success(&format!("Set {} = {}", key, shown));
    Ok(())
}

/// Apply one `key = value` pair to `config`
fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => config.data_dir = value.into(),
        "database_name" => {
            if value.is_empty() {
                bail!("database_name cannot be empty");
            }
            config.database_name = value.to_string();
        }
        "endpoint" => config.endpoint = optional(value),
        "api_key" => config.api_key = optional(value),
        "polling_enabled" => config.polling_enabled = parse_bool(key, value)?,
        "poll_interval_ms" => {
            config.poll_interval_ms = value
                .parse()
                .context("Invalid value for poll_interval_ms. Use milliseconds, 0 disables.")?;
        }
        "tombstones_enabled" => config.tombstones_enabled = parse_bool(key, value)?,
        "push_on_change" => config.push_on_change = parse_bool(key, value)?,
        "start_online" => config.start_online = parse_bool(key, value)?,
        "request_timeout_secs" => {
            config.request_timeout_secs = value
                .parse()
                .context("Invalid value for request_timeout_secs. Use whole seconds.")?;
        }
        "log_file" => config.log_file = optional(value).map(Into::into),
        _ => {
            bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                VALID_KEYS
            );
        }
    }
    Ok(())
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    value
        .parse()
        .with_context(|| format!("Invalid value for {}. Use 'true' or 'false'.", key))
}
