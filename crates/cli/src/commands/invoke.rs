//! Harvest and apply commands

use anyhow::Result;
use colored::Colorize;

use super::KindArg;
use crate::client::{ApiClient, InvocationResult, TriggerRequest};
use crate::output::{
    format_timestamp, print_error, print_info, print_json, print_success, print_warning, OutputFormat,
};

/// Run a harvest for one resource kind
pub async fn harvest(client: &ApiClient, kind: KindArg, format: OutputFormat) -> Result<()> {
    let trigger = TriggerRequest::Timer {
        kind: kind.api_name().to_string(),
    };
    let result = client.invoke(&trigger).await?;
    report(&result, format)?;

    if let (OutputFormat::Table, Some(details)) = (format, &result.details) {
        match details["upserted_keys"].as_array() {
            Some(keys) if !keys.is_empty() => {
                for key in keys.iter().filter_map(|k| k.as_str()) {
                    println!("  {} {}", "+".green(), key);
                }
            }
            _ => print_info("No pending changes written"),
        }
        if let Some(skipped) = details["skipped"].as_array() {
            for entry in skipped {
                println!(
                    "  {} {} ({})",
                    "-".yellow(),
                    entry["subject"].as_str().unwrap_or_default(),
                    entry["reason"].as_str().unwrap_or_default()
                );
            }
        }
    }

    finish(&result)
}

/// Apply the pending change stored at `key`
pub async fn apply(client: &ApiClient, key: &str, format: OutputFormat) -> Result<()> {
    let trigger = TriggerRequest::Change {
        key: key.to_string(),
    };
    let result = client.invoke(&trigger).await?;
    report(&result, format)?;
    finish(&result)
}

fn report(result: &InvocationResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(result)?,
        OutputFormat::Table => {
            if result.is_success() {
                print_success(&result.message);
            } else if let Some(state) = &result.current_state {
                print_warning(&result.message);
                println!("  Current state: {}", state.yellow());
            } else {
                print_error(&result.message);
            }
            println!("  At: {}", format_timestamp(&result.timestamp));
        }
    }
    Ok(())
}

fn finish(result: &InvocationResult) -> Result<()> {
    if result.is_success() {
        Ok(())
    } else {
        anyhow::bail!("invocation failed with status {}", result.status_code)
    }
}
