//! Pending change inspection commands

use anyhow::Result;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use super::KindArg;
use crate::client::{ApiClient, PendingChange, PendingList};
use crate::output::{format_sizing, format_timestamp, print_json, print_warning, OutputFormat};

#[derive(Tabled)]
struct PendingRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "Recommended")]
    recommended: String,
    #[tabled(rename = "Last Updated")]
    last_updated: String,
}

impl From<&PendingChange> for PendingRow {
    fn from(change: &PendingChange) -> Self {
        Self {
            key: format!("{}/{}", change.resource_kind, change.resource_id),
            current: format_sizing(&change.current_value),
            recommended: format_sizing(&change.recommended_value).green().to_string(),
            last_updated: format_timestamp(&change.last_updated),
        }
    }
}

pub async fn list(client: &ApiClient, kind: Option<KindArg>, format: OutputFormat) -> Result<()> {
    let path = match kind {
        Some(kind) => format!("v1/pending?kind={}", kind.api_name()),
        None => "v1/pending".to_string(),
    };
    let result: PendingList = client.get(&path).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            if result.pending.is_empty() {
                print_warning("No pending changes found");
                return Ok(());
            }

            let rows: Vec<PendingRow> = result.pending.iter().map(PendingRow::from).collect();
            println!("{}", Table::new(rows).with(Style::rounded()));
            println!("\nTotal: {} pending changes", result.total);
        }
    }

    Ok(())
}

/// Show one pending change by key (`{ResourceKind}/{resourceId}`)
pub async fn show(client: &ApiClient, key: &str, format: OutputFormat) -> Result<()> {
    let key = key.trim_start_matches('/');
    if !key.contains('/') {
        anyhow::bail!("invalid key {:?}, expected {{ResourceKind}}/{{resourceId}}", key);
    }

    let change: PendingChange = client.get(&format!("v1/pending/{}", key)).await?;

    match format {
        OutputFormat::Json => print_json(&change)?,
        OutputFormat::Table => {
            println!("{}", "Pending Change".bold());
            println!("{}", "=".repeat(50));
            println!("Kind:         {}", change.resource_kind.cyan());
            println!("Resource:     {}", change.resource_id.cyan());
            println!("Current:      {}", format_sizing(&change.current_value));
            println!(
                "Recommended:  {}",
                format_sizing(&change.recommended_value).green()
            );
            println!("Last updated: {}", format_timestamp(&change.last_updated));
        }
    }

    Ok(())
}
