//! Service status command

use anyhow::Result;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use crate::client::{ApiClient, HealthResponse, ReadinessResponse};
use crate::output::{color_status, format_timestamp, print_json, OutputFormat};

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Failures")]
    failures: u32,
    #[tabled(rename = "Updated")]
    updated: String,
    #[tabled(rename = "Message")]
    message: String,
}

pub async fn show(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let (_, health): (u16, HealthResponse) = client.get_with_status("healthz").await?;
    let (_, readiness): (u16, ReadinessResponse) = client.get_with_status("readyz").await?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "health": health,
            "readiness": readiness,
        }))?,
        OutputFormat::Table => {
            println!("{}", "Rightsizer Status".bold());
            println!("{}", "=".repeat(50));
            println!("Health:    {}", color_status(&health.status));
            let ready = if readiness.ready { "ready" } else { "not ready" };
            println!("Readiness: {}", color_status(ready));
            if let Some(reason) = &readiness.reason {
                println!("Reason:    {}", reason);
            }
            println!();

            let rows: Vec<ComponentRow> = health
                .components
                .iter()
                .map(|(name, component)| ComponentRow {
                    name: name.clone(),
                    status: color_status(&component.status),
                    failures: component.consecutive_failures,
                    updated: format_timestamp(&component.updated_at),
                    message: component.message.clone().unwrap_or_default(),
                })
                .collect();
            if !rows.is_empty() {
                println!("{}", Table::new(rows).with(Style::rounded()));
            }
        }
    }

    Ok(())
}
