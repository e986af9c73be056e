//! Service health command

use anyhow::Result;
use colored::Colorize;

use crate::client::{ApiClient, HealthStatus};
use crate::output::{color_loaded, print_json, print_warning, OutputFormat};

/// Show which models are loaded and the forecast configuration
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let status: HealthStatus = client.get("health").await?;

    match format {
        OutputFormat::Json => print_json(&status)?,
        OutputFormat::Table => {
            println!("{}", "Aqua AI Service".bold());
            println!("{}", "=".repeat(50));
            println!(
                "Classifier:      {}",
                color_loaded(status.models.classification_loaded)
            );
            if let Some(version) = &status.classification_version {
                println!("  Version:       {}", version.cyan());
            }
            println!(
                "Forecaster:      {}",
                color_loaded(status.models.forecast_loaded)
            );

            if let Some(meta) = &status.forecast_meta {
                if let Some(version) = &meta.version {
                    println!("  Version:       {}", version.cyan());
                }
                println!("  Sensors:       {}", meta.sensor_cols.join(", "));
                println!("  Lags:          {}", meta.n_lags);
                println!(
                    "  Horizon:       {} step(s), {} min",
                    meta.horizon_steps, meta.horizon_minutes
                );
            }

            if !status.models.classification_loaded || !status.models.forecast_loaded {
                println!();
                print_warning("Service is running degraded");
            }
        }
    }

    Ok(())
}
