//! Classification and forecast commands

use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::Value;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

use crate::client::{ApiClient, ForecastRequest, ForecastResponse, PredictRequest, PredictResponse};
use crate::output::{
    color_action, color_confidence, color_label, format_duration, print_info, print_json,
    print_success, OutputFormat,
};

#[derive(Tabled)]
struct ReadingRow {
    #[tabled(rename = "Sensor")]
    sensor: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

fn sensor_table(ph: f64, turbidity: f64, temperature: f64) -> String {
    let rows = vec![
        ReadingRow {
            sensor: "pH",
            value: format!("{:.2}", ph),
        },
        ReadingRow {
            sensor: "Turbidity",
            value: format!("{:.1} NTU", turbidity),
        },
        ReadingRow {
            sensor: "Temperature",
            value: format!("{:.1} °C", temperature),
        },
    ];
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Classify one reading
pub async fn classify(
    client: &ApiClient,
    ph: f64,
    turbidity: f64,
    temperature: f64,
    format: OutputFormat,
) -> Result<()> {
    let request = PredictRequest {
        ph,
        turbidity,
        temperature,
    };
    let result: PredictResponse = client.post("predict", &request).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            println!("{}", "Water Quality".bold());
            println!("{}", "=".repeat(50));
            println!(
                "{}",
                sensor_table(
                    result.details.ph,
                    result.details.turbidity,
                    result.details.temperature
                )
            );
            println!();
            println!(
                "Quality:         {} (class {})",
                color_label(&result.water_quality_label),
                result.water_quality_class
            );
            println!("Confidence:      {}", color_confidence(result.confidence));
            println!("Stress score:    {:.3}", result.details.stress_score);
            println!();

            if result.recommend == "PUMP_ON" {
                print_success(&format!(
                    "{} for {}",
                    color_action(&result.recommend),
                    format_duration(result.duration)
                ));
            } else {
                print_info(&color_action(&result.recommend));
            }
        }
    }

    Ok(())
}

/// Request a forecast from the current reading and/or history
pub async fn forecast(
    client: &ApiClient,
    request: &ForecastRequest,
    format: OutputFormat,
) -> Result<()> {
    let result: ForecastResponse = client.post("forecast", request).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            println!(
                "{}",
                format!("Forecast (+{} min)", result.horizon_minutes).bold()
            );
            println!("{}", "=".repeat(50));
            println!(
                "{}",
                sensor_table(result.ph, result.turbidity, result.temperature)
            );
            if let Some(history) = &request.history {
                println!("\nBased on {} history rows", history.len());
            }
        }
    }

    Ok(())
}

/// Read history rows from a JSON file: either an array or `{"history": [...]}`
pub fn load_history(path: &Path) -> Result<Vec<Value>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read history file {:?}", path))?;
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("History file {:?} is not valid JSON", path))?;

    let rows = match value {
        Value::Array(rows) => rows,
        Value::Object(mut object) => match object.remove("history") {
            Some(Value::Array(rows)) => rows,
            _ => anyhow::bail!("History file {:?} has no \"history\" array", path),
        },
        _ => anyhow::bail!("History file {:?} must contain an array of readings", path),
    };

    if let Some(i) = rows.iter().position(|row| !row.is_object()) {
        anyhow::bail!("History row {} in {:?} is not an object", i, path);
    }
    Ok(rows)
}
