//! Aqua IoT AI service CLI
//!
//! Queries model status, classifies readings and requests forecasts from a
//! running `aqua-ai-service`.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{health, predict};
use std::path::PathBuf;

/// Aqua IoT AI service CLI
#[derive(Parser)]
#[command(name = "aquactl")]
#[command(author, version, about = "CLI for the Aqua IoT water quality service", long_about = None)]
pub struct Cli {
    /// Service URL (can also be set via AQUA_API_URL env var)
    #[arg(long, env = "AQUA_API_URL", default_value = "http://localhost:8000")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show which models are loaded and the forecast configuration
    Health,

    /// Classify water quality and get a pump recommendation
    Classify {
        /// Water pH
        #[arg(long, allow_hyphen_values = true)]
        ph: f64,

        /// Turbidity in NTU
        #[arg(long, allow_hyphen_values = true)]
        turbidity: f64,

        /// Water temperature in °C
        #[arg(long, allow_hyphen_values = true)]
        temperature: f64,
    },

    /// Forecast pond conditions for the next step
    Forecast {
        /// Current pH
        #[arg(long, allow_hyphen_values = true)]
        ph: Option<f64>,

        /// Current turbidity in NTU
        #[arg(long, allow_hyphen_values = true)]
        turbidity: Option<f64>,

        /// Current water temperature in °C
        #[arg(long, allow_hyphen_values = true)]
        temperature: Option<f64>,

        /// JSON file with recent readings (array, or object with a "history" array)
        #[arg(long)]
        history: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let client = client::ApiClient::new(&cli.api_url)?;

    match cli.command {
        Commands::Health => {
            health::show_health(&client, cli.format).await?;
        }
        Commands::Classify {
            ph,
            turbidity,
            temperature,
        } => {
            predict::classify(&client, ph, turbidity, temperature, cli.format).await?;
        }
        Commands::Forecast {
            ph,
            turbidity,
            temperature,
            history,
        } => {
            let history = history
                .as_deref()
                .map(predict::load_history)
                .transpose()?;
            let request = client::ForecastRequest {
                ph,
                turbidity,
                temperature,
                history,
            };
            predict::forecast(&client, &request, cli.format).await?;
        }
    }

    Ok(())
}
