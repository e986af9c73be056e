//! API client for the water quality service

use anyhow::{Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        Self::decode(response).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }
        response.json().await.context("Failed to parse response")
    }
}

/// Turn a failed response into an error, preferring the service's error code
fn api_error(status: StatusCode, body: &str) -> anyhow::Error {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(err) => anyhow::anyhow!("{} ({}): {}", err.error.code, status, err.error.message),
        Err(_) => anyhow::anyhow!("API error ({}): {}", status, body),
    }
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsLoaded {
    pub classification_loaded: bool,
    pub forecast_loaded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastMeta {
    pub sensor_cols: Vec<String>,
    pub n_lags: usize,
    pub horizon_steps: u32,
    pub horizon_minutes: u32,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub success: bool,
    pub models: ModelsLoaded,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast_meta: Option<ForecastMeta>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub ph: f64,
    pub turbidity: f64,
    pub temperature: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictDetails {
    pub ph: f64,
    pub turbidity: f64,
    pub temperature: f64,
    pub stress_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub success: bool,
    pub water_quality_label: String,
    pub water_quality_class: i64,
    pub confidence: f64,
    pub recommend: String,
    pub duration: u32,
    pub details: PredictDetails,
}

/// History rows are passed through untouched; the service resolves column names
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForecastRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ph: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turbidity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub success: bool,
    pub horizon_minutes: u32,
    pub ph: f64,
    pub turbidity: f64,
    pub temperature: f64,
}
