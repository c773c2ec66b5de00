use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use weather_client::domain::HOURLY_VARIABLES;

use crate::config::ForecastConfig;
use crate::pipeline::{BatchLen, Envelope, PipelineError, Source};

/// Response body of the forecast endpoint, reduced to what the job reads.
///
/// Variable arrays stay untyped `Value`s; numeric coercion happens in the
/// transform step.
#[derive(Debug, Clone, Deserialize)]
pub struct ForecastResponse {
    /// Offset of the local times in `hourly.time` when `timezone=auto`.
    #[serde(default)]
    pub utc_offset_seconds: i32,
    pub hourly: RawHourly,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawHourly {
    pub time: Vec<String>,
    pub temperature_2m: Vec<Value>,
    pub rain: Vec<Value>,
    pub visibility: Vec<Value>,
    pub precipitation_probability: Vec<Value>,
}

impl BatchLen for ForecastResponse {
    fn batch_len(&self) -> usize {
        self.hourly.time.len()
    }
}

pub fn forecast_url(cfg: &ForecastConfig) -> String {
    format!(
        "{}?latitude={}&longitude={}&hourly={}&timezone={}",
        cfg.base_url,
        cfg.latitude,
        cfg.longitude,
        HOURLY_VARIABLES.join(","),
        cfg.timezone
    )
}

pub fn parse_forecast(body: &[u8]) -> Result<ForecastResponse, PipelineError> {
    serde_json::from_slice(body)
        .map_err(|e| PipelineError::Parse(format!("invalid forecast body: {e}")))
}

/// Single-shot GET against the forecast API for one fixed location.
pub struct OpenMeteoSource {
    client: reqwest::Client,
    url: String,
}

impl OpenMeteoSource {
    pub fn new(cfg: &ForecastConfig) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| PipelineError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: forecast_url(cfg),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl Source for OpenMeteoSource {
    type Output = ForecastResponse;

    async fn extract(&self) -> Result<Envelope<ForecastResponse>, PipelineError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| PipelineError::connectivity("forecast API", e))?;

        let status = resp.status();
        if !status.is_success() {
            tracing::error!(status = status.as_u16(), url = %self.url, "forecast API returned an error status");
            return Err(PipelineError::Http {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| PipelineError::connectivity("forecast API", e))?;

        let forecast = parse_forecast(&body)?;
        tracing::debug!(
            status = status.as_u16(),
            bytes = body.len(),
            utc_offset_seconds = forecast.utc_offset_seconds,
            "fetched forecast"
        );

        Ok(Envelope::new(forecast))
    }
}
