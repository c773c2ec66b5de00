use serde_json::Value;
use time::{
    format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime,
    PrimitiveDateTime, UtcOffset,
};
use weather_client::domain::WeatherSample;

use crate::pipeline::{Envelope, PipelineError, Transform};
use crate::sources::ForecastResponse;

/// Parse one API timestamp.
///
/// Strings with an explicit RFC 3339 offset keep it; local wall-clock strings
/// (`2024-01-01T00:00`, optionally with seconds or a space separator) are
/// pinned to `offset`.
pub fn parse_timestamp(raw: &str, offset: UtcOffset) -> Result<OffsetDateTime, PipelineError> {
    let s = raw.trim().replacen(' ', "T", 1);

    if let Ok(ts) = OffsetDateTime::parse(&s, &Rfc3339) {
        return Ok(ts);
    }

    PrimitiveDateTime::parse(&s, format_description!("[year]-[month]-[day]T[hour]:[minute]"))
        .or_else(|_| {
            PrimitiveDateTime::parse(
                &s,
                format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
            )
        })
        .map(|local| local.assume_offset(offset))
        .map_err(|e| PipelineError::Parse(format!("invalid timestamp '{raw}': {e}")))
}

/// Best-effort numeric conversion; anything non-numeric becomes `None`.
pub fn coerce_numeric(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|v| v.is_finite())
}

pub fn zero_fill(values: &mut [Option<f64>]) {
    for v in values.iter_mut() {
        if v.is_none() {
            *v = Some(0.0);
        }
    }
}

/// Replace each gap with the closest earlier value in the same slice.
/// Leading gaps stay empty.
pub fn forward_fill(values: &mut [Option<f64>]) {
    let mut last = None;
    for v in values.iter_mut() {
        if v.is_some() {
            last = *v;
        } else {
            *v = last;
        }
    }
}

fn coerce_column(name: &str, values: &[Value], expected: usize) -> Result<Vec<Option<f64>>, PipelineError> {
    if values.len() != expected {
        return Err(PipelineError::Parse(format!(
            "column '{name}' has {} values, expected {expected}",
            values.len()
        )));
    }

    let coerced: Vec<Option<f64>> = values.iter().map(coerce_numeric).collect();
    let dropped = values
        .iter()
        .zip(&coerced)
        .filter(|(raw, c)| !raw.is_null() && c.is_none())
        .count();
    if dropped > 0 {
        tracing::warn!(column = name, dropped, "non-numeric values coerced to null");
    }

    Ok(coerced)
}

/// Turn the raw hourly columns into typed samples, same length and order.
pub fn normalize(raw: ForecastResponse) -> Result<Vec<WeatherSample>, PipelineError> {
    let hourly = raw.hourly;
    let n = hourly.time.len();

    let offset = UtcOffset::from_whole_seconds(raw.utc_offset_seconds).map_err(|e| {
        PipelineError::Parse(format!(
            "invalid utc_offset_seconds {}: {e}",
            raw.utc_offset_seconds
        ))
    })?;

    let times = hourly
        .time
        .iter()
        .map(|t| parse_timestamp(t, offset))
        .collect::<Result<Vec<_>, _>>()?;

    let temperature = coerce_column("temperature_2m", &hourly.temperature_2m, n)?;
    let mut rain = coerce_column("rain", &hourly.rain, n)?;
    let mut visibility = coerce_column("visibility", &hourly.visibility, n)?;
    let probability = coerce_column("precipitation_probability", &hourly.precipitation_probability, n)?;

    zero_fill(&mut rain);
    forward_fill(&mut visibility);

    let leading_gaps = visibility.iter().take_while(|v| v.is_none()).count();
    if leading_gaps > 0 {
        tracing::debug!(rows = leading_gaps, "visibility has no earlier value to carry forward");
    }

    let samples = times
        .into_iter()
        .zip(temperature)
        .zip(rain)
        .zip(visibility)
        .zip(probability)
        .map(
            |((((time, temperature_2m), rain), visibility), precipitation_probability)| WeatherSample {
                time,
                temperature_2m,
                rain: rain.unwrap_or(0.0),
                visibility,
                precipitation_probability,
            },
        )
        .collect();

    Ok(samples)
}

#[derive(Clone, Default)]
pub struct HourlyNormalization;

impl Transform for HourlyNormalization {
    type Input = ForecastResponse;
    type Output = Vec<WeatherSample>;

    fn apply(
        &self,
        input: Envelope<ForecastResponse>,
    ) -> Result<Envelope<Vec<WeatherSample>>, PipelineError> {
        input.try_map(normalize)
    }
}
