use time::OffsetDateTime;

/// Hourly variables requested from the forecast API, in column order.
pub const HOURLY_VARIABLES: [&str; 4] = [
    "temperature_2m",
    "rain",
    "visibility",
    "precipitation_probability",
];

/// One hourly forecast row for the configured location.
///
/// Column scales on the store side:
/// - temperature_2m: NUMERIC(4,1), °C
/// - rain: NUMERIC(5,2), mm. Never null once normalized; the read queries
///   also report a NULL stored by another writer as 0.
/// - visibility: NUMERIC(8,0), m
/// - precipitation_probability: NUMERIC(3,0), %
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WeatherSample {
    pub time: OffsetDateTime,
    pub temperature_2m: Option<f64>,
    pub rain: f64,
    pub visibility: Option<f64>,
    pub precipitation_probability: Option<f64>,
}
