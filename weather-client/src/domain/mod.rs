pub mod weather_sample;

pub use weather_sample::{WeatherSample, HOURLY_VARIABLES};
