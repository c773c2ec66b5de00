pub mod weather_sample_queries;
