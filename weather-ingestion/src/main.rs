use std::process::ExitCode;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use weather_ingestion::{
    config::{self, AppConfig},
    observability,
    pipeline::{Pipeline, PipelineError, RunSummary},
    sinks::{self, postgres::classify_store_error, PostgresUpsertSink},
    sources::OpenMeteoSource,
    transform::HourlyNormalization,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Variables may also come straight from the scheduler's environment.
    let _ = dotenvy::dotenv();

    observability::init_tracing(&config::log_level(|key| std::env::var(key).ok()));
    if let Ok(raw) = std::env::var(config::LOG_LEVEL_ENV) {
        if !raw.trim().is_empty() && config::parse_level_name(&raw).is_none() {
            tracing::warn!(value = %raw, "unknown {} value, logging at info", config::LOG_LEVEL_ENV);
        }
    }

    match run().await {
        Ok(summary) => {
            tracing::info!(
                fetched_rows = summary.fetched_rows,
                loaded_rows = summary.loaded_rows,
                rows_affected = summary.rows_affected,
                "pipeline completed"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            let kind = e
                .downcast_ref::<PipelineError>()
                .map(PipelineError::kind)
                .unwrap_or("unknown");
            let detail = format!("{e:#}");
            tracing::error!(kind, error = %detail, "pipeline failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<RunSummary> {
    let cfg = AppConfig::load().context("loading configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(&cfg.database.uri)
        .await
        .map_err(classify_store_error)
        .context("connecting to postgres")?;

    sinks::ensure_table(&pool, &cfg.database.table)
        .await
        .with_context(|| format!("creating table {}", cfg.database.table))?;

    let source = OpenMeteoSource::new(&cfg.forecast)?;
    tracing::info!(
        url = source.url(),
        table = %cfg.database.table,
        log_level = %cfg.log_level,
        "starting forecast ingestion"
    );

    let pipeline = Pipeline {
        source,
        transform: HourlyNormalization,
        sink: PostgresUpsertSink::new(pool.clone(), cfg.database.table.clone()),
    };

    let summary = pipeline.run().await.context("running forecast pipeline")?;
    pool.close().await;

    Ok(summary)
}
