use sqlx::{postgres::PgPool, Postgres, QueryBuilder};
use weather_client::domain::WeatherSample;

use crate::pipeline::{Envelope, PipelineError, Sink};

/// Upserts a whole batch into one table, keyed on `time`, in a single
/// transaction.
pub struct PostgresUpsertSink {
    pool: PgPool,
    table: String,
}

/// Map a store error onto the pipeline's error kinds.
pub fn classify_store_error(e: sqlx::Error) -> PipelineError {
    match e {
        sqlx::Error::Database(ref db) => {
            // SQLSTATE classes: 21 cardinality, 22 data exception, 23 integrity constraint.
            let class = db.code().map(|c| c[..2.min(c.len())].to_string());
            match class.as_deref() {
                Some("21") | Some("22") | Some("23") => PipelineError::DataIntegrity(e),
                Some("08") => PipelineError::connectivity("postgres", e),
                _ => PipelineError::Storage(e),
            }
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => PipelineError::connectivity("postgres", e),
        sqlx::Error::Configuration(_) => PipelineError::Config(e.to_string()),
        other => PipelineError::Storage(other),
    }
}

/// Build the bulk `INSERT ... ON CONFLICT (time) DO UPDATE` statement.
pub fn upsert_statement<'a>(table: &str, batch: &'a [WeatherSample]) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::<Postgres>::new(format!(
        "INSERT INTO {table} (time, temperature_2m, rain, visibility, precipitation_probability) "
    ));

    builder.push_values(batch, |mut b, s| {
        b.push_bind(s.time)
            .push_bind(s.temperature_2m)
            .push_bind(s.rain)
            .push_bind(s.visibility)
            .push_bind(s.precipitation_probability);
    });

    builder.push(
        " ON CONFLICT (time) DO UPDATE SET \
         temperature_2m = EXCLUDED.temperature_2m, \
         rain = EXCLUDED.rain, \
         visibility = EXCLUDED.visibility, \
         precipitation_probability = EXCLUDED.precipitation_probability",
    );

    builder
}

impl PostgresUpsertSink {
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    pub async fn upsert_batch(&self, batch: &[WeatherSample]) -> Result<u64, PipelineError> {
        if batch.is_empty() {
            tracing::info!(table = %self.table, "empty batch, nothing to load");
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(classify_store_error)?;

        let mut builder = upsert_statement(&self.table, batch);
        let result = match builder.build().execute(&mut *tx).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, table = %self.table, rows = batch.len(), "upsert failed, rolling back");
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, table = %self.table, "rollback after failed upsert also failed");
                }
                return Err(classify_store_error(e));
            }
        };

        tx.commit().await.map_err(classify_store_error)?;
        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl Sink for PostgresUpsertSink {
    type Input = WeatherSample;

    async fn load(&self, input: &Envelope<Vec<WeatherSample>>) -> Result<u64, PipelineError> {
        self.upsert_batch(&input.payload).await
    }
}
