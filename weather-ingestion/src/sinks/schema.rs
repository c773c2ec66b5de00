use sqlx::PgPool;

use crate::pipeline::PipelineError;
use crate::sinks::postgres::classify_store_error;

pub fn create_table_sql(table: &str) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            time                      TIMESTAMPTZ PRIMARY KEY,
            temperature_2m            NUMERIC(4,1),
            rain                      NUMERIC(5,2),
            visibility                NUMERIC(8,0),
            precipitation_probability NUMERIC(3,0)
        )
        "#
    )
}

/// Create the destination table if it does not exist. An existing table is
/// left untouched.
pub async fn ensure_table(pool: &PgPool, table: &str) -> Result<(), PipelineError> {
    sqlx::query(&create_table_sql(table))
        .execute(pool)
        .await
        .map_err(classify_store_error)?;

    tracing::debug!(table, "destination table ready");
    Ok(())
}
