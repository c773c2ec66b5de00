use anyhow::Result;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::domain::WeatherSample;

// NUMERIC columns are read back as float8 so they decode into f64. A NULL
// `rain` (rows from writers that skip the zero-fill) reads as 0, the same
// value the ingestion job would have stored.
fn select_columns() -> &'static str {
    r#"
        time,
        temperature_2m::float8 AS temperature_2m,
        COALESCE(rain, 0)::float8 AS rain,
        visibility::float8 AS visibility,
        precipitation_probability::float8 AS precipitation_probability
    "#
}

/// Fetch a time-ordered slice of samples in `[start, end)`.
///
/// `table` is interpolated verbatim; callers pass a validated identifier.
pub async fn samples_between(
    pool: &PgPool,
    table: &str,
    start: OffsetDateTime,
    end: OffsetDateTime,
) -> Result<Vec<WeatherSample>> {
    let sql = format!(
        r#"
        SELECT {}
        FROM {table}
        WHERE time >= $1
          AND time <  $2
        ORDER BY time
        "#,
        select_columns()
    );

    let rows = sqlx::query_as::<_, WeatherSample>(&sql)
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Fetch the sample stored for exactly `time`, if any.
pub async fn sample_at(
    pool: &PgPool,
    table: &str,
    time: OffsetDateTime,
) -> Result<Option<WeatherSample>> {
    let sql = format!(
        "SELECT {} FROM {table} WHERE time = $1",
        select_columns()
    );

    let row = sqlx::query_as::<_, WeatherSample>(&sql)
        .bind(time)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn count_samples(pool: &PgPool, table: &str) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {table}");
    let (count,): (i64,) = sqlx::query_as(&sql).fetch_one(pool).await?;
    Ok(count)
}
