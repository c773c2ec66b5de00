//! Store-backed checks. Set `WEATHER_ETL_TEST_PG_URI` to a scratch Postgres
//! database to run them; without it every test returns early.

use std::time::{SystemTime, UNIX_EPOCH};

use sqlx::{postgres::PgPoolOptions, PgPool};
use time::{macros::datetime, Duration, OffsetDateTime};
use weather_client::{db::weather_sample_queries, domain::WeatherSample};
use weather_ingestion::{
    pipeline::PipelineError,
    sinks::{ensure_table, PostgresUpsertSink},
};

const TEST_PG_URI_ENV: &str = "WEATHER_ETL_TEST_PG_URI";

struct Scratch {
    pool: PgPool,
    table: String,
}

impl Scratch {
    async fn new(prefix: &str) -> Option<Self> {
        let Ok(uri) = std::env::var(TEST_PG_URI_ENV) else {
            eprintln!("{TEST_PG_URI_ENV} not set, skipping");
            return None;
        };

        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&uri)
            .await
            .expect("connect to test database");

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock after epoch")
            .subsec_nanos();
        let table = format!("wx_{prefix}_{}_{nanos}", std::process::id());

        ensure_table(&pool, &table).await.expect("create scratch table");
        Some(Self { pool, table })
    }

    fn sink(&self) -> PostgresUpsertSink {
        PostgresUpsertSink::new(self.pool.clone(), self.table.clone())
    }

    async fn count(&self) -> i64 {
        weather_sample_queries::count_samples(&self.pool, &self.table)
            .await
            .expect("count rows")
    }

    async fn all(&self) -> Vec<WeatherSample> {
        weather_sample_queries::samples_between(
            &self.pool,
            &self.table,
            datetime!(2000-01-01 00:00 UTC),
            datetime!(2100-01-01 00:00 UTC),
        )
        .await
        .expect("read rows")
    }

    async fn drop_table(self) {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", self.table))
            .execute(&self.pool)
            .await
            .expect("drop scratch table");
    }
}

fn at(hour: i64) -> OffsetDateTime {
    datetime!(2024-01-01 00:00 UTC) + Duration::hours(hour)
}

fn sample(hour: i64, temperature: f64, rain: f64, visibility: Option<f64>, pp: f64) -> WeatherSample {
    WeatherSample {
        time: at(hour),
        temperature_2m: Some(temperature),
        rain,
        visibility,
        precipitation_probability: Some(pp),
    }
}

#[tokio::test]
async fn ensure_table_twice_is_harmless() {
    let Some(scratch) = Scratch::new("ddl").await else { return };

    ensure_table(&scratch.pool, &scratch.table)
        .await
        .expect("second create is a no-op");
    assert_eq!(scratch.count().await, 0);

    scratch.drop_table().await;
}

#[tokio::test]
async fn loading_same_batch_twice_is_idempotent() {
    let Some(scratch) = Scratch::new("idem").await else { return };
    let batch = vec![
        sample(0, 10.1, 0.5, Some(10000.0), 20.0),
        sample(1, 9.8, 0.0, Some(10000.0), 30.0),
        sample(2, 9.5, 1.25, None, 45.0),
    ];

    let sink = scratch.sink();
    sink.upsert_batch(&batch).await.expect("first load");
    let after_first = scratch.all().await;
    sink.upsert_batch(&batch).await.expect("second load");

    assert_eq!(scratch.count().await, 3);
    assert_eq!(scratch.all().await, after_first);
    assert_eq!(after_first, batch);

    scratch.drop_table().await;
}

#[tokio::test]
async fn conflicting_time_overwrites_every_column() {
    let Some(scratch) = Scratch::new("upsert").await else { return };
    let sink = scratch.sink();

    sink.upsert_batch(&[sample(0, 10.1, 0.5, Some(10000.0), 20.0)])
        .await
        .expect("first load");

    let newer = WeatherSample {
        time: at(0),
        temperature_2m: None,
        rain: 2.75,
        visibility: Some(800.0),
        precipitation_probability: Some(90.0),
    };
    let affected = sink
        .upsert_batch(&[newer.clone(), sample(1, 11.0, 0.0, Some(9000.0), 10.0)])
        .await
        .expect("second load");

    assert_eq!(affected, 2);
    assert_eq!(scratch.count().await, 2);
    let stored = weather_sample_queries::sample_at(&scratch.pool, &scratch.table, at(0))
        .await
        .expect("read row");
    assert_eq!(stored, Some(newer));

    scratch.drop_table().await;
}

#[tokio::test]
async fn numeric_overflow_rolls_back_whole_batch() {
    let Some(scratch) = Scratch::new("atomic").await else { return };
    let sink = scratch.sink();

    // temperature_2m is NUMERIC(4,1): 1000.0 does not fit.
    let batch = vec![
        sample(0, 10.0, 0.0, Some(10000.0), 0.0),
        sample(1, 1000.0, 0.0, Some(10000.0), 0.0),
    ];
    let res = sink.upsert_batch(&batch).await;

    assert!(matches!(res, Err(PipelineError::DataIntegrity(_))));
    assert_eq!(scratch.count().await, 0);

    scratch.drop_table().await;
}

#[tokio::test]
async fn duplicate_time_in_one_batch_is_data_integrity() {
    let Some(scratch) = Scratch::new("dup").await else { return };
    let sink = scratch.sink();

    let batch = vec![
        sample(0, 10.0, 0.0, Some(10000.0), 0.0),
        sample(0, 11.0, 0.0, Some(10000.0), 0.0),
    ];
    let res = sink.upsert_batch(&batch).await;

    assert!(matches!(res, Err(PipelineError::DataIntegrity(_))));
    assert_eq!(scratch.count().await, 0);

    scratch.drop_table().await;
}

#[tokio::test]
async fn values_are_rounded_to_column_scale() {
    let Some(scratch) = Scratch::new("scale").await else { return };
    let sink = scratch.sink();

    sink.upsert_batch(&[sample(0, 21.26, 0.126, Some(24140.4), 12.6)])
        .await
        .expect("load");

    let stored = scratch.all().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].temperature_2m, Some(21.3));
    assert_eq!(stored[0].rain, 0.13);
    assert_eq!(stored[0].visibility, Some(24140.0));
    assert_eq!(stored[0].precipitation_probability, Some(13.0));

    scratch.drop_table().await;
}

#[tokio::test]
async fn null_rain_from_other_writers_reads_as_zero() {
    let Some(scratch) = Scratch::new("nullrain").await else { return };

    sqlx::query(&format!(
        "INSERT INTO {} (time, temperature_2m, rain, visibility, precipitation_probability) \
         VALUES ($1, 12.5, NULL, NULL, 40)",
        scratch.table
    ))
    .bind(at(0))
    .execute(&scratch.pool)
    .await
    .expect("insert row with null rain");

    let stored = weather_sample_queries::sample_at(&scratch.pool, &scratch.table, at(0))
        .await
        .expect("read row")
        .expect("row exists");
    assert_eq!(stored.rain, 0.0);
    assert_eq!(stored.temperature_2m, Some(12.5));
    assert_eq!(stored.visibility, None);

    scratch.drop_table().await;
}
