pub mod postgres;
pub mod schema;

pub use postgres::PostgresUpsertSink;
pub use schema::ensure_table;
