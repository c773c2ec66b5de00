use std::time::{Duration, SystemTime};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    pub received_at: SystemTime,
}

impl<T> Envelope<T> {
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            received_at: SystemTime::now(),
        }
    }

    /// Replace the payload through a fallible step, keeping the original
    /// receive time.
    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<Envelope<U>, E> {
        Ok(Envelope {
            payload: f(self.payload)?,
            received_at: self.received_at,
        })
    }

    pub fn age(&self) -> Duration {
        SystemTime::now()
            .duration_since(self.received_at)
            .unwrap_or_default()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("could not reach {target}")]
    Connectivity {
        target: &'static str,
        #[source]
        source: BoxError,
    },
    #[error("{url} returned HTTP status {status}")]
    Http { url: String, status: u16 },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("data integrity violation")]
    DataIntegrity(#[source] sqlx::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("storage error")]
    Storage(#[source] sqlx::Error),
}

impl PipelineError {
    pub fn connectivity(target: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Connectivity {
            target,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connectivity { .. } => "connectivity",
            Self::Http { .. } => "http",
            Self::Parse(_) => "parse",
            Self::DataIntegrity(_) => "data_integrity",
            Self::Config(_) => "config",
            Self::Storage(_) => "storage",
        }
    }
}

#[async_trait::async_trait]
pub trait Source: Send + Sync {
    type Output: Send;

    async fn extract(&self) -> Result<Envelope<Self::Output>, PipelineError>;
}

/// Pure, in-memory step between source and sink.
pub trait Transform: Send + Sync {
    type Input;
    type Output;

    fn apply(&self, input: Envelope<Self::Input>) -> Result<Envelope<Self::Output>, PipelineError>;
}

#[async_trait::async_trait]
pub trait Sink: Send + Sync {
    type Input: Send + Sync;

    /// Persist the whole batch; returns the number of rows affected.
    async fn load(&self, input: &Envelope<Vec<Self::Input>>) -> Result<u64, PipelineError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub fetched_rows: usize,
    pub loaded_rows: usize,
    pub rows_affected: u64,
}

/// One extract → transform → load cycle. Any failure ends the run; nothing
/// is retried.
pub struct Pipeline<S, X, K> {
    pub source: S,
    pub transform: X,
    pub sink: K,
}

/// Row count of an extracted payload, for logging.
pub trait BatchLen {
    fn batch_len(&self) -> usize;
}

impl<T> BatchLen for Vec<T> {
    fn batch_len(&self) -> usize {
        self.len()
    }
}

impl<S, X, K, R> Pipeline<S, X, K>
where
    S: Source,
    S::Output: BatchLen,
    X: Transform<Input = S::Output, Output = Vec<R>>,
    K: Sink<Input = R>,
    R: Send + Sync,
{
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let raw = self.source.extract().await?;
        let fetched_rows = raw.payload.batch_len();
        tracing::info!(rows = fetched_rows, "extracted forecast batch");

        let cleaned = self.transform.apply(raw)?;
        let loaded_rows = cleaned.payload.len();
        tracing::debug!(rows = loaded_rows, "normalized forecast batch");

        let rows_affected = self.sink.load(&cleaned).await?;
        tracing::info!(
            rows_affected,
            elapsed_ms = cleaned.age().as_millis() as u64,
            "loaded forecast batch"
        );

        Ok(RunSummary {
            fetched_rows,
            loaded_rows,
            rows_affected,
        })
    }
}
