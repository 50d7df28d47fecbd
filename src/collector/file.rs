//! Source adapter reading a JSON array of records from disk.

use super::{SourceAdapter, SourceError};
use crate::telemetry::TelemetryRecord;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::path::PathBuf;

/// Replays exported telemetry. Only records inside the requested window are
/// returned.
pub struct FileSource<T> {
    name: String,
    path: PathBuf,
    _record: PhantomData<fn() -> T>,
}

impl<T> FileSource<T> {
    pub fn new(name: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            path: path.into(),
            _record: PhantomData,
        }
    }
}

#[async_trait::async_trait]
impl<T> SourceAdapter<T> for FileSource<T>
where
    T: TelemetryRecord + DeserializeOwned + Send + 'static,
{
    async fn fetch(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<T>, SourceError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SourceError::Io {
                path: self.path.display().to_string(),
                source,
            })?;
        let records: Vec<T> = serde_json::from_str(&content)?;
        Ok(records.into_iter().filter(|r| r.within(start, end)).collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
