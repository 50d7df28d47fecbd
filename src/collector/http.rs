//! JSON-over-HTTP source adapter.

use super::{SourceAdapter, SourceError};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::time::Duration;

/// Fetches `GET {url}?start=..&end=..` and decodes a JSON array of records.
///
/// The backend query language is hidden behind `url`; the adapter only
/// knows the window and the record shape.
pub struct HttpSource<T> {
    name: String,
    url: String,
    client: Client,
    _record: PhantomData<fn() -> T>,
}

impl<T> HttpSource<T> {
    pub fn new(name: &str, url: &str, timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            name: name.to_string(),
            url: url.to_string(),
            client,
            _record: PhantomData,
        })
    }
}

#[async_trait::async_trait]
impl<T> SourceAdapter<T> for HttpSource<T>
where
    T: DeserializeOwned + Send + 'static,
{
    async fn fetch(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<T>, SourceError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("start", start.to_rfc3339()), ("end", end.to_rfc3339())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                source_name: self.name.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
