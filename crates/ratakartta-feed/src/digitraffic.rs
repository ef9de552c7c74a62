//! HTTP client for the Digitraffic rail API.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

use ratakartta_core::model::{PositionRecord, Station, Timetable, TrainNumber};

use crate::enrich::source::{PositionFeed, TimetableSource};
use crate::error::{EnrichError, EnrichResult};

const SOURCE_NAME: &str = "Digitraffic";

/// Digitraffic asks clients to identify themselves with this header
/// (`Digitraffic-User`).
const USER_HEADER: &str = "digitraffic-user";

/// Digitraffic rail API client.
///
/// Requests time out after 30 seconds, so a hung timetable lookup always
/// ends in an error instead of holding its in-flight slot forever.
#[derive(Debug, Clone)]
pub struct DigitrafficClient {
    http: Client,
    base_url: String,
}

impl DigitrafficClient {
    /// Create a new Digitraffic client against `base_url`
    /// (e.g. `https://rata.digitraffic.fi/api/v1`).
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            USER_HEADER,
            reqwest::header::HeaderValue::from_static("ratakartta/0.1.0"),
        );

        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("ratakartta/0.1.0")
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Latest known position of every train currently reporting.
    pub async fn latest_locations(&self) -> EnrichResult<Vec<PositionRecord>> {
        self.get_json("train-locations/latest", "train locations").await
    }

    /// Timetable of one train on one service day.
    ///
    /// Subject to Digitraffic's request budget; callers go through the
    /// throttled executor.
    pub async fn train(&self, day: NaiveDate, train: TrainNumber) -> EnrichResult<Vec<Timetable>> {
        let path = format!("trains/{}/{}", day.format("%Y-%m-%d"), train);
        self.get_json(&path, &format!("train {train}")).await
    }

    /// All stations in the rail network.
    pub async fn stations(&self) -> EnrichResult<Vec<Station>> {
        self.get_json("metadata/stations", "stations").await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, entity: &str) -> EnrichResult<T> {
        let url = format!("{}/{}", self.base_url, path);
        log::debug!("GET {}", url);

        let response = self.http.get(&url).send().await?;
        check_status(response.status(), entity)?;

        response.json::<T>().await.map_err(|e| EnrichError::Parse {
            source_name: SOURCE_NAME.to_string(),
            message: e.to_string(),
        })
    }
}

/// Map a response status to the enrichment error taxonomy.
fn check_status(status: StatusCode, entity: &str) -> EnrichResult<()> {
    if status.is_success() {
        return Ok(());
    }
    Err(match status {
        StatusCode::TOO_MANY_REQUESTS => EnrichError::RateLimited {
            source_name: SOURCE_NAME.to_string(),
        },
        StatusCode::NOT_FOUND => EnrichError::NotFound {
            entity: entity.to_string(),
            source_name: SOURCE_NAME.to_string(),
        },
        other => EnrichError::Http {
            source_name: SOURCE_NAME.to_string(),
            status: other.as_u16(),
            message: other
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string(),
        },
    })
}

#[async_trait]
impl PositionFeed for DigitrafficClient {
    async fn latest_positions(&self) -> EnrichResult<Vec<PositionRecord>> {
        self.latest_locations().await
    }
}

#[async_trait]
impl TimetableSource for DigitrafficClient {
    async fn timetable(&self, day: NaiveDate, train: TrainNumber) -> EnrichResult<Vec<Timetable>> {
        self.train(day, train).await
    }
}
