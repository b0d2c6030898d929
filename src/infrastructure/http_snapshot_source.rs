// HTTP snapshot source - fetches the station's JSON documents
use crate::application::snapshot_source::{SnapshotError, SnapshotSource};
use crate::infrastructure::config::{lenient_i64, StationSnapshot};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct HttpSnapshotSource {
    client: reqwest::Client,
    data_url: String,
    probe_url: String,
}

#[derive(Debug, Deserialize)]
struct ProbeDocument {
    #[serde(rename = "lastGoodStamp", deserialize_with = "lenient_i64")]
    last_good_stamp: i64,
}

impl HttpSnapshotSource {
    pub fn new(data_url: String, probe_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            data_url,
            probe_url,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, SnapshotError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| SnapshotError::Transport(Box::new(e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SnapshotError::Status { status, body });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SnapshotError::Transport(Box::new(e)))?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn fetch_snapshot(&self) -> Result<StationSnapshot, SnapshotError> {
        tracing::debug!(url = %self.data_url, "fetching station snapshot");
        self.get_json(&self.data_url).await
    }

    async fn fetch_last_good_stamp(&self) -> Result<i64, SnapshotError> {
        let probe: ProbeDocument = self.get_json(&self.probe_url).await?;
        Ok(probe.last_good_stamp)
    }
}
