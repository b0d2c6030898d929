use crate::domain::aggregation::AggregationPolicy;
use crate::domain::conversion::{Conversion, Formula};
use crate::domain::measurement::MeasurementType;
use crate::domain::series::SeriesPoint;
use crate::domain::telemetry::TopicRule;
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub snapshot: SnapshotSettings,
    pub stream: StreamSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SnapshotSettings {
    pub data_url: String,
    pub probe_url: String,
    pub poll_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StreamSettings {
    pub compress: bool,
}

/// Bootstrap/reload document: dashboard configuration plus initial series.
#[derive(Debug, Deserialize, Clone)]
pub struct StationSnapshot {
    pub config: LiveConfig,
    #[serde(default)]
    pub gauges: BTreeMap<String, GaugeConfig>,
    #[serde(default)]
    pub charts: BTreeMap<String, ChartConfig>,
    /// Initial points keyed by observation name
    #[serde(default)]
    pub history: HashMap<String, Vec<SeriesPoint>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LiveConfig {
    /// Archive interval in seconds
    #[serde(deserialize_with = "lenient_i64")]
    pub archive_interval: i64,
    /// Retention horizon in hours
    #[serde(deserialize_with = "lenient_i64")]
    pub timespan: i64,
    #[serde(default)]
    pub topics: HashMap<String, TopicRule>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConsumerConfig {
    pub observation: MeasurementType,
    #[serde(default)]
    pub payload_key: Option<String>,
    #[serde(default)]
    pub formula: Option<Formula>,
    #[serde(default)]
    pub conversion: Option<Conversion>,
    #[serde(default)]
    pub aggregation: Option<AggregationPolicy>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GaugeConfig {
    #[serde(flatten)]
    pub consumer: ConsumerConfig,
    #[serde(default)]
    pub circular: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChartConfig {
    #[serde(default)]
    pub aggregate_interval_minutes: Option<u32>,
    #[serde(default)]
    pub series: Vec<SeriesConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SeriesConfig {
    pub id: String,
    #[serde(flatten)]
    pub consumer: ConsumerConfig,
}

pub fn load_settings() -> anyhow::Result<Settings> {
    settings_from(config::File::with_name("config/station").required(false))
}

fn settings_from<S>(file: S) -> anyhow::Result<Settings>
where
    S: config::Source + Send + Sync + 'static,
{
    let settings = config::Config::builder()
        .set_default("server.bind", "0.0.0.0:8080")?
        .set_default("snapshot.data_url", "http://localhost/weewxData.json")?
        .set_default("snapshot.probe_url", "http://localhost/ts.json")?
        .set_default("snapshot.poll_seconds", 60_i64)?
        .set_default("stream.compress", true)?
        .add_source(file)
        .add_source(config::Environment::with_prefix("WEATHER_LIVE").separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Accepts integers, floats and numeric strings; the station writes all three.
pub fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(v) => Ok(v),
        Raw::Float(v) => Ok(v as i64),
        Raw::Text(s) => s
            .trim()
            .parse::<f64>()
            .map(|v| v as i64)
            .map_err(serde::de::Error::custom),
    }
}
