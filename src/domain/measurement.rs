// Measurement types - what a consumer observes and how it is aggregated
use super::aggregation::AggregationPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MeasurementType {
    WindSpeed,
    WindGust,
    WindDir,
    WindGustDir,
    OutTemp,
    Other(String),
}

impl MeasurementType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::WindSpeed => "windSpeed",
            Self::WindGust => "windGust",
            Self::WindDir => "windDir",
            Self::WindGustDir => "windGustDir",
            Self::OutTemp => "outTemp",
            Self::Other(name) => name,
        }
    }

    /// Policy used when the consumer configuration does not name one
    pub fn default_policy(&self) -> AggregationPolicy {
        match self {
            Self::WindGust => AggregationPolicy::Maximum,
            Self::WindDir | Self::WindGustDir => AggregationPolicy::CircularMean,
            _ => AggregationPolicy::Mean,
        }
    }

    /// Angular quantities on a 0-360° wrap
    pub fn is_circular(&self) -> bool {
        matches!(self, Self::WindDir | Self::WindGustDir)
    }

    /// The magnitude series that weights this direction series
    pub fn magnitude_pair(&self) -> Option<MeasurementType> {
        match self {
            Self::WindDir => Some(Self::WindSpeed),
            Self::WindGustDir => Some(Self::WindGust),
            _ => None,
        }
    }

    /// Gauge type whose displayed value is raised by samples of this type.
    /// Stations report speed more often than gust, so a speed above the
    /// displayed gust is itself a gust.
    pub fn ratchets(&self) -> Option<MeasurementType> {
        match self {
            Self::WindSpeed => Some(Self::WindGust),
            _ => None,
        }
    }
}

impl From<&str> for MeasurementType {
    fn from(name: &str) -> Self {
        match name {
            "windSpeed" => Self::WindSpeed,
            "windGust" => Self::WindGust,
            "windDir" => Self::WindDir,
            "windGustDir" => Self::WindGustDir,
            "outTemp" => Self::OutTemp,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for MeasurementType {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<MeasurementType> for String {
    fn from(measurement: MeasurementType) -> Self {
        measurement.as_str().to_string()
    }
}

impl fmt::Display for MeasurementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
