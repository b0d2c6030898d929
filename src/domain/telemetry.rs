// Telemetry payloads - decoding and dotted-path value extraction
use super::conversion::{dewpoint, Formula};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Payload field carrying the sample's own epoch-seconds timestamp
pub const TIMESTAMP_FIELD: &str = "dateTime";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("no decoding rule for topic {0}")]
    UnknownTopic(String),
    #[error("malformed JSON payload: {0}")]
    MalformedJson(#[from] serde_json::Error),
    #[error("plain payload is not a number: {0:?}")]
    NotANumber(String),
    #[error("plain topic {0} has no payload_key")]
    MissingPayloadKey(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PayloadEncoding {
    #[serde(rename = "json", alias = "JSON", alias = "Json")]
    Json,
    #[serde(rename = "plain", alias = "PLAIN", alias = "Plain")]
    Plain,
}

/// How messages on one topic are turned into a payload tree
#[derive(Debug, Clone, Deserialize)]
pub struct TopicRule {
    #[serde(rename = "type")]
    pub encoding: PayloadEncoding,
    #[serde(default)]
    pub payload_key: Option<String>,
}

impl TopicRule {
    pub fn decode(&self, topic: &str, body: &[u8]) -> Result<Value, DecodeError> {
        match self.encoding {
            PayloadEncoding::Json => Ok(serde_json::from_slice(body)?),
            PayloadEncoding::Plain => {
                let key = self
                    .payload_key
                    .as_deref()
                    .ok_or_else(|| DecodeError::MissingPayloadKey(topic.to_string()))?;
                let text = String::from_utf8_lossy(body);
                let text = text.trim();
                let value: f64 = text
                    .parse()
                    .map_err(|_| DecodeError::NotANumber(text.to_string()))?;

                let mut payload = Map::new();
                payload.insert(key.to_string(), Value::from(value));
                Ok(Value::Object(payload))
            }
        }
    }
}

/// Walks `path` segment by segment. Absence anywhere along the way is `None`.
pub fn lookup<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(payload, |node, segment| match node {
        Value::Object(fields) => fields.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Numbers and numeric strings; anything else, including NaN, is not a value.
pub fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    number.filter(|v| v.is_finite())
}

/// The payload's own timestamp when present and representable in
/// milliseconds, else the time of receipt.
pub fn effective_timestamp_ms(payload: &Value, received_ms: i64) -> i64 {
    payload
        .get(TIMESTAMP_FIELD)
        .and_then(as_number)
        .and_then(|seconds| (seconds.trunc() as i64).checked_mul(1000))
        .unwrap_or(received_ms)
}

/// Where a consumer reads its raw value from
#[derive(Debug, Clone, PartialEq)]
pub enum ValueSource {
    Path(String),
    Dewpoint { temperature: String, humidity: String },
    Unset,
}

impl ValueSource {
    pub fn from_config(payload_key: Option<&str>, formula: Option<&Formula>) -> Self {
        match (formula, payload_key) {
            (Some(Formula::Dewpoint { temperature, humidity }), _) => Self::Dewpoint {
                temperature: temperature.clone(),
                humidity: humidity.clone(),
            },
            (None, Some(path)) => Self::Path(path.to_string()),
            (None, None) => Self::Unset,
        }
    }

    pub fn extract(&self, payload: &Value) -> Option<f64> {
        match self {
            Self::Path(path) => lookup(payload, path).and_then(as_number),
            Self::Dewpoint { temperature, humidity } => {
                let temperature = lookup(payload, temperature).and_then(as_number)?;
                let humidity = lookup(payload, humidity).and_then(as_number)?;
                dewpoint(temperature, humidity)
            }
            Self::Unset => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_nested_paths() {
        let payload = json!({
            "outTemp": 21.5,
            "wind": { "speed": { "avg": 3.2 } },
            "sensors": [ { "value": 7 } ]
        });
        assert_eq!(lookup(&payload, "outTemp"), Some(&json!(21.5)));
        assert_eq!(lookup(&payload, "wind.speed.avg"), Some(&json!(3.2)));
        assert_eq!(lookup(&payload, "sensors.0.value"), Some(&json!(7)));
        assert_eq!(lookup(&payload, "wind.gust.avg"), None);
        assert_eq!(lookup(&payload, "outTemp.celsius"), None);
    }

    #[test]
    fn test_as_number() {
        assert_eq!(as_number(&json!(4)), Some(4.0));
        assert_eq!(as_number(&json!(" 12.5 ")), Some(12.5));
        assert_eq!(as_number(&json!("n/a")), None);
        assert_eq!(as_number(&json!(null)), None);
        assert_eq!(as_number(&json!({"a": 1})), None);
    }

    #[test]
    fn test_decode_json_and_plain() {
        let json_rule = TopicRule {
            encoding: PayloadEncoding::Json,
            payload_key: None,
        };
        let payload = json_rule.decode("weather/loop", br#"{"outTemp": 3}"#).unwrap();
        assert_eq!(payload, json!({"outTemp": 3}));
        assert!(matches!(
            json_rule.decode("weather/loop", b"{not json"),
            Err(DecodeError::MalformedJson(_))
        ));

        let plain_rule = TopicRule {
            encoding: PayloadEncoding::Plain,
            payload_key: Some("windSpeed".to_string()),
        };
        let payload = plain_rule.decode("weather/windSpeed", b" 4.5\n").unwrap();
        assert_eq!(payload, json!({"windSpeed": 4.5}));
        assert!(matches!(
            plain_rule.decode("weather/windSpeed", b"calm"),
            Err(DecodeError::NotANumber(_))
        ));

        let keyless = TopicRule {
            encoding: PayloadEncoding::Plain,
            payload_key: None,
        };
        assert!(matches!(
            keyless.decode("weather/x", b"1"),
            Err(DecodeError::MissingPayloadKey(_))
        ));
    }

    #[test]
    fn test_encoding_names_are_case_insensitive() {
        let rule: TopicRule = serde_json::from_str(r#"{"type": "JSON"}"#).unwrap();
        assert_eq!(rule.encoding, PayloadEncoding::Json);
        let rule: TopicRule =
            serde_json::from_str(r#"{"type": "plain", "payload_key": "rain"}"#).unwrap();
        assert_eq!(rule.encoding, PayloadEncoding::Plain);
    }

    #[test]
    fn test_effective_timestamp() {
        assert_eq!(effective_timestamp_ms(&json!({"dateTime": 1700000000}), 5), 1_700_000_000_000);
        assert_eq!(effective_timestamp_ms(&json!({"dateTime": "1700000001"}), 5), 1_700_000_001_000);
        assert_eq!(effective_timestamp_ms(&json!({"outTemp": 1}), 5), 5);
        assert_eq!(effective_timestamp_ms(&json!({"dateTime": 1e17}), 5), 5);
        assert_eq!(effective_timestamp_ms(&json!({"dateTime": -1e300}), 5), 5);
    }

    #[test]
    fn test_value_sources() {
        let payload = json!({"outTemp": 20.0, "outHumidity": "50"});
        assert_eq!(ValueSource::Path("outTemp".to_string()).extract(&payload), Some(20.0));
        assert_eq!(ValueSource::Unset.extract(&payload), None);

        let dew = ValueSource::from_config(
            None,
            Some(&Formula::Dewpoint {
                temperature: "outTemp".to_string(),
                humidity: "outHumidity".to_string(),
            }),
        );
        let value = dew.extract(&payload).unwrap();
        assert!((value - 9.25).abs() < 0.05);
        assert_eq!(dew.extract(&json!({"outTemp": 20.0})), None);
    }
}
