// Station core - registries, interval accumulators and the per-message dispatcher
use crate::domain::aggregation::{AccumulatorSet, AggregationPolicy, Observation, Sample};
use crate::domain::bucketing::{interval_start, minutes_to_ms};
use crate::domain::conversion::Conversion;
use crate::domain::dashboard::{ChartView, DashboardView, GaugeView, RenderEvent, SeriesView};
use crate::domain::gauge::GaugeState;
use crate::domain::measurement::MeasurementType;
use crate::domain::series::{IntervalSample, SeriesBuffer, SeriesPoint};
use crate::domain::telemetry::{
    as_number, effective_timestamp_ms, lookup, DecodeError, TopicRule, ValueSource,
};
use crate::infrastructure::config::{ConsumerConfig, StationSnapshot};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

const MS_PER_SECOND: i64 = 1_000;
const MS_PER_HOUR: i64 = 3_600_000;

/// Extraction, conversion and aggregation settings shared by gauges and chart series
#[derive(Debug, Clone)]
pub struct Consumer {
    pub observation: MeasurementType,
    pub source: ValueSource,
    pub conversion: Conversion,
    pub policy: AggregationPolicy,
}

#[derive(Debug, Clone, Copy)]
struct Reading {
    /// Value as found in the payload; this is what accumulators hold
    raw: f64,
    /// Value after the consumer's conversion
    display: f64,
}

impl Consumer {
    pub fn from_config(config: &ConsumerConfig) -> Self {
        let conversion = config.conversion.unwrap_or_default();
        if !conversion.is_compatible() {
            tracing::warn!(
                observation = %config.observation,
                "conversion between incompatible units, consumer will never update"
            );
        }
        Self {
            observation: config.observation.clone(),
            source: ValueSource::from_config(config.payload_key.as_deref(), config.formula.as_ref()),
            conversion,
            policy: config
                .aggregation
                .unwrap_or_else(|| config.observation.default_policy()),
        }
    }

    fn read(&self, payload: &Value) -> Option<Reading> {
        let raw = self.source.extract(payload)?;
        let display = self.conversion.apply(raw)?;
        Some(Reading { raw, display })
    }

    /// The interval aggregate in display units
    fn combined(&self, accumulators: &AccumulatorSet) -> Option<f64> {
        accumulators
            .combine(&self.observation, self.policy)
            .and_then(|raw| self.conversion.apply(raw))
    }
}

#[derive(Debug)]
struct Gauge {
    consumer: Consumer,
    state: GaugeState,
}

#[derive(Debug)]
struct ChartSeries {
    id: String,
    consumer: Consumer,
    buffer: SeriesBuffer,
}

#[derive(Debug)]
struct Chart {
    window_minutes: Option<u32>,
    series: Vec<ChartSeries>,
    updated_ms: Option<i64>,
}

impl Chart {
    fn window_ms(&self) -> Option<i64> {
        self.window_minutes.map(minutes_to_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatchReport {
    pub timestamp_ms: i64,
    pub gauges_updated: usize,
    pub series_updated: usize,
    pub late_samples: usize,
}

#[derive(Debug)]
pub struct Dispatch {
    pub report: DispatchReport,
    pub events: Vec<RenderEvent>,
}

/// All mutable aggregation state. Owned by exactly one task; see `StationService`.
#[derive(Debug)]
pub struct StationCore {
    archive_interval_ms: i64,
    retention_ms: i64,
    topics: HashMap<String, TopicRule>,
    gauges: BTreeMap<String, Gauge>,
    charts: BTreeMap<String, Chart>,
    accumulators: AccumulatorSet,
    last_update_ms: Option<i64>,
}

impl StationCore {
    pub fn from_snapshot(snapshot: StationSnapshot, now_ms: i64) -> Self {
        let archive_interval_ms = snapshot.config.archive_interval.saturating_mul(MS_PER_SECOND);
        let retention_ms = snapshot.config.timespan.saturating_mul(MS_PER_HOUR);
        let history = snapshot.history;
        let seed = |observation: &MeasurementType| {
            let points = history.get(observation.as_str()).cloned().unwrap_or_default();
            SeriesBuffer::seeded(points, retention_ms, now_ms)
        };

        let gauges: BTreeMap<String, Gauge> = snapshot
            .gauges
            .iter()
            .map(|(id, config)| {
                let consumer = Consumer::from_config(&config.consumer);
                let circular = config
                    .circular
                    .unwrap_or_else(|| consumer.observation.is_circular());
                let state = GaugeState::new(circular, seed(&consumer.observation));
                (id.clone(), Gauge { consumer, state })
            })
            .collect();

        let charts: BTreeMap<String, Chart> = snapshot
            .charts
            .iter()
            .map(|(id, config)| {
                let series = config
                    .series
                    .iter()
                    .map(|s| {
                        let consumer = Consumer::from_config(&s.consumer);
                        let buffer = seed(&consumer.observation);
                        ChartSeries {
                            id: s.id.clone(),
                            consumer,
                            buffer,
                        }
                    })
                    .collect();
                let chart = Chart {
                    window_minutes: config.aggregate_interval_minutes,
                    series,
                    updated_ms: None,
                };
                (id.clone(), chart)
            })
            .collect();

        tracing::info!(
            gauges = gauges.len(),
            charts = charts.len(),
            topics = snapshot.config.topics.len(),
            archive_interval_ms,
            retention_ms,
            "station core built from snapshot"
        );

        Self {
            archive_interval_ms,
            retention_ms,
            topics: snapshot.config.topics,
            gauges,
            charts,
            accumulators: AccumulatorSet::new(),
            last_update_ms: None,
        }
    }

    pub fn archive_interval_ms(&self) -> i64 {
        self.archive_interval_ms
    }

    pub fn last_update_ms(&self) -> Option<i64> {
        self.last_update_ms
    }

    /// Decodes one inbound message and fans it out. A decode failure leaves
    /// every buffer untouched.
    pub fn dispatch(
        &mut self,
        topic: &str,
        body: &[u8],
        received_ms: i64,
    ) -> Result<Dispatch, DecodeError> {
        let rule = self
            .topics
            .get(topic)
            .ok_or_else(|| DecodeError::UnknownTopic(topic.to_string()))?;
        let payload = rule.decode(topic, body)?;
        Ok(self.dispatch_payload(&payload, received_ms))
    }

    pub fn dispatch_payload(&mut self, payload: &Value, received_ms: i64) -> Dispatch {
        let timestamp_ms = effective_timestamp_ms(payload, received_ms);
        let interval_start_ms = interval_start(timestamp_ms, self.archive_interval_ms);
        let mut report = DispatchReport {
            timestamp_ms,
            ..Default::default()
        };
        let mut events = Vec::new();

        let gauge_readings: Vec<(String, Reading)> = self
            .gauges
            .iter()
            .filter_map(|(id, gauge)| {
                let reading = gauge.consumer.read(payload);
                if reading.is_none() {
                    tracing::trace!(gauge = %id, "no value for gauge in payload");
                }
                reading.map(|r| (id.clone(), r))
            })
            .collect();

        let series_readings: Vec<(String, usize, Reading)> = self
            .charts
            .iter()
            .flat_map(|(chart_id, chart)| {
                chart.series.iter().enumerate().filter_map(move |(index, series)| {
                    series
                        .consumer
                        .read(payload)
                        .map(|r| (chart_id.clone(), index, r))
                })
            })
            .collect();

        let late = self.record_samples(payload, interval_start_ms, &gauge_readings, &series_readings);

        for (id, reading) in &gauge_readings {
            let Some(gauge) = self.gauges.get_mut(id) else {
                continue;
            };
            let frames = gauge.state.animate_to(reading.display);
            events.push(RenderEvent::Gauge {
                gauge_id: id.clone(),
                frames,
            });
            report.gauges_updated += 1;

            if late.contains(&gauge.consumer.observation) {
                report.late_samples += 1;
                continue;
            }
            let sample = IntervalSample {
                timestamp_ms,
                interval_start_ms,
                value: reading.display,
                combined: gauge.consumer.combined(&self.accumulators),
            };
            gauge.state.history_mut().insert_interval(sample, received_ms);
        }

        for (chart_id, index, reading) in &series_readings {
            let Some(chart) = self.charts.get_mut(chart_id) else {
                continue;
            };
            let window_ms = chart.window_ms();
            let series = &mut chart.series[*index];

            let outcome = match window_ms {
                Some(window_ms) => series.buffer.insert_window_sum(
                    timestamp_ms,
                    window_ms,
                    reading.display,
                    received_ms,
                ),
                None if late.contains(&series.consumer.observation) => None,
                None => {
                    let sample = IntervalSample {
                        timestamp_ms,
                        interval_start_ms,
                        value: reading.display,
                        combined: series.consumer.combined(&self.accumulators),
                    };
                    Some(series.buffer.insert_interval(sample, received_ms))
                }
            };

            let Some(outcome) = outcome else {
                tracing::debug!(chart = %chart_id, series = %series.id, timestamp_ms, "dropping late sample");
                report.late_samples += 1;
                continue;
            };
            if let Some(point) = series.buffer.last() {
                events.push(RenderEvent::Series {
                    chart_id: chart_id.clone(),
                    series_id: series.id.clone(),
                    outcome,
                    point: *point,
                });
            }
            chart.updated_ms = Some(timestamp_ms);
            report.series_updated += 1;
        }

        self.apply_ratchets(&gauge_readings, &series_readings, &mut events);
        self.last_update_ms = Some(timestamp_ms);

        Dispatch { report, events }
    }

    /// Feeds each measurement type at most once per message into the
    /// archive-interval accumulators. Returns the types whose sample arrived
    /// after their interval had closed.
    ///
    /// A direction is weighted by its paired magnitude from this message,
    /// read by a consumer or straight from the payload, else by the latest
    /// magnitude in the open interval.
    fn record_samples(
        &mut self,
        payload: &Value,
        interval_start_ms: i64,
        gauge_readings: &[(String, Reading)],
        series_readings: &[(String, usize, Reading)],
    ) -> HashSet<MeasurementType> {
        let mut raw_by_type: Vec<(MeasurementType, f64)> = Vec::new();
        let mut push = |observation: &MeasurementType, raw: f64| {
            if !raw_by_type.iter().any(|(seen, _)| seen == observation) {
                raw_by_type.push((observation.clone(), raw));
            }
        };

        for (id, reading) in gauge_readings {
            if let Some(gauge) = self.gauges.get(id) {
                push(&gauge.consumer.observation, reading.raw);
            }
        }
        for (chart_id, index, reading) in series_readings {
            let Some(chart) = self.charts.get(chart_id) else {
                continue;
            };
            // Window-summed charts live on their own timeline
            if chart.window_minutes.is_none() {
                push(&chart.series[*index].consumer.observation, reading.raw);
            }
        }

        let mut late = HashSet::new();
        for (observation, raw) in &raw_by_type {
            let sample = match observation.magnitude_pair() {
                Some(pair) => {
                    let magnitude = raw_by_type
                        .iter()
                        .find(|(seen, _)| *seen == pair)
                        .map(|(_, value)| *value)
                        .or_else(|| lookup(payload, pair.as_str()).and_then(as_number))
                        .or_else(|| self.accumulators.latest_in(&pair, interval_start_ms))
                        .unwrap_or(1.0);
                    Sample::new(*raw, magnitude)
                }
                None => Sample::unweighted(*raw),
            };
            if self.accumulators.observe(observation, interval_start_ms, sample) == Observation::Late {
                late.insert(observation.clone());
            }
        }
        late
    }

    /// Raises gauges whose displayed value a faster-reporting type may exceed.
    /// Runs after direct gauge updates so a gust in the same message cannot
    /// undo the ratchet.
    fn apply_ratchets(
        &mut self,
        gauge_readings: &[(String, Reading)],
        series_readings: &[(String, usize, Reading)],
        events: &mut Vec<RenderEvent>,
    ) {
        let mut candidates: HashMap<MeasurementType, f64> = HashMap::new();
        let gauge_sources = gauge_readings
            .iter()
            .filter_map(|(id, r)| self.gauges.get(id).map(|g| (&g.consumer, r.raw)));
        let series_sources = series_readings.iter().filter_map(|(chart_id, index, r)| {
            self.charts
                .get(chart_id)
                .map(|c| (&c.series[*index].consumer, r.raw))
        });
        for (consumer, raw) in gauge_sources.chain(series_sources) {
            if let Some(target) = consumer.observation.ratchets() {
                let best = candidates.entry(target).or_insert(raw);
                *best = best.max(raw);
            }
        }

        // Compared in each target gauge's own display units
        for (target, raw) in candidates {
            for (id, gauge) in self.gauges.iter_mut() {
                if gauge.consumer.observation != target {
                    continue;
                }
                let Some(value) = gauge.consumer.conversion.apply(raw) else {
                    continue;
                };
                if let Some(frames) = gauge.state.ratchet(value) {
                    tracing::debug!(gauge = %id, value, "ratcheting gauge");
                    events.push(RenderEvent::Gauge {
                        gauge_id: id.clone(),
                        frames,
                    });
                }
            }
        }
    }

    pub fn view(&self) -> DashboardView {
        let gauges = self
            .gauges
            .iter()
            .map(|(id, gauge)| GaugeView {
                id: id.clone(),
                observation: gauge.consumer.observation.clone(),
                value: gauge.state.value(),
                circular: gauge.state.is_circular(),
                history: gauge.state.history().to_vec(),
            })
            .collect();

        let charts = self
            .charts
            .iter()
            .map(|(id, chart)| ChartView {
                id: id.clone(),
                aggregate_interval_minutes: chart.window_minutes,
                updated_ms: chart.updated_ms,
                series: chart
                    .series
                    .iter()
                    .map(|s| SeriesView {
                        id: s.id.clone(),
                        observation: s.consumer.observation.clone(),
                        points: s.buffer.to_vec(),
                    })
                    .collect(),
            })
            .collect();

        DashboardView {
            last_update_ms: self.last_update_ms,
            archive_interval_seconds: self.archive_interval_ms / MS_PER_SECOND,
            timespan_hours: self.retention_ms / MS_PER_HOUR,
            gauges,
            charts,
        }
    }

    pub fn gauge_value(&self, id: &str) -> Option<f64> {
        self.gauges.get(id).and_then(|g| g.state.value())
    }

    pub fn series_points(&self, chart_id: &str, series_id: &str) -> Option<Vec<SeriesPoint>> {
        self.charts
            .get(chart_id)?
            .series
            .iter()
            .find(|s| s.id == series_id)
            .map(|s| s.buffer.to_vec())
    }
}
