// Series buffers - bounded, time-ordered point sequences backing charts and gauge trends
use super::bucketing::window_center;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A `(time, value)` pair. A missing value marks an interval with no
/// meaningful aggregate, e.g. calm wind direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(i64, Option<f64>)", into = "(i64, Option<f64>)")]
pub struct SeriesPoint {
    pub time_ms: i64,
    pub value: Option<f64>,
}

impl SeriesPoint {
    pub fn new(time_ms: i64, value: Option<f64>) -> Self {
        Self { time_ms, value }
    }
}

impl From<(i64, Option<f64>)> for SeriesPoint {
    fn from((time_ms, value): (i64, Option<f64>)) -> Self {
        Self::new(time_ms, value)
    }
}

impl From<SeriesPoint> for (i64, Option<f64>) {
    fn from(point: SeriesPoint) -> Self {
        (point.time_ms, point.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertOutcome {
    StartNewPoint,
    RefineOpenPoint,
}

/// A sample headed for an interval-aggregated series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalSample {
    pub timestamp_ms: i64,
    pub interval_start_ms: i64,
    /// The sample itself, used when it opens a new point
    pub value: f64,
    /// Aggregate of every sample in the interval, including this one
    pub combined: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesBuffer {
    points: VecDeque<SeriesPoint>,
    retention_ms: i64,
}

impl SeriesBuffer {
    pub fn new(retention_ms: i64) -> Self {
        Self {
            points: VecDeque::new(),
            retention_ms,
        }
    }

    /// Buffer pre-filled with server-computed history, ordered and trimmed to the horizon.
    pub fn seeded<I>(points: I, retention_ms: i64, now_ms: i64) -> Self
    where
        I: IntoIterator<Item = SeriesPoint>,
    {
        let mut sorted: Vec<SeriesPoint> = points.into_iter().collect();
        sorted.sort_by_key(|p| p.time_ms);
        let mut buffer = Self {
            points: sorted.into(),
            retention_ms,
        };
        buffer.evict(now_ms);
        buffer
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&SeriesPoint> {
        self.points.back()
    }

    pub fn to_vec(&self) -> Vec<SeriesPoint> {
        self.points.iter().copied().collect()
    }

    /// One point per interval. The last point stays open, and is refined with
    /// the interval's aggregate, until a sample from a later interval arrives.
    pub fn insert_interval(&mut self, sample: IntervalSample, now_ms: i64) -> InsertOutcome {
        let outcome = match self.points.back() {
            Some(last) if last.time_ms >= sample.interval_start_ms => InsertOutcome::RefineOpenPoint,
            _ => InsertOutcome::StartNewPoint,
        };

        match outcome {
            InsertOutcome::RefineOpenPoint => {
                if let Some(open) = self.points.pop_back() {
                    self.points.push_back(SeriesPoint::new(
                        open.time_ms.max(sample.timestamp_ms),
                        sample.combined,
                    ));
                }
            }
            InsertOutcome::StartNewPoint => {
                self.points
                    .push_back(SeriesPoint::new(sample.timestamp_ms, Some(sample.value)));
            }
        }

        self.evict(now_ms);
        outcome
    }

    /// Sums every sample falling in the same aggregation window into one point
    /// at the window's center. Returns `None` for a sample whose window is
    /// older than the last point.
    pub fn insert_window_sum(
        &mut self,
        timestamp_ms: i64,
        window_ms: i64,
        value: f64,
        now_ms: i64,
    ) -> Option<InsertOutcome> {
        let center = window_center(timestamp_ms, window_ms);
        let outcome = match self.points.back_mut() {
            Some(last) if last.time_ms == center => {
                last.value = Some(last.value.unwrap_or(0.0) + value);
                InsertOutcome::RefineOpenPoint
            }
            Some(last) if last.time_ms > center => return None,
            _ => {
                self.points.push_back(SeriesPoint::new(center, Some(value)));
                InsertOutcome::StartNewPoint
            }
        };

        self.evict(now_ms);
        Some(outcome)
    }

    /// Drops points older than the retention horizon. Returns how many went.
    pub fn evict(&mut self, now_ms: i64) -> usize {
        let horizon = now_ms.saturating_sub(self.retention_ms);
        let mut evicted = 0;
        while self.points.front().is_some_and(|p| p.time_ms < horizon) {
            self.points.pop_front();
            evicted += 1;
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregation::{AccumulatorSet, AggregationPolicy, Sample};
    use crate::domain::bucketing::interval_start;
    use crate::domain::measurement::MeasurementType;

    const INTERVAL: i64 = 300_000;
    const DAY: i64 = 86_400_000;
    const BASE: i64 = 1_700_000_100_000;

    fn feed(
        buffer: &mut SeriesBuffer,
        accumulators: &mut AccumulatorSet,
        policy: AggregationPolicy,
        timestamp_ms: i64,
        value: f64,
    ) -> InsertOutcome {
        let measurement = MeasurementType::OutTemp;
        let start = interval_start(timestamp_ms, INTERVAL);
        accumulators.observe(&measurement, start, Sample::unweighted(value));
        let sample = IntervalSample {
            timestamp_ms,
            interval_start_ms: start,
            value,
            combined: accumulators.combine(&measurement, policy),
        };
        buffer.insert_interval(sample, BASE + INTERVAL)
    }

    #[test]
    fn test_one_point_per_interval_regardless_of_order() {
        let orders = [[10.0, 20.0, 30.0], [30.0, 10.0, 20.0], [20.0, 30.0, 10.0]];
        for order in orders {
            let mut buffer = SeriesBuffer::new(DAY);
            let mut accumulators = AccumulatorSet::new();
            for (i, value) in order.iter().enumerate() {
                feed(
                    &mut buffer,
                    &mut accumulators,
                    AggregationPolicy::Mean,
                    BASE + 1_000 * (i as i64 + 1),
                    *value,
                );
            }
            assert_eq!(buffer.len(), 1);
            assert_eq!(buffer.last().unwrap().value, Some(20.0));
        }
    }

    #[test]
    fn test_maximum_policy_and_interval_close() {
        let mut buffer = SeriesBuffer::new(DAY);
        let mut accumulators = AccumulatorSet::new();
        let policy = AggregationPolicy::Maximum;

        assert_eq!(
            feed(&mut buffer, &mut accumulators, policy, BASE + 1_000, 4.0),
            InsertOutcome::StartNewPoint
        );
        assert_eq!(
            feed(&mut buffer, &mut accumulators, policy, BASE + 2_000, 9.0),
            InsertOutcome::RefineOpenPoint
        );
        feed(&mut buffer, &mut accumulators, policy, BASE + 3_000, 5.0);
        assert_eq!(buffer.to_vec(), vec![SeriesPoint::new(BASE + 3_000, Some(9.0))]);

        assert_eq!(
            feed(&mut buffer, &mut accumulators, policy, BASE + INTERVAL + 1_000, 2.0),
            InsertOutcome::StartNewPoint
        );
        assert_eq!(
            buffer.to_vec(),
            vec![
                SeriesPoint::new(BASE + 3_000, Some(9.0)),
                SeriesPoint::new(BASE + INTERVAL + 1_000, Some(2.0)),
            ]
        );
    }

    #[test]
    fn test_window_sum_merges_same_window() {
        let hour = 3_600_000;
        let start = 1_699_999_200_000; // hour aligned
        let mut buffer = SeriesBuffer::new(DAY);
        assert_eq!(
            buffer.insert_window_sum(start + 60_000, hour, 2.0, start + hour),
            Some(InsertOutcome::StartNewPoint)
        );
        assert_eq!(
            buffer.insert_window_sum(start + 120_000, hour, 3.0, start + hour),
            Some(InsertOutcome::RefineOpenPoint)
        );
        assert_eq!(buffer.to_vec(), vec![SeriesPoint::new(start + hour / 2, Some(5.0))]);

        buffer.insert_window_sum(start + hour + 5, hour, 1.0, start + hour);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.insert_window_sum(start + 10, hour, 1.0, start + hour), None);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_eviction_is_idempotent() {
        let now = BASE;
        let points = [
            SeriesPoint::new(now - DAY - 2, Some(1.0)),
            SeriesPoint::new(now - DAY - 1, Some(2.0)),
            SeriesPoint::new(now - DAY, Some(3.0)),
            SeriesPoint::new(now - 1, Some(4.0)),
        ];
        let mut buffer = SeriesBuffer::seeded(points, DAY, now - DAY);
        assert_eq!(buffer.len(), 4);

        assert_eq!(buffer.evict(now), 2);
        let kept = buffer.to_vec();
        assert_eq!(buffer.evict(now), 0);
        assert_eq!(buffer.evict(now), 0);
        assert_eq!(buffer.to_vec(), kept);
        assert_eq!(kept[0].time_ms, now - DAY);
    }

    #[test]
    fn test_interval_insert_evicts_expired_points() {
        let points = [
            SeriesPoint::new(BASE - DAY - 1, Some(1.0)),
            SeriesPoint::new(BASE - 10, Some(2.0)),
        ];
        let mut buffer = SeriesBuffer::seeded(points, DAY, BASE - DAY);
        assert_eq!(buffer.len(), 2);

        let sample = IntervalSample {
            timestamp_ms: BASE + 1_000,
            interval_start_ms: BASE,
            value: 3.0,
            combined: Some(3.0),
        };
        assert_eq!(buffer.insert_interval(sample, BASE), InsertOutcome::StartNewPoint);
        assert_eq!(
            buffer.to_vec(),
            vec![
                SeriesPoint::new(BASE - 10, Some(2.0)),
                SeriesPoint::new(BASE + 1_000, Some(3.0)),
            ]
        );
    }

    #[test]
    fn test_window_insert_evicts_expired_points() {
        let hour = 3_600_000;
        let start = 1_699_999_200_000; // hour aligned
        let mut buffer = SeriesBuffer::new(2 * hour);
        buffer.insert_window_sum(start + 60_000, hour, 1.0, start);
        buffer.insert_window_sum(start + hour + 60_000, hour, 2.0, start);
        assert_eq!(buffer.len(), 2);

        // First window's center is now past the two-hour horizon
        let now = start + 3 * hour;
        assert_eq!(
            buffer.insert_window_sum(start + 2 * hour + 60_000, hour, 4.0, now),
            Some(InsertOutcome::StartNewPoint)
        );
        assert_eq!(
            buffer.to_vec(),
            vec![
                SeriesPoint::new(start + hour + hour / 2, Some(2.0)),
                SeriesPoint::new(start + 2 * hour + hour / 2, Some(4.0)),
            ]
        );
    }

    #[test]
    fn test_eviction_on_empty_buffer() {
        let mut buffer = SeriesBuffer::new(DAY);
        assert_eq!(buffer.evict(BASE), 0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_seeded_buffer_is_ordered() {
        let buffer = SeriesBuffer::seeded(
            [SeriesPoint::new(BASE, Some(2.0)), SeriesPoint::new(BASE - 10, Some(1.0))],
            DAY,
            BASE,
        );
        let times: Vec<i64> = buffer.to_vec().iter().map(|p| p.time_ms).collect();
        assert_eq!(times, vec![BASE - 10, BASE]);
    }

    #[test]
    fn test_point_serializes_as_pair() {
        let point = SeriesPoint::new(1000, Some(2.5));
        assert_eq!(serde_json::to_string(&point).unwrap(), "[1000,2.5]");
        let parsed: SeriesPoint = serde_json::from_str("[2000,null]").unwrap();
        assert_eq!(parsed, SeriesPoint::new(2000, None));
    }
}
