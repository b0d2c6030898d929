// Aggregation policies and per-measurement interval accumulators
use super::measurement::MeasurementType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Vector sums whose components both round to zero at three decimals carry
/// no direction.
const ZERO_VECTOR_TOLERANCE: f64 = 0.0005;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPolicy {
    Mean,
    Maximum,
    #[serde(rename = "circular", alias = "circular_mean")]
    CircularMean,
}

/// A raw sample plus the magnitude that weights it in a circular mean.
/// Non-directional samples carry a unit magnitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub value: f64,
    pub magnitude: f64,
}

impl Sample {
    pub fn new(value: f64, magnitude: f64) -> Self {
        Self { value, magnitude }
    }

    pub fn unweighted(value: f64) -> Self {
        Self::new(value, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntervalAccumulator {
    start_ms: i64,
    samples: Vec<Sample>,
}

impl IntervalAccumulator {
    pub fn new(start_ms: i64) -> Self {
        Self {
            start_ms,
            samples: Vec::new(),
        }
    }

    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    pub fn latest_value(&self) -> Option<f64> {
        self.samples.last().map(|s| s.value)
    }

    /// Combines every sample seen in this interval. `None` means the
    /// interval has no meaningful value (empty, or a zero net direction).
    pub fn combine(&self, policy: AggregationPolicy) -> Option<f64> {
        let values = self.samples.iter().map(|s| s.value);
        match policy {
            AggregationPolicy::Mean => mean(values),
            AggregationPolicy::Maximum => maximum(values),
            AggregationPolicy::CircularMean => {
                circular_mean(self.samples.iter().map(|s| (s.value, s.magnitude)))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    Accepted,
    /// The sample belongs to an interval older than the open one.
    Late,
}

/// One open accumulator per measurement type, on the archive-interval timeline.
#[derive(Debug, Default)]
pub struct AccumulatorSet {
    by_type: HashMap<MeasurementType, IntervalAccumulator>,
}

impl AccumulatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sample, replacing the accumulator when the sample opens a later interval.
    pub fn observe(
        &mut self,
        measurement: &MeasurementType,
        interval_start_ms: i64,
        sample: Sample,
    ) -> Observation {
        match self.by_type.get_mut(measurement) {
            Some(open) if open.start_ms == interval_start_ms => {
                open.push(sample);
                Observation::Accepted
            }
            Some(open) if open.start_ms > interval_start_ms => Observation::Late,
            _ => {
                let mut fresh = IntervalAccumulator::new(interval_start_ms);
                fresh.push(sample);
                self.by_type.insert(measurement.clone(), fresh);
                Observation::Accepted
            }
        }
    }

    /// Latest raw sample of `measurement` within the given interval
    pub fn latest_in(&self, measurement: &MeasurementType, interval_start_ms: i64) -> Option<f64> {
        self.by_type
            .get(measurement)
            .filter(|acc| acc.start_ms == interval_start_ms)
            .and_then(IntervalAccumulator::latest_value)
    }

    pub fn combine(&self, measurement: &MeasurementType, policy: AggregationPolicy) -> Option<f64> {
        self.by_type.get(measurement)?.combine(policy)
    }
}

pub fn mean<I: IntoIterator<Item = f64>>(values: I) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

pub fn maximum<I: IntoIterator<Item = f64>>(values: I) -> Option<f64> {
    values
        .into_iter()
        .fold(None, |max: Option<f64>, v| Some(max.map_or(v, |m| m.max(v))))
}

/// Magnitude-weighted vector mean of `(direction°, magnitude)` pairs, in [0, 360).
///
/// Zero magnitudes carry no direction and are skipped. Returns `None` when the
/// vectors cancel out.
pub fn circular_mean<I: IntoIterator<Item = (f64, f64)>>(samples: I) -> Option<f64> {
    let (sum_x, sum_y) = samples
        .into_iter()
        .filter(|&(_, magnitude)| magnitude > 0.0)
        .fold((0.0_f64, 0.0_f64), |(x, y), (direction, magnitude)| {
            let radians = direction.to_radians();
            (x + radians.cos() * magnitude, y + radians.sin() * magnitude)
        });

    if sum_x.abs() < ZERO_VECTOR_TOLERANCE && sum_y.abs() < ZERO_VECTOR_TOLERANCE {
        return None;
    }

    let degrees = sum_y.atan2(sum_x).to_degrees().rem_euclid(360.0);
    Some(if degrees >= 360.0 { degrees - 360.0 } else { degrees })
}
