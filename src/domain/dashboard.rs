// Dashboard read models and render events consumed by the rendering layer
use super::gauge::GaugeFrame;
use super::measurement::MeasurementType;
use super::series::{InsertOutcome, SeriesPoint};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct GaugeView {
    pub id: String,
    pub observation: MeasurementType,
    pub value: Option<f64>,
    pub circular: bool,
    pub history: Vec<SeriesPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeriesView {
    pub id: String,
    pub observation: MeasurementType,
    pub points: Vec<SeriesPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartView {
    pub id: String,
    pub aggregate_interval_minutes: Option<u32>,
    pub updated_ms: Option<i64>,
    pub series: Vec<SeriesView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub last_update_ms: Option<i64>,
    pub archive_interval_seconds: i64,
    pub timespan_hours: i64,
    pub gauges: Vec<GaugeView>,
    pub charts: Vec<ChartView>,
}

impl DashboardView {
    pub fn gauge(&self, id: &str) -> Option<&GaugeView> {
        self.gauges.iter().find(|g| g.id == id)
    }
}

/// Incremental updates pushed to stream subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderEvent {
    Gauge {
        gauge_id: String,
        frames: Vec<GaugeFrame>,
    },
    Series {
        chart_id: String,
        series_id: String,
        outcome: InsertOutcome,
        point: SeriesPoint,
    },
    Reloaded {
        last_good_stamp: i64,
    },
}
