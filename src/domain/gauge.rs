// Gauge state and the wrap-aware value animator
use super::series::SeriesBuffer;
use serde::Serialize;

/// Transitions wider than this on a circular gauge go across the 0°/360° boundary.
pub const WRAP_THRESHOLD: f64 = 180.0;
const FULL_TURN: f64 = 360.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Easing {
    #[default]
    CubicOut,
    Linear,
}

/// One value write handed to the rendering layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GaugeFrame {
    pub value: f64,
    pub animate: bool,
    pub easing: Easing,
}

impl GaugeFrame {
    fn eased(value: f64, easing: Easing) -> Self {
        Self {
            value,
            animate: true,
            easing,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GaugeState {
    value: Option<f64>,
    circular: bool,
    easing: Easing,
    history: SeriesBuffer,
}

impl GaugeState {
    /// A gauge starts out showing the newest point of its trend history, if any.
    pub fn new(circular: bool, history: SeriesBuffer) -> Self {
        Self {
            value: history.last().and_then(|p| p.value),
            circular,
            easing: Easing::default(),
            history,
        }
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn is_circular(&self) -> bool {
        self.circular
    }

    pub fn history(&self) -> &SeriesBuffer {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut SeriesBuffer {
        &mut self.history
    }

    /// Moves the displayed value to `target`, returning the writes to render in order.
    ///
    /// A circular gauge crossing more than half a turn sweeps to the near
    /// boundary, jumps silently to the opposite one, then eases to the target,
    /// so 350° -> 10° passes through north instead of spinning through south.
    pub fn animate_to(&mut self, target: f64) -> Vec<GaugeFrame> {
        let frames = match self.value {
            Some(current) if self.circular && (target - current).abs() > WRAP_THRESHOLD => {
                let (near, far) = if current < WRAP_THRESHOLD {
                    (0.0, FULL_TURN)
                } else {
                    (FULL_TURN, 0.0)
                };
                vec![
                    GaugeFrame::eased(near, Easing::Linear),
                    GaugeFrame {
                        value: far,
                        animate: false,
                        easing: Easing::Linear,
                    },
                    GaugeFrame::eased(target, self.easing),
                ]
            }
            _ => vec![GaugeFrame::eased(target, self.easing)],
        };
        self.value = Some(target);
        frames
    }

    /// Raises the displayed value to `candidate` if it is higher. The trend
    /// history is left alone.
    pub fn ratchet(&mut self, candidate: f64) -> Option<Vec<GaugeFrame>> {
        match self.value {
            Some(current) if candidate > current => Some(self.animate_to(candidate)),
            _ => None,
        }
    }
}
