// Unit conversions and derived formulas applied after extraction
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    DegreeC,
    DegreeF,
    MeterPerSecond,
    KmPerHour,
    MilePerHour,
    Knot,
    Hpa,
    Mbar,
    InchHg,
    MmHg,
    Mm,
    Cm,
    Inch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dimension {
    Temperature,
    Speed,
    Pressure,
    Length,
}

impl Unit {
    fn dimension(self) -> Dimension {
        match self {
            Self::DegreeC | Self::DegreeF => Dimension::Temperature,
            Self::MeterPerSecond | Self::KmPerHour | Self::MilePerHour | Self::Knot => {
                Dimension::Speed
            }
            Self::Hpa | Self::Mbar | Self::InchHg | Self::MmHg => Dimension::Pressure,
            Self::Mm | Self::Cm | Self::Inch => Dimension::Length,
        }
    }

    // Base units: °C, m/s, hPa, mm
    fn to_base(self, value: f64) -> f64 {
        match self {
            Self::DegreeC | Self::MeterPerSecond | Self::Hpa | Self::Mbar | Self::Mm => value,
            Self::DegreeF => (value - 32.0) * 5.0 / 9.0,
            Self::KmPerHour => value / 3.6,
            Self::MilePerHour => value * 0.44704,
            Self::Knot => value * 0.514_444,
            Self::InchHg => value * 33.863_886,
            Self::MmHg => value * 1.333_224,
            Self::Cm => value * 10.0,
            Self::Inch => value * 25.4,
        }
    }

    fn from_base(self, value: f64) -> f64 {
        match self {
            Self::DegreeC | Self::MeterPerSecond | Self::Hpa | Self::Mbar | Self::Mm => value,
            Self::DegreeF => value * 9.0 / 5.0 + 32.0,
            Self::KmPerHour => value * 3.6,
            Self::MilePerHour => value / 0.44704,
            Self::Knot => value / 0.514_444,
            Self::InchHg => value / 33.863_886,
            Self::MmHg => value / 1.333_224,
            Self::Cm => value / 10.0,
            Self::Inch => value / 25.4,
        }
    }
}

/// Numeric-in, numeric-out conversion for one display target.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Conversion {
    #[default]
    Identity,
    Units {
        from: Unit,
        to: Unit,
    },
    Linear {
        factor: f64,
        #[serde(default)]
        offset: f64,
    },
}

impl Conversion {
    /// `None` when the result is not a finite number or the units are incompatible.
    pub fn apply(&self, value: f64) -> Option<f64> {
        let converted = match *self {
            Self::Identity => value,
            Self::Units { from, to } if from.dimension() == to.dimension() => {
                to.from_base(from.to_base(value))
            }
            Self::Units { .. } => return None,
            Self::Linear { factor, offset } => value * factor + offset,
        };
        converted.is_finite().then_some(converted)
    }

    pub fn is_compatible(&self) -> bool {
        match *self {
            Self::Units { from, to } => from.dimension() == to.dimension(),
            _ => true,
        }
    }
}

/// Values computed from more than one payload field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Formula {
    Dewpoint { temperature: String, humidity: String },
}

/// Magnus-formula dewpoint in °C from air temperature (°C) and relative humidity (%).
pub fn dewpoint(temperature_c: f64, humidity_pct: f64) -> Option<f64> {
    let ln_humidity = (humidity_pct / 100.0).ln();
    // Separate coefficients over water and over ice
    let (a, b) = if temperature_c > 0.0 {
        (17.62, 243.12)
    } else {
        (22.46, 272.62)
    };
    let dewpoint = b * ((a * temperature_c) / (b + temperature_c) + ln_humidity)
        / ((a * b) / (b + temperature_c) - ln_humidity);
    dewpoint.is_finite().then_some(dewpoint)
}
