//! Static feature catalog for artificial-lift (ESP) wells.
//!
//! The deviation analyzer looks features up in [`EXPECTED_RANGES`], and the
//! failure model consumes sequences laid out in [`SEQUENCE_FEATURES`] order.

/// Declared operating envelope for one feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpectedRange {
    pub feature: &'static str,
    pub min: f64,
    pub max: f64,
    pub unit: &'static str,
}

impl ExpectedRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

const fn range(feature: &'static str, min: f64, max: f64, unit: &'static str) -> ExpectedRange {
    ExpectedRange { feature, min, max, unit }
}

pub const EXPECTED_RANGES: &[ExpectedRange] = &[
    range("pump_intake_pressure", 50.0, 500.0, "psi"),
    range("pump_discharge_pressure", 500.0, 3000.0, "psi"),
    range("pump_temperature", 100.0, 180.0, "F"),
    range("pump_vibration", 0.0, 2.5, "mm/s"),
    range("pump_current", 20.0, 80.0, "A"),
    range("motor_temperature", 150.0, 250.0, "F"),
    range("motor_current", 20.0, 90.0, "A"),
    range("motor_power", 50.0, 500.0, "kW"),
    range("oil_rate", 50.0, 2000.0, "bbl/d"),
    range("water_rate", 0.0, 3000.0, "bbl/d"),
    range("gas_rate", 0.0, 5000.0, "mcf/d"),
    range("casing_pressure", 100.0, 1200.0, "psi"),
    range("tubing_pressure", 100.0, 2000.0, "psi"),
    range("pump_efficiency", 50.0, 100.0, "%"),
    range("water_cut", 0.0, 95.0, "%"),
    range("gas_oil_ratio", 100.0, 2000.0, "scf/bbl"),
];

/// Which side of the operating envelope a threshold guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// Risk grows as the value rises past the limit.
    Upper,
    /// Risk grows as the value falls below the limit.
    Lower,
}

/// Failure-risk threshold for one feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FailureThreshold {
    pub feature: &'static str,
    pub bound: Bound,
    /// The `max` (upper) or `min` (lower) limit.
    pub limit: f64,
    pub critical: Option<f64>,
    pub unit: &'static str,
}

impl FailureThreshold {
    /// Critical level, defaulting to 10% beyond the limit.
    pub fn critical_level(&self) -> f64 {
        match (self.critical, self.bound) {
            (Some(c), _) => c,
            (None, Bound::Upper) => self.limit * 1.1,
            (None, Bound::Lower) => self.limit * 0.9,
        }
    }
}

pub const FAILURE_THRESHOLDS: &[FailureThreshold] = &[
    FailureThreshold { feature: "pump_temperature", bound: Bound::Upper, limit: 180.0, critical: Some(200.0), unit: "F" },
    FailureThreshold { feature: "pump_vibration", bound: Bound::Upper, limit: 2.5, critical: Some(3.5), unit: "mm/s" },
    FailureThreshold { feature: "motor_temperature", bound: Bound::Upper, limit: 250.0, critical: Some(280.0), unit: "F" },
    FailureThreshold { feature: "motor_current", bound: Bound::Upper, limit: 90.0, critical: Some(100.0), unit: "A" },
    FailureThreshold { feature: "pump_efficiency", bound: Bound::Lower, limit: 50.0, critical: Some(40.0), unit: "%" },
    FailureThreshold { feature: "casing_pressure", bound: Bound::Upper, limit: 1200.0, critical: Some(1400.0), unit: "psi" },
];

/// Column order of the failure model's input sequences.
pub const SEQUENCE_FEATURES: &[&str] = &[
    "pump_intake_pressure",
    "pump_discharge_pressure",
    "pump_temperature",
    "pump_vibration",
    "pump_current",
    "pump_speed",
    "motor_temperature",
    "motor_current",
    "motor_voltage",
    "motor_power",
    "oil_rate",
    "water_rate",
    "gas_rate",
    "fluid_level",
    "casing_pressure",
    "tubing_pressure",
    "wellhead_temperature",
    "pump_efficiency",
    "gas_oil_ratio",
    "water_cut",
];

/// Component grouping used by health assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Pump,
    Motor,
    Production,
}

impl Component {
    pub const ALL: [Component; 3] = [Component::Pump, Component::Motor, Component::Production];

    pub fn name(&self) -> &'static str {
        match self {
            Component::Pump => "pump",
            Component::Motor => "motor",
            Component::Production => "production",
        }
    }

    pub fn weight(&self) -> f64 {
        match self {
            Component::Pump => 0.30,
            Component::Motor => 0.25,
            Component::Production => 0.25,
        }
    }

    /// Component owning a feature, by name prefix.
    pub fn of(feature: &str) -> Option<Component> {
        if feature.starts_with("pump_") {
            Some(Component::Pump)
        } else if feature.starts_with("motor_") {
            Some(Component::Motor)
        } else if matches!(
            feature,
            "oil_rate" | "water_rate" | "gas_rate" | "water_cut" | "gas_oil_ratio"
        ) {
            Some(Component::Production)
        } else {
            None
        }
    }
}

pub fn expected_range(feature: &str) -> Option<&'static ExpectedRange> {
    EXPECTED_RANGES.iter().find(|r| r.feature == feature)
}

pub fn failure_threshold(feature: &str) -> Option<&'static FailureThreshold> {
    FAILURE_THRESHOLDS.iter().find(|t| t.feature == feature)
}
