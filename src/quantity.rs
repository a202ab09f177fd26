use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// A physical value: magnitude together with the unit it is expressed in.
///
/// Quantities show up in function configuration (window offsets, thresholds)
/// and as unit metadata attached to containers. No unit conversion happens
/// here, `0.5 s` and `500 ms` are different values as far as hashing goes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    magnitude: f64,
    unit: Cow<'static, str>,
}

impl Quantity {
    pub fn new(magnitude: f64, unit: impl Into<Cow<'static, str>>) -> Self {
        Self {
            magnitude,
            unit: unit.into(),
        }
    }

    /// A unitless quantity.
    pub fn dimensionless(magnitude: f64) -> Self {
        Self::new(magnitude, "dimensionless")
    }

    pub fn magnitude(&self) -> f64 {
        self.magnitude
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.magnitude, self.unit)
    }
}
