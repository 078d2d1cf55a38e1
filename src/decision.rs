//! Delta decision engine — per-field deadband against the persisted baseline.
//!
//! For each field that has a threshold configured:
//!
//! ```text
//!   delta   = |current − baseline|
//!   changed = delta > threshold
//!   transmit = OR(changed)
//! ```
//!
//! The comparison is strict: a delta exactly equal to the threshold does not
//! transmit.  Fields without a threshold are carried in the payload but never
//! gate the decision.  The engine holds no state beyond its threshold table,
//! so equal inputs always yield equal decisions.

use serde::{Deserialize, Serialize};

use crate::baseline::PersistedBaseline;
use crate::reading::{Field, Reading};

/// Per-field change thresholds.  `None` means the field does not gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeltaThresholds {
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
    pub moisture: Option<f32>,
    pub light: Option<f32>,
    pub battery: Option<f32>,
}

impl Default for DeltaThresholds {
    fn default() -> Self {
        Self {
            temperature: Some(0.5),
            humidity: None,
            moisture: Some(2.0),
            light: None,
            battery: None,
        }
    }
}

impl DeltaThresholds {
    /// No field gates; the engine never transmits.
    pub const NONE: Self = Self {
        temperature: None,
        humidity: None,
        moisture: None,
        light: None,
        battery: None,
    };

    pub fn get(&self, field: Field) -> Option<f32> {
        match field {
            Field::Temperature => self.temperature,
            Field::Humidity => self.humidity,
            Field::Moisture => self.moisture,
            Field::Light => self.light,
            Field::Battery => self.battery,
        }
    }

    pub fn set(&mut self, field: Field, threshold: Option<f32>) {
        let slot = match field {
            Field::Temperature => &mut self.temperature,
            Field::Humidity => &mut self.humidity,
            Field::Moisture => &mut self.moisture,
            Field::Light => &mut self.light,
            Field::Battery => &mut self.battery,
        };
        *slot = threshold;
    }

    /// Gating fields with their thresholds, in payload order.
    pub fn iter(&self) -> impl Iterator<Item = (Field, f32)> + '_ {
        Field::ALL
            .into_iter()
            .filter_map(|f| self.get(f).map(|t| (f, t)))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

/// Comparison of one gating field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldDelta {
    pub field: Field,
    pub current: f32,
    pub baseline: f32,
    pub delta: f32,
    pub threshold: f32,
    pub changed: bool,
}

/// Transmit flag plus the deltas that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub transmit: bool,
    pub deltas: heapless::Vec<FieldDelta, { Field::COUNT }>,
}

impl Decision {
    /// The delta for `field`, if it gated this decision.
    pub fn delta(&self, field: Field) -> Option<&FieldDelta> {
        self.deltas.iter().find(|d| d.field == field)
    }

    /// Fields that exceeded their threshold.
    pub fn changed_fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.deltas.iter().filter(|d| d.changed).map(|d| d.field)
    }
}

#[derive(Debug, Clone)]
pub struct DeltaDecisionEngine {
    thresholds: DeltaThresholds,
}

impl DeltaDecisionEngine {
    pub fn new(thresholds: DeltaThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &DeltaThresholds {
        &self.thresholds
    }

    pub fn decide(&self, current: &Reading, baseline: &PersistedBaseline) -> Decision {
        let mut deltas = heapless::Vec::new();
        let mut transmit = false;
        for (field, threshold) in self.thresholds.iter() {
            let now = current.get(field);
            let then = baseline.get(field);
            let delta = (now - then).abs();
            let changed = delta > threshold;
            transmit |= changed;
            // At most Field::COUNT gating fields, so the push cannot fail.
            let _ = deltas.push(FieldDelta {
                field,
                current: now,
                baseline: then,
                delta,
                threshold,
                changed,
            });
        }
        Decision { transmit, deltas }
    }
}
