//! # spotlight-types
//!
//! Wire and persisted-file shapes shared between the aiming/calibration
//! service and any external tooling (ground-plan editors, fixture/sensor
//! JSON editors) that reads or writes the same files.
//!
//! These types carry no I/O and no async — plain `serde` structs, mirroring
//! a sensor's telemetry frame, a fixture's mechanical range table, a
//! calibrated sensor anchor, and a diagnostic scan-history record.
//!
//! ## Coordinate conventions
//!
//! - **Pan**: horizontal rotation, degrees. Calibrated anchors and solver
//!   output live in `[-270, 270]`; raw sensor-ingress values are unrelated
//!   (sensors report light intensity, not angles).
//! - **Tilt**: vertical rotation, degrees, `0` = horizontal, `+90` =
//!   straight down.
//! - **Direction**: sign of the pan delta during a calibration sweep,
//!   `+1` or `-1`. Informational on the anchor record — never reapplied
//!   at aim time.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ── Sensor ingress wire frames ────────────────────────────────────────────────

/// Inbound telemetry frame from a sensor node: `{"sensorId": 1, "value": 12.5}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorFrame {
    pub sensor_id: u32,
    pub value: f64,
}

/// Outbound error reply for a malformed inbound frame. One-way telemetry
/// otherwise has no success reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorErrorFrame {
    pub error: String,
}

impl SensorErrorFrame {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { error: reason.into() }
    }
}

// ── Fixture descriptor table ──────────────────────────────────────────────────

/// Mechanical range for one channel: `{"pan":[min,max],"tilt":[min,max],"zoom":[min,max]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureDescriptor {
    pub pan: [f64; 2],
    pub tilt: [f64; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom: Option<[f64; 2]>,
}

impl FixtureDescriptor {
    pub fn pan_range(&self) -> (f64, f64) {
        (self.pan[0], self.pan[1])
    }

    pub fn tilt_range(&self) -> (f64, f64) {
        (self.tilt[0], self.tilt[1])
    }
}

/// `{ "<channel>": FixtureDescriptor }`
pub type FixtureTable = HashMap<String, FixtureDescriptor>;

// ── Sensor anchor table ───────────────────────────────────────────────────────

/// A calibrated `(pan, tilt, direction)` pose for one sensor on one channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SensorAnchor {
    pub pan: f64,
    pub tilt: f64,
    pub direction: i8,
}

/// `{ "<channel>": { "<sensor_id>": SensorAnchor } }`
pub type SensorAnchorTable = HashMap<String, HashMap<u32, SensorAnchor>>;

/// Number of sensors a fully calibrated channel must have anchors for.
pub const SENSORS_PER_CHANNEL: usize = 4;
pub const SENSOR_IDS: [u32; SENSORS_PER_CHANNEL] = [1, 2, 3, 4];

// ── Scan history (diagnostic snapshot) ────────────────────────────────────────

/// One sample captured during a LOCATE sweep.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScanHistoryRecord {
    pub intensity: f64,
    pub pan: f64,
    pub tilt: f64,
    pub direction: i8,
}

/// `{ "<sensor_id>": [ScanHistoryRecord, ...] }`
pub type ScanHistory = HashMap<u32, Vec<ScanHistoryRecord>>;

// ── Fixture control addressing ────────────────────────────────────────────────

/// The two angular parameters addressable via `set_parameter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureParameter {
    Pan,
    Tilt,
}

impl std::fmt::Display for FixtureParameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FixtureParameter::Pan => write!(f, "pan"),
            FixtureParameter::Tilt => write!(f, "tilt"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_frame_round_trips() {
        let frame = SensorFrame { sensor_id: 2, value: 41.5 };
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(json, r#"{"sensorId":2,"value":41.5}"#);
        let back: SensorFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(back.sensor_id, 2);
    }

    #[test]
    fn fixture_descriptor_ranges() {
        let d = FixtureDescriptor { pan: [-270.0, 270.0], tilt: [-115.0, 115.0], zoom: None };
        assert_eq!(d.pan_range(), (-270.0, 270.0));
        assert_eq!(d.tilt_range(), (-115.0, 115.0));
    }

    #[test]
    fn anchor_table_keys_by_channel_and_sensor() {
        let mut table: SensorAnchorTable = HashMap::new();
        table.entry("r1".to_string()).or_default().insert(
            1,
            SensorAnchor { pan: -222.29, tilt: 50.0, direction: 1 },
        );
        let json = serde_json::to_string(&table).unwrap();
        let back: SensorAnchorTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back["r1"][&1].tilt, 50.0);
    }
}
