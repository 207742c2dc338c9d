//! # aiming (C8) — Aiming Service
//!
//! The only consumer that calls C5(a), C6, C1, and C2 together: given a
//! target stage coordinate, reconstruct the four calibrated anchors, solve
//! for pan/tilt, resolve pan-wrap against the current pose, and command the
//! fixture. Short-lived, invoked per operator request — no task of its own.

use std::sync::Arc;

use spotlight_types::SENSOR_IDS;

use crate::error::SpotlightError;
use crate::fixture_io::FixtureController;
use crate::pan_resolver::nearest_pan;
use crate::predictor::{Anchor, PanTiltPredictor};
use crate::registry::FixtureRegistry;

pub struct AimingService {
    fixture: Arc<dyn FixtureController>,
    registry: Arc<FixtureRegistry>,
}

impl AimingService {
    pub fn new(fixture: Arc<dyn FixtureController>, registry: Arc<FixtureRegistry>) -> Self {
        Self { fixture, registry }
    }

    /// Aim `channel` at stage coordinate `(x, y)`. `y` arrives in
    /// screen-down coordinates (operator's ground-plan image); `stage_max_y`
    /// converts it to the stage's upward-growing axis before solving.
    pub async fn aim(&self, channel: &str, x: f64, y: f64, stage_max_y: f64) -> Result<(f64, f64), SpotlightError> {
        let anchors = self.collect_anchors(channel).await?;
        let predictor = PanTiltPredictor::solve(&anchors)?;

        let stage_y = stage_max_y - y;
        let (pan_raw, tilt) = predictor.predict(x, stage_y);

        let pan_range = self.registry.pan_range(channel).await?;
        let (current_pan, _current_tilt) = self.fixture.pose(channel);
        let pan = nearest_pan(pan_raw, current_pan, pan_range)?;

        self.fixture.set_parameter(channel, spotlight_types::FixtureParameter::Pan, pan);
        self.fixture.set_parameter(channel, spotlight_types::FixtureParameter::Tilt, tilt);

        Ok((pan, tilt))
    }

    async fn collect_anchors(&self, channel: &str) -> Result<[Anchor; 4], SpotlightError> {
        let anchors = self.registry.get_anchors(channel).await;
        if anchors.len() < SENSOR_IDS.len() {
            return Err(SpotlightError::NotCalibrated {
                channel: channel.to_string(),
                have: anchors.len(),
                need: SENSOR_IDS.len(),
            });
        }

        // Anchors only carry the fixture-observed (pan, tilt); the stage
        // (x, y) each sensor sits at is ground-plan placement data owned by
        // an external operator tool, not C2's anchor table. Folded in here
        // via `sensor_placement` since nothing else maps sensor id -> (x, y).
        let mut out = Vec::with_capacity(4);
        for &sensor_id in SENSOR_IDS.iter() {
            let anchor = anchors
                .get(&sensor_id)
                .ok_or_else(|| SpotlightError::NotCalibrated {
                    channel: channel.to_string(),
                    have: anchors.len(),
                    need: SENSOR_IDS.len(),
                })?;
            let (x, y) = sensor_placement(sensor_id);
            out.push(Anchor { x, y, pan_deg: anchor.pan, tilt_deg: anchor.tilt });
        }

        out.try_into().map_err(|_| SpotlightError::NotCalibrated {
            channel: channel.to_string(),
            have: SENSOR_IDS.len(),
            need: SENSOR_IDS.len(),
        })
    }
}

/// Sensor placement is operator-entered ground-plan data from an external
/// tool. Stubbed here to a fixed four-corner layout so `collect_anchors`
/// has something to project against until that tool exists.
fn sensor_placement(sensor_id: u32) -> (f64, f64) {
    match sensor_id {
        1 => (0.0, 0.0),
        2 => (20.0, 0.0),
        3 => (0.0, 15.0),
        4 => (20.0, 15.0),
        _ => (0.0, 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex as StdMutex;

    use spotlight_types::{FixtureDescriptor, FixtureParameter, FixtureTable, SensorAnchor};

    #[derive(Default)]
    struct RecordingFixture {
        pose: StdMutex<HashMap<String, (f64, f64)>>,
        sent: StdMutex<Vec<(FixtureParameter, f64)>>,
    }

    impl FixtureController for RecordingFixture {
        fn set_intensity(&self, _channel: &str, _pct: f64) {}

        fn set_parameter(&self, channel: &str, parameter: FixtureParameter, deg: f64) {
            self.sent.lock().unwrap().push((parameter, deg));
            let mut pose = self.pose.lock().unwrap();
            let entry = pose.entry(channel.to_string()).or_insert((0.0, 0.0));
            match parameter {
                FixtureParameter::Pan => entry.0 = deg,
                FixtureParameter::Tilt => entry.1 = deg,
            }
        }

        fn set_pan(
            &self,
            _channel: &str,
            _current: f64,
            _delta: f64,
            _range: (f64, f64),
            _use_degrees: bool,
        ) -> Result<f64, SpotlightError> {
            unimplemented!("aiming only commands via set_parameter")
        }

        fn set_tilt(
            &self,
            _channel: &str,
            _current: f64,
            _delta: f64,
            _range: (f64, f64),
            _use_degrees: bool,
        ) -> Result<f64, SpotlightError> {
            unimplemented!("aiming only commands via set_parameter")
        }

        fn pose(&self, channel: &str) -> (f64, f64) {
            self.pose.lock().unwrap().get(channel).copied().unwrap_or((0.0, 0.0))
        }
    }

    struct TempDir(PathBuf);

    impl TempDir {
        fn new() -> Self {
            let dir = std::env::temp_dir().join(format!(
                "spotlight-aiming-test-{}-{}",
                std::process::id(),
                std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos()
            ));
            std::fs::create_dir_all(&dir).unwrap();
            Self(dir)
        }

        fn path(&self) -> &Path {
            &self.0
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    async fn registry_with_fixture(dir: &TempDir, anchor_count: usize) -> Arc<FixtureRegistry> {
        let fixtures_path = dir.path().join(".fixtures.json");
        let sensors_path = dir.path().join(".sensors.json");

        let table: FixtureTable = [(
            "r1".to_string(),
            FixtureDescriptor { pan: [-270.0, 270.0], tilt: [0.0, 85.0], zoom: None },
        )]
        .into_iter()
        .collect();
        tokio::fs::write(&fixtures_path, serde_json::to_string(&table).unwrap()).await.unwrap();

        let registry = FixtureRegistry::load(fixtures_path, sensors_path).await;

        // Four-corner anchors, in sensor-id order.
        let s1 = [
            SensorAnchor { pan: -222.29, tilt: 50.0, direction: 1 },
            SensorAnchor { pan: 45.35, tilt: 48.0, direction: 1 },
            SensorAnchor { pan: 218.32, tilt: 50.0, direction: -1 },
            SensorAnchor { pan: -39.76, tilt: 46.0, direction: -1 },
        ];
        for (i, anchor) in s1.iter().enumerate().take(anchor_count) {
            registry.put_anchor("r1", (i + 1) as u32, *anchor).await.unwrap();
        }

        Arc::new(registry)
    }

    #[tokio::test]
    async fn aim_predicts_and_resolves_pan_tilt() {
        let dir = TempDir::new();
        let registry = registry_with_fixture(&dir, 4).await;
        let fixture = Arc::new(RecordingFixture::default());
        let service = AimingService::new(fixture.clone() as Arc<dyn FixtureController>, registry);

        // stage_max_y = 15 (matches anchor layout), so an on-screen y of 7.5
        // maps straight through to stage y 7.5.
        let (pan, tilt) = service.aim("r1", 10.0, 7.5, 15.0).await.unwrap();

        assert!((pan - -88.0).abs() < 1.0, "pan was {pan}");
        assert!((tilt - 43.0).abs() < 1.0, "tilt was {tilt}");
        assert_eq!(fixture.pose("r1"), (pan, tilt));
    }

    #[tokio::test]
    async fn incomplete_calibration_fails_not_calibrated_and_sends_nothing() {
        let dir = TempDir::new();
        let registry = registry_with_fixture(&dir, 3).await;
        let fixture = Arc::new(RecordingFixture::default());
        let service = AimingService::new(fixture.clone() as Arc<dyn FixtureController>, registry);

        let err = service.aim("r1", 5.0, 5.0, 15.0).await.unwrap_err();
        assert!(matches!(err, SpotlightError::NotCalibrated { have: 3, need: 4, .. }));
        assert!(fixture.sent.lock().unwrap().is_empty());
    }
}
