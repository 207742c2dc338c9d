//! # navigator (C7) — calibration state machine
//!
//! `SETUP → LOCATE → CALCULATE → COMPLETE | FAILED`. Tagged variants plus a
//! single `tick()` that runs one phase body to completion and returns the
//! next state, grounded in `procedure_engine::ProcedureEngine`'s
//! `tick()`/`TickResult` shape — narrowed here to one call per phase rather
//! than per timer frame, since each phase body is itself async and owns its
//! waiting (SETUP's stabilization sleep, LOCATE's per-step dwell).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use spotlight_types::{ScanHistoryRecord, SensorAnchor, FixtureParameter, SENSOR_IDS};

use crate::config::Config;
use crate::error::SpotlightError;
use crate::fixture_io::FixtureController;
use crate::pan_resolver::overshoot_correct;
use crate::registry::FixtureRegistry;
use crate::state::IntensityStore;

enum NavigatorState {
    Setup,
    Locate,
    Calculate,
    Complete,
    Failed(String),
}

/// Snapshot returned by every `tick()` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavigatorStatus {
    pub phase: &'static str,
    pub pan: f64,
    pub tilt: f64,
}

pub struct Navigator {
    channel: String,
    fixture: Arc<dyn FixtureController>,
    intensity: Arc<IntensityStore>,
    registry: Arc<FixtureRegistry>,
    scan_history_path: PathBuf,
    pan_step: f64,
    tilt_step: f64,
    dwell: Duration,
    max_scan_tilt: f64,
    setup_settle: Duration,
    pan_range: (f64, f64),
    tilt_range: (f64, f64),
    state: NavigatorState,
    history: HashMap<u32, Vec<ScanHistoryRecord>>,
}

impl Navigator {
    /// Looks up the channel's mechanical ranges up front; fails with
    /// `NotFound` if the channel isn't in the fixture table yet.
    pub async fn new(
        channel: impl Into<String>,
        fixture: Arc<dyn FixtureController>,
        intensity: Arc<IntensityStore>,
        registry: Arc<FixtureRegistry>,
        config: &Config,
    ) -> Result<Self, SpotlightError> {
        let channel = channel.into();
        let pan_range = registry.pan_range(&channel).await?;
        let tilt_range = registry.tilt_range(&channel).await?;
        Ok(Self {
            channel,
            fixture,
            intensity,
            registry,
            scan_history_path: PathBuf::from(&config.scan_history_path),
            pan_step: config.pan_step_deg,
            tilt_step: config.tilt_step_deg,
            dwell: Duration::from_millis(config.dwell_ms),
            max_scan_tilt: config.max_scan_tilt_deg,
            setup_settle: Duration::from_secs(5),
            pan_range,
            tilt_range,
            state: NavigatorState::Setup,
            history: HashMap::new(),
        })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, NavigatorState::Complete | NavigatorState::Failed(_))
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.state {
            NavigatorState::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    /// Run the current phase's full body and return the resulting status.
    /// A no-op on a terminal state.
    pub async fn tick(&mut self) -> NavigatorStatus {
        match self.state {
            NavigatorState::Setup => self.run_setup().await,
            NavigatorState::Locate => self.run_locate().await,
            NavigatorState::Calculate => self.run_calculate().await,
            NavigatorState::Complete | NavigatorState::Failed(_) => self.snapshot(),
        }
    }

    async fn run_setup(&mut self) -> NavigatorStatus {
        self.fixture.set_parameter(&self.channel, FixtureParameter::Pan, 0.0);
        self.fixture.set_parameter(&self.channel, FixtureParameter::Tilt, 0.0);
        self.fixture.set_intensity(&self.channel, 0.0);

        tokio::time::sleep(self.setup_settle).await;

        let baseline = self.intensity.snapshot().await;
        debug!("navigator[{}]: SETUP baseline {:?}", self.channel, baseline);

        self.fixture.set_intensity(&self.channel, 100.0);
        self.state = NavigatorState::Locate;
        self.snapshot()
    }

    /// Raster sweep: tilt rises from 0 in `tilt_step` increments up to
    /// `min(tilt_max, max_scan_tilt)`; each row sweeps pan end to end,
    /// alternating direction per row.
    async fn run_locate(&mut self) -> NavigatorStatus {
        let (pan_min, pan_max) = self.pan_range;
        let tilt_cap = self.tilt_range.1.min(self.max_scan_tilt);

        let mut history: HashMap<u32, Vec<ScanHistoryRecord>> =
            SENSOR_IDS.iter().map(|&id| (id, Vec::new())).collect();

        let mut direction: i8 = 1;
        let mut tilt = 0.0_f64;

        while tilt <= tilt_cap {
            let (start, end) = if direction > 0 { (pan_min, pan_max) } else { (pan_max, pan_min) };
            let mut pan = start;

            loop {
                self.fixture.set_parameter(&self.channel, FixtureParameter::Pan, pan);
                self.fixture.set_parameter(&self.channel, FixtureParameter::Tilt, tilt);
                tokio::time::sleep(self.dwell).await;

                let snapshot = self.intensity.snapshot().await;
                for &sensor_id in SENSOR_IDS.iter() {
                    let intensity = snapshot.get(&sensor_id).copied().unwrap_or(0.0);
                    history
                        .get_mut(&sensor_id)
                        .expect("pre-seeded per-sensor history")
                        .push(ScanHistoryRecord { intensity, pan, tilt, direction });
                }

                if (pan - end).abs() < 1e-9 {
                    break;
                }
                let next = pan + self.pan_step * direction as f64;
                pan = if (direction > 0 && next > end) || (direction < 0 && next < end) { end } else { next };
            }

            direction = -direction;
            tilt += self.tilt_step;
        }

        self.fixture.set_intensity(&self.channel, 0.0);
        self.fixture.set_parameter(&self.channel, FixtureParameter::Pan, 0.0);
        self.fixture.set_parameter(&self.channel, FixtureParameter::Tilt, 0.0);

        self.history = history;
        self.state = NavigatorState::Calculate;
        self.snapshot()
    }

    async fn run_calculate(&mut self) -> NavigatorStatus {
        for &sensor_id in SENSOR_IDS.iter() {
            let Some(best) = self
                .history
                .get(&sensor_id)
                .and_then(|records| records.iter().max_by(|a, b| a.intensity.total_cmp(&b.intensity)))
            else {
                continue;
            };

            let corrected_pan = overshoot_correct(best.pan, best.tilt, best.direction);
            let anchor = SensorAnchor { pan: corrected_pan, tilt: best.tilt, direction: best.direction };

            if let Err(e) = self.registry.put_anchor(&self.channel, sensor_id, anchor).await {
                warn!("navigator[{}]: failed to persist anchor for sensor {sensor_id}: {e}", self.channel);
                self.state = NavigatorState::Failed(format!("registry error: {e}"));
                return self.snapshot();
            }
        }

        if let Err(e) = self.write_scan_history().await {
            warn!("navigator[{}]: failed to write scan history snapshot: {e}", self.channel);
        }

        self.state = NavigatorState::Complete;
        self.snapshot()
    }

    /// Best-effort diagnostic snapshot; unlike the anchor table, this isn't
    /// required to be crash-atomic.
    async fn write_scan_history(&self) -> Result<(), SpotlightError> {
        let json = serde_json::to_string_pretty(&self.history)?;
        tokio::fs::write(&self.scan_history_path, json).await?;
        Ok(())
    }

    fn snapshot(&self) -> NavigatorStatus {
        let (pan, tilt) = self.fixture.pose(&self.channel);
        NavigatorStatus { phase: self.phase_name(), pan, tilt }
    }

    fn phase_name(&self) -> &'static str {
        match &self.state {
            NavigatorState::Setup => "SETUP",
            NavigatorState::Locate => "LOCATE",
            NavigatorState::Calculate => "CALCULATE",
            NavigatorState::Complete => "COMPLETE",
            NavigatorState::Failed(_) => "FAILED",
        }
    }
}
