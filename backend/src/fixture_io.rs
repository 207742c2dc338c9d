//! # fixture_io (C1)
//!
//! Stateless sender over a best-effort UDP datagram channel to the fixture
//! controller, plus the one authoritative record of "where the light is
//! pointing" — the commanded pose per channel.
//!
//! Grounded in `uwb-simulator/src/udp_tx.rs`'s `UdpTransmitter`: bind an
//! ephemeral local socket, `send_to` the destination, log and continue on
//! failure. No reply, no retry, no acknowledgement — fixture controllers
//! accept at ≥50 Hz and coalesce duplicates/drops.

use std::collections::HashMap;
use std::net::UdpSocket;
use std::sync::Mutex;

use tracing::warn;

use spotlight_types::FixtureParameter;

use crate::error::SpotlightError;

/// The interface Navigator and the Aiming Service actually depend on — lets
/// tests substitute an in-memory recorder for the real UDP sender.
pub trait FixtureController: Send + Sync {
    fn set_intensity(&self, channel: &str, pct: f64);
    fn set_parameter(&self, channel: &str, parameter: FixtureParameter, deg: f64);
    fn set_pan(
        &self,
        channel: &str,
        current: f64,
        delta: f64,
        range: (f64, f64),
        use_degrees: bool,
    ) -> Result<f64, SpotlightError>;
    fn set_tilt(
        &self,
        channel: &str,
        current: f64,
        delta: f64,
        range: (f64, f64),
        use_degrees: bool,
    ) -> Result<f64, SpotlightError>;
    fn pose(&self, channel: &str) -> (f64, f64);
}

pub struct FixtureIo {
    socket: UdpSocket,
    dest: String,
    pose: Mutex<HashMap<String, (f64, f64)>>,
}

impl FixtureIo {
    pub fn new(ip: &str, port: u16) -> std::io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        Ok(Self {
            socket,
            dest: format!("{ip}:{port}"),
            pose: Mutex::new(HashMap::new()),
        })
    }

    fn send(&self, address: &str, value: f64) {
        let payload = serde_json::json!({ "address": address, "value": value }).to_string();
        if let Err(e) = self.socket.send_to(payload.as_bytes(), &self.dest) {
            warn!("fixture_io: send to {} failed: {e}", self.dest);
        }
    }

    /// `/eos/chan/<n>/intensity` — fire-and-forget, clamped to [0, 100].
    pub fn set_intensity(&self, channel: &str, pct: f64) {
        let clamped = pct.clamp(0.0, 100.0);
        self.send(&format!("/eos/chan/{channel}/intensity"), clamped);
    }

    /// `/eos/chan/<n>/param/<pan|tilt>` — caller supplies an absolute,
    /// already-range-checked value in degrees. No validation here; this is
    /// the primitive `set_pan`/`set_tilt` build on. Updates the commanded
    /// pose directly, since it's the only authoritative record of where the
    /// light is pointing regardless of which caller moved it.
    pub fn set_parameter(&self, channel: &str, parameter: FixtureParameter, deg: f64) {
        self.send(&format!("/eos/chan/{channel}/param/{parameter}"), deg);
        self.update_pose(channel, |pose| match parameter {
            FixtureParameter::Pan => pose.0 = deg,
            FixtureParameter::Tilt => pose.1 = deg,
        });
    }

    /// Resolve a requested pan move into an absolute angle and send it.
    /// `range` is the channel's `pan_range`, looked up by the caller from
    /// the fixture registry (C1 itself holds no range table).
    pub fn set_pan(
        &self,
        channel: &str,
        current: f64,
        delta: f64,
        range: (f64, f64),
        use_degrees: bool,
    ) -> Result<f64, SpotlightError> {
        let new_value = Self::resolve_move(current, delta, range, use_degrees)?;
        self.set_parameter(channel, FixtureParameter::Pan, new_value);
        Ok(new_value)
    }

    /// Mirrors `set_pan` for tilt.
    pub fn set_tilt(
        &self,
        channel: &str,
        current: f64,
        delta: f64,
        range: (f64, f64),
        use_degrees: bool,
    ) -> Result<f64, SpotlightError> {
        let new_value = Self::resolve_move(current, delta, range, use_degrees)?;
        self.set_parameter(channel, FixtureParameter::Tilt, new_value);
        Ok(new_value)
    }

    fn resolve_move(
        current: f64,
        delta: f64,
        (min, max): (f64, f64),
        use_degrees: bool,
    ) -> Result<f64, SpotlightError> {
        let new_value = if use_degrees {
            current + delta
        } else {
            current + (delta / 100.0) * (max - min)
        };
        if new_value < min || new_value > max {
            return Err(SpotlightError::RangeError { value: new_value, min, max });
        }
        Ok(new_value)
    }

    fn update_pose(&self, channel: &str, mutate: impl FnOnce(&mut (f64, f64))) {
        let mut pose = self.pose.lock().expect("fixture pose mutex poisoned");
        let entry = pose.entry(channel.to_string()).or_insert((0.0, 0.0));
        mutate(entry);
    }

    /// Last commanded `(pan, tilt)` for a channel. `(0, 0)` until a send succeeds.
    pub fn pose(&self, channel: &str) -> (f64, f64) {
        self.pose
            .lock()
            .expect("fixture pose mutex poisoned")
            .get(channel)
            .copied()
            .unwrap_or((0.0, 0.0))
    }
}

impl FixtureController for FixtureIo {
    fn set_intensity(&self, channel: &str, pct: f64) {
        FixtureIo::set_intensity(self, channel, pct)
    }

    fn set_parameter(&self, channel: &str, parameter: FixtureParameter, deg: f64) {
        FixtureIo::set_parameter(self, channel, parameter, deg)
    }

    fn set_pan(
        &self,
        channel: &str,
        current: f64,
        delta: f64,
        range: (f64, f64),
        use_degrees: bool,
    ) -> Result<f64, SpotlightError> {
        FixtureIo::set_pan(self, channel, current, delta, range, use_degrees)
    }

    fn set_tilt(
        &self,
        channel: &str,
        current: f64,
        delta: f64,
        range: (f64, f64),
        use_degrees: bool,
    ) -> Result<f64, SpotlightError> {
        FixtureIo::set_tilt(self, channel, current, delta, range, use_degrees)
    }

    fn pose(&self, channel: &str) -> (f64, f64) {
        FixtureIo::pose(self, channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> FixtureIo {
        FixtureIo::new("127.0.0.1", 9).expect("bind ephemeral socket")
    }

    #[test]
    fn initial_pose_is_origin() {
        let io = fixture();
        assert_eq!(io.pose("r1"), (0.0, 0.0));
    }

    #[test]
    fn set_pan_in_degrees_updates_pose() {
        let io = fixture();
        let result = io.set_pan("r1", 0.0, 45.0, (-270.0, 270.0), true).unwrap();
        assert_eq!(result, 45.0);
        assert_eq!(io.pose("r1"), (45.0, 0.0));
    }

    #[test]
    fn set_pan_out_of_range_rejected_and_pose_unchanged() {
        let io = fixture();
        let err = io.set_pan("r1", 250.0, 50.0, (-270.0, 270.0), true).unwrap_err();
        assert!(matches!(err, SpotlightError::RangeError { .. }));
        assert_eq!(io.pose("r1"), (0.0, 0.0));
    }

    #[test]
    fn set_tilt_in_percent_maps_into_range() {
        let io = fixture();
        // 50% of a [0, 90] span = 45
        let result = io.set_tilt("r1", 0.0, 50.0, (0.0, 90.0), false).unwrap();
        assert_eq!(result, 45.0);
    }
}
