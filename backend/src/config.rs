//! Environment-variable configuration, read once at startup. Every knob has
//! a default so the service runs unconfigured in local dev, matching
//! `uwb_hub::UwbHubConfig`'s `env::var(...).ok().and_then(...).unwrap_or(..)`
//! idiom.

#[derive(Debug, Clone)]
pub struct Config {
    /// Fixture controller UDP destination (C1).
    pub fixture_ip: String,
    pub fixture_port: u16,

    /// Sensor ingress websocket listen port (C3).
    pub sensor_ws_port: u16,

    /// Debounce pass period in milliseconds (C4).
    pub debounce_interval_ms: u64,

    /// LOCATE sweep parameters (C7).
    pub pan_step_deg: f64,
    pub tilt_step_deg: f64,
    pub dwell_ms: u64,
    pub max_scan_tilt_deg: f64,

    /// Persisted file locations (C2).
    pub fixtures_path: String,
    pub sensors_path: String,
    pub scan_history_path: String,

    /// Backpressure cap on a per-sensor buffer.
    pub sensor_buffer_cap: usize,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fixture_ip: std::env::var("FIXTURE_IP").unwrap_or_else(|_| "127.0.0.1".to_string()),
            fixture_port: env_or("FIXTURE_PORT", 8000),
            sensor_ws_port: env_or("SENSOR_WS_PORT", 8765),
            debounce_interval_ms: env_or("DEBOUNCE_INTERVAL_MS", 150),
            pan_step_deg: env_or("PAN_STEP_DEG", 1.0),
            tilt_step_deg: env_or("TILT_STEP_DEG", 1.0),
            dwell_ms: env_or("DWELL_MS", 20),
            max_scan_tilt_deg: env_or("MAX_SCAN_TILT_DEG", 85.0),
            fixtures_path: std::env::var("FIXTURES_PATH").unwrap_or_else(|_| ".fixtures.json".to_string()),
            sensors_path: std::env::var("SENSORS_PATH").unwrap_or_else(|_| ".sensors.json".to_string()),
            scan_history_path: std::env::var("SCAN_HISTORY_PATH")
                .unwrap_or_else(|_| "sensor_history.json".to_string()),
            sensor_buffer_cap: env_or("SENSOR_BUFFER_CAP", 32),
        }
    }
}
