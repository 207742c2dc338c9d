//! # registry (C2)
//!
//! Loads the fixture-descriptor table and sensor-anchor table from JSON at
//! startup; creates empty files if absent. Mutations are copy-on-write: the
//! full table is held in memory, mutated, then atomically rewritten to disk
//! (open a temp file, write, `rename` over the target) so a crash between
//! open and rename leaves the previous file intact.
//!
//! Grounded in `persistence::load_state`/`save_state`'s load-or-default
//! shape, with channel/sensor-keyed accessors instead of one flat document
//! and a stricter atomic-rewrite discipline, since a torn write here would
//! corrupt the calibration artifact itself rather than a cache of it.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::sync::RwLock;
use tracing::{info, warn};

use spotlight_types::{FixtureTable, SensorAnchor, SensorAnchorTable};

use crate::error::SpotlightError;

pub struct FixtureRegistry {
    fixtures_path: PathBuf,
    sensors_path: PathBuf,
    fixtures: RwLock<FixtureTable>,
    anchors: RwLock<SensorAnchorTable>,
}

async fn load_or_default<T: Default + serde::de::DeserializeOwned>(path: &Path, what: &str) -> T {
    if !path.exists() {
        info!("{what}: no file at {}, starting empty", path.display());
        if let Err(e) = atomic_write(path, &T::default()).await {
            warn!("{what}: failed to create empty file at {}: {e}", path.display());
        }
        return T::default();
    }
    match fs::read_to_string(path).await {
        Ok(data) => match serde_json::from_str::<T>(&data) {
            Ok(table) => table,
            Err(e) => {
                warn!("{what}: malformed JSON at {}: {e}, resetting to empty", path.display());
                T::default()
            }
        },
        Err(e) => {
            warn!("{what}: failed to read {}: {e}, using empty", path.display());
            T::default()
        }
    }
}

async fn atomic_write<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), SpotlightError> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, json).await?;
    fs::rename(&tmp_path, path).await?;
    Ok(())
}

impl FixtureRegistry {
    pub async fn load(fixtures_path: impl Into<PathBuf>, sensors_path: impl Into<PathBuf>) -> Self {
        let fixtures_path = fixtures_path.into();
        let sensors_path = sensors_path.into();
        let fixtures = load_or_default(&fixtures_path, "fixture table").await;
        let anchors = load_or_default(&sensors_path, "sensor anchor table").await;
        Self {
            fixtures_path,
            sensors_path,
            fixtures: RwLock::new(fixtures),
            anchors: RwLock::new(anchors),
        }
    }

    pub async fn list_channels(&self) -> Vec<String> {
        self.fixtures.read().await.keys().cloned().collect()
    }

    pub async fn pan_range(&self, channel: &str) -> Result<(f64, f64), SpotlightError> {
        let fixtures = self.fixtures.read().await;
        fixtures
            .get(channel)
            .map(|f| f.pan_range())
            .ok_or_else(|| SpotlightError::NotFound(channel.to_string()))
    }

    pub async fn tilt_range(&self, channel: &str) -> Result<(f64, f64), SpotlightError> {
        let fixtures = self.fixtures.read().await;
        fixtures
            .get(channel)
            .map(|f| f.tilt_range())
            .ok_or_else(|| SpotlightError::NotFound(channel.to_string()))
    }

    pub async fn get_anchor(&self, channel: &str, sensor_id: u32) -> Option<SensorAnchor> {
        self.anchors.read().await.get(channel)?.get(&sensor_id).copied()
    }

    /// All calibrated anchors for a channel, keyed by sensor id.
    pub async fn get_anchors(&self, channel: &str) -> std::collections::HashMap<u32, SensorAnchor> {
        self.anchors.read().await.get(channel).cloned().unwrap_or_default()
    }

    /// Write one sensor's calibrated anchor and persist the whole table
    /// atomically. Overwrites any prior anchor for that sensor/channel.
    pub async fn put_anchor(
        &self,
        channel: &str,
        sensor_id: u32,
        record: SensorAnchor,
    ) -> Result<(), SpotlightError> {
        {
            let mut anchors = self.anchors.write().await;
            anchors.entry(channel.to_string()).or_default().insert(sensor_id, record);
        }
        self.save().await
    }

    /// Atomically rewrite the sensor-anchor file from the in-memory table.
    pub async fn save(&self) -> Result<(), SpotlightError> {
        let anchors = self.anchors.read().await;
        atomic_write(&self.sensors_path, &*anchors).await
    }

    /// Reread the fixture table from disk (an external editor may have
    /// changed mechanical ranges since startup).
    pub async fn reload_fixtures(&self) {
        let table = load_or_default(&self.fixtures_path, "fixture table").await;
        *self.fixtures.write().await = table;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spotlight_types::FixtureDescriptor;

    async fn temp_registry() -> (tempfile_dir::TempDir, FixtureRegistry) {
        let dir = tempfile_dir::TempDir::new();
        let fixtures_path = dir.path().join(".fixtures.json");
        let sensors_path = dir.path().join(".sensors.json");
        let registry = FixtureRegistry::load(fixtures_path, sensors_path).await;
        (dir, registry)
    }

    // Minimal std-only tempdir helper — avoids pulling in a dev-dependency
    // just to create a scratch directory for these two tests.
    mod tempfile_dir {
        use std::path::{Path, PathBuf};

        pub struct TempDir(PathBuf);

        impl TempDir {
            pub fn new() -> Self {
                let dir = std::env::temp_dir().join(format!(
                    "spotlight-registry-test-{}-{}",
                    std::process::id(),
                    std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .unwrap()
                        .as_nanos()
                ));
                std::fs::create_dir_all(&dir).unwrap();
                Self(dir)
            }

            pub fn path(&self) -> &Path {
                &self.0
            }
        }

        impl Drop for TempDir {
            fn drop(&mut self) {
                let _ = std::fs::remove_dir_all(&self.0);
            }
        }
    }

    #[tokio::test]
    async fn missing_files_start_empty() {
        let (_dir, registry) = temp_registry().await;
        assert!(registry.list_channels().await.is_empty());
    }

    #[tokio::test]
    async fn not_found_for_unknown_channel() {
        let (_dir, registry) = temp_registry().await;
        let err = registry.pan_range("nope").await.unwrap_err();
        assert!(matches!(err, SpotlightError::NotFound(_)));
    }

    #[tokio::test]
    async fn put_anchor_persists_and_reloads() {
        let (dir, registry) = temp_registry().await;
        registry.fixtures.write().await.insert(
            "r1".to_string(),
            FixtureDescriptor { pan: [-270.0, 270.0], tilt: [-115.0, 115.0], zoom: None },
        );

        registry
            .put_anchor("r1", 1, SensorAnchor { pan: -222.29, tilt: 50.0, direction: 1 })
            .await
            .unwrap();

        assert_eq!(registry.get_anchor("r1", 1).await.unwrap().tilt, 50.0);

        // A fresh load from the same files sees the persisted anchor.
        let reloaded = FixtureRegistry::load(
            dir.path().join(".fixtures.json"),
            dir.path().join(".sensors.json"),
        )
        .await;
        assert_eq!(reloaded.get_anchor("r1", 1).await.unwrap().pan, -222.29);
    }
}
