//! # debounce (C4)
//!
//! Periodic task collapsing each per-sensor buffer into a single averaged
//! intensity. Grounded in `auto_director::start_auto_director`'s
//! `tokio::time::interval` ticker shape.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::state::IntensityStore;

pub async fn run_debouncer(store: Arc<IntensityStore>, interval_ms: u64) {
    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
    loop {
        ticker.tick().await;
        let updated = store.debounce_pass().await;
        if updated > 0 {
            debug!("debounce: published {updated} sensor(s)");
        }
    }
}
