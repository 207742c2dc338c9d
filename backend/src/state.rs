//! Shared sensor-intensity state: the live per-sensor buffers (C3 writes,
//! C4 drains) and the published intensity map (C4 writes, C7 reads). A
//! single mutex guards both, so no reader ever sees a half-published
//! update — grounded in the teacher's `Arc<RwLock<...>>`-wrapped shared
//! state shape, narrowed to a plain `Mutex` since critical sections here
//! are O(#sensors) and never held across an `.await`.

use std::collections::{HashMap, VecDeque};

use tokio::sync::Mutex;

struct IntensityInner {
    /// Last debounced value per sensor. Retained across passes where the
    /// buffer was empty.
    published: HashMap<u32, f64>,
    /// Raw samples since the last debounce pass.
    buffers: HashMap<u32, VecDeque<f64>>,
}

pub struct IntensityStore {
    inner: Mutex<IntensityInner>,
    buffer_cap: usize,
}

impl IntensityStore {
    pub fn new(buffer_cap: usize) -> Self {
        Self {
            inner: Mutex::new(IntensityInner { published: HashMap::new(), buffers: HashMap::new() }),
            buffer_cap,
        }
    }

    /// Append a raw sample for `sensor_id`. Drops the oldest sample when
    /// the buffer is at capacity rather than growing unbounded.
    pub async fn push_sample(&self, sensor_id: u32, value: f64) {
        let mut inner = self.inner.lock().await;
        let buf = inner.buffers.entry(sensor_id).or_default();
        if buf.len() >= self.buffer_cap {
            buf.pop_front();
        }
        buf.push_back(value);
    }

    /// Collapse each non-empty buffer into its mean, publish it, and clear
    /// the buffer. Sensors with an empty buffer keep their previous
    /// published value. Returns the number of sensors updated this pass.
    pub async fn debounce_pass(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let mut updated = 0;
        for (&sensor_id, buf) in inner.buffers.iter_mut() {
            if buf.is_empty() {
                continue;
            }
            let mean = buf.iter().sum::<f64>() / buf.len() as f64;
            buf.clear();
            inner.published.insert(sensor_id, mean);
            updated += 1;
        }
        updated
    }

    /// Copy of the published intensity map, as seen atomically under the lock.
    pub async fn snapshot(&self) -> HashMap<u32, f64> {
        self.inner.lock().await.published.clone()
    }
}
