//! Accelerometer fed over the network
//!
//! On a host without a motion sensor the front end reads the phone's
//! accelerometer and posts each reading to `POST /sensor`. Readings are
//! forwarded to the monitor only while it is running.

use super::AccelerometerSource;
use crate::orientation::SampleSink;
use std::sync::Mutex;
use tracing::warn;

#[derive(Default)]
pub struct RemoteAccelerometer {
    sink: Mutex<Option<SampleSink>>,
}

impl RemoteAccelerometer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver one reading; returns true when it changed the pose
    pub fn push(&self, z: f32) -> bool {
        let sink = match self.sink.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => {
                warn!("Accelerometer sink lock poisoned, dropping sample");
                return false;
            }
        };
        sink.is_some_and(|sink| sink.push(z))
    }

    /// Whether a monitor is currently listening
    pub fn is_active(&self) -> bool {
        self.sink.lock().map(|guard| guard.is_some()).unwrap_or(false)
    }

    fn replace(&self, sink: Option<SampleSink>) {
        match self.sink.lock() {
            Ok(mut guard) => *guard = sink,
            Err(poisoned) => *poisoned.into_inner() = sink,
        }
    }
}

impl AccelerometerSource for RemoteAccelerometer {
    fn start(&self, sink: SampleSink) {
        self.replace(Some(sink));
    }

    fn stop(&self) {
        self.replace(None);
    }
}
