//! Device orientation monitor
//!
//! Raw gravity-axis samples arrive from an [`AccelerometerSource`] on whatever
//! thread the platform uses for sensor callbacks. They are classified on the
//! spot and written into a single-slot `watch` channel; only pose changes
//! are published, and a reader only ever sees the latest pose.

use crate::platform::AccelerometerSource;
use hitit_common::events::{DeviceOrientation, EventBus, HitItEvent};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Units of the gravity-axis reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SensorScale {
    /// Gravity is ~9.8
    #[default]
    MetersPerSecondSquared,
    /// Gravity is ~1.0
    Normalized,
}

impl SensorScale {
    /// Magnitude beyond which the device counts as lying flat
    pub fn threshold(&self) -> f32 {
        match self {
            SensorScale::MetersPerSecondSquared => 7.0,
            SensorScale::Normalized => 0.7,
        }
    }
}

/// Sign of the reading when the screen faces up. Platforms disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SensorPolarity {
    #[default]
    FaceUpPositive,
    FaceUpNegative,
}

/// Classification rule for one platform's accelerometer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorAxis {
    pub scale: SensorScale,
    pub polarity: SensorPolarity,
}

impl SensorAxis {
    pub fn new(scale: SensorScale, polarity: SensorPolarity) -> Self {
        Self { scale, polarity }
    }

    /// Three-way pose classification of a gravity-axis reading
    pub fn classify(&self, z: f32) -> DeviceOrientation {
        let threshold = self.scale.threshold();
        let up = match self.polarity {
            SensorPolarity::FaceUpPositive => z,
            SensorPolarity::FaceUpNegative => -z,
        };

        if up > threshold {
            DeviceOrientation::FaceUp
        } else if up < -threshold {
            DeviceOrientation::FaceDown
        } else {
            DeviceOrientation::Other
        }
    }
}

/// Callback-side end of the monitor
///
/// Safe to call from any thread; it never blocks and touches nothing but the
/// pose slot and the event bus.
#[derive(Clone)]
pub struct SampleSink {
    axis: SensorAxis,
    tx: Arc<watch::Sender<DeviceOrientation>>,
    events: EventBus,
}

impl SampleSink {
    /// Classify and publish one reading; returns true when the pose changed
    pub fn push(&self, z: f32) -> bool {
        let orientation = self.axis.classify(z);
        let changed = self.tx.send_if_modified(|current| {
            if *current == orientation {
                false
            } else {
                *current = orientation;
                true
            }
        });

        if changed {
            self.events.emit(HitItEvent::OrientationChanged {
                orientation,
                timestamp: chrono::Utc::now(),
            });
        }
        changed
    }
}

/// Start/stop wrapper around an accelerometer with change-only output
pub struct OrientationMonitor {
    source: Arc<dyn AccelerometerSource>,
    axis: SensorAxis,
    tx: Arc<watch::Sender<DeviceOrientation>>,
    running: AtomicBool,
    events: EventBus,
}

impl OrientationMonitor {
    pub fn new(source: Arc<dyn AccelerometerSource>, axis: SensorAxis, events: EventBus) -> Self {
        let (tx, _) = watch::channel(DeviceOrientation::Other);
        Self {
            source,
            axis,
            tx: Arc::new(tx),
            running: AtomicBool::new(false),
            events,
        }
    }

    /// Begin sampling. No-op when already running.
    ///
    /// The pose restarts at `Other` so a reading from a previous run is never
    /// mistaken for a fresh one.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.tx.send_replace(DeviceOrientation::Other);
        self.source.start(SampleSink {
            axis: self.axis,
            tx: Arc::clone(&self.tx),
            events: self.events.clone(),
        });
        debug!("Orientation monitoring started");
    }

    /// Stop sampling and release the sensor. No-op when not running.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.source.stop();
            debug!("Orientation monitoring stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Latest classified pose
    pub fn current(&self) -> DeviceOrientation {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<DeviceOrientation> {
        self.tx.subscribe()
    }

    /// Resolve once the pose is `target` (immediately if it already is)
    pub async fn wait_for(&self, target: DeviceOrientation) {
        let mut rx = self.subscribe();
        let closed = rx.wait_for(|orientation| *orientation == target).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}

impl Drop for OrientationMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
