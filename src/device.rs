//! Output device seams used by the playback engine.
//!
//! A backend opens one `AudioOutput` per track; dropping the output detaches
//! it from the device. External-video tracks bypass audio entirely and are
//! handed to an `ExternalPlayer`.

use crate::error::DeviceError;
use log::info;

/// One attached audio source on an output device.
pub trait AudioOutput {
    /// Start or resume. May be rejected by the device.
    fn play(&mut self) -> Result<(), DeviceError>;

    fn pause(&mut self);

    fn seek(&mut self, position_secs: f64) -> Result<(), DeviceError>;

    /// Output gain in [0, 1].
    fn set_volume(&mut self, volume: f32);

    /// Current playback position in seconds.
    fn position(&self) -> f64;

    /// Total length once the device knows it.
    fn duration(&self) -> Option<f64>;

    /// True once the source has played to its end.
    fn is_finished(&self) -> bool;
}

/// Opens outputs on a device. Each engine owns its own backend.
pub trait AudioBackend {
    fn open(&mut self, uri: &str) -> Result<Box<dyn AudioOutput>, DeviceError>;
}

/// Renders external-video tracks on the engine's behalf.
pub trait ExternalPlayer {
    fn present(&mut self, uri: &str);
    fn resume(&mut self);
    fn pause(&mut self);
    fn dismiss(&mut self);
}

/// External player that only records what it was asked to show.
#[derive(Debug, Default)]
pub struct LoggingExternalPlayer {
    current: Option<String>,
}

impl ExternalPlayer for LoggingExternalPlayer {
    fn present(&mut self, uri: &str) {
        info!("External player: present {}", uri);
        self.current = Some(uri.to_string());
    }

    fn resume(&mut self) {
        if let Some(uri) = &self.current {
            info!("External player: play {}", uri);
        }
    }

    fn pause(&mut self) {
        if let Some(uri) = &self.current {
            info!("External player: pause {}", uri);
        }
    }

    fn dismiss(&mut self) {
        if let Some(uri) = self.current.take() {
            info!("External player: dismiss {}", uri);
        }
    }
}
