use crate::device::{AudioBackend, AudioOutput};
use crate::error::DeviceError;
use log::debug;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Duration;

/// Local audio backend wrapping rodio. Not `Send`; create it on the thread
/// that drives the engine.
///
/// The output device is opened on the first `open` call and kept for the
/// backend's lifetime.
#[derive(Default)]
pub struct RodioBackend {
    stream: Option<(OutputStream, OutputStreamHandle)>,
}

impl RodioBackend {
    pub fn new() -> Self {
        RodioBackend::default()
    }

    fn handle(&mut self) -> Result<&OutputStreamHandle, DeviceError> {
        if self.stream.is_none() {
            let pair = OutputStream::try_default()
                .map_err(|e| DeviceError::Unavailable(format!("failed to open audio output: {}", e)))?;
            debug!("Opened default audio output");
            self.stream = Some(pair);
        }
        match &self.stream {
            Some((_, handle)) => Ok(handle),
            None => Err(DeviceError::Unavailable("no audio output".into())),
        }
    }
}

impl AudioBackend for RodioBackend {
    /// Decode a local file into a paused sink.
    fn open(&mut self, uri: &str) -> Result<Box<dyn AudioOutput>, DeviceError> {
        let path = local_path(uri).ok_or_else(|| DeviceError::Unsupported(uri.to_string()))?;
        let file = File::open(&path)?;
        let source = Decoder::new(BufReader::new(file)).map_err(|e| DeviceError::Decode {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;
        let duration = source.total_duration().map(|d| d.as_secs_f64());

        let sink = Sink::try_new(self.handle()?)
            .map_err(|e| DeviceError::Unavailable(format!("failed to create audio sink: {}", e)))?;
        sink.pause();
        sink.append(source);

        Ok(Box::new(RodioOutput { sink, duration }))
    }
}

/// One decoded track attached to the output device. Dropping it stops the
/// sink.
pub struct RodioOutput {
    sink: Sink,
    duration: Option<f64>,
}

impl AudioOutput for RodioOutput {
    fn play(&mut self) -> Result<(), DeviceError> {
        self.sink.play();
        Ok(())
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn seek(&mut self, position_secs: f64) -> Result<(), DeviceError> {
        self.sink
            .try_seek(Duration::from_secs_f64(position_secs.max(0.0)))
            .map_err(|e| DeviceError::Seek(e.to_string()))
    }

    fn set_volume(&mut self, volume: f32) {
        self.sink.set_volume(volume);
    }

    fn position(&self) -> f64 {
        self.sink.get_pos().as_secs_f64()
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn is_finished(&self) -> bool {
        self.sink.empty()
    }
}

impl Drop for RodioOutput {
    fn drop(&mut self) {
        self.sink.stop();
    }
}

/// Map a track URI to a local file. Remote URLs are not playable here.
fn local_path(uri: &str) -> Option<PathBuf> {
    let uri = uri.trim();
    if uri.is_empty() {
        return None;
    }
    if let Some(rest) = uri.strip_prefix("file://") {
        return Some(PathBuf::from(rest));
    }
    if uri.contains("://") {
        return None;
    }
    Some(PathBuf::from(uri))
}
