//! Playback engine. Owns the queue and the single live output.
//!
//! All mutation happens through `&mut self`, so one owner drives the engine
//! from one thread: explicit transport calls plus the device callbacks
//! (`on_time_update`, `on_duration_change`, `on_track_ended`). Device
//! failures are logged and swallowed; the engine keeps its play intent even
//! when nothing is audible.

use crate::config::RadioConfig;
use crate::device::{AudioBackend, AudioOutput, ExternalPlayer};
use crate::queue::Queue;
use crate::track::{PlaybackSource, Track};
use log::{debug, info, warn};
use serde::Serialize;

/// Default for `previous`: restart the current track once strictly more than
/// this many seconds have played. At exactly 3.0 s it steps back instead.
pub const RESTART_THRESHOLD_SECS: f64 = 3.0;

/// Whatever is currently rendering the loaded track.
enum ActiveSource {
    LocalAudio(Box<dyn AudioOutput>),
    ExternalVideo(String),
}

/// Which kind of output is attached, as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    None,
    LocalAudio,
    ExternalVideo,
}

/// Observable snapshot of the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackState {
    pub current_track: Option<Track>,
    pub current_index: Option<usize>,
    pub queue_len: usize,
    pub has_next: bool,
    pub is_playing: bool,
    pub current_time: f64,
    pub duration: f64,
    pub volume: f32,
    pub is_muted: bool,
    pub crossfade_duration: f32,
    pub output: OutputKind,
}

/// Position report read from the live local output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceStatus {
    pub position: f64,
    pub duration: Option<f64>,
    pub finished: bool,
}

pub struct PlaybackEngine {
    backend: Box<dyn AudioBackend>,
    external: Box<dyn ExternalPlayer>,
    queue: Queue,
    active: Option<ActiveSource>,
    loaded: Option<Track>,
    is_playing: bool,
    current_time: f64,
    duration: f64,
    volume: f32,
    is_muted: bool,
    crossfade_secs: f32,
    restart_threshold_secs: f64,
    seek_generation: u64,
}

impl PlaybackEngine {
    pub fn new(backend: Box<dyn AudioBackend>, external: Box<dyn ExternalPlayer>) -> Self {
        PlaybackEngine {
            backend,
            external,
            queue: Queue::new(),
            active: None,
            loaded: None,
            is_playing: false,
            current_time: 0.0,
            duration: 0.0,
            volume: 1.0,
            is_muted: false,
            crossfade_secs: 0.0,
            restart_threshold_secs: RESTART_THRESHOLD_SECS,
            seek_generation: 0,
        }
    }

    /// Apply persisted volume, crossfade and restart settings.
    pub fn with_config(mut self, config: &RadioConfig) -> Self {
        self.set_volume(config.volume);
        self.set_crossfade_duration(config.crossfade_secs);
        if config.restart_threshold_secs.is_finite() && config.restart_threshold_secs >= 0.0 {
            self.restart_threshold_secs = config.restart_threshold_secs;
        }
        self
    }

    // ── Transport ────────────────────────────────────────────────────────────

    /// Play `track`, or resume the current track when `None`.
    ///
    /// A track already in the queue is selected in place; any other track is
    /// appended and selected.
    pub fn play(&mut self, track: Option<Track>) {
        match track {
            Some(track) => {
                let is_loaded = self.active.is_some()
                    && self.loaded.as_ref().is_some_and(|t| t.id == track.id);
                let index = match self.queue.position_of(&track.id) {
                    Some(index) => index,
                    None => self.queue.push(track),
                };
                self.queue.select(index);
                if !is_loaded {
                    self.load_current();
                }
                self.start();
            }
            None => {
                if self.active.is_some() {
                    self.start();
                    return;
                }
                if self.queue.current().is_none() && !self.queue.select(0) {
                    debug!("play: queue is empty");
                    return;
                }
                self.load_current();
                self.start();
            }
        }
    }

    pub fn pause(&mut self) {
        self.is_playing = false;
        match &mut self.active {
            Some(ActiveSource::LocalAudio(output)) => output.pause(),
            Some(ActiveSource::ExternalVideo(_)) => self.external.pause(),
            None => {}
        }
    }

    pub fn toggle(&mut self) {
        if self.is_playing {
            self.pause();
        } else {
            self.play(None);
        }
    }

    /// Skip forward. Stays on the last entry.
    pub fn next(&mut self) {
        if self.queue.advance() {
            self.load_current();
            self.start();
        } else {
            debug!("next: already at end of queue");
        }
    }

    /// Restart the current track if it has been playing for a while,
    /// otherwise step back one entry. Stays on the first entry.
    pub fn previous(&mut self) {
        if self.current_time > self.restart_threshold_secs {
            self.seek(0.0);
            return;
        }
        if self.queue.retreat() {
            self.load_current();
            self.start();
        } else {
            debug!("previous: already at start of queue");
        }
    }

    /// Seek within the loaded track, clamped to [0, duration].
    pub fn seek(&mut self, position_secs: f64) {
        if !position_secs.is_finite() {
            return;
        }
        let upper = if self.duration > 0.0 {
            self.duration
        } else {
            f64::MAX
        };
        let position = position_secs.clamp(0.0, upper);
        self.current_time = position;
        match &mut self.active {
            Some(ActiveSource::LocalAudio(output)) => {
                self.seek_generation += 1;
                if let Err(e) = output.seek(position) {
                    warn!("Seek to {:.1}s failed: {}", position, e);
                }
            }
            Some(ActiveSource::ExternalVideo(_)) => {
                debug!("seek: not forwarded to external player");
            }
            None => {}
        }
        self.apply_volume();
    }

    pub fn set_volume(&mut self, volume: f32) {
        if !volume.is_finite() {
            return;
        }
        self.volume = volume.clamp(0.0, 1.0);
        self.apply_volume();
    }

    pub fn toggle_mute(&mut self) {
        self.is_muted = !self.is_muted;
        self.apply_volume();
    }

    // ── Queue ────────────────────────────────────────────────────────────────

    /// Replace the queue. Audio that is already playing is left alone.
    pub fn set_queue(&mut self, tracks: Vec<Track>) {
        self.queue.replace(tracks);
    }

    pub fn add_to_queue(&mut self, track: Track) {
        self.queue.push(track);
    }

    pub fn set_crossfade_duration(&mut self, secs: f32) {
        if !secs.is_finite() {
            return;
        }
        self.crossfade_secs = secs.max(0.0);
        self.apply_volume();
    }

    // ── Device callbacks ─────────────────────────────────────────────────────

    pub fn on_time_update(&mut self, position_secs: f64) {
        if position_secs.is_finite() {
            self.current_time = position_secs.max(0.0);
            self.apply_volume();
        }
    }

    pub fn on_duration_change(&mut self, duration_secs: f64) {
        if duration_secs.is_finite() && duration_secs > 0.0 {
            self.duration = duration_secs;
            self.apply_volume();
        }
    }

    /// Natural end of the loaded track: advance when possible, else stop.
    pub fn on_track_ended(&mut self) {
        if self.queue.advance() {
            self.load_current();
            self.start();
            return;
        }
        info!("Queue finished");
        self.is_playing = false;
        self.current_time = self.duration;
        self.release_output();
    }

    /// Read position and end-of-track state from the live local output.
    pub fn device_status(&self) -> Option<DeviceStatus> {
        match &self.active {
            Some(ActiveSource::LocalAudio(output)) => Some(DeviceStatus {
                position: output.position(),
                duration: output.duration(),
                finished: output.is_finished(),
            }),
            _ => None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    /// Bumped every time a seek reaches the local output, including the
    /// restart done by `previous`.
    pub fn seek_generation(&self) -> u64 {
        self.seek_generation
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    /// Volume actually sent to the device: zero when muted, ramped down over
    /// the final crossfade window.
    pub fn effective_volume(&self) -> f32 {
        if self.is_muted {
            return 0.0;
        }
        let fade = f64::from(self.crossfade_secs);
        if fade > 0.0 && self.duration > 0.0 {
            let remaining = (self.duration - self.current_time).max(0.0);
            if remaining < fade {
                return self.volume * (remaining / fade) as f32;
            }
        }
        self.volume
    }

    pub fn snapshot(&self) -> PlaybackState {
        PlaybackState {
            current_track: self.loaded.clone(),
            current_index: self.queue.current_index(),
            queue_len: self.queue.len(),
            has_next: self.queue.has_next(),
            is_playing: self.is_playing,
            current_time: self.current_time,
            duration: self.duration,
            volume: self.volume,
            is_muted: self.is_muted,
            crossfade_duration: self.crossfade_secs,
            output: match &self.active {
                None => OutputKind::None,
                Some(ActiveSource::LocalAudio(_)) => OutputKind::LocalAudio,
                Some(ActiveSource::ExternalVideo(_)) => OutputKind::ExternalVideo,
            },
        }
    }

    // ── Internals ────────────────────────────────────────────────────────────

    /// Detach whatever is rendering, then attach the queue's current track.
    fn load_current(&mut self) {
        let Some(track) = self.queue.current().cloned() else {
            return;
        };
        self.release_output();

        self.current_time = 0.0;
        self.duration = track
            .duration_seconds
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(0.0);

        self.active = match track.source() {
            PlaybackSource::ExternalVideo(uri) => {
                info!("Handing '{}' to external player", track.title);
                self.external.present(uri);
                Some(ActiveSource::ExternalVideo(uri.to_string()))
            }
            PlaybackSource::LocalAudio(uri) => match self.backend.open(uri) {
                Ok(output) => {
                    if let Some(d) = output.duration().filter(|d| d.is_finite() && *d > 0.0) {
                        self.duration = d;
                    }
                    info!("Loaded '{}' by {}", track.title, track.artist);
                    Some(ActiveSource::LocalAudio(output))
                }
                Err(e) => {
                    warn!("Cannot open '{}': {}", uri, e);
                    None
                }
            },
        };
        self.loaded = Some(track);
        self.apply_volume();
    }

    fn start(&mut self) {
        self.is_playing = true;
        match &mut self.active {
            Some(ActiveSource::LocalAudio(output)) => {
                if let Err(e) = output.play() {
                    warn!("Playback rejected, keeping play state: {}", e);
                }
            }
            Some(ActiveSource::ExternalVideo(_)) => self.external.resume(),
            None => warn!("No output attached, keeping play state"),
        }
    }

    fn release_output(&mut self) {
        match self.active.take() {
            Some(ActiveSource::LocalAudio(output)) => drop(output),
            Some(ActiveSource::ExternalVideo(_)) => self.external.dismiss(),
            None => {}
        }
    }

    fn apply_volume(&mut self) {
        let volume = self.effective_volume();
        if let Some(ActiveSource::LocalAudio(output)) = &mut self.active {
            output.set_volume(volume);
        }
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.release_output();
    }
}
