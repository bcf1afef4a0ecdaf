//! Engine runtime: a dedicated thread that owns one `PlaybackEngine`.
//!
//! The engine and its audio backend live on a single thread (rodio output
//! streams are not `Send`). Callers talk to it through `EngineHandle`, a thin
//! wrapper around `mpsc::Sender<EngineCmd>`, so every transport call is
//! fire-and-forget and observable only through emitted snapshots. Device
//! callbacks are produced by polling the live output between commands.

use crate::config::RadioConfig;
use crate::device::{AudioBackend, ExternalPlayer};
use crate::engine::{PlaybackEngine, PlaybackState};
use crate::track::Track;
use log::debug;
use std::io;
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// How often the live output is polled when no command arrives.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A seek flushes the sink, which briefly reports "empty" and a stale
/// position; ignore device reports for this long afterwards.
const SEEK_COOLDOWN: Duration = Duration::from_millis(500);

// ── Commands & Events ────────────────────────────────────────────────────────

/// Commands sent to the engine thread.
#[derive(Debug, Clone)]
pub enum EngineCmd {
    Play(Option<Track>),
    Pause,
    Toggle,
    Next,
    Previous,
    Seek(f64),
    SetVolume(f32),
    ToggleMute,
    SetQueue(Vec<Track>),
    AddToQueue(Track),
    SetCrossfade(f32),
    Shutdown,
}

/// Events emitted by the engine thread.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The snapshot changed.
    State(PlaybackState),
    /// The engine was dropped and its output released.
    Shutdown,
}

// ── Handle ───────────────────────────────────────────────────────────────────

/// Owner of the engine thread. Dropping it shuts the engine down and waits
/// for the thread to exit.
pub struct EngineHandle {
    tx: mpsc::Sender<EngineCmd>,
    thread: Option<JoinHandle<()>>,
}

impl EngineHandle {
    pub fn play(&self, track: Option<Track>) {
        self.send(EngineCmd::Play(track));
    }

    pub fn pause(&self) {
        self.send(EngineCmd::Pause);
    }

    pub fn toggle(&self) {
        self.send(EngineCmd::Toggle);
    }

    pub fn next(&self) {
        self.send(EngineCmd::Next);
    }

    pub fn previous(&self) {
        self.send(EngineCmd::Previous);
    }

    pub fn seek(&self, position_secs: f64) {
        self.send(EngineCmd::Seek(position_secs));
    }

    pub fn set_volume(&self, volume: f32) {
        self.send(EngineCmd::SetVolume(volume));
    }

    pub fn toggle_mute(&self) {
        self.send(EngineCmd::ToggleMute);
    }

    pub fn set_queue(&self, tracks: Vec<Track>) {
        self.send(EngineCmd::SetQueue(tracks));
    }

    pub fn add_to_queue(&self, track: Track) {
        self.send(EngineCmd::AddToQueue(track));
    }

    pub fn set_crossfade_duration(&self, secs: f32) {
        self.send(EngineCmd::SetCrossfade(secs));
    }

    /// Stop the engine thread and wait for it. Idempotent.
    pub fn shutdown(&mut self) {
        let _ = self.tx.send(EngineCmd::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    fn send(&self, cmd: EngineCmd) {
        let _ = self.tx.send(cmd);
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ── Runtime ──────────────────────────────────────────────────────────────────

/// Spawn an engine on its own thread.
///
/// `make_backend` runs on the new thread so the backend never has to be
/// `Send`. `on_event` is called from the engine thread after every change.
pub fn spawn_engine_runtime<B, F>(
    make_backend: B,
    external: Box<dyn ExternalPlayer + Send>,
    config: RadioConfig,
    on_event: F,
) -> io::Result<EngineHandle>
where
    B: FnOnce() -> Box<dyn AudioBackend> + Send + 'static,
    F: FnMut(EngineEvent) + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<EngineCmd>();

    let thread = std::thread::Builder::new()
        .name("playback-engine".into())
        .spawn(move || {
            let engine = PlaybackEngine::new(make_backend(), external).with_config(&config);
            engine_thread_loop(rx, engine, on_event);
        })?;

    Ok(EngineHandle {
        tx,
        thread: Some(thread),
    })
}

fn engine_thread_loop<F>(rx: mpsc::Receiver<EngineCmd>, mut engine: PlaybackEngine, mut on_event: F)
where
    F: FnMut(EngineEvent),
{
    let mut last_state: Option<PlaybackState> = None;
    let mut last_seek: Option<Instant> = None;
    let mut seen_seeks = engine.seek_generation();

    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(EngineCmd::Shutdown) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Ok(cmd) => apply(&mut engine, cmd),
            Err(mpsc::RecvTimeoutError::Timeout) => poll_device(&mut engine, last_seek),
        }

        // Any command may seek the output (`Seek`, or `Previous` restarting).
        if engine.seek_generation() != seen_seeks {
            seen_seeks = engine.seek_generation();
            last_seek = Some(Instant::now());
        }

        let state = engine.snapshot();
        if last_state.as_ref() != Some(&state) {
            on_event(EngineEvent::State(state.clone()));
            last_state = Some(state);
        }
    }

    drop(engine);
    debug!("Playback engine stopped");
    on_event(EngineEvent::Shutdown);
}

fn apply(engine: &mut PlaybackEngine, cmd: EngineCmd) {
    match cmd {
        EngineCmd::Play(track) => engine.play(track),
        EngineCmd::Pause => engine.pause(),
        EngineCmd::Toggle => engine.toggle(),
        EngineCmd::Next => engine.next(),
        EngineCmd::Previous => engine.previous(),
        EngineCmd::Seek(position) => engine.seek(position),
        EngineCmd::SetVolume(volume) => engine.set_volume(volume),
        EngineCmd::ToggleMute => engine.toggle_mute(),
        EngineCmd::SetQueue(tracks) => engine.set_queue(tracks),
        EngineCmd::AddToQueue(track) => engine.add_to_queue(track),
        EngineCmd::SetCrossfade(secs) => engine.set_crossfade_duration(secs),
        EngineCmd::Shutdown => {}
    }
}

/// Feed the engine's device callbacks from the live output.
fn poll_device(engine: &mut PlaybackEngine, last_seek: Option<Instant>) {
    let Some(status) = engine.device_status() else {
        return;
    };
    if let Some(duration) = status.duration {
        engine.on_duration_change(duration);
    }
    let cooling_down = last_seek.is_some_and(|t| t.elapsed() < SEEK_COOLDOWN);
    if cooling_down {
        return;
    }
    engine.on_time_update(status.position);
    if status.finished && engine.is_playing() {
        engine.on_track_ended();
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
