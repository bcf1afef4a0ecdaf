//! Headless integration tests for leak_radio.
//!
//! Everything runs against scripted in-memory devices and a manual clock, so
//! no audio hardware or network is needed.

use chrono::{NaiveDate, NaiveDateTime};
use leak_radio::catalog::Catalog;
use leak_radio::config::RadioConfig;
use leak_radio::countdown::{spawn_countdown, Countdown, CountdownState, ManualClock};
use leak_radio::device::{AudioBackend, AudioOutput, LoggingExternalPlayer};
use leak_radio::engine::{OutputKind, PlaybackEngine, PlaybackState};
use leak_radio::error::DeviceError;
use leak_radio::resolver::{resolve, resolve_with};
use leak_radio::runtime::{spawn_engine_runtime, EngineEvent};
use leak_radio::track::Track;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// 2024-01-01 is a Monday.
fn at(day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, day)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

const CATALOG_JSON: &str = r#"{
    "tracks": [
        { "id": "pub-1", "title": "Opener", "artist": "Leak Radio", "audio_url": "opener.mp3", "duration_seconds": 180 },
        { "id": "leak-1", "title": "Unreleased", "artist": "Mystery", "audio_url": "unreleased.mp3", "is_hidden": true },
        { "id": "leak-2", "title": "Demo Tape", "artist": "Mystery", "audio_url": "demo.mp3", "is_hidden": true, "is_external": null },
        { "id": "vid-1", "title": "Live Set", "artist": "Mystery", "audio_url": "", "is_hidden": true, "youtube_url": "https://youtu.be/abc" }
    ],
    "schedule": [
        { "id": 1, "track_id": "leak-1", "day_of_week": null, "start_time": "08:00", "end_time": "09:00", "priority": 1, "is_active": true },
        { "id": 2, "track_id": "leak-2", "day_of_week": 5, "start_time": "23:59:00", "end_time": "23:59:59", "priority": 0, "is_active": true },
        { "id": 3, "track_id": "pub-1", "day_of_week": null, "start_time": "07:00", "end_time": "08:00", "priority": 0, "is_active": true },
        { "id": 4, "track_id": "vid-1", "day_of_week": 2, "start_time": "25:00", "end_time": "26:00", "priority": 0, "is_active": true },
        { "id": 5, "track_id": "leak-1", "day_of_week": 3, "start_time": "12:00", "end_time": "11:00", "priority": 0, "is_active": true },
        { "id": 6, "track_id": "ghost", "day_of_week": null, "start_time": "09:30", "end_time": "10:00", "priority": 0, "is_active": true }
    ]
}"#;

fn catalog() -> Catalog {
    Catalog::from_json_str(CATALOG_JSON).unwrap()
}

fn track(id: &str, duration: f64) -> Track {
    Track {
        id: id.into(),
        title: id.to_uppercase(),
        artist: "Artist".into(),
        album: None,
        audio_uri: format!("{}.mp3", id),
        cover_uri: None,
        duration_seconds: Some(duration),
        is_external: false,
        is_hidden: false,
        external_video_uri: None,
    }
}

// ── Scripted device ─────────────────────────────────────────────────────────

#[derive(Default)]
struct Device {
    opened: Vec<String>,
    live: usize,
    max_live: usize,
    volume: f32,
    finished: HashSet<String>,
    position: f64,
    /// After each seek the output reports "finished" for this many polls,
    /// the way a flushed rodio sink briefly looks empty.
    seek_flush_polls: usize,
    flush_remaining: usize,
}

type Shared = Arc<Mutex<Device>>;

struct ScriptedOutput {
    uri: String,
    device: Shared,
}

impl AudioOutput for ScriptedOutput {
    fn play(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }
    fn pause(&mut self) {}
    fn seek(&mut self, position_secs: f64) -> Result<(), DeviceError> {
        let mut d = self.device.lock().unwrap();
        d.position = position_secs;
        d.flush_remaining = d.seek_flush_polls;
        Ok(())
    }
    fn set_volume(&mut self, volume: f32) {
        self.device.lock().unwrap().volume = volume;
    }
    fn position(&self) -> f64 {
        self.device.lock().unwrap().position
    }
    fn duration(&self) -> Option<f64> {
        None
    }
    fn is_finished(&self) -> bool {
        let mut d = self.device.lock().unwrap();
        if d.flush_remaining > 0 {
            d.flush_remaining -= 1;
            return true;
        }
        d.finished.contains(&self.uri)
    }
}

impl Drop for ScriptedOutput {
    fn drop(&mut self) {
        self.device.lock().unwrap().live -= 1;
    }
}

struct ScriptedBackend(Shared);

impl AudioBackend for ScriptedBackend {
    fn open(&mut self, uri: &str) -> Result<Box<dyn AudioOutput>, DeviceError> {
        let mut d = self.0.lock().unwrap();
        d.live += 1;
        d.max_live = d.max_live.max(d.live);
        d.opened.push(uri.to_string());
        Ok(Box::new(ScriptedOutput {
            uri: uri.to_string(),
            device: self.0.clone(),
        }))
    }
}

fn scripted_engine() -> (PlaybackEngine, Shared) {
    let device: Shared = Arc::new(Mutex::new(Device::default()));
    let engine = PlaybackEngine::new(
        Box::new(ScriptedBackend(device.clone())),
        Box::new(LoggingExternalPlayer::default()),
    );
    (engine, device)
}

/// Poll the recorded events until `pred` matches a state or time runs out.
fn wait_for_state<P>(events: &Arc<Mutex<Vec<EngineEvent>>>, pred: P) -> Option<PlaybackState>
where
    P: Fn(&PlaybackState) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        let found = events.lock().unwrap().iter().find_map(|e| match e {
            EngineEvent::State(s) if pred(s) => Some(s.clone()),
            _ => None,
        });
        if found.is_some() {
            return found;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    None
}

// ── Catalog + resolver ──────────────────────────────────────────────────────

#[test]
fn catalog_drops_invalid_schedule_rows() {
    let cat = catalog();
    assert_eq!(cat.tracks.len(), 4);
    let ids: Vec<&str> = cat.entries.iter().map(|e| e.id.as_str()).collect();
    // 4 has a malformed time, 5 ends before it starts.
    assert_eq!(ids, vec!["1", "2", "3", "6"]);
}

#[test]
fn daily_leak_already_passed_resolves_tomorrow() {
    // Monday 09:00, daily 08:00 entry.
    let cat = catalog();
    let reveal = resolve(at(1, 9, 0, 0), &cat.entries, &cat.tracks).unwrap();
    assert_eq!(reveal.track.id, "leak-1");
    assert_eq!(reveal.day_offset, 1);
    assert_eq!(reveal.day_label, "Tomorrow");
    assert_eq!(reveal.time_label, "08:00");
    assert_eq!(reveal.starts_in_seconds, 23 * 3600);
}

#[test]
fn friday_late_reveal_is_imminent() {
    // Friday 23:58:00, Friday-only 23:59 entry. The daily 08:00 leak is further out.
    let cat = catalog();
    let reveal = resolve(at(5, 23, 58, 0), &cat.entries, &cat.tracks).unwrap();
    assert_eq!(reveal.track.id, "leak-2");
    assert_eq!(reveal.starts_in_seconds, 60);
    assert_eq!(reveal.day_label, "Today");

    let state = CountdownState::classify(Some(reveal), 300);
    assert_eq!(state.to_string(), "imminent");
}

#[test]
fn public_tracks_never_reveal_unless_asked() {
    let cat = catalog();
    // 06:30: public 07:00 is nearest overall, the 08:00 leak is nearest hidden.
    let hidden = resolve(at(1, 6, 30, 0), &cat.entries, &cat.tracks).unwrap();
    assert_eq!(hidden.track.id, "leak-1");

    let any = resolve_with(at(1, 6, 30, 0), &cat.entries, &cat.tracks, |_| true).unwrap();
    assert_eq!(any.track.id, "pub-1");
    assert_eq!(any.starts_in_seconds, 30 * 60);
}

#[test]
fn dangling_track_reference_is_skipped() {
    // Entry 6 at 09:30 points at an unknown track.
    let cat = catalog();
    let reveal = resolve_with(at(1, 9, 0, 0), &cat.entries, &cat.tracks, |_| true).unwrap();
    assert_ne!(reveal.entry.id, "6");
}

#[test]
fn equal_start_times_pick_first_entry() {
    let json = r#"{
        "tracks": [
            { "id": "a", "title": "A", "artist": "X", "audio_url": "a.mp3", "is_hidden": true },
            { "id": "b", "title": "B", "artist": "X", "audio_url": "b.mp3", "is_hidden": true }
        ],
        "schedule": [
            { "id": "e1", "track_id": "a", "day_of_week": 2, "start_time": "20:00", "end_time": "21:00", "priority": 0, "is_active": true },
            { "id": "e2", "track_id": "b", "day_of_week": 2, "start_time": "20:00", "end_time": "21:00", "priority": 9, "is_active": true }
        ]
    }"#;
    let cat = Catalog::from_json_str(json).unwrap();
    // Sunday noon; both entries open Tuesday 20:00.
    let reveal = resolve(at(7, 12, 0, 0), &cat.entries, &cat.tracks).unwrap();
    assert_eq!(reveal.entry.id, "e1");
    assert_eq!(reveal.day_label, "Tuesday");
}

#[test]
fn resolver_is_stable_and_never_negative() {
    let cat = catalog();
    let mut now = at(1, 0, 0, 0);
    let end = at(8, 0, 0, 0);
    while now < end {
        let first = resolve(now, &cat.entries, &cat.tracks);
        let second = resolve(now, &cat.entries, &cat.tracks);
        assert_eq!(first, second);
        if let Some(r) = first {
            assert!(r.starts_in_seconds >= 0);
            assert!(r.day_offset <= 1, "daily leak must land today or tomorrow");
        }
        now += chrono::Duration::minutes(37);
    }
}

// ── Engine ──────────────────────────────────────────────────────────────────

#[test]
fn next_stays_on_last_track() {
    let (mut engine, _device) = scripted_engine();
    engine.set_queue(vec![track("a", 60.0), track("b", 60.0), track("c", 60.0)]);
    engine.play(Some(track("c", 60.0)));
    engine.next();
    let state = engine.snapshot();
    assert_eq!(state.current_index, Some(2));
    assert!(state.is_playing);
}

#[test]
fn previous_restarts_or_steps_back() {
    let (mut engine, _device) = scripted_engine();
    engine.set_queue(vec![track("a", 60.0), track("b", 60.0)]);
    engine.play(Some(track("b", 60.0)));

    engine.on_time_update(10.0);
    engine.previous();
    assert_eq!(engine.snapshot().current_index, Some(1));
    assert_eq!(engine.snapshot().current_time, 0.0);

    engine.on_time_update(1.5);
    engine.previous();
    assert_eq!(engine.snapshot().current_index, Some(0));
}

#[test]
fn crossfade_ramps_device_volume() {
    let (mut engine, device) = scripted_engine();
    engine.set_volume(0.8);
    engine.set_crossfade_duration(3.0);
    engine.play(Some(track("a", 10.0)));
    engine.on_time_update(8.0);

    let expected = 0.8 * 2.0 / 3.0;
    assert!((engine.effective_volume() - expected).abs() < 1e-4);
    assert!((device.lock().unwrap().volume - expected).abs() < 1e-4);
}

#[test]
fn at_most_one_output_is_live() {
    let (mut engine, device) = scripted_engine();
    engine.set_queue(vec![track("a", 60.0), track("b", 60.0), track("c", 60.0)]);
    engine.play(None);
    engine.next();
    engine.next();
    engine.previous();
    engine.on_track_ended();
    drop(engine);

    let d = device.lock().unwrap();
    assert_eq!(d.max_live, 1);
    assert_eq!(d.live, 0);
    assert_eq!(d.opened, vec!["a.mp3", "b.mp3", "c.mp3", "b.mp3", "c.mp3"]);
}

#[test]
fn external_video_track_bypasses_audio() {
    let (mut engine, device) = scripted_engine();
    let cat = catalog();
    let video = cat.find_track("vid-1").unwrap().clone();
    engine.play(Some(video));

    let state = engine.snapshot();
    assert_eq!(state.output, OutputKind::ExternalVideo);
    assert!(state.is_playing);
    assert!(device.lock().unwrap().opened.is_empty());
}

// ── Countdown ticker ────────────────────────────────────────────────────────

#[test]
fn countdown_follows_the_clock() {
    let states = Arc::new(Mutex::new(Vec::new()));
    let sink = states.clone();
    let clock = ManualClock::new(at(5, 23, 50, 0));

    let mut handle = spawn_countdown(
        Countdown::new(catalog()),
        clock.clone(),
        Duration::from_millis(10),
        move |state| sink.lock().unwrap().push(state),
    )
    .unwrap();

    std::thread::sleep(Duration::from_millis(40));
    clock.set(at(5, 23, 58, 30));
    std::thread::sleep(Duration::from_millis(60));
    handle.shutdown();

    let states = states.lock().unwrap();
    assert!(matches!(states.first(), Some(CountdownState::Scheduled(_))));
    match states.last() {
        Some(CountdownState::Imminent(r)) => {
            assert_eq!(r.track.id, "leak-2");
            assert_eq!(r.starts_in_seconds, 30);
        }
        other => panic!("expected imminent, got {:?}", other),
    }
}

// ── Engine runtime ──────────────────────────────────────────────────────────

#[test]
fn runtime_advances_on_device_end_and_stops_at_queue_end() {
    let device: Shared = Arc::new(Mutex::new(Device::default()));
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let backend_device = device.clone();

    let mut handle = spawn_engine_runtime(
        move || Box::new(ScriptedBackend(backend_device)) as Box<dyn AudioBackend>,
        Box::new(LoggingExternalPlayer::default()),
        RadioConfig::default(),
        move |evt| sink.lock().unwrap().push(evt),
    )
    .unwrap();

    handle.set_queue(vec![track("a", 30.0), track("b", 30.0)]);
    handle.play(None);
    let first = wait_for_state(&events, |s| {
        s.current_index == Some(0) && s.output == OutputKind::LocalAudio
    });
    assert!(first.is_some());

    device.lock().unwrap().finished.insert("a.mp3".into());
    let second = wait_for_state(&events, |s| s.current_index == Some(1) && s.is_playing);
    assert!(second.is_some());

    device.lock().unwrap().finished.insert("b.mp3".into());
    let done = wait_for_state(&events, |s| {
        s.current_index == Some(1) && !s.is_playing && s.output == OutputKind::None
    })
    .expect("queue should finish");
    assert_eq!(done.current_index, Some(1));
    assert_eq!(done.current_time, 30.0);

    handle.shutdown();
    assert_eq!(events.lock().unwrap().last(), Some(&EngineEvent::Shutdown));
    let d = device.lock().unwrap();
    assert_eq!(d.max_live, 1);
    assert_eq!(d.live, 0);
}

#[test]
fn runtime_restart_and_seek_stay_on_current_track() {
    let device: Shared = Arc::new(Mutex::new(Device {
        position: 10.0,
        seek_flush_polls: 3,
        ..Device::default()
    }));
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let backend_device = device.clone();

    let mut handle = spawn_engine_runtime(
        move || Box::new(ScriptedBackend(backend_device)) as Box<dyn AudioBackend>,
        Box::new(LoggingExternalPlayer::default()),
        RadioConfig::default(),
        move |evt| sink.lock().unwrap().push(evt),
    )
    .unwrap();

    handle.set_queue(vec![track("a", 30.0), track("b", 30.0), track("c", 30.0)]);
    handle.play(Some(track("b", 30.0)));
    let playing = wait_for_state(&events, |s| {
        s.current_index == Some(1) && s.current_time == 10.0
    });
    assert!(playing.is_some());

    // More than 3 s in: previous restarts b.
    handle.previous();
    std::thread::sleep(Duration::from_millis(700));
    handle.seek(20.0);
    std::thread::sleep(Duration::from_millis(700));
    handle.shutdown();

    let states: Vec<PlaybackState> = events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            EngineEvent::State(s) => Some(s.clone()),
            EngineEvent::Shutdown => None,
        })
        .collect();
    assert!(states.iter().all(|s| s.current_index != Some(2)));
    assert!(states.iter().any(|s| s.current_index == Some(1) && s.current_time == 0.0));
    let last = states.last().unwrap();
    assert_eq!(last.current_index, Some(1));
    assert_eq!(last.current_time, 20.0);
    assert!(last.is_playing);
    assert_eq!(device.lock().unwrap().opened, vec!["b.mp3"]);
}

#[test]
fn runtime_applies_config_volume() {
    let device: Shared = Arc::new(Mutex::new(Device::default()));
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let backend_device = device.clone();
    let mut config = RadioConfig::default();
    config.set_volume(0.5).unwrap();

    let mut handle = spawn_engine_runtime(
        move || Box::new(ScriptedBackend(backend_device)) as Box<dyn AudioBackend>,
        Box::new(LoggingExternalPlayer::default()),
        config,
        move |evt| sink.lock().unwrap().push(evt),
    )
    .unwrap();

    handle.play(Some(track("a", 30.0)));
    handle.toggle_mute();
    let muted = wait_for_state(&events, |s| s.is_muted).expect("mute should be reported");
    assert_eq!(muted.volume, 0.5);
    handle.shutdown();
    assert_eq!(device.lock().unwrap().volume, 0.0);
}
