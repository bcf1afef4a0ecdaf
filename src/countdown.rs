//! Countdown presenter: a 1 Hz ticker over the schedule resolver.
//!
//! Each tick re-resolves from a fresh clock reading instead of decrementing,
//! so drift and clock changes correct themselves on the next tick. The ticker
//! thread is owned by a `CountdownHandle`; dropping the handle stops and joins
//! it, so no tick ever runs against state whose owner is gone.

use crate::catalog::Catalog;
use crate::resolver::{self, UpcomingReveal};
use chrono::{Local, NaiveDateTime};
use log::debug;
use std::fmt;
use std::io;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Reveals at most this many seconds away are shown as imminent.
pub const DEFAULT_IMMINENT_SECS: i64 = 300;

/// Source of "now" for the ticker.
pub trait Clock: Send {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<NaiveDateTime>>,
}

impl ManualClock {
    pub fn new(now: NaiveDateTime) -> Self {
        ManualClock {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// What the countdown display should show.
#[derive(Debug, Clone, PartialEq)]
pub enum CountdownState {
    /// Nothing scheduled.
    None,
    /// More than the imminent threshold away.
    Scheduled(UpcomingReveal),
    /// Within the imminent threshold.
    Imminent(UpcomingReveal),
    /// Start reached.
    Live(UpcomingReveal),
}

impl CountdownState {
    /// Classify a resolver result.
    pub fn classify(reveal: Option<UpcomingReveal>, imminent_secs: i64) -> Self {
        match reveal {
            None => CountdownState::None,
            Some(r) if r.starts_in_seconds <= 0 => CountdownState::Live(r),
            Some(r) if r.starts_in_seconds <= imminent_secs => CountdownState::Imminent(r),
            Some(r) => CountdownState::Scheduled(r),
        }
    }

    pub fn reveal(&self) -> Option<&UpcomingReveal> {
        match self {
            CountdownState::None => None,
            CountdownState::Scheduled(r) | CountdownState::Imminent(r) | CountdownState::Live(r) => {
                Some(r)
            }
        }
    }
}

impl fmt::Display for CountdownState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountdownState::None => write!(f, "none"),
            CountdownState::Scheduled(_) => write!(f, "scheduled"),
            CountdownState::Imminent(_) => write!(f, "imminent"),
            CountdownState::Live(_) => write!(f, "live"),
        }
    }
}

/// Resolver inputs plus classification thresholds.
#[derive(Debug, Clone)]
pub struct Countdown {
    catalog: Catalog,
    imminent_secs: i64,
}

impl Countdown {
    pub fn new(catalog: Catalog) -> Self {
        Countdown {
            catalog,
            imminent_secs: DEFAULT_IMMINENT_SECS,
        }
    }

    pub fn with_imminent_secs(mut self, secs: i64) -> Self {
        self.imminent_secs = secs.max(0);
        self
    }

    /// Swap in a newer catalog snapshot.
    pub fn replace_catalog(&mut self, catalog: Catalog) {
        self.catalog = catalog;
    }

    /// Recompute the display state for `now`.
    pub fn tick(&self, now: NaiveDateTime) -> CountdownState {
        let reveal = resolver::resolve(now, &self.catalog.entries, &self.catalog.tracks);
        CountdownState::classify(reveal, self.imminent_secs)
    }
}

/// Render seconds as `HH:MM:SS`, prefixed with days when at least one day out.
pub fn format_remaining(secs: i64) -> String {
    let secs = secs.max(0);
    let days = secs / 86_400;
    let h = (secs % 86_400) / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    if days > 0 {
        format!("{}d {:02}:{:02}:{:02}", days, h, m, s)
    } else {
        format!("{:02}:{:02}:{:02}", h, m, s)
    }
}

// ── Ticker ───────────────────────────────────────────────────────────────────

enum CountdownCmd {
    Replace(Catalog),
    Shutdown,
}

/// Owner of a running countdown ticker.
pub struct CountdownHandle {
    tx: mpsc::Sender<CountdownCmd>,
    thread: Option<JoinHandle<()>>,
}

impl CountdownHandle {
    /// Replace the catalog; a fresh state is emitted immediately.
    pub fn replace_catalog(&self, catalog: Catalog) {
        let _ = self.tx.send(CountdownCmd::Replace(catalog));
    }

    /// Stop the ticker and wait for its thread to exit. Idempotent.
    pub fn shutdown(&mut self) {
        let _ = self.tx.send(CountdownCmd::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for CountdownHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawn the ticker. `on_state` runs on the ticker thread once immediately,
/// then every `interval`, and again whenever the catalog is replaced.
pub fn spawn_countdown<C, F>(
    countdown: Countdown,
    clock: C,
    interval: Duration,
    on_state: F,
) -> io::Result<CountdownHandle>
where
    C: Clock + 'static,
    F: FnMut(CountdownState) + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<CountdownCmd>();
    let interval = interval.max(Duration::from_millis(1));

    let thread = std::thread::Builder::new()
        .name("countdown".into())
        .spawn(move || ticker_loop(rx, countdown, clock, interval, on_state))?;

    Ok(CountdownHandle {
        tx,
        thread: Some(thread),
    })
}

fn ticker_loop<C, F>(
    rx: mpsc::Receiver<CountdownCmd>,
    mut countdown: Countdown,
    clock: C,
    interval: Duration,
    mut on_state: F,
) where
    C: Clock,
    F: FnMut(CountdownState),
{
    on_state(countdown.tick(clock.now()));
    let mut next_tick = Instant::now() + interval;

    loop {
        let wait = next_tick.saturating_duration_since(Instant::now());
        match rx.recv_timeout(wait) {
            Ok(CountdownCmd::Replace(catalog)) => {
                countdown.replace_catalog(catalog);
                on_state(countdown.tick(clock.now()));
            }
            Ok(CountdownCmd::Shutdown) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                on_state(countdown.tick(clock.now()));
                next_tick += interval;
                // Skip missed ticks after a stall rather than bursting.
                let now = Instant::now();
                if next_tick < now {
                    next_tick = now + interval;
                }
            }
        }
    }
    debug!("Countdown ticker stopped");
}
