use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use env_logger::Env;
use leak_radio::catalog::Catalog;
use leak_radio::config::RadioConfig;
use leak_radio::countdown::{self, Countdown, CountdownState, SystemClock};
use leak_radio::device::{AudioBackend, LoggingExternalPlayer};
use leak_radio::engine::OutputKind;
use leak_radio::player::RodioBackend;
use leak_radio::resolver::{self, UpcomingReveal};
use leak_radio::runtime::{self, EngineEvent};
use leak_radio::track::Track;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

#[derive(Parser)]
#[command(name = "leakradio", about = "Leak Radio player and reveal countdown")]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the next scheduled reveal
    Reveal {
        /// Catalog JSON file
        #[arg(short, long)]
        catalog: PathBuf,
        /// Resolve at this local time instead of now ("YYYY-MM-DD HH:MM[:SS]")
        #[arg(long)]
        at: Option<String>,
        /// Consider every scheduled track, not only hidden ones
        #[arg(long)]
        all: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the live countdown to the next reveal
    Countdown {
        /// Catalog JSON file
        #[arg(short, long)]
        catalog: PathBuf,
        /// Stop after this many updates
        #[arg(short = 'n', long)]
        ticks: Option<usize>,
    },
    /// Play the public tracks of a catalog and/or local audio files
    Play {
        /// Catalog JSON file
        #[arg(short, long)]
        catalog: Option<PathBuf>,
        /// Audio file(s) to queue after the catalog tracks
        #[arg(short, long = "file")]
        files: Vec<PathBuf>,
        /// Track id to start from
        #[arg(short, long)]
        track: Option<String>,
        /// Crossfade duration in seconds (overrides config)
        #[arg(short = 'x', long)]
        crossfade: Option<f32>,
    },
    /// Player configuration
    Config {
        #[command(subcommand)]
        action: ConfigCmd,
    },
}

#[derive(Subcommand)]
enum ConfigCmd {
    /// Show current configuration
    Show,
    /// Set crossfade duration in seconds (0 = disabled)
    Crossfade {
        /// Duration in seconds
        seconds: f32,
    },
    /// Set the initial volume (0.0 - 1.0)
    Volume {
        /// Volume level
        level: f32,
    },
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(RadioConfig::default_path);
    let mut config = RadioConfig::load(&config_path);

    match cli.command {
        Commands::Reveal {
            catalog,
            at,
            all,
            json,
        } => {
            let catalog = load_catalog(&catalog);
            let now = match at {
                Some(s) => parse_datetime(&s).unwrap_or_else(|| {
                    eprintln!("Error: '{}' is not a valid date-time (YYYY-MM-DD HH:MM[:SS])", s);
                    std::process::exit(1);
                }),
                None => Local::now().naive_local(),
            };
            let reveal = if all {
                resolver::resolve_with(now, &catalog.entries, &catalog.tracks, |_| true)
            } else {
                resolver::resolve(now, &catalog.entries, &catalog.tracks)
            };

            if json {
                match serde_json::to_string_pretty(&reveal) {
                    Ok(out) => println!("{}", out),
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        std::process::exit(1);
                    }
                }
                return;
            }
            match reveal {
                Some(r) => print_reveal(&r),
                None => println!("No upcoming reveals."),
            }
        }
        Commands::Countdown { catalog, ticks } => {
            let catalog = load_catalog(&catalog);
            let countdown = Countdown::new(catalog).with_imminent_secs(config.imminent_secs);
            let (tx, rx) = mpsc::channel();
            let mut handle = match countdown::spawn_countdown(
                countdown,
                SystemClock,
                config.tick_interval(),
                move |state| {
                    let _ = tx.send(state);
                },
            ) {
                Ok(h) => h,
                Err(e) => {
                    eprintln!("Error: failed to start countdown: {}", e);
                    std::process::exit(1);
                }
            };

            let mut shown = 0usize;
            for state in rx.iter() {
                print_countdown(&state);
                shown += 1;
                if ticks.is_some_and(|n| shown >= n) {
                    break;
                }
            }
            handle.shutdown();
        }
        Commands::Play {
            catalog,
            files,
            track,
            crossfade,
        } => {
            if let Some(secs) = crossfade
                && let Err(e) = config.set_crossfade(secs)
            {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
            let mut queue: Vec<Track> = match &catalog {
                Some(path) => load_catalog(path)
                    .tracks
                    .into_iter()
                    .filter(|t| !t.is_hidden)
                    .collect(),
                None => Vec::new(),
            };
            for file in &files {
                match Track::from_path(file) {
                    Ok(t) => queue.push(t),
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        std::process::exit(1);
                    }
                }
            }
            if queue.is_empty() {
                eprintln!("Error: nothing to play. Pass --catalog with public tracks or --file.");
                std::process::exit(1);
            }
            let library = Catalog::from_parts(queue, &[]);
            let start = match &track {
                Some(id) => match library.find_track(id) {
                    Some(t) => Some(t.clone()),
                    None => {
                        eprintln!("Error: no public track with id '{}'", id);
                        std::process::exit(1);
                    }
                },
                None => None,
            };

            play_queue(library.tracks, start, config);
        }
        Commands::Config { action } => match action {
            ConfigCmd::Show => {
                println!("Config file:     {}", config_path.display());
                println!("Volume:          {:.2}", config.volume);
                if config.crossfade_secs > 0.0 {
                    println!("Crossfade:       {:.1}s", config.crossfade_secs);
                } else {
                    println!("Crossfade:       disabled");
                }
                println!("Imminent after:  {}s", config.imminent_secs);
                println!("Tick interval:   {}ms", config.tick_interval_ms);
                println!("Restart after:   {:.1}s", config.restart_threshold_secs);
            }
            ConfigCmd::Crossfade { seconds } => {
                if let Err(e) = config.set_crossfade(seconds) {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
                save_config(&config, &config_path);
                if seconds == 0.0 {
                    println!("Crossfade disabled.");
                } else {
                    println!("Crossfade set to {:.1}s.", seconds);
                }
            }
            ConfigCmd::Volume { level } => {
                if let Err(e) = config.set_volume(level) {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
                save_config(&config, &config_path);
                println!("Volume set to {:.2}.", level);
            }
        },
    }
}

fn load_catalog(path: &Path) -> Catalog {
    match Catalog::load(path) {
        Ok(catalog) => catalog,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn save_config(config: &RadioConfig, path: &Path) {
    if let Err(e) = config.save(path) {
        eprintln!("Error: failed to save config: {}", e);
        std::process::exit(1);
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M"))
        .ok()
}

fn print_reveal(r: &UpcomingReveal) {
    println!("Next reveal: {} by {}", r.track.title, r.track.artist);
    println!("  When:      {} at {}", r.day_label, r.time_label);
    println!(
        "  Slot:      {} {}-{}",
        r.entry.day_display(),
        r.time_label,
        r.entry.end_time.format("%H:%M")
    );
    println!("  Starts in: {}", countdown::format_remaining(r.starts_in_seconds));
}

fn print_countdown(state: &CountdownState) {
    let Some(r) = state.reveal() else {
        println!("No upcoming reveals.");
        return;
    };
    if matches!(state, CountdownState::Live(_)) {
        println!("LIVE NOW: {} by {}", r.track.title, r.track.artist);
        return;
    }
    println!(
        "[{}] {} by {} in {} ({} at {})",
        state,
        r.track.title,
        r.track.artist,
        countdown::format_remaining(r.starts_in_seconds),
        r.day_label,
        r.time_label
    );
}

/// Drive the engine runtime until the queue runs out.
fn play_queue(queue: Vec<Track>, start: Option<Track>, config: RadioConfig) {
    let (tx, rx) = mpsc::channel();
    let mut handle = match runtime::spawn_engine_runtime(
        || Box::new(RodioBackend::new()) as Box<dyn AudioBackend>,
        Box::new(LoggingExternalPlayer::default()),
        config,
        move |evt| {
            let _ = tx.send(evt);
        },
    ) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("Error: failed to start playback engine: {}", e);
            std::process::exit(1);
        }
    };

    handle.set_queue(queue);
    handle.play(start);

    let mut last_id: Option<String> = None;
    for evt in rx.iter() {
        let EngineEvent::State(state) = evt else {
            break;
        };
        let id = state.current_track.as_ref().map(|t| t.id.clone());
        if id != last_id {
            if let (Some(t), Some(i)) = (&state.current_track, state.current_index) {
                println!(
                    "▶ [{}/{}] {} - {} ({})",
                    i + 1,
                    state.queue_len,
                    t.artist,
                    t.title,
                    t.duration_display()
                );
            }
            last_id = id;
        }

        if state.is_playing && state.output != OutputKind::LocalAudio {
            // Nothing audible from this terminal: skip ahead.
            if !state.has_next {
                eprintln!("Cannot play the last track here, stopping.");
                break;
            }
            handle.next();
        } else if !state.is_playing && state.output == OutputKind::None && last_id.is_some() {
            println!("Queue finished.");
            break;
        }
    }
    handle.shutdown();
}
