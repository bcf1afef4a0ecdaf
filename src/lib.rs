//! leak_radio: core library for the Leak Radio player.
//!
//! Playback, schedule resolution and the reveal countdown live here.
//! The CLI and any GUI shell consume this crate.

pub mod catalog;
pub mod config;
pub mod countdown;
pub mod device;
pub mod engine;
pub mod error;
pub mod player;
pub mod queue;
pub mod resolver;
pub mod runtime;
pub mod schedule;
pub mod track;
