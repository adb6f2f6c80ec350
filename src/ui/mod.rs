//! Terminal front end: a feed sidebar on the left and, on the right, the
//! item list, the article reader or the chat panel.
//!
//! `loop_runner` owns the terminal and multiplexes input with background
//! results. Key handling lives in `input`, result handling in `events`, and
//! task spawning shared by both in `helpers`. The remaining modules draw
//! one widget each.

mod articles;
mod chat;
mod events;
mod feeds;
mod helpers;
mod input;
mod loop_runner;
pub mod reader;
mod render;
mod status;

pub use loop_runner::{run, Action};
