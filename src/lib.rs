//! newsrss: a terminal RSS reader with article extraction and language
//! model analysis.
//!
//! - [`feed`] fetches RSS documents and turns them into displayable items
//! - [`content`] downloads article pages and extracts readable text
//! - [`llm`] sends fixed analysis prompts and chat messages to a model
//! - [`view`] and [`session`] hold what one reading session shows and owns
//! - [`ui`] is the ratatui front end driving all of the above

pub mod app;
pub mod config;
pub mod content;
pub mod feed;
pub mod llm;
pub mod session;
pub mod ui;
pub mod util;
pub mod view;
