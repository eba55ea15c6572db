//! `homewatch` - encrypted keyword and screenshot recorder
//!
//! This library turns raw keystrokes into filtered keywords and takes
//! periodic screenshots, storing both encrypted in one directory per day.
//!
//! The main entry point is [`CaptureOrchestrator`], which wires a platform
//! [`capture::KeySource`] through the [`WordSegmenter`] and [`FilterPolicy`]
//! into a [`DailyLogStore`], and drives a [`CaptureScheduler`] for
//! screenshots.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod capture;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod filter;
pub mod keystore;
pub mod lifecycle;
pub mod logging;
pub mod orchestrator;
pub mod platform;
pub mod scheduler;
pub mod segmenter;
pub mod store;

pub use capture::{KeyEvent, KeywordEntry, ScreenshotRecord, WindowInfo};
pub use config::{AgentPaths, Config};
pub use error::{Error, Result};
pub use filter::{FilterDecision, FilterPolicy};
pub use keystore::KeyStore;
pub use logging::init_logging;
pub use orchestrator::{CaptureOrchestrator, OrchestratorSettings};
pub use scheduler::CaptureScheduler;
pub use segmenter::WordSegmenter;
pub use store::{DailyLogStore, Partition};
