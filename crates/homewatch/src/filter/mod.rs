//! Keyword filtering applied before anything is written to disk.
//!
//! Two rules decide whether a word is kept:
//!
//! - **Word exclusion**: a word containing any configured exclude substring
//!   is dropped, whatever application it was typed into.
//!
//! - **Process inclusion**: when an include list is configured, the word is
//!   kept only if the foreground process name contains one of its entries.
//!
//! # Example
//!
//! ```
//! use homewatch::filter::{FilterDecision, FilterPolicy};
//!
//! let policy = FilterPolicy::new(&["chrome"], &["secret"]);
//!
//! assert!(policy.should_log("weather", "chrome"));
//! assert_eq!(
//!     policy.decide("secret123", "chrome"),
//!     FilterDecision::ExcludedWord { pattern: "secret".to_string() }
//! );
//! assert!(!policy.should_log("weather", "notepad"));
//! ```

mod defaults;
mod policy;

pub use defaults::{default_exclude_words, default_include_processes};
pub use policy::{FilterDecision, FilterPolicy};
