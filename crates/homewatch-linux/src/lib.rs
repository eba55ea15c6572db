//! Linux-specific implementation for homewatch
//!
//! This crate provides the Linux capture adapters for the homewatch agent.
//! Screen capture shells out to an installed screenshot tool. With the
//! `keyboard` feature, key presses come from a global X11 hook.

#![cfg(target_os = "linux")]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

#[cfg(feature = "keyboard")]
mod keyboard;
mod screenshot;

#[cfg(feature = "keyboard")]
pub use keyboard::{KeyPress, KeyboardError, KeyboardHook, STARTUP_GRACE};
pub use screenshot::{ScreenshotError, ScreenshotTool, ToolScreenshot, DEFAULT_TOOL_TIMEOUT};

/// Initialize Linux-specific components
///
/// # Errors
///
/// Returns an error if initialization fails
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    Ok(())
}

/// Get platform name
#[must_use]
pub fn platform_name() -> &'static str {
    "Linux"
}
