//! Platform backend selection.
//!
//! Backends are chosen once at startup; the rest of the agent only sees the
//! collaborator traits from [`crate::capture`].

use std::sync::Arc;

use crate::capture::{ActiveWindow, KeySource, ScreenCapture, UnknownWindow};
use crate::error::{Error, Result};

/// Human-readable name of the running platform.
#[must_use]
pub fn platform_name() -> &'static str {
    #[cfg(target_os = "linux")]
    {
        homewatch_linux::platform_name()
    }
    #[cfg(not(target_os = "linux"))]
    {
        std::env::consts::OS
    }
}

/// Initialize platform components.
///
/// # Errors
///
/// Returns an error if the platform layer fails to initialize.
pub fn init() -> Result<()> {
    #[cfg(target_os = "linux")]
    {
        homewatch_linux::init().map_err(|e| Error::internal(format!("platform init: {e}")))
    }
    #[cfg(not(target_os = "linux"))]
    {
        Ok(())
    }
}

/// Keystroke source for this platform.
///
/// On Linux this is the X11 hook, built with the `keyboard` feature.
///
/// # Errors
///
/// Returns [`Error::UnsupportedPlatform`] when no source exists.
pub fn key_source() -> Result<Box<dyn KeySource>> {
    #[cfg(all(target_os = "linux", feature = "keyboard"))]
    {
        Ok(Box::new(linux::LinuxKeys::default()))
    }
    #[cfg(not(all(target_os = "linux", feature = "keyboard")))]
    {
        Err(Error::UnsupportedPlatform {
            source_name: "keystroke",
            platform: platform_name(),
        })
    }
}

/// Foreground window resolver for this platform.
#[must_use]
pub fn active_window() -> Arc<dyn ActiveWindow> {
    Arc::new(UnknownWindow)
}

/// Screen capture backend for this platform.
///
/// # Errors
///
/// Returns [`Error::UnsupportedPlatform`] when no backend is available.
pub fn screen_capture() -> Result<Arc<dyn ScreenCapture>> {
    #[cfg(target_os = "linux")]
    {
        if let Some(tool) = homewatch_linux::ToolScreenshot::detect() {
            return Ok(Arc::new(linux::LinuxScreenshot(tool)));
        }
    }

    Err(Error::UnsupportedPlatform {
        source_name: "screenshot",
        platform: platform_name(),
    })
}

#[cfg(target_os = "linux")]
mod linux {
    use homewatch_linux::{ScreenshotError, ToolScreenshot};

    use crate::capture::ScreenCapture;
    use crate::error::{Error, Result};

    #[derive(Debug)]
    pub(super) struct LinuxScreenshot(pub(super) ToolScreenshot);

    impl ScreenCapture for LinuxScreenshot {
        fn name(&self) -> &'static str {
            self.0.tool().binary()
        }

        fn capture(&self) -> Result<Option<Vec<u8>>> {
            self.0.capture().map_err(|e| match e {
                ScreenshotError::TimedOut { tool, .. } => Error::Timeout {
                    operation: format!("{tool} screenshot"),
                },
                other => Error::capture(other.to_string()),
            })
        }
    }

    #[cfg(feature = "keyboard")]
    pub(super) use keys::LinuxKeys;

    #[cfg(feature = "keyboard")]
    mod keys {
        use homewatch_linux::{KeyPress, KeyboardHook};
        use tokio::sync::mpsc;

        use crate::capture::{KeyEvent, KeySource};
        use crate::error::{Error, Result};

        const NAME: &str = "x11-keyboard";

        /// Forwards the X11 hook into the key channel.
        #[derive(Debug, Default)]
        pub(in crate::platform) struct LinuxKeys {
            hook: KeyboardHook,
        }

        #[async_trait::async_trait]
        impl KeySource for LinuxKeys {
            fn name(&self) -> &'static str {
                NAME
            }

            async fn start(&mut self, sender: mpsc::Sender<KeyEvent>) -> Result<()> {
                // The hook waits briefly for the listener to fail, so start it
                // off the async workers.
                let mut hook = std::mem::take(&mut self.hook);
                let (hook, started) = tokio::task::spawn_blocking(move || {
                    let started =
                        hook.start(move |key| sender.blocking_send(key_event(key)).is_ok());
                    (hook, started)
                })
                .await
                .map_err(|e| Error::capture_source_start(NAME, e.to_string()))?;
                self.hook = hook;
                started.map_err(|e| Error::capture_source_start(NAME, e.to_string()))
            }

            fn stop(&mut self) -> Result<()> {
                self.hook.stop();
                Ok(())
            }

            fn is_running(&self) -> bool {
                self.hook.is_running()
            }
        }

        fn key_event(key: KeyPress) -> KeyEvent {
            match key {
                KeyPress::Char(c) => KeyEvent::Char(c),
                KeyPress::Space => KeyEvent::Space,
                KeyPress::Enter => KeyEvent::Enter,
                KeyPress::Tab => KeyEvent::Tab,
                KeyPress::Other => KeyEvent::Other,
            }
        }

    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_name_not_empty() {
        assert!(!platform_name().is_empty());
    }

    #[test]
    fn test_init() {
        assert!(init().is_ok());
    }

    #[cfg(not(all(target_os = "linux", feature = "keyboard")))]
    #[test]
    fn test_no_key_source_is_configuration_invalid() {
        let err = key_source().err().unwrap();
        assert!(err.is_configuration_invalid());
    }

    #[cfg(all(target_os = "linux", feature = "keyboard"))]
    #[test]
    fn test_linux_key_source_available() {
        assert_eq!(key_source().unwrap().name(), "x11-keyboard");
    }

    #[test]
    fn test_active_window_placeholder() {
        let info = active_window().resolve();
        assert_eq!(info.process_name, crate::capture::UNKNOWN_PROCESS);
    }
}
