//! Global keyboard hook for X11 sessions.
//!
//! `rdev::listen` blocks its thread for the life of the process and cannot be
//! cancelled, so the hook thread is started once and reused. Stopping clears
//! the sink the thread forwards to; starting again installs a new one.

use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rdev::{EventType, Key};
use thiserror::Error;
use tracing::{debug, warn};

/// How long `start` waits for the hook to fail before assuming it listens.
pub const STARTUP_GRACE: Duration = Duration::from_millis(250);

/// A key press, reduced to what word segmentation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPress {
    /// A key that produced a printable character.
    Char(char),
    /// The space bar.
    Space,
    /// Return, on the main block or the keypad.
    Enter,
    /// Tab.
    Tab,
    /// Anything else.
    Other,
}

impl KeyPress {
    fn from_rdev(key: Key, name: Option<&str>) -> Self {
        match key {
            Key::Space => Self::Space,
            Key::Return | Key::KpReturn => Self::Enter,
            Key::Tab => Self::Tab,
            _ => printable(name).map_or(Self::Other, Self::Char),
        }
    }
}

/// The single printable character a key produced, if any.
fn printable(name: Option<&str>) -> Option<char> {
    let mut chars = name?.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if !c.is_control() => Some(c),
        _ => None,
    }
}

/// Errors from the keyboard hook.
#[derive(Debug, Error)]
pub enum KeyboardError {
    /// No X display to attach to.
    #[error("DISPLAY is not set; the keyboard hook needs an X11 session")]
    NoDisplay,

    /// The hook thread could not be spawned.
    #[error("failed to spawn keyboard hook thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The X11 listener refused to start or stopped.
    #[error("keyboard hook failed: {0}")]
    Listen(String),
}

/// Receives key presses. Returning `false` detaches it from the hook.
type Sink = Box<dyn FnMut(KeyPress) -> bool + Send>;

/// System-wide keyboard hook.
#[derive(Default)]
pub struct KeyboardHook {
    sink: Arc<Mutex<Option<Sink>>>,
    thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for KeyboardHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyboardHook")
            .field("attached", &self.is_attached())
            .field("thread_alive", &self.thread_alive())
            .finish()
    }
}

impl KeyboardHook {
    /// Create a hook that is not yet listening.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver every key press to `on_key` until [`KeyboardHook::stop`] or
    /// until `on_key` returns `false`.
    ///
    /// Blocks for up to [`STARTUP_GRACE`] on first start.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no X display or the listener fails to
    /// start.
    pub fn start<F>(&mut self, on_key: F) -> Result<(), KeyboardError>
    where
        F: FnMut(KeyPress) -> bool + Send + 'static,
    {
        if std::env::var_os("DISPLAY").is_none() {
            return Err(KeyboardError::NoDisplay);
        }

        set_sink(&self.sink, Some(Box::new(on_key)));
        if self.thread_alive() {
            debug!("Keyboard hook reattached");
            return Ok(());
        }

        let (failed_tx, failed_rx) = std_mpsc::channel();
        let sink = Arc::clone(&self.sink);
        let handle = thread::Builder::new()
            .name("homewatch-keyboard".into())
            .spawn(move || {
                let listener_sink = Arc::clone(&sink);
                let result = rdev::listen(move |event| {
                    if let EventType::KeyPress(key) = event.event_type {
                        dispatch(&listener_sink, KeyPress::from_rdev(key, event.name.as_deref()));
                    }
                });
                let message = match result {
                    Ok(()) => "listener returned".to_string(),
                    Err(e) => format!("{e:?}"),
                };
                warn!(error = %message, "Keyboard hook ended");
                // Dropping the sink hangs up on the consumer.
                set_sink(&sink, None);
                let _ = failed_tx.send(message);
            })
            .map_err(KeyboardError::Spawn)?;

        match failed_rx.recv_timeout(STARTUP_GRACE) {
            Err(RecvTimeoutError::Timeout) => {
                debug!("Keyboard hook listening");
                self.thread = Some(handle);
                Ok(())
            }
            Ok(message) => {
                let _ = handle.join();
                Err(KeyboardError::Listen(message))
            }
            Err(RecvTimeoutError::Disconnected) => {
                set_sink(&self.sink, None);
                let _ = handle.join();
                Err(KeyboardError::Listen("hook thread exited".into()))
            }
        }
    }

    /// Stop delivering key presses. The hook thread stays parked on X11.
    pub fn stop(&mut self) {
        set_sink(&self.sink, None);
    }

    /// Whether key presses are currently being delivered.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.is_attached() && self.thread_alive()
    }

    fn is_attached(&self) -> bool {
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn thread_alive(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }
}

fn set_sink(slot: &Mutex<Option<Sink>>, sink: Option<Sink>) {
    *slot.lock().unwrap_or_else(PoisonError::into_inner) = sink;
}

fn dispatch(slot: &Mutex<Option<Sink>>, key: KeyPress) {
    let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(on_key) = guard.as_mut() {
        if !on_key(key) {
            *guard = None;
        }
    }
}
