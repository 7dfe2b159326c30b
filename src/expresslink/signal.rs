//! Event-pending level signal
//!
//! The module asserts a level output while its event queue is non-empty.
//! Hosts that wire it up read it through a debouncer; hosts that don't
//! fall back to polling `EVENT?` on an interval.

use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

/// Raw level input (GPIO, simulator, ...)
pub trait LevelInput: Send {
    fn read(&mut self) -> bool;
}

impl<F> LevelInput for F
where
    F: FnMut() -> bool + Send,
{
    fn read(&mut self) -> bool {
        self()
    }
}

/// GPIO level read from a sysfs `value` file (`/sys/class/gpio/gpioN/value`)
///
/// An unreadable file reads as low. The failure is logged once.
pub struct SysfsGpio {
    path: PathBuf,
    failed: bool,
}

impl SysfsGpio {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            failed: false,
        }
    }
}

impl LevelInput for SysfsGpio {
    fn read(&mut self) -> bool {
        match std::fs::read_to_string(&self.path) {
            Ok(value) => {
                self.failed = false;
                value.trim() == "1"
            }
            Err(e) => {
                if !self.failed {
                    warn!("[EL] Event signal {} unreadable: {}", self.path.display(), e);
                    self.failed = true;
                }
                false
            }
        }
    }
}

/// Sampled "events pending" indication
pub trait EventSignal: Send {
    /// Sample the underlying input
    fn update(&mut self);

    /// Debounced level after the last update
    fn is_pending(&self) -> bool;
}

/// Debounced level signal
///
/// A level change is accepted once the raw input has held the new value for
/// at least the debounce interval.
pub struct DebouncedSignal<I> {
    input: I,
    interval: Duration,
    stable: bool,
    candidate: bool,
    changed_at: Instant,
}

impl<I: LevelInput> DebouncedSignal<I> {
    pub fn new(mut input: I, interval: Duration) -> Self {
        let level = input.read();
        Self {
            input,
            interval,
            stable: level,
            candidate: level,
            changed_at: Instant::now(),
        }
    }
}

impl<I: LevelInput> EventSignal for DebouncedSignal<I> {
    fn update(&mut self) {
        let level = self.input.read();
        let now = Instant::now();

        if level != self.candidate {
            self.candidate = level;
            self.changed_at = now;
        }
        if self.candidate != self.stable && now.duration_since(self.changed_at) >= self.interval {
            self.stable = self.candidate;
        }
    }

    fn is_pending(&self) -> bool {
        self.stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn shared_level(initial: bool) -> (Arc<AtomicBool>, impl FnMut() -> bool + Send) {
        let level = Arc::new(AtomicBool::new(initial));
        let reader = level.clone();
        (level, move || reader.load(Ordering::SeqCst))
    }

    #[test]
    fn test_initial_level() {
        let (_level, input) = shared_level(true);
        let signal = DebouncedSignal::new(input, Duration::from_millis(1));
        assert!(signal.is_pending());
    }

    #[test]
    fn test_zero_interval_follows_input() {
        let (level, input) = shared_level(true);
        let mut signal = DebouncedSignal::new(input, Duration::ZERO);
        level.store(false, Ordering::SeqCst);
        signal.update();
        assert!(!signal.is_pending());
    }

    #[test]
    fn test_sysfs_gpio_levels() {
        let path = std::env::temp_dir().join(format!("badge-gpio-{}", std::process::id()));
        let mut gpio = SysfsGpio::new(path.clone());
        assert!(!gpio.read());

        std::fs::write(&path, "1\n").unwrap();
        assert!(gpio.read());
        std::fs::write(&path, "0\n").unwrap();
        assert!(!gpio.read());
        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_glitch_is_filtered() {
        let (level, input) = shared_level(false);
        let mut signal = DebouncedSignal::new(input, Duration::from_millis(5));

        level.store(true, Ordering::SeqCst);
        signal.update();
        assert!(!signal.is_pending());

        level.store(false, Ordering::SeqCst);
        tokio::time::advance(Duration::from_millis(10)).await;
        signal.update();
        assert!(!signal.is_pending());

        level.store(true, Ordering::SeqCst);
        signal.update();
        tokio::time::advance(Duration::from_millis(6)).await;
        signal.update();
        assert!(signal.is_pending());
    }
}
