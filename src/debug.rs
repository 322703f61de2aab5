//! Real-time safe debug logging for the meter plugin.
//!
//! `vm_log!` formats into a fixed-size entry and pushes it onto a
//! preallocated ring; a non-audio thread calls [`logger::drain_to_file`].
//! Without the `debug` feature the macro compiles to nothing.
//!
//! Non-RT code (profile loading, the CLI) uses the `log` crate directly.

use std::fmt;

#[cfg(feature = "debug")]
pub mod logger {
    use std::cell::UnsafeCell;
    use std::fmt;
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::OnceLock;

    const LOG_CAP: usize = 128;
    const LOG_MSG_MAX: usize = 256;
    const LOG_PATH: &str = "/tmp/vxmeter.log";

    #[derive(Copy, Clone)]
    struct LogEntry {
        len: u16,
        bytes: [u8; LOG_MSG_MAX],
    }

    impl Default for LogEntry {
        fn default() -> Self {
            Self {
                len: 0,
                bytes: [0; LOG_MSG_MAX],
            }
        }
    }

    /// Single-producer ring. Full ring drops the entry and counts it.
    struct LogRing {
        head: AtomicUsize,
        tail: AtomicUsize,
        dropped: AtomicUsize,
        buf: Box<[UnsafeCell<LogEntry>]>,
    }

    unsafe impl Sync for LogRing {}

    impl LogRing {
        fn new() -> Self {
            let buf: Vec<_> = (0..LOG_CAP)
                .map(|_| UnsafeCell::new(LogEntry::default()))
                .collect();
            Self {
                head: AtomicUsize::new(0),
                tail: AtomicUsize::new(0),
                dropped: AtomicUsize::new(0),
                buf: buf.into_boxed_slice(),
            }
        }

        fn push(&self, entry: LogEntry) {
            let cap = self.buf.len();
            let head = self.head.load(Ordering::Relaxed);
            let next = (head + 1) % cap;
            if next == self.tail.load(Ordering::Acquire) {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return;
            }
            unsafe {
                *self.buf[head].get() = entry;
            }
            self.head.store(next, Ordering::Release);
        }

        fn pop(&self) -> Option<LogEntry> {
            let cap = self.buf.len();
            let tail = self.tail.load(Ordering::Relaxed);
            if tail == self.head.load(Ordering::Acquire) {
                return None;
            }
            let entry = unsafe { *self.buf[tail].get() };
            self.tail.store((tail + 1) % cap, Ordering::Release);
            Some(entry)
        }
    }

    static LOGGER: OnceLock<LogRing> = OnceLock::new();
    static LOG_ENABLED: AtomicBool = AtomicBool::new(false);

    pub fn init_logger() {
        let _ = LOGGER.get_or_init(LogRing::new);
        LOG_ENABLED.store(true, Ordering::Relaxed);
    }

    struct EntryWriter {
        entry: LogEntry,
    }

    impl fmt::Write for EntryWriter {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            let len = self.entry.len as usize;
            let n = s.len().min(LOG_MSG_MAX - len);
            self.entry.bytes[len..len + n].copy_from_slice(&s.as_bytes()[..n]);
            self.entry.len += n as u16;
            Ok(())
        }
    }

    pub fn log_args(args: fmt::Arguments) {
        if !LOG_ENABLED.load(Ordering::Relaxed) {
            return;
        }
        let Some(logger) = LOGGER.get() else {
            return;
        };

        let mut w = EntryWriter {
            entry: LogEntry::default(),
        };
        let _ = fmt::write(&mut w, args);
        logger.push(w.entry);
    }

    /// Pops every pending entry into a `Vec`. Not for the audio thread.
    pub fn drain_lines() -> Vec<String> {
        let mut lines = Vec::new();
        let Some(logger) = LOGGER.get() else {
            return lines;
        };
        while let Some(entry) = logger.pop() {
            let len = entry.len as usize;
            if len == 0 {
                continue;
            }
            lines.push(String::from_utf8_lossy(&entry.bytes[..len]).into_owned());
        }
        let dropped = logger.dropped.swap(0, Ordering::Relaxed);
        if dropped > 0 {
            lines.push(format!("[vm_log] {dropped} entries dropped"));
        }
        lines
    }

    pub fn drain_to_file() {
        if !LOG_ENABLED.load(Ordering::Relaxed) {
            return;
        }
        let lines = drain_lines();
        if lines.is_empty() {
            return;
        }
        let mut file = match OpenOptions::new().create(true).append(true).open(LOG_PATH) {
            Ok(f) => f,
            Err(e) => {
                log::warn!("[vxmeter] cannot open {LOG_PATH}: {e}");
                return;
            }
        };
        for line in lines {
            let _ = writeln!(file, "{line}");
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_entries_are_truncated_and_drained() {
            init_logger();
            let _ = drain_lines();
            let long = "x".repeat(LOG_MSG_MAX * 2);
            log_args(format_args!("{long}"));
            log_args(format_args!("gr={:.1}", 3.0));
            let lines = drain_lines();
            assert_eq!(lines[0].len(), LOG_MSG_MAX);
            assert_eq!(lines[1], "gr=3.0");
        }
    }
}

#[cfg(feature = "debug")]
pub(crate) fn vm_log_inner(args: fmt::Arguments) {
    logger::log_args(args);
}

#[cfg(not(feature = "debug"))]
pub(crate) fn vm_log_inner(_args: fmt::Arguments) {}

#[macro_export]
macro_rules! vm_log {
    ($($arg:tt)*) => {
        $crate::debug::vm_log_inner(format_args!($($arg)*))
    };
}
