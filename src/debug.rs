//! Real-time safe debug logging.
//!
//! The audio thread must not touch the `log` facade (it may lock or allocate),
//! so `wv_log!` formats into a fixed stack buffer and pushes it into a
//! single-producer ring. A non-real-time thread calls `drain()` to forward
//! the queued lines to `log::debug!` under the `weirdverb::rt` target.
//!
//! Without the `debug` feature `wv_log!` compiles to nothing and `drain()`
//! returns 0.

use std::fmt;

pub const RT_TARGET: &str = "weirdverb::rt";

#[cfg(feature = "debug")]
pub mod logger {
    use std::cell::UnsafeCell;
    use std::fmt;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::OnceLock;

    const RING_CAP: usize = 128;
    const LINE_MAX: usize = 192;

    #[derive(Copy, Clone)]
    struct Line {
        len: u16,
        bytes: [u8; LINE_MAX],
    }

    impl Line {
        const EMPTY: Line = Line {
            len: 0,
            bytes: [0; LINE_MAX],
        };

        fn as_str(&self) -> &str {
            let len = (self.len as usize).min(LINE_MAX);
            std::str::from_utf8(&self.bytes[..len]).unwrap_or("<invalid utf-8>")
        }
    }

    /// Single producer (audio thread), single consumer (drain).
    struct LineRing {
        head: AtomicUsize,
        tail: AtomicUsize,
        dropped: AtomicUsize,
        slots: Box<[UnsafeCell<Line>]>,
    }

    unsafe impl Sync for LineRing {}

    impl LineRing {
        fn new() -> Self {
            Self {
                head: AtomicUsize::new(0),
                tail: AtomicUsize::new(0),
                dropped: AtomicUsize::new(0),
                slots: (0..RING_CAP).map(|_| UnsafeCell::new(Line::EMPTY)).collect(),
            }
        }

        fn push(&self, line: &Line) {
            let head = self.head.load(Ordering::Relaxed);
            let next = (head + 1) % RING_CAP;
            if next == self.tail.load(Ordering::Acquire) {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return;
            }
            // SAFETY: only the producer writes `head`, and the consumer never
            // reads a slot at or past `head`.
            unsafe {
                *self.slots[head].get() = *line;
            }
            self.head.store(next, Ordering::Release);
        }

        fn pop(&self) -> Option<Line> {
            let tail = self.tail.load(Ordering::Relaxed);
            if tail == self.head.load(Ordering::Acquire) {
                return None;
            }
            // SAFETY: `tail != head`, so the producer finished writing this slot.
            let line = unsafe { *self.slots[tail].get() };
            self.tail.store((tail + 1) % RING_CAP, Ordering::Release);
            Some(line)
        }
    }

    static RING: OnceLock<LineRing> = OnceLock::new();
    static ENABLED: AtomicBool = AtomicBool::new(false);

    /// Allocate the ring. Call from a non-real-time thread before processing.
    pub fn init_logger() {
        let _ = RING.get_or_init(LineRing::new);
        ENABLED.store(true, Ordering::Relaxed);
    }

    struct LineWriter {
        line: Line,
    }

    impl fmt::Write for LineWriter {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            let len = self.line.len as usize;
            let mut n = s.len().min(LINE_MAX - len);
            // Never split a multi-byte character
            while !s.is_char_boundary(n) {
                n -= 1;
            }
            self.line.bytes[len..len + n].copy_from_slice(&s.as_bytes()[..n]);
            self.line.len = (len + n) as u16;
            Ok(())
        }
    }

    pub fn log_args(args: fmt::Arguments) {
        if !ENABLED.load(Ordering::Relaxed) {
            return;
        }
        let Some(ring) = RING.get() else {
            return;
        };
        let mut writer = LineWriter { line: Line::EMPTY };
        let _ = fmt::write(&mut writer, args);
        ring.push(&writer.line);
    }

    /// Forward queued lines to `log`. Returns how many were forwarded.
    pub fn drain() -> usize {
        let Some(ring) = RING.get() else {
            return 0;
        };
        let mut count = 0;
        while let Some(line) = ring.pop() {
            if line.len > 0 {
                log::debug!(target: super::RT_TARGET, "{}", line.as_str());
                count += 1;
            }
        }
        let dropped = ring.dropped.swap(0, Ordering::Relaxed);
        if dropped > 0 {
            log::warn!(target: super::RT_TARGET, "{dropped} real-time log lines dropped");
        }
        count
    }

}

#[cfg(feature = "debug")]
#[doc(hidden)]
pub fn wv_log_inner(args: fmt::Arguments) {
    logger::log_args(args);
}

#[cfg(not(feature = "debug"))]
#[doc(hidden)]
pub fn wv_log_inner(_args: fmt::Arguments) {}

/// Forward queued real-time lines to `log`.
#[cfg(feature = "debug")]
pub fn drain() -> usize {
    logger::drain()
}

#[cfg(not(feature = "debug"))]
pub fn drain() -> usize {
    0
}

#[macro_export]
macro_rules! wv_log {
    ($($arg:tt)*) => {
        $crate::debug::wv_log_inner(format_args!($($arg)*))
    };
}
