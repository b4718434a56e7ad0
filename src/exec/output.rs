//! Output sinks and the stderr tail buffer
//!
//! Parallel children write into per-child buffers which the combinator
//! flushes to the parent sink in completion order, so concurrent task
//! output never interleaves mid-line.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Where task and subprocess output goes.
#[derive(Debug, Clone)]
pub enum OutputSink {
    /// Write through to the process stdout.
    Standard,
    /// Accumulate until drained by the parent combinator (or a test).
    Buffer(Arc<Mutex<Vec<u8>>>),
}

impl OutputSink {
    pub fn buffer() -> Self {
        OutputSink::Buffer(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn write(&self, bytes: &[u8]) {
        match self {
            OutputSink::Standard => {
                let stdout = std::io::stdout();
                let mut lock = stdout.lock();
                let _ = lock.write_all(bytes);
                let _ = lock.flush();
            }
            OutputSink::Buffer(buf) => {
                let mut guard = match buf.lock() {
                    Ok(g) => g,
                    Err(poisoned) => poisoned.into_inner(),
                };
                guard.extend_from_slice(bytes);
            }
        }
    }

    /// Write a line, appending the newline.
    pub fn line(&self, text: &str) {
        let mut bytes = Vec::with_capacity(text.len() + 1);
        bytes.extend_from_slice(text.as_bytes());
        bytes.push(b'\n');
        self.write(&bytes);
    }

    /// Whether this sink ultimately reaches a terminal. Gates color env
    /// injection for subprocesses.
    pub fn is_terminal(&self) -> bool {
        match self {
            OutputSink::Standard => atty::is(atty::Stream::Stdout),
            OutputSink::Buffer(_) => false,
        }
    }

    /// Take the buffered bytes. Empty for the standard sink.
    pub fn drain(&self) -> Vec<u8> {
        match self {
            OutputSink::Standard => Vec::new(),
            OutputSink::Buffer(buf) => {
                let mut guard = match buf.lock() {
                    Ok(g) => g,
                    Err(poisoned) => poisoned.into_inner(),
                };
                std::mem::take(&mut *guard)
            }
        }
    }

    /// Buffered bytes as text, without draining. Empty for the standard
    /// sink.
    pub fn contents(&self) -> String {
        match self {
            OutputSink::Standard => String::new(),
            OutputSink::Buffer(buf) => {
                let guard = match buf.lock() {
                    Ok(g) => g,
                    Err(poisoned) => poisoned.into_inner(),
                };
                String::from_utf8_lossy(&guard).into_owned()
            }
        }
    }
}

/// Fixed-capacity byte ring keeping the last `cap` bytes pushed.
/// Used to capture subprocess stderr tails for failure reports.
#[derive(Debug)]
pub struct RingBuffer {
    inner: Mutex<VecDeque<u8>>,
    cap: usize,
}

impl RingBuffer {
    pub fn new(cap: usize) -> Arc<Self> {
        Arc::new(RingBuffer {
            inner: Mutex::new(VecDeque::with_capacity(cap)),
            cap,
        })
    }

    pub fn push(&self, data: &[u8]) {
        let mut guard = match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let data = if data.len() > self.cap {
            &data[data.len() - self.cap..]
        } else {
            data
        };
        let overflow = guard.len().saturating_add(data.len()).saturating_sub(self.cap);
        if overflow > 0 {
            guard.drain(..overflow);
        }
        guard.extend(data);
    }

    /// The retained tail as lossy UTF-8.
    pub fn tail(&self) -> String {
        let guard = match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let bytes: Vec<u8> = guard.iter().copied().collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_sink_accumulates_and_drains() {
        let sink = OutputSink::buffer();
        sink.line("=== lint");
        sink.write(b"output\n");
        assert_eq!(sink.contents(), "=== lint\noutput\n");
        assert_eq!(sink.drain(), b"=== lint\noutput\n".to_vec());
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn buffer_sink_is_never_a_terminal() {
        assert!(!OutputSink::buffer().is_terminal());
    }

    #[test]
    fn ring_keeps_only_the_tail() {
        let ring = RingBuffer::new(8);
        ring.push(b"0123456789");
        assert_eq!(ring.tail(), "23456789");
        ring.push(b"ab");
        assert_eq!(ring.tail(), "456789ab");
    }

    #[test]
    fn ring_accepts_oversized_pushes() {
        let ring = RingBuffer::new(4);
        ring.push(b"a long line of stderr");
        assert_eq!(ring.tail(), "derr");
    }
}
