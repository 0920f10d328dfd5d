use std::{
    collections::VecDeque,
    io,
    sync::{Arc, Mutex},
};

use tracing_subscriber::fmt::writer::MakeWriter;

/// Bounded in-memory buffer of recent formatted log lines.
///
/// When the buffer is full the oldest line is dropped, so out-of-band
/// subscribers always see the newest `capacity` lines and never block the
/// logging path.
#[derive(Debug, Clone)]
pub struct LogRing {
    inner: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl LogRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn push(&self, line: String) {
        let mut buf = self.inner.lock().expect("log ring lock");
        if buf.len() == self.capacity {
            buf.pop_front();
        }
        buf.push_back(line);
    }

    /// Snapshot of the buffered lines, oldest first.
    pub fn recent(&self) -> Vec<String> {
        self.inner
            .lock()
            .expect("log ring lock")
            .iter()
            .cloned()
            .collect()
    }
}

impl<'a> MakeWriter<'a> for LogRing {
    type Writer = RingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        RingWriter { ring: self.clone() }
    }
}

pub struct RingWriter {
    ring: LogRing,
}

impl io::Write for RingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let line = String::from_utf8_lossy(buf);
        let line = line.trim_end();
        if !line.is_empty() {
            self.ring.push(line.to_string());
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn drops_oldest_when_full() {
        let ring = LogRing::new(2);
        ring.push("a".to_string());
        ring.push("b".to_string());
        ring.push("c".to_string());
        assert_eq!(ring.recent(), vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn writer_strips_trailing_newline() {
        use std::io::Write;

        let ring = LogRing::new(5);
        let mut w = ring.make_writer();
        w.write_all(b"hello world\n").unwrap();
        assert_eq!(ring.recent(), vec!["hello world".to_string()]);
    }
}
