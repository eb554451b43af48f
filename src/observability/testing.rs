//! Sinks used by unit tests.

use std::io;
use std::sync::{Arc, Mutex};

use super::sink::Sink;

/// Keeps written lines in memory; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl Sink for MemorySink {
    fn write_line(&self, line: &str) -> io::Result<()> {
        self.lines.lock().unwrap().push(line.to_string());
        Ok(())
    }
}

/// Fails every write.
#[derive(Debug, Clone, Copy)]
pub struct FailingSink;

impl Sink for FailingSink {
    fn write_line(&self, _line: &str) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Other, "disk full"))
    }
}
