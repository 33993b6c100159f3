#![allow(dead_code)]

use std::io;

/// An in-memory sink that starts failing after a number of writes.
pub struct Writer {
    buf: Vec<u8>,
    writes: usize,
    max_writes: Option<usize>,
}

impl Writer {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            writes: 0,
            max_writes: None,
        }
    }

    pub fn with_max(max_writes: usize) -> Self {
        Self {
            max_writes: Some(max_writes),
            ..Self::new()
        }
    }

    #[track_caller]
    pub fn into_string(self) -> String {
        String::from_utf8(self.buf).unwrap()
    }
}

impl io::Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writes += 1;
        if self.max_writes.is_some_and(|max| self.writes > max) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"));
        }
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
