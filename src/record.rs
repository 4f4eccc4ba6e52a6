//! The unit of output: where a document came from plus its body.

use std::io::{self, BufRead, Cursor, Read, Seek, SeekFrom};

use crate::consts::STDIN;

/// An exclusively-owned, rewindable document body.
///
/// Any read can be followed by a seek to the start that yields the same
/// bytes again. Dropping the body releases it.
#[derive(Debug)]
pub struct RecordBody {
    inner: Cursor<Vec<u8>>,
}

impl RecordBody {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            inner: Cursor::new(bytes.into()),
        }
    }

    /// Total size of the body in bytes, independent of the read position.
    pub fn len(&self) -> usize {
        self.inner.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<String> for RecordBody {
    fn from(body: String) -> Self {
        Self::new(body.into_bytes())
    }
}

impl Read for RecordBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl BufRead for RecordBody {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt)
    }
}

impl Seek for RecordBody {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

/// One document handed to the consumer. The consumer owns the body.
#[derive(Debug)]
pub struct Record {
    pub body: RecordBody,
}

impl Record {
    /// A record whose body was built in memory from a row, not read from a file.
    pub fn in_memory(body: RecordBody) -> Self {
        Self { body }
    }

    /// The path crawlers expect. Bodies built from rows have no file, so this is `STDIN`.
    pub fn path(&self) -> &'static str {
        STDIN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEATURE: &str = r#"{"type":"Feature","properties":{"wof:id":1}}"#;

    #[test]
    fn read_rewind_read_is_identical() {
        let mut body = RecordBody::from(FEATURE.to_string());

        let mut first = String::new();
        body.read_to_string(&mut first).unwrap();
        body.rewind().unwrap();
        let mut second = String::new();
        body.read_to_string(&mut second).unwrap();

        assert_eq!(first, FEATURE);
        assert_eq!(first, second);
    }

    #[test]
    fn partial_read_then_rewind() {
        let mut body = RecordBody::new(FEATURE);
        let mut head = [0u8; 8];
        body.read_exact(&mut head).unwrap();
        assert_eq!(&head, b"{\"type\":");

        body.seek(SeekFrom::Start(0)).unwrap();
        let mut all = Vec::new();
        body.read_to_end(&mut all).unwrap();
        assert_eq!(all, FEATURE.as_bytes());
    }

    #[test]
    fn len_ignores_position() {
        let mut body = RecordBody::new("abc");
        let mut sink = Vec::new();
        body.read_to_end(&mut sink).unwrap();
        assert_eq!(body.len(), 3);
        assert!(!body.is_empty());
        assert!(RecordBody::new(Vec::new()).is_empty());
    }

    #[test]
    fn in_memory_records_use_stdin_marker() {
        let record = Record::in_memory(RecordBody::new("{}"));
        assert_eq!(record.path(), STDIN);
    }
}
