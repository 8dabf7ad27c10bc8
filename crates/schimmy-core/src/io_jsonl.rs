//! JSON Lines (NDJSON) helpers for streaming node I/O.
//!
//! Partition files and delta spills can be far larger than memory, so these
//! functions read and write one record per line:
//!
//! - **Reader**: an iterator that *owns* its underlying reader, yielding
//!   `Result<Node>` so callers can surface per-line errors with line numbers.
//! - **Writer**: [`JsonlWriter`] appends records incrementally; the slice
//!   helpers wrap it.
//!
//! # Formats
//! We treat both `.jsonl` and `.ndjson` as equivalent line-delimited JSON.

use crate::error::{Error, Result};
use crate::types::Node;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Owning JSONL iterator over `Node`.
///
/// Holds the file and buffered reader internally to avoid lifetime pitfalls
/// of returning a borrowed `Lines<'_>` iterator.
pub struct JsonlNodeIter {
    rdr: BufReader<File>,
    buf: String,
    line_no: usize,
}

impl JsonlNodeIter {
    fn new(file: File) -> Self {
        Self {
            rdr: BufReader::new(file),
            buf: String::with_capacity(1 << 10),
            line_no: 0,
        }
    }
}

impl Iterator for JsonlNodeIter {
    type Item = Result<Node>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.rdr.read_line(&mut self.buf) {
            Ok(0) => None, // EOF
            Ok(_) => {
                self.line_no += 1;
                let line = self.buf.trim_end_matches(['\n', '\r']);
                if line.is_empty() {
                    // A hole in a partition file is corruption, not padding.
                    return Some(Err(Error::malformed(Some(self.line_no), "empty line")));
                }
                Some(
                    serde_json::from_str(line)
                        .map_err(|e| Error::malformed(Some(self.line_no), e.to_string())),
                )
            }
            Err(e) => Some(Err(Error::io(format!("read line {}", self.line_no + 1), e))),
        }
    }
}

/// Stream read: one JSON object per line → yields `Node` items.
///
/// # Errors
/// Opening the file may fail. Individual iteration items may be `Err` if a
/// particular line is malformed.
pub fn stream_nodes_jsonl<P: AsRef<Path>>(path: P) -> Result<JsonlNodeIter> {
    let f = File::open(path.as_ref())
        .map_err(|e| Error::io(format!("open {}", path.as_ref().display()), e))?;
    Ok(JsonlNodeIter::new(f))
}

/// Incremental JSONL writer.
pub struct JsonlWriter {
    w: BufWriter<File>,
    path: PathBuf,
    written: usize,
}

impl JsonlWriter {
    /// Create (truncate) `path`, creating parent directories as needed.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_owned();
        crate::io::ensure_parent_dir(&path)?;
        let f = File::create(&path)
            .map_err(|e| Error::io(format!("create {}", path.display()), e))?;
        Ok(Self {
            w: BufWriter::new(f),
            path,
            written: 0,
        })
    }

    /// Append one record.
    pub fn write<T: Serialize>(&mut self, item: &T) -> Result<()> {
        serde_json::to_writer(&mut self.w, item).map_err(|e| {
            Error::io(format!("serialize record to {}", self.path.display()), e.into())
        })?;
        self.w
            .write_all(b"\n")
            .map_err(|e| Error::io(format!("write {}", self.path.display()), e))?;
        self.written += 1;
        Ok(())
    }

    /// Flush and return the number of records written.
    pub fn finish(mut self) -> Result<usize> {
        self.w
            .flush()
            .map_err(|e| Error::io(format!("flush {}", self.path.display()), e))?;
        Ok(self.written)
    }
}

/// Write nodes as JSON Lines (one object per line).
pub fn write_nodes_jsonl<P: AsRef<Path>>(path: P, nodes: &[Node]) -> Result<()> {
    write_jsonl(path, nodes)
}

/// Generic JSONL writer (handy for dumping other streams, e.g. volatile records).
pub fn write_jsonl<P: AsRef<Path>, T: Serialize>(path: P, items: &[T]) -> Result<()> {
    let mut w = JsonlWriter::create(path)?;
    for it in items {
        w.write(it)?;
    }
    w.finish().map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Status;
    use std::io::Write as _;

    fn tmp(name: &str) -> std::path::PathBuf {
        let mut p = std::env::temp_dir();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        p.push(format!("schimmy_core_jsonl_{name}_{nanos}.jsonl"));
        p
    }

    #[test]
    fn jsonl_iterator_streams() {
        let p = tmp("stream");
        {
            let mut f = File::create(&p).unwrap();
            writeln!(f, r#"{{"address":1,"status":"VULNERABLE"}}"#).unwrap();
            write!(f, "{}\r\n", r#"{"address":2,"status":"INFECTED","source":1}"#).unwrap();
        }
        let got: Vec<Node> = stream_nodes_jsonl(&p)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[1].status, Status::Infected);
        assert_eq!(got[1].source, Some(1));
        let _ = std::fs::remove_file(p);
    }

    #[test]
    fn malformed_line_fails_with_line_number() {
        let p = tmp("bad");
        {
            let mut f = File::create(&p).unwrap();
            writeln!(f, r#"{{"address":1,"status":"VULNERABLE"}}"#).unwrap();
            writeln!(f, r#"{{"address":2,"status":"ZOMBIE"}}"#).unwrap();
            writeln!(f).unwrap();
        }
        let items: Vec<_> = stream_nodes_jsonl(&p).unwrap().collect();
        assert!(items[0].is_ok());
        assert!(matches!(
            items[1],
            Err(Error::Deserialization { position: Some(2), .. })
        ));
        assert!(matches!(
            items[2],
            Err(Error::Deserialization { position: Some(3), .. })
        ));
        let _ = std::fs::remove_file(p);
    }

    #[test]
    fn writer_counts_records() {
        let p = tmp("writer");
        let mut w = JsonlWriter::create(&p).unwrap();
        w.write(&Node::new(1, Status::Immune)).unwrap();
        w.write(&Node::new(2, Status::Vulnerable)).unwrap();
        assert_eq!(w.finish().unwrap(), 2);
        assert_eq!(stream_nodes_jsonl(&p).unwrap().count(), 2);
        let _ = std::fs::remove_file(p);
    }
}
