//! Serialization helpers for node collections.
//!
//! JSON and CBOR read/write utilities with extension-based auto-detection.
//! Unknown/missing extensions are rejected for reads and default to JSON
//! for writes.
//!
//! Extras:
//! - In-memory CBOR helpers for single wire records: [`to_cbor`] / [`from_cbor`]
//! - Streaming helper: [`stream_nodes_auto`] returning a boxed iterator so
//!   callers can uniformly consume JSONL/NDJSON (true streaming) or JSON/CBOR
//!   (load-then-iterate) without caring about concrete iterator types.
//! - [`Validated`]: an adapter that runs [`Node::validate`] on every item.

use crate::error::{Error, Result};
use crate::types::Node;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Cursor, Write};
use std::path::Path;

/// Ensure the parent directory for a file exists (no-op if none).
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).map_err(|e| {
                Error::io(format!("creating parent directory {}", display(path)), e)
            })?;
        }
    }
    Ok(())
}

/// ------------------------------
/// Node (Vec) I/O
/// ------------------------------

/// Read `Vec<Node>` from **JSON**.
pub fn read_nodes_json<P: AsRef<Path>>(path: P) -> Result<Vec<Node>> {
    let path_ref = path.as_ref();
    let f = File::open(path_ref).map_err(|e| Error::io(format!("open {}", display(path_ref)), e))?;
    let rdr = BufReader::new(f);
    serde_json::from_reader(rdr)
        .map_err(|e| Error::malformed(None, format!("JSON nodes in {}: {e}", display(path_ref))))
}

/// Write `Vec<Node>` to **JSON** (pretty).
pub fn write_nodes_json<P: AsRef<Path>>(path: P, v: &[Node]) -> Result<()> {
    let path_ref = path.as_ref();
    ensure_parent_dir(path_ref)?;
    let f =
        File::create(path_ref).map_err(|e| Error::io(format!("create {}", display(path_ref)), e))?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer_pretty(&mut w, v)
        .map_err(|e| Error::io(format!("serialize JSON nodes to {}", display(path_ref)), e.into()))?;
    w.flush()
        .map_err(|e| Error::io(format!("flush {}", display(path_ref)), e))
}

/// Read `Vec<Node>` from **CBOR**.
pub fn read_nodes_cbor<P: AsRef<Path>>(path: P) -> Result<Vec<Node>> {
    let path_ref = path.as_ref();
    let f = File::open(path_ref).map_err(|e| Error::io(format!("open {}", display(path_ref)), e))?;
    let mut rdr = BufReader::new(f);
    ciborium::de::from_reader(&mut rdr)
        .map_err(|e| Error::malformed(None, format!("CBOR nodes in {}: {e}", display(path_ref))))
}

/// Write `Vec<Node>` to **CBOR**.
pub fn write_nodes_cbor<P: AsRef<Path>>(path: P, v: &[Node]) -> Result<()> {
    let path_ref = path.as_ref();
    ensure_parent_dir(path_ref)?;
    let f =
        File::create(path_ref).map_err(|e| Error::io(format!("create {}", display(path_ref)), e))?;
    let mut w = BufWriter::new(f);
    ciborium::ser::into_writer(v, &mut w).map_err(|e| {
        Error::io(
            format!("serialize CBOR nodes to {}", display(path_ref)),
            std::io::Error::other(e.to_string()),
        )
    })?;
    w.flush()
        .map_err(|e| Error::io(format!("flush {}", display(path_ref)), e))
}

/// Auto-detect read by extension `.json` / `.cbor` / `.jsonl` / `.ndjson`
/// (case-insensitive).
pub fn read_nodes_auto<P: AsRef<Path>>(path: P) -> Result<Vec<Node>> {
    match ext_lower(path.as_ref()).as_deref() {
        Some("json") => read_nodes_json(path),
        Some("cbor") => read_nodes_cbor(path),
        Some("jsonl" | "ndjson") => crate::io_jsonl::stream_nodes_jsonl(path)?.collect(),
        Some(other) => Err(Error::config(format!(
            "unsupported nodes extension: {other} (supported: .json, .cbor, .jsonl, .ndjson)"
        ))),
        None => Err(Error::config(
            "path has no extension (expected .json, .cbor, .jsonl, or .ndjson)",
        )),
    }
}

/// Auto-detect write (defaults to **JSON** if unknown or missing).
pub fn write_nodes_auto<P: AsRef<Path>>(path: P, v: &[Node]) -> Result<()> {
    match ext_lower(path.as_ref()).as_deref() {
        Some("cbor") => write_nodes_cbor(path, v),
        Some("jsonl" | "ndjson") => crate::io_jsonl::write_nodes_jsonl(path, v),
        _ => write_nodes_json(path, v),
    }
}

/// ------------------------------
/// Streaming helper (boxed iterator)
/// ------------------------------

/// Boxed, owning stream of decoded nodes.
pub type NodeStream = Box<dyn Iterator<Item = Result<Node>> + Send>;

/// Return a boxed iterator over `Node`s for the given path.
///
/// - **`.jsonl` / `.ndjson`**: true streaming via `io_jsonl::stream_nodes_jsonl`
///   (no materialization; one record in memory at a time).
/// - **`.json` / `.cbor`**: load the vector, then iterate (compat fallback).
pub fn stream_nodes_auto<P: AsRef<Path>>(path: P) -> Result<NodeStream> {
    // Own the path so the iterator type doesn't capture `P`.
    let pb = path.as_ref().to_owned();

    match ext_lower(&pb).as_deref() {
        Some("jsonl" | "ndjson") => {
            let it = crate::io_jsonl::stream_nodes_jsonl(pb)?;
            Ok(Box::new(it))
        }
        Some("json") => {
            let v = read_nodes_json(&pb)?;
            Ok(Box::new(v.into_iter().map(Ok)))
        }
        Some("cbor") => {
            let v = read_nodes_cbor(&pb)?;
            Ok(Box::new(v.into_iter().map(Ok)))
        }
        Some(other) => Err(Error::config(format!(
            "unsupported nodes extension: {other} (supported: .json, .cbor, .jsonl, .ndjson)"
        ))),
        None => Err(Error::config(
            "path has no extension (expected .json, .cbor, .jsonl, or .ndjson)",
        )),
    }
}

/// Iterator adapter that validates every decoded node against an address
/// space, tagging failures with the 1-based record position.
pub struct Validated<I> {
    inner: I,
    address_space: u64,
    position: usize,
}

impl<I> Validated<I> {
    /// Wrap `inner`.
    pub const fn new(inner: I, address_space: u64) -> Self {
        Self {
            inner,
            address_space,
            position: 0,
        }
    }
}

impl<I: Iterator<Item = Result<Node>>> Iterator for Validated<I> {
    type Item = Result<Node>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next()?;
        self.position += 1;
        Some(item.and_then(|n| {
            n.validate(self.address_space, Some(self.position))?;
            Ok(n)
        }))
    }
}

/// ------------------------------
/// In-memory CBOR helpers
/// ------------------------------

/// Serialize any `T: Serialize` to **CBOR bytes** using `ciborium`.
pub fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf).map_err(|e| {
        Error::io("serialize CBOR (to_cbor)", std::io::Error::other(e.to_string()))
    })?;
    Ok(buf)
}

/// Deserialize any `T: DeserializeOwned` from **CBOR bytes** using `ciborium`.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut cur = Cursor::new(bytes);
    ciborium::de::from_reader(&mut cur).map_err(|e| Error::malformed(None, format!("CBOR: {e}")))
}

/// Return the lowercase extension (without dot) if present.
pub(crate) fn ext_lower(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Human-friendly path display for error messages.
pub(crate) fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
