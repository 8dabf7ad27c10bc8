//! Error taxonomy for propagation jobs.
//!
//! Every variant is fatal for the task that raises it. A deterministic batch
//! merge has no meaningful local recovery for a single bad record: dropping it
//! would change the merged state of its address. Retrying a whole partition
//! round is the execution layer's business and is safe because emission and
//! merge are pure functions of their inputs.

use crate::types::{Address, PartitionId};
use thiserror::Error;

/// Result alias used throughout `schimmy-core`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the core model, codecs and partition bookkeeping.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid job configuration (network, partitions, ...).
    /// Surfaces before any round runs.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A wire record failed to decode or failed structural validation.
    #[error("malformed record{}: {reason}", fmt_position(*.position))]
    Deserialization {
        /// 1-based record position in its stream, when known.
        position: Option<usize>,
        /// What was wrong with it.
        reason: String,
    },

    /// A record reached a partition that does not own its address, or a
    /// snapshot was written under a different partition layout.
    #[error("partition mismatch: address {address} belongs to partition {expected}, found in {found}")]
    PartitionMismatch {
        /// Offending address.
        address: Address,
        /// Partition the partitioner assigns to `address`.
        expected: PartitionId,
        /// Partition the record was found in.
        found: PartitionId,
    },

    /// A record reached the merge of a different address.
    #[error("record for address {found} routed to the merge of address {key}")]
    Misrouted {
        /// Address being merged.
        key: Address,
        /// Address the stray record carries.
        found: Address,
    },

    /// Snapshot layout recorded on disk disagrees with the running job.
    #[error("snapshot layout mismatch: {0}")]
    LayoutMismatch(String),

    /// Two records claim the same address inside one snapshot.
    #[error("duplicate address {0} in snapshot")]
    DuplicateAddress(Address),

    /// Underlying I/O failure while reading or writing records.
    #[error("{context}: {source}")]
    Io {
        /// What was being attempted (usually includes a path).
        context: String,
        /// The OS error.
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Shorthand for a [`Error::Deserialization`] at a known position.
    #[must_use]
    pub fn malformed(position: Option<usize>, reason: impl Into<String>) -> Self {
        Self::Deserialization {
            position,
            reason: reason.into(),
        }
    }

    /// Wrap an I/O error with a short description of the attempted action.
    #[must_use]
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Shorthand for [`Error::Configuration`].
    #[must_use]
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }
}

fn fmt_position(position: Option<usize>) -> String {
    position.map_or_else(String::new, |p| format!(" #{p}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let e = Error::malformed(Some(7), "address 300 outside address space 256");
        assert_eq!(
            e.to_string(),
            "malformed record #7: address 300 outside address space 256"
        );

        let e = Error::malformed(None, "bad cbor");
        assert_eq!(e.to_string(), "malformed record: bad cbor");

        let e = Error::PartitionMismatch {
            address: 99,
            expected: 3,
            found: 1,
        };
        assert!(e.to_string().contains("belongs to partition 3"));
    }
}
