//! Error types for the workload engine.
//!
//! Loading and sampling failures are fatal to a run: the driver propagates
//! them up to the binary, which exits non-zero with the full error chain.
//! Degenerate throughput (zero count or zero elapsed time) is not an error
//! and never surfaces here.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by key loading and key sampling.
#[derive(Debug, Error)]
pub enum BenchError {
    /// The key file could not be opened.
    #[error("failed to open key file {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An I/O error occurred while reading the key file.
    #[error("failed to read key file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The key file holds fewer bytes than the configured key count needs.
    #[error(
        "key file {} is truncated: {count} keys need {expected_bytes} bytes, found {actual_bytes}",
        path.display()
    )]
    Truncated {
        path: PathBuf,
        count: usize,
        expected_bytes: u64,
        actual_bytes: u64,
    },

    /// A key file could not be written.
    #[error("failed to write key file {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Sampling was requested before any key was live.
    #[error("cannot sample keys: no keys have been inserted yet")]
    EmptySample,

    /// The live prefix extends past the loaded keys.
    #[error("live prefix of {live} keys exceeds the {available} loaded keys")]
    LivePrefixOutOfRange { live: usize, available: usize },
}

pub type Result<T> = std::result::Result<T, BenchError>;
