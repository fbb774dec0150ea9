//! Error types for prefilter.

use ipnet::IpNet;
use std::path::PathBuf;
use thiserror::Error;

/// Error type for prefilter operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The prefilter was constructed disabled
    #[error("prefilter is not enabled")]
    Disabled,

    /// Caller's expected revision does not match the current one
    #[error("latest revision is {current} not {expected}")]
    StaleRevision { current: u64, expected: u64 },

    /// No map is configured for the CIDR's family/length class
    #[error("no map enabled for CIDR {0}")]
    NoMap(IpNet),

    /// CIDR to delete is not present in its map
    #[error("no map entry for CIDR {0}")]
    NoEntry(IpNet),

    /// Underlying map insert failed
    #[error("error inserting CIDR {cidr}: {source}")]
    Insert {
        cidr: IpNet,
        #[source]
        source: CidrMapError,
    },

    /// Underlying map delete failed
    #[error("error deleting CIDR {cidr}: {source}")]
    Delete {
        cidr: IpNet,
        #[source]
        source: CidrMapError,
    },

    /// Opening or creating a backing map failed
    #[error("error opening map {path:?}: {source}")]
    OpenMap {
        path: PathBuf,
        #[source]
        source: CidrMapError,
    },

    /// Invalid CIDR notation
    #[error("invalid CIDR: {0}")]
    InvalidCidr(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for prefilter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for single-key CIDR map operations.
#[derive(Error, Debug)]
pub enum CidrMapError {
    /// Key is already present
    #[error("key already exists")]
    KeyExists,

    /// Key is not present
    #[error("key not found")]
    KeyNotFound,

    /// Map is at capacity
    #[error("map is full ({max_entries} entries)")]
    Full { max_entries: u32 },

    /// Prefix belongs to the other address family
    #[error("prefix width {actual} does not match map width {expected}")]
    FamilyMismatch { expected: u8, actual: u8 },

    /// Fixed-length map given a non-host prefix
    #[error("fixed-length map only holds /{expected} prefixes, got /{actual}")]
    PrefixLength { expected: u8, actual: u8 },

    /// Pinned map exists with different attributes
    #[error("pinned map is incompatible: {0}")]
    Incompatible(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Pinned map content could not be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
