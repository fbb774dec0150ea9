//! CIDR maps backing the prefilter.
//!
//! Each map holds the prefixes of one address family and one length class
//! and offers single-key operations only. Multi-key atomicity is built on
//! top of them by [`PreFilter`](crate::PreFilter).

mod memory;
mod pinned;

pub use memory::{MemoryCidrMap, MemoryMapOpener};
pub use pinned::{PinnedCidrMap, PinnedMapOpener};

use ipnet::IpNet;
use std::path::Path;

use crate::error::CidrMapError;

/// CidrMap is the single-key interface of one prefilter map.
pub trait CidrMap: Send + Sync {
    /// Insert a CIDR. Fails if it is already present or the map is full.
    fn insert(&mut self, cidr: IpNet) -> Result<(), CidrMapError>;

    /// Delete a CIDR. Fails if it is not present.
    fn delete(&mut self, cidr: IpNet) -> Result<(), CidrMapError>;

    /// Check whether a CIDR is present.
    fn exists(&self, cidr: &IpNet) -> bool;

    /// Append every entry as a canonical `addr/len` string.
    fn dump(&self, to: &mut Vec<String>);

    /// Number of entries.
    fn len(&self) -> usize;

    /// Check if the map has no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Address width of the keys in bits.
    fn prefix_bits(&self) -> u8;

    /// Whether the map holds true prefixes (LPM) rather than host addresses.
    fn is_dynamic(&self) -> bool;

    /// Capacity of the map.
    fn max_entries(&self) -> u32;
}

/// MapOpener opens an existing map or creates it if missing.
pub trait MapOpener: Send + Sync {
    /// Open the map at `path`, creating it with the given attributes if needed.
    fn open_or_create(
        &self,
        path: &Path,
        prefix_bits: u8,
        dynamic: bool,
        max_entries: u32,
    ) -> Result<Box<dyn CidrMap>, CidrMapError>;
}
