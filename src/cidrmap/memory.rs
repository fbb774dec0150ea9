//! In-process CIDR map implementation.

use ahash::AHashSet;
use ipnet::IpNet;
use std::collections::BTreeSet;
use std::path::Path;

use super::{CidrMap, MapOpener};
use crate::error::CidrMapError;

/// Entry storage. Dynamic maps keep prefixes ordered like an LPM trie
/// enumerates them; fixed maps are plain hash sets.
#[derive(Debug)]
enum Entries {
    Lpm(BTreeSet<IpNet>),
    Hash(AHashSet<IpNet>),
}

/// MemoryCidrMap keeps a prefilter map entirely in process memory.
///
/// # Examples
/// ```
/// use prefilter::cidrmap::{CidrMap, MemoryCidrMap};
///
/// let mut map = MemoryCidrMap::new(32, true, 1024);
/// map.insert("10.0.0.0/8".parse().unwrap()).unwrap();
/// assert!(map.exists(&"10.0.0.0/8".parse().unwrap()));
/// ```
#[derive(Debug)]
pub struct MemoryCidrMap {
    prefix_bits: u8,
    dynamic: bool,
    max_entries: u32,
    entries: Entries,
}

impl MemoryCidrMap {
    /// Create an empty map.
    pub fn new(prefix_bits: u8, dynamic: bool, max_entries: u32) -> Self {
        let entries = if dynamic {
            Entries::Lpm(BTreeSet::new())
        } else {
            Entries::Hash(AHashSet::new())
        };
        Self {
            prefix_bits,
            dynamic,
            max_entries,
            entries,
        }
    }

    /// Validate a CIDR against this map's shape and return its canonical key.
    fn key(&self, cidr: IpNet) -> Result<IpNet, CidrMapError> {
        if cidr.max_prefix_len() != self.prefix_bits {
            return Err(CidrMapError::FamilyMismatch {
                expected: self.prefix_bits,
                actual: cidr.max_prefix_len(),
            });
        }
        if !self.dynamic && cidr.prefix_len() != self.prefix_bits {
            return Err(CidrMapError::PrefixLength {
                expected: self.prefix_bits,
                actual: cidr.prefix_len(),
            });
        }
        Ok(cidr.trunc())
    }

    fn contains(&self, key: &IpNet) -> bool {
        match &self.entries {
            Entries::Lpm(set) => set.contains(key),
            Entries::Hash(set) => set.contains(key),
        }
    }

    /// Get all entries.
    pub fn entries(&self) -> Vec<IpNet> {
        match &self.entries {
            Entries::Lpm(set) => set.iter().copied().collect(),
            Entries::Hash(set) => set.iter().copied().collect(),
        }
    }
}

impl CidrMap for MemoryCidrMap {
    fn insert(&mut self, cidr: IpNet) -> Result<(), CidrMapError> {
        let key = self.key(cidr)?;
        if self.contains(&key) {
            return Err(CidrMapError::KeyExists);
        }
        if self.len() >= self.max_entries as usize {
            return Err(CidrMapError::Full {
                max_entries: self.max_entries,
            });
        }
        match &mut self.entries {
            Entries::Lpm(set) => set.insert(key),
            Entries::Hash(set) => set.insert(key),
        };
        Ok(())
    }

    fn delete(&mut self, cidr: IpNet) -> Result<(), CidrMapError> {
        let key = self.key(cidr)?;
        let removed = match &mut self.entries {
            Entries::Lpm(set) => set.remove(&key),
            Entries::Hash(set) => set.remove(&key),
        };
        if removed {
            Ok(())
        } else {
            Err(CidrMapError::KeyNotFound)
        }
    }

    fn exists(&self, cidr: &IpNet) -> bool {
        match self.key(*cidr) {
            Ok(key) => self.contains(&key),
            Err(_) => false,
        }
    }

    fn dump(&self, to: &mut Vec<String>) {
        match &self.entries {
            Entries::Lpm(set) => to.extend(set.iter().map(|net| net.to_string())),
            Entries::Hash(set) => to.extend(set.iter().map(|net| net.to_string())),
        }
    }

    fn len(&self) -> usize {
        match &self.entries {
            Entries::Lpm(set) => set.len(),
            Entries::Hash(set) => set.len(),
        }
    }

    fn prefix_bits(&self) -> u8 {
        self.prefix_bits
    }

    fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    fn max_entries(&self) -> u32 {
        self.max_entries
    }
}

/// MemoryMapOpener creates fresh in-process maps; the path is only logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryMapOpener;

impl MapOpener for MemoryMapOpener {
    fn open_or_create(
        &self,
        path: &Path,
        prefix_bits: u8,
        dynamic: bool,
        max_entries: u32,
    ) -> Result<Box<dyn CidrMap>, CidrMapError> {
        log::debug!("Creating in-memory map {:?} ({} entries max)", path, max_entries);
        Ok(Box::new(MemoryCidrMap::new(prefix_bits, dynamic, max_entries)))
    }
}
