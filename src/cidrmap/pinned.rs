//! File-pinned CIDR map implementation.
//!
//! A pinned map outlives the process that created it. Its content lives in
//! a JSON document at the pin path:
//!
//! ```text
//! {
//!   "prefix_bits": 32,
//!   "dynamic": true,
//!   "max_entries": 65536,
//!   "entries": ["10.0.0.0/8", "192.168.0.0/16"]
//! }
//! ```
//!
//! Every mutation is written to a temporary file and renamed over the pin,
//! so readers never observe a torn file.

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{CidrMap, MapOpener, MemoryCidrMap};
use crate::error::CidrMapError;

/// On-disk representation of a pinned map.
#[derive(Debug, Serialize, Deserialize)]
struct PinnedMapFile {
    prefix_bits: u8,
    dynamic: bool,
    max_entries: u32,
    entries: Vec<IpNet>,
}

/// PinnedCidrMap is a CIDR map persisted at a pin path.
#[derive(Debug)]
pub struct PinnedCidrMap {
    path: PathBuf,
    map: MemoryCidrMap,
}

impl PinnedCidrMap {
    /// Open the map pinned at `path`, or create and pin an empty one.
    ///
    /// An existing pin must have been created with the same attributes.
    pub fn open_or_create(
        path: &Path,
        prefix_bits: u8,
        dynamic: bool,
        max_entries: u32,
    ) -> Result<Self, CidrMapError> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let pinned = Self {
                path: path.to_path_buf(),
                map: MemoryCidrMap::new(prefix_bits, dynamic, max_entries),
            };
            pinned.persist()?;
            log::info!("Created pinned map {:?}", path);
            return Ok(pinned);
        }

        let content = fs::read_to_string(path)?;
        let file: PinnedMapFile = serde_json::from_str(&content)?;
        if file.prefix_bits != prefix_bits
            || file.dynamic != dynamic
            || file.max_entries != max_entries
        {
            return Err(CidrMapError::Incompatible(format!(
                "{:?} has prefix_bits={} dynamic={} max_entries={}, want {} {} {}",
                path,
                file.prefix_bits,
                file.dynamic,
                file.max_entries,
                prefix_bits,
                dynamic,
                max_entries
            )));
        }

        let mut map = MemoryCidrMap::new(prefix_bits, dynamic, max_entries);
        for cidr in file.entries {
            map.insert(cidr)?;
        }
        log::debug!("Opened pinned map {:?} ({} entries)", path, map.len());

        Ok(Self {
            path: path.to_path_buf(),
            map,
        })
    }

    /// Get the pin path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Write the current content to the pin path atomically.
    fn persist(&self) -> Result<(), CidrMapError> {
        let file = PinnedMapFile {
            prefix_bits: self.map.prefix_bits(),
            dynamic: self.map.is_dynamic(),
            max_entries: self.map.max_entries(),
            entries: self.map.entries(),
        };
        let content = serde_json::to_vec_pretty(&file)?;

        let temp_path = self.temp_path();
        let mut temp_file = fs::File::create(&temp_path)?;
        temp_file.write_all(&content)?;
        temp_file.sync_all()?;
        drop(temp_file);

        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl CidrMap for PinnedCidrMap {
    fn insert(&mut self, cidr: IpNet) -> Result<(), CidrMapError> {
        self.map.insert(cidr)?;
        if let Err(e) = self.persist() {
            let _ = self.map.delete(cidr);
            return Err(e);
        }
        Ok(())
    }

    fn delete(&mut self, cidr: IpNet) -> Result<(), CidrMapError> {
        self.map.delete(cidr)?;
        if let Err(e) = self.persist() {
            let _ = self.map.insert(cidr);
            return Err(e);
        }
        Ok(())
    }

    fn exists(&self, cidr: &IpNet) -> bool {
        self.map.exists(cidr)
    }

    fn dump(&self, to: &mut Vec<String>) {
        self.map.dump(to)
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn prefix_bits(&self) -> u8 {
        self.map.prefix_bits()
    }

    fn is_dynamic(&self) -> bool {
        self.map.is_dynamic()
    }

    fn max_entries(&self) -> u32 {
        self.map.max_entries()
    }
}

/// PinnedMapOpener opens maps pinned on the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct PinnedMapOpener;

impl MapOpener for PinnedMapOpener {
    fn open_or_create(
        &self,
        path: &Path,
        prefix_bits: u8,
        dynamic: bool,
        max_entries: u32,
    ) -> Result<Box<dyn CidrMap>, CidrMapError> {
        let map = PinnedCidrMap::open_or_create(path, prefix_bits, dynamic, max_entries)?;
        Ok(Box::new(map))
    }
}
