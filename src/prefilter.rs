//! Revisioned, all-or-nothing batch updates over the four prefilter maps.

use ipnet::IpNet;
use parking_lot::RwLock;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::cidrmap::{CidrMap, MapOpener, PinnedMapOpener};
use crate::config::{FilterFeatures, PreFilterConfig, MAX_HASH_ENTRIES, MAX_LPM_ENTRIES};
use crate::error::{Error, Result};
use crate::selector::TableSlot;

type Maps = [Option<Box<dyn CidrMap>>; TableSlot::COUNT];

/// A single applied change, recorded so it can be reverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Inserted(TableSlot, IpNet),
    Deleted(TableSlot, IpNet),
}

/// Changes applied so far in one batch.
#[derive(Debug, Default)]
struct UndoLog {
    steps: Vec<Step>,
}

impl UndoLog {
    fn record(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// Revert every recorded step, newest first.
    ///
    /// A step that fails to revert is logged and skipped; the maps then
    /// diverge from the revision they claim.
    fn rollback(self, maps: &mut Maps) {
        for step in self.steps.into_iter().rev() {
            let (slot, cidr, result) = match step {
                Step::Inserted(slot, cidr) => match maps[slot.index()].as_mut() {
                    Some(map) => (slot, cidr, map.delete(cidr)),
                    None => continue,
                },
                Step::Deleted(slot, cidr) => match maps[slot.index()].as_mut() {
                    Some(map) => (slot, cidr, map.insert(cidr)),
                    None => continue,
                },
            };
            if let Err(e) = result {
                log::error!("Failed to roll back {} in map {}: {}", cidr, slot, e);
            }
        }
    }
}

/// Maps and revision, guarded together.
struct State {
    maps: Maps,
    revision: u64,
    initialized: bool,
}

impl State {
    fn check_revision(&self, expected: u64) -> Result<()> {
        if expected != 0 && expected != self.revision {
            return Err(Error::StaleRevision {
                current: self.revision,
                expected,
            });
        }
        Ok(())
    }

    fn map(&self, cidr: IpNet) -> Result<&dyn CidrMap> {
        TableSlot::for_cidr(&cidr)
            .and_then(|slot| self.maps[slot.index()].as_deref())
            .ok_or(Error::NoMap(cidr))
    }

    fn map_mut(&mut self, cidr: IpNet) -> Result<(TableSlot, &mut Box<dyn CidrMap>)> {
        let slot = TableSlot::for_cidr(&cidr).ok_or(Error::NoMap(cidr))?;
        let map = self.maps[slot.index()]
            .as_mut()
            .ok_or(Error::NoMap(cidr))?;
        Ok((slot, map))
    }

    fn apply_inserts(&mut self, cidrs: &[IpNet], undo: &mut UndoLog) -> Result<()> {
        for cidr in cidrs.iter().map(IpNet::trunc) {
            let (slot, map) = self.map_mut(cidr)?;
            map.insert(cidr)
                .map_err(|source| Error::Insert { cidr, source })?;
            undo.record(Step::Inserted(slot, cidr));
        }
        Ok(())
    }

    fn apply_deletes(&mut self, cidrs: &[IpNet], undo: &mut UndoLog) -> Result<()> {
        for cidr in cidrs.iter().map(IpNet::trunc) {
            let (slot, map) = self.map_mut(cidr)?;
            map.delete(cidr)
                .map_err(|source| Error::Delete { cidr, source })?;
            undo.record(Step::Deleted(slot, cidr));
        }
        Ok(())
    }
}

/// PreFilter owns the CIDR maps consulted by the XDP prefilter.
///
/// CIDRs are routed to one of four maps by family and length class.
/// Batches are applied under a single exclusive lock and either commit as a
/// whole, advancing the revision by one, or are rolled back.
///
/// # Examples
/// ```
/// use prefilter::{cidrmap::MemoryMapOpener, PreFilter, PreFilterConfig};
///
/// let prefilter = PreFilter::new(&PreFilterConfig::new(true), Box::new(MemoryMapOpener));
/// prefilter.start().unwrap();
///
/// let revision = prefilter
///     .insert(0, &["10.0.0.0/24".parse().unwrap()])
///     .unwrap();
/// assert_eq!(revision, 2);
///
/// let (cidrs, revision) = prefilter.dump(Vec::new());
/// assert_eq!(cidrs, vec!["10.0.0.0/24"]);
/// assert_eq!(revision, 2);
/// ```
pub struct PreFilter {
    enabled: bool,
    pin_dir: PathBuf,
    opener: Box<dyn MapOpener>,
    state: RwLock<State>,
}

impl PreFilter {
    /// Create a prefilter. Maps are not opened until [`start`](Self::start).
    pub fn new(config: &PreFilterConfig, opener: Box<dyn MapOpener>) -> Self {
        Self {
            enabled: config.enable_xdp_prefilter,
            pin_dir: config.pin_dir.clone(),
            opener,
            state: RwLock::new(State {
                maps: Default::default(),
                revision: 1,
                initialized: false,
            }),
        }
    }

    /// Create a prefilter over maps pinned under the configured directory and
    /// start it.
    pub fn open(config: &PreFilterConfig) -> Result<Self> {
        let prefilter = Self::new(config, Box::new(PinnedMapOpener));
        prefilter.start()?;
        Ok(prefilter)
    }

    /// Open or create the four maps.
    ///
    /// Runs once; later calls do nothing. A disabled prefilter never opens
    /// its maps. If any map fails to open, none are installed.
    pub fn start(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let mut state = self.state.write();
        if state.initialized {
            log::debug!("Prefilter maps already initialized");
            return Ok(());
        }

        let mut maps: Maps = Default::default();
        for slot in TableSlot::ALL {
            let path = self.pin_dir.join(slot.map_name());
            let map = self
                .opener
                .open_or_create(&path, slot.prefix_bits(), slot.is_dynamic(), slot.max_entries())
                .map_err(|source| Error::OpenMap { path, source })?;
            maps[slot.index()] = Some(map);
        }

        state.maps = maps;
        state.initialized = true;
        log::info!("Prefilter maps initialized under {:?}", self.pin_dir);
        Ok(())
    }

    /// Whether the prefilter is enabled.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Current revision, or 0 if disabled.
    pub fn revision(&self) -> u64 {
        if !self.enabled {
            return 0;
        }
        self.state.read().revision
    }

    /// Insert a batch of CIDRs.
    ///
    /// `revision` must equal the current revision, or be 0 to skip the check.
    /// On success the new revision is returned. On failure every CIDR inserted
    /// by this call is deleted again and the revision is unchanged.
    pub fn insert(&self, revision: u64, cidrs: &[IpNet]) -> Result<u64> {
        if !self.enabled {
            return Err(Error::Disabled);
        }

        let mut state = self.state.write();
        state.check_revision(revision)?;

        let mut undo = UndoLog::default();
        match state.apply_inserts(cidrs, &mut undo) {
            Ok(()) => {
                state.revision += 1;
                log::debug!(
                    "Inserted {} CIDRs, revision now {}",
                    cidrs.len(),
                    state.revision
                );
                Ok(state.revision)
            }
            Err(e) => {
                log::warn!("Rolling back insert of {} CIDRs: {}", cidrs.len(), e);
                undo.rollback(&mut state.maps);
                Err(e)
            }
        }
    }

    /// Delete a batch of CIDRs.
    ///
    /// Every CIDR must exist before anything is deleted. If a delete then
    /// fails, the CIDRs deleted by this call are re-inserted and the revision
    /// is unchanged.
    pub fn delete(&self, revision: u64, cidrs: &[IpNet]) -> Result<u64> {
        if !self.enabled {
            return Err(Error::Disabled);
        }

        let mut state = self.state.write();
        state.check_revision(revision)?;

        for cidr in cidrs.iter().map(IpNet::trunc) {
            if !state.map(cidr)?.exists(&cidr) {
                return Err(Error::NoEntry(cidr));
            }
        }

        let mut undo = UndoLog::default();
        match state.apply_deletes(cidrs, &mut undo) {
            Ok(()) => {
                state.revision += 1;
                log::debug!(
                    "Deleted {} CIDRs, revision now {}",
                    cidrs.len(),
                    state.revision
                );
                Ok(state.revision)
            }
            Err(e) => {
                log::warn!("Rolling back delete of {} CIDRs: {}", cidrs.len(), e);
                undo.rollback(&mut state.maps);
                Err(e)
            }
        }
    }

    /// Append the entries of all maps to `to` and return it with the revision
    /// they belong to.
    ///
    /// Maps are dumped in slot order: v4 dynamic, v4 fixed, v6 dynamic,
    /// v6 fixed. A disabled prefilter returns `to` unchanged and revision 0.
    pub fn dump(&self, mut to: Vec<String>) -> (Vec<String>, u64) {
        if !self.enabled {
            return (to, 0);
        }

        let state = self.state.read();
        for slot in TableSlot::ALL {
            if let Some(map) = &state.maps[slot.index()] {
                map.dump(&mut to);
            }
        }
        (to, state.revision)
    }

    /// Write the datapath header definitions for map capacities and features.
    pub fn write_config<W: Write>(&self, mut w: W) -> io::Result<()> {
        writeln!(w, "#define CIDR4_HMAP_ELEMS {}", MAX_HASH_ENTRIES)?;
        writeln!(w, "#define CIDR4_LMAP_ELEMS {}", MAX_LPM_ENTRIES)?;
        for name in FilterFeatures::all().names() {
            writeln!(w, "#define {}", name)?;
        }
        Ok(())
    }
}
