//! Prefilter - control plane for XDP prefilter CIDR maps.
//!
//! The XDP fast path drops traffic from prefixes listed in four side-loaded
//! maps: IPv4 and IPv6, each split into a "dynamic" LPM map for true
//! prefixes and a "fixed" hash map for host addresses. This crate owns
//! those maps and updates them in batches.
//!
//! # Features
//!
//! - **Routing**: each CIDR lands in exactly one map, chosen by family and
//!   whether it is a full host address
//! - **Revisions**: every committed batch advances a revision counter; callers
//!   can make a batch conditional on the revision they last saw
//! - **All-or-nothing batches**: the maps only offer single-key operations,
//!   so a failed batch is undone step by step
//! - **Consistent dumps**: all four maps are enumerated under one shared lock
//! - **Header emission**: map capacities and feature markers for the datapath
//!   build
//!
//! # Quick Start
//!
//! ```
//! use prefilter::{cidrmap::MemoryMapOpener, parse_cidr, PreFilter, PreFilterConfig};
//!
//! let prefilter = PreFilter::new(&PreFilterConfig::new(true), Box::new(MemoryMapOpener));
//! prefilter.start()?;
//!
//! let cidrs = vec![parse_cidr("10.0.0.0/24")?, parse_cidr("2001:db8::1")?];
//! let revision = prefilter.insert(0, &cidrs)?;
//!
//! // Conditional on the revision just observed
//! prefilter.delete(revision, &cidrs[..1])?;
//!
//! let (entries, _) = prefilter.dump(Vec::new());
//! assert_eq!(entries, vec!["2001:db8::1/128"]);
//! # Ok::<(), prefilter::Error>(())
//! ```

mod config;
mod error;
mod prefilter;
mod selector;

pub mod cidrmap;

// Re-export core types
pub use config::{
    FilterFeatures, PreFilterConfig, DEFAULT_PIN_DIR, MAP_NAME_PREFIX, MAX_HASH_ENTRIES,
    MAX_LPM_ENTRIES,
};
pub use error::{CidrMapError, Error, Result};
pub use prefilter::PreFilter;
pub use selector::{parse_cidr, select_slot, TableSlot, IPV4_BITS, IPV6_BITS};
