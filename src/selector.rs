//! Routing of CIDRs to their backing map.

use ipnet::IpNet;
use std::fmt;
use std::net::IpAddr;

use crate::config::{MAP_NAME_PREFIX, MAX_HASH_ENTRIES, MAX_LPM_ENTRIES};
use crate::error::{Error, Result};

/// Address width of IPv4 in bits.
pub const IPV4_BITS: u8 = 32;

/// Address width of IPv6 in bits.
pub const IPV6_BITS: u8 = 128;

/// One of the four prefilter maps, keyed by family and length class.
///
/// "Dynamic" maps hold true prefixes and back LPM lookups; "fixed" maps
/// hold full host addresses and are sized for far more entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum TableSlot {
    V4Dyn = 0,
    V4Fix = 1,
    V6Dyn = 2,
    V6Fix = 3,
}

impl TableSlot {
    /// Number of slots.
    pub const COUNT: usize = 4;

    /// All slots in dump order.
    pub const ALL: [TableSlot; Self::COUNT] = [
        TableSlot::V4Dyn,
        TableSlot::V4Fix,
        TableSlot::V6Dyn,
        TableSlot::V6Fix,
    ];

    /// Index of this slot into a `[_; TableSlot::COUNT]` array.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Select the slot for a CIDR.
    pub fn for_cidr(cidr: &IpNet) -> Option<Self> {
        select_slot(cidr.prefix_len(), cidr.max_prefix_len())
    }

    /// Address width of the family this slot holds.
    pub fn prefix_bits(self) -> u8 {
        match self {
            TableSlot::V4Dyn | TableSlot::V4Fix => IPV4_BITS,
            TableSlot::V6Dyn | TableSlot::V6Fix => IPV6_BITS,
        }
    }

    /// Whether this slot holds true prefixes rather than host addresses.
    pub fn is_dynamic(self) -> bool {
        matches!(self, TableSlot::V4Dyn | TableSlot::V6Dyn)
    }

    /// Capacity of the map backing this slot.
    pub fn max_entries(self) -> u32 {
        if self.is_dynamic() {
            MAX_LPM_ENTRIES
        } else {
            MAX_HASH_ENTRIES
        }
    }

    /// Short suffix naming this slot.
    pub fn as_str(&self) -> &'static str {
        match self {
            TableSlot::V4Dyn => "v4_dyn",
            TableSlot::V4Fix => "v4_fix",
            TableSlot::V6Dyn => "v6_dyn",
            TableSlot::V6Fix => "v6_fix",
        }
    }

    /// Name of the pinned map backing this slot.
    pub fn map_name(&self) -> String {
        format!("{}{}", MAP_NAME_PREFIX, self.as_str())
    }
}

impl fmt::Display for TableSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Map a CIDR's mask length (`ones`) and address width (`bits`) to a slot.
///
/// Returns `None` when `bits` is neither an IPv4 nor an IPv6 width.
pub fn select_slot(ones: u8, bits: u8) -> Option<TableSlot> {
    match bits {
        IPV4_BITS if ones == bits => Some(TableSlot::V4Fix),
        IPV4_BITS => Some(TableSlot::V4Dyn),
        IPV6_BITS if ones == bits => Some(TableSlot::V6Fix),
        IPV6_BITS => Some(TableSlot::V6Dyn),
        _ => None,
    }
}

/// Parse a CIDR, accepting a bare address as a host prefix.
///
/// Host bits beyond the mask are cleared, so `10.1.2.3/8` yields `10.0.0.0/8`.
pub fn parse_cidr(s: &str) -> Result<IpNet> {
    let s = s.trim();
    if let Ok(net) = s.parse::<IpNet>() {
        return Ok(net.trunc());
    }
    let addr: IpAddr = s.parse().map_err(|_| Error::InvalidCidr(s.to_string()))?;
    let prefix_len = if addr.is_ipv4() { IPV4_BITS } else { IPV6_BITS };
    IpNet::new(addr, prefix_len).map_err(|_| Error::InvalidCidr(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_slot_v4() {
        assert_eq!(select_slot(32, 32), Some(TableSlot::V4Fix));
        for ones in 0..32 {
            assert_eq!(select_slot(ones, 32), Some(TableSlot::V4Dyn));
        }
    }

    #[test]
    fn test_select_slot_v6() {
        assert_eq!(select_slot(128, 128), Some(TableSlot::V6Fix));
        for ones in 0..128 {
            assert_eq!(select_slot(ones, 128), Some(TableSlot::V6Dyn));
        }
    }

    #[test]
    fn test_select_slot_unsupported_width() {
        for bits in [0u8, 8, 16, 31, 33, 64, 127, 129, 255] {
            assert_eq!(select_slot(bits, bits), None);
            assert_eq!(select_slot(0, bits), None);
        }
    }

    #[test]
    fn test_for_cidr() {
        let cases = [
            ("10.0.0.0/24", TableSlot::V4Dyn),
            ("10.0.0.1/32", TableSlot::V4Fix),
            ("0.0.0.0/0", TableSlot::V4Dyn),
            ("2001:db8::/64", TableSlot::V6Dyn),
            ("2001:db8::1/128", TableSlot::V6Fix),
        ];
        for (cidr, slot) in cases {
            let net: IpNet = cidr.parse().unwrap();
            assert_eq!(TableSlot::for_cidr(&net), Some(slot), "{}", cidr);
        }
    }

    #[test]
    fn test_slot_attributes() {
        assert_eq!(TableSlot::V4Dyn.prefix_bits(), 32);
        assert_eq!(TableSlot::V6Fix.prefix_bits(), 128);
        assert!(TableSlot::V6Dyn.is_dynamic());
        assert!(!TableSlot::V4Fix.is_dynamic());
        assert_eq!(TableSlot::V4Dyn.max_entries(), MAX_LPM_ENTRIES);
        assert_eq!(TableSlot::V6Fix.max_entries(), MAX_HASH_ENTRIES);
        assert_eq!(TableSlot::V4Fix.map_name(), "prefilter_cidr_v4_fix");
        for (i, slot) in TableSlot::ALL.iter().enumerate() {
            assert_eq!(slot.index(), i);
        }
    }

    #[test]
    fn test_parse_cidr() {
        assert_eq!(
            parse_cidr(" 10.1.2.3/8 ").unwrap(),
            "10.0.0.0/8".parse::<IpNet>().unwrap()
        );
        assert_eq!(
            parse_cidr("192.168.1.1").unwrap(),
            "192.168.1.1/32".parse::<IpNet>().unwrap()
        );
        assert_eq!(
            parse_cidr("2001:db8::1").unwrap(),
            "2001:db8::1/128".parse::<IpNet>().unwrap()
        );
        assert!(parse_cidr("invalid").is_err());
        assert!(parse_cidr("10.0.0.0/33").is_err());
    }
}
