//! The TTL / ValueType regime.
//!
//! The overlay expires stored values per class. Unknown classes fall back
//! to a ~10 minute default, so publishers and receiving nodes must agree
//! on the registered set: [`register_standard_value_types`] runs at every
//! startup, client and node alike. Skipping it makes published identities
//! evaporate within minutes.

use sigil_core::constants::{
    ALIAS_TTL_SECS, IDENTITY_TTL_SECS, MEDIUM_TTL_SECS,
};
use sigil_core::error::SigilError;

use crate::overlay::Overlay;

/// Expiry classes understood by every Sigil node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueClass {
    /// Identity records, profiles, and other activity-refreshed data.
    SevenDay,
    /// Medium-term caches.
    ThirtyDay,
    /// Name aliases and other year-scale mappings.
    YearLong,
}

impl ValueClass {
    /// Wire id of the class. Ids are part of the overlay protocol.
    pub const fn id(self) -> u16 {
        match self {
            ValueClass::SevenDay => 0x1001,
            ValueClass::YearLong => 0x1002,
            ValueClass::ThirtyDay => 0x1003,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ValueClass::SevenDay => "TYPE_7DAY",
            ValueClass::ThirtyDay => "TYPE_30DAY",
            ValueClass::YearLong => "TYPE_365DAY",
        }
    }

    pub const fn expiry_secs(self) -> u64 {
        match self {
            ValueClass::SevenDay => IDENTITY_TTL_SECS,
            ValueClass::ThirtyDay => MEDIUM_TTL_SECS,
            ValueClass::YearLong => ALIAS_TTL_SECS,
        }
    }

    pub fn from_id(id: u16) -> Option<Self> {
        match id {
            0x1001 => Some(ValueClass::SevenDay),
            0x1002 => Some(ValueClass::YearLong),
            0x1003 => Some(ValueClass::ThirtyDay),
            _ => None,
        }
    }

    /// Map a requested TTL to the smallest class that covers it. Zero
    /// (unspecified) and anything within a week map to the 7-day class;
    /// a TTL beyond a year still gets the largest class we have.
    pub fn covering(ttl_secs: u64) -> Self {
        if ttl_secs <= IDENTITY_TTL_SECS {
            ValueClass::SevenDay
        } else if ttl_secs <= MEDIUM_TTL_SECS {
            ValueClass::ThirtyDay
        } else {
            ValueClass::YearLong
        }
    }

    pub const ALL: [ValueClass; 3] =
        [ValueClass::SevenDay, ValueClass::ThirtyDay, ValueClass::YearLong];
}

/// Register the full class set on an overlay. Call at every startup,
/// before the first publish or bootstrap.
pub fn register_standard_value_types<O: Overlay>(overlay: &O) -> Result<(), SigilError> {
    for class in ValueClass::ALL {
        overlay.register_value_type(class.id(), class.name(), class.expiry_secs())?;
    }
    Ok(())
}
