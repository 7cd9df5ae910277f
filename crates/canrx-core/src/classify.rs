//! Filter classification.
//!
//! Every registered filter lands in exactly one bucket of a registry. The
//! bucket decides how much work dispatch has to do per frame: the exact-id
//! buckets need no comparison at all, the catch-all bucket no mask test.

use std::fmt;

use canrx_frame::{
    Filter, EFF_FLAG, EFF_MASK, EFF_RTR_FLAGS, ERR_FLAG, ERR_MASK, INV_FILTER, RTR_FLAG, SFF_MASK,
};
use serde::Serialize;

/// Number of standard-id buckets, one per 11-bit identifier.
pub const SFF_BUCKETS: usize = 1 << 11;

/// Where a receiver is stored in a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    /// Mask is zero: every non-error frame.
    All,
    /// Generic `frame.id & mask == id` test.
    Filtered,
    /// Generic `frame.id & mask != id` test.
    Inverted,
    /// Error frames, matched by error class.
    Error,
    /// One exact non-remote extended identifier.
    ExactExtended,
    /// One exact non-remote standard identifier, indexed by its 11 bits.
    StandardHashed(u16),
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucket::All => f.write_str("all"),
            Bucket::Filtered => f.write_str("filtered"),
            Bucket::Inverted => f.write_str("inverted"),
            Bucket::Error => f.write_str("error"),
            Bucket::ExactExtended => f.write_str("exact-extended"),
            Bucket::StandardHashed(index) => write!(f, "standard[{index:03X}]"),
        }
    }
}

/// Choose the bucket for `filter` and normalize it for storage.
///
/// The normalized filter has every don't-care bit cleared from its id, so
/// dispatch can compare `frame.id & mask` against it directly. Unregistration
/// calls this again with the caller's original filter and looks for the same
/// normalized value in the same bucket.
pub fn classify(filter: Filter) -> (Bucket, Filter) {
    let inverted = filter.id & INV_FILTER != 0;
    let mut id = filter.id;
    let mut mask = filter.mask;

    if mask & ERR_FLAG != 0 {
        mask &= ERR_MASK;
        return (Bucket::Error, Filter::new(id, mask));
    }

    // an 11-bit id cannot ask for 29-bit discrimination
    if mask & EFF_FLAG != 0 && id & EFF_FLAG == 0 {
        mask &= SFF_MASK | EFF_RTR_FLAGS;
    }

    id &= mask;
    let normalized = Filter::new(id, mask);

    if inverted {
        return (Bucket::Inverted, normalized);
    }

    if mask == 0 {
        return (Bucket::All, normalized);
    }

    if mask & EFF_RTR_FLAGS == EFF_RTR_FLAGS && id & RTR_FLAG == 0 {
        if id & EFF_FLAG != 0 {
            if mask == EFF_MASK | EFF_RTR_FLAGS {
                return (Bucket::ExactExtended, normalized);
            }
        } else if mask == SFF_MASK | EFF_RTR_FLAGS {
            return (Bucket::StandardHashed((id & SFF_MASK) as u16), normalized);
        }
    }

    (Bucket::Filtered, normalized)
}
