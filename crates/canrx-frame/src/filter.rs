use std::fmt;
use std::str::FromStr;

use crate::error::FrameError;
use crate::id::{EFF_FLAG, ERR_FLAG, ERR_MASK, INV_FILTER};

/// A subscriber's registration request: which identifiers it wants.
///
/// A frame passes when `frame.id & mask == id & mask`. With [`INV_FILTER`] set
/// in `id` the test is inverted. With [`ERR_FLAG`] set in `mask` the filter
/// selects error frames by error class instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Filter {
    pub id: u32,
    pub mask: u32,
}

impl Filter {
    pub const fn new(id: u32, mask: u32) -> Self {
        Self { id, mask }
    }

    /// Match frames whose masked identifier differs from `id`.
    pub const fn inverted(id: u32, mask: u32) -> Self {
        Self {
            id: id | INV_FILTER,
            mask,
        }
    }

    /// Match error frames carrying any of the given error classes.
    pub const fn error(classes: u32) -> Self {
        Self {
            id: 0,
            mask: (classes & ERR_MASK) | ERR_FLAG,
        }
    }

    /// Catch-all filter for every non-error frame.
    pub const fn all() -> Self {
        Self { id: 0, mask: 0 }
    }

    pub const fn is_inverted(&self) -> bool {
        self.id & INV_FILTER != 0
    }

    pub const fn is_error(&self) -> bool {
        self.mask & ERR_FLAG != 0
    }
}

/// Parses candump filter syntax.
///
/// - `<id>:<mask>` matches when `frame.id & mask == id & mask`
/// - `<id>~<mask>` matches when `frame.id & mask != id & mask`
/// - `#<error_mask>` matches error frames with any of the given classes
///
/// Values are hexadecimal. An eight digit `<id>` selects the extended format.
impl FromStr for Filter {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| FrameError::InvalidFilter {
            input: s.to_string(),
            reason,
        };

        if let Some(classes) = s.strip_prefix('#') {
            let classes = parse_hex(classes).ok_or_else(|| invalid("bad error mask"))?;
            return Ok(Self::error(classes));
        }

        let (id_str, mask_str, inverted) = match (s.split_once(':'), s.split_once('~')) {
            (Some((id, mask)), None) => (id, mask, false),
            (None, Some((id, mask))) => (id, mask, true),
            _ => return Err(invalid("expected <id>:<mask>, <id>~<mask> or #<mask>")),
        };

        let mut id = parse_hex(id_str).ok_or_else(|| invalid("bad identifier"))?;
        let mask = parse_hex(mask_str).ok_or_else(|| invalid("bad mask"))? & !ERR_FLAG;
        if id_str.len() == 8 {
            id |= EFF_FLAG;
        }

        Ok(if inverted {
            Self::inverted(id, mask)
        } else {
            Self::new(id, mask)
        })
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_error() {
            return write!(f, "#{:08X}", self.mask & ERR_MASK);
        }
        let sep = if self.is_inverted() { '~' } else { ':' };
        let id = self.id & !INV_FILTER;
        if id & EFF_FLAG != 0 {
            write!(f, "{:08X}{sep}{:X}", id & !EFF_FLAG, self.mask)
        } else {
            write!(f, "{id:03X}{sep}{:X}", self.mask)
        }
    }
}

fn parse_hex(s: &str) -> Option<u32> {
    if s.is_empty() || s.len() > 8 {
        return None;
    }
    u32::from_str_radix(s, 16).ok()
}
