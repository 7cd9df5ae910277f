use std::fmt;

use crate::error::{FrameError, Result};
use crate::id::CanId;

/// Maximum payload length of a classic CAN frame.
pub const MAX_DLEN: usize = 8;

/// One frame taken off the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Frame {
    /// Identifier including flag bits.
    pub id: CanId,
    /// Number of valid bytes in `data` (for remote requests, the requested length).
    pub len: u8,
    /// Payload storage; bytes past `len` are zero.
    pub data: [u8; MAX_DLEN],
}

impl Frame {
    /// Create a data frame.
    pub fn new(id: CanId, payload: &[u8]) -> Result<Self> {
        if payload.len() > MAX_DLEN {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_DLEN,
            });
        }

        let mut data = [0u8; MAX_DLEN];
        data[..payload.len()].copy_from_slice(payload);
        Ok(Self {
            id,
            len: payload.len() as u8,
            data,
        })
    }

    /// Create a remote-request frame asking for `len` bytes.
    pub fn remote(id: CanId, len: u8) -> Self {
        Self {
            id: id.with_remote(),
            len: len.min(MAX_DLEN as u8),
            data: [0u8; MAX_DLEN],
        }
    }

    /// Create an error frame with the given error-class bits and detail bytes.
    pub fn error(classes: u32, detail: &[u8]) -> Result<Self> {
        Self::new(CanId::error(classes), detail)
    }

    /// The valid payload bytes. Remote requests have none.
    pub fn payload(&self) -> &[u8] {
        if self.id.is_remote() {
            &[]
        } else {
            &self.data[..usize::from(self.len).min(MAX_DLEN)]
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#", self.id)?;
        if self.id.is_remote() {
            f.write_str("R")?;
            if self.len > 0 {
                write!(f, "{}", self.len)?;
            }
            return Ok(());
        }
        for byte in self.payload() {
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}
