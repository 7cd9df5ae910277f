//! Identifier flag bits and masks.
//!
//! A CAN identifier is carried in a `u32`. The three high bits are flags, the
//! remaining bits hold an 11-bit (standard) or 29-bit (extended) identifier.

use std::fmt;

/// Extended frame format: the 29-bit identifier space is in use.
pub const EFF_FLAG: u32 = 0x8000_0000;

/// Remote transmission request: the frame carries no payload.
pub const RTR_FLAG: u32 = 0x4000_0000;

/// Error frame: the identifier carries error-class bits, not an address.
pub const ERR_FLAG: u32 = 0x2000_0000;

/// Standard (11-bit) identifier bits.
pub const SFF_MASK: u32 = 0x0000_07FF;

/// Extended (29-bit) identifier bits.
pub const EFF_MASK: u32 = 0x1FFF_FFFF;

/// Error-class bits of an error frame identifier.
pub const ERR_MASK: u32 = 0x1FFF_FFFF;

/// Filter-only sentinel: match frames whose masked identifier differs.
///
/// Shares its bit with [`ERR_FLAG`]. It only has meaning in the `id` field of
/// a [`Filter`](crate::Filter), never in a frame identifier.
pub const INV_FILTER: u32 = 0x2000_0000;

/// Both flags that take part in exact-id classification.
pub const EFF_RTR_FLAGS: u32 = EFF_FLAG | RTR_FLAG;

/// Error classes reported in the identifier of an error frame.
pub mod error_class {
    /// Transmission timed out.
    pub const TX_TIMEOUT: u32 = 0x0000_0001;
    /// Lost arbitration.
    pub const LOST_ARBITRATION: u32 = 0x0000_0002;
    /// Controller problem.
    pub const CONTROLLER: u32 = 0x0000_0004;
    /// Protocol violation.
    pub const PROTOCOL: u32 = 0x0000_0008;
    /// Transceiver status.
    pub const TRANSCEIVER: u32 = 0x0000_0010;
    /// No acknowledge received on transmission.
    pub const NO_ACK: u32 = 0x0000_0020;
    /// Bus off.
    pub const BUS_OFF: u32 = 0x0000_0040;
    /// Bus error.
    pub const BUS_ERROR: u32 = 0x0000_0080;
    /// Controller restarted.
    pub const RESTARTED: u32 = 0x0000_0100;

    /// Returns a human-readable name for a single error-class bit.
    pub fn name(class: u32) -> &'static str {
        match class {
            TX_TIMEOUT => "tx-timeout",
            LOST_ARBITRATION => "lost-arbitration",
            CONTROLLER => "controller",
            PROTOCOL => "protocol",
            TRANSCEIVER => "transceiver",
            NO_ACK => "no-ack",
            BUS_OFF => "bus-off",
            BUS_ERROR => "bus-error",
            RESTARTED => "restarted",
            _ => "unknown",
        }
    }
}

/// A raw CAN identifier including its flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CanId(u32);

impl CanId {
    /// Standard 11-bit identifier. Bits above the 11-bit field are dropped.
    pub const fn standard(id: u16) -> Self {
        Self(id as u32 & SFF_MASK)
    }

    /// Extended 29-bit identifier. Bits above the 29-bit field are dropped.
    pub const fn extended(id: u32) -> Self {
        Self((id & EFF_MASK) | EFF_FLAG)
    }

    /// Error frame identifier carrying the given error-class bits.
    pub const fn error(classes: u32) -> Self {
        Self((classes & ERR_MASK) | ERR_FLAG)
    }

    /// Take a raw identifier as-is, flags included.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The same identifier with the remote-request flag set.
    pub const fn with_remote(self) -> Self {
        Self(self.0 | RTR_FLAG)
    }

    /// Raw value including flag bits.
    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_extended(self) -> bool {
        self.0 & EFF_FLAG != 0
    }

    pub const fn is_remote(self) -> bool {
        self.0 & RTR_FLAG != 0
    }

    pub const fn is_error(self) -> bool {
        self.0 & ERR_FLAG != 0
    }

    /// The 11-bit or 29-bit identifier (error classes for error frames).
    pub const fn value(self) -> u32 {
        if self.is_error() {
            self.0 & ERR_MASK
        } else if self.is_extended() {
            self.0 & EFF_MASK
        } else {
            self.0 & SFF_MASK
        }
    }
}

impl From<u32> for CanId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl From<CanId> for u32 {
    fn from(id: CanId) -> Self {
        id.0
    }
}

impl fmt::Display for CanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_error() {
            write!(f, "{:08X}", self.0 & (ERR_MASK | ERR_FLAG))
        } else if self.is_extended() {
            write!(f, "{:08X}", self.value())
        } else {
            write!(f, "{:03X}", self.value())
        }
    }
}
