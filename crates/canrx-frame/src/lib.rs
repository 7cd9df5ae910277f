//! CAN frame, identifier and filter model.
//!
//! Value types shared by every layer of canrx:
//! - [`CanId`]: a 32-bit identifier with extended, remote-request and error flags
//! - [`Frame`]: identifier plus up to 8 payload bytes
//! - [`Filter`]: an `(id, mask)` registration request, optionally inverted
//!
//! Plus the codecs used to move frames in and out of a process: the 16-byte
//! binary record of the Linux `can_frame`, and the candump text log format.

pub mod candump;
pub mod codec;
pub mod error;
pub mod filter;
pub mod frame;
pub mod id;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use codec::CanFrameCodec;
pub use codec::{decode_frame, encode_frame, CAN_MTU};
pub use error::{FrameError, Result};
pub use filter::Filter;
pub use frame::{Frame, MAX_DLEN};
pub use id::{
    error_class, CanId, EFF_FLAG, EFF_MASK, EFF_RTR_FLAGS, ERR_FLAG, ERR_MASK, INV_FILTER,
    RTR_FLAG, SFF_MASK,
};
pub use reader::FrameReader;
pub use writer::FrameWriter;
