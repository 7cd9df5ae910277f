use bytes::{Buf, BufMut, BytesMut};

use crate::error::{FrameError, Result};
use crate::frame::{Frame, MAX_DLEN};
use crate::id::CanId;

/// Size of one binary frame record.
pub const CAN_MTU: usize = 16;

/// Encode a frame into the binary record format.
///
/// Record layout (the Linux `struct can_frame`, little-endian):
/// ```text
/// ┌──────────────┬─────────┬───────────────┬─────────────────┐
/// │ can_id (4B)  │ len (1B)│ reserved (3B) │ data (8B)       │
/// │ LE, flags    │ 0..=8   │ zero          │ zero padded     │
/// └──────────────┴─────────┴───────────────┴─────────────────┘
/// ```
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) {
    dst.reserve(CAN_MTU);
    dst.put_u32_le(frame.id.raw());
    dst.put_u8(frame.len.min(MAX_DLEN as u8));
    dst.put_bytes(0, 3);
    dst.put_slice(&frame.data);
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete record yet.
/// On success, consumes the record bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut) -> Result<Option<Frame>> {
    if src.len() < CAN_MTU {
        return Ok(None);
    }

    let len = src[4];
    if usize::from(len) > MAX_DLEN {
        return Err(FrameError::InvalidLength(len));
    }

    let raw_id = src.get_u32_le();
    src.advance(4);
    let mut data = [0u8; MAX_DLEN];
    src.copy_to_slice(&mut data);

    Ok(Some(Frame {
        id: CanId::from_raw(raw_id),
        len,
        data,
    }))
}

/// `tokio_util` codec for streams of binary frame records.
#[cfg(feature = "async")]
#[derive(Debug, Clone, Copy, Default)]
pub struct CanFrameCodec;

#[cfg(feature = "async")]
impl tokio_util::codec::Decoder for CanFrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        decode_frame(src)
    }
}

#[cfg(feature = "async")]
impl tokio_util::codec::Encoder<Frame> for CanFrameCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        encode_frame(&frame, dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::error_class;

    #[test]
    fn encoded_record_layout() {
        let frame = Frame::new(CanId::extended(0x0102_0304), &[0xAA, 0xBB]).unwrap();
        let mut buf = BytesMut::new();
        encode_frame(&frame, &mut buf);

        assert_eq!(buf.len(), CAN_MTU);
        assert_eq!(&buf[..4], &0x8102_0304u32.to_le_bytes());
        assert_eq!(buf[4], 2);
        assert_eq!(&buf[5..8], &[0, 0, 0]);
        assert_eq!(&buf[8..10], &[0xAA, 0xBB]);
    }

    #[test]
    fn decode_returns_encoded_frame() {
        let frame = Frame::error(error_class::BUS_OFF, &[0, 0, 0x10]).unwrap();
        let mut buf = BytesMut::new();
        encode_frame(&frame, &mut buf);

        let decoded = decode_frame(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, frame);
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_incomplete_record() {
        let mut buf = BytesMut::from(&[0x23, 0x01, 0x00][..]);
        assert!(decode_frame(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn decode_rejects_length_above_eight() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(0x123);
        buf.put_u8(9);
        buf.put_bytes(0, 11);

        let result = decode_frame(&mut buf);
        assert!(matches!(result, Err(FrameError::InvalidLength(9))));
    }

    #[test]
    fn multiple_records_in_one_buffer() {
        let mut buf = BytesMut::new();
        encode_frame(&Frame::new(CanId::standard(1), b"first").unwrap(), &mut buf);
        encode_frame(&Frame::remote(CanId::standard(2), 0), &mut buf);

        let f1 = decode_frame(&mut buf).unwrap().unwrap();
        let f2 = decode_frame(&mut buf).unwrap().unwrap();
        assert_eq!(f1.payload(), b"first");
        assert!(f2.id.is_remote());
        assert!(buf.is_empty());
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn framed_read_yields_frames() {
        use futures_util::StreamExt;
        use tokio_util::codec::FramedRead;

        let mut wire = BytesMut::new();
        encode_frame(&Frame::new(CanId::standard(0x10), b"a").unwrap(), &mut wire);
        encode_frame(&Frame::new(CanId::standard(0x20), b"b").unwrap(), &mut wire);
        let bytes = wire.to_vec();

        let mut framed = FramedRead::new(bytes.as_slice(), CanFrameCodec);
        let first = framed.next().await.unwrap().unwrap();
        let second = framed.next().await.unwrap().unwrap();
        assert_eq!(first.id, CanId::standard(0x10));
        assert_eq!(second.payload(), b"b");
        assert!(framed.next().await.is_none());
    }
}
