//! Wire format serialization and deserialization.
//!
//! Frames are fixed size, with no delimiters or length prefix:
//!
//! ```text
//! id (1) || sequence (1) || flags (1) || payload (N)
//!
//! Flags byte:
//! - bit 0: is_reply
//! - bit 1: is_fire_and_forget
//! - bits 2-7: reserved, must be zero
//! ```
//!
//! A frame whose length is not exactly `HEADER_BYTES + N` is rejected.
//! Payload bytes past the logical length are written as zeros, so the logical
//! length itself never travels; a decoded message always has length `N`.

use core::fmt;

use crate::types::{
    FLAGS_RESERVED, FLAG_FIRE_AND_FORGET, FLAG_IS_REPLY, HEADER_BYTES, MAX_FRAME_BYTES,
    MAX_PAYLOAD_BYTES,
};

/// Decoding error types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Frame length does not match the configured framing.
    InvalidLength,
    /// Reserved flag bits are set.
    InvalidFlags,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::InvalidLength => write!(f, "frame length does not match framing"),
            DecodeError::InvalidFlags => write!(f, "reserved flag bits set"),
        }
    }
}

/// Encoding error types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncodeError {
    /// Output buffer cannot hold a full frame.
    BufferTooSmall,
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::BufferTooSmall => write!(f, "buffer too small for frame"),
        }
    }
}

/// Cursor over an inbound frame.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Create a new reader over a byte slice.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Returns the number of bytes remaining.
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let v = *self.buf.get(self.pos).ok_or(DecodeError::InvalidLength)?;
        self.pos += 1;
        Ok(v)
    }

    /// Read a fixed number of bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(len).ok_or(DecodeError::InvalidLength)?;
        let slice = self.buf.get(self.pos..end).ok_or(DecodeError::InvalidLength)?;
        self.pos = end;
        Ok(slice)
    }
}

/// Cursor over an outbound buffer.
pub struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    /// Create a writer at the start of `buf`.
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Returns the number of bytes written so far.
    pub fn len(&self) -> usize {
        self.pos
    }

    /// Returns true if no data has been written.
    pub fn is_empty(&self) -> bool {
        self.pos == 0
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, v: u8) -> Result<(), EncodeError> {
        self.write_bytes(&[v])
    }

    /// Write a slice of bytes.
    pub fn write_bytes(&mut self, v: &[u8]) -> Result<(), EncodeError> {
        let end = self.pos + v.len();
        self.buf
            .get_mut(self.pos..end)
            .ok_or(EncodeError::BufferTooSmall)?
            .copy_from_slice(v);
        self.pos = end;
        Ok(())
    }

    /// Write `count` zero bytes.
    pub fn write_zeros(&mut self, count: usize) -> Result<(), EncodeError> {
        let end = self.pos + count;
        self.buf
            .get_mut(self.pos..end)
            .ok_or(EncodeError::BufferTooSmall)?
            .fill(0);
        self.pos = end;
        Ok(())
    }
}

/// Fixed header carried by every frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Header {
    /// Application-defined message kind.
    pub id: u8,
    /// Per-originator counter, assigned by the engine on `send`.
    pub sequence: u8,
    /// This frame carries a reply travelling back toward the originator.
    pub is_reply: bool,
    /// The originator expects no reply.
    pub is_fire_and_forget: bool,
}

impl Header {
    /// Header for a new broadcast. The sequence is assigned on send.
    pub const fn new(id: u8, is_fire_and_forget: bool) -> Self {
        Self {
            id,
            sequence: 0,
            is_reply: false,
            is_fire_and_forget,
        }
    }

    /// Pack the two flags into the wire flags byte.
    pub const fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.is_reply {
            flags |= FLAG_IS_REPLY;
        }
        if self.is_fire_and_forget {
            flags |= FLAG_FIRE_AND_FORGET;
        }
        flags
    }

    /// Decode the three header bytes.
    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let id = r.read_u8()?;
        let sequence = r.read_u8()?;
        let flags = r.read_u8()?;
        if flags & FLAGS_RESERVED != 0 {
            return Err(DecodeError::InvalidFlags);
        }
        Ok(Self {
            id,
            sequence,
            is_reply: flags & FLAG_IS_REPLY != 0,
            is_fire_and_forget: flags & FLAG_FIRE_AND_FORGET != 0,
        })
    }

    /// Encode the three header bytes.
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        w.write_u8(self.id)?;
        w.write_u8(self.sequence)?;
        w.write_u8(self.flags())
    }
}

/// A broadcast or reply with an `N` byte payload buffer.
///
/// The logical length (`len()`) may be shorter than `N`; hooks set it on
/// every hop. Everything past it is zeroed when encoded.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Message<const N: usize> {
    /// Frame header.
    pub header: Header,
    payload: [u8; N],
    len: usize,
}

impl<const N: usize> Message<N> {
    /// Full frame size for this payload capacity.
    pub const FRAME_BYTES: usize = HEADER_BYTES + N;

    pub(crate) const FITS: () = assert!(N <= MAX_PAYLOAD_BYTES, "payload exceeds MAX_PAYLOAD_BYTES");

    /// New broadcast with an empty (zeroed, full-length) payload.
    pub const fn new(id: u8, is_fire_and_forget: bool) -> Self {
        let () = Self::FITS;
        Self {
            header: Header::new(id, is_fire_and_forget),
            payload: [0u8; N],
            len: N,
        }
    }

    /// New broadcast carrying `data`. Fails if `data` is longer than `N`.
    pub fn with_payload(id: u8, is_fire_and_forget: bool, data: &[u8]) -> Option<Self> {
        if data.len() > N {
            return None;
        }
        let mut message = Self::new(id, is_fire_and_forget);
        message.payload[..data.len()].copy_from_slice(data);
        message.len = data.len();
        Some(message)
    }

    /// Message id.
    #[inline]
    pub fn id(&self) -> u8 {
        self.header.id
    }

    /// Logical payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.len]
    }

    /// Whole payload buffer, regardless of logical length.
    pub fn payload_buf(&self) -> &[u8; N] {
        &self.payload
    }

    /// Whole payload buffer for in-place edits by hooks.
    pub fn payload_buf_mut(&mut self) -> &mut [u8; N] {
        &mut self.payload
    }

    /// Logical payload length.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Set the logical length, clamped to `N`.
    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(N);
    }

    /// Zero the payload buffer and restore full logical length.
    pub fn clear_payload(&mut self) {
        self.payload = [0u8; N];
        self.len = N;
    }

    /// Encode one full frame into `buf`, returning the frame length.
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<usize, EncodeError> {
        let mut w = Writer::new(buf);
        self.header.encode(&mut w)?;
        w.write_bytes(&self.payload[..self.len])?;
        w.write_zeros(N - self.len)?;
        Ok(w.len())
    }

    /// Encode into a [`Frame`].
    pub fn to_frame(&self) -> Frame {
        let mut frame = Frame::new();
        // FITS guarantees the frame buffer is large enough.
        frame.len = self.encode_into(&mut frame.bytes).unwrap_or(0);
        frame
    }

    /// Decode a frame (strict: the length must match exactly).
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let () = Self::FITS;
        if data.len() != Self::FRAME_BYTES {
            return Err(DecodeError::InvalidLength);
        }
        let mut r = Reader::new(data);
        let header = Header::decode(&mut r)?;
        let mut payload = [0u8; N];
        payload.copy_from_slice(r.read_bytes(N)?);
        debug_assert_eq!(r.remaining(), 0);
        Ok(Self {
            header,
            payload,
            len: N,
        })
    }
}

impl<const N: usize> fmt::Debug for Message<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("header", &self.header)
            .field("payload", &self.payload())
            .finish()
    }
}

/// An encoded frame held in a fixed buffer.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    bytes: [u8; MAX_FRAME_BYTES],
    len: usize,
}

impl Frame {
    /// Empty frame.
    pub const fn new() -> Self {
        Self {
            bytes: [0u8; MAX_FRAME_BYTES],
            len: 0,
        }
    }

    /// Copy raw bytes into a frame, truncating at `MAX_FRAME_BYTES`.
    pub fn from_slice(data: &[u8]) -> Self {
        let mut frame = Self::new();
        let len = data.len().min(MAX_FRAME_BYTES);
        frame.bytes[..len].copy_from_slice(&data[..len]);
        frame.len = len;
        frame
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({:02x?})", self.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_PAYLOAD_BYTES;

    type Msg = Message<DEFAULT_PAYLOAD_BYTES>;

    #[test]
    fn test_frame_layout() {
        let mut msg = Msg::with_payload(7, true, &[0xAA, 0xBB]).unwrap();
        msg.header.sequence = 42;

        let frame = msg.to_frame();
        let bytes = frame.as_slice();
        assert_eq!(bytes.len(), 16);
        assert_eq!(bytes[0], 7);
        assert_eq!(bytes[1], 42);
        assert_eq!(bytes[2], FLAG_FIRE_AND_FORGET);
        assert_eq!(&bytes[3..5], &[0xAA, 0xBB]);
        // Tail past the logical length is zeroed
        assert!(bytes[5..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_decode_full_length() {
        let mut msg = Msg::with_payload(3, false, &[1, 2, 3]).unwrap();
        msg.header.is_reply = true;
        msg.header.sequence = 9;

        let decoded = Msg::decode(msg.to_frame().as_slice()).unwrap();
        assert_eq!(decoded.header, msg.header);
        // Logical length does not travel
        assert_eq!(decoded.len(), DEFAULT_PAYLOAD_BYTES);
        assert_eq!(&decoded.payload()[..3], &[1, 2, 3]);
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let frame = Msg::new(1, false).to_frame();
        let bytes = frame.as_slice();

        assert_eq!(
            Msg::decode(&bytes[..bytes.len() - 1]),
            Err(DecodeError::InvalidLength)
        );
        assert_eq!(Msg::decode(&[]), Err(DecodeError::InvalidLength));

        let mut long = [0u8; 17];
        long[..16].copy_from_slice(bytes);
        assert_eq!(Msg::decode(&long), Err(DecodeError::InvalidLength));
    }

    #[test]
    fn test_decode_rejects_reserved_flags() {
        let mut bytes = [0u8; 16];
        bytes[2] = 0x04;
        assert_eq!(Msg::decode(&bytes), Err(DecodeError::InvalidFlags));

        bytes[2] = FLAG_IS_REPLY | FLAG_FIRE_AND_FORGET;
        let header = Msg::decode(&bytes).unwrap().header;
        assert!(header.is_reply);
        assert!(header.is_fire_and_forget);
    }

    #[test]
    fn test_encode_buffer_too_small() {
        let msg = Msg::new(1, false);
        let mut buf = [0u8; 10];
        assert_eq!(msg.encode_into(&mut buf), Err(EncodeError::BufferTooSmall));
    }

    #[test]
    fn test_with_payload_capacity() {
        assert!(Msg::with_payload(1, false, &[0u8; DEFAULT_PAYLOAD_BYTES]).is_some());
        assert!(Msg::with_payload(1, false, &[0u8; DEFAULT_PAYLOAD_BYTES + 1]).is_none());
    }

    #[test]
    fn test_set_len_clamps() {
        let mut msg = Msg::new(1, false);
        msg.set_len(200);
        assert_eq!(msg.len(), DEFAULT_PAYLOAD_BYTES);
        msg.set_len(0);
        assert!(msg.is_empty());
        msg.clear_payload();
        assert_eq!(msg.len(), DEFAULT_PAYLOAD_BYTES);
    }

    #[test]
    fn test_reader_eof() {
        let mut r = Reader::new(&[1, 2]);
        assert_eq!(r.read_u8(), Ok(1));
        assert_eq!(r.read_bytes(2), Err(DecodeError::InvalidLength));
        assert_eq!(r.remaining(), 1);
    }

    #[test]
    fn test_zero_capacity_payload() {
        let msg = Message::<0>::new(5, false);
        let frame = msg.to_frame();
        assert_eq!(frame.len(), HEADER_BYTES);
        assert_eq!(Message::<0>::decode(frame.as_slice()).unwrap().id(), 5);
    }
}
