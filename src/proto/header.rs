// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The fixed 6-byte frame header.
//!
//! Field order on the wire (all integers big-endian):
//!
//! ```text
//! byte 0      packet type
//! byte 1      protocol version (current = 3)
//! bytes 2..4  sender id        (0 when the server originates the frame)
//! bytes 4..6  payload length   (0..=1024)
//! ```
//!
//! The header is never partial: the reader delivers exactly six bytes or
//! the session ends. Decoding validates the type byte, the version, and
//! the payload bound in one pass so the caller holds a header it can trust.

use zerocopy::{BigEndian, FromBytes as ZFromBytes, Immutable, IntoBytes, KnownLayout, U16};

use crate::proto::{
    error::ProtoError,
    packet::{PacketType, RawPacketType},
};

pub const HEADER_LEN: usize = 6;
pub const PROTOCOL_VERSION: u8 = 3;
pub const MAX_PAYLOAD_LEN: usize = 1024;
/// Sender id carried by every server-originated frame.
pub const SERVER_SENDER_ID: u16 = 0;

/// Wire form of the frame header.
#[repr(C)]
#[derive(Debug, Default, Clone, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct FrameHeader {
    pub packet_type: RawPacketType,  // 0
    pub version: u8,                 // 1
    pub sender_id: U16<BigEndian>,   // 2..4
    pub payload_len: U16<BigEndian>, // 4..6
}

impl FrameHeader {
    /// Header for a client-originated frame, used by the request builders.
    pub fn request(ty: PacketType, sender_id: u16, payload_len: u16) -> Self {
        Self {
            packet_type: ty.into(),
            version: PROTOCOL_VERSION,
            sender_id: sender_id.into(),
            payload_len: payload_len.into(),
        }
    }

    /// Canonical server response header: version 3, sender id 0.
    pub fn response(ty: PacketType, payload_len: u16) -> Self {
        Self::request(ty, SERVER_SENDER_ID, payload_len)
    }

    pub fn to_bytes(&self, buf: &mut [u8]) -> Result<(), ProtoError> {
        if buf.len() != HEADER_LEN {
            return Err(ProtoError::TruncatedHeader(buf.len()));
        }
        buf.copy_from_slice(self.as_bytes());
        Ok(())
    }

    /// Decode and validate six header bytes.
    ///
    /// Rejects unknown packet types, versions above
    /// [`PROTOCOL_VERSION`], and payload lengths beyond
    /// [`MAX_PAYLOAD_LEN`]; the session terminates on any of these.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, ProtoError> {
        if buf.len() < HEADER_LEN {
            return Err(ProtoError::TruncatedHeader(buf.len()));
        }
        let hdr = Self::read_from_bytes(&buf[..HEADER_LEN])
            .map_err(|_| ProtoError::TruncatedHeader(buf.len()))?;

        if hdr.packet_type.known().is_none() {
            return Err(ProtoError::UnknownPacketType(hdr.packet_type.raw()));
        }
        if hdr.version > PROTOCOL_VERSION {
            return Err(ProtoError::UnsupportedVersion(hdr.version));
        }
        if usize::from(hdr.payload_len.get()) > MAX_PAYLOAD_LEN {
            return Err(ProtoError::PayloadTooLarge(hdr.payload_len.get().into()));
        }
        Ok(hdr)
    }

    /// The validated packet type.
    ///
    /// Headers built by [`FrameHeader::from_bytes`] always carry a known
    /// type; hand-built headers may not, hence the `Result`.
    #[inline]
    pub fn packet_type(&self) -> Result<PacketType, ProtoError> {
        self.packet_type
            .known()
            .ok_or(ProtoError::UnknownPacketType(self.packet_type.raw()))
    }

    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload_len.get().into()
    }
}
