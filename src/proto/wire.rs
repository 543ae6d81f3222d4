// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Complete frames: header plus payload, and the typed views the
//! dispatcher works with.
//!
//! Requests are parsed lazily: the session loop hands the dispatcher a raw
//! [`Frame`] and the handler borrows the fields it needs
//! ([`Credentials::parse`], [`ChatMessage::parse`]). Responses are built
//! eagerly through the `sys_success` / `sys_error` / `login_success`
//! constructors, which always stamp the canonical server header
//! (version 3, sender id 0, exact payload length).

use bytes::{BufMut, Bytes, BytesMut};
use zerocopy::IntoBytes;

use crate::proto::{
    error::{ErrorCode, ProtoError},
    header::{FrameHeader, HEADER_LEN},
    packet::PacketType,
    tlv::{TlvReader, TlvWriter},
};

/// One complete on-wire message.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub header: FrameHeader,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(header: FrameHeader, payload: Bytes) -> Self {
        Self { header, payload }
    }

    #[inline]
    pub fn packet_type(&self) -> Result<PacketType, ProtoError> {
        self.header.packet_type()
    }

    /// Serialize header and payload into one contiguous buffer.
    pub fn encode(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        out.put_slice(self.header.as_bytes());
        out.put_slice(&self.payload);
        out.freeze()
    }
}

/// Username/password pair shared by `ACC_LOGIN`, `ACC_CREATE` and
/// `ACC_EDIT` (where the second field is the replacement password).
#[derive(Debug, PartialEq, Eq)]
pub struct Credentials<'a> {
    pub username: &'a [u8],
    pub password: &'a [u8],
}

impl<'a> Credentials<'a> {
    pub fn parse(payload: &'a [u8]) -> Result<Self, ProtoError> {
        let mut rd = TlvReader::new(payload);
        let username = rd.read_str()?;
        let password = rd.read_str()?;
        Ok(Self { username, password })
    }
}

/// The three fields of a `CHT_SEND` payload.
#[derive(Debug, PartialEq, Eq)]
pub struct ChatMessage<'a> {
    pub timestamp: &'a str,
    pub content: &'a [u8],
    pub username: &'a [u8],
}

impl<'a> ChatMessage<'a> {
    pub fn parse(payload: &'a [u8]) -> Result<Self, ProtoError> {
        let mut rd = TlvReader::new(payload);
        let timestamp = rd.read_time()?;
        let content = rd.read_str()?;
        let username = rd.read_str()?;
        Ok(Self {
            timestamp,
            content,
            username,
        })
    }
}

fn finish(ty: PacketType, sender_id: u16, w: TlvWriter) -> Frame {
    // Lengths are computed in host order; the header constructor converts
    // once at the boundary.
    let payload = w.into_bytes();
    Frame::new(
        FrameHeader::request(ty, sender_id, payload.len() as u16),
        payload,
    )
}

// ── client-originated frames ────────────────────────────────────────────

/// `ACC_LOGIN`: STR(username) + STR(password).
pub fn login_request(username: &[u8], password: &[u8]) -> Result<Frame, ProtoError> {
    credentials_request(PacketType::AccLogin, username, password)
}

/// `ACC_CREATE`: STR(username) + STR(password).
pub fn create_request(username: &[u8], password: &[u8]) -> Result<Frame, ProtoError> {
    credentials_request(PacketType::AccCreate, username, password)
}

/// `ACC_EDIT`: STR(username) + STR(new password).
pub fn edit_request(username: &[u8], new_password: &[u8]) -> Result<Frame, ProtoError> {
    credentials_request(PacketType::AccEdit, username, new_password)
}

fn credentials_request(
    ty: PacketType,
    username: &[u8],
    password: &[u8],
) -> Result<Frame, ProtoError> {
    let mut w = TlvWriter::new();
    w.put_str(username)?.put_str(password)?;
    Ok(finish(ty, 0, w))
}

/// `ACC_LOGOUT` carries no payload.
pub fn logout_request(sender_id: u16) -> Frame {
    finish(PacketType::AccLogout, sender_id, TlvWriter::new())
}

/// `CHT_SEND`: UTC_TIME + STR(content) + STR(username).
pub fn chat_request(
    sender_id: u16,
    timestamp: &str,
    content: &[u8],
    username: &[u8],
) -> Result<Frame, ProtoError> {
    let mut w = TlvWriter::new();
    w.put_time(timestamp)?.put_str(content)?.put_str(username)?;
    Ok(finish(PacketType::ChtSend, sender_id, w))
}

// ── server-originated frames ────────────────────────────────────────────

/// `SYS_SUCCESS`: ENUM echoing the packet type that succeeded.
pub fn sys_success(echo: PacketType) -> Frame {
    let mut w = TlvWriter::new();
    w.put_enum(echo as u8);
    finish_response(PacketType::SysSuccess, w)
}

/// `SYS_ERROR`: INT(error code) + STR(human message).
pub fn sys_error(code: ErrorCode, message: &str) -> Frame {
    let mut w = TlvWriter::new();
    w.put_int_u8(code as u8);
    // Canonical messages are short non-empty ASCII, so this cannot fail.
    let _ = w.put_str(message.as_bytes());
    finish_response(PacketType::SysError, w)
}

/// `ACC_LOGIN_SUCCESS`: INT(user id), always 2 bytes.
pub fn login_success(user_id: u16) -> Frame {
    let mut w = TlvWriter::new();
    w.put_int_u16(user_id);
    finish_response(PacketType::AccLoginSuccess, w)
}

fn finish_response(ty: PacketType, w: TlvWriter) -> Frame {
    let payload = w.into_bytes();
    Frame::new(
        FrameHeader::response(ty, payload.len() as u16),
        payload,
    )
}
