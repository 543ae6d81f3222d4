// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The error-to-wire taxonomy.
//!
//! Every internal failure a client can provoke maps to exactly one
//! `SYS_ERROR` response carrying an [`ErrorCode`] plus a short human
//! message. Application-level errors keep the session open; frame-level
//! errors and server faults close it after the reply.

use thiserror::Error;

use crate::proto::header::MAX_PAYLOAD_LEN;

/// Error codes observable on the wire.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Success; never carried inside a `SYS_ERROR`.
    Good = 0x00,
    /// Login/edit referenced a username the store does not know.
    InvUserId = 0x0B,
    /// Login password did not match the stored one.
    InvAuthInfo = 0x0C,
    /// Create referenced a username that already exists.
    UserExists = 0x0D,
    /// Internal failure (store open, I/O, inconsistent records).
    Server = 0x15,
    /// Malformed frame, unknown packet type, or unsupported version.
    InvReq = 0x1F,
    /// Reserved; the server never emits it.
    ReqTimeout = 0x20,
}

impl ErrorCode {
    /// Canonical human message for codes with a single cause.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Good => "OK",
            Self::InvUserId => "Invalid User ID",
            Self::InvAuthInfo => "Invalid Authentication",
            Self::UserExists => "User Already Exist",
            Self::Server => "Server Error",
            Self::InvReq => "Invalid Request",
            Self::ReqTimeout => "Request Timeout",
        }
    }

    /// Whether the session survives a `SYS_ERROR` carrying this code.
    #[inline]
    pub fn keeps_session_open(&self) -> bool {
        matches!(self, Self::InvUserId | Self::InvAuthInfo | Self::UserExists)
    }
}

/// Frame- and field-level decode failures.
///
/// All of them render as `EC_INV_REQ` on the wire; the variants exist so
/// logs and replies can name the actual cause.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtoError {
    #[error("truncated header: got {0} bytes, need 6")]
    TruncatedHeader(usize),
    #[error("unrecognized packet type: 0x{0:02x}")]
    UnknownPacketType(u8),
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),
    #[error("payload length {0} exceeds {MAX_PAYLOAD_LEN}")]
    PayloadTooLarge(usize),
    #[error("unrecognized tag type: 0x{0:02x}")]
    UnknownTag(u8),
    #[error("invalid integer length: {0}")]
    InvalidIntLength(u8),
    #[error("field length of zero")]
    ZeroFieldLength,
    #[error("invalid field length: {0}")]
    InvalidFieldLength(u8),
    #[error("truncated field: need {need} bytes, {left} left")]
    TruncatedField { need: usize, left: usize },
    #[error("expected {expected}, got tag 0x{got:02x}")]
    UnexpectedTag { expected: &'static str, got: u8 },
    #[error("field value too long: {0} bytes")]
    FieldTooLong(usize),
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

impl ProtoError {
    /// Every decode error is an invalid request as far as the client is
    /// concerned.
    #[inline]
    pub fn wire_code(&self) -> ErrorCode {
        ErrorCode::InvReq
    }

    /// The message carried in the `SYS_ERROR` reply.
    pub fn wire_message(&self) -> &'static str {
        match self {
            Self::UnknownPacketType(_) => "Unrecognized Packet Type",
            Self::UnsupportedVersion(_) => "Unsupported Version",
            Self::PayloadTooLarge(_) => "Exceeded Max Payload Length",
            Self::UnknownTag(_) => "Unrecognized Tag Type",
            Self::InvalidIntLength(_) => "Invalid Integer Length",
            Self::ZeroFieldLength => "Field Length of Zero",
            _ => "Invalid Request",
        }
    }
}
