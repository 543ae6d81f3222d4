// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Helpers for encoding / decoding the very first byte of every frame
//! header: the **packet type**.
//!
//! ```text
//! +--------+---------+-----------+-------------+
//! |  type  | version | sender_id | payload_len |   <- 6-byte header
//! | 1 byte | 1 byte  |  2 bytes  |   2 bytes   |
//! +--------+---------+-----------+-------------+
//! ```
//!
//! The type byte selects the request/response handler; everything the
//! decoder does not recognize is answered with a single
//! `SYS_ERROR(EC_INV_REQ)` and the session closes.

use core::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// All packet types understood by the server.
///
/// The `LST_*` and `GRP_*` codes are carried by the enum so the decoder can
/// name them in diagnostics, but no handler is wired for them yet.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    #[default]
    SysSuccess = 0x00,
    SysError = 0x01,
    AccLogin = 0x0A,
    AccLoginSuccess = 0x0B,
    AccLogout = 0x0C,
    AccCreate = 0x0D,
    AccEdit = 0x0E,
    ChtSend = 0x14,
    LstGet = 0x1E,
    LstResponse = 0x1F,
    GrpJoin = 0x28,
    GrpExit = 0x29,
    GrpCreate = 0x2A,
}

impl PacketType {
    #[inline]
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0x00 => Self::SysSuccess,
            0x01 => Self::SysError,
            0x0A => Self::AccLogin,
            0x0B => Self::AccLoginSuccess,
            0x0C => Self::AccLogout,
            0x0D => Self::AccCreate,
            0x0E => Self::AccEdit,
            0x14 => Self::ChtSend,
            0x1E => Self::LstGet,
            0x1F => Self::LstResponse,
            0x28 => Self::GrpJoin,
            0x29 => Self::GrpExit,
            0x2A => Self::GrpCreate,
            _ => return None,
        })
    }

}

/// Wire-safe, zero-copy type byte. Transparent over `u8`, so it can live
/// inside the zerocopy header struct.
#[repr(transparent)]
#[derive(Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct RawPacketType(u8);

impl RawPacketType {
    #[inline]
    pub const fn raw(&self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn from_raw(v: u8) -> Self {
        Self(v)
    }

    #[inline]
    pub fn known(&self) -> Option<PacketType> {
        PacketType::from_u8(self.0)
    }
}

impl From<PacketType> for RawPacketType {
    #[inline]
    fn from(ty: PacketType) -> Self {
        Self(ty as u8)
    }
}

impl fmt::Debug for RawPacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.known() {
            Some(ty) => write!(f, "RawPacketType({ty:?})"),
            None => write!(f, "RawPacketType(0x{:02X})", self.0),
        }
    }
}
