// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The diagnostic emitter: periodic counters to the server manager.
//!
//! One connect attempt at startup; the server runs without a manager if it
//! fails. Each diagnostic tick produces a fixed 16-byte frame:
//!
//! ```text
//! header:  type=0x0A (SVR_DIAGNOSTIC) version=3 sender=0 payload_len=10
//! payload: INT(len=2, user_count)  INT(len=4, msg_count)
//! ```
//!
//! The 4-byte counter width exists only on this outbound channel; the
//! inbound request decoder accepts 1- and 2-byte integers.

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::{io::AsyncWriteExt, net::TcpStream};
use zerocopy::IntoBytes;

use crate::proto::{
    header::{FrameHeader, PROTOCOL_VERSION, SERVER_SENDER_ID},
    packet::RawPacketType,
    tlv::TlvWriter,
    wire::Frame,
};

/// Diagnostic report type byte. Lives outside [`crate::proto::packet::PacketType`]
/// because it never appears on the client wire.
pub const SVR_DIAGNOSTIC: u8 = 0x0A;

/// Total size of a diagnostic frame.
pub const DIAGNOSTIC_FRAME_LEN: usize = 16;

/// Outbound TCP connection to the diagnostics consumer.
#[derive(Debug)]
pub struct ManagerChannel {
    stream: TcpStream,
}

impl ManagerChannel {
    pub async fn connect(addr: SocketAddr) -> std::io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }

    /// Serialize one report. Pure, so the shape is testable byte for byte.
    pub fn encode_report(user_count: u16, msg_count: u32) -> Bytes {
        let mut w = TlvWriter::new();
        w.put_int_u16(user_count).put_int_u32(msg_count);
        let payload = w.into_bytes();

        let header = FrameHeader {
            packet_type: RawPacketType::from_raw(SVR_DIAGNOSTIC),
            version: PROTOCOL_VERSION,
            sender_id: SERVER_SENDER_ID.into(),
            payload_len: (payload.len() as u16).into(),
        };
        debug_assert_eq!(header.as_bytes().len() + payload.len(), DIAGNOSTIC_FRAME_LEN);

        Frame::new(header, payload).encode()
    }

    pub async fn send_report(
        &mut self,
        user_count: u16,
        msg_count: u32,
    ) -> std::io::Result<()> {
        let report = Self::encode_report(user_count, msg_count);
        self.stream.write_all(&report).await
    }
}
