// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use chat_server_rs::proto::{
    error::ProtoError,
    header::{FrameHeader, HEADER_LEN, MAX_PAYLOAD_LEN, PROTOCOL_VERSION},
    packet::PacketType,
};
use zerocopy::IntoBytes;

use crate::unit_tests::from_hex;

#[test]
fn header_round_trip() -> Result<()> {
    for ty in [
        PacketType::SysSuccess,
        PacketType::AccLogin,
        PacketType::AccCreate,
        PacketType::ChtSend,
        PacketType::LstGet,
    ] {
        for sender in [0u16, 1, 7, u16::MAX] {
            for len in [0u16, 1, 13, 1024] {
                let hdr = FrameHeader::request(ty, sender, len);
                let mut buf = [0u8; HEADER_LEN];
                hdr.to_bytes(&mut buf)?;
                let decoded = FrameHeader::from_bytes(&buf)?;
                assert_eq!(decoded, hdr);
                assert_eq!(decoded.packet_type()?, ty);
                assert_eq!(decoded.sender_id.get(), sender);
                assert_eq!(decoded.payload_len(), usize::from(len));
            }
        }
    }
    Ok(())
}

#[test]
fn header_wire_layout_is_big_endian() -> Result<()> {
    // ACC_CREATE, version 3, sender 0x0102, payload_len 0x000D.
    let hdr = FrameHeader::request(PacketType::AccCreate, 0x0102, 0x000D);
    assert_eq!(hdr.as_bytes(), from_hex("0D 03 0102 000D")?.as_slice());
    Ok(())
}

#[test]
fn short_header_is_rejected() {
    for n in 0..HEADER_LEN {
        let buf = vec![0u8; n];
        assert_eq!(
            FrameHeader::from_bytes(&buf),
            Err(ProtoError::TruncatedHeader(n))
        );
    }
}

#[test]
fn unknown_packet_type_is_rejected() -> Result<()> {
    let buf = from_hex("55 03 0000 0000")?;
    assert_eq!(
        FrameHeader::from_bytes(&buf),
        Err(ProtoError::UnknownPacketType(0x55))
    );
    Ok(())
}

#[test]
fn higher_version_is_rejected() -> Result<()> {
    let buf = from_hex("0A 04 0000 0000")?;
    assert_eq!(
        FrameHeader::from_bytes(&buf),
        Err(ProtoError::UnsupportedVersion(4))
    );

    // Lower versions still parse.
    let buf = from_hex("0A 02 0000 0000")?;
    assert!(FrameHeader::from_bytes(&buf).is_ok());
    Ok(())
}

#[test]
fn oversize_payload_is_rejected() -> Result<()> {
    // payload_len = 2000 > 1024
    let buf = from_hex("14 03 0000 07D0")?;
    assert_eq!(
        FrameHeader::from_bytes(&buf),
        Err(ProtoError::PayloadTooLarge(2000))
    );

    // Exactly at the cap is fine.
    let hdr = FrameHeader::request(PacketType::ChtSend, 1, MAX_PAYLOAD_LEN as u16);
    let mut buf = [0u8; HEADER_LEN];
    hdr.to_bytes(&mut buf)?;
    assert!(FrameHeader::from_bytes(&buf).is_ok());
    Ok(())
}

#[test]
fn server_response_header_is_canonical() {
    let hdr = FrameHeader::response(PacketType::SysSuccess, 3);
    assert_eq!(hdr.version, PROTOCOL_VERSION);
    assert_eq!(hdr.sender_id.get(), 0);
    assert_eq!(hdr.payload_len.get(), 3);
}
