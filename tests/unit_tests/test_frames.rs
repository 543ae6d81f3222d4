// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use chat_server_rs::{
    proto::{
        error::ErrorCode,
        packet::PacketType,
        tlv::TlvReader,
        wire::{self, ChatMessage, Credentials},
    },
    server::manager::{DIAGNOSTIC_FRAME_LEN, ManagerChannel},
};

use crate::unit_tests::from_hex;

#[test]
fn create_request_bytes() -> Result<()> {
    let frame = wire::create_request(b"alice", b"pw")?;
    let expected = from_hex("0D 03 0000 000B 0C 05 616C696365 0C 02 7077")?;
    assert_eq!(frame.encode().as_ref(), expected.as_slice());
    Ok(())
}

#[test]
fn login_request_bytes() -> Result<()> {
    // Same shape as create, different type byte.
    let frame = wire::login_request(b"alice", b"pw")?;
    let expected = from_hex("0A 03 0000 000B 0C 05 616C696365 0C 02 7077")?;
    assert_eq!(frame.encode().as_ref(), expected.as_slice());
    Ok(())
}

#[test]
fn sys_success_echoes_the_request_type() -> Result<()> {
    let frame = wire::sys_success(PacketType::AccCreate);
    let expected = from_hex("00 03 0000 0003 0A 01 0D")?;
    assert_eq!(frame.encode().as_ref(), expected.as_slice());
    let mut rd = TlvReader::new(&frame.payload);
    assert_eq!(rd.read_enum()?, PacketType::AccCreate as u8);

    let frame = wire::sys_success(PacketType::ChtSend);
    let expected = from_hex("00 03 0000 0003 0A 01 14")?;
    assert_eq!(frame.encode().as_ref(), expected.as_slice());
    Ok(())
}

#[test]
fn login_success_is_two_byte_uid() -> Result<()> {
    // uid below 256 still travels as a 2-byte INT.
    let frame = wire::login_success(1);
    let expected = from_hex("0B 03 0000 0004 02 02 0001")?;
    assert_eq!(frame.encode().as_ref(), expected.as_slice());
    Ok(())
}

#[test]
fn sys_error_bytes() -> Result<()> {
    let frame = wire::sys_error(ErrorCode::InvAuthInfo, "Invalid Authentication");
    let mut expected = from_hex("01 03 0000 001B 02 01 0C 0C 16")?;
    expected.extend_from_slice(b"Invalid Authentication");
    assert_eq!(frame.encode().as_ref(), expected.as_slice());

    let frame = wire::sys_error(ErrorCode::UserExists, "User Already Exist");
    let mut expected = from_hex("01 03 0000 0017 02 01 0D 0C 12")?;
    expected.extend_from_slice(b"User Already Exist");
    assert_eq!(frame.encode().as_ref(), expected.as_slice());
    Ok(())
}

#[test]
fn chat_request_bytes_and_parse() -> Result<()> {
    let frame = wire::chat_request(1, "20250304160000Z", b"hello", b"alice")?;
    let mut expected = from_hex("14 03 0001 001F 17 0F")?;
    expected.extend_from_slice(b"20250304160000Z");
    expected.extend_from_slice(&from_hex("0C 05")?);
    expected.extend_from_slice(b"hello");
    expected.extend_from_slice(&from_hex("0C 05")?);
    expected.extend_from_slice(b"alice");
    assert_eq!(frame.encode().as_ref(), expected.as_slice());

    let msg = ChatMessage::parse(&frame.payload)?;
    assert_eq!(msg.timestamp, "20250304160000Z");
    assert_eq!(msg.content, b"hello");
    assert_eq!(msg.username, b"alice");
    Ok(())
}

#[test]
fn credentials_parse_borrows_both_fields() -> Result<()> {
    let frame = wire::create_request(b"bob", b"hunter2")?;
    let creds = Credentials::parse(&frame.payload)?;
    assert_eq!(creds.username, b"bob");
    assert_eq!(creds.password, b"hunter2");
    Ok(())
}

#[test]
fn credentials_reject_garbage_payloads() {
    // ENUM where a STR is expected.
    assert!(Credentials::parse(&[0x0A, 0x01, 0x00]).is_err());
    // Truncated username body.
    assert!(Credentials::parse(&[0x0C, 0x05, b'a']).is_err());
    // Missing password field.
    assert!(Credentials::parse(&[0x0C, 0x01, b'a']).is_err());
}

#[test]
fn logout_request_is_empty() -> Result<()> {
    let frame = wire::logout_request(3);
    let expected = from_hex("0C 03 0003 0000")?;
    assert_eq!(frame.encode().as_ref(), expected.as_slice());
    Ok(())
}

#[test]
fn diagnostic_report_is_sixteen_bytes() -> Result<()> {
    let report = ManagerChannel::encode_report(2, 7);
    let expected = from_hex("0A 03 0000 000A 02 02 0002 02 04 00000007")?;
    assert_eq!(report.len(), DIAGNOSTIC_FRAME_LEN);
    assert_eq!(report.as_ref(), expected.as_slice());
    Ok(())
}
