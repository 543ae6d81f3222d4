// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use chat_server_rs::proto::{
    error::ProtoError,
    tlv::{Tag, TlvReader, TlvWriter, Value},
};

use crate::unit_tests::from_hex;

fn round_trip(values: &[Value]) -> Result<Vec<Value>> {
    let mut w = TlvWriter::new();
    for v in values {
        w.put_value(v)?;
    }
    let bytes = w.into_bytes();

    let mut rd = TlvReader::new(&bytes);
    let mut out = Vec::new();
    while !rd.is_empty() {
        out.push(rd.read_value()?);
    }
    Ok(out)
}

#[test]
fn values_round_trip() -> Result<()> {
    let values = vec![
        Value::Bool(true),
        Value::Int(0),
        Value::Int(255),
        Value::Int(256),
        Value::Int(65535),
        Value::Null,
        Value::Enum(0x0D),
        Value::Str(b"alice".to_vec()),
        Value::PrintStr(b"User Already Exist".to_vec()),
        Value::UtcTime("20250304160000Z".to_string()),
        Value::Time("20250304160000Z".to_string()),
        Value::Seq(vec![Value::Enum(1), Value::Str(b"x".to_vec())]),
        Value::Seq(vec![]),
    ];
    assert_eq!(round_trip(&values)?, values);
    Ok(())
}

#[test]
fn int_widths_on_the_wire() -> Result<()> {
    let mut w = TlvWriter::new();
    w.put_int_u8(0x0D);
    w.put_int_u16(1);
    let bytes = w.into_bytes();
    assert_eq!(bytes.as_ref(), from_hex("02 01 0D 02 02 0001")?.as_slice());

    let mut rd = TlvReader::new(&bytes);
    assert_eq!(rd.read_int()?, 0x0D);
    assert_eq!(rd.read_int()?, 1);
    Ok(())
}

#[test]
fn int_invalid_widths_are_rejected() -> Result<()> {
    // Width 3 is not a legal integer.
    let bytes = from_hex("02 03 000001")?;
    let mut rd = TlvReader::new(&bytes);
    assert_eq!(rd.read_value(), Err(ProtoError::InvalidIntLength(3)));

    // Width 0 is a zero-length field.
    let bytes = from_hex("02 00")?;
    let mut rd = TlvReader::new(&bytes);
    assert_eq!(rd.read_value(), Err(ProtoError::ZeroFieldLength));
    Ok(())
}

#[test]
fn zero_length_string_is_rejected() -> Result<()> {
    let bytes = from_hex("0C 00")?;
    let mut rd = TlvReader::new(&bytes);
    assert_eq!(rd.read_value(), Err(ProtoError::ZeroFieldLength));

    let mut rd = TlvReader::new(&bytes);
    assert_eq!(rd.read_str(), Err(ProtoError::ZeroFieldLength));
    Ok(())
}

#[test]
fn null_must_be_empty() -> Result<()> {
    let bytes = from_hex("05 00")?;
    let mut rd = TlvReader::new(&bytes);
    assert_eq!(rd.read_value()?, Value::Null);

    let bytes = from_hex("05 01 00")?;
    let mut rd = TlvReader::new(&bytes);
    assert_eq!(rd.read_value(), Err(ProtoError::InvalidFieldLength(1)));
    Ok(())
}

#[test]
fn enum_is_exactly_one_byte() -> Result<()> {
    let bytes = from_hex("0A 02 0001")?;
    let mut rd = TlvReader::new(&bytes);
    assert_eq!(rd.read_value(), Err(ProtoError::InvalidFieldLength(2)));
    Ok(())
}

#[test]
fn time_must_be_fifteen_bytes() -> Result<()> {
    let mut w = TlvWriter::new();
    w.put_time("20250304160000Z")?;
    let bytes = w.into_bytes();
    assert_eq!(bytes[0], Tag::UtcTime as u8);
    assert_eq!(bytes[1], 15);

    let mut rd = TlvReader::new(&bytes);
    assert_eq!(rd.read_time()?, "20250304160000Z");

    // Wrong length on the wire.
    let bytes = from_hex("17 0E 3230323530333034 313630303030")?;
    let mut rd = TlvReader::new(&bytes);
    assert_eq!(rd.read_time(), Err(ProtoError::InvalidFieldLength(14)));

    // Writer refuses a short timestamp.
    let mut w = TlvWriter::new();
    assert!(w.put_time("20250304").is_err());
    Ok(())
}

#[test]
fn unknown_tag_is_rejected() -> Result<()> {
    let bytes = from_hex("7F 01 00")?;
    let mut rd = TlvReader::new(&bytes);
    assert_eq!(rd.read_value(), Err(ProtoError::UnknownTag(0x7F)));
    Ok(())
}

#[test]
fn reader_never_reads_past_declared_length() -> Result<()> {
    // STR declares 5 bytes but only 3 follow.
    let bytes = from_hex("0C 05 616263")?;
    let mut rd = TlvReader::new(&bytes);
    assert_eq!(
        rd.read_value(),
        Err(ProtoError::TruncatedField { need: 5, left: 3 })
    );
    Ok(())
}

#[test]
fn string_length_bounds() -> Result<()> {
    // 1 and 255 bytes both encode and decode.
    for n in [1usize, 255] {
        let body = vec![b'a'; n];
        let mut w = TlvWriter::new();
        w.put_str(&body)?;
        let bytes = w.into_bytes();
        let mut rd = TlvReader::new(&bytes);
        assert_eq!(rd.read_str()?, body.as_slice());
    }

    // 0 and 256 are rejected by the writer.
    let mut w = TlvWriter::new();
    assert_eq!(w.put_str(&[]).unwrap_err(), ProtoError::ZeroFieldLength);
    let mut w = TlvWriter::new();
    assert_eq!(
        w.put_str(&vec![b'a'; 256]).unwrap_err(),
        ProtoError::FieldTooLong(256)
    );
    Ok(())
}

#[test]
fn sequences_nest() -> Result<()> {
    let v = Value::Seq(vec![
        Value::Int(7),
        Value::Seq(vec![Value::Str(b"inner".to_vec())]),
    ]);
    assert_eq!(round_trip(std::slice::from_ref(&v))?, vec![v]);
    Ok(())
}
