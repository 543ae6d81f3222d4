// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use chat_server_rs::proto::{packet::PacketType, wire};
use serial_test::serial;
use tokio::net::TcpStream;

use crate::integration_tests::common::{
    connect, expect_silence, read_frame, read_frame_bytes, send_bytes, spawn_server,
};

async fn create_user(addr: std::net::SocketAddr, name: &[u8]) -> Result<TcpStream> {
    let mut stream = connect(addr).await?;
    send_bytes(&mut stream, &wire::create_request(name, b"pw")?.encode()).await?;
    let (header, _) = read_frame(&mut stream).await?;
    assert_eq!(header.packet_type()?, PacketType::SysSuccess);
    Ok(stream)
}

#[tokio::test]
#[serial]
async fn chat_reaches_every_peer_but_not_the_sender() -> Result<()> {
    let server = spawn_server().await?;

    let mut alice = create_user(server.addr, b"alice").await?;
    let mut bob = create_user(server.addr, b"bob").await?;
    let mut carol = create_user(server.addr, b"carol").await?;

    let chat = wire::chat_request(1, "20250304160000Z", b"hello", b"alice")?;
    send_bytes(&mut alice, &chat.encode()).await?;

    // The sender gets only the ack.
    let ack = read_frame_bytes(&mut alice).await?;
    assert_eq!(ack, wire::sys_success(PacketType::ChtSend).encode().as_ref());
    expect_silence(&mut alice).await?;

    // Every peer gets the frame exactly as sent, exactly once.
    for peer in [&mut bob, &mut carol] {
        let relayed = read_frame_bytes(peer).await?;
        assert_eq!(relayed, chat.encode().as_ref());
        expect_silence(peer).await?;
    }

    server.shutdown().await
}

#[tokio::test]
#[serial]
async fn chat_with_a_single_session_still_acks() -> Result<()> {
    let server = spawn_server().await?;
    let mut alice = create_user(server.addr, b"alice").await?;

    let chat = wire::chat_request(1, "20250304160000Z", b"anyone?", b"alice")?;
    send_bytes(&mut alice, &chat.encode()).await?;

    let (header, _) = read_frame(&mut alice).await?;
    assert_eq!(header.packet_type()?, PacketType::SysSuccess);
    expect_silence(&mut alice).await?;

    server.shutdown().await
}

#[tokio::test]
#[serial]
async fn peers_hear_consecutive_chats_in_send_order() -> Result<()> {
    let server = spawn_server().await?;

    let mut alice = create_user(server.addr, b"alice").await?;
    let mut bob = create_user(server.addr, b"bob").await?;

    let first = wire::chat_request(1, "20250304160000Z", b"first", b"alice")?;
    let second = wire::chat_request(1, "20250304160001Z", b"second", b"alice")?;
    send_bytes(&mut alice, &first.encode()).await?;
    send_bytes(&mut alice, &second.encode()).await?;

    read_frame(&mut alice).await?;
    read_frame(&mut alice).await?;

    assert_eq!(read_frame_bytes(&mut bob).await?, first.encode().as_ref());
    assert_eq!(read_frame_bytes(&mut bob).await?, second.encode().as_ref());

    server.shutdown().await
}

#[tokio::test]
#[serial]
async fn a_dead_peer_does_not_break_the_broadcast() -> Result<()> {
    let server = spawn_server().await?;

    let mut alice = create_user(server.addr, b"alice").await?;
    let bob = create_user(server.addr, b"bob").await?;
    let mut carol = create_user(server.addr, b"carol").await?;

    // Bob leaves without a word.
    drop(bob);
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let chat = wire::chat_request(1, "20250304160000Z", b"hello", b"alice")?;
    send_bytes(&mut alice, &chat.encode()).await?;

    let (header, _) = read_frame(&mut alice).await?;
    assert_eq!(header.packet_type()?, PacketType::SysSuccess);
    assert_eq!(read_frame_bytes(&mut carol).await?, chat.encode().as_ref());

    server.shutdown().await
}
