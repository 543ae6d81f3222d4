// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The request dispatcher: one decoded frame in, one [`Action`] out.
//!
//! Handlers are pure over the dispatch context (credential store +
//! counters) and the session's user id; all socket I/O stays in the server
//! loop, which applies the returned action. This keeps every handler
//! testable without a socket in sight.

use tracing::{debug, error};

use crate::{
    proto::{
        error::ErrorCode,
        packet::PacketType,
        wire::{self, ChatMessage, Credentials, Frame},
    },
    store::credentials::{AccountError, CredentialStore},
};

/// What the server loop should do with the offending or successful
/// request.
#[derive(Debug, PartialEq)]
pub enum Action {
    /// Write the frame to the sender; session stays open.
    Reply(Frame),
    /// Write the frame to the sender, then close the session.
    ReplyClose(Frame),
    /// Ack the sender and relay the original frame to every other
    /// occupied session in ascending slot order.
    Broadcast { ack: Frame, relay: Frame },
    /// Nothing goes out on the wire (logout).
    NoReply,
}

/// Mutable state the handlers operate on, owned by the server loop.
#[derive(Debug)]
pub struct DispatchContext<'a> {
    pub store: &'a mut CredentialStore,
    pub msg_count: &'a mut u32,
}

/// Dispatch a header-valid frame.
///
/// Header-level validation (type byte, version, payload bound) has already
/// happened in the reader; what remains here is payload parsing and
/// handler semantics.
pub fn dispatch(
    frame: &Frame,
    session_user: &mut Option<u16>,
    ctx: &mut DispatchContext<'_>,
) -> Action {
    let Ok(ty) = frame.packet_type() else {
        // Reader-validated frames always carry a known type; a hand-built
        // one that does not is an invalid request like any other.
        return invalid_request("Unrecognized Packet Type");
    };

    match ty {
        PacketType::AccCreate => handle_create(frame, session_user, ctx),
        PacketType::AccLogin => handle_login(frame, session_user, ctx),
        PacketType::AccEdit => handle_edit(frame, ctx),
        PacketType::AccLogout => handle_logout(session_user),
        PacketType::ChtSend => handle_chat(frame, ctx),
        // Server-originated and reserved types are not valid requests.
        _ => invalid_request("Invalid Request"),
    }
}

fn handle_create(
    frame: &Frame,
    session_user: &mut Option<u16>,
    ctx: &mut DispatchContext<'_>,
) -> Action {
    let creds = match Credentials::parse(&frame.payload) {
        Ok(c) => c,
        Err(e) => return invalid_request(e.wire_message()),
    };

    match ctx.store.create(creds.username, creds.password) {
        Ok(uid) => {
            *session_user = Some(uid);
            Action::Reply(wire::sys_success(PacketType::AccCreate))
        },
        Err(e) => account_error(e),
    }
}

fn handle_login(
    frame: &Frame,
    session_user: &mut Option<u16>,
    ctx: &mut DispatchContext<'_>,
) -> Action {
    let creds = match Credentials::parse(&frame.payload) {
        Ok(c) => c,
        Err(e) => return invalid_request(e.wire_message()),
    };

    match ctx.store.login(creds.username, creds.password) {
        Ok(uid) => {
            *session_user = Some(uid);
            debug!(uid, "user logged in");
            Action::Reply(wire::login_success(uid))
        },
        Err(e) => account_error(e),
    }
}

fn handle_edit(frame: &Frame, ctx: &mut DispatchContext<'_>) -> Action {
    let creds = match Credentials::parse(&frame.payload) {
        Ok(c) => c,
        Err(e) => return invalid_request(e.wire_message()),
    };

    // No caller-identity check: any client knowing an account name may
    // replace its password. See DESIGN.md.
    match ctx.store.edit_password(creds.username, creds.password) {
        Ok(()) => Action::Reply(wire::sys_success(PacketType::AccEdit)),
        Err(e) => account_error(e),
    }
}

fn handle_logout(session_user: &mut Option<u16>) -> Action {
    if let Some(uid) = session_user.take() {
        debug!(uid, "user logged out");
    }
    Action::NoReply
}

fn handle_chat(frame: &Frame, ctx: &mut DispatchContext<'_>) -> Action {
    // Validate the payload shape before acking; the relay itself is the
    // received frame, byte for byte.
    if let Err(e) = ChatMessage::parse(&frame.payload) {
        return invalid_request(e.wire_message());
    }

    *ctx.msg_count += 1;
    Action::Broadcast {
        ack: wire::sys_success(PacketType::ChtSend),
        relay: frame.clone(),
    }
}

fn account_error(err: AccountError) -> Action {
    let code = match err {
        AccountError::UserExists => ErrorCode::UserExists,
        AccountError::UnknownUser => ErrorCode::InvUserId,
        AccountError::BadPassword => ErrorCode::InvAuthInfo,
        AccountError::MissingIndex | AccountError::Store(_) => {
            error!(%err, "credential store failure");
            ErrorCode::Server
        },
    };

    let reply = wire::sys_error(code, code.message());
    if code.keeps_session_open() {
        Action::Reply(reply)
    } else {
        Action::ReplyClose(reply)
    }
}

fn invalid_request(message: &str) -> Action {
    Action::ReplyClose(wire::sys_error(ErrorCode::InvReq, message))
}
