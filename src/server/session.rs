// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Per-socket session state and the bounded descriptor table.
//!
//! Slot 0 of the table belongs to the listener; slots `1..capacity` hold
//! client sessions. The table never grows: when every client slot is
//! occupied, a new connection is accepted and immediately closed.
//!
//! Each accepted socket is split. The write half stays in the [`Session`]
//! and is only ever touched by the server loop; the read half moves into a
//! reader task that drives the two-phase framing state machine (exactly
//! six header bytes, then exactly `payload_len` payload bytes) and
//! forwards [`SessionEvent`]s over the shared channel. Reader tasks hold
//! no protocol state and are cancelled through a child token when their
//! slot is freed.

use std::net::SocketAddr;

use bytes::BytesMut;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::tcp::{OwnedReadHalf, OwnedWriteHalf},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::proto::{
    error::ProtoError,
    header::{FrameHeader, HEADER_LEN},
    wire::Frame,
};

/// Slot index plus a generation stamp.
///
/// Slots are reused; the generation guards against events queued by a
/// previous occupant of the same slot being attributed to its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRef {
    pub slot: usize,
    pub generation: u64,
}

/// What a reader task reports back to the server loop.
#[derive(Debug)]
pub enum SessionEvent {
    /// A complete, header-valid frame arrived.
    Frame { at: SlotRef, frame: Frame },
    /// The stream produced bytes the decoder rejected; the reader stopped.
    Malformed { at: SlotRef, error: ProtoError },
    /// Peer hang-up or transport error; the reader stopped.
    Disconnected { at: SlotRef },
}

/// Server-side state bound to one accepted socket.
#[derive(Debug)]
pub struct Session {
    peer: SocketAddr,
    writer: OwnedWriteHalf,
    cancel: CancellationToken,
    /// Set by a successful create or login, cleared by logout. Never
    /// reassigned while the session lives.
    pub user_id: Option<u16>,
}

impl Session {
    pub fn new(peer: SocketAddr, writer: OwnedWriteHalf, cancel: CancellationToken) -> Self {
        Self {
            peer,
            writer,
            cancel,
            user_id: None,
        }
    }

    #[inline]
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub async fn write_frame(&mut self, frame: &Frame) -> std::io::Result<()> {
        self.writer.write_all(&frame.encode()).await
    }

    /// Stop the companion reader task. The write half closes when the
    /// session is dropped out of the table.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Fixed-capacity descriptor table; slot 0 is reserved for the listener.
#[derive(Debug)]
pub struct SessionTable {
    slots: Vec<Option<Session>>,
    generations: Vec<u64>,
}

impl SessionTable {
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            generations: vec![0; capacity],
        }
    }

    /// First free client slot, if any.
    pub fn free_slot(&self) -> Option<usize> {
        (1..self.slots.len()).find(|&i| self.slots[i].is_none())
    }

    /// Place a session and stamp a fresh generation for its slot.
    pub fn install(&mut self, slot: usize, session: Session) -> SlotRef {
        self.generations[slot] += 1;
        self.slots[slot] = Some(session);
        SlotRef {
            slot,
            generation: self.generations[slot],
        }
    }

    /// Current occupant, provided the generation still matches.
    pub fn get_mut(&mut self, at: SlotRef) -> Option<&mut Session> {
        if self.generations.get(at.slot) != Some(&at.generation) {
            return None;
        }
        self.slots[at.slot].as_mut()
    }

    pub fn remove(&mut self, at: SlotRef) -> Option<Session> {
        if self.generations.get(at.slot) != Some(&at.generation) {
            return None;
        }
        self.slots[at.slot].take()
    }

    /// Occupied client slots in ascending order; broadcasts follow this
    /// order.
    pub fn occupied(&self) -> impl Iterator<Item = SlotRef> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.as_ref().map(|_| SlotRef {
                slot: i,
                generation: self.generations[i],
            })
        })
    }

    /// Number of currently connected client sessions.
    pub fn connected_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

/// Read one frame off the stream.
///
/// `Ok(None)` means the peer went away (EOF or transport error); a decode
/// failure is surfaced so the loop can answer with `SYS_ERROR` before
/// closing. A payload larger than the cap is rejected from the header
/// alone, without draining the body.
async fn read_frame(reader: &mut OwnedReadHalf) -> Result<Option<Frame>, ProtoError> {
    let mut hdr_buf = [0u8; HEADER_LEN];
    if reader.read_exact(&mut hdr_buf).await.is_err() {
        return Ok(None);
    }

    let header = FrameHeader::from_bytes(&hdr_buf)?;

    let payload_len = header.payload_len();
    let mut payload = BytesMut::zeroed(payload_len);
    if payload_len > 0 && reader.read_exact(&mut payload).await.is_err() {
        return Ok(None);
    }

    Ok(Some(Frame::new(header, payload.freeze())))
}

/// Reader task body: frame bytes until the peer, the decoder, or the
/// cancellation token says stop.
pub(crate) async fn run_reader(
    at: SlotRef,
    mut reader: OwnedReadHalf,
    events: mpsc::Sender<SessionEvent>,
    cancel: CancellationToken,
) {
    loop {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => return,
            res = read_frame(&mut reader) => res,
        };

        match outcome {
            Ok(Some(frame)) => {
                trace!(slot = at.slot, ty = ?frame.header.packet_type, "frame in");
                if events.send(SessionEvent::Frame { at, frame }).await.is_err() {
                    return;
                }
            },
            Ok(None) => {
                let _ = events.send(SessionEvent::Disconnected { at }).await;
                return;
            },
            Err(error) => {
                let _ = events.send(SessionEvent::Malformed { at, error }).await;
                return;
            },
        }
    }
}
