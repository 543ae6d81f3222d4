// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The multi-client event loop.
//!
//! One loop owns everything: the listener, the session table, the
//! credential store, the counters, and the manager channel. Reader tasks
//! only frame bytes and feed the event channel, so no state is shared and
//! no locks exist. The loop selects over four sources:
//!
//! * the cancellation token (interrupt → exit at the iteration boundary),
//! * the diagnostic tick (persist the user pk, report to the manager),
//! * the listener (install a session, or accept-and-close when full),
//! * the session event channel (dispatch, reply, broadcast, close).
//!
//! Writes to one socket are sequential; broadcasts go out in ascending
//! slot order. None of this promises cross-sender ordering.

pub mod dispatch;
pub mod manager;
pub mod session;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc,
    time::{self, Duration, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

use crate::{
    cfg::config::Config,
    proto::wire::{self, Frame},
    server::{
        dispatch::{Action, DispatchContext},
        manager::ManagerChannel,
        session::{Session, SessionEvent, SessionTable, SlotRef},
    },
    store::credentials::CredentialStore,
};

const EVENT_CHANNEL_DEPTH: usize = 64;

pub struct Server {
    listener: TcpListener,
    sessions: SessionTable,
    store: CredentialStore,
    manager: Option<ManagerChannel>,
    msg_count: u32,
    diagnostic_interval: Duration,
    cancel: CancellationToken,
    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: mpsc::Receiver<SessionEvent>,
}

impl Server {
    /// Bind the listener and make the single manager connect attempt.
    ///
    /// A missing manager is not an error; a busy port is.
    pub async fn bind(
        listen: SocketAddr,
        manager_addr: Option<SocketAddr>,
        cfg: &Config,
        store: CredentialStore,
    ) -> Result<Self> {
        let listener = TcpListener::bind(listen)
            .await
            .with_context(|| format!("failed to bind {listen}"))?;

        let manager = match manager_addr {
            Some(addr) => match ManagerChannel::connect(addr).await {
                Ok(ch) => {
                    info!(%addr, "manager attached");
                    Some(ch)
                },
                Err(e) => {
                    warn!(%addr, "manager unreachable, continuing without: {e}");
                    None
                },
            },
            None => None,
        };

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_DEPTH);

        Ok(Self {
            listener,
            sessions: SessionTable::new(cfg.limits.max_sessions),
            store,
            manager,
            msg_count: 0,
            diagnostic_interval: cfg.timing.diagnostic_interval,
            cancel: CancellationToken::new(),
            events_tx,
            events_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("listener has no local address")
    }

    /// Token that stops the loop; hand it to the signal plumbing.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(mut self) -> Result<()> {
        let mut tick = time::interval_at(
            Instant::now() + self.diagnostic_interval,
            self.diagnostic_interval,
        );
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tick.tick() => self.on_tick().await,
                res = self.listener.accept() => match res {
                    Ok((stream, peer)) => self.on_accept(stream, peer),
                    Err(e) => warn!("accept failed: {e}"),
                },
                Some(ev) = self.events_rx.recv() => self.on_event(ev).await,
            }
        }

        self.store
            .persist_pk()
            .context("failed to persist user pk at shutdown")?;
        info!("server stopped");
        Ok(())
    }

    fn on_accept(&mut self, stream: TcpStream, peer: SocketAddr) {
        let Some(slot) = self.sessions.free_slot() else {
            // Accepted, then immediately closed: the table is the bound.
            info!(%peer, "session table full, rejecting connection");
            drop(stream);
            return;
        };

        if let Err(e) = stream.set_nodelay(true) {
            warn!(%peer, "set_nodelay failed: {e}");
        }
        let (reader, writer) = stream.into_split();
        let cancel = self.cancel.child_token();
        let at = self
            .sessions
            .install(slot, Session::new(peer, writer, cancel.clone()));
        tokio::spawn(session::run_reader(
            at,
            reader,
            self.events_tx.clone(),
            cancel,
        ));
        info!(%peer, slot, "connection accepted");
    }

    async fn on_event(&mut self, ev: SessionEvent) {
        match ev {
            SessionEvent::Frame { at, frame } => {
                let Some(sess) = self.sessions.get_mut(at) else {
                    // Stale event from a reader whose slot was already
                    // reclaimed.
                    return;
                };
                let mut ctx = DispatchContext {
                    store: &mut self.store,
                    msg_count: &mut self.msg_count,
                };
                let action = dispatch::dispatch(&frame, &mut sess.user_id, &mut ctx);
                self.apply(at, action).await;
            },
            SessionEvent::Malformed { at, error } => {
                warn!(slot = at.slot, %error, "malformed frame");
                let reply = wire::sys_error(error.wire_code(), error.wire_message());
                let _ = self.write_to(at, &reply).await;
                self.close(at, "invalid request");
            },
            SessionEvent::Disconnected { at } => {
                self.close(at, "peer disconnected");
            },
        }
    }

    async fn apply(&mut self, at: SlotRef, action: Action) {
        match action {
            Action::NoReply => {},
            Action::Reply(frame) => {
                if !self.write_to(at, &frame).await {
                    self.close(at, "write failed");
                }
            },
            Action::ReplyClose(frame) => {
                let _ = self.write_to(at, &frame).await;
                self.close(at, "protocol error");
            },
            Action::Broadcast { ack, relay } => {
                if !self.write_to(at, &ack).await {
                    self.close(at, "write failed");
                }
                // A failed peer loses only its own session; the fan-out
                // carries on.
                let peers: Vec<SlotRef> = self
                    .sessions
                    .occupied()
                    .filter(|p| p.slot != at.slot)
                    .collect();
                for peer in peers {
                    if !self.write_to(peer, &relay).await {
                        self.close(peer, "broadcast write failed");
                    }
                }
            },
        }
    }

    async fn write_to(&mut self, at: SlotRef, frame: &Frame) -> bool {
        match self.sessions.get_mut(at) {
            Some(sess) => match sess.write_frame(frame).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(slot = at.slot, "write failed: {e}");
                    false
                },
            },
            None => false,
        }
    }

    fn close(&mut self, at: SlotRef, reason: &str) {
        if let Some(sess) = self.sessions.remove(at) {
            sess.shutdown();
            info!(slot = at.slot, peer = %sess.peer(), reason, "session closed");
        }
    }

    async fn on_tick(&mut self) {
        if let Err(e) = self.store.persist_pk() {
            warn!("failed to persist user pk: {e}");
        }

        let user_count = self.sessions.connected_count() as u16;
        trace!(user_count, msg_count = self.msg_count, "diagnostic tick");

        // Report failures are logged and nothing more; the emitter keeps
        // trying on the next tick.
        if let Some(ch) = self.manager.as_mut() {
            if let Err(e) = ch.send_report(user_count, self.msg_count).await {
                warn!("manager report failed: {e}");
            }
        }
    }
}
