//
// Copyright (c) 2025 CUMULUS STORAGE CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: cumulus — Personal cloud file storage.
//

//! Connection acceptor and session manager.
//!
//! One task per session; admission is bounded by a semaphore sized to
//! `max_sessions` and excess connections are accepted-and-closed with no
//! response. A background sweep forcibly disconnects sessions idle past the
//! configured timeout. Shutdown fans out over a broadcast channel; each
//! session finishes its in-flight response and closes.

use cumulus_proto::Packet;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Notify, Semaphore};
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::connection::PacketConnection;
use crate::error::{ProtocolError, ServerError};
use crate::handlers::CommandContext;
use crate::session::Session;

struct SessionEntry {
    last_activity: Arc<Mutex<Instant>>,
    cancel: Arc<Notify>,
}

type Registry = Arc<Mutex<HashMap<Uuid, SessionEntry>>>;

pub struct CloudServer {
    config: Arc<ServerConfig>,
    ctx: CommandContext,
}

impl CloudServer {
    pub fn new(ctx: CommandContext) -> Self {
        Self {
            config: ctx.config.clone(),
            ctx,
        }
    }

    /// Accept connections until `shutdown` fires, then drain live sessions.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: broadcast::Sender<()>,
    ) -> Result<(), ServerError> {
        let admission = Arc::new(Semaphore::new(self.config.max_sessions));
        let registry: Registry = Arc::new(Mutex::new(HashMap::new()));
        let mut sessions = JoinSet::new();
        let mut shutdown_rx = shutdown.subscribe();

        let sweeper = tokio::spawn(sweep_idle_sessions(
            registry.clone(),
            self.config.clone(),
            shutdown.subscribe(),
        ));

        tracing::info!(
            addr = %listener.local_addr()?,
            max_sessions = self.config.max_sessions,
            "server listening"
        );

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let Ok(permit) = admission.clone().try_acquire_owned() else {
                                tracing::warn!(%peer, "session limit reached; dropping connection");
                                drop(stream);
                                continue;
                            };
                            let ctx = self.ctx.clone();
                            let registry = registry.clone();
                            let shutdown_rx = shutdown.subscribe();
                            sessions.spawn(async move {
                                let _permit = permit;
                                run_session(stream, ctx, registry, shutdown_rx).await;
                            });
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "accept failed");
                        }
                    }
                }
                // Reap finished session tasks so the set stays small.
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
                _ = shutdown_rx.recv() => {
                    tracing::info!("shutdown requested; draining sessions");
                    break;
                }
            }
        }

        while sessions.join_next().await.is_some() {}
        let _ = sweeper.await;
        tracing::info!("server stopped");
        Ok(())
    }
}

async fn sweep_idle_sessions(
    registry: Registry,
    config: Arc<ServerConfig>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(config.sweep_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Instant::now();
                let guard = registry.lock().expect("session registry lock");
                for (id, entry) in guard.iter() {
                    let idle = now.duration_since(*entry.last_activity.lock().expect("activity lock"));
                    if idle > config.session_timeout {
                        tracing::info!(session = %id, idle_s = idle.as_secs(), "idle session swept");
                        entry.cancel.notify_one();
                    }
                }
            }
            _ = shutdown_rx.recv() => break,
        }
    }
}

async fn run_session(
    stream: TcpStream,
    ctx: CommandContext,
    registry: Registry,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let conn = match PacketConnection::new(stream, ctx.config.network_buffer) {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!(error = %e, "failed to set up connection");
            return;
        }
    };
    let mut session = Session::new();
    let session_id = session.id();
    let peer = conn.peer();
    tracing::info!(session = %session_id, %peer, "session opened");

    let last_activity = Arc::new(Mutex::new(Instant::now()));
    let cancel = Arc::new(Notify::new());
    registry.lock().expect("session registry lock").insert(
        session_id,
        SessionEntry {
            last_activity: last_activity.clone(),
            cancel: cancel.clone(),
        },
    );

    loop {
        tokio::select! {
            received = conn.receive() => {
                match received {
                    Ok(packet) => {
                        let reply = session.handle_packet(packet, &ctx).await;
                        *last_activity.lock().expect("activity lock") = session.last_activity();
                        if let Err(e) = conn.send(&reply).await {
                            tracing::warn!(session = %session_id, error = %e, "send failed");
                            session.begin_disconnect("send failed");
                            break;
                        }
                        if session.is_disconnecting() {
                            break;
                        }
                    }
                    Err(ServerError::ConnectionClosed) => {
                        session.begin_disconnect("peer closed connection");
                        break;
                    }
                    // A bincode-level decode failure leaves the frame stream
                    // aligned; answer and keep the session. Framing-level
                    // violations lose synchronization, so answer and close.
                    Err(ServerError::Protocol(ProtocolError::Wire(e))) => {
                        tracing::warn!(session = %session_id, error = %e, "undecodable packet");
                        let reply = Packet::error_response("", "Malformed packet");
                        if conn.send(&reply).await.is_err() {
                            break;
                        }
                    }
                    Err(ServerError::Protocol(e)) => {
                        tracing::warn!(session = %session_id, error = %e, "protocol violation");
                        let reply = Packet::error_response("", format!("Protocol error: {e}"));
                        let _ = conn.send(&reply).await;
                        session.begin_disconnect("protocol violation");
                        break;
                    }
                    Err(e) => {
                        tracing::error!(session = %session_id, error = %e, "receive failed");
                        session.begin_disconnect("receive failed");
                        break;
                    }
                }
            }
            _ = cancel.notified() => {
                session.begin_disconnect("idle timeout");
                break;
            }
            _ = shutdown_rx.recv() => {
                session.begin_disconnect("server shutdown");
                break;
            }
        }
    }

    registry
        .lock()
        .expect("session registry lock")
        .remove(&session_id);
    tracing::info!(session = %session_id, %peer, "session closed");
}
