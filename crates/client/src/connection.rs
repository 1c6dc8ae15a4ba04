//
// Copyright (c) 2025 CUMULUS STORAGE CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: cumulus — Personal cloud file storage.
//

//! Client-side framed packet connection.
//!
//! The client issues requests in strict lock-step (send one, read one), so a
//! single owner drives both directions; no internal locking is needed.

use cumulus_proto::{decode_packet, encode_packet, frame_codec, Packet};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::error::ClientError;

/// Connection tuning knobs.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub connect_timeout: Duration,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            retry_attempts: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// Connect with timeout and bounded retry.
pub async fn connect_with_retry(
    addr: SocketAddr,
    options: &ConnectOptions,
) -> Result<TcpStream, ClientError> {
    let mut last_error = None;
    for attempt in 1..=options.retry_attempts.max(1) {
        match timeout(options.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                tracing::debug!(%addr, attempt, "connected");
                return Ok(stream);
            }
            Ok(Err(e)) => {
                tracing::debug!(%addr, attempt, error = %e, "connect failed");
                last_error = Some(e.to_string());
            }
            Err(_) => {
                tracing::debug!(%addr, attempt, "connect timed out");
                last_error = Some("connect timed out".into());
            }
        }
        if attempt < options.retry_attempts {
            sleep(options.retry_delay).await;
        }
    }
    Err(ClientError::ConnectFailed(
        last_error.unwrap_or_else(|| "no attempts made".into()),
    ))
}

/// A framed packet stream to the server.
pub struct ClientConnection {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
}

impl ClientConnection {
    /// Connect with default options.
    pub async fn connect(addr: SocketAddr) -> Result<Self, ClientError> {
        Self::connect_with(addr, &ConnectOptions::default()).await
    }

    pub async fn connect_with(
        addr: SocketAddr,
        options: &ConnectOptions,
    ) -> Result<Self, ClientError> {
        let stream = connect_with_retry(addr, options).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            framed: Framed::new(stream, frame_codec()),
        })
    }

    pub async fn send(&mut self, packet: &Packet) -> Result<(), ClientError> {
        let body = encode_packet(packet)?;
        self.framed.send(body.into()).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset => {
                ClientError::ConnectionClosed
            }
            _ => ClientError::Io(e),
        })
    }

    pub async fn receive(&mut self) -> Result<Packet, ClientError> {
        match self.framed.next().await {
            None => Err(ClientError::ConnectionClosed),
            Some(Err(e)) => match e.kind() {
                std::io::ErrorKind::UnexpectedEof
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::BrokenPipe => Err(ClientError::ConnectionClosed),
                _ => Err(ClientError::Io(e)),
            },
            Some(Ok(body)) => Ok(decode_packet(&body)?),
        }
    }

    /// One lock-step round trip.
    pub async fn request(&mut self, packet: &Packet) -> Result<Packet, ClientError> {
        self.send(packet).await?;
        self.receive().await
    }
}
