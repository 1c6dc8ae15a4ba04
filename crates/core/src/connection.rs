//
// Copyright (c) 2025 CUMULUS STORAGE CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: cumulus — Personal cloud file storage.
//

//! Framed packet transport over a duplex TCP stream.
//!
//! The two directions are split and serialized independently: one mutex for
//! sends, one for receives. The session's request→response lock-step means
//! the locks are uncontended in practice; they exist so a misbehaving task
//! cannot interleave partial frames.

use cumulus_proto::{decode_packet, encode_packet, frame_codec, Packet};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

use crate::error::{ProtocolError, ServerError};

pub struct PacketConnection {
    peer: SocketAddr,
    reader: Mutex<FramedRead<OwnedReadHalf, LengthDelimitedCodec>>,
    writer: Mutex<FramedWrite<OwnedWriteHalf, LengthDelimitedCodec>>,
}

impl PacketConnection {
    /// Wrap an accepted stream: disables Nagle's algorithm and installs the
    /// shared length-delimited codec on both halves. `read_buffer` sizes the
    /// reader's initial buffer (frames larger than it grow on demand).
    pub fn new(stream: TcpStream, read_buffer: usize) -> Result<Self, ServerError> {
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            peer,
            reader: Mutex::new(FramedRead::with_capacity(
                read_half,
                frame_codec(),
                read_buffer,
            )),
            writer: Mutex::new(FramedWrite::new(write_half, frame_codec())),
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Serialize and send one packet: length prefix, body, flush.
    pub async fn send(&self, packet: &Packet) -> Result<(), ServerError> {
        let body = encode_packet(packet).map_err(ProtocolError::Wire)?;
        let mut writer = self.writer.lock().await;
        writer
            .send(body.into())
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset => {
                    ServerError::ConnectionClosed
                }
                _ => ServerError::Io(e),
            })
    }

    /// Receive one packet. A short read at the frame boundary means the peer
    /// closed; an over-limit or undecodable frame is a protocol error.
    pub async fn receive(&self) -> Result<Packet, ServerError> {
        let frame = {
            let mut reader = self.reader.lock().await;
            reader.next().await
        };
        match frame {
            None => Err(ServerError::ConnectionClosed),
            Some(Err(e)) => match e.kind() {
                std::io::ErrorKind::UnexpectedEof
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::BrokenPipe => Err(ServerError::ConnectionClosed),
                std::io::ErrorKind::InvalidData => {
                    Err(ProtocolError::Malformed(e.to_string()).into())
                }
                _ => Err(ServerError::Io(e)),
            },
            Some(Ok(body)) => {
                let packet = decode_packet(&body).map_err(ProtocolError::Wire)?;
                Ok(packet)
            }
        }
    }
}
