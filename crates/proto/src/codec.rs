//
// Copyright (c) 2025 CUMULUS STORAGE CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: cumulus — Personal cloud file storage.
//

//! Packet serialization and the length-delimited framing configuration.
//!
//! A serialized packet is a bincode body prefixed on the wire with a 4-byte
//! little-endian length. Both sides build the codec through [`frame_codec`]
//! so the framing parameters cannot drift apart.

use crate::packet::Packet;
use crate::MAX_PACKET_SIZE;
use thiserror::Error;
use tokio_util::codec::LengthDelimitedCodec;

/// Errors produced while encoding or decoding packet bodies.
#[derive(Error, Debug)]
pub enum WireError {
    #[error("packet too large: {len} bytes (max: {max})")]
    TooLarge { len: usize, max: usize },

    #[error("failed to encode packet: {0}")]
    Encode(#[source] bincode::Error),

    #[error("failed to decode packet: {0}")]
    Decode(#[source] bincode::Error),
}

/// Serialize a packet to its wire body. Never fails for well-formed packets
/// below the size cap.
pub fn encode_packet(packet: &Packet) -> Result<Vec<u8>, WireError> {
    let body = bincode::serialize(packet).map_err(WireError::Encode)?;
    if body.len() > MAX_PACKET_SIZE {
        return Err(WireError::TooLarge {
            len: body.len(),
            max: MAX_PACKET_SIZE,
        });
    }
    Ok(body)
}

/// Deserialize a wire body back into a packet.
///
/// Fails on truncated input, unknown command codes, or bodies above the cap.
pub fn decode_packet(body: &[u8]) -> Result<Packet, WireError> {
    if body.len() > MAX_PACKET_SIZE {
        return Err(WireError::TooLarge {
            len: body.len(),
            max: MAX_PACKET_SIZE,
        });
    }
    bincode::deserialize(body).map_err(WireError::Decode)
}

/// The framing codec both endpoints use: 4-byte little-endian length prefix,
/// frames capped at [`MAX_PACKET_SIZE`].
pub fn frame_codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .little_endian()
        .length_field_length(4)
        .max_frame_length(MAX_PACKET_SIZE)
        .new_codec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandCode;
    use crate::packet::meta;

    #[test]
    fn round_trip_preserves_every_field() {
        let original = Packet::request(CommandCode::FileUploadChunkRequest)
            .with_user("3e9c1f1a".into())
            .with_meta(meta::FILE_ID, "f-1")
            .with_meta(meta::CHUNK_INDEX, "7")
            .with_payload(vec![0u8, 1, 2, 255, 254]);

        let bytes = encode_packet(&original).unwrap();
        let decoded = decode_packet(&bytes).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn empty_payload_round_trips() {
        let original = Packet::request(CommandCode::FileListRequest).with_user("u".into());
        let decoded = decode_packet(&encode_packet(&original).unwrap()).unwrap();
        assert_eq!(decoded, original);
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn oversized_packet_is_rejected() {
        let packet = Packet::request(CommandCode::FileUploadChunkRequest)
            .with_payload(vec![0u8; MAX_PACKET_SIZE + 1]);
        let err = encode_packet(&packet).unwrap_err();
        assert!(matches!(err, WireError::TooLarge { .. }));
    }

    #[test]
    fn truncated_body_is_rejected() {
        let bytes = encode_packet(&Packet::request(CommandCode::LoginRequest)).unwrap();
        let err = decode_packet(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, WireError::Decode(_)));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode_packet(&[0xff; 16]).is_err());
    }
}
