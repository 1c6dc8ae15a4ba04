//
// Copyright (c) 2025 CUMULUS STORAGE CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: cumulus — Personal cloud file storage.
//

//! Shared wire types for the cumulus storage protocol.
//!
//! This crate defines everything both sides of a connection must agree on:
//! the [`Packet`] envelope, the [`CommandCode`] enumeration, the metadata
//! key vocabulary, the JSON payload DTOs, and the bincode packet codec with
//! its 4-byte little-endian length framing.
//!
//! # Quick Start
//!
//! ```rust
//! use cumulus_proto::{encode_packet, decode_packet, CommandCode, Packet};
//!
//! let packet = Packet::request(CommandCode::FileListRequest)
//!     .with_user("2f5a…".to_string());
//! let bytes = encode_packet(&packet).unwrap();
//! let back = decode_packet(&bytes).unwrap();
//! assert_eq!(back.command, CommandCode::FileListRequest);
//! ```

pub mod codec;
pub mod command;
pub mod packet;
pub mod types;

// Re-export primitive type aliases — direct re-exports, no newtype wrappers.
pub use chrono::{DateTime, Utc};
pub use uuid::Uuid;

pub use codec::{encode_packet, decode_packet, frame_codec, WireError};
pub use command::CommandCode;
pub use packet::{meta, Packet};
pub use types::{
    CreateAccountRequest, DirectoryContents, DirectoryCreateRequest, DirectoryMetadata,
    DirectoryOpResult, DirectoryRenameRequest, DownloadInitInfo, FileMetadata, FileMoveRequest,
    FileOpResult, LoginRequest, UploadInitRequest,
};

/// Hard cap on a serialized packet body, framing length prefix included.
pub const MAX_PACKET_SIZE: usize = 25 * 1024 * 1024;

/// Fixed transfer chunk size; the last chunk of a file may be smaller.
pub const CHUNK_SIZE: u64 = 1024 * 1024;

/// Number of chunks a file of `file_size` bytes occupies:
/// `ceil(file_size / CHUNK_SIZE)`. A zero-length file has no chunks, so its
/// transfers consist of init and complete only.
pub fn total_chunks(file_size: u64) -> u64 {
    file_size.div_ceil(CHUNK_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_count_rounds_up() {
        assert_eq!(total_chunks(0), 0);
        assert_eq!(total_chunks(1), 1);
        assert_eq!(total_chunks(CHUNK_SIZE), 1);
        assert_eq!(total_chunks(CHUNK_SIZE + 1), 2);
        assert_eq!(total_chunks(2_621_440), 3);
    }
}
