//
// Copyright (c) 2025 CUMULUS STORAGE CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: cumulus — Personal cloud file storage.
//

//! The [`Packet`] wire envelope and its metadata vocabulary.

use crate::command::CommandCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Well-known metadata keys carried in [`Packet::metadata`].
///
/// Values are always strings; booleans are `"true"`/`"false"`, indices are
/// decimal. [`DIRECTORY_ID`] accepts the sentinel value `"root"` for the
/// user's root directory.
pub mod meta {
    pub const FILE_ID: &str = "FileId";
    pub const CHUNK_INDEX: &str = "ChunkIndex";
    pub const IS_LAST_CHUNK: &str = "IsLastChunk";
    pub const TOTAL_CHUNKS: &str = "TotalChunks";
    pub const DIRECTORY_ID: &str = "DirectoryId";
    pub const PARENT_DIRECTORY_ID: &str = "ParentDirectoryId";
    pub const RECURSIVE: &str = "Recursive";
    pub const USER_ID: &str = "UserId";
    pub const SUCCESS: &str = "Success";
    pub const MESSAGE: &str = "Message";

    /// Sentinel [`DIRECTORY_ID`] value naming the user's root.
    pub const ROOT: &str = "root";
}

/// The sole wire unit of the protocol.
///
/// Carried inside a 4-byte little-endian length frame as a bincode body
/// (see [`crate::codec`]). The payload is either raw chunk bytes or a
/// JSON-encoded structure from [`crate::types`]; small scalars travel in
/// `metadata`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Request/response kind.
    pub command: CommandCode,
    /// The session's authenticated user id, echoed on every packet; empty
    /// before login.
    pub user_id: String,
    /// Small scalar key/value pairs (keys unique, order irrelevant).
    pub metadata: HashMap<String, String>,
    /// Opaque byte sequence; may be empty.
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
    /// Wall-clock seconds since UNIX epoch at creation (informational).
    pub timestamp: u64,
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl Packet {
    /// Create a new packet of the given kind with no user, metadata, or payload.
    pub fn request(command: CommandCode) -> Self {
        Self {
            command,
            user_id: String::new(),
            metadata: HashMap::new(),
            payload: Vec::new(),
            timestamp: unix_now(),
        }
    }

    /// Create the response paired with `request`, echoing its user id.
    pub fn respond_to(request: &Packet) -> Self {
        Self {
            command: request.command.paired_response(),
            user_id: request.user_id.clone(),
            metadata: HashMap::new(),
            payload: Vec::new(),
            timestamp: unix_now(),
        }
    }

    /// Create an [`CommandCode::Error`] response carrying `message`.
    pub fn error_response(user_id: &str, message: impl Into<String>) -> Self {
        Packet::request(CommandCode::Error)
            .with_user(user_id.to_string())
            .with_success(false)
            .with_message(message)
    }

    pub fn with_user(mut self, user_id: String) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn with_success(self, success: bool) -> Self {
        self.with_meta(meta::SUCCESS, if success { "true" } else { "false" })
    }

    pub fn with_message(self, message: impl Into<String>) -> Self {
        self.with_meta(meta::MESSAGE, message)
    }

    /// Look up a metadata value.
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Parse a metadata value as a decimal integer.
    pub fn meta_u64(&self, key: &str) -> Option<u64> {
        self.meta(key).and_then(|v| v.parse().ok())
    }

    /// Parse a metadata value as a boolean; absent keys read as `false`.
    pub fn meta_bool(&self, key: &str) -> bool {
        self.meta(key).is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    /// Whether this packet reports success. An explicit `Success` entry wins;
    /// otherwise any non-`Error` command is a success.
    pub fn success(&self) -> bool {
        match self.meta(meta::SUCCESS) {
            Some(v) => v.eq_ignore_ascii_case("true"),
            None => self.command != CommandCode::Error,
        }
    }

    /// Human-readable message, if the sender attached one.
    pub fn message(&self) -> Option<&str> {
        self.meta(meta::MESSAGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let p = Packet::request(CommandCode::FileUploadChunkRequest)
            .with_user("u1".into())
            .with_meta(meta::CHUNK_INDEX, "3")
            .with_meta(meta::IS_LAST_CHUNK, "true")
            .with_payload(vec![1, 2, 3]);
        assert_eq!(p.user_id, "u1");
        assert_eq!(p.meta_u64(meta::CHUNK_INDEX), Some(3));
        assert!(p.meta_bool(meta::IS_LAST_CHUNK));
        assert!(!p.meta_bool(meta::RECURSIVE));
        assert_eq!(p.payload, vec![1, 2, 3]);
    }

    #[test]
    fn success_defaults_by_command() {
        let ok = Packet::request(CommandCode::FileListResponse);
        assert!(ok.success());
        let err = Packet::error_response("", "bad");
        assert!(!err.success());
        assert_eq!(err.message(), Some("bad"));
        let explicit = Packet::request(CommandCode::FileUploadChunkResponse).with_success(false);
        assert!(!explicit.success());
    }

    #[test]
    fn respond_to_echoes_user_and_pairs_command() {
        let req = Packet::request(CommandCode::LoginRequest).with_user("u9".into());
        let resp = Packet::respond_to(&req);
        assert_eq!(resp.command, CommandCode::LoginResponse);
        assert_eq!(resp.user_id, "u9");
    }
}
