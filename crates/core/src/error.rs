//
// Copyright (c) 2025 CUMULUS STORAGE CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: cumulus — Personal cloud file storage.
//

//! Unified error hierarchy for the cumulus server.

use cumulus_proto::WireError;
use thiserror::Error;
use uuid::Uuid;

/// Top-level error type for server operations.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("protocol violation")]
    Protocol(#[from] ProtocolError),

    #[error("authentication failed")]
    Auth(#[from] AuthError),

    #[error("file operation failed")]
    FileOperation(#[from] FileOperationError),

    #[error("storage backend error")]
    Storage(#[from] StorageError),

    /// Peer half-closed the connection; terminal for the session.
    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Malformed frames, bad lengths, or commands illegal for the session state.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("malformed packet: {0}")]
    Malformed(String),

    #[error("packet user id {packet} does not match session user {session}")]
    UserMismatch { packet: String, session: String },

    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Credential and account failures.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Username and password must not be empty")]
    EmptyCredentials,

    #[error("account already exists: {0}")]
    AccountExists(String),

    #[error("Maximum login attempts exceeded")]
    MaxAttemptsExceeded,

    #[error("user store error: {0}")]
    Store(String),
}

/// File and directory operation failures; carries the offending id where
/// one exists.
#[derive(Error, Debug)]
pub enum FileOperationError {
    #[error("File not found: {0}")]
    FileNotFound(Uuid),

    #[error("Directory not found: {0}")]
    DirectoryNotFound(Uuid),

    #[error("FileId does not match the active transfer ({0})")]
    TransferMismatch(Uuid),

    #[error("Chunk index mismatch: expected {expected}, got {got}")]
    ChunkOutOfOrder { expected: u64, got: u64 },

    #[error("Chunk payload is empty")]
    EmptyChunk,
}

/// Failures inside the storage backend.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("unknown file: {0}")]
    UnknownFile(Uuid),

    #[error("unknown directory: {0}")]
    UnknownDirectory(Uuid),

    #[error("directory {0} is not empty")]
    DirectoryNotEmpty(Uuid),

    #[error("missing chunk {index} for file {file_id}")]
    MissingChunk { file_id: Uuid, index: u64 },

    #[error("chunk index {index} out of range for file {file_id}")]
    ChunkOutOfRange { file_id: Uuid, index: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
