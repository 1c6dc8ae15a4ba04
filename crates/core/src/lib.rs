//
// Copyright (c) 2025 CUMULUS STORAGE CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: cumulus — Personal cloud file storage.
//

//! # Cumulus Core
//!
//! Session protocol engine for the cumulus cloud file storage service.
//!
//! The server accepts many concurrent TCP clients and lets authenticated
//! users upload, download, list, move, and delete files organized into
//! per-user directory trees, over a length-framed binary packet protocol.
//!
//! ## Architecture
//!
//! - [`connection`] — framed packet I/O over a duplex stream, one lock per
//!   direction
//! - [`session`] — the per-connection state machine; the only place that
//!   decides whether a command is legal right now
//! - [`session::transfer`] — chunk-ordered uploads and downloads, at most
//!   one in flight per session
//! - [`handlers`] — one handler per non-transfer command
//! - [`auth`] — PBKDF2 credential verification and the JSON user store
//! - [`storage`] — the storage backend seam and its disk implementation
//! - [`server`] — acceptor, admission bounding, idle sweep, shutdown
//!
//! Data flows `bytes → frame → Packet → session → handler → response
//! Packet → frame → bytes`; wire definitions live in [`cumulus_proto`].

pub mod auth;
pub mod config;
pub mod connection;
pub mod error;
pub mod handlers;
pub mod server;
pub mod session;
pub mod storage;

pub use auth::{JsonUserStore, User, UserRepository, UserRole};
pub use config::ServerConfig;
pub use connection::PacketConnection;
pub use error::{AuthError, FileOperationError, ProtocolError, ServerError, StorageError};
pub use handlers::CommandContext;
pub use server::CloudServer;
pub use session::{Session, SessionState, StateChanged, StateKind, TransferContext, TransferDirection};
pub use storage::{DiskStorage, StorageBackend};
