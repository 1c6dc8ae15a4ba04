//
// Copyright (c) 2025 CUMULUS STORAGE CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: cumulus — Personal cloud file storage.
//

//! Non-transfer command handlers.
//!
//! One handler per request kind, keyed off the command code in [`dispatch`].
//! Each performs at most one backend call and returns the response packet;
//! none of them mutate session state. Every handler runs only for a packet
//! the state machine already admitted, with the session's verified user id.

use cumulus_proto::{meta, CommandCode, Packet};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::UserRepository;
use crate::config::ServerConfig;
use crate::storage::StorageBackend;

pub mod dirs;
pub mod files;

/// Shared collaborators handed to the state machine and every handler.
#[derive(Clone)]
pub struct CommandContext {
    pub users: Arc<dyn UserRepository>,
    pub storage: Arc<dyn StorageBackend>,
    pub config: Arc<ServerConfig>,
}

/// Route an admitted non-transfer command to its handler.
pub async fn dispatch(packet: &Packet, user_id: Uuid, ctx: &CommandContext) -> Packet {
    match packet.command {
        CommandCode::FileListRequest => files::list(packet, user_id, ctx).await,
        CommandCode::FileDeleteRequest => files::delete(packet, user_id, ctx).await,
        CommandCode::FileMoveRequest => files::move_file(packet, user_id, ctx).await,
        CommandCode::DirectoryCreateRequest => dirs::create(packet, user_id, ctx).await,
        CommandCode::DirectoryListRequest => dirs::list(packet, user_id, ctx).await,
        CommandCode::DirectoryContentsRequest => dirs::contents(packet, user_id, ctx).await,
        CommandCode::DirectoryRenameRequest => dirs::rename(packet, user_id, ctx).await,
        CommandCode::DirectoryDeleteRequest => dirs::delete(packet, user_id, ctx).await,
        _ => Packet::error_response(&packet.user_id, "No handler for command"),
    }
}

/// Parse an optional directory id metadata value. Absent or `"root"` means
/// the user's root; anything else must be a well-formed UUID.
pub(crate) fn meta_directory_id(packet: &Packet, key: &str) -> Result<Option<Uuid>, String> {
    match packet.meta(key) {
        None => Ok(None),
        Some(v) if v.eq_ignore_ascii_case(meta::ROOT) || v.is_empty() => Ok(None),
        Some(v) => v
            .parse::<Uuid>()
            .map(Some)
            .map_err(|_| format!("Invalid directory id: {v}")),
    }
}
