//
// Copyright (c) 2025 CUMULUS STORAGE CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: cumulus — Personal cloud file storage.
//

//! Directory handlers: create, list, contents, rename, delete.
//!
//! Sibling directory names are not required to be unique; callers that want
//! uniqueness enforce it themselves.

use cumulus_proto::{
    meta, DirectoryContents, DirectoryCreateRequest, DirectoryMetadata, DirectoryOpResult,
    DirectoryRenameRequest, Packet,
};
use uuid::Uuid;

use crate::error::{FileOperationError, StorageError};
use crate::handlers::{meta_directory_id, CommandContext};

fn dir_result(response: Packet, result: DirectoryOpResult) -> Packet {
    let payload = serde_json::to_vec(&result).expect("directory result serializes");
    let response = match result.directory_id {
        Some(id) => response.with_meta(meta::DIRECTORY_ID, id.to_string()),
        None => response,
    };
    response
        .with_success(result.success)
        .with_message(result.message)
        .with_payload(payload)
}

/// Resolve a directory that must exist and belong to `user_id`.
async fn owned_directory(
    ctx: &CommandContext,
    user_id: Uuid,
    dir_id: Uuid,
) -> Result<DirectoryMetadata, String> {
    match ctx.storage.directory_by_id(dir_id).await {
        Ok(Some(dir)) if dir.user_id == user_id => Ok(dir),
        Ok(_) => Err(FileOperationError::DirectoryNotFound(dir_id).to_string()),
        Err(e) => {
            tracing::error!(directory = %dir_id, error = %e, "directory lookup failed");
            Err("Directory lookup failed".into())
        }
    }
}

/// `DIRECTORY_CREATE`: add a directory under an owned parent (or the root).
pub async fn create(packet: &Packet, user_id: Uuid, ctx: &CommandContext) -> Packet {
    let response = Packet::respond_to(packet);
    let request: DirectoryCreateRequest = match serde_json::from_slice(&packet.payload) {
        Ok(r) => r,
        Err(_) => {
            return response
                .with_success(false)
                .with_message("Malformed directory request")
        }
    };
    if request.directory_name.is_empty() {
        return response
            .with_success(false)
            .with_message("Directory name must not be empty");
    }
    if let Some(parent) = request.parent_directory_id {
        if let Err(msg) = owned_directory(ctx, user_id, parent).await {
            return dir_result(
                response,
                DirectoryOpResult {
                    success: false,
                    directory_id: None,
                    directory_name: None,
                    message: msg,
                },
            );
        }
    }

    let dir = DirectoryMetadata::new(user_id, request.directory_name, request.parent_directory_id);
    match ctx.storage.create_directory(dir.clone()).await {
        Ok(()) => {
            tracing::info!(user = %user_id, directory = %dir.id, name = %dir.name, "directory created");
            dir_result(
                response,
                DirectoryOpResult {
                    success: true,
                    directory_id: Some(dir.id),
                    directory_name: Some(dir.name),
                    message: "Directory created".into(),
                },
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "directory create failed");
            dir_result(
                response,
                DirectoryOpResult {
                    success: false,
                    directory_id: None,
                    directory_name: None,
                    message: "Failed to create directory".into(),
                },
            )
        }
    }
}

/// `DIRECTORY_LIST`: child directories of a parent (or the root).
pub async fn list(packet: &Packet, user_id: Uuid, ctx: &CommandContext) -> Packet {
    let response = Packet::respond_to(packet);
    let parent = match meta_directory_id(packet, meta::PARENT_DIRECTORY_ID) {
        Ok(parent) => parent,
        Err(msg) => return response.with_success(false).with_message(msg),
    };
    if let Some(parent_id) = parent {
        if let Err(msg) = owned_directory(ctx, user_id, parent_id).await {
            return response.with_success(false).with_message(msg);
        }
    }
    match ctx.storage.directories_for_user(user_id, parent).await {
        Ok(dirs) => response
            .with_success(true)
            .with_payload(serde_json::to_vec(&dirs).expect("directory list serializes")),
        Err(e) => {
            tracing::error!(user = %user_id, error = %e, "directory list failed");
            response
                .with_success(false)
                .with_message("Failed to list directories")
        }
    }
}

/// `DIRECTORY_CONTENTS`: files and subdirectories directly inside a
/// directory; `DirectoryId` of `"root"` (or absent) means the user's root.
pub async fn contents(packet: &Packet, user_id: Uuid, ctx: &CommandContext) -> Packet {
    let response = Packet::respond_to(packet);
    let directory_id = match meta_directory_id(packet, meta::DIRECTORY_ID) {
        Ok(id) => id,
        Err(msg) => return response.with_success(false).with_message(msg),
    };
    if let Some(dir_id) = directory_id {
        if let Err(msg) = owned_directory(ctx, user_id, dir_id).await {
            return response.with_success(false).with_message(msg);
        }
    }
    match ctx.storage.directory_contents(user_id, directory_id).await {
        Ok((files, directories)) => {
            let contents = DirectoryContents {
                files,
                directories,
                directory_id,
            };
            response
                .with_success(true)
                .with_payload(serde_json::to_vec(&contents).expect("directory contents serialize"))
        }
        Err(e) => {
            tracing::error!(user = %user_id, error = %e, "directory contents failed");
            response
                .with_success(false)
                .with_message("Failed to list directory contents")
        }
    }
}

/// `DIRECTORY_RENAME`: rename an owned directory in place.
pub async fn rename(packet: &Packet, user_id: Uuid, ctx: &CommandContext) -> Packet {
    let response = Packet::respond_to(packet);
    let request: DirectoryRenameRequest = match serde_json::from_slice(&packet.payload) {
        Ok(r) => r,
        Err(_) => {
            return response
                .with_success(false)
                .with_message("Malformed rename request")
        }
    };
    if request.new_name.is_empty() {
        return response
            .with_success(false)
            .with_message("Directory name must not be empty");
    }
    if let Err(msg) = owned_directory(ctx, user_id, request.directory_id).await {
        return dir_result(
            response,
            DirectoryOpResult {
                success: false,
                directory_id: Some(request.directory_id),
                directory_name: None,
                message: msg,
            },
        );
    }

    match ctx
        .storage
        .rename_directory(request.directory_id, &request.new_name)
        .await
    {
        Ok(dir) => dir_result(
            response,
            DirectoryOpResult {
                success: true,
                directory_id: Some(dir.id),
                directory_name: Some(dir.name),
                message: "Directory renamed".into(),
            },
        ),
        Err(e) => {
            tracing::error!(directory = %request.directory_id, error = %e, "rename failed");
            dir_result(
                response,
                DirectoryOpResult {
                    success: false,
                    directory_id: Some(request.directory_id),
                    directory_name: None,
                    message: "Failed to rename directory".into(),
                },
            )
        }
    }
}

/// `DIRECTORY_DELETE`: delete an owned directory; with `Recursive` the whole
/// subtree and its files go too.
pub async fn delete(packet: &Packet, user_id: Uuid, ctx: &CommandContext) -> Packet {
    let response = Packet::respond_to(packet);
    let Some(dir_id) = packet
        .meta(meta::DIRECTORY_ID)
        .and_then(|v| v.parse::<Uuid>().ok())
    else {
        return response
            .with_success(false)
            .with_message("DirectoryId is required");
    };
    let recursive = packet.meta_bool(meta::RECURSIVE);

    if let Err(msg) = owned_directory(ctx, user_id, dir_id).await {
        return dir_result(
            response,
            DirectoryOpResult {
                success: false,
                directory_id: Some(dir_id),
                directory_name: None,
                message: msg,
            },
        );
    }

    match ctx.storage.delete_directory(dir_id, recursive).await {
        Ok(()) => {
            tracing::info!(user = %user_id, directory = %dir_id, recursive, "directory deleted");
            dir_result(
                response,
                DirectoryOpResult {
                    success: true,
                    directory_id: Some(dir_id),
                    directory_name: None,
                    message: "Directory deleted".into(),
                },
            )
        }
        Err(StorageError::DirectoryNotEmpty(_)) => dir_result(
            response,
            DirectoryOpResult {
                success: false,
                directory_id: Some(dir_id),
                directory_name: None,
                message: "Directory is not empty; pass Recursive to delete its contents".into(),
            },
        ),
        Err(e) => {
            tracing::error!(directory = %dir_id, error = %e, "directory delete failed");
            dir_result(
                response,
                DirectoryOpResult {
                    success: false,
                    directory_id: Some(dir_id),
                    directory_name: None,
                    message: "Failed to delete directory".into(),
                },
            )
        }
    }
}
