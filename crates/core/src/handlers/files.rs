//
// Copyright (c) 2025 CUMULUS STORAGE CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: cumulus — Personal cloud file storage.
//

//! File handlers: list, delete, move.

use cumulus_proto::{meta, FileMoveRequest, FileOpResult, Packet};
use uuid::Uuid;

use crate::error::FileOperationError;
use crate::handlers::CommandContext;

/// `FILE_LIST`: every file owned by the session user, as a JSON array.
pub async fn list(packet: &Packet, user_id: Uuid, ctx: &CommandContext) -> Packet {
    let response = Packet::respond_to(packet);
    match ctx.storage.files_for_user(user_id).await {
        Ok(files) => response
            .with_success(true)
            .with_payload(serde_json::to_vec(&files).expect("file list serializes")),
        Err(e) => {
            tracing::error!(user = %user_id, error = %e, "file list failed");
            response.with_success(false).with_message("Failed to list files")
        }
    }
}

fn file_result(response: Packet, result: FileOpResult) -> Packet {
    let payload = serde_json::to_vec(&result).expect("file result serializes");
    response
        .with_meta(meta::FILE_ID, result.file_id.to_string())
        .with_success(result.success)
        .with_message(result.message)
        .with_payload(payload)
}

/// `FILE_DELETE`: remove an owned file and its chunks.
pub async fn delete(packet: &Packet, user_id: Uuid, ctx: &CommandContext) -> Packet {
    let response = Packet::respond_to(packet);
    let Some(file_id) = packet.meta(meta::FILE_ID).and_then(|v| v.parse::<Uuid>().ok()) else {
        return response.with_success(false).with_message("FileId is required");
    };

    match ctx.storage.file_by_id(file_id).await {
        Ok(Some(file)) if file.user_id == user_id => {}
        Ok(_) => {
            return file_result(
                response,
                FileOpResult {
                    success: false,
                    file_id,
                    message: FileOperationError::FileNotFound(file_id).to_string(),
                },
            )
        }
        Err(e) => {
            tracing::error!(file = %file_id, error = %e, "file lookup failed");
            return response.with_success(false).with_message("Failed to delete file");
        }
    }

    match ctx.storage.delete_file(file_id).await {
        Ok(()) => {
            tracing::info!(user = %user_id, file = %file_id, "file deleted");
            file_result(
                response,
                FileOpResult {
                    success: true,
                    file_id,
                    message: "File deleted".into(),
                },
            )
        }
        Err(e) => {
            tracing::error!(file = %file_id, error = %e, "file delete failed");
            file_result(
                response,
                FileOpResult {
                    success: false,
                    file_id,
                    message: "Failed to delete file".into(),
                },
            )
        }
    }
}

/// `FILE_MOVE`: reparent an owned file; target `None` means the user's root.
pub async fn move_file(packet: &Packet, user_id: Uuid, ctx: &CommandContext) -> Packet {
    let response = Packet::respond_to(packet);
    let request: FileMoveRequest = match serde_json::from_slice(&packet.payload) {
        Ok(r) => r,
        Err(_) => {
            return response
                .with_success(false)
                .with_message("Malformed move request")
        }
    };

    match ctx.storage.file_by_id(request.file_id).await {
        Ok(Some(file)) if file.user_id == user_id => {}
        Ok(_) => {
            return file_result(
                response,
                FileOpResult {
                    success: false,
                    file_id: request.file_id,
                    message: FileOperationError::FileNotFound(request.file_id).to_string(),
                },
            )
        }
        Err(e) => {
            tracing::error!(file = %request.file_id, error = %e, "file lookup failed");
            return response.with_success(false).with_message("Failed to move file");
        }
    }

    if let Some(dir_id) = request.target_directory_id {
        match ctx.storage.directory_by_id(dir_id).await {
            Ok(Some(dir)) if dir.user_id == user_id => {}
            Ok(_) => {
                return file_result(
                    response,
                    FileOpResult {
                        success: false,
                        file_id: request.file_id,
                        message: "Target directory not found".into(),
                    },
                )
            }
            Err(e) => {
                tracing::error!(directory = %dir_id, error = %e, "directory lookup failed");
                return response.with_success(false).with_message("Failed to move file");
            }
        }
    }

    match ctx
        .storage
        .move_file(request.file_id, request.target_directory_id)
        .await
    {
        Ok(moved) => file_result(
            response,
            FileOpResult {
                success: true,
                file_id: moved.id,
                message: "File moved".into(),
            },
        ),
        Err(e) => {
            tracing::error!(file = %request.file_id, error = %e, "file move failed");
            file_result(
                response,
                FileOpResult {
                    success: false,
                    file_id: request.file_id,
                    message: "Failed to move file".into(),
                },
            )
        }
    }
}
