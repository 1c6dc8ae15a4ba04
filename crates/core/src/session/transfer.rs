//
// Copyright (c) 2025 CUMULUS STORAGE CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: cumulus — Personal cloud file storage.
//

//! Transfer coordination: chunk-ordered uploads, random-access downloads,
//! finalization, and throughput accounting.
//!
//! A session holds at most one [`TransferContext`] at a time; while it does,
//! only the matching chunk/complete commands are admitted (enforced by the
//! session dispatch). Upload chunks must arrive strictly in order — nothing
//! is buffered, a mismatched index is simply refused and the client retries
//! with the expected one.

use cumulus_proto::{
    meta, total_chunks, DownloadInitInfo, FileMetadata, Packet, UploadInitRequest,
};
use std::time::Instant;
use uuid::Uuid;

use crate::error::FileOperationError;
use crate::handlers::{meta_directory_id, CommandContext};
use crate::session::{Session, SessionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    Upload,
    Download,
}

/// State owned by a session while a transfer is in flight.
#[derive(Debug)]
pub struct TransferContext {
    pub file: FileMetadata,
    pub direction: TransferDirection,
    pub total_chunks: u64,
    /// Next expected index for uploads; cursor of the last served index + 1
    /// for downloads (downloads allow random access, so this is advisory).
    pub next_chunk: u64,
    /// Stamped at construction so elapsed-time math is always well-defined.
    pub started_at: Instant,
    pub bytes_transferred: u64,
}

impl TransferContext {
    pub fn new(file: FileMetadata, direction: TransferDirection) -> Self {
        let total = total_chunks(file.file_size);
        Self {
            file,
            direction,
            total_chunks: total,
            next_chunk: 0,
            started_at: Instant::now(),
            bytes_transferred: 0,
        }
    }

    fn log_throughput(&self, what: &str) {
        let elapsed = self.started_at.elapsed().as_secs_f64().max(1e-6);
        let mib_per_s = self.bytes_transferred as f64 / (1024.0 * 1024.0) / elapsed;
        tracing::info!(
            file = %self.file.id,
            bytes = self.bytes_transferred,
            elapsed_s = elapsed,
            throughput_mib_s = mib_per_s,
            "{what} finished"
        );
    }
}

impl Session {
    fn transfer_mut(&mut self) -> &mut TransferContext {
        match &mut self.state {
            SessionState::Transfer(t) => t,
            _ => unreachable!("transfer operation outside Transfer state"),
        }
    }

    /// `FILE_UPLOAD_INIT`: create an incomplete file record and enter
    /// Transfer(upload). Legal only in Authenticated (dispatch enforces).
    pub(crate) async fn begin_upload(
        &mut self,
        packet: Packet,
        user_id: Uuid,
        ctx: &CommandContext,
    ) -> Packet {
        let response = Packet::respond_to(&packet);
        let request: UploadInitRequest = match serde_json::from_slice(&packet.payload) {
            Ok(r) => r,
            Err(_) => {
                return response
                    .with_success(false)
                    .with_message("Malformed upload request")
            }
        };
        if request.file_name.is_empty() {
            return response
                .with_success(false)
                .with_message("File name must not be empty");
        }

        let directory_id = match meta_directory_id(&packet, meta::DIRECTORY_ID) {
            Ok(id) => id,
            Err(msg) => return response.with_success(false).with_message(msg),
        };
        if let Some(dir_id) = directory_id {
            match ctx.storage.directory_by_id(dir_id).await {
                Ok(Some(dir)) if dir.user_id == user_id => {}
                Ok(_) => {
                    return response
                        .with_success(false)
                        .with_message("Target directory not found")
                }
                Err(e) => {
                    tracing::error!(error = %e, "directory lookup failed");
                    return response
                        .with_success(false)
                        .with_message("Upload initialization failed");
                }
            }
        }

        let file = FileMetadata::new_upload(
            user_id,
            request.file_name,
            request.file_size,
            request.content_type,
            directory_id,
        );
        if let Err(e) = ctx.storage.initialize_upload(&file).await {
            tracing::error!(file = %file.id, error = %e, "upload initialization failed");
            return response
                .with_success(false)
                .with_message("Upload initialization failed");
        }

        let transfer = TransferContext::new(file, TransferDirection::Upload);
        tracing::info!(
            session = %self.id(),
            file = %transfer.file.id,
            name = %transfer.file.file_name,
            size = transfer.file.file_size,
            chunks = transfer.total_chunks,
            "upload started"
        );
        let response = response
            .with_meta(meta::FILE_ID, transfer.file.id.to_string())
            .with_meta(meta::TOTAL_CHUNKS, transfer.total_chunks.to_string())
            .with_success(true)
            .with_message("Upload initialized");
        self.transition(SessionState::Transfer(transfer));
        response
    }

    /// `FILE_UPLOAD_CHUNK`: strict in-order write of the expected chunk.
    /// Any mismatch or backend failure is refused with the expected index;
    /// the session stays in Transfer(upload) so the client can retry.
    pub(crate) async fn upload_chunk(&mut self, packet: Packet, ctx: &CommandContext) -> Packet {
        let response = Packet::respond_to(&packet);
        let (file_id, expected) = {
            let t = self.transfer_mut();
            (t.file.id, t.next_chunk)
        };

        let refuse = |response: Packet, message: String| {
            response
                .with_meta(meta::CHUNK_INDEX, expected.to_string())
                .with_success(false)
                .with_message(message)
        };

        match packet.meta(meta::FILE_ID).and_then(|v| v.parse::<Uuid>().ok()) {
            Some(id) if id == file_id => {}
            _ => {
                return refuse(
                    response,
                    FileOperationError::TransferMismatch(file_id).to_string(),
                )
            }
        }
        let index = match packet.meta_u64(meta::CHUNK_INDEX) {
            Some(i) => i,
            None => return refuse(response, "ChunkIndex is required".into()),
        };
        if index != expected {
            let err = FileOperationError::ChunkOutOfOrder {
                expected,
                got: index,
            };
            return refuse(response, err.to_string());
        }
        if packet.payload.is_empty() {
            return refuse(
                response,
                format!("{}; expected index {expected}", FileOperationError::EmptyChunk),
            );
        }

        let is_last = packet.meta_bool(meta::IS_LAST_CHUNK);
        match ctx
            .storage
            .write_chunk(file_id, index, &packet.payload, is_last)
            .await
        {
            Ok(()) => {
                let payload_len = packet.payload.len() as u64;
                let t = self.transfer_mut();
                t.next_chunk += 1;
                t.bytes_transferred += payload_len;
                response
                    .with_meta(meta::FILE_ID, file_id.to_string())
                    .with_meta(meta::CHUNK_INDEX, index.to_string())
                    .with_success(true)
            }
            Err(e) => {
                tracing::error!(file = %file_id, chunk = index, error = %e, "chunk write failed");
                refuse(response, format!("Chunk write failed; expected index {expected}"))
            }
        }
    }

    /// `FILE_UPLOAD_COMPLETE`: verify and mark the file durable, then return
    /// to Authenticated. Failure also returns to Authenticated — the
    /// half-uploaded file stays incomplete for the backend to clean up.
    pub(crate) async fn complete_upload(
        &mut self,
        packet: Packet,
        _user_id: Uuid,
        ctx: &CommandContext,
    ) -> Packet {
        let response = Packet::respond_to(&packet);
        let file_id = self.transfer_mut().file.id;

        let matches_file = packet
            .meta(meta::FILE_ID)
            .and_then(|v| v.parse::<Uuid>().ok())
            .is_some_and(|id| id == file_id);
        if !matches_file {
            self.transition(SessionState::Authenticated);
            return response
                .with_success(false)
                .with_message(FileOperationError::TransferMismatch(file_id).to_string());
        }

        match ctx.storage.finalize_upload(file_id).await {
            Ok(file) => {
                if let SessionState::Transfer(t) = &self.state {
                    t.log_throughput("upload");
                }
                self.transition(SessionState::Authenticated);
                response
                    .with_meta(meta::FILE_ID, file.id.to_string())
                    .with_success(true)
                    .with_message("Upload complete")
            }
            Err(e) => {
                tracing::error!(file = %file_id, error = %e, "upload finalize failed");
                self.transition(SessionState::Authenticated);
                response
                    .with_meta(meta::FILE_ID, file_id.to_string())
                    .with_success(false)
                    .with_message("Upload finalization failed")
            }
        }
    }

    /// `FILE_DOWNLOAD_INIT`: resolve and check ownership, then enter
    /// Transfer(download).
    pub(crate) async fn begin_download(
        &mut self,
        packet: Packet,
        user_id: Uuid,
        ctx: &CommandContext,
    ) -> Packet {
        let response = Packet::respond_to(&packet);
        let file_id = match packet.meta(meta::FILE_ID).and_then(|v| v.parse::<Uuid>().ok()) {
            Some(id) => id,
            None => {
                return response
                    .with_success(false)
                    .with_message("FileId is required")
            }
        };

        let file = match ctx.storage.file_by_id(file_id).await {
            Ok(Some(file)) if file.user_id == user_id => file,
            Ok(_) => {
                return response
                    .with_success(false)
                    .with_message(FileOperationError::FileNotFound(file_id).to_string())
            }
            Err(e) => {
                tracing::error!(file = %file_id, error = %e, "file lookup failed");
                return response
                    .with_success(false)
                    .with_message("Download initialization failed");
            }
        };

        let transfer = TransferContext::new(file, TransferDirection::Download);
        let info = DownloadInitInfo {
            file_id: transfer.file.id,
            file_name: transfer.file.file_name.clone(),
            file_size: transfer.file.file_size,
            content_type: transfer.file.content_type.clone(),
            total_chunks: transfer.total_chunks,
        };
        tracing::info!(
            session = %self.id(),
            file = %info.file_id,
            chunks = info.total_chunks,
            "download started"
        );
        let response = response
            .with_meta(meta::FILE_ID, info.file_id.to_string())
            .with_meta(meta::TOTAL_CHUNKS, info.total_chunks.to_string())
            .with_success(true)
            .with_payload(serde_json::to_vec(&info).expect("download info serializes"));
        self.transition(SessionState::Transfer(transfer));
        response
    }

    /// `FILE_DOWNLOAD_CHUNK`: serve the requested index. Random access is
    /// permitted; a failed read leaves the transfer window open.
    pub(crate) async fn download_chunk(&mut self, packet: Packet, ctx: &CommandContext) -> Packet {
        let response = Packet::respond_to(&packet);
        let file_id = self.transfer_mut().file.id;

        let matches_file = packet
            .meta(meta::FILE_ID)
            .and_then(|v| v.parse::<Uuid>().ok())
            .is_some_and(|id| id == file_id);
        if !matches_file {
            return response
                .with_success(false)
                .with_message(FileOperationError::TransferMismatch(file_id).to_string());
        }
        let index = match packet.meta_u64(meta::CHUNK_INDEX) {
            Some(i) => i,
            None => {
                return response
                    .with_success(false)
                    .with_message("ChunkIndex is required")
            }
        };

        match ctx.storage.read_chunk(file_id, index).await {
            Ok((bytes, is_last)) => {
                let t = self.transfer_mut();
                t.bytes_transferred += bytes.len() as u64;
                t.next_chunk = index + 1;
                response
                    .with_meta(meta::FILE_ID, file_id.to_string())
                    .with_meta(meta::CHUNK_INDEX, index.to_string())
                    .with_meta(meta::IS_LAST_CHUNK, if is_last { "true" } else { "false" })
                    .with_success(true)
                    .with_payload(bytes)
            }
            Err(e) => {
                tracing::error!(file = %file_id, chunk = index, error = %e, "chunk read failed");
                response
                    .with_meta(meta::CHUNK_INDEX, index.to_string())
                    .with_success(false)
                    .with_message(format!("Failed to read chunk {index}"))
            }
        }
    }

    /// `FILE_DOWNLOAD_COMPLETE`: client-driven close of the transfer window.
    /// The server does not verify that every chunk was pulled.
    pub(crate) fn complete_download(&mut self, packet: Packet, _user_id: Uuid) -> Packet {
        let response = Packet::respond_to(&packet);
        let file_id = self.transfer_mut().file.id;

        let matches_file = packet
            .meta(meta::FILE_ID)
            .and_then(|v| v.parse::<Uuid>().ok())
            .is_some_and(|id| id == file_id);
        if let SessionState::Transfer(t) = &self.state {
            t.log_throughput("download");
        }
        self.transition(SessionState::Authenticated);
        if matches_file {
            response
                .with_meta(meta::FILE_ID, file_id.to_string())
                .with_success(true)
                .with_message("Download complete")
        } else {
            response
                .with_success(false)
                .with_message(FileOperationError::TransferMismatch(file_id).to_string())
        }
    }
}
