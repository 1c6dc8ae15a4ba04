//
// Copyright (c) 2025 CUMULUS STORAGE CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: cumulus — Personal cloud file storage.
//

//! High-level client API.

use cumulus_proto::{
    meta, total_chunks, CommandCode, DirectoryContents, DirectoryMetadata, DirectoryOpResult,
    DownloadInitInfo, FileMetadata, FileOpResult, Packet, CHUNK_SIZE,
};
use std::net::SocketAddr;
use std::path::Path;
use uuid::Uuid;

use crate::connection::{ClientConnection, ConnectOptions};
use crate::error::ClientError;

/// A completed download: the file's descriptor and its reassembled bytes.
#[derive(Debug)]
pub struct Download {
    pub info: DownloadInitInfo,
    pub bytes: Vec<u8>,
}

/// Stateful client for one server connection.
///
/// Operations follow the server's session rules: log in before file
/// operations, and one transfer at a time (the upload/download methods run a
/// whole transfer to completion before returning).
pub struct CloudClient {
    conn: ClientConnection,
    user_id: Option<Uuid>,
    failed_logins: u32,
}

impl CloudClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self, ClientError> {
        Self::connect_with(addr, &ConnectOptions::default()).await
    }

    pub async fn connect_with(
        addr: SocketAddr,
        options: &ConnectOptions,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            conn: ClientConnection::connect_with(addr, options).await?,
            user_id: None,
            failed_logins: 0,
        })
    }

    /// The authenticated user id, once `login` has succeeded.
    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    /// Failed login attempts observed on this connection.
    pub fn failed_logins(&self) -> u32 {
        self.failed_logins
    }

    /// Take back the raw connection (for protocol-level callers).
    pub fn into_connection(self) -> ClientConnection {
        self.conn
    }

    fn stamped(&self, command: CommandCode) -> Packet {
        let packet = Packet::request(command);
        match self.user_id {
            Some(id) => packet.with_user(id.to_string()),
            None => packet,
        }
    }

    fn require_login(&self) -> Result<Uuid, ClientError> {
        self.user_id.ok_or(ClientError::NotLoggedIn)
    }

    fn refusal(response: &Packet) -> ClientError {
        ClientError::Refused(
            response
                .message()
                .unwrap_or("server refused the request")
                .to_string(),
        )
    }

    fn parse_payload<T: serde::de::DeserializeOwned>(response: &Packet) -> Result<T, ClientError> {
        serde_json::from_slice(&response.payload)
            .map_err(|e| ClientError::MalformedResponse(e.to_string()))
    }

    /// Create an account. Does not log in: call [`CloudClient::login`] next.
    pub async fn create_account(
        &mut self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<Uuid, ClientError> {
        if username.is_empty() || password.is_empty() {
            return Err(ClientError::EmptyCredentials);
        }
        let request = Packet::request(CommandCode::CreateAccountRequest).with_payload(
            serde_json::to_vec(&serde_json::json!({
                "username": username,
                "password": password,
                "email": email,
            }))
            .expect("account request serializes"),
        );
        let response = self.conn.request(&request).await?;
        if !response.success() {
            return Err(Self::refusal(&response));
        }
        response
            .meta(meta::USER_ID)
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| ClientError::MalformedResponse("missing UserId".into()))
    }

    /// Authenticate the connection.
    ///
    /// Empty credentials are rejected locally without a round trip, so they
    /// never count toward the server's five-attempt lockout.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<Uuid, ClientError> {
        if username.is_empty() || password.is_empty() {
            return Err(ClientError::EmptyCredentials);
        }
        let request = Packet::request(CommandCode::LoginRequest).with_payload(
            serde_json::to_vec(&serde_json::json!({
                "username": username,
                "password": password,
            }))
            .expect("login request serializes"),
        );
        let response = self.conn.request(&request).await?;
        if !response.success() {
            self.failed_logins += 1;
            return Err(Self::refusal(&response));
        }
        let user_id: Uuid = response
            .meta(meta::USER_ID)
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| ClientError::MalformedResponse("missing UserId".into()))?;
        self.user_id = Some(user_id);
        Ok(user_id)
    }

    /// Log out; the server closes the connection afterwards.
    pub async fn logout(&mut self) -> Result<(), ClientError> {
        self.require_login()?;
        let request = self.stamped(CommandCode::LogoutRequest);
        let response = self.conn.request(&request).await?;
        if !response.success() {
            return Err(Self::refusal(&response));
        }
        self.user_id = None;
        Ok(())
    }

    pub async fn list_files(&mut self) -> Result<Vec<FileMetadata>, ClientError> {
        self.require_login()?;
        let request = self.stamped(CommandCode::FileListRequest);
        let response = self.conn.request(&request).await?;
        if !response.success() {
            return Err(Self::refusal(&response));
        }
        Self::parse_payload(&response)
    }

    /// Upload a byte buffer as one file, chunked at [`CHUNK_SIZE`] and sent
    /// strictly in order. Returns the new file id.
    pub async fn upload_bytes(
        &mut self,
        file_name: &str,
        content_type: &str,
        bytes: &[u8],
        directory_id: Option<Uuid>,
    ) -> Result<Uuid, ClientError> {
        self.require_login()?;
        let mut init = self
            .stamped(CommandCode::FileUploadInitRequest)
            .with_payload(
                serde_json::to_vec(&serde_json::json!({
                    "fileName": file_name,
                    "fileSize": bytes.len() as u64,
                    "contentType": content_type,
                }))
                .expect("upload request serializes"),
            );
        if let Some(dir) = directory_id {
            init = init.with_meta(meta::DIRECTORY_ID, dir.to_string());
        }
        let response = self.conn.request(&init).await?;
        if !response.success() {
            return Err(Self::refusal(&response));
        }
        let file_id: Uuid = response
            .meta(meta::FILE_ID)
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| ClientError::MalformedResponse("missing FileId".into()))?;

        let chunks: Vec<&[u8]> = bytes.chunks(CHUNK_SIZE as usize).collect();
        let last = chunks.len().saturating_sub(1);
        for (index, chunk) in chunks.iter().enumerate() {
            let packet = self
                .stamped(CommandCode::FileUploadChunkRequest)
                .with_meta(meta::FILE_ID, file_id.to_string())
                .with_meta(meta::CHUNK_INDEX, index.to_string())
                .with_meta(meta::IS_LAST_CHUNK, if index == last { "true" } else { "false" })
                .with_payload(chunk.to_vec());
            let response = self.conn.request(&packet).await?;
            if !response.success() {
                return Err(Self::refusal(&response));
            }
            tracing::debug!(file = %file_id, chunk = index, "chunk acknowledged");
        }

        let complete = self
            .stamped(CommandCode::FileUploadCompleteRequest)
            .with_meta(meta::FILE_ID, file_id.to_string());
        let response = self.conn.request(&complete).await?;
        if !response.success() {
            return Err(Self::refusal(&response));
        }
        Ok(file_id)
    }

    /// Upload a file from disk.
    pub async fn upload_file(
        &mut self,
        path: &Path,
        directory_id: Option<Uuid>,
    ) -> Result<Uuid, ClientError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());
        self.upload_bytes(&file_name, "application/octet-stream", &bytes, directory_id)
            .await
    }

    /// Download a whole file: init, pull chunks `0..total`, close the
    /// transfer window, and verify the reassembled size.
    pub async fn download(&mut self, file_id: Uuid) -> Result<Download, ClientError> {
        self.require_login()?;
        let init = self
            .stamped(CommandCode::FileDownloadInitRequest)
            .with_meta(meta::FILE_ID, file_id.to_string());
        let response = self.conn.request(&init).await?;
        if !response.success() {
            return Err(Self::refusal(&response));
        }
        let info: DownloadInitInfo = Self::parse_payload(&response)?;

        let mut bytes = Vec::with_capacity(info.file_size as usize);
        for index in 0..info.total_chunks {
            let packet = self
                .stamped(CommandCode::FileDownloadChunkRequest)
                .with_meta(meta::FILE_ID, file_id.to_string())
                .with_meta(meta::CHUNK_INDEX, index.to_string());
            let response = self.conn.request(&packet).await?;
            if !response.success() {
                return Err(Self::refusal(&response));
            }
            bytes.extend_from_slice(&response.payload);
        }

        let complete = self
            .stamped(CommandCode::FileDownloadCompleteRequest)
            .with_meta(meta::FILE_ID, file_id.to_string());
        let response = self.conn.request(&complete).await?;
        if !response.success() {
            return Err(Self::refusal(&response));
        }

        if bytes.len() as u64 != info.file_size {
            return Err(ClientError::MalformedResponse(format!(
                "reassembled {} bytes, expected {}",
                bytes.len(),
                info.file_size
            )));
        }
        debug_assert_eq!(total_chunks(info.file_size), info.total_chunks);
        Ok(Download { info, bytes })
    }

    /// Download a file and write it to disk.
    pub async fn download_to(&mut self, file_id: Uuid, path: &Path) -> Result<(), ClientError> {
        let download = self.download(file_id).await?;
        tokio::fs::write(path, &download.bytes).await?;
        Ok(())
    }

    pub async fn delete_file(&mut self, file_id: Uuid) -> Result<FileOpResult, ClientError> {
        self.require_login()?;
        let request = self
            .stamped(CommandCode::FileDeleteRequest)
            .with_meta(meta::FILE_ID, file_id.to_string());
        let response = self.conn.request(&request).await?;
        if !response.success() {
            return Err(Self::refusal(&response));
        }
        Self::parse_payload(&response)
    }

    /// Reparent a file; `None` moves it to the root.
    pub async fn move_file(
        &mut self,
        file_id: Uuid,
        target_directory_id: Option<Uuid>,
    ) -> Result<FileOpResult, ClientError> {
        self.require_login()?;
        let request = self.stamped(CommandCode::FileMoveRequest).with_payload(
            serde_json::to_vec(&serde_json::json!({
                "fileId": file_id,
                "targetDirectoryId": target_directory_id,
            }))
            .expect("move request serializes"),
        );
        let response = self.conn.request(&request).await?;
        if !response.success() {
            return Err(Self::refusal(&response));
        }
        Self::parse_payload(&response)
    }

    pub async fn create_directory(
        &mut self,
        name: &str,
        parent_directory_id: Option<Uuid>,
    ) -> Result<DirectoryOpResult, ClientError> {
        self.require_login()?;
        let request = self.stamped(CommandCode::DirectoryCreateRequest).with_payload(
            serde_json::to_vec(&serde_json::json!({
                "directoryName": name,
                "parentDirectoryId": parent_directory_id,
            }))
            .expect("directory request serializes"),
        );
        let response = self.conn.request(&request).await?;
        if !response.success() {
            return Err(Self::refusal(&response));
        }
        Self::parse_payload(&response)
    }

    pub async fn list_directories(
        &mut self,
        parent_directory_id: Option<Uuid>,
    ) -> Result<Vec<DirectoryMetadata>, ClientError> {
        self.require_login()?;
        let mut request = self.stamped(CommandCode::DirectoryListRequest);
        if let Some(parent) = parent_directory_id {
            request = request.with_meta(meta::PARENT_DIRECTORY_ID, parent.to_string());
        }
        let response = self.conn.request(&request).await?;
        if !response.success() {
            return Err(Self::refusal(&response));
        }
        Self::parse_payload(&response)
    }

    /// Files and subdirectories of a directory (`None` = the root).
    pub async fn directory_contents(
        &mut self,
        directory_id: Option<Uuid>,
    ) -> Result<DirectoryContents, ClientError> {
        self.require_login()?;
        let target = directory_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| meta::ROOT.to_string());
        let request = self
            .stamped(CommandCode::DirectoryContentsRequest)
            .with_meta(meta::DIRECTORY_ID, target);
        let response = self.conn.request(&request).await?;
        if !response.success() {
            return Err(Self::refusal(&response));
        }
        Self::parse_payload(&response)
    }

    pub async fn rename_directory(
        &mut self,
        directory_id: Uuid,
        new_name: &str,
    ) -> Result<DirectoryOpResult, ClientError> {
        self.require_login()?;
        let request = self.stamped(CommandCode::DirectoryRenameRequest).with_payload(
            serde_json::to_vec(&serde_json::json!({
                "directoryId": directory_id,
                "newName": new_name,
            }))
            .expect("rename request serializes"),
        );
        let response = self.conn.request(&request).await?;
        if !response.success() {
            return Err(Self::refusal(&response));
        }
        Self::parse_payload(&response)
    }

    pub async fn delete_directory(
        &mut self,
        directory_id: Uuid,
        recursive: bool,
    ) -> Result<DirectoryOpResult, ClientError> {
        self.require_login()?;
        let request = self
            .stamped(CommandCode::DirectoryDeleteRequest)
            .with_meta(meta::DIRECTORY_ID, directory_id.to_string())
            .with_meta(meta::RECURSIVE, if recursive { "true" } else { "false" });
        let response = self.conn.request(&request).await?;
        if !response.success() {
            return Err(Self::refusal(&response));
        }
        Self::parse_payload(&response)
    }
}
