//
// Copyright (c) 2025 CUMULUS STORAGE CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: cumulus — Personal cloud file storage.
//

//! JSON payload structures exchanged inside [`crate::Packet`] payloads, plus
//! the file and directory metadata records observable on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata record for a stored file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    /// Size in bytes, non-negative.
    pub file_size: u64,
    pub content_type: String,
    /// `None` = the user's root.
    pub directory_id: Option<Uuid>,
    /// False until the upload has been finalized.
    pub is_complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileMetadata {
    /// Create a fresh, incomplete record for a new upload.
    pub fn new_upload(
        user_id: Uuid,
        file_name: String,
        file_size: u64,
        content_type: String,
        directory_id: Option<Uuid>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            file_name,
            file_size,
            content_type,
            directory_id,
            is_complete: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Metadata record for a directory. Directories form a per-user forest;
/// `parent_directory_id == None` means the user's root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryMetadata {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub parent_directory_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_root: bool,
}

impl DirectoryMetadata {
    pub fn new(user_id: Uuid, name: String, parent_directory_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            name,
            parent_directory_id,
            created_at: now,
            updated_at: now,
            is_root: false,
        }
    }
}

/// `LOGIN_REQUEST` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// `CREATE_ACCOUNT_REQUEST` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: String,
}

/// `FILE_UPLOAD_INIT_REQUEST` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadInitRequest {
    pub file_name: String,
    pub file_size: u64,
    pub content_type: String,
}

/// `FILE_DOWNLOAD_INIT_RESPONSE` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadInitInfo {
    pub file_id: Uuid,
    pub file_name: String,
    pub file_size: u64,
    pub content_type: String,
    pub total_chunks: u64,
}

/// `FILE_MOVE_REQUEST` payload. `target_directory_id == None` moves the file
/// to the user's root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMoveRequest {
    pub file_id: Uuid,
    #[serde(default)]
    pub target_directory_id: Option<Uuid>,
}

/// `FILE_DELETE_RESPONSE` / `FILE_MOVE_RESPONSE` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOpResult {
    pub success: bool,
    pub file_id: Uuid,
    pub message: String,
}

/// `DIRECTORY_CREATE_REQUEST` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryCreateRequest {
    pub directory_name: String,
    #[serde(default)]
    pub parent_directory_id: Option<Uuid>,
}

/// `DIRECTORY_RENAME_REQUEST` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryRenameRequest {
    pub directory_id: Uuid,
    pub new_name: String,
}

/// `DIRECTORY_CREATE_RESPONSE` / `DIRECTORY_RENAME_RESPONSE` /
/// `DIRECTORY_DELETE_RESPONSE` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryOpResult {
    pub success: bool,
    #[serde(default)]
    pub directory_id: Option<Uuid>,
    #[serde(default)]
    pub directory_name: Option<String>,
    pub message: String,
}

/// `DIRECTORY_CONTENTS_RESPONSE` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryContents {
    pub files: Vec<FileMetadata>,
    pub directories: Vec<DirectoryMetadata>,
    /// The listed directory, or `None` for the user's root.
    pub directory_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_metadata_json_uses_camel_case() {
        let file = FileMetadata::new_upload(
            Uuid::new_v4(),
            "a.bin".into(),
            2_621_440,
            "application/octet-stream".into(),
            None,
        );
        let json = serde_json::to_string(&file).unwrap();
        assert!(json.contains("\"fileName\":\"a.bin\""));
        assert!(json.contains("\"isComplete\":false"));
        assert!(json.contains("\"directoryId\":null"));
        let back: FileMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, file);
    }

    #[test]
    fn upload_init_request_matches_wire_shape() {
        let req: UploadInitRequest = serde_json::from_str(
            r#"{"fileName":"a.bin","fileSize":2621440,"contentType":"application/octet-stream"}"#,
        )
        .unwrap();
        assert_eq!(req.file_name, "a.bin");
        assert_eq!(req.file_size, 2_621_440);
    }

    #[test]
    fn create_account_email_is_optional() {
        let req: CreateAccountRequest =
            serde_json::from_str(r#"{"username":"alice","password":"p@ss"}"#).unwrap();
        assert_eq!(req.email, "");
    }
}
