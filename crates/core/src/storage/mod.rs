//
// Copyright (c) 2025 CUMULUS STORAGE CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: cumulus — Personal cloud file storage.
//

//! Storage backend abstraction: chunk bytes plus file/directory metadata.

use async_trait::async_trait;
use cumulus_proto::{DirectoryMetadata, FileMetadata};
use uuid::Uuid;

use crate::error::StorageError;

pub mod disk;

pub use disk::DiskStorage;

/// Per-user file and directory metadata plus chunk byte storage.
///
/// Callers are responsible for ownership checks; the backend trusts the ids
/// it is given. Writes to the same `file_id` must be serialized by the
/// caller (the per-session one-transfer rule provides this).
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Register a new incomplete file record and prepare its chunk storage.
    async fn initialize_upload(&self, file: &FileMetadata) -> Result<(), StorageError>;

    /// Durably write one chunk. `index` must be within the file's chunk range.
    async fn write_chunk(
        &self,
        file_id: Uuid,
        index: u64,
        bytes: &[u8],
        is_last: bool,
    ) -> Result<(), StorageError>;

    /// Verify every chunk is present and mark the file complete.
    async fn finalize_upload(&self, file_id: Uuid) -> Result<FileMetadata, StorageError>;

    /// Read one chunk; the flag is true for the file's final chunk.
    async fn read_chunk(&self, file_id: Uuid, index: u64) -> Result<(Vec<u8>, bool), StorageError>;

    /// Remove a file record and its chunk bytes.
    async fn delete_file(&self, file_id: Uuid) -> Result<(), StorageError>;

    async fn file_by_id(&self, file_id: Uuid) -> Result<Option<FileMetadata>, StorageError>;

    async fn files_for_user(&self, user_id: Uuid) -> Result<Vec<FileMetadata>, StorageError>;

    /// Reparent a file; `directory_id == None` moves it to the user's root.
    async fn move_file(
        &self,
        file_id: Uuid,
        directory_id: Option<Uuid>,
    ) -> Result<FileMetadata, StorageError>;

    async fn create_directory(&self, dir: DirectoryMetadata) -> Result<(), StorageError>;

    async fn directory_by_id(&self, id: Uuid) -> Result<Option<DirectoryMetadata>, StorageError>;

    /// Child directories of `parent` (`None` = the user's root).
    async fn directories_for_user(
        &self,
        user_id: Uuid,
        parent: Option<Uuid>,
    ) -> Result<Vec<DirectoryMetadata>, StorageError>;

    async fn rename_directory(
        &self,
        id: Uuid,
        new_name: &str,
    ) -> Result<DirectoryMetadata, StorageError>;

    /// Delete a directory. With `recursive` the whole subtree goes, contained
    /// files included; without it a non-empty directory is refused.
    async fn delete_directory(&self, id: Uuid, recursive: bool) -> Result<(), StorageError>;

    /// Files and child directories directly inside `directory_id`
    /// (`None` = the user's root).
    async fn directory_contents(
        &self,
        user_id: Uuid,
        directory_id: Option<Uuid>,
    ) -> Result<(Vec<FileMetadata>, Vec<DirectoryMetadata>), StorageError>;

    /// Provision the per-user storage area; called at account creation.
    async fn ensure_user_dir(&self, user_id: Uuid) -> Result<(), StorageError>;
}
