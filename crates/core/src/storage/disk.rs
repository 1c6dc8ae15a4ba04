//
// Copyright (c) 2025 CUMULUS STORAGE CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: cumulus — Personal cloud file storage.
//

//! Filesystem storage backend.
//!
//! Layout under the data root:
//!
//! ```text
//! files/{user_id}/{file_id}/{index:05}.bin   chunk bytes
//! metadata/files.json                        file records
//! metadata/directories.json                  directory records
//! ```
//!
//! Metadata lives in memory behind mutexes and is re-serialized to disk
//! after each mutation; snapshots are taken under the lock and written
//! after it is released.

use async_trait::async_trait;
use cumulus_proto::{total_chunks, DirectoryMetadata, FileMetadata};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::StorageError;
use crate::storage::StorageBackend;

pub struct DiskStorage {
    root: PathBuf,
    files: Mutex<HashMap<Uuid, FileMetadata>>,
    directories: Mutex<HashMap<Uuid, DirectoryMetadata>>,
}

impl DiskStorage {
    /// Open (or create) a storage root, loading any existing metadata.
    pub fn open(root: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(root.join("files"))?;
        std::fs::create_dir_all(root.join("metadata"))?;

        let files = load_records::<FileMetadata>(&root.join("metadata/files.json"))?
            .into_iter()
            .map(|f| (f.id, f))
            .collect();
        let directories = load_records::<DirectoryMetadata>(&root.join("metadata/directories.json"))?
            .into_iter()
            .map(|d| (d.id, d))
            .collect();

        Ok(Self {
            root: root.to_path_buf(),
            files: Mutex::new(files),
            directories: Mutex::new(directories),
        })
    }

    fn chunk_dir(&self, file: &FileMetadata) -> PathBuf {
        self.root
            .join("files")
            .join(file.user_id.to_string())
            .join(file.id.to_string())
    }

    fn chunk_path(&self, file: &FileMetadata, index: u64) -> PathBuf {
        self.chunk_dir(file).join(format!("{:05}.bin", index))
    }

    fn file_record(&self, file_id: Uuid) -> Result<FileMetadata, StorageError> {
        self.files
            .lock()
            .expect("file metadata lock")
            .get(&file_id)
            .cloned()
            .ok_or(StorageError::UnknownFile(file_id))
    }

    fn dir_record(&self, id: Uuid) -> Result<DirectoryMetadata, StorageError> {
        self.directories
            .lock()
            .expect("directory metadata lock")
            .get(&id)
            .cloned()
            .ok_or(StorageError::UnknownDirectory(id))
    }

    async fn persist_files(&self) -> Result<(), StorageError> {
        let snapshot: Vec<FileMetadata> = {
            let guard = self.files.lock().expect("file metadata lock");
            let mut records: Vec<_> = guard.values().cloned().collect();
            records.sort_by_key(|f| (f.created_at, f.id));
            records
        };
        write_records(&self.root.join("metadata/files.json"), &snapshot).await
    }

    async fn persist_directories(&self) -> Result<(), StorageError> {
        let snapshot: Vec<DirectoryMetadata> = {
            let guard = self.directories.lock().expect("directory metadata lock");
            let mut records: Vec<_> = guard.values().cloned().collect();
            records.sort_by_key(|d| (d.created_at, d.id));
            records
        };
        write_records(&self.root.join("metadata/directories.json"), &snapshot).await
    }

    /// Ids of `dir` and every directory below it, for one user's forest.
    fn subtree_ids(&self, dir: Uuid) -> HashSet<Uuid> {
        let guard = self.directories.lock().expect("directory metadata lock");
        let mut ids = HashSet::from([dir]);
        let mut frontier = vec![dir];
        while let Some(parent) = frontier.pop() {
            for child in guard
                .values()
                .filter(|d| d.parent_directory_id == Some(parent))
            {
                if ids.insert(child.id) {
                    frontier.push(child.id);
                }
            }
        }
        ids
    }
}

fn load_records<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>, StorageError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

async fn write_records<T: serde::Serialize>(path: &Path, records: &[T]) -> Result<(), StorageError> {
    let json = serde_json::to_string_pretty(records)?;
    tokio::fs::write(path, json)
        .await
        .map_err(StorageError::Io)
}

#[async_trait]
impl StorageBackend for DiskStorage {
    async fn initialize_upload(&self, file: &FileMetadata) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(self.chunk_dir(file)).await?;
        self.files
            .lock()
            .expect("file metadata lock")
            .insert(file.id, file.clone());
        self.persist_files().await
    }

    async fn write_chunk(
        &self,
        file_id: Uuid,
        index: u64,
        bytes: &[u8],
        _is_last: bool,
    ) -> Result<(), StorageError> {
        let file = self.file_record(file_id)?;
        if index >= total_chunks(file.file_size) {
            return Err(StorageError::ChunkOutOfRange { file_id, index });
        }
        tokio::fs::write(self.chunk_path(&file, index), bytes).await?;
        Ok(())
    }

    async fn finalize_upload(&self, file_id: Uuid) -> Result<FileMetadata, StorageError> {
        let file = self.file_record(file_id)?;
        for index in 0..total_chunks(file.file_size) {
            if !self.chunk_path(&file, index).exists() {
                return Err(StorageError::MissingChunk { file_id, index });
            }
        }
        let updated = {
            let mut guard = self.files.lock().expect("file metadata lock");
            let record = guard
                .get_mut(&file_id)
                .ok_or(StorageError::UnknownFile(file_id))?;
            record.is_complete = true;
            record.updated_at = Utc::now();
            record.clone()
        };
        self.persist_files().await?;
        Ok(updated)
    }

    async fn read_chunk(&self, file_id: Uuid, index: u64) -> Result<(Vec<u8>, bool), StorageError> {
        let file = self.file_record(file_id)?;
        let total = total_chunks(file.file_size);
        if index >= total {
            return Err(StorageError::ChunkOutOfRange { file_id, index });
        }
        let path = self.chunk_path(&file, index);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::MissingChunk { file_id, index })
            }
            Err(e) => return Err(e.into()),
        };
        Ok((bytes, index == total - 1))
    }

    async fn delete_file(&self, file_id: Uuid) -> Result<(), StorageError> {
        let file = self.file_record(file_id)?;
        self.files
            .lock()
            .expect("file metadata lock")
            .remove(&file_id);
        self.persist_files().await?;
        match tokio::fs::remove_dir_all(self.chunk_dir(&file)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn file_by_id(&self, file_id: Uuid) -> Result<Option<FileMetadata>, StorageError> {
        Ok(self
            .files
            .lock()
            .expect("file metadata lock")
            .get(&file_id)
            .cloned())
    }

    async fn files_for_user(&self, user_id: Uuid) -> Result<Vec<FileMetadata>, StorageError> {
        let guard = self.files.lock().expect("file metadata lock");
        let mut files: Vec<_> = guard
            .values()
            .filter(|f| f.user_id == user_id)
            .cloned()
            .collect();
        files.sort_by_key(|f| (f.created_at, f.id));
        Ok(files)
    }

    async fn move_file(
        &self,
        file_id: Uuid,
        directory_id: Option<Uuid>,
    ) -> Result<FileMetadata, StorageError> {
        let updated = {
            let mut guard = self.files.lock().expect("file metadata lock");
            let record = guard
                .get_mut(&file_id)
                .ok_or(StorageError::UnknownFile(file_id))?;
            record.directory_id = directory_id;
            record.updated_at = Utc::now();
            record.clone()
        };
        self.persist_files().await?;
        Ok(updated)
    }

    async fn create_directory(&self, dir: DirectoryMetadata) -> Result<(), StorageError> {
        self.directories
            .lock()
            .expect("directory metadata lock")
            .insert(dir.id, dir);
        self.persist_directories().await
    }

    async fn directory_by_id(&self, id: Uuid) -> Result<Option<DirectoryMetadata>, StorageError> {
        Ok(self
            .directories
            .lock()
            .expect("directory metadata lock")
            .get(&id)
            .cloned())
    }

    async fn directories_for_user(
        &self,
        user_id: Uuid,
        parent: Option<Uuid>,
    ) -> Result<Vec<DirectoryMetadata>, StorageError> {
        let guard = self.directories.lock().expect("directory metadata lock");
        let mut dirs: Vec<_> = guard
            .values()
            .filter(|d| d.user_id == user_id && d.parent_directory_id == parent)
            .cloned()
            .collect();
        dirs.sort_by_key(|d| (d.created_at, d.id));
        Ok(dirs)
    }

    async fn rename_directory(
        &self,
        id: Uuid,
        new_name: &str,
    ) -> Result<DirectoryMetadata, StorageError> {
        let updated = {
            let mut guard = self.directories.lock().expect("directory metadata lock");
            let record = guard.get_mut(&id).ok_or(StorageError::UnknownDirectory(id))?;
            record.name = new_name.to_string();
            record.updated_at = Utc::now();
            record.clone()
        };
        self.persist_directories().await?;
        Ok(updated)
    }

    async fn delete_directory(&self, id: Uuid, recursive: bool) -> Result<(), StorageError> {
        self.dir_record(id)?;
        let subtree = self.subtree_ids(id);

        let contained_files: Vec<FileMetadata> = {
            let guard = self.files.lock().expect("file metadata lock");
            guard
                .values()
                .filter(|f| f.directory_id.is_some_and(|d| subtree.contains(&d)))
                .cloned()
                .collect()
        };

        if !recursive && (subtree.len() > 1 || !contained_files.is_empty()) {
            return Err(StorageError::DirectoryNotEmpty(id));
        }

        for file in &contained_files {
            self.delete_file(file.id).await?;
        }
        {
            let mut guard = self.directories.lock().expect("directory metadata lock");
            for dir_id in &subtree {
                guard.remove(dir_id);
            }
        }
        self.persist_directories().await
    }

    async fn directory_contents(
        &self,
        user_id: Uuid,
        directory_id: Option<Uuid>,
    ) -> Result<(Vec<FileMetadata>, Vec<DirectoryMetadata>), StorageError> {
        let files = {
            let guard = self.files.lock().expect("file metadata lock");
            let mut files: Vec<_> = guard
                .values()
                .filter(|f| f.user_id == user_id && f.directory_id == directory_id)
                .cloned()
                .collect();
            files.sort_by_key(|f| (f.created_at, f.id));
            files
        };
        let dirs = self.directories_for_user(user_id, directory_id).await?;
        Ok((files, dirs))
    }

    async fn ensure_user_dir(&self, user_id: Uuid) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(self.root.join("files").join(user_id.to_string()))
            .await
            .map_err(StorageError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_file(user_id: Uuid, size: u64) -> FileMetadata {
        FileMetadata::new_upload(
            user_id,
            "a.bin".into(),
            size,
            "application/octet-stream".into(),
            None,
        )
    }

    #[tokio::test]
    async fn chunk_lifecycle_round_trips() {
        let dir = tempdir().unwrap();
        let storage = DiskStorage::open(dir.path()).unwrap();
        let user = Uuid::new_v4();
        let file = sample_file(user, 2 * 1024 * 1024 + 512);

        storage.initialize_upload(&file).await.unwrap();
        storage
            .write_chunk(file.id, 0, &[1u8; 1024 * 1024], false)
            .await
            .unwrap();
        storage
            .write_chunk(file.id, 1, &[2u8; 1024 * 1024], false)
            .await
            .unwrap();
        storage
            .write_chunk(file.id, 2, &[3u8; 512], true)
            .await
            .unwrap();

        let finalized = storage.finalize_upload(file.id).await.unwrap();
        assert!(finalized.is_complete);

        let (first, last) = storage.read_chunk(file.id, 0).await.unwrap();
        assert_eq!(first.len(), 1024 * 1024);
        assert!(!last);
        let (tail, last) = storage.read_chunk(file.id, 2).await.unwrap();
        assert_eq!(tail, vec![3u8; 512]);
        assert!(last);
    }

    #[tokio::test]
    async fn finalize_refuses_missing_chunk() {
        let dir = tempdir().unwrap();
        let storage = DiskStorage::open(dir.path()).unwrap();
        let file = sample_file(Uuid::new_v4(), 3 * 1024 * 1024);
        storage.initialize_upload(&file).await.unwrap();
        storage
            .write_chunk(file.id, 0, &[0u8; 1024 * 1024], false)
            .await
            .unwrap();

        let err = storage.finalize_upload(file.id).await.unwrap_err();
        assert!(matches!(err, StorageError::MissingChunk { index: 1, .. }));
    }

    #[tokio::test]
    async fn chunk_index_out_of_range_is_rejected() {
        let dir = tempdir().unwrap();
        let storage = DiskStorage::open(dir.path()).unwrap();
        let file = sample_file(Uuid::new_v4(), 100);
        storage.initialize_upload(&file).await.unwrap();

        let err = storage
            .write_chunk(file.id, 1, &[0u8; 4], true)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ChunkOutOfRange { .. }));
        assert!(storage.read_chunk(file.id, 5).await.is_err());
    }

    #[tokio::test]
    async fn delete_file_removes_record_and_bytes() {
        let dir = tempdir().unwrap();
        let storage = DiskStorage::open(dir.path()).unwrap();
        let file = sample_file(Uuid::new_v4(), 10);
        storage.initialize_upload(&file).await.unwrap();
        storage.write_chunk(file.id, 0, b"0123456789", true).await.unwrap();

        storage.delete_file(file.id).await.unwrap();
        assert!(storage.file_by_id(file.id).await.unwrap().is_none());
        assert!(matches!(
            storage.read_chunk(file.id, 0).await.unwrap_err(),
            StorageError::UnknownFile(_)
        ));
    }

    #[tokio::test]
    async fn recursive_delete_takes_subtree_and_files() {
        let dir = tempdir().unwrap();
        let storage = DiskStorage::open(dir.path()).unwrap();
        let user = Uuid::new_v4();

        let top = DirectoryMetadata::new(user, "docs".into(), None);
        let nested = DirectoryMetadata::new(user, "inner".into(), Some(top.id));
        storage.create_directory(top.clone()).await.unwrap();
        storage.create_directory(nested.clone()).await.unwrap();

        let mut file = sample_file(user, 4);
        file.directory_id = Some(nested.id);
        storage.initialize_upload(&file).await.unwrap();
        storage.write_chunk(file.id, 0, b"data", true).await.unwrap();

        // refused while non-recursive
        assert!(storage.delete_directory(top.id, false).await.is_err());

        storage.delete_directory(top.id, true).await.unwrap();
        assert!(storage.directory_by_id(top.id).await.unwrap().is_none());
        assert!(storage.directory_by_id(nested.id).await.unwrap().is_none());
        assert!(storage.file_by_id(file.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn metadata_survives_reopen() {
        let dir = tempdir().unwrap();
        let user = Uuid::new_v4();
        let file = sample_file(user, 4);
        {
            let storage = DiskStorage::open(dir.path()).unwrap();
            storage.initialize_upload(&file).await.unwrap();
            storage.write_chunk(file.id, 0, b"abcd", true).await.unwrap();
            storage.finalize_upload(file.id).await.unwrap();
        }
        let storage = DiskStorage::open(dir.path()).unwrap();
        let reloaded = storage.file_by_id(file.id).await.unwrap().unwrap();
        assert!(reloaded.is_complete);
        assert_eq!(storage.files_for_user(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn move_file_reparents() {
        let dir = tempdir().unwrap();
        let storage = DiskStorage::open(dir.path()).unwrap();
        let user = Uuid::new_v4();
        let target = DirectoryMetadata::new(user, "dest".into(), None);
        storage.create_directory(target.clone()).await.unwrap();
        let file = sample_file(user, 4);
        storage.initialize_upload(&file).await.unwrap();

        let moved = storage.move_file(file.id, Some(target.id)).await.unwrap();
        assert_eq!(moved.directory_id, Some(target.id));
        let (files, _) = storage
            .directory_contents(user, Some(target.id))
            .await
            .unwrap();
        assert_eq!(files.len(), 1);
    }
}
