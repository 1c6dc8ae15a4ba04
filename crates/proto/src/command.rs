//
// Copyright (c) 2025 CUMULUS STORAGE CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: cumulus — Personal cloud file storage.
//

//! Command code enumeration for the cumulus wire protocol.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol command kinds. Every request has a paired response; [`CommandCode::Error`]
/// is the catch-all reply for requests that are illegal in the current session state.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CommandCode {
    LoginRequest = 1,
    LoginResponse = 2,
    LogoutRequest = 3,
    LogoutResponse = 4,
    CreateAccountRequest = 5,
    CreateAccountResponse = 6,
    FileListRequest = 10,
    FileListResponse = 11,
    FileUploadInitRequest = 12,
    FileUploadInitResponse = 13,
    FileUploadChunkRequest = 14,
    FileUploadChunkResponse = 15,
    FileUploadCompleteRequest = 16,
    FileUploadCompleteResponse = 17,
    FileDownloadInitRequest = 18,
    FileDownloadInitResponse = 19,
    FileDownloadChunkRequest = 20,
    FileDownloadChunkResponse = 21,
    FileDownloadCompleteRequest = 22,
    FileDownloadCompleteResponse = 23,
    FileDeleteRequest = 24,
    FileDeleteResponse = 25,
    FileMoveRequest = 26,
    FileMoveResponse = 27,
    DirectoryCreateRequest = 30,
    DirectoryCreateResponse = 31,
    DirectoryListRequest = 32,
    DirectoryListResponse = 33,
    DirectoryContentsRequest = 34,
    DirectoryContentsResponse = 35,
    DirectoryRenameRequest = 36,
    DirectoryRenameResponse = 37,
    DirectoryDeleteRequest = 38,
    DirectoryDeleteResponse = 39,
    Error = 99,
}

impl CommandCode {
    /// The response code paired with a request code. Returns [`CommandCode::Error`]
    /// for codes that are not requests.
    pub fn paired_response(self) -> CommandCode {
        use CommandCode::*;
        match self {
            LoginRequest => LoginResponse,
            LogoutRequest => LogoutResponse,
            CreateAccountRequest => CreateAccountResponse,
            FileListRequest => FileListResponse,
            FileUploadInitRequest => FileUploadInitResponse,
            FileUploadChunkRequest => FileUploadChunkResponse,
            FileUploadCompleteRequest => FileUploadCompleteResponse,
            FileDownloadInitRequest => FileDownloadInitResponse,
            FileDownloadChunkRequest => FileDownloadChunkResponse,
            FileDownloadCompleteRequest => FileDownloadCompleteResponse,
            FileDeleteRequest => FileDeleteResponse,
            FileMoveRequest => FileMoveResponse,
            DirectoryCreateRequest => DirectoryCreateResponse,
            DirectoryListRequest => DirectoryListResponse,
            DirectoryContentsRequest => DirectoryContentsResponse,
            DirectoryRenameRequest => DirectoryRenameResponse,
            DirectoryDeleteRequest => DirectoryDeleteResponse,
            _ => Error,
        }
    }

    /// Whether this code names a client-issued request.
    pub fn is_request(self) -> bool {
        use CommandCode::*;
        matches!(
            self,
            LoginRequest
                | LogoutRequest
                | CreateAccountRequest
                | FileListRequest
                | FileUploadInitRequest
                | FileUploadChunkRequest
                | FileUploadCompleteRequest
                | FileDownloadInitRequest
                | FileDownloadChunkRequest
                | FileDownloadCompleteRequest
                | FileDeleteRequest
                | FileMoveRequest
                | DirectoryCreateRequest
                | DirectoryListRequest
                | DirectoryContentsRequest
                | DirectoryRenameRequest
                | DirectoryDeleteRequest
        )
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_request_pairs_with_a_response() {
        use CommandCode::*;
        let requests = [
            LoginRequest,
            LogoutRequest,
            CreateAccountRequest,
            FileListRequest,
            FileUploadInitRequest,
            FileUploadChunkRequest,
            FileUploadCompleteRequest,
            FileDownloadInitRequest,
            FileDownloadChunkRequest,
            FileDownloadCompleteRequest,
            FileDeleteRequest,
            FileMoveRequest,
            DirectoryCreateRequest,
            DirectoryListRequest,
            DirectoryContentsRequest,
            DirectoryRenameRequest,
            DirectoryDeleteRequest,
        ];
        for req in requests {
            assert!(req.is_request());
            let resp = req.paired_response();
            assert_ne!(resp, Error, "{req} has no paired response");
            assert!(!resp.is_request());
        }
        assert_eq!(LoginResponse.paired_response(), Error);
    }
}
