//
// Copyright (c) 2025 CUMULUS STORAGE CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: cumulus — Personal cloud file storage.
//

//! Client-side error type.

use cumulus_proto::WireError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("connection closed by server")]
    ConnectionClosed,

    #[error("connect failed: {0}")]
    ConnectFailed(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    /// The server answered but refused the request.
    #[error("request refused: {0}")]
    Refused(String),

    #[error("username and password must not be empty")]
    EmptyCredentials,

    #[error("not logged in")]
    NotLoggedIn,

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
