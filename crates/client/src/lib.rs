//
// Copyright (c) 2025 CUMULUS STORAGE CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: cumulus — Personal cloud file storage.
//

//! # Cumulus Client
//!
//! Client library for the cumulus cloud file storage service, speaking the
//! same framed packet protocol as the server ([`cumulus_proto`]).
//!
//! [`CloudClient`] is the high-level API: account creation, login, chunked
//! uploads and downloads, and file/directory management. [`ClientConnection`]
//! is the raw packet transport underneath it for callers that need to drive
//! the protocol directly.
//!
//! ```no_run
//! use cumulus_client::CloudClient;
//!
//! # async fn demo() -> Result<(), cumulus_client::ClientError> {
//! let mut client = CloudClient::connect("127.0.0.1:9000".parse().unwrap()).await?;
//! client.login("alice", "p@ss").await?;
//! let files = client.list_files().await?;
//! println!("{} files", files.len());
//! client.logout().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod connection;
pub mod error;

pub use client::{CloudClient, Download};
pub use connection::{connect_with_retry, ClientConnection, ConnectOptions};
pub use error::ClientError;
