//
// Copyright (c) 2025 CUMULUS STORAGE CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: cumulus — Personal cloud file storage.
//

//! Server runtime configuration.
//!
//! A `ServerConfig` value is built once at startup and handed by reference
//! (or `Arc`) to every component that needs it; there is no global state.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the cumulus server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the acceptor binds.
    pub bind_addr: SocketAddr,
    /// Root of the on-disk data layout (`users/`, `metadata/`, `files/`).
    pub data_dir: PathBuf,
    /// Upper bound on simultaneously live sessions.
    pub max_sessions: usize,
    /// Idle time after which a session is forcibly disconnected.
    pub session_timeout: Duration,
    /// How often the idle sweep scans the session registry.
    pub sweep_interval: Duration,
    /// Socket read/write buffer size hint for chunked reads.
    pub network_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:9000".parse().expect("static addr"),
            data_dir: PathBuf::from("data"),
            max_sessions: 100,
            session_timeout: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(30),
            network_buffer: 8 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_constants() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.max_sessions, 100);
        assert_eq!(config.session_timeout, Duration::from_secs(1800));
        assert!(config.sweep_interval <= Duration::from_secs(60));
    }
}
