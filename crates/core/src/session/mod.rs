//
// Copyright (c) 2025 CUMULUS STORAGE CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: cumulus — Personal cloud file storage.
//

//! Per-connection session state machine.
//!
//! A session owns its connection and transfer state exclusively. The state
//! machine is the only place that decides whether a command is legal at the
//! current moment; handlers and the transfer coordinator only run once a
//! packet has been admitted here.
//!
//! ```text
//! AuthRequired ── login ok ──▶ Authenticated
//! AuthRequired ── create-account ok ──▶ AuthRequired
//! AuthRequired ── 5 failed logins ──▶ Disconnecting
//! Authenticated ── upload/download init ──▶ Transfer
//! Authenticated ── logout ──▶ Disconnecting
//! Transfer ── complete | error ──▶ Authenticated
//! ```

use chrono::{DateTime, Utc};
use cumulus_proto::{meta, CommandCode, CreateAccountRequest, LoginRequest, Packet};
use std::time::Instant;
use uuid::Uuid;

use crate::auth::{UserRole, MAX_LOGIN_ATTEMPTS};
use crate::error::{AuthError, ProtocolError};
use crate::handlers::{self, CommandContext};

pub mod transfer;

pub use transfer::{TransferContext, TransferDirection};

/// Session lifecycle state, tagged with the data each phase owns.
#[derive(Debug)]
pub enum SessionState {
    AuthRequired { failed_attempts: u32 },
    Authenticated,
    Transfer(TransferContext),
    Disconnecting,
}

impl SessionState {
    pub fn kind(&self) -> StateKind {
        match self {
            SessionState::AuthRequired { .. } => StateKind::AuthRequired,
            SessionState::Authenticated => StateKind::Authenticated,
            SessionState::Transfer(t) => match t.direction {
                TransferDirection::Upload => StateKind::TransferUpload,
                TransferDirection::Download => StateKind::TransferDownload,
            },
            SessionState::Disconnecting => StateKind::Disconnecting,
        }
    }
}

/// Flat state discriminant used for observation and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    AuthRequired,
    Authenticated,
    TransferUpload,
    TransferDownload,
    Disconnecting,
}

/// Synchronous notification emitted on every state transition.
#[derive(Debug, Clone, Copy)]
pub struct StateChanged {
    pub old: StateKind,
    pub new: StateKind,
    pub at: DateTime<Utc>,
}

pub type StateObserver = Box<dyn Fn(StateChanged) + Send + Sync>;

pub struct Session {
    id: Uuid,
    pub(crate) user_id: Option<Uuid>,
    pub(crate) state: SessionState,
    last_activity: Instant,
    observer: Option<StateObserver>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: None,
            state: SessionState::AuthRequired { failed_attempts: 0 },
            last_activity: Instant::now(),
            observer: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    pub fn state_kind(&self) -> StateKind {
        self.state.kind()
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Install a transition observer; replaces any previous one.
    pub fn set_observer(&mut self, observer: StateObserver) {
        self.observer = Some(observer);
    }

    pub(crate) fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub(crate) fn transition(&mut self, new: SessionState) {
        let change = StateChanged {
            old: self.state.kind(),
            new: new.kind(),
            at: Utc::now(),
        };
        tracing::debug!(
            session = %self.id,
            old = ?change.old,
            new = ?change.new,
            "session state changed"
        );
        self.state = new;
        if let Some(observer) = &self.observer {
            observer(change);
        }
    }

    /// Force the session toward closure, cancelling any in-flight transfer.
    /// Used for idle timeouts, shutdown, and transport failures.
    pub fn begin_disconnect(&mut self, reason: &str) {
        if let SessionState::Transfer(t) = &self.state {
            tracing::warn!(
                session = %self.id,
                file = %t.file.id,
                direction = ?t.direction,
                bytes = t.bytes_transferred,
                reason,
                "transfer cancelled"
            );
        }
        if !matches!(self.state, SessionState::Disconnecting) {
            self.transition(SessionState::Disconnecting);
        }
    }

    /// Whether the session has reached its terminal state.
    pub fn is_disconnecting(&self) -> bool {
        matches!(self.state, SessionState::Disconnecting)
    }

    /// Dispatch one packet according to the current state, producing the
    /// response to send back. Updates the activity clock.
    pub async fn handle_packet(&mut self, packet: Packet, ctx: &CommandContext) -> Packet {
        self.touch();
        match self.state.kind() {
            StateKind::AuthRequired => self.handle_auth_required(packet, ctx).await,
            StateKind::Authenticated => self.handle_authenticated(packet, ctx).await,
            StateKind::TransferUpload | StateKind::TransferDownload => {
                self.handle_transfer(packet, ctx).await
            }
            StateKind::Disconnecting => {
                Packet::error_response(&packet.user_id, "Session is disconnecting")
            }
        }
    }

    async fn handle_auth_required(&mut self, packet: Packet, ctx: &CommandContext) -> Packet {
        match packet.command {
            CommandCode::LoginRequest => self.login(packet, ctx).await,
            CommandCode::CreateAccountRequest => self.create_account(packet, ctx).await,
            _ => Packet::error_response("", "Authentication required"),
        }
    }

    async fn login(&mut self, packet: Packet, ctx: &CommandContext) -> Packet {
        let response = Packet::respond_to(&packet);
        let request: LoginRequest = match serde_json::from_slice(&packet.payload) {
            Ok(r) => r,
            Err(_) => {
                return response
                    .with_success(false)
                    .with_message("Malformed login request")
            }
        };

        // Empty submissions never reach the credential check and do not
        // consume one of the lockout attempts.
        if request.username.is_empty() || request.password.is_empty() {
            return response
                .with_success(false)
                .with_message("Username and password are required");
        }

        match ctx
            .users
            .validate_credentials(&request.username, &request.password)
            .await
        {
            Ok(Some(user)) => {
                self.user_id = Some(user.id);
                tracing::info!(session = %self.id, user = %user.username, "login succeeded");
                self.transition(SessionState::Authenticated);
                response
                    .with_user(user.id.to_string())
                    .with_meta(meta::USER_ID, user.id.to_string())
                    .with_success(true)
                    .with_message("Login successful")
            }
            Ok(None) => {
                let attempts = self.record_failed_login();
                tracing::warn!(
                    session = %self.id,
                    username = %request.username,
                    attempts,
                    "login failed"
                );
                if attempts >= MAX_LOGIN_ATTEMPTS {
                    self.transition(SessionState::Disconnecting);
                    response
                        .with_success(false)
                        .with_message(AuthError::MaxAttemptsExceeded.to_string())
                } else {
                    response
                        .with_success(false)
                        .with_message(AuthError::InvalidCredentials.to_string())
                }
            }
            Err(e) => {
                tracing::error!(session = %self.id, error = %e, "credential check failed");
                response
                    .with_success(false)
                    .with_message("Authentication error")
            }
        }
    }

    fn record_failed_login(&mut self) -> u32 {
        if let SessionState::AuthRequired { failed_attempts } = &mut self.state {
            *failed_attempts += 1;
            *failed_attempts
        } else {
            0
        }
    }

    async fn create_account(&mut self, packet: Packet, ctx: &CommandContext) -> Packet {
        let response = Packet::respond_to(&packet);
        let request: CreateAccountRequest = match serde_json::from_slice(&packet.payload) {
            Ok(r) => r,
            Err(_) => {
                return response
                    .with_success(false)
                    .with_message("Malformed account request")
            }
        };
        if request.username.is_empty() || request.password.is_empty() {
            return response
                .with_success(false)
                .with_message("Username and password are required");
        }

        match ctx
            .users
            .create_user(&request.username, &request.password, &request.email, UserRole::User)
            .await
        {
            Ok(user) => {
                if let Err(e) = ctx.storage.ensure_user_dir(user.id).await {
                    tracing::error!(user = %user.id, error = %e, "failed to provision user storage");
                }
                tracing::info!(session = %self.id, user = %user.username, "account created");
                // No auto-login: the session stays in AuthRequired.
                response
                    .with_meta(meta::USER_ID, user.id.to_string())
                    .with_success(true)
                    .with_message("Account created")
            }
            Err(AuthError::AccountExists(name)) => response
                .with_success(false)
                .with_message(format!("Username already exists: {name}")),
            Err(e) => {
                tracing::error!(session = %self.id, error = %e, "account creation failed");
                response
                    .with_success(false)
                    .with_message("Account creation failed")
            }
        }
    }

    /// Reject packets whose echoed user id does not match the session's.
    fn check_user_echo(&self, packet: &Packet) -> Result<Uuid, Packet> {
        let session_user = self.user_id.expect("authenticated session has a user");
        if packet.user_id != session_user.to_string() {
            tracing::warn!(
                session = %self.id,
                packet_user = %packet.user_id,
                "packet user id does not match session"
            );
            let err = ProtocolError::UserMismatch {
                packet: packet.user_id.clone(),
                session: session_user.to_string(),
            };
            return Err(Packet::error_response(
                &session_user.to_string(),
                err.to_string(),
            ));
        }
        Ok(session_user)
    }

    async fn handle_authenticated(&mut self, packet: Packet, ctx: &CommandContext) -> Packet {
        let user_id = match self.check_user_echo(&packet) {
            Ok(id) => id,
            Err(rejection) => return rejection,
        };

        match packet.command {
            CommandCode::LogoutRequest => {
                tracing::info!(session = %self.id, user = %user_id, "logout");
                let response = Packet::respond_to(&packet)
                    .with_success(true)
                    .with_message("Logged out");
                self.transition(SessionState::Disconnecting);
                response
            }
            CommandCode::FileUploadInitRequest => self.begin_upload(packet, user_id, ctx).await,
            CommandCode::FileDownloadInitRequest => self.begin_download(packet, user_id, ctx).await,
            CommandCode::FileListRequest
            | CommandCode::FileDeleteRequest
            | CommandCode::FileMoveRequest
            | CommandCode::DirectoryCreateRequest
            | CommandCode::DirectoryListRequest
            | CommandCode::DirectoryContentsRequest
            | CommandCode::DirectoryRenameRequest
            | CommandCode::DirectoryDeleteRequest => {
                handlers::dispatch(&packet, user_id, ctx).await
            }
            _ => Packet::error_response(
                &packet.user_id,
                "Command not supported in authenticated state",
            ),
        }
    }

    async fn handle_transfer(&mut self, packet: Packet, ctx: &CommandContext) -> Packet {
        let user_id = match self.check_user_echo(&packet) {
            Ok(id) => id,
            Err(rejection) => return rejection,
        };
        let direction = match &self.state {
            SessionState::Transfer(t) => t.direction,
            _ => unreachable!("handle_transfer outside Transfer state"),
        };

        match (direction, packet.command) {
            (TransferDirection::Upload, CommandCode::FileUploadChunkRequest) => {
                self.upload_chunk(packet, ctx).await
            }
            (TransferDirection::Upload, CommandCode::FileUploadCompleteRequest) => {
                self.complete_upload(packet, user_id, ctx).await
            }
            (TransferDirection::Download, CommandCode::FileDownloadChunkRequest) => {
                self.download_chunk(packet, ctx).await
            }
            (TransferDirection::Download, CommandCode::FileDownloadCompleteRequest) => {
                self.complete_download(packet, user_id)
            }
            (TransferDirection::Upload, _) => Packet::error_response(
                &packet.user_id,
                "Command not supported during upload",
            ),
            (TransferDirection::Download, _) => Packet::error_response(
                &packet.user_id,
                "Command not supported during download",
            ),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn transitions_notify_the_observer() {
        let seen: Arc<Mutex<Vec<(StateKind, StateKind)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let mut session = Session::new();
        assert_eq!(session.state_kind(), StateKind::AuthRequired);
        session.set_observer(Box::new(move |change| {
            sink.lock().unwrap().push((change.old, change.new));
        }));

        session.transition(SessionState::Authenticated);
        session.begin_disconnect("test");
        // Already terminal; a second disconnect does not re-fire.
        session.begin_disconnect("test again");

        let changes = seen.lock().unwrap();
        assert_eq!(
            *changes,
            vec![
                (StateKind::AuthRequired, StateKind::Authenticated),
                (StateKind::Authenticated, StateKind::Disconnecting),
            ]
        );
    }
}
