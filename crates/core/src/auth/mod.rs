//
// Copyright (c) 2025 CUMULUS STORAGE CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: cumulus — Personal cloud file storage.
//

//! Credential verification and user records.

pub mod password;
pub mod users;

pub use password::{hash_password, verify_password, PBKDF2_ITERATIONS, SALT_LEN};
pub use users::{JsonUserStore, User, UserRepository, UserRole};

/// Failed logins allowed on one connection before it is closed.
pub const MAX_LOGIN_ATTEMPTS: u32 = 5;
