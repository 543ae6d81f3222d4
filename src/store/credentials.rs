// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The credential store the protocol handlers call.
//!
//! Three namespaces, distinguished by name:
//! * `user_db`  — username bytes → password bytes
//! * `index_db` — username bytes → 16-bit user id
//! * `meta_db`  — `USER_PK` → next user id
//!
//! Handles stay open for the lifetime of the process and are threaded
//! through the dispatcher context. `next_user_id` lives in memory and is
//! persisted lazily on every diagnostic tick and on clean shutdown; a
//! crash in between is recovered at startup by also scanning the index
//! namespace for the largest assigned id.

use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use crate::store::kv::{Store, StoreError};

/// Meta key holding the next user id to assign.
pub const USER_PK: &[u8] = b"USER_PK";

const USER_DB: &str = "user_db";
const INDEX_DB: &str = "index_db";
const META_DB: &str = "meta_db";

/// First user id ever assigned.
const FIRST_USER_ID: u16 = 1;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("user already exists")]
    UserExists,
    #[error("unknown user")]
    UnknownUser,
    #[error("password mismatch")]
    BadPassword,
    #[error("user has no index entry")]
    MissingIndex,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug)]
pub struct CredentialStore {
    users: Store,
    index: Store,
    meta: Store,
    next_user_id: u16,
}

impl CredentialStore {
    /// Open the three namespaces and recover the user-id counter.
    ///
    /// The effective counter is the larger of the persisted `USER_PK` and
    /// one past the largest id found in the index namespace, so ids stay
    /// unique even if the last persist was lost.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        let users = Store::open(dir, USER_DB)?;
        let index = Store::open(dir, INDEX_DB)?;
        let meta = Store::open(dir, META_DB)?;

        let persisted = meta.init_pk(USER_PK, i32::from(FIRST_USER_ID))?;
        let recovered = index
            .max_int_value()?
            .map_or(i32::from(FIRST_USER_ID), |m| m.saturating_add(1));

        let next = persisted
            .max(recovered)
            .clamp(i32::from(FIRST_USER_ID), i32::from(u16::MAX))
            as u16;
        if next != persisted as u16 {
            debug!(persisted, recovered, "user pk recovered from index");
            meta.put_int(USER_PK, i32::from(next))?;
        }
        info!(next_user_id = next, "credential store open");

        Ok(Self {
            users,
            index,
            meta,
            next_user_id: next,
        })
    }

    #[inline]
    pub fn next_user_id(&self) -> u16 {
        self.next_user_id
    }

    /// Create a new account, assigning the next user id.
    pub fn create(&mut self, username: &[u8], password: &[u8]) -> Result<u16, AccountError> {
        if self.users.get_bytes(username)?.is_some() {
            return Err(AccountError::UserExists);
        }

        let uid = self.next_user_id;
        self.users.put_bytes(username, password)?;
        self.index.put_int(username, i32::from(uid))?;
        self.next_user_id = self.next_user_id.wrapping_add(1);
        debug!(uid, "account created");
        Ok(uid)
    }

    /// Check credentials and return the stored user id.
    pub fn login(&self, username: &[u8], password: &[u8]) -> Result<u16, AccountError> {
        let stored = self
            .users
            .get_bytes(username)?
            .ok_or(AccountError::UnknownUser)?;
        if stored != password {
            return Err(AccountError::BadPassword);
        }
        self.user_id_of(username)?.ok_or(AccountError::MissingIndex)
    }

    /// Replace the stored password. The username must already exist.
    pub fn edit_password(&self, username: &[u8], new_password: &[u8]) -> Result<(), AccountError> {
        if self.users.get_bytes(username)?.is_none() {
            return Err(AccountError::UnknownUser);
        }
        self.users.put_bytes(username, new_password)?;
        Ok(())
    }

    pub fn user_id_of(&self, username: &[u8]) -> Result<Option<u16>, StoreError> {
        Ok(self
            .index
            .get_int(username)?
            .and_then(|v| u16::try_from(v).ok()))
    }

    /// Persist the in-memory counter; called on each diagnostic tick and
    /// on clean shutdown.
    pub fn persist_pk(&self) -> Result<(), StoreError> {
        self.meta.put_int(USER_PK, i32::from(self.next_user_id))
    }
}
