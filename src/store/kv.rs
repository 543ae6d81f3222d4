// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A named key/value namespace backed by an embedded SQLite file.
//!
//! The protocol core only needs an opaque byte-map that survives restart:
//! `open` by name, `put`/`get` for byte strings and fixed-width integers,
//! and the primary-key bootstrap used once at startup. One database file
//! per namespace, single `kv` table, keys and values stored as opaque
//! blobs.

use std::{fs, path::Path};

use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS kv (
    key   BLOB PRIMARY KEY,
    value BLOB NOT NULL
) WITHOUT ROWID";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt integer value under key {0:?}")]
    CorruptInt(Vec<u8>),
}

/// One open namespace. Closed on drop.
#[derive(Debug)]
pub struct Store {
    name: String,
    conn: Connection,
}

impl Store {
    /// Open (or create) the namespace `<dir>/<name>.db3`.
    pub fn open(dir: &Path, name: &str) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)?;
        let conn = Connection::open(dir.join(format!("{name}.db3")))?;
        conn.execute_batch(CREATE_TABLE)?;
        Ok(Self {
            name: name.to_string(),
            conn,
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn put_bytes(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_bytes(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let row = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |r| {
                r.get::<_, Vec<u8>>(0)
            })
            .optional()?;
        Ok(row)
    }

    /// Store a fixed-width integer in host-native layout. The store is
    /// local to one machine, so no cross-host portability is required.
    pub fn put_int(&self, key: &[u8], value: i32) -> Result<(), StoreError> {
        self.put_bytes(key, &value.to_ne_bytes())
    }

    pub fn get_int(&self, key: &[u8]) -> Result<Option<i32>, StoreError> {
        match self.get_bytes(key)? {
            None => Ok(None),
            Some(raw) => {
                let arr: [u8; 4] = raw
                    .as_slice()
                    .try_into()
                    .map_err(|_| StoreError::CorruptInt(key.to_vec()))?;
                Ok(Some(i32::from_ne_bytes(arr)))
            },
        }
    }

    /// Primary-key bootstrap: load `pk_name` if it exists, otherwise store
    /// `counter` as the initial value. Returns the effective counter.
    pub fn init_pk(&self, pk_name: &[u8], counter: i32) -> Result<i32, StoreError> {
        match self.get_int(pk_name)? {
            Some(existing) => Ok(existing),
            None => {
                self.put_int(pk_name, counter)?;
                Ok(counter)
            },
        }
    }

    /// Largest integer value in the namespace, skipping entries that are
    /// not integer-shaped. Used by startup recovery to re-derive the next
    /// user id from the index namespace.
    pub fn max_int_value(&self) -> Result<Option<i32>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv")?;
        let rows = stmt.query_map([], |r| r.get::<_, Vec<u8>>(0))?;

        let mut max = None;
        for row in rows {
            let raw = row?;
            if let Ok(arr) = <[u8; 4]>::try_from(raw.as_slice()) {
                let v = i32::from_ne_bytes(arr);
                max = Some(max.map_or(v, |m: i32| m.max(v)));
            }
        }
        Ok(max)
    }
}
