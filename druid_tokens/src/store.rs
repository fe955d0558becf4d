//! Durable storage for credentials
//!
//! A [`TokenStore`] holds raw records keyed by [`StoreKey`] and scoped to a
//! single account (the client id). It is the only shared mutable resource;
//! token managers keep no private copies and always read the current value
//! back from the store.

use std::{collections::HashMap, fmt, io, sync::Mutex};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::ClientIdRef;

#[cfg(feature = "file")]
mod file;

#[cfg(feature = "file")]
pub use file::FileTokenStore;

/// The records a store keeps for an account
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// The current client token
    ClientToken,
    /// The current user session
    UserSession,
    /// The profile of the logged-in user
    User,
    /// The last entrypoint settings fetched for the client
    EntrypointSettings,
}

impl StoreKey {
    /// All keys, in a stable order
    pub const ALL: [StoreKey; 4] = [
        StoreKey::ClientToken,
        StoreKey::UserSession,
        StoreKey::User,
        StoreKey::EntrypointSettings,
    ];

    /// The stable name of the record
    pub const fn as_str(self) -> &'static str {
        match self {
            StoreKey::ClientToken => "client_token",
            StoreKey::UserSession => "user_session",
            StoreKey::User => "user",
            StoreKey::EntrypointSettings => "entrypoint_settings",
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error reading or writing a store record
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying storage failed
    #[error("unable to access stored {key}")]
    Io {
        /// The record being accessed
        key: StoreKey,
        /// The underlying error
        #[source]
        source: io::Error,
    },
    /// A record could not be converted to or from JSON
    #[error("stored {key} is not valid")]
    Serialization {
        /// The record being accessed
        key: StoreKey,
        /// The underlying error
        #[source]
        source: serde_json::Error,
    },
}

/// Synchronous, thread-safe storage of credential records
///
/// Implementations must tolerate concurrent access from several managers
/// bound to the same account.
pub trait TokenStore: Send + Sync + fmt::Debug {
    /// The account these records belong to
    fn account(&self) -> &ClientIdRef;

    /// Loads the raw record stored under `key`
    fn load(&self, key: StoreKey) -> Result<Option<Vec<u8>>, StoreError>;

    /// Stores `value` under `key`, or deletes the record when `value` is `None`
    fn save(&self, key: StoreKey, value: Option<&[u8]>) -> Result<(), StoreError>;

    /// Deletes every record of the account
    fn reset(&self) -> Result<(), StoreError> {
        for key in StoreKey::ALL {
            self.save(key, None)?;
        }
        Ok(())
    }
}

/// Typed access to a [`TokenStore`]
pub trait TokenStoreExt: TokenStore {
    /// Loads and decodes the record under `key`
    fn get<T: DeserializeOwned>(&self, key: StoreKey) -> Result<Option<T>, StoreError> {
        match self.load(key)? {
            Some(raw) => serde_json::from_slice(&raw)
                .map(Some)
                .map_err(|source| StoreError::Serialization { key, source }),
            None => Ok(None),
        }
    }

    /// Encodes and stores `value` under `key`, deleting the record when `None`
    fn set<T: Serialize>(&self, key: StoreKey, value: Option<&T>) -> Result<(), StoreError> {
        match value {
            Some(value) => {
                let raw = serde_json::to_vec(value)
                    .map_err(|source| StoreError::Serialization { key, source })?;
                self.save(key, Some(&raw))
            }
            None => self.save(key, None),
        }
    }
}

impl<S: TokenStore + ?Sized> TokenStoreExt for S {}

/// A store that keeps records in process memory
#[derive(Debug)]
pub struct InMemoryTokenStore {
    account: crate::ClientId,
    records: Mutex<HashMap<StoreKey, Vec<u8>>>,
}

impl InMemoryTokenStore {
    /// Constructs an empty in-memory store for `account`
    pub fn new(account: impl Into<crate::ClientId>) -> Self {
        Self {
            account: account.into(),
            records: Mutex::new(HashMap::new()),
        }
    }

    fn records(&self) -> std::sync::MutexGuard<'_, HashMap<StoreKey, Vec<u8>>> {
        // A panic while holding the lock cannot leave a half-written record.
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl TokenStore for InMemoryTokenStore {
    fn account(&self) -> &ClientIdRef {
        &self.account
    }

    fn load(&self, key: StoreKey) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.records().get(&key).cloned())
    }

    fn save(&self, key: StoreKey, value: Option<&[u8]>) -> Result<(), StoreError> {
        let mut records = self.records();
        match value {
            Some(value) => {
                records.insert(key, value.to_vec());
            }
            None => {
                records.remove(&key);
            }
        }
        Ok(())
    }

    fn reset(&self) -> Result<(), StoreError> {
        self.records().clear();
        Ok(())
    }
}
