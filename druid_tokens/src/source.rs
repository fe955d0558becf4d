//! Credential sources and the credential contract

use std::future::Future;

use aliri_clock::UnixTime;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    store::StoreKey, AccessTokenRef, AuthError, ClientToken, CredentialKind, UserSession,
};

/// An asynchronous source of fresh credentials
///
/// For client tokens this performs a new client-credentials grant. For user
/// sessions this exchanges the stored refresh token. Returning `Ok(None)`
/// means no credential could be produced.
///
/// Any `Fn() -> impl Future<Output = Result<Option<T>, AuthError>>` closure
/// is a source.
#[async_trait]
pub trait CredentialSource<T>: Send + Sync {
    /// Requests a new credential
    async fn request_credential(&self) -> Result<Option<T>, AuthError>;
}

#[async_trait]
impl<T, F, Fut> CredentialSource<T> for F
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<T>, AuthError>> + Send,
{
    async fn request_credential(&self) -> Result<Option<T>, AuthError> {
        (self)().await
    }
}

/// A credential managed by a [`TokenManager`][crate::TokenManager]
pub trait Credential:
    Clone + Serialize + DeserializeOwned + Send + Sync + std::fmt::Debug + 'static
{
    /// Which kind of credential this is
    const KIND: CredentialKind;

    /// The store record holding the current value
    const STORE_KEY: StoreKey;

    /// Whether the credential is usable as of `now`
    fn is_valid_at(&self, now: UnixTime) -> bool;

    /// The bearer token to attach to requests
    fn bearer(&self) -> Option<&AccessTokenRef>;

    /// Whether a refresh can be attempted given the stored value
    fn can_refresh(stored: Option<&Self>) -> bool;

    /// Reconciles a refreshed value with the value it replaces
    fn reconcile(self, stored: Option<&Self>) -> Self;
}

impl Credential for ClientToken {
    const KIND: CredentialKind = CredentialKind::Client;
    const STORE_KEY: StoreKey = StoreKey::ClientToken;

    fn is_valid_at(&self, now: UnixTime) -> bool {
        ClientToken::is_valid_at(self, now)
    }

    fn bearer(&self) -> Option<&AccessTokenRef> {
        Some(self.access_token())
    }

    /// A client token is always issued from scratch.
    fn can_refresh(_: Option<&Self>) -> bool {
        true
    }

    fn reconcile(self, _: Option<&Self>) -> Self {
        self
    }
}

impl Credential for UserSession {
    const KIND: CredentialKind = CredentialKind::User;
    const STORE_KEY: StoreKey = StoreKey::UserSession;

    fn is_valid_at(&self, now: UnixTime) -> bool {
        UserSession::is_valid_at(self, now)
    }

    fn bearer(&self) -> Option<&AccessTokenRef> {
        self.access_token()
    }

    fn can_refresh(stored: Option<&Self>) -> bool {
        stored
            .and_then(UserSession::refresh_token)
            .map_or(false, |rt| !rt.as_str().is_empty())
    }

    fn reconcile(self, stored: Option<&Self>) -> Self {
        self.merge_previous(stored)
    }
}
