//! Credential sources backed by the authorization server
//!
//! Both sources talk to the token endpoint through a [`Dispatcher`], which
//! never attaches a bearer, so issuing or refreshing a credential can never
//! recurse into the managers these sources feed.

use std::sync::Arc;

use async_trait::async_trait;
use druid_reqwest::{Dispatcher, RequestSpec};
use druid_tokens::{
    source::CredentialSource,
    store::{StoreKey, TokenStore, TokenStoreExt},
    AuthError, ClientToken, UserSession,
};
use url::Url;

use crate::dto::{ClientCredentials, ClientCredentialsGrant, RefreshTokenGrant};

/// Issues client tokens with the client-credentials grant
#[derive(Debug)]
pub struct ClientCredentialsSource {
    dispatcher: Dispatcher,
    token_url: Url,
    credentials: Arc<ClientCredentials>,
}

impl ClientCredentialsSource {
    /// Constructs a source posting `credentials` to `token_url`
    pub fn new(dispatcher: Dispatcher, token_url: Url, credentials: Arc<ClientCredentials>) -> Self {
        Self {
            dispatcher,
            token_url,
            credentials,
        }
    }
}

#[async_trait]
impl CredentialSource<ClientToken> for ClientCredentialsSource {
    #[tracing::instrument(
        name = "client_credentials",
        skip(self),
        fields(client_id = %self.credentials.client_id, url = %self.token_url)
    )]
    async fn request_credential(&self) -> Result<Option<ClientToken>, AuthError> {
        tracing::debug!("requesting client token");
        let spec = RequestSpec::post(self.token_url.clone())
            .form(&ClientCredentialsGrant(&self.credentials))?;
        let token = self.dispatcher.send_json(&spec).await?;
        Ok(Some(token))
    }
}

/// Renews the user session by exchanging the stored refresh token
///
/// Produces nothing, without contacting the backend, when the store holds no
/// refresh token.
#[derive(Debug)]
pub struct RefreshTokenSource {
    dispatcher: Dispatcher,
    token_url: Url,
    credentials: Arc<ClientCredentials>,
    store: Arc<dyn TokenStore>,
}

impl RefreshTokenSource {
    /// Constructs a source exchanging the refresh token held in `store`
    pub fn new(
        dispatcher: Dispatcher,
        token_url: Url,
        credentials: Arc<ClientCredentials>,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            dispatcher,
            token_url,
            credentials,
            store,
        }
    }
}

#[async_trait]
impl CredentialSource<UserSession> for RefreshTokenSource {
    #[tracing::instrument(
        name = "refresh_token",
        skip(self),
        fields(client_id = %self.credentials.client_id, url = %self.token_url)
    )]
    async fn request_credential(&self) -> Result<Option<UserSession>, AuthError> {
        let stored: Option<UserSession> = self.store.get(StoreKey::UserSession)?;
        let Some(refresh_token) = stored
            .as_ref()
            .and_then(UserSession::refresh_token)
            .filter(|rt| !rt.as_str().is_empty())
        else {
            tracing::warn!("no refresh token stored");
            return Ok(None);
        };

        tracing::debug!("exchanging refresh token");
        let spec = RequestSpec::post(self.token_url.clone()).form(&RefreshTokenGrant {
            credentials: &self.credentials,
            refresh_token,
        })?;
        let session = self.dispatcher.send_json(&spec).await?;
        Ok(Some(session))
    }
}
