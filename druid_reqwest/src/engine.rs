//! Sending requests, with or without a bearer credential

use std::{error, sync::Arc};

use aliri_clock::{Clock, System};
use bytes::{BufMut, Bytes, BytesMut};
use druid_tokens::{
    source::Credential, AccessTokenRef, AuthError, ClientTokenManager, TokenManager,
    UserTokenManager,
};
use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    StatusCode,
};
use serde::de::DeserializeOwned;

use crate::{
    transport::{HttpRequest, HttpResponse, Transport},
    RequestSpec,
};

/// Which credential, if any, authorizes a request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthKind {
    /// Send without an `Authorization` header
    None,
    /// Authorize with the application-level client token
    Client,
    /// Authorize with the user-level access token
    User,
}

/// Sends requests without consulting any credential manager
///
/// This is what credential sources use to reach the token endpoint, since
/// they cannot depend on the managers they feed.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    accept_language: HeaderValue,
}

impl Dispatcher {
    /// Constructs a dispatcher sending `Accept-Language: en`
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            accept_language: HeaderValue::from_static("en"),
        }
    }

    /// Sets the `Accept-Language` value sent with every request
    pub fn with_accept_language(mut self, language: &str) -> Result<Self, AuthError> {
        self.accept_language = HeaderValue::from_str(language).map_err(AuthError::encoding)?;
        Ok(self)
    }

    /// The `Accept-Language` value sent with every request
    pub fn accept_language(&self) -> &HeaderValue {
        &self.accept_language
    }

    /// Sends the request and returns the body of a successful response
    ///
    /// Any non-success status, 401 included, is returned as [`AuthError::Http`].
    pub async fn send(&self, spec: &RequestSpec) -> Result<Bytes, AuthError> {
        let response = self.dispatch(spec, None).await?;
        into_body(response)
    }

    /// Sends the request and decodes the JSON body of a successful response
    pub async fn send_json<T: DeserializeOwned>(&self, spec: &RequestSpec) -> Result<T, AuthError> {
        decode(&self.send(spec).await?)
    }

    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(method = %spec.method(), url = %spec.url(), authorized = bearer.is_some()),
    )]
    async fn dispatch(
        &self,
        spec: &RequestSpec,
        bearer: Option<&AccessTokenRef>,
    ) -> Result<HttpResponse, AuthError> {
        let request = HttpRequest {
            method: spec.method().clone(),
            url: spec.url().clone(),
            headers: self.headers_for(spec, bearer)?,
            body: spec.body().map(|b| b.bytes().clone()),
        };

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(error) => {
                let cause: &dyn error::Error = &*error;
                tracing::warn!(error = cause, "request was not sent");
                return Err(AuthError::transport(error));
            }
        };

        tracing::debug!(status = response.status.as_u16(), "received response");
        Ok(response)
    }

    fn headers_for(
        &self,
        spec: &RequestSpec,
        bearer: Option<&AccessTokenRef>,
    ) -> Result<HeaderMap, AuthError> {
        let mut headers = HeaderMap::with_capacity(spec.headers().len() + 3);
        headers.insert(header::ACCEPT_LANGUAGE, self.accept_language.clone());

        for (name, value) in spec.headers() {
            headers.entry(name).or_insert_with(|| value.clone());
        }

        if let Some(body) = spec.body() {
            headers.insert(header::CONTENT_TYPE, body.content_type().header_value());
        }

        if let Some(bearer) = bearer {
            headers.insert(header::AUTHORIZATION, bearer_value(bearer)?);
        }

        Ok(headers)
    }
}

fn bearer_value(token: &AccessTokenRef) -> Result<HeaderValue, AuthError> {
    let mut header_value = BytesMut::with_capacity(token.as_str().len() + 7);
    header_value.put_slice(b"Bearer ");
    header_value.put_slice(token.as_str().as_bytes());
    let mut value =
        HeaderValue::from_maybe_shared(header_value.freeze()).map_err(AuthError::encoding)?;
    value.set_sensitive(true);
    Ok(value)
}

fn into_body(response: HttpResponse) -> Result<Bytes, AuthError> {
    if response.status.is_success() {
        Ok(response.body)
    } else {
        Err(AuthError::Http {
            status: response.status.as_u16(),
            body: Arc::from(&response.body[..]),
        })
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, AuthError> {
    serde_json::from_slice(body).map_err(AuthError::decoding)
}

/// Sends requests authorized by the client or user credential
///
/// A request rejected with `401 Unauthorized` is retried exactly once, after
/// forcing a refresh of the credential it was sent with. A second rejection
/// fails with [`AuthError::InvalidClientToken`] or
/// [`AuthError::InvalidUserToken`]. No other status is retried.
#[derive(Clone, Debug)]
pub struct RequestEngine<C = System> {
    dispatcher: Dispatcher,
    client_tokens: ClientTokenManager<C>,
    user_tokens: UserTokenManager<C>,
}

impl<C> RequestEngine<C>
where
    C: Clock + Send + Sync + 'static,
{
    /// Constructs an engine from its dispatcher and both credential managers
    pub fn new(
        dispatcher: Dispatcher,
        client_tokens: ClientTokenManager<C>,
        user_tokens: UserTokenManager<C>,
    ) -> Self {
        Self {
            dispatcher,
            client_tokens,
            user_tokens,
        }
    }

    /// The dispatcher used for every send
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// The manager of the client token
    pub fn client_tokens(&self) -> &ClientTokenManager<C> {
        &self.client_tokens
    }

    /// The manager of the user session
    pub fn user_tokens(&self) -> &UserTokenManager<C> {
        &self.user_tokens
    }

    /// Sends the request and returns the body of a successful response
    pub async fn send(&self, spec: &RequestSpec, auth: AuthKind) -> Result<Bytes, AuthError> {
        match auth {
            AuthKind::None => self.dispatcher.send(spec).await,
            AuthKind::Client => send_authorized(&self.dispatcher, &self.client_tokens, spec).await,
            AuthKind::User => send_authorized(&self.dispatcher, &self.user_tokens, spec).await,
        }
    }

    /// Sends the request and decodes the JSON body of a successful response
    ///
    /// A body that is not valid JSON for `T` fails with [`AuthError::Decoding`].
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        spec: &RequestSpec,
        auth: AuthKind,
    ) -> Result<T, AuthError> {
        decode(&self.send(spec, auth).await?)
    }
}

async fn send_authorized<T, C>(
    dispatcher: &Dispatcher,
    manager: &TokenManager<T, C>,
    spec: &RequestSpec,
) -> Result<Bytes, AuthError>
where
    T: Credential,
    C: Clock + Send + Sync + 'static,
{
    let mut credential = manager.valid_token().await?;
    let mut allow_retry = true;

    loop {
        let bearer = credential
            .bearer()
            .ok_or(AuthError::MissingCredential(T::KIND))?;

        let response = dispatcher.dispatch(spec, Some(bearer)).await?;
        if response.status != StatusCode::UNAUTHORIZED {
            return into_body(response);
        }

        if !allow_retry {
            tracing::warn!(credential = %T::KIND, "credential rejected after refresh");
            return Err(AuthError::rejected(T::KIND));
        }

        tracing::debug!(credential = %T::KIND, "credential rejected, forcing refresh");
        allow_retry = false;
        credential = manager.force_refresh().await?;
    }
}
