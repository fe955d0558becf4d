//! Errors surfaced by the token managers and the request engine

use std::{error, fmt, sync::Arc};

use thiserror::Error;

use crate::store::StoreError;

/// A boxed, shareable cause
pub type SharedCause = Arc<dyn error::Error + Send + Sync + 'static>;

/// The kind of credential an operation was concerned with
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    /// The application-level client token
    Client,
    /// The user-level session
    User,
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => f.write_str("client token"),
            Self::User => f.write_str("user session"),
        }
    }
}

/// An error obtaining a credential or performing an authenticated request
///
/// Cloning is cheap, which allows a single refresh failure to be handed to
/// every caller that joined the refresh.
#[derive(Clone, Debug, Error)]
pub enum AuthError {
    /// No usable credential is stored and none could be obtained
    #[error("no usable {0} is available")]
    MissingCredential(CredentialKind),

    /// The backend rejected the client token even after a refresh
    #[error("client token was rejected by the backend")]
    InvalidClientToken,

    /// The backend rejected the user access token even after a refresh
    #[error("user access token was rejected by the backend")]
    InvalidUserToken,

    /// A request payload could not be encoded
    #[error("unable to encode request payload")]
    Encoding(#[source] SharedCause),

    /// A response body could not be decoded
    #[error("unable to decode response body")]
    Decoding(#[source] SharedCause),

    /// The backend answered with a non-success status
    #[error("backend responded with HTTP {status}")]
    Http {
        /// The response status code
        status: u16,
        /// The raw response body
        body: Arc<[u8]>,
    },

    /// The request never produced a response
    #[error("transport failure")]
    Transport(#[source] SharedCause),

    /// The token store failed
    #[error("token store failure")]
    Store(#[source] Arc<StoreError>),

    /// An invariant inside the SDK was violated
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Wraps a serialization fault raised while building a request
    pub fn encoding<E>(cause: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        Self::Encoding(Arc::new(cause))
    }

    /// Wraps a deserialization fault raised while reading a response
    pub fn decoding<E>(cause: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        Self::Decoding(Arc::new(cause))
    }

    /// Wraps a transport-level failure without interpreting it
    pub fn transport(cause: Box<dyn error::Error + Send + Sync + 'static>) -> Self {
        Self::Transport(Arc::from(cause))
    }

    /// The terminal error for a credential rejected twice in a row
    pub fn rejected(kind: CredentialKind) -> Self {
        match kind {
            CredentialKind::Client => Self::InvalidClientToken,
            CredentialKind::User => Self::InvalidUserToken,
        }
    }

    /// The HTTP status, if the backend produced one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        Self::Store(Arc::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_maps_to_kind_specific_error() {
        assert!(matches!(
            AuthError::rejected(CredentialKind::Client),
            AuthError::InvalidClientToken
        ));
        assert!(matches!(
            AuthError::rejected(CredentialKind::User),
            AuthError::InvalidUserToken
        ));
    }

    #[test]
    fn clones_share_the_same_cause() {
        let err = AuthError::transport("connection reset".into());
        let cloned = err.clone();
        match (err, cloned) {
            (AuthError::Transport(a), AuthError::Transport(b)) => assert!(Arc::ptr_eq(&a, &b)),
            _ => panic!("expected transport errors"),
        }
    }

    #[test]
    fn status_is_only_reported_for_http_errors() {
        let http = AuthError::Http {
            status: 503,
            body: Arc::from(&b"busy"[..]),
        };
        assert_eq!(http.status(), Some(503));
        assert_eq!(AuthError::InvalidUserToken.status(), None);
    }
}
