use druid_tokens::{store::StoreError, AuthError, ClientId};
use thiserror::Error;

/// An error returned by the [`DruidClient`][crate::DruidClient]
#[derive(Debug, Error)]
pub enum Error {
    /// Obtaining a credential or performing a request failed
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A configured base URL cannot be used to build endpoint URLs
    #[error("invalid base URL")]
    InvalidBaseUrl(#[source] url::ParseError),

    /// The token store holds credentials of another application
    #[error("token store belongs to {found}, expected {expected}")]
    StoreAccountMismatch {
        /// The configured client id
        expected: ClientId,
        /// The account of the token store
        found: ClientId,
    },

    /// The stored session carries no edit-account link
    #[error("no edit-account link is available for the current session")]
    EditAccountUnavailable,

    /// The edit-account link is not a valid URL once the token is substituted
    #[error("edit-account link is not a valid URL")]
    EditAccountUrl(#[source] url::ParseError),
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Self::Auth(err.into())
    }
}
