//! Authenticated request dispatch for the DruID identity SDK
//!
//! A [`RequestSpec`] describes an outbound request. The [`RequestEngine`]
//! attaches the `Accept-Language` header and, depending on the [`AuthKind`],
//! a bearer token obtained from the matching credential manager, then sends
//! the request through a [`Transport`].
//!
//! When the backend answers `401 Unauthorized` to an authorized request, the
//! engine forces a refresh of that credential and retries exactly once. The
//! retry budget belongs to the individual call, so it never leaks between
//! unrelated requests.
//!
//! Headers set on a request follow a first-set-wins rule: the engine's
//! `Accept-Language` cannot be replaced by a caller-supplied value. The
//! `Authorization` value placed by the engine is marked sensitive.
//!
//! ```
//! use std::sync::Arc;
//!
//! use druid_reqwest::{AuthKind, Dispatcher, RequestEngine, RequestSpec, ReqwestTransport};
//! use druid_tokens::{
//!     store::{InMemoryTokenStore, TokenStore},
//!     AuthError, ClientToken, ClientTokenManager, UserSession, UserTokenManager,
//! };
//!
//! # async fn no_op() -> Result<Option<ClientToken>, AuthError> { Ok(None) }
//! # async fn no_session() -> Result<Option<UserSession>, AuthError> { Ok(None) }
//! let store: Arc<dyn TokenStore> = Arc::new(InMemoryTokenStore::new("my-app"));
//! let dispatcher = Dispatcher::new(Arc::new(ReqwestTransport::default()))
//!     .with_accept_language("fr")?;
//!
//! let engine = RequestEngine::new(
//!     dispatcher,
//!     ClientTokenManager::new(store.clone(), Arc::new(no_op)),
//!     UserTokenManager::new(store, Arc::new(no_session)),
//! );
//!
//! let spec = RequestSpec::get("https://graph.example.com/activityid/v1/user/me".parse().unwrap());
//! # async move {
//! let profile: serde_json::Value = engine.send_json(&spec, AuthKind::User).await?;
//! # Ok::<_, AuthError>(()) };
//! # Ok::<(), AuthError>(())
//! ```

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod engine;
mod request;
mod transport;

pub use engine::{AuthKind, Dispatcher, RequestEngine};
pub use request::{Body, ContentType, FormBody, JsonBody, RequestSpec, RequestType};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};
