//! Client and user credential management for the DruID identity SDK
//!
//! An application embedding the SDK holds two distinct bearer credentials: an
//! application-level [`ClientToken`] and a user-level [`UserSession`]. This
//! crate keeps both valid. Each is owned by a [`TokenManager`] which reads the
//! current value from a [`TokenStore`][store::TokenStore], decides whether it
//! is still usable, and when it is not, obtains a new one from a
//! [`CredentialSource`][source::CredentialSource].
//!
//! Refreshes are _single-flight_: however many tasks ask for a credential
//! while it is being refreshed, the source is invoked once and every caller
//! receives the same result. Managers keep no private copy of the credential,
//! so several managers bound to the same store agree on what is current.
//!
//! ```
//! use std::sync::Arc;
//!
//! use aliri_clock::{Clock, DurationSecs, System};
//! use druid_tokens::{store::InMemoryTokenStore, AuthError, ClientToken, ClientTokenManager};
//!
//! let store = Arc::new(InMemoryTokenStore::new("my-app"));
//! let issue = || async {
//!     Ok::<_, AuthError>(Some(ClientToken::issued_at(
//!         "fresh",
//!         "Bearer",
//!         DurationSecs(3600),
//!         System.now(),
//!     )))
//! };
//!
//! let manager = ClientTokenManager::new(store, Arc::new(issue));
//!
//! let token = futures::executor::block_on(manager.valid_token())?;
//! assert_eq!(token.access_token().as_str(), "fresh");
//! # Ok::<(), AuthError>(())
//! ```
//!
//! # Features
//!
//! * `file`: Provides [`FileTokenStore`][store::FileTokenStore], which persists
//!   records on the local filesystem. Enabled by default.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod braids;
pub mod epoch_millis;
mod error;
mod manager;
pub mod source;
pub mod store;
mod tokens;

pub use braids::*;
pub use error::{AuthError, CredentialKind, SharedCause};
pub use manager::{ClientTokenManager, TokenManager, UserTokenManager};
pub use tokens::{ClientToken, LoginStatus, SessionLinks, UserSession};
