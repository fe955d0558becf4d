//! Client for the DruID identity backend
//!
//! A [`DruidClient`] talks to two services: the authorization server, which
//! issues client tokens and exchanges refresh tokens, and the identity graph,
//! which logs users in, registers them and serves their profile. Graph calls
//! are authorized with the application's client token or with the logged-in
//! user's session, both of which are kept valid automatically and persisted
//! in a [`TokenStore`][store::TokenStore].
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use druid::{dto::LoginRequest, store::InMemoryTokenStore, DruidClient, Settings};
//!
//! # async fn run() -> Result<(), druid::Error> {
//! let settings = Settings::new(
//!     "https://auth.example.com".parse().unwrap(),
//!     "https://graph.example.com".parse().unwrap(),
//!     "my-app",
//!     "s3cr3t",
//!     "my-app-entrypoint",
//! )
//! .with_language("fr");
//!
//! let store = Arc::new(InMemoryTokenStore::new("my-app"));
//! let client = DruidClient::with_reqwest(settings, store)?;
//!
//! client
//!     .login(&LoginRequest::with_password("someone@example.com", "pa55word"))
//!     .await?;
//!
//! let connected = client.is_user_connected().await?;
//! println!("{:?}", connected.content.and_then(|c| c.user));
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! * `file`: Provides [`FileTokenStore`][store::FileTokenStore], which persists
//!   credentials on the local filesystem. Enabled by default.

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

mod client;
pub mod dto;
mod endpoints;
mod error;
mod settings;
pub mod sources;

pub use client::DruidClient;
pub use endpoints::Endpoints;
pub use error::Error;
pub use settings::Settings;

pub use druid_reqwest::{AuthKind, ReqwestTransport, Transport};
pub use druid_tokens::{
    store, AccessToken, AccessTokenRef, AuthError, ClientId, ClientIdRef, ClientSecret,
    ClientSecretRef, ClientToken, CredentialKind, LoginStatus, RefreshToken, RefreshTokenRef,
    SessionLinks, UserSession,
};
