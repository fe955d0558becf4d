//! Single-flight credential managers
//!
//! A [`TokenManager`] hands out valid credentials of one kind. When the stored
//! credential is missing or expired, it runs the refresh through its
//! [`CredentialSource`] exactly once, no matter how many callers are waiting;
//! every caller that arrives while the refresh is in flight receives that
//! refresh's result, whether a credential or an error.
//!
//! A credential written through [`TokenManager::replace`] or removed through
//! [`TokenManager::clear`] while a refresh is in flight wins: the refresh
//! still answers its callers, but does not overwrite the store.

use std::{
    error, fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use aliri_clock::{Clock, System};
use futures::future::{BoxFuture, FutureExt, Shared};

use crate::{
    source::{Credential, CredentialSource},
    store::{TokenStore, TokenStoreExt},
    AuthError, ClientToken, UserSession,
};

type RefreshFuture<T> = Shared<BoxFuture<'static, Result<T, AuthError>>>;

/// A manager for application-level client tokens
pub type ClientTokenManager<C = System> = TokenManager<ClientToken, C>;

/// A manager for user-level sessions
pub type UserTokenManager<C = System> = TokenManager<UserSession, C>;

/// Hands out valid credentials, refreshing them at most once at a time
///
/// Cloning is cheap and clones share the same in-flight refresh. Separate
/// managers bound to the same store observe each other's refreshed values
/// through the store.
pub struct TokenManager<T: Credential, C = System> {
    inner: Arc<Inner<T, C>>,
}

struct Inner<T: Credential, C> {
    store: Arc<dyn TokenStore>,
    source: Arc<dyn CredentialSource<T>>,
    clock: C,
    state: Mutex<RefreshState<T>>,
}

struct RefreshState<T: Credential> {
    in_flight: Option<RefreshFuture<T>>,
    /// Bumped by every write made outside a refresh
    generation: u64,
}

impl<T: Credential> RefreshState<T> {
    fn new() -> Mutex<Self> {
        Mutex::new(Self {
            in_flight: None,
            generation: 0,
        })
    }
}

impl<T: Credential> TokenManager<T, System> {
    /// Constructs a manager reading from and writing to `store`
    ///
    /// `source` is invoked whenever a new credential is required.
    pub fn new(store: Arc<dyn TokenStore>, source: Arc<dyn CredentialSource<T>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                source,
                clock: System,
                state: RefreshState::new(),
            }),
        }
    }
}

impl<T: Credential, C> TokenManager<T, C> {
    /// Sets a custom clock to be used for validity checks
    ///
    /// Useful for testing purposes
    pub fn with_clock<D>(self, clock: D) -> TokenManager<T, D> {
        TokenManager {
            inner: Arc::new(Inner {
                store: Arc::clone(&self.inner.store),
                source: Arc::clone(&self.inner.source),
                clock,
                state: RefreshState::new(),
            }),
        }
    }

    /// The store this manager reads from and writes to
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.inner.store
    }

    /// Whether a refresh is currently in flight
    pub fn is_refreshing(&self) -> bool {
        self.inner.state().in_flight.is_some()
    }

    /// Reads the stored credential without performing any I/O beyond the store
    pub fn current(&self) -> Result<Option<T>, AuthError> {
        self.inner.current()
    }

    /// Replaces the stored credential with one obtained elsewhere, such as a login
    ///
    /// A refresh in flight at that moment will not overwrite `value`.
    pub fn replace(&self, value: &T) -> Result<(), AuthError> {
        let mut state = self.inner.state();
        state.generation = state.generation.wrapping_add(1);
        self.inner.store.set(T::STORE_KEY, Some(value))?;
        tracing::debug!(credential = %T::KIND, "stored credential replaced");
        Ok(())
    }

    /// Deletes the stored credential
    ///
    /// A refresh in flight at that moment will not bring it back.
    pub fn clear(&self) -> Result<(), AuthError> {
        let mut state = self.inner.state();
        state.generation = state.generation.wrapping_add(1);
        self.inner.store.set::<T>(T::STORE_KEY, None)?;
        tracing::debug!(credential = %T::KIND, "stored credential cleared");
        Ok(())
    }
}

impl<T, C> TokenManager<T, C>
where
    T: Credential,
    C: Clock + Send + Sync + 'static,
{
    /// Returns a currently valid credential
    ///
    /// If no refresh is in flight and the stored credential is valid, it is
    /// returned without any I/O. Otherwise this starts a refresh, or joins the
    /// one already in flight.
    pub async fn valid_token(&self) -> Result<T, AuthError> {
        let refresh = {
            let mut state = self.inner.state();
            match &state.in_flight {
                Some(refresh) => {
                    tracing::trace!(credential = %T::KIND, "joining in-flight refresh");
                    refresh.clone()
                }
                None => {
                    let now = self.inner.clock.now();
                    match self.inner.current()? {
                        Some(current) if current.is_valid_at(now) => return Ok(current),
                        Some(_) => {
                            tracing::debug!(credential = %T::KIND, now = now.0, "stored credential is no longer valid")
                        }
                        None => tracing::debug!(credential = %T::KIND, "no stored credential"),
                    }
                    self.inner.begin_refresh(&mut state)
                }
            }
        };

        refresh.await
    }

    /// Obtains a new credential regardless of the validity of the stored one
    ///
    /// If a refresh is already in flight, joins it rather than starting a
    /// second one.
    pub async fn force_refresh(&self) -> Result<T, AuthError> {
        let refresh = {
            let mut state = self.inner.state();
            match &state.in_flight {
                Some(refresh) => {
                    tracing::trace!(credential = %T::KIND, "joining in-flight refresh");
                    refresh.clone()
                }
                None => self.inner.begin_refresh(&mut state),
            }
        };

        refresh.await
    }
}

impl<T: Credential, C> Inner<T, C> {
    fn state(&self) -> MutexGuard<'_, RefreshState<T>> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn current(&self) -> Result<Option<T>, AuthError> {
        Ok(self.store.get(T::STORE_KEY)?)
    }
}

impl<T, C> Inner<T, C>
where
    T: Credential,
    C: Clock + Send + Sync + 'static,
{
    /// Must be called with the state locked and no refresh in flight.
    fn begin_refresh(self: &Arc<Self>, state: &mut RefreshState<T>) -> RefreshFuture<T> {
        let inner = Arc::clone(self);
        let generation = state.generation;
        let refresh = async move {
            let result = inner.refresh(generation).await;
            // Cleared before any joined caller can observe `result`.
            inner.state().in_flight.take();
            result
        }
        .boxed()
        .shared();

        state.in_flight = Some(refresh.clone());
        refresh
    }

    async fn refresh(&self, generation: u64) -> Result<T, AuthError> {
        let stored = self.current()?;
        if !T::can_refresh(stored.as_ref()) {
            tracing::warn!(credential = %T::KIND, "stored credential does not allow a refresh");
            return Err(AuthError::MissingCredential(T::KIND));
        }

        tracing::debug!(credential = %T::KIND, "requesting new credential");
        let fresh = match self.source.request_credential().await {
            Ok(Some(fresh)) => fresh,
            Ok(None) => {
                tracing::warn!(credential = %T::KIND, "credential source produced nothing");
                return Err(AuthError::MissingCredential(T::KIND));
            }
            Err(error) => {
                tracing::warn!(
                    credential = %T::KIND,
                    error = (&error as &dyn error::Error),
                    "unable to refresh credential"
                );
                return Err(error);
            }
        };

        let fresh = fresh.reconcile(stored.as_ref());
        {
            let state = self.state();
            if state.generation != generation {
                tracing::debug!(
                    credential = %T::KIND,
                    "stored credential changed during refresh, keeping it"
                );
                return Ok(fresh);
            }
            self.store.set(T::STORE_KEY, Some(&fresh))?;
        }

        tracing::info!(
            credential = %T::KIND,
            valid = fresh.is_valid_at(self.clock.now()),
            "received new credential"
        );

        Ok(fresh)
    }
}

impl<T: Credential, C> Clone for TokenManager<T, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Credential, C: fmt::Debug> fmt::Debug for TokenManager<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("credential", &T::KIND)
            .field("store", &self.inner.store)
            .field("refreshing", &self.inner.state().in_flight.is_some())
            .field("clock", &self.inner.clock)
            .finish()
    }
}
