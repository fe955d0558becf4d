use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use druid_reqwest::{AuthKind, Dispatcher, RequestEngine, RequestSpec, ReqwestTransport, Transport};
use druid_tokens::{
    store::{StoreKey, TokenStore, TokenStoreExt},
    ClientToken, ClientTokenManager, UserSession, UserTokenManager,
};
use reqwest::{
    header::{HeaderName, FROM},
    Method,
};
use url::Url;

use crate::{
    dto::{
        AcceptTermsRequest, AcceptTermsResponse, Activity, ClientCredentials,
        EntrypointResponse, LoginContent, LoginRequest, LoginResponse, NotificationContext,
        PasswordResetObject, PasswordResetResponse, RegisterRequest, RegisterResponse,
    },
    sources::{ClientCredentialsSource, RefreshTokenSource},
    Endpoints, Error, Settings,
};

const FROM_ORIGIN: &str = "from-origin";
const ACCESS_TOKEN_PLACEHOLDER: &str = "{access_token}";

/// A client of the DruID identity backend
///
/// Owns the client token and user session managers, both reading and writing
/// the same token store, and the request engine that authorizes calls with
/// them. Cloning is cheap and clones share credentials and in-flight
/// refreshes.
#[derive(Clone, Debug)]
pub struct DruidClient {
    settings: Arc<Settings>,
    endpoints: Arc<Endpoints>,
    store: Arc<dyn TokenStore>,
    engine: RequestEngine,
}

impl DruidClient {
    /// Constructs a client sending requests through `transport`
    ///
    /// Fails if `store` is scoped to an account other than the configured
    /// client id, or if the base URLs cannot carry endpoint paths.
    pub fn new(
        settings: Settings,
        transport: Arc<dyn Transport>,
        store: Arc<dyn TokenStore>,
    ) -> Result<Self, Error> {
        if store.account() != &*settings.client_id {
            return Err(Error::StoreAccountMismatch {
                expected: settings.client_id.clone(),
                found: store.account().to_owned(),
            });
        }

        let endpoints = Endpoints::new(
            &settings.auth_base_url,
            &settings.graph_base_url,
            &settings.entry_point_id,
        )
        .map_err(Error::InvalidBaseUrl)?;

        let dispatcher = Dispatcher::new(transport).with_accept_language(&settings.language)?;
        let credentials = Arc::new(ClientCredentials {
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
        });

        let client_tokens = ClientTokenManager::new(
            Arc::clone(&store),
            Arc::new(ClientCredentialsSource::new(
                dispatcher.clone(),
                endpoints.token.clone(),
                Arc::clone(&credentials),
            )),
        );
        let user_tokens = UserTokenManager::new(
            Arc::clone(&store),
            Arc::new(RefreshTokenSource::new(
                dispatcher.clone(),
                endpoints.token.clone(),
                credentials,
                Arc::clone(&store),
            )),
        );

        Ok(Self {
            settings: Arc::new(settings),
            endpoints: Arc::new(endpoints),
            store,
            engine: RequestEngine::new(dispatcher, client_tokens, user_tokens),
        })
    }

    /// Constructs a client sending requests through a default [`reqwest::Client`]
    pub fn with_reqwest(settings: Settings, store: Arc<dyn TokenStore>) -> Result<Self, Error> {
        Self::new(settings, Arc::new(ReqwestTransport::default()), store)
    }

    /// The settings the client was built from
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The resolved endpoint URLs
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// The token store
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// The request engine
    pub fn engine(&self) -> &RequestEngine {
        &self.engine
    }

    /// The manager of the client token
    pub fn client_tokens(&self) -> &ClientTokenManager {
        self.engine.client_tokens()
    }

    /// The manager of the user session
    pub fn user_tokens(&self) -> &UserTokenManager {
        self.engine.user_tokens()
    }

    /// Issues a new client token and stores it
    pub async fn obtain_client_token(&self) -> Result<ClientToken, Error> {
        Ok(self.client_tokens().force_refresh().await?)
    }

    /// Exchanges the stored refresh token for a new session and stores it
    ///
    /// Fields the backend omits from the refreshed session are carried over
    /// from the stored one.
    pub async fn refresh_access_token(&self) -> Result<UserSession, Error> {
        Ok(self.user_tokens().force_refresh().await?)
    }

    /// Fetches the settings of the configured entry point and stores them
    #[tracing::instrument(skip(self), fields(entry_point = %self.settings.entry_point_id))]
    pub async fn search_entrypoint(&self) -> Result<EntrypointResponse, Error> {
        let spec = self.graph_request(Method::GET, &self.endpoints.entrypoint)?;
        let response: EntrypointResponse = self.engine.send_json(&spec, AuthKind::Client).await?;

        self.store
            .set(StoreKey::EntrypointSettings, Some(&response))?;
        Ok(response)
    }

    /// Logs a user in and stores the returned session and profile
    #[tracing::instrument(skip_all)]
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, Error> {
        let activity = Activity::new(&self.settings.client_id, "access", request, request.context());
        let spec = self
            .graph_request(Method::POST, &self.endpoints.login)?
            .json(&activity)?;
        let response: LoginResponse = self.engine.send_json(&spec, AuthKind::Client).await?;

        if let Some(content) = &response.content {
            if let Some(session) = &content.session_info {
                self.user_tokens().replace(session)?;
                tracing::info!("user logged in");
            }
            if let Some(user) = &content.user {
                self.store.set(StoreKey::User, Some(user))?;
            }
        }

        Ok(response)
    }

    /// Fetches the profile of the logged-in user
    #[tracing::instrument(skip(self))]
    pub async fn me(&self) -> Result<LoginResponse, Error> {
        let spec = self
            .graph_request(Method::GET, &self.endpoints.me)?
            .try_header(HeaderName::from_static(FROM_ORIGIN), self.settings.client_id.as_str())?;
        Ok(self.engine.send_json(&spec, AuthKind::User).await?)
    }

    /// Registers a new user
    #[tracing::instrument(skip_all)]
    pub async fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse, Error> {
        let activity = Activity::new(&self.settings.client_id, "create", request, request.context());
        let spec = self
            .graph_request(Method::POST, &self.endpoints.register)?
            .json(&activity)?;
        Ok(self.engine.send_json(&spec, AuthKind::Client).await?)
    }

    /// Asks the backend to send a password reset notification to `email`
    #[tracing::instrument(skip_all)]
    pub async fn password_reset_request(
        &self,
        email: &str,
    ) -> Result<PasswordResetResponse, Error> {
        let object = PasswordResetObject::new(email);
        let activity = Activity::new(
            &self.settings.client_id,
            "request",
            &object,
            Some(&NotificationContext::RESET_PASSWORD),
        );
        let spec = self
            .graph_request(Method::POST, &self.endpoints.password_reset)?
            .json(&activity)?;
        Ok(self.engine.send_json(&spec, AuthKind::Client).await?)
    }

    /// Accepts terms on behalf of a user who logged in with a social account
    #[tracing::instrument(skip_all)]
    pub async fn accept_terms_after_login(
        &self,
        request: &AcceptTermsRequest,
    ) -> Result<AcceptTermsResponse, Error> {
        let activity = Activity::new(&self.settings.client_id, "accept", request, request.context());
        let spec = self
            .graph_request(Method::POST, &self.endpoints.accept_assertions)?
            .json(&activity)?;
        Ok(self.engine.send_json(&spec, AuthKind::Client).await?)
    }

    /// Checks that a user is logged in
    ///
    /// Refreshes the stored session when it has expired, then fetches the
    /// user's profile. The returned response pairs that profile with the
    /// current session. Fails with
    /// [`AuthError::MissingCredential`][druid_tokens::AuthError::MissingCredential]
    /// when no session can be obtained.
    #[tracing::instrument(skip(self))]
    pub async fn is_user_connected(&self) -> Result<LoginResponse, Error> {
        let session = self.user_tokens().valid_token().await?;
        let me = self.me().await?;

        // `me` may have replaced the session while retrying
        let session = self.user_tokens().current()?.unwrap_or(session);
        let user = me.content.and_then(|content| content.user);
        if let Some(user) = &user {
            self.store.set(StoreKey::User, Some(user))?;
        }

        Ok(LoginResponse {
            content: Some(LoginContent {
                user,
                session_info: Some(session),
            }),
            result: me.result,
        })
    }

    /// Builds the link to the page where the logged-in user edits their account
    ///
    /// The session's `edit_account` link carries an `{access_token}`
    /// placeholder, which is replaced by the base64-encoded access token.
    pub async fn edit_user_url(&self) -> Result<Url, Error> {
        let response = self.is_user_connected().await?;
        let session = response
            .content
            .and_then(|content| content.session_info)
            .ok_or(Error::EditAccountUnavailable)?;

        let (Some(access_token), Some(template)) = (
            session.access_token(),
            session.links().and_then(|links| links.edit_account.as_deref()),
        ) else {
            return Err(Error::EditAccountUnavailable);
        };

        let encoded = STANDARD.encode(access_token.as_str());
        Url::parse(&template.replace(ACCESS_TOKEN_PLACEHOLDER, &encoded))
            .map_err(Error::EditAccountUrl)
    }

    /// Forgets every credential and record stored for the application
    ///
    /// Refreshes in flight at that moment do not bring credentials back.
    pub fn logout(&self) -> Result<(), Error> {
        self.client_tokens().clear()?;
        self.user_tokens().clear()?;
        self.store.reset()?;
        tracing::info!("logged out");
        Ok(())
    }

    fn graph_request(&self, method: Method, url: &Url) -> Result<RequestSpec, Error> {
        Ok(RequestSpec::new(method, url.clone()).try_header(FROM, &self.settings.entry_point_id)?)
    }
}
