//! DTOs for interacting with the DruID backend
//!
//! Requests to the identity graph are activity-stream documents: an `actor`
//! (the application) performs a `verb` on an `object` (the user) from a
//! `source` (the device), with an optional `context`. The client fills in
//! the actor and the source; callers describe only the object and context.

use aliri_clock::UnixTime;
use druid_tokens::{epoch_millis, ClientId, ClientIdRef, ClientSecret, RefreshTokenRef, UserSession};
use serde::{Deserialize, Serialize, Serializer};

/// Client credentials
#[derive(Debug)]
pub struct ClientCredentials {
    /// The client ID
    pub client_id: ClientId,

    /// The client secret
    pub client_secret: ClientSecret,
}

/// The client-credentials grant
#[derive(Debug)]
pub(crate) struct ClientCredentialsGrant<'a>(pub &'a ClientCredentials);

impl Serialize for ClientCredentialsGrant<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut ser = serializer.serialize_struct("ClientCredentialsGrant", 3)?;
        ser.serialize_field("client_id", &self.0.client_id)?;
        ser.serialize_field("client_secret", &self.0.client_secret)?;
        ser.serialize_field("grant_type", "client_credentials")?;
        ser.end()
    }
}

/// The refresh-token grant
#[derive(Debug)]
pub(crate) struct RefreshTokenGrant<'a> {
    pub credentials: &'a ClientCredentials,
    pub refresh_token: &'a RefreshTokenRef,
}

impl Serialize for RefreshTokenGrant<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut ser = serializer.serialize_struct("RefreshTokenGrant", 4)?;
        ser.serialize_field("client_id", &self.credentials.client_id)?;
        ser.serialize_field("client_secret", &self.credentials.client_secret)?;
        ser.serialize_field("grant_type", "refresh_token")?;
        ser.serialize_field("refresh_token", self.refresh_token)?;
        ser.end()
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Activity<'a, O, C> {
    actor: Actor<'a>,
    verb: &'static str,
    object: &'a O,
    source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a C>,
}

impl<'a, O, C> Activity<'a, O, C> {
    pub(crate) fn new(
        client_id: &'a ClientIdRef,
        verb: &'static str,
        object: &'a O,
        context: Option<&'a C>,
    ) -> Self {
        Self {
            actor: Actor {
                id: client_id,
                object_type: "application",
            },
            verb,
            object,
            source: Source {
                id: "mobile",
                object_type: "device",
            },
            context,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Actor<'a> {
    id: &'a ClientIdRef,
    object_type: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Source {
    id: &'static str,
    object_type: &'static str,
}

/// A user identifier, such as an email address or a social account id
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserId {
    #[serde(serialize_with = "user_id_type")]
    object_type: (),
    /// The identifier
    pub value: String,
}

fn user_id_type<S: Serializer>(_: &(), serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str("user_id")
}

impl UserId {
    /// Wraps an identifier
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            object_type: (),
            value: value.into(),
        }
    }
}

/// The identifiers a user is known by
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UserIds {
    /// Email address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<UserId>,
    /// Facebook user id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facebook_id: Option<UserId>,
    /// Apple user id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apple_id: Option<UserId>,
}

impl UserIds {
    /// Identifies a user by email address
    pub fn email(email: impl Into<String>) -> Self {
        Self {
            email: Some(UserId::new(email)),
            ..Self::default()
        }
    }

    /// Identifies a user by Facebook user id
    pub fn facebook(user_id: impl Into<String>) -> Self {
        Self {
            facebook_id: Some(UserId::new(user_id)),
            ..Self::default()
        }
    }

    /// Identifies a user by Apple user id
    pub fn apple(user_id: impl Into<String>) -> Self {
        Self {
            apple_id: Some(UserId::new(user_id)),
            ..Self::default()
        }
    }
}

/// Data obtained from a social identity provider
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SocialProfile {
    /// The provider's access token
    pub token: String,
    /// When the provider's access token expires
    pub token_expires_at: Option<UnixTime>,
    /// Email address reported by the provider
    pub email: Option<String>,
    /// Name reported by the provider
    pub name: Option<String>,
    /// Birthday reported by the provider
    pub birthday: Option<UnixTime>,
}

/// The social session a login or registration originates from
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthContext {
    object_type: &'static str,
    #[serde(rename = "access_token")]
    access_token: ProviderToken,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<Profile>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct ProviderToken {
    value: String,
    #[serde(
        with = "epoch_millis::option",
        skip_serializing_if = "Option::is_none"
    )]
    expires_at: Option<UnixTime>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct Profile {
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(
        with = "epoch_millis::option",
        skip_serializing_if = "Option::is_none"
    )]
    birthday: Option<UnixTime>,
}

impl From<SocialProfile> for OAuthContext {
    fn from(social: SocialProfile) -> Self {
        Self {
            object_type: "oauth_session",
            access_token: ProviderToken {
                value: social.token,
                expires_at: social.token_expires_at,
            },
            profile: Some(Profile {
                email: social.email,
                name: social.name,
                birthday: social.birthday,
            }),
        }
    }
}

/// A login request
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(serialize_with = "user_type")]
    object_type: (),
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    ids: UserIds,
    #[serde(skip)]
    context: Option<OAuthContext>,
}

fn user_type<S: Serializer>(_: &(), serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str("user")
}

impl LoginRequest {
    /// Logs in with email and password
    pub fn with_password(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            object_type: (),
            password: Some(password.into()),
            ids: UserIds::email(email),
            context: None,
        }
    }

    /// Logs in with a Facebook account
    pub fn with_facebook(user_id: impl Into<String>, social: SocialProfile) -> Self {
        Self::social(UserIds::facebook(user_id), social)
    }

    /// Logs in with an Apple account
    pub fn with_apple(user_id: impl Into<String>, social: SocialProfile) -> Self {
        Self::social(UserIds::apple(user_id), social)
    }

    /// Logs in with email and password, linking the social account in `context`
    pub fn linking(
        email: impl Into<String>,
        password: impl Into<String>,
        social_ids: UserIds,
        context: Option<OAuthContext>,
    ) -> Self {
        Self {
            object_type: (),
            password: Some(password.into()),
            ids: UserIds {
                email: Some(UserId::new(email)),
                ..social_ids
            },
            context,
        }
    }

    fn social(ids: UserIds, social: SocialProfile) -> Self {
        Self {
            object_type: (),
            password: None,
            ids,
            context: Some(social.into()),
        }
    }

    pub(crate) fn context(&self) -> Option<&OAuthContext> {
        self.context.as_ref()
    }
}

/// An assertion, such as acceptance of terms, given at registration
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterAssertion {
    #[serde(serialize_with = "assertion_type")]
    object_type: (),
    /// The kind of assertion, such as `terms` or `optin`
    #[serde(rename = "type")]
    pub kind: String,
    /// The typology of the assertion
    pub typology: String,
    /// The value given
    pub value: String,
}

impl RegisterAssertion {
    /// Constructs an assertion
    pub fn new(
        kind: impl Into<String>,
        typology: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            object_type: (),
            kind: kind.into(),
            typology: typology.into(),
            value: value.into(),
        }
    }
}

/// An assertion accepted after a social login
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedAssertion {
    #[serde(serialize_with = "assertion_type")]
    object_type: (),
    /// The kind of assertion, such as `terms` or `optin`
    #[serde(rename = "type")]
    pub kind: String,
    /// Whether the assertion is accepted
    pub value: bool,
}

impl AcceptedAssertion {
    /// Constructs an assertion
    pub fn new(kind: impl Into<String>, value: bool) -> Self {
        Self {
            object_type: (),
            kind: kind.into(),
            value,
        }
    }
}

fn assertion_type<S: Serializer>(_: &(), serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str("assertion")
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Assertions<T>(Vec<T>);

impl<T: Serialize> Serialize for Assertions<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut ser = serializer.serialize_struct("Assertions", 3)?;
        ser.serialize_field("objectType", "assertions")?;
        ser.serialize_field("items", &self.0)?;
        ser.serialize_field("totalItems", &self.0.len())?;
        ser.end()
    }
}

/// A registration request
///
/// `ids` and `datas` hold the fields requested by the entry point, keyed by
/// field id.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(serialize_with = "user_type")]
    object_type: (),
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    ids: serde_json::Map<String, serde_json::Value>,
    datas: serde_json::Map<String, serde_json::Value>,
    assertions: Assertions<RegisterAssertion>,
    #[serde(skip)]
    context: Option<OAuthContext>,
}

impl RegisterRequest {
    /// Constructs a registration request
    pub fn new(
        password: Option<String>,
        ids: serde_json::Map<String, serde_json::Value>,
        datas: serde_json::Map<String, serde_json::Value>,
        assertions: Vec<RegisterAssertion>,
    ) -> Self {
        Self {
            object_type: (),
            password,
            ids,
            datas,
            assertions: Assertions(assertions),
            context: None,
        }
    }

    /// Registers from a social session
    pub fn with_context(mut self, context: OAuthContext) -> Self {
        self.context = Some(context);
        self
    }

    pub(crate) fn context(&self) -> Option<&OAuthContext> {
        self.context.as_ref()
    }
}

/// A request to accept terms after a social login
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptTermsRequest {
    #[serde(serialize_with = "user_type")]
    object_type: (),
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    ids: UserIds,
    assertions: Assertions<AcceptedAssertion>,
    #[serde(skip)]
    context: Option<OAuthContext>,
}

impl AcceptTermsRequest {
    /// Constructs a request accepting `assertions` on behalf of the user identified by `ids`
    pub fn new(ids: UserIds, assertions: Vec<AcceptedAssertion>) -> Self {
        Self {
            object_type: (),
            password: None,
            ids,
            assertions: Assertions(assertions),
            context: None,
        }
    }

    /// Sets the user's password
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the social session the login originated from
    pub fn with_context(mut self, context: OAuthContext) -> Self {
        self.context = Some(context);
        self
    }

    pub(crate) fn context(&self) -> Option<&OAuthContext> {
        self.context.as_ref()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PasswordResetObject {
    #[serde(serialize_with = "user_type")]
    object_type: (),
    ids: PasswordResetIds,
}

#[derive(Debug, Serialize)]
struct PasswordResetIds {
    email: UserId,
}

impl PasswordResetObject {
    pub(crate) fn new(email: impl Into<String>) -> Self {
        Self {
            object_type: (),
            ids: PasswordResetIds {
                email: UserId::new(email),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NotificationContext {
    notification_type: &'static str,
}

impl NotificationContext {
    pub(crate) const RESET_PASSWORD: Self = Self {
        notification_type: "reset_password",
    };
}

/// The envelope of every identity graph response
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ApiResponse<T> {
    /// The payload, absent on some failures
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub content: Option<T>,
    /// The outcome reported by the backend
    pub result: ResultData,
}

/// The outcome of an identity graph call
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ResultData {
    /// Status code reported by the backend
    pub status: i64,
    /// Time taken to serve the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<f64>,
    /// The node that served the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    /// Errors reported by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ErrorMessage>>,
}

/// An error reported by the backend
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ErrorMessage {
    /// Human-readable message
    pub message: String,
    /// Further details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// The payload of a login or profile response
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct LoginContent {
    /// The user profile, as returned by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<serde_json::Value>,
    /// The user session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_info: Option<UserSession>,
}

/// The payload of a registration response
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterContent {
    /// The new user's id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Object type reported by the backend
    pub object_type: String,
    /// Whether the account is already confirmed
    pub confirmed: bool,
    /// The new user's object id
    pub object_id: String,
}

/// The payload of a password reset response
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetContent {
    /// Object type reported by the backend
    pub object_type: String,
    /// Display name of the notification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Value of the notification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Link sent to the user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// The payload of an accept-terms response
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct AcceptTermsContent {
    /// The accepted assertions, as returned by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assertions: Option<serde_json::Value>,
}

/// Response to a login or profile request
pub type LoginResponse = ApiResponse<LoginContent>;

/// Response to a registration request
pub type RegisterResponse = ApiResponse<RegisterContent>;

/// Response to a password reset request
pub type PasswordResetResponse = ApiResponse<PasswordResetContent>;

/// Response to an accept-terms request
pub type AcceptTermsResponse = ApiResponse<AcceptTermsContent>;

/// Response to an entry point lookup; the settings are kept opaque
pub type EntrypointResponse = ApiResponse<serde_json::Value>;
