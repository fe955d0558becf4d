use aliri_clock::{Clock, DurationSecs, System, UnixTime};
use serde::{Deserialize, Serialize};

use crate::{epoch_millis, AccessToken, AccessTokenRef, RefreshToken, RefreshTokenRef};

/// An application-level credential issued by the client-credentials grant
///
/// Immutable once issued; a refresh replaces it wholesale.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientToken {
    access_token: AccessToken,
    token_type: String,
    expires_in: DurationSecs,
    #[serde(with = "epoch_millis")]
    expires_at: UnixTime,
}

impl ClientToken {
    /// Constructs a client token with an explicit expiry
    pub fn new(
        access_token: impl Into<AccessToken>,
        token_type: impl Into<String>,
        expires_in: DurationSecs,
        expires_at: UnixTime,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: token_type.into(),
            expires_in,
            expires_at,
        }
    }

    /// Constructs a client token that expires `expires_in` after `issued`
    pub fn issued_at(
        access_token: impl Into<AccessToken>,
        token_type: impl Into<String>,
        expires_in: DurationSecs,
        issued: UnixTime,
    ) -> Self {
        let expires_at = UnixTime(issued.0.saturating_add(expires_in.0));
        Self::new(access_token, token_type, expires_in, expires_at)
    }

    /// Gets the bearer access token
    #[inline]
    pub fn access_token(&self) -> &AccessTokenRef {
        &self.access_token
    }

    /// Gets the token type, usually `Bearer`
    #[inline]
    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Gets the lifetime the token was issued with
    #[inline]
    pub fn expires_in(&self) -> DurationSecs {
        self.expires_in
    }

    /// Gets the time at which the token expires
    #[inline]
    pub fn expires_at(&self) -> UnixTime {
        self.expires_at
    }

    /// Whether the token is usable according to the system clock
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.is_valid_with_clock(&System)
    }

    /// Whether the token is usable according to the provided clock
    #[inline]
    pub fn is_valid_with_clock<C: Clock>(&self, clock: &C) -> bool {
        self.is_valid_at(clock.now())
    }

    /// Whether the token is usable as of the provided time
    ///
    /// A token is valid when its access token is non-empty and it expires
    /// strictly after `now`.
    #[inline]
    pub fn is_valid_at(&self, now: UnixTime) -> bool {
        !self.access_token.as_str().is_empty() && self.expires_at > now
    }
}

/// The state reported by the backend about how the user is connected
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginStatus {
    /// Numeric user id
    pub uid: i64,
    /// Object id of the user
    pub oid: String,
    /// Connection state, as reported by the backend
    pub connect_state: String,
}

/// Links associated with a user session
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLinks {
    /// Template URL of the account editor; contains an `{access_token}` placeholder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_account: Option<String>,
}

/// A user-level session
///
/// Every field is optional because a session may be stored in a partially
/// populated state, such as right after a social login and before the token
/// exchange completes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<AccessToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_in: Option<DurationSecs>,
    #[serde(
        default,
        with = "epoch_millis::option",
        skip_serializing_if = "Option::is_none"
    )]
    expires_at: Option<UnixTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<RefreshToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    login_status: Option<LoginStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    links: Option<SessionLinks>,
}

impl UserSession {
    /// Constructs a session holding an access token that expires `expires_in` after `issued`
    pub fn issued_at(
        access_token: impl Into<AccessToken>,
        expires_in: DurationSecs,
        issued: UnixTime,
    ) -> Self {
        Self {
            access_token: Some(access_token.into()),
            token_type: Some("Bearer".to_owned()),
            expires_in: Some(expires_in),
            expires_at: Some(UnixTime(issued.0.saturating_add(expires_in.0))),
            ..Self::default()
        }
    }

    /// Sets the expiry time
    pub fn with_expires_at(mut self, expires_at: UnixTime) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Sets the refresh token
    pub fn with_refresh_token(mut self, refresh_token: impl Into<RefreshToken>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Sets the granted scope
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Sets the login status
    pub fn with_login_status(mut self, login_status: LoginStatus) -> Self {
        self.login_status = Some(login_status);
        self
    }

    /// Sets the session links
    pub fn with_links(mut self, links: SessionLinks) -> Self {
        self.links = Some(links);
        self
    }

    /// Gets the bearer access token, if present
    #[inline]
    pub fn access_token(&self) -> Option<&AccessTokenRef> {
        self.access_token.as_deref()
    }

    /// Gets the token type, if present
    #[inline]
    pub fn token_type(&self) -> Option<&str> {
        self.token_type.as_deref()
    }

    /// Gets the lifetime the access token was issued with, if present
    #[inline]
    pub fn expires_in(&self) -> Option<DurationSecs> {
        self.expires_in
    }

    /// Gets the time at which the access token expires, if present
    #[inline]
    pub fn expires_at(&self) -> Option<UnixTime> {
        self.expires_at
    }

    /// Gets the refresh token, if present
    #[inline]
    pub fn refresh_token(&self) -> Option<&RefreshTokenRef> {
        self.refresh_token.as_deref()
    }

    /// Gets the granted scope, if present
    #[inline]
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Gets the login status, if present
    #[inline]
    pub fn login_status(&self) -> Option<&LoginStatus> {
        self.login_status.as_ref()
    }

    /// Gets the session links, if present
    #[inline]
    pub fn links(&self) -> Option<&SessionLinks> {
        self.links.as_ref()
    }

    /// Whether the session is usable according to the system clock
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.is_valid_with_clock(&System)
    }

    /// Whether the session is usable according to the provided clock
    #[inline]
    pub fn is_valid_with_clock<C: Clock>(&self, clock: &C) -> bool {
        self.is_valid_at(clock.now())
    }

    /// Whether the session is usable as of the provided time
    ///
    /// Requires a non-empty access token and an expiry strictly after `now`.
    pub fn is_valid_at(&self, now: UnixTime) -> bool {
        match (&self.access_token, self.expires_at) {
            (Some(token), Some(expires_at)) => !token.as_str().is_empty() && expires_at > now,
            _ => false,
        }
    }

    /// Reconciles a freshly refreshed session with the one it replaces
    ///
    /// The access token and its lifetime always come from `self`. The refresh
    /// token, login status, scope and links come from `self` when present and
    /// are otherwise carried over from `previous`, since the refresh grant
    /// usually does not return them.
    ///
    /// Scope and links returned by the refresh replace the stored ones rather
    /// than being discarded, so a backend that updates them on refresh is
    /// honoured.
    pub fn merge_previous(self, previous: Option<&UserSession>) -> Self {
        let Some(previous) = previous else {
            return self;
        };

        Self {
            access_token: self.access_token,
            token_type: self.token_type,
            expires_in: self.expires_in,
            expires_at: self.expires_at,
            refresh_token: self
                .refresh_token
                .or_else(|| previous.refresh_token.clone()),
            scope: self.scope.or_else(|| previous.scope.clone()),
            login_status: self
                .login_status
                .or_else(|| previous.login_status.clone()),
            links: self.links.or_else(|| previous.links.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: UnixTime = UnixTime(1_700_000_000);

    mod client_token {
        use super::*;

        #[test]
        fn is_valid_before_expiry() {
            let token = ClientToken::issued_at("A", "Bearer", DurationSecs(3600), NOW);
            assert!(token.is_valid_at(NOW));
            assert_eq!(token.expires_at(), UnixTime(NOW.0 + 3600));
        }

        #[test]
        fn is_invalid_at_or_after_expiry() {
            let token = ClientToken::new("A", "Bearer", DurationSecs(3600), NOW);
            assert!(!token.is_valid_at(NOW));
            assert!(!token.is_valid_at(UnixTime(NOW.0 + 1)));
        }

        #[test]
        fn is_invalid_with_empty_access_token() {
            let token = ClientToken::issued_at("", "Bearer", DurationSecs(3600), NOW);
            assert!(!token.is_valid_at(NOW));
        }

        #[test]
        fn decodes_backend_payload_with_millisecond_expiry() {
            let token: ClientToken = serde_json::from_str(
                r#"{
                    "access_token": "abc",
                    "token_type": "Bearer",
                    "expires_in": 3600,
                    "expires_at": 1700003600000
                }"#,
            )
            .unwrap();

            assert_eq!(token.access_token().as_str(), "abc");
            assert_eq!(token.expires_in(), DurationSecs(3600));
            assert_eq!(token.expires_at(), UnixTime(1_700_003_600));
        }
    }

    mod user_session {
        use super::*;

        fn links() -> SessionLinks {
            SessionLinks {
                edit_account: Some("https://example.com/edit?t={access_token}".to_owned()),
            }
        }

        #[test]
        fn is_invalid_without_access_token() {
            let session = UserSession::default().with_expires_at(UnixTime(NOW.0 + 60));
            assert!(!session.is_valid_at(NOW));
        }

        #[test]
        fn is_invalid_without_expiry() {
            let session = UserSession {
                access_token: Some(AccessToken::from_static("t")),
                ..UserSession::default()
            };
            assert!(!session.is_valid_at(NOW));
        }

        #[test]
        fn is_valid_with_token_and_future_expiry() {
            let session = UserSession::issued_at("t", DurationSecs(60), NOW);
            assert!(session.is_valid_at(NOW));
            assert!(!session.is_valid_at(UnixTime(NOW.0 + 60)));
        }

        #[test]
        fn merge_keeps_scope_and_links_the_refresh_omitted() {
            let previous = UserSession::issued_at("old", DurationSecs(60), UnixTime(0))
                .with_refresh_token("r1")
                .with_scope("x")
                .with_links(links());
            let refreshed = UserSession::issued_at("new", DurationSecs(3600), NOW);

            let merged = refreshed.merge_previous(Some(&previous));

            assert_eq!(merged.access_token().map(|t| t.as_str()), Some("new"));
            assert_eq!(merged.expires_at(), Some(UnixTime(NOW.0 + 3600)));
            assert_eq!(merged.scope(), Some("x"));
            assert_eq!(merged.links(), Some(&links()));
            assert_eq!(merged.refresh_token().map(|t| t.as_str()), Some("r1"));
        }

        #[test]
        fn merge_prefers_values_returned_by_the_refresh() {
            let previous = UserSession::issued_at("old", DurationSecs(60), UnixTime(0))
                .with_refresh_token("r1")
                .with_scope("x");
            let refreshed = UserSession::issued_at("new", DurationSecs(60), NOW)
                .with_refresh_token("r2")
                .with_scope("y");

            let merged = refreshed.merge_previous(Some(&previous));

            assert_eq!(merged.refresh_token().map(|t| t.as_str()), Some("r2"));
            assert_eq!(merged.scope(), Some("y"));
        }

        #[test]
        fn merge_without_previous_is_identity() {
            let refreshed = UserSession::issued_at("new", DurationSecs(60), NOW);
            assert_eq!(refreshed.clone().merge_previous(None), refreshed);
        }

        #[test]
        fn decodes_partially_populated_session() {
            let session: UserSession = serde_json::from_str(
                r#"{
                    "access_token": "abc",
                    "expires_at": 1700000060000,
                    "login_status": { "uid": 7, "oid": "o-1", "connect_state": "connected" },
                    "links": { "edit_account": "https://example.com/{access_token}" }
                }"#,
            )
            .unwrap();

            assert!(session.is_valid_at(NOW));
            assert_eq!(session.refresh_token(), None);
            assert_eq!(session.login_status().map(|s| s.uid), Some(7));
        }
    }
}
