//! The backend endpoints used by the client

use url::{ParseError, Url};

const TOKEN: &str = "/oauth2/token";
const LOGIN: &str = "/activityid/v1/user/access";
const ME: &str = "/activityid/v1/user/me";
const ENTRYPOINT: &str = "/activityid/v1/entrypoint";
const REGISTER: &str = "/activityid/v1/user/create";
const PASSWORD_RESET: &str = "/activityid/v1/notification/request";
const ACCEPT_ASSERTIONS: &str = "/activityid/v1/assertions/accept";

/// Fully resolved endpoint URLs
///
/// Paths are appended to the configured base URLs, so a base URL carrying a
/// path prefix keeps it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    /// Token issuance and refresh, on the authorization server
    pub token: Url,
    /// User login
    pub login: Url,
    /// The logged-in user's profile
    pub me: Url,
    /// The settings of the configured entry point
    pub entrypoint: Url,
    /// User registration
    pub register: Url,
    /// Password reset notifications
    pub password_reset: Url,
    /// Acceptance of terms after a social login
    pub accept_assertions: Url,
}

impl Endpoints {
    /// Resolves every endpoint against the base URLs
    pub fn new(auth_base: &Url, graph_base: &Url, entry_point_id: &str) -> Result<Self, ParseError> {
        let mut entrypoint = join(graph_base, ENTRYPOINT)?;
        entrypoint
            .path_segments_mut()
            .map_err(|()| ParseError::RelativeUrlWithCannotBeABaseBase)?
            .push(entry_point_id);

        Ok(Self {
            token: join(auth_base, TOKEN)?,
            login: join(graph_base, LOGIN)?,
            me: join(graph_base, ME)?,
            entrypoint,
            register: join(graph_base, REGISTER)?,
            password_reset: join(graph_base, PASSWORD_RESET)?,
            accept_assertions: join(graph_base, ACCEPT_ASSERTIONS)?,
        })
    }
}

fn join(base: &Url, path: &str) -> Result<Url, ParseError> {
    Url::parse(&format!("{}{}", base.as_str().trim_end_matches('/'), path))
}
