use druid_tokens::{ClientId, ClientSecret};
use serde::Deserialize;
use url::Url;

/// Configuration of a [`DruidClient`][crate::DruidClient]
///
/// ```
/// use druid::Settings;
///
/// let settings: Settings = serde_json::from_str(r#"{
///     "auth_base_url": "https://auth.example.com",
///     "graph_base_url": "https://graph.example.com",
///     "client_id": "my-app",
///     "client_secret": "s3cr3t",
///     "entry_point_id": "my-app-entrypoint"
/// }"#)?;
///
/// assert_eq!(settings.language, "en");
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    /// Base URL of the authorization server, which issues tokens
    pub auth_base_url: Url,

    /// Base URL of the identity graph API
    pub graph_base_url: Url,

    /// The client ID of the application
    pub client_id: ClientId,

    /// The client secret of the application
    pub client_secret: ClientSecret,

    /// The entry point the application logs users in through
    pub entry_point_id: String,

    /// The value of the `Accept-Language` header
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "en".to_owned()
}

impl Settings {
    /// Constructs settings using the default language
    pub fn new(
        auth_base_url: Url,
        graph_base_url: Url,
        client_id: impl Into<ClientId>,
        client_secret: impl Into<ClientSecret>,
        entry_point_id: impl Into<String>,
    ) -> Self {
        Self {
            auth_base_url,
            graph_base_url,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            entry_point_id: entry_point_id.into(),
            language: default_language(),
        }
    }

    /// Sets the language requested from the backend
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}
