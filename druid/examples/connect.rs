use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use druid::{
    dto::LoginRequest, store::FileTokenStore, ClientId, ClientSecret, DruidClient,
    ReqwestTransport, Settings,
};

#[derive(Debug, Parser)]
struct Opts {
    /// Base URL of the authorization server
    #[clap(long, env)]
    auth_base_url: url::Url,

    /// Base URL of the identity graph
    #[clap(long, env)]
    graph_base_url: url::Url,

    /// The client ID of the application
    #[clap(short, long, env)]
    client_id: ClientId,

    /// The client secret of the application
    #[clap(short = 's', long, env, hide_env_values = true)]
    client_secret: ClientSecret,

    /// The entry point users log in through
    #[clap(short, long, env)]
    entry_point_id: String,

    /// The language requested from the backend
    #[clap(long, env, default_value = "en")]
    language: String,

    /// The directory used to persist credentials
    #[clap(short = 'd', long, env, default_value = ".druid")]
    credentials_dir: PathBuf,

    /// Logs in with this email address before checking the session
    #[clap(long, env, requires = "password")]
    email: Option<String>,

    /// The password used with `--email`
    #[clap(long, env, hide_env_values = true)]
    password: Option<String>,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    let settings = Settings::new(
        opts.auth_base_url,
        opts.graph_base_url,
        opts.client_id.clone(),
        opts.client_secret,
        opts.entry_point_id,
    )
    .with_language(opts.language);

    let store = Arc::new(FileTokenStore::new(opts.credentials_dir, opts.client_id));
    let http = reqwest::Client::builder().https_only(true).build()?;
    let client = DruidClient::new(settings, Arc::new(ReqwestTransport::new(http)), store)?;

    let entrypoint = client.search_entrypoint().await?;
    tracing::info!(status = entrypoint.result.status, "fetched entry point settings");

    if let (Some(email), Some(password)) = (opts.email, opts.password) {
        client
            .login(&LoginRequest::with_password(email, password))
            .await?;
    }

    let connected = client.is_user_connected().await?;
    let user = connected.content.and_then(|content| content.user);
    tracing::info!(user = ?user, "user is connected");

    match client.edit_user_url().await {
        Ok(url) => tracing::info!(%url, "account can be edited"),
        Err(error) => {
            let error: &dyn std::error::Error = &error;
            tracing::warn!(error, "no edit-account link");
        }
    }

    Ok(())
}
