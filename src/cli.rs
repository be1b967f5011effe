use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;
use log::info;
use rplaylist::clients::TokenCache;
use rplaylist::clients::errors::{Error, Result};
use rplaylist::config::{
    ConfigBuilder, DEFAULT_ACCOUNTS_URL, DEFAULT_API_URL, DEFAULT_REDIRECT_URI, Settings,
};
use url::Url;

#[derive(Parser)]
#[command(name = "rplaylist")]
#[command(version, about = "Browse your Spotify playlists from a local web UI", long_about = None)]
struct Cli {
    /// Address the UI server binds to
    #[arg(long, env = "RPLAYLIST_HOST", default_value = "127.0.0.1")]
    host: IpAddr,

    /// Port the UI server listens on
    #[arg(long, env = "RPLAYLIST_PORT", default_value_t = 8080)]
    port: u16,

    /// Directory holding the HTML templates
    #[arg(long, env = "RPLAYLIST_TEMPLATE_DIR", default_value = "templates")]
    template_dir: PathBuf,

    /// Token cache file, defaults to the user cache directory
    #[arg(long, env = "RPLAYLIST_TOKEN_CACHE")]
    token_cache: Option<PathBuf>,

    #[arg(long, env = "SPOTIFY_CLIENT_ID", hide_env_values = true)]
    client_id: Option<String>,

    #[arg(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    #[arg(long, env = "SPOTIFY_REDIRECT_URI", default_value = DEFAULT_REDIRECT_URI)]
    redirect_uri: Url,

    #[arg(long, env = "SPOTIFY_ACCOUNTS_URL", default_value = DEFAULT_ACCOUNTS_URL)]
    accounts_url: Url,

    #[arg(long, env = "SPOTIFY_API_URL", default_value = DEFAULT_API_URL)]
    api_url: Url,
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    value.filter(|v| !v.trim().is_empty()).ok_or_else(|| {
        Error::ConfigurationError(format!(
            "Missing {name} in environment variables. Check README.MD for details."
        ))
    })
}

impl TryFrom<Cli> for Settings {
    type Error = Error;

    fn try_from(cli: Cli) -> Result<Self> {
        Ok(Settings {
            client_id: required(cli.client_id, "SPOTIFY_CLIENT_ID")?,
            client_secret: required(cli.client_secret, "SPOTIFY_CLIENT_SECRET")?,
            redirect_uri: cli.redirect_uri,
            accounts_url: cli.accounts_url,
            api_url: cli.api_url,
            host: cli.host,
            port: cli.port,
            template_dir: cli.template_dir,
            token_cache: cli.token_cache.unwrap_or_else(TokenCache::default_path),
        })
    }
}

pub async fn run() -> Result<()> {
    let settings = Settings::try_from(Cli::parse())?;
    let addr = settings.addr();

    info!("Building services ...");
    let state = ConfigBuilder::new(settings).build().await?;
    rplaylist::ui::serve(state, addr).await
}
