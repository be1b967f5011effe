use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use url::Url;

use crate::clients::{
    AuthService, AuthState, OAuthSettings, SpotifyClient, auth::SCOPES,
    errors::{Error, Result},
};
use crate::ui::{AppState, TemplateLoader};

pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8080/callback";
pub const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.spotify.com";
pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const RESERVED_PATHS: &[&str] = &["/", "/login", "/logout", "/health", "/open", "/settings"];

/// Runtime settings, resolved from flags and environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: Url,
    pub accounts_url: Url,
    pub api_url: Url,
    pub host: IpAddr,
    pub port: u16,
    pub template_dir: PathBuf,
    pub token_cache: PathBuf,
}

impl Settings {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// The redirect URI path is served by the UI router.
    pub fn callback_path(&self) -> Result<String> {
        let path = self.redirect_uri.path();
        if RESERVED_PATHS.contains(&path) || path.starts_with("/playlists/") {
            return Err(Error::ConfigurationError(format!(
                "Redirect URI path {path} collides with an application route"
            )));
        }
        Ok(path.to_string())
    }

    fn oauth(&self) -> OAuthSettings {
        OAuthSettings {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            redirect_uri: self.redirect_uri.clone(),
            scopes: SCOPES.iter().map(|s| (*s).to_string()).collect(),
            accounts_url: self.accounts_url.clone(),
            cache_path: self.token_cache.clone(),
        }
    }
}

/// Builds the services once and wires them into the shared [`AppState`].
pub struct ConfigBuilder {
    settings: Settings,
    http: Option<reqwest::Client>,
    page_size: Option<u32>,
}

impl ConfigBuilder {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            http: None,
            page_size: None,
        }
    }

    #[must_use]
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    #[must_use]
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub async fn build(self) -> Result<AppState> {
        let settings = self.settings;
        let callback_path = settings.callback_path()?;

        let redirect_port = settings.redirect_uri.port_or_known_default();
        if redirect_port != Some(settings.port) {
            warn!(
                "Redirect URI {} does not point at port {}, the OAuth callback may not reach this server",
                settings.redirect_uri, settings.port
            );
        }

        let http = match self.http {
            Some(h) => h,
            None => reqwest::Client::builder()
                .timeout(HTTP_TIMEOUT)
                .user_agent(concat!("rplaylist/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| Error::ConfigurationError(format!("HTTP client: {e}")))?,
        };

        let auth = Arc::new(AuthService::new(settings.oauth(), http.clone())?);
        match auth.load_cached_token().await {
            AuthState::Unauthenticated => info!("No stored session, login required"),
            AuthState::Expired => info!("Stored session expired, it will be refreshed on first use"),
            AuthState::Authenticated => info!("Restored stored session"),
        }

        let mut spotify = SpotifyClient::new(auth.clone(), http, settings.api_url.clone());
        if let Some(page_size) = self.page_size {
            spotify = spotify.with_page_size(page_size);
        }
        debug!("Loading templates from {:?}", settings.template_dir);

        Ok(AppState {
            auth,
            spotify: Arc::new(spotify),
            templates: Arc::new(TemplateLoader::new(settings.template_dir)),
            callback_path,
        })
    }
}
