use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::PoisonError;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, info, warn};
use rand::{Rng, distr::Alphanumeric};
use reqwest::StatusCode;
use rspotify::{AuthCodeSpotify, Config, Credentials, OAuth};
use serde::Deserialize;
use tokio::sync::Mutex;
use url::Url;

use crate::clients::{
    errors::{AuthError, Error, Result},
    join_segments,
};

pub use rspotify::Token;

/// Scopes needed to read the user's private and collaborative playlists.
pub const SCOPES: &[&str] = &[
    "user-library-read",
    "playlist-read-private",
    "playlist-read-collaborative",
];

// Tokens this close to expiry are refreshed before use
const EXPIRY_MARGIN_SECS: i64 = 60;
const STATE_LEN: usize = 16;
/// Outstanding login attempts kept before the oldest is forgotten.
pub const MAX_PENDING_STATES: usize = 32;
const STATE_TTL: Duration = Duration::from_secs(10 * 60);

/// True when `token` has to be refreshed before it is used at `now`.
///
/// A token without an expiry date is treated as expired.
pub fn is_expired_at(token: &Token, now: DateTime<Utc>) -> bool {
    token
        .expires_at
        .and_then(|at| at.checked_sub_signed(TimeDelta::seconds(EXPIRY_MARGIN_SECS)))
        .is_none_or(|deadline| deadline <= now)
}

/// Logical state of the authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated,
    Expired,
}

// Body of a successful token endpoint response
#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
    scope: Option<String>,
}

impl TokenResponse {
    // The refresh grant may omit a new refresh token, in that case the
    // previous one stays valid.
    fn into_token(
        self,
        previous_refresh: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Token, AuthError> {
        let refresh_token = self
            .refresh_token
            .or_else(|| previous_refresh.map(str::to_string))
            .ok_or_else(|| AuthError::UnexpectedResponse("missing refresh_token".into()))?;

        let seconds = self.expires_in;
        let invalid_lifetime =
            || AuthError::UnexpectedResponse(format!("invalid expires_in {seconds}"));
        let expires_in = TimeDelta::try_seconds(seconds)
            .filter(|lifetime| *lifetime > TimeDelta::zero())
            .ok_or_else(invalid_lifetime)?;
        let expires_at = now
            .checked_add_signed(expires_in)
            .ok_or_else(invalid_lifetime)?;

        Ok(Token {
            access_token: self.access_token,
            expires_in,
            expires_at: Some(expires_at),
            refresh_token: Some(refresh_token),
            scopes: self
                .scope
                .unwrap_or_default()
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        })
    }
}

enum TokenOutcome {
    Granted(TokenResponse),
    Rejected { status: StatusCode, body: String },
}

// Result of loading a cached token from local storage
pub enum CachedToken {
    Cached(Token),
    NotFound,
    Error(AuthError),
}

/// Persists the token between runs in a single JSON file, using the
/// serialized form of [`rspotify::Token`].
// NOTE: single user application, the file is not locked.
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TokenCache { path: path.into() }
    }

    pub fn default_path() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp")) // Fallback to /tmp if cache directory can't be determined
            .join(".rplaylist_token_cache")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn store(&self, token: &Token) -> Result<(), AuthError> {
        let contents =
            serde_json::to_string_pretty(token).map_err(|e| AuthError::Cache(e.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AuthError::Cache(e.to_string()))?;
        }
        tokio::fs::write(&self.path, contents)
            .await
            .map_err(|e| AuthError::Cache(e.to_string()))?;
        debug!("Stored token in cache {:?}", self.path);
        Ok(())
    }

    pub async fn load(&self) -> CachedToken {
        match tokio::fs::try_exists(&self.path).await {
            Ok(true) => match tokio::fs::read_to_string(&self.path).await {
                Ok(contents) => match serde_json::from_str::<Token>(&contents) {
                    Ok(token) => {
                        debug!("Loaded token from cache");
                        CachedToken::Cached(token)
                    }
                    Err(e) => CachedToken::Error(AuthError::Cache(format!(
                        "corrupt token cache {:?}: {e}",
                        self.path
                    ))),
                },
                Err(e) => CachedToken::Error(AuthError::Cache(e.to_string())),
            },
            Ok(false) => {
                debug!("No cached token found in {:?}", self.path);
                CachedToken::NotFound
            }
            Err(e) => CachedToken::Error(AuthError::Cache(e.to_string())),
        }
    }

    pub async fn clear(&self) -> Result<(), AuthError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::Cache(e.to_string())),
        }
    }
}

/// Everything the authorization-code flow needs to talk to the provider.
#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: Url,
    pub scopes: Vec<String>,
    pub accounts_url: Url,
    pub cache_path: PathBuf,
}

// Login attempts waiting for their callback, oldest first
struct PendingStates {
    entries: VecDeque<(String, Instant)>,
}

impl PendingStates {
    fn new() -> Self {
        PendingStates {
            entries: VecDeque::with_capacity(MAX_PENDING_STATES),
        }
    }

    fn issue(&mut self, state: String, now: Instant) {
        self.prune(now);
        self.entries.push_back((state, now));
        while self.entries.len() > MAX_PENDING_STATES {
            self.entries.pop_front();
        }
    }

    fn take(&mut self, state: &str, now: Instant) -> bool {
        self.prune(now);
        match self.entries.iter().position(|(s, _)| s == state) {
            Some(index) => self.entries.remove(index).is_some(),
            None => false,
        }
    }

    fn prune(&mut self, now: Instant) {
        while self
            .entries
            .front()
            .is_some_and(|(_, issued)| now.duration_since(*issued) > STATE_TTL)
        {
            self.entries.pop_front();
        }
    }
}

/// Owns the token and drives the OAuth 2.0 authorization-code flow.
///
/// States: no token (unauthenticated), valid token (authenticated), and
/// expired token which is refreshed on the next [`AuthService::get_valid_token`].
///
/// The authorize URL is built by `rspotify`. Token requests go through the
/// shared HTTP client so a provider rejection can be told apart from a
/// network failure.
pub struct AuthService {
    spotify: AuthCodeSpotify,
    settings: OAuthSettings,
    token_url: Url,
    http: reqwest::Client,
    cache: TokenCache,
    // held across a refresh so concurrent callers trigger a single refresh
    token: Mutex<Option<Token>>,
    pending_states: std::sync::Mutex<PendingStates>,
}

impl AuthService {
    pub fn new(settings: OAuthSettings, http: reqwest::Client) -> Result<Self> {
        let token_url = join_segments(&settings.accounts_url, &["api", "token"]).ok_or_else(|| {
            Error::ConfigurationError(format!("Invalid accounts URL: {}", settings.accounts_url))
        })?;

        let mut auth_base_url = settings.accounts_url.to_string();
        if !auth_base_url.ends_with('/') {
            auth_base_url.push('/');
        }
        let spotify = AuthCodeSpotify::with_config(
            Credentials::new(&settings.client_id, &settings.client_secret),
            OAuth {
                redirect_uri: settings.redirect_uri.to_string(),
                scopes: settings.scopes.iter().cloned().collect::<HashSet<_>>(),
                ..Default::default()
            },
            Config {
                auth_base_url,
                token_cached: false,
                ..Default::default()
            },
        );

        Ok(AuthService {
            spotify,
            cache: TokenCache::new(settings.cache_path.clone()),
            settings,
            token_url,
            http,
            token: Mutex::new(None),
            pending_states: std::sync::Mutex::new(PendingStates::new()),
        })
    }

    pub fn settings(&self) -> &OAuthSettings {
        &self.settings
    }

    /// Build the provider URL the user has to visit to grant access.
    ///
    /// A fresh `state` value is remembered so the callback can be matched.
    /// Only the latest [`MAX_PENDING_STATES`] attempts of the last ten
    /// minutes are kept.
    pub fn get_authorization_url(&self) -> Result<String, AuthError> {
        let state: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(STATE_LEN)
            .map(char::from)
            .collect();

        let mut client = self.spotify.clone();
        client.oauth.state.clone_from(&state);
        let url = client.get_authorize_url(false)?;

        self.pending_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .issue(state, Instant::now());
        Ok(url)
    }

    /// Verify the `state` returned by the provider, then exchange the code.
    pub async fn handle_callback(&self, code: &str, state: &str) -> Result<Token, AuthError> {
        let known = self
            .pending_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take(state, Instant::now());
        if !known {
            return Err(AuthError::StateMismatch);
        }
        self.exchange_code_for_token(code).await
    }

    pub async fn exchange_code_for_token(&self, code: &str) -> Result<Token, AuthError> {
        debug!("Exchanging authorization code for a token ...");
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.settings.redirect_uri.as_str()),
        ];

        let token = match self.request_token(&params).await? {
            TokenOutcome::Granted(response) => response.into_token(None, Utc::now())?,
            TokenOutcome::Rejected { status, body } => {
                return Err(AuthError::ExchangeRejected { status, body });
            }
        };

        self.persist(&token).await;
        *self.token.lock().await = Some(token.clone());
        info!("Authorization completed");
        Ok(token)
    }

    /// Current token, refreshed first when it is expired or about to expire.
    pub async fn get_valid_token(&self) -> Result<Token, AuthError> {
        let mut guard = self.token.lock().await;
        let current = guard.as_ref().ok_or(AuthError::NotAuthenticated)?;
        if !is_expired_at(current, Utc::now()) {
            return Ok(current.clone());
        }

        debug!("Access token expired at {:?}, refreshing ...", current.expires_at);
        let Some(refresh_token) = current.refresh_token.clone() else {
            warn!("Stored token has no refresh token, authorization has to be restarted");
            *guard = None;
            self.forget_cache().await;
            return Err(AuthError::NotAuthenticated);
        };
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
        ];

        // A network failure keeps the stored token so a later call can retry
        match self.request_token(&params).await? {
            TokenOutcome::Granted(response) => {
                let token = response.into_token(Some(&refresh_token), Utc::now())?;
                self.persist(&token).await;
                *guard = Some(token.clone());
                debug!("Token refreshed, valid until {:?}", token.expires_at);
                Ok(token)
            }
            TokenOutcome::Rejected { status, body } => {
                warn!("Token refresh rejected ({status}), authorization has to be restarted");
                *guard = None;
                self.forget_cache().await;
                Err(AuthError::RefreshRejected { status, body })
            }
        }
    }

    pub async fn state(&self) -> AuthState {
        match self.token.lock().await.as_ref() {
            None => AuthState::Unauthenticated,
            Some(token) if is_expired_at(token, Utc::now()) => AuthState::Expired,
            Some(_) => AuthState::Authenticated,
        }
    }

    /// Expiry of the stored token, if there is one.
    pub async fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.token.lock().await.as_ref().and_then(|t| t.expires_at)
    }

    /// Restore the token persisted by a previous run, if any.
    pub async fn load_cached_token(&self) -> AuthState {
        match self.cache.load().await {
            CachedToken::Cached(token) => {
                *self.token.lock().await = Some(token);
            }
            CachedToken::NotFound => {}
            CachedToken::Error(e) => {
                warn!("Ignoring token cache: {e}");
            }
        }
        self.state().await
    }

    pub async fn logout(&self) -> Result<(), AuthError> {
        *self.token.lock().await = None;
        self.cache.clear().await?;
        info!("Logged out, token cache removed");
        Ok(())
    }

    async fn persist(&self, token: &Token) {
        // The in-memory token stays usable even if the cache can't be written
        if let Err(e) = self.cache.store(token).await {
            warn!("Failed to persist token: {e}");
        }
    }

    async fn forget_cache(&self) {
        if let Err(e) = self.cache.clear().await {
            warn!("Failed to clear token cache: {e}");
        }
    }

    async fn request_token(&self, params: &[(&str, &str)]) -> Result<TokenOutcome, AuthError> {
        let response = self
            .http
            .post(self.token_url.clone())
            .basic_auth(&self.settings.client_id, Some(&self.settings.client_secret))
            .form(params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Ok(TokenOutcome::Rejected { status, body });
        }
        serde_json::from_str(&body)
            .map(TokenOutcome::Granted)
            .map_err(|e| AuthError::UnexpectedResponse(e.to_string()))
    }
}
