//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use rplaylist::clients::{
    AuthService, OAuthSettings, SpotifyClient, Token, TokenCache,
    auth::{CachedToken, SCOPES},
};
use rplaylist::ui::{AppState, TemplateLoader};
use serde_json::{Value, json};
use url::Url;
use wiremock::MockServer;

pub const CLIENT_ID: &str = "test-client";
pub const CLIENT_SECRET: &str = "test-secret";
pub const REDIRECT_URI: &str = "http://127.0.0.1:8080/callback";

pub fn oauth_settings(server: &MockServer, cache_path: &Path) -> OAuthSettings {
    OAuthSettings {
        client_id: CLIENT_ID.into(),
        client_secret: CLIENT_SECRET.into(),
        redirect_uri: Url::parse(REDIRECT_URI).unwrap(),
        scopes: SCOPES.iter().map(|s| (*s).to_string()).collect(),
        accounts_url: Url::parse(&server.uri()).unwrap(),
        cache_path: cache_path.to_path_buf(),
    }
}

pub fn token(access: &str, expires_at: DateTime<Utc>) -> Token {
    Token {
        access_token: access.into(),
        expires_in: TimeDelta::hours(1),
        expires_at: Some(expires_at),
        refresh_token: Some("refresh-1".into()),
        scopes: HashSet::from(["playlist-read-private".to_string()]),
    }
}

pub fn valid_token() -> Token {
    token("access-1", Utc::now() + TimeDelta::hours(1))
}

pub fn expired_token() -> Token {
    token("access-1", Utc::now() - TimeDelta::minutes(5))
}

/// Auth service with `token` already stored in its cache file.
pub async fn auth_with_token(
    server: &MockServer,
    cache_path: &Path,
    token: Option<&Token>,
) -> Arc<AuthService> {
    if let Some(token) = token {
        TokenCache::new(cache_path).store(token).await.unwrap();
    }
    let auth = AuthService::new(oauth_settings(server, cache_path), reqwest::Client::new()).unwrap();
    auth.load_cached_token().await;
    Arc::new(auth)
}

pub async fn cached_token(cache_path: &Path) -> Token {
    match TokenCache::new(cache_path).load().await {
        CachedToken::Cached(token) => token,
        _ => panic!("no token cached in {cache_path:?}"),
    }
}

pub fn state_of(authorization_url: &str) -> String {
    Url::parse(authorization_url)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == "state")
        .unwrap()
        .1
        .into_owned()
}

pub fn spotify(server: &MockServer, auth: Arc<AuthService>) -> SpotifyClient {
    let api_url = Url::parse(&format!("{}/v1", server.uri())).unwrap();
    SpotifyClient::new(auth, reqwest::Client::new(), api_url)
}

pub fn template_dir() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/templates"))
}

pub fn app_state(auth: Arc<AuthService>, spotify: SpotifyClient) -> AppState {
    AppState {
        auth,
        spotify: Arc::new(spotify),
        templates: Arc::new(TemplateLoader::new(template_dir())),
        callback_path: "/callback".into(),
    }
}

pub fn playlist_json(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "description": format!("{name} description"),
        "owner": {"id": "alice", "display_name": "Alice"},
        "tracks": {"total": 2},
        "public": true,
        "images": [{"url": format!("https://i.scdn.co/image/{id}")}],
        "external_urls": {"spotify": format!("https://open.spotify.com/playlist/{id}")},
        "uri": format!("spotify:playlist:{id}")
    })
}

pub fn track_item(id: &str, name: &str) -> Value {
    json!({
        "added_at": "2024-05-01T10:00:00Z",
        "track": {
            "id": id,
            "name": name,
            "artists": [{"name": "Daft Punk"}],
            "album": {"name": "Discovery"},
            "duration_ms": 212_000,
            "external_urls": {"spotify": format!("https://open.spotify.com/track/{id}")},
            "uri": format!("spotify:track:{id}")
        }
    })
}

pub fn page(items: Vec<Value>, next: Option<String>) -> Value {
    json!({
        "href": "ignored",
        "limit": 50,
        "offset": 0,
        "total": items.len(),
        "items": items,
        "next": next,
    })
}
