use std::sync::Arc;

use log::{debug, warn};
use serde_json::Value;
use url::Url;

use crate::clients::{
    auth::AuthService,
    entities::{Playlist, Track, User},
    errors::{ApiError, Error, Result, ValidationError},
    join_segments,
};

/// Largest page the playlist endpoints accept.
pub const DEFAULT_PAGE_SIZE: u32 = 50;
/// Pages followed for a single listing before giving up.
pub const DEFAULT_MAX_PAGES: usize = 500;

pub struct SpotifyClient {
    auth: Arc<AuthService>,
    http: reqwest::Client,
    api_url: Url,
    page_size: u32,
    max_pages: usize,
}

impl SpotifyClient {
    pub fn new(auth: Arc<AuthService>, http: reqwest::Client, api_url: Url) -> Self {
        SpotifyClient {
            auth,
            http,
            api_url,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    #[must_use]
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    // Fetch every playlist of the current user, in provider order
    pub async fn list_playlists(&self) -> Result<Vec<Playlist>> {
        let url = self.paged_endpoint(&["me", "playlists"])?;
        let playlists = self.fetch_all(url, "playlist", Playlist::from_json).await?;
        debug!("Fetched {} playlists", playlists.len());
        Ok(playlists)
    }

    // Fetch every track of a playlist. Entries that fail validation (local
    // files without id, removed tracks) are skipped.
    pub async fn get_playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>> {
        let url = self.paged_endpoint(&["playlists", playlist_id, "tracks"])?;
        let tracks = self.fetch_all(url, "track", Track::from_json).await?;
        debug!("Fetched {} tracks of playlist {playlist_id}", tracks.len());
        Ok(tracks)
    }

    pub async fn get_playlist(&self, playlist_id: &str) -> Result<Playlist> {
        let url = self.endpoint(&["playlists", playlist_id])?;
        let body = self.get_json(url).await?;
        Playlist::from_json(&body)
            .map_err(|e| Error::from(ApiError::Malformed(format!("playlist {playlist_id}: {e}"))))
    }

    pub async fn current_user(&self) -> Result<User> {
        let url = self.endpoint(&["me"])?;
        let body = self.get_json(url).await?;
        User::from_json(&body).map_err(|e| Error::from(ApiError::Malformed(format!("user: {e}"))))
    }

    // Follow `next` links until the last page. Any failing page aborts the
    // whole fetch, malformed items are logged and skipped. `next` links must
    // stay on the API origin.
    async fn fetch_all<T>(
        &self,
        first: Url,
        kind: &str,
        parse: fn(&Value) -> Result<T, ValidationError>,
    ) -> Result<Vec<T>> {
        let mut results = Vec::new();
        let mut position = 0usize;
        let mut next = Some(first);
        let mut pages = 0usize;

        while let Some(url) = next.take() {
            if pages == self.max_pages {
                return Err(ApiError::Malformed(format!(
                    "pagination did not end after {pages} pages"
                ))
                .into());
            }
            pages += 1;
            let page = self.get_json(url).await?;
            let items = page
                .get("items")
                .and_then(Value::as_array)
                .ok_or_else(|| ApiError::Malformed("page without `items` array".into()))?;

            for item in items {
                match parse(item) {
                    Ok(record) => results.push(record),
                    Err(e) => warn!("Skipping malformed {kind} at position {position}: {e}"),
                }
                position += 1;
            }

            next = match page.get("next") {
                None | Some(Value::Null) => None,
                Some(Value::String(link)) => Some(self.next_link(link)?),
                Some(other) => {
                    return Err(ApiError::Malformed(format!("invalid `next` field: {other}")).into());
                }
            };
        }
        Ok(results)
    }

    fn next_link(&self, link: &str) -> Result<Url, ApiError> {
        let url = Url::parse(link)
            .map_err(|e| ApiError::Malformed(format!("invalid `next` link {link}: {e}")))?;
        if url.origin() != self.api_url.origin() {
            return Err(ApiError::Malformed(format!(
                "`next` link {link} leaves the API origin"
            )));
        }
        Ok(url)
    }

    async fn get_json(&self, url: Url) -> Result<Value> {
        let token = self.auth.get_valid_token().await?;
        debug!("GET {url}");
        let response = self
            .http
            .get(url)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(ApiError::from)?;

        let status = response.status();
        let body = response.text().await.map_err(ApiError::from)?;
        if !status.is_success() {
            return Err(ApiError::Status { status, body }.into());
        }
        serde_json::from_str(&body)
            .map_err(|e| ApiError::Malformed(format!("invalid JSON body: {e}")).into())
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        join_segments(&self.api_url, segments).ok_or_else(|| {
            Error::ConfigurationError(format!("Invalid API URL: {}", self.api_url))
        })
    }

    fn paged_endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.endpoint(segments)?;
        url.query_pairs_mut()
            .append_pair("limit", &self.page_size.to_string());
        Ok(url)
    }
}
