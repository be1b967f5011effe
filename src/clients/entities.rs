use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::clients::errors::ValidationError;

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";
pub const UNKNOWN_OWNER: &str = "Unknown";

/// Length of descriptions in playlist listings.
pub const DESCRIPTION_PREVIEW_LEN: usize = 100;
const PLAYLIST_NAME_MAX_LEN: usize = 50;
const SPOTIFY_ID_LEN: usize = 22;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artists: Vec<String>,
    pub album: String,
    pub duration: Duration,
    pub external_url: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub description: String,
    pub owner: String,
    /// Empty when the provider did not name the owner.
    pub owner_id: String,
    pub track_count: u32,
    // empty until the detail view loads them
    pub tracks: Vec<Track>,
    pub external_url: String,
    pub image_url: Option<String>,
    pub uri: String,
    /// `None` when the provider does not say.
    pub public: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: String,
    pub display_name: String,
}

// Raw provider records. A field with an unexpected JSON type reads as
// missing, so only the required-field check can reject a record.

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

#[derive(Deserialize, Default)]
struct ExternalUrls {
    #[serde(default, deserialize_with = "lenient")]
    spotify: Option<String>,
}

#[derive(Deserialize)]
struct RawName {
    #[serde(default, deserialize_with = "lenient")]
    name: Option<String>,
}

#[derive(Deserialize)]
struct RawTrack {
    #[serde(default, deserialize_with = "lenient")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    artists: Option<Vec<Value>>,
    #[serde(default, deserialize_with = "lenient")]
    album: Option<RawName>,
    #[serde(default, deserialize_with = "lenient")]
    duration_ms: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    external_urls: Option<ExternalUrls>,
    #[serde(default, deserialize_with = "lenient")]
    uri: Option<String>,
}

#[derive(Deserialize)]
struct RawOwner {
    #[serde(default, deserialize_with = "lenient")]
    display_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    id: Option<String>,
}

#[derive(Deserialize)]
struct RawTrackSummary {
    #[serde(default, deserialize_with = "lenient")]
    total: Option<u32>,
}

#[derive(Deserialize)]
struct RawImage {
    #[serde(default, deserialize_with = "lenient")]
    url: Option<String>,
}

#[derive(Deserialize)]
struct RawPlaylist {
    #[serde(default, deserialize_with = "lenient")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    owner: Option<RawOwner>,
    #[serde(default, deserialize_with = "lenient")]
    tracks: Option<RawTrackSummary>,
    #[serde(default, deserialize_with = "lenient")]
    external_urls: Option<ExternalUrls>,
    #[serde(default, deserialize_with = "lenient")]
    images: Option<Vec<Value>>,
    #[serde(default, deserialize_with = "lenient")]
    uri: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    public: Option<bool>,
}

#[derive(Deserialize)]
struct RawUser {
    #[serde(default, deserialize_with = "lenient")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    display_name: Option<String>,
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ValidationError::MissingField(field))
}

fn parse<T: DeserializeOwned>(value: &Value) -> Result<T, ValidationError> {
    match value {
        Value::Null => Err(ValidationError::Null),
        Value::Object(_) => {
            T::deserialize(value).map_err(|e| ValidationError::Shape(e.to_string()))
        }
        other => Err(ValidationError::Shape(format!("expected an object, got {other}"))),
    }
}

// Elements of a list that have the expected shape, others are dropped
fn each<T: DeserializeOwned>(values: Option<Vec<Value>>) -> impl Iterator<Item = T> {
    values
        .unwrap_or_default()
        .into_iter()
        .filter_map(|v| T::deserialize(v).ok())
}

fn duration_from_millis(millis: Option<f64>) -> Duration {
    millis
        .and_then(|ms| Duration::try_from_secs_f64(ms / 1000.0).ok())
        .unwrap_or_default()
}

impl Track {
    /// Validate a track record.
    ///
    /// Accepts a bare track object or a playlist item wrapping it as
    /// `{"track": {...}}`. Optional fields fall back to placeholders.
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let value = match value.get("track") {
            Some(inner) if value.get("id").is_none() => inner,
            _ => value,
        };
        let raw: RawTrack = parse(value)?;

        let artists: Vec<String> = each::<RawName>(raw.artists)
            .filter_map(|a| a.name)
            .filter(|n| !n.trim().is_empty())
            .collect();

        Ok(Track {
            id: required(raw.id, "id")?,
            title: required(raw.name, "name")?,
            artists: if artists.is_empty() {
                vec![UNKNOWN_ARTIST.to_string()]
            } else {
                artists
            },
            album: raw
                .album
                .and_then(|a| a.name)
                .unwrap_or_else(|| UNKNOWN_ALBUM.to_string()),
            duration: duration_from_millis(raw.duration_ms),
            external_url: raw
                .external_urls
                .unwrap_or_default()
                .spotify
                .unwrap_or_default(),
            uri: raw.uri.unwrap_or_default(),
        })
    }

    pub fn artist_names(&self) -> String {
        self.artists.join(", ")
    }

    /// Duration as `m:ss`.
    pub fn duration_label(&self) -> String {
        let secs = self.duration.as_secs();
        format!("{}:{:02}", secs / 60, secs % 60)
    }
}

impl Playlist {
    /// Validate a playlist record. `tracks` is always left empty.
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let raw: RawPlaylist = parse(value)?;
        let (owner, owner_id) = match raw.owner {
            Some(o) => (o.display_name.or_else(|| o.id.clone()), o.id),
            None => (None, None),
        };

        Ok(Playlist {
            id: required(raw.id, "id")?,
            name: required(raw.name, "name")?,
            description: raw.description.unwrap_or_default(),
            owner: owner.unwrap_or_else(|| UNKNOWN_OWNER.to_string()),
            owner_id: owner_id.unwrap_or_default(),
            track_count: raw.tracks.and_then(|t| t.total).unwrap_or_default(),
            tracks: Vec::new(),
            external_url: raw
                .external_urls
                .unwrap_or_default()
                .spotify
                .unwrap_or_default(),
            image_url: each::<RawImage>(raw.images).find_map(|i| i.url),
            uri: raw.uri.unwrap_or_default(),
            public: raw.public,
        })
    }

    #[must_use]
    pub fn with_tracks(self, tracks: Vec<Track>) -> Self {
        Playlist { tracks, ..self }
    }

    /// Only playlists explicitly marked non-public are private.
    pub fn is_private(&self) -> bool {
        self.public == Some(false)
    }
}

impl User {
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let raw: RawUser = parse(value)?;
        let id = required(raw.id, "id")?;
        let display_name = raw
            .display_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| id.clone());
        Ok(User { id, display_name })
    }
}

/// Shorten `description` to at most `max_len` characters, ending with `...`
/// when it was cut.
pub fn truncate_description(description: &str, max_len: usize) -> String {
    if description.chars().count() <= max_len {
        return description.to_string();
    }
    let mut short: String = description.chars().take(max_len.saturating_sub(3)).collect();
    short.push_str("...");
    short
}

/// Playlist name without punctuation or symbols, at most 50 characters.
pub fn format_playlist_name(name: &str) -> String {
    let formatted: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    if formatted.chars().count() > PLAYLIST_NAME_MAX_LEN {
        let mut short: String = formatted.chars().take(PLAYLIST_NAME_MAX_LEN - 3).collect();
        short.push_str("...");
        return short.trim().to_string();
    }
    formatted.trim().to_string()
}

pub fn filter_playlists_by_owner(playlists: Vec<Playlist>, owner_id: &str) -> Vec<Playlist> {
    playlists
        .into_iter()
        .filter(|p| p.owner_id == owner_id)
        .collect()
}

/// Kind of object a `spotify:<kind>:<id>` URI points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriKind {
    Artist,
    Album,
    Track,
    Playlist,
}

/// Split a Spotify URI into its kind and 22 character base-62 id.
pub fn parse_spotify_uri(uri: &str) -> Option<(UriKind, &str)> {
    let mut parts = uri.split(':');
    let (Some("spotify"), Some(kind), Some(id), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };
    let kind = match kind {
        "artist" => UriKind::Artist,
        "album" => UriKind::Album,
        "track" => UriKind::Track,
        "playlist" => UriKind::Playlist,
        _ => return None,
    };
    let valid_id = id.len() == SPOTIFY_ID_LEN && id.chars().all(|c| c.is_ascii_alphanumeric());
    valid_id.then_some((kind, id))
}

pub fn validate_spotify_uri(uri: &str) -> bool {
    parse_spotify_uri(uri).is_some()
}
