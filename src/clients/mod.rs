use url::Url;

/// Spotify OAuth flow and token persistence
pub mod auth;
/// Data entities for playlists, tracks and users
pub mod entities;
/// Error types and result aliases
pub mod errors;
/// Spotify Web API client
pub mod spotify;

pub use auth::{AuthService, AuthState, OAuthSettings, Token, TokenCache};
pub use spotify::SpotifyClient;

// Append path segments to a base URL, percent-encoding each segment.
// None when the base can't carry a path (e.g. `mailto:`).
pub(crate) fn join_segments(base: &Url, segments: &[&str]) -> Option<Url> {
    let mut url = base.clone();
    url.path_segments_mut().ok()?.pop_if_empty().extend(segments);
    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_segments_handles_trailing_slash_and_encoding() {
        let base = Url::parse("https://api.spotify.com/v1/").unwrap();
        let url = join_segments(&base, &["playlists", "a b", "tracks"]).unwrap();
        assert_eq!(url.as_str(), "https://api.spotify.com/v1/playlists/a%20b/tracks");

        let base = Url::parse("http://127.0.0.1:9000").unwrap();
        let url = join_segments(&base, &["api", "token"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/api/token");
    }
}
