use std::path::PathBuf;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use futures::future::try_join;
use log::{error, info, warn};

use crate::clients::{
    AuthState,
    entities::{
        DESCRIPTION_PREVIEW_LEN, Playlist, UriKind, User, filter_playlists_by_owner,
        format_playlist_name, parse_spotify_uri, truncate_description,
    },
    errors::{AuthError, Error, TemplateNotFoundError},
};
use crate::ui::{
    AppState,
    templates::{TemplateLoader, escape_html, render as fill},
};

/// A user event, decoded from the incoming request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    ShowPlaylists {
        owned_only: bool,
    },
    ShowPlaylist(String),
    /// Jump to the playlist named by a `spotify:playlist:<id>` URI.
    OpenUri(String),
    ShowSettings,
    Login,
    Callback {
        code: Option<String>,
        state: Option<String>,
        error: Option<String>,
    },
    Logout,
}

/// Session and configuration details shown on the settings page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsInfo {
    pub state: AuthState,
    pub expires_at: Option<DateTime<Utc>>,
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub token_cache: PathBuf,
}

/// Everything a page needs to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Login {
        message: Option<String>,
    },
    Playlists {
        user: User,
        playlists: Vec<Playlist>,
        owned_only: bool,
    },
    PlaylistDetail {
        playlist: Playlist,
    },
    Settings(SettingsInfo),
    Error {
        status: StatusCode,
        message: String,
        retry: String,
    },
    Redirect(String),
}

impl View {
    pub fn status(&self) -> StatusCode {
        match self {
            View::Error { status, .. } => *status,
            View::Redirect(_) => StatusCode::SEE_OTHER,
            _ => StatusCode::OK,
        }
    }
}

/// Run the service calls behind an action and produce the resulting view.
///
/// A view only ever answers the request that carried its action, so a slow
/// response to a superseded navigation can't overwrite a newer page.
pub async fn dispatch(state: &AppState, action: Action) -> View {
    match action {
        Action::ShowPlaylists { owned_only } => {
            let spotify = &state.spotify;
            match try_join(spotify.current_user(), spotify.list_playlists()).await {
                Ok((user, playlists)) => {
                    let playlists = if owned_only {
                        filter_playlists_by_owner(playlists, &user.id)
                    } else {
                        playlists
                    };
                    View::Playlists {
                        user,
                        playlists,
                        owned_only,
                    }
                }
                Err(e) => error_view(e, if owned_only { "/?owned=true" } else { "/" }),
            }
        }
        Action::ShowPlaylist(id) => {
            let spotify = &state.spotify;
            match try_join(spotify.get_playlist(&id), spotify.get_playlist_tracks(&id)).await {
                Ok((playlist, tracks)) => View::PlaylistDetail {
                    playlist: playlist.with_tracks(tracks),
                },
                Err(e) => error_view(e, &format!("/playlists/{id}")),
            }
        }
        Action::OpenUri(uri) => match parse_spotify_uri(uri.trim()) {
            Some((UriKind::Playlist, id)) => View::Redirect(format!("/playlists/{id}")),
            _ => {
                info!("Rejected playlist URI {uri:?}");
                View::Error {
                    status: StatusCode::BAD_REQUEST,
                    message: format!("{uri} is not a Spotify playlist URI."),
                    retry: "/".into(),
                }
            }
        },
        Action::ShowSettings => {
            let settings = state.auth.settings();
            View::Settings(SettingsInfo {
                state: state.auth.state().await,
                expires_at: state.auth.expires_at().await,
                client_id: settings.client_id.clone(),
                redirect_uri: settings.redirect_uri.to_string(),
                scopes: settings.scopes.clone(),
                token_cache: settings.cache_path.clone(),
            })
        }
        Action::Login => match state.auth.get_authorization_url() {
            Ok(url) => View::Redirect(url),
            Err(e) => error_view(e.into(), "/login"),
        },
        Action::Callback {
            error: Some(reason),
            ..
        } => {
            warn!("Authorization denied: {reason}");
            error_view(AuthError::Denied(reason).into(), "/")
        }
        Action::Callback {
            code: Some(code),
            state: Some(oauth_state),
            error: None,
        } => match state.auth.handle_callback(&code, &oauth_state).await {
            Ok(_) => View::Redirect("/".into()),
            Err(e) => error_view(e.into(), "/"),
        },
        Action::Callback { .. } => View::Login {
            message: Some("The authorization callback was incomplete, please log in again.".into()),
        },
        Action::Logout => {
            if let Err(e) = state.auth.logout().await {
                warn!("Logout failed to clear the token cache: {e}");
            }
            View::Redirect("/".into())
        }
    }
}

fn error_view(err: Error, retry: &str) -> View {
    match err {
        Error::Auth(AuthError::NotAuthenticated) => View::Login { message: None },
        Error::Auth(AuthError::Client(e)) => {
            error!("OAuth client failed: {e}");
            View::Error {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "Could not start the Spotify login, please retry.".into(),
                retry: retry.into(),
            }
        }
        Error::Auth(e) => {
            info!("Authorization required: {e}");
            View::Login {
                message: Some(match e {
                    AuthError::Denied(_) => "Access to Spotify was not granted.".into(),
                    _ => "Your session has expired, please log in again.".into(),
                }),
            }
        }
        Error::Api(e) => {
            warn!("Spotify request failed: {e}");
            View::Error {
                status: StatusCode::BAD_GATEWAY,
                message: "Could not load data from Spotify, please retry.".into(),
                retry: retry.into(),
            }
        }
        other => {
            error!("Request failed: {other}");
            View::Error {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "Unexpected error, please retry.".into(),
                retry: retry.into(),
            }
        }
    }
}

/// Render a view to a full HTML page. Redirects render as an empty body.
pub async fn render(
    templates: &TemplateLoader,
    view: &View,
) -> Result<String, TemplateNotFoundError> {
    let (title, account, content) = match view {
        View::Login { message } => {
            let message = message
                .as_deref()
                .map(|m| format!("<p class=\"message\">{}</p>", escape_html(m)))
                .unwrap_or_default();
            let template = templates.load("login.html").await?;
            (
                "Log in".to_string(),
                String::new(),
                fill(&template, &[("message", message.as_str())]),
            )
        }
        View::Playlists {
            user,
            playlists,
            owned_only,
        } => {
            let row = templates.load("playlist_row.html").await?;
            let rows: String = playlists
                .iter()
                .map(|p| {
                    fill(
                        &row,
                        &[
                            ("id", p.id.as_str()),
                            ("name", p.name.as_str()),
                            ("lock", lock(p)),
                            (
                                "description",
                                truncate_description(&p.description, DESCRIPTION_PREVIEW_LEN)
                                    .as_str(),
                            ),
                            ("owner", p.owner.as_str()),
                            ("track_count", p.track_count.to_string().as_str()),
                            ("cover", cover(p).as_str()),
                        ],
                    )
                })
                .collect();
            let (all_class, owned_class) = if *owned_only {
                ("", "active")
            } else {
                ("active", "")
            };
            let template = templates.load("playlists.html").await?;
            (
                "My Playlists".to_string(),
                account_header(user),
                fill(
                    &template,
                    &[
                        ("count", playlists.len().to_string().as_str()),
                        ("all_class", all_class),
                        ("owned_class", owned_class),
                        ("rows", rows.as_str()),
                    ],
                ),
            )
        }
        View::PlaylistDetail { playlist } => {
            let row = templates.load("track_row.html").await?;
            let rows: String = playlist
                .tracks
                .iter()
                .enumerate()
                .map(|(i, t)| {
                    fill(
                        &row,
                        &[
                            ("position", (i + 1).to_string().as_str()),
                            ("title", t.title.as_str()),
                            ("url", t.external_url.as_str()),
                            ("artists", t.artist_names().as_str()),
                            ("album", t.album.as_str()),
                            ("duration", t.duration_label().as_str()),
                        ],
                    )
                })
                .collect();
            let template = templates.load("playlist_detail.html").await?;
            let title = match format_playlist_name(&playlist.name) {
                name if name.is_empty() => "Playlist".to_string(),
                name => name,
            };
            (
                title,
                logout_link(),
                fill(
                    &template,
                    &[
                        ("name", playlist.name.as_str()),
                        ("lock", lock(playlist)),
                        ("description", playlist.description.as_str()),
                        ("owner", playlist.owner.as_str()),
                        ("track_count", playlist.track_count.to_string().as_str()),
                        ("url", playlist.external_url.as_str()),
                        ("cover", cover(playlist).as_str()),
                        ("rows", rows.as_str()),
                    ],
                ),
            )
        }
        View::Settings(info) => {
            let session = match info.state {
                AuthState::Unauthenticated => "Not logged in",
                AuthState::Authenticated => "Logged in",
                AuthState::Expired => "Session expired, it will be refreshed on the next request",
            };
            let expires = info
                .expires_at
                .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "-".into());
            let template = templates.load("settings.html").await?;
            (
                "Settings".to_string(),
                if info.state == AuthState::Unauthenticated {
                    String::new()
                } else {
                    logout_link()
                },
                fill(
                    &template,
                    &[
                        ("session", session),
                        ("expires", expires.as_str()),
                        ("client_id", info.client_id.as_str()),
                        ("redirect_uri", info.redirect_uri.as_str()),
                        ("scopes", info.scopes.join(" ").as_str()),
                        ("token_cache", info.token_cache.display().to_string().as_str()),
                    ],
                ),
            )
        }
        View::Error { message, retry, .. } => {
            let template = templates.load("error.html").await?;
            (
                "Error".to_string(),
                String::new(),
                fill(&template, &[("message", message.as_str()), ("retry", retry.as_str())]),
            )
        }
        View::Redirect(_) => return Ok(String::new()),
    };

    let layout = templates.load("layout.html").await?;
    Ok(fill(
        &layout,
        &[
            ("title", title.as_str()),
            ("account", account.as_str()),
            ("content", content.as_str()),
        ],
    ))
}

fn cover(playlist: &Playlist) -> String {
    match &playlist.image_url {
        Some(url) => format!("<img class=\"cover\" src=\"{}\" alt=\"\">", escape_html(url)),
        None => "<div class=\"cover\"></div>".into(),
    }
}

fn lock(playlist: &Playlist) -> &'static str {
    if playlist.is_private() {
        "<span class=\"lock\" title=\"Private playlist\">&#128274;</span>"
    } else {
        ""
    }
}

fn account_header(user: &User) -> String {
    format!("{} &bull; {}", escape_html(&user.display_name), logout_link())
}

fn logout_link() -> String {
    "<a href=\"/logout\">Log out</a>".into()
}
