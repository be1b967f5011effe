use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use log::{error, info};
use serde::Deserialize;

use crate::clients::{AuthService, SpotifyClient, errors::Result};

/// HTML template loading and placeholder substitution
pub mod templates;
/// Actions, views and the dispatch/render pipeline
pub mod view;

pub use templates::TemplateLoader;
pub use view::{Action, View};

/// Services shared by every request handler, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub spotify: Arc<SpotifyClient>,
    pub templates: Arc<TemplateLoader>,
    /// Path of the OAuth redirect URI, served by this router.
    pub callback_path: String,
}

#[derive(Deserialize)]
struct IndexParams {
    #[serde(default)]
    owned: bool,
}

#[derive(Deserialize)]
struct OpenParams {
    #[serde(default)]
    uri: String,
}

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

pub fn build_router(state: AppState) -> Router {
    let callback_path = state.callback_path.clone();
    Router::new()
        .route("/", get(index))
        .route("/playlists/{id}", get(playlist))
        .route("/open", get(open))
        .route("/settings", get(settings))
        .route("/login", get(login))
        .route("/logout", get(logout))
        .route("/health", get(health))
        .route(&callback_path, get(callback))
        .with_state(state)
}

pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{addr}");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

async fn index(State(state): State<AppState>, Query(params): Query<IndexParams>) -> Response {
    let action = Action::ShowPlaylists {
        owned_only: params.owned,
    };
    respond(&state, action).await
}

async fn playlist(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    respond(&state, Action::ShowPlaylist(id)).await
}

async fn open(State(state): State<AppState>, Query(params): Query<OpenParams>) -> Response {
    respond(&state, Action::OpenUri(params.uri)).await
}

async fn settings(State(state): State<AppState>) -> Response {
    respond(&state, Action::ShowSettings).await
}

async fn login(State(state): State<AppState>) -> Response {
    respond(&state, Action::Login).await
}

async fn logout(State(state): State<AppState>) -> Response {
    respond(&state, Action::Logout).await
}

async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let action = Action::Callback {
        code: params.code,
        state: params.state,
        error: params.error,
    };
    respond(&state, action).await
}

async fn health() -> &'static str {
    "ok"
}

async fn respond(state: &AppState, action: Action) -> Response {
    let view = view::dispatch(state, action).await;
    if let View::Redirect(location) = &view {
        return (view.status(), [(header::LOCATION, location.as_str())]).into_response();
    }

    match view::render(&state.templates, &view).await {
        Ok(html) => (view.status(), Html(html)).into_response(),
        Err(e) => {
            error!("{e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
