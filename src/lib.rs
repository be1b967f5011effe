//! Rplaylist - Browse Spotify playlists from a local web UI
//!
//! This library provides the Spotify OAuth token lifecycle, a paginated Web
//! API client that maps responses onto validated entities, and a small
//! server-rendered UI built on top of them.

/// Client modules for interacting with the Spotify accounts service and Web API
pub mod clients;
/// Settings and service wiring
pub mod config;
/// Server-rendered web UI
pub mod ui;
