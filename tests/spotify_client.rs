//! Web API client against a mocked Spotify

mod common;

use rplaylist::clients::entities::{UNKNOWN_ALBUM, UNKNOWN_ARTIST};
use rplaylist::clients::errors::{ApiError, AuthError, Error};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{auth_with_token, page, playlist_json, spotify, track_item, valid_token};

#[tokio::test]
async fn playlists_are_aggregated_across_pages_in_order() {
    let server = MockServer::start().await;
    let next = format!("{}/v1/me/playlists?offset=2&limit=2", server.uri());

    // mounted first so the offset page wins over the generic matcher below
    Mock::given(method("GET"))
        .and(path("/v1/me/playlists"))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            vec![playlist_json("p3", "Third")],
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/me/playlists"))
        .and(query_param("limit", "2"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            vec![playlist_json("p1", "First"), playlist_json("p2", "Second")],
            Some(next),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let auth = auth_with_token(&server, &dir.path().join("token"), Some(&valid_token())).await;
    let client = spotify(&server, auth).with_page_size(2);

    let playlists = client.list_playlists().await.unwrap();
    let names: Vec<_> = playlists.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["First", "Second", "Third"]);
    assert_eq!(playlists[0].owner, "Alice");
    assert_eq!(playlists[0].track_count, 2);
    assert!(playlists.iter().all(|p| p.tracks.is_empty()));
}

#[tokio::test]
async fn malformed_tracks_are_skipped_and_missing_fields_get_placeholders() {
    let server = MockServer::start().await;
    let items = vec![
        track_item("t1", "One More Time"),
        // local file without id
        json!({"track": {"id": null, "name": "Local file"}}),
        // removed track
        json!({"added_at": "2024-05-01T10:00:00Z", "track": null}),
        json!({"track": {"id": "t2", "name": "Aerodynamic", "album": null, "artists": null}}),
        json!({"track": {"id": "t3"}}),
        json!({"track": {"id": "t4", "name": "Digital Love", "artists": [null, {"name": null}]}}),
    ];
    Mock::given(method("GET"))
        .and(path("/v1/playlists/p1/tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(items, None)))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let auth = auth_with_token(&server, &dir.path().join("token"), Some(&valid_token())).await;
    let tracks = spotify(&server, auth).get_playlist_tracks("p1").await.unwrap();

    let ids: Vec<_> = tracks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["t1", "t2", "t4"]);
    assert_eq!(tracks[0].artists, ["Daft Punk"]);
    assert_eq!(tracks[0].album, "Discovery");
    assert_eq!(tracks[1].album, UNKNOWN_ALBUM);
    assert_eq!(tracks[1].artists, [UNKNOWN_ARTIST]);
    assert_eq!(tracks[2].artists, [UNKNOWN_ARTIST]);
}

#[tokio::test]
async fn error_status_carries_provider_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/playlists"))
        .respond_with(
            ResponseTemplate::new(503)
                .set_body_json(json!({"error": {"status": 503, "message": "Service unavailable"}})),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let auth = auth_with_token(&server, &dir.path().join("token"), Some(&valid_token())).await;

    match spotify(&server, auth).list_playlists().await {
        Err(Error::Api(ApiError::Status { status, body })) => {
            assert_eq!(status.as_u16(), 503);
            assert!(body.contains("Service unavailable"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn failing_second_page_aborts_the_whole_fetch() {
    let server = MockServer::start().await;
    let next = format!("{}/v1/playlists/p1/tracks?offset=1", server.uri());

    Mock::given(method("GET"))
        .and(path("/v1/playlists/p1/tracks"))
        .and(query_param("offset", "1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/playlists/p1/tracks"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(page(vec![track_item("t1", "First")], Some(next))),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let auth = auth_with_token(&server, &dir.path().join("token"), Some(&valid_token())).await;

    assert!(matches!(
        spotify(&server, auth).get_playlist_tracks("p1").await,
        Err(Error::Api(ApiError::Status { .. }))
    ));
}

#[tokio::test]
async fn page_without_items_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/playlists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"next": null})))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let auth = auth_with_token(&server, &dir.path().join("token"), Some(&valid_token())).await;

    assert!(matches!(
        spotify(&server, auth).list_playlists().await,
        Err(Error::Api(ApiError::Malformed(_)))
    ));
}

#[tokio::test]
async fn non_json_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let auth = auth_with_token(&server, &dir.path().join("token"), Some(&valid_token())).await;

    assert!(matches!(
        spotify(&server, auth).current_user().await,
        Err(Error::Api(ApiError::Malformed(_)))
    ));
}

#[tokio::test]
async fn single_playlist_and_current_user() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/playlists/p9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(playlist_json("p9", "Ninth")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "alice", "display_name": "Alice"})),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let auth = auth_with_token(&server, &dir.path().join("token"), Some(&valid_token())).await;
    let client = spotify(&server, auth);

    let playlist = client.get_playlist("p9").await.unwrap();
    assert_eq!(playlist.name, "Ninth");
    assert_eq!(playlist.image_url.as_deref(), Some("https://i.scdn.co/image/p9"));
    assert_eq!(client.current_user().await.unwrap().display_name, "Alice");
}

#[tokio::test]
async fn requests_without_login_fail_with_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let auth = auth_with_token(&server, &dir.path().join("token"), None).await;

    assert!(matches!(
        spotify(&server, auth).list_playlists().await,
        Err(Error::Auth(AuthError::NotAuthenticated))
    ));
}

#[tokio::test]
async fn next_link_to_another_host_is_not_followed() {
    let server = MockServer::start().await;
    let elsewhere = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(vec![], None)))
        .expect(0)
        .mount(&elsewhere)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/me/playlists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            vec![playlist_json("p1", "First")],
            Some(format!("{}/v1/me/playlists?offset=1", elsewhere.uri())),
        )))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let auth = auth_with_token(&server, &dir.path().join("token"), Some(&valid_token())).await;

    assert!(matches!(
        spotify(&server, auth).list_playlists().await,
        Err(Error::Api(ApiError::Malformed(_)))
    ));
}

#[tokio::test]
async fn endless_pagination_is_cut_off() {
    let server = MockServer::start().await;
    let same_page = format!("{}/v1/me/playlists?limit=50", server.uri());
    Mock::given(method("GET"))
        .and(path("/v1/me/playlists"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(page(vec![playlist_json("p1", "Loop")], Some(same_page))),
        )
        .expect(3)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let auth = auth_with_token(&server, &dir.path().join("token"), Some(&valid_token())).await;

    assert!(matches!(
        spotify(&server, auth).with_max_pages(3).list_playlists().await,
        Err(Error::Api(ApiError::Malformed(_)))
    ));
}

#[tokio::test]
async fn records_with_odd_optional_fields_are_kept() {
    let server = MockServer::start().await;
    let mut odd = playlist_json("p2", "Odd");
    odd["tracks"] = json!({"total": -1});
    odd["images"] = json!("none");
    Mock::given(method("GET"))
        .and(path("/v1/me/playlists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            vec![playlist_json("p1", "First"), odd],
            None,
        )))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let auth = auth_with_token(&server, &dir.path().join("token"), Some(&valid_token())).await;

    let playlists = spotify(&server, auth).list_playlists().await.unwrap();
    assert_eq!(playlists.len(), 2);
    assert_eq!(playlists[1].track_count, 0);
    assert!(playlists[1].image_url.is_none());
}
