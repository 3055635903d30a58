use serde_json::{json, Value};
use std::time::Duration;
use tunedeck_client::{
    ClientEvent, Console, EntryStatus, MutationPolicy, NotificationLevel, QueryPolicy, Session,
    TransportOptions,
};
use tunedeck_core::{keys, LoginRequest, PaginationParams, SearchType, YearBucket};
use tunedeck_test_utils::fixtures::{
    artist, auth_response, envelope, event, failure, paginated, playlist, track, user,
};
use tunedeck_test_utils::MockBackend;

async fn setup() -> (MockBackend, Console) {
    let backend = MockBackend::start().await.unwrap();
    let console = Console::new(
        TransportOptions::new(backend.base_url()).with_timeout(Duration::from_secs(5)),
        Session::in_memory(),
        QueryPolicy::default().with_backoff(Duration::from_millis(1), Duration::from_millis(5)),
        MutationPolicy::default().with_backoff(Duration::from_millis(1), Duration::from_millis(5)),
    )
    .unwrap();
    (backend, console)
}

#[tokio::test]
async fn test_list_served_from_cache() {
    let (backend, console) = setup().await;
    backend.on(
        "GET",
        "/artists",
        200,
        envelope(paginated(vec![artist("a1", "Kanaria"), artist("a2", "Ado")])),
    );

    let first = console.artists().list(None).await.unwrap();
    let second = console.artists().list(None).await.unwrap();

    assert_eq!(first.items.len(), 2);
    assert_eq!(second.items[1].name, "Ado");
    assert_eq!(backend.count("GET", "/artists"), 1);
    assert_eq!(console.cache().stats().hits, 1);
}

#[tokio::test]
async fn test_concurrent_reads_share_one_request() {
    let (backend, console) = setup().await;
    backend.set_delay(Duration::from_millis(100));
    backend.on("GET", "/tracks", 200, envelope(paginated(vec![track("t1", "Intro", "al1")])));

    let tracks = console.tracks();
    let (a, b) = tokio::join!(tracks.list(None), tracks.list(None));

    assert_eq!(a.unwrap().items[0].id, "t1");
    assert_eq!(b.unwrap().items[0].id, "t1");
    assert_eq!(backend.count("GET", "/tracks"), 1);
}

#[tokio::test]
async fn test_distinct_params_are_distinct_entries() {
    let (backend, console) = setup().await;
    backend.on("GET", "/artists", 200, envelope(paginated(vec![])));

    let artists = console.artists();
    artists.list(Some(&PaginationParams::page(1, 10))).await.unwrap();
    artists.list(Some(&PaginationParams::page(2, 10))).await.unwrap();
    artists.list(Some(&PaginationParams::page(1, 10))).await.unwrap();

    assert_eq!(backend.count("GET", "/artists"), 2);
}

#[tokio::test]
async fn test_update_invalidates_detail_and_lists() {
    let (backend, console) = setup().await;
    backend.on_sequence(
        "GET",
        "/artists/a1",
        vec![
            (200, envelope(artist("a1", "Kanaria"))),
            (200, envelope(artist("a1", "KANARIA"))),
        ],
    );
    backend.on("GET", "/artists", 200, envelope(paginated(vec![artist("a1", "Kanaria")])));
    backend.on("PUT", "/artists/a1", 200, envelope(artist("a1", "KANARIA")));

    let artists = console.artists();
    artists.detail("a1").await.unwrap();
    artists.list(None).await.unwrap();

    let updated = artists.update("a1", &json!({"name": "KANARIA"})).await.unwrap();
    assert_eq!(updated.name, "KANARIA");

    let cache = console.cache();
    assert_eq!(
        cache.status(&keys::detail(keys::ARTISTS, "a1")),
        Some(EntryStatus::Invalidated)
    );
    assert_eq!(
        cache.status(&keys::list(keys::ARTISTS, None::<&PaginationParams>)),
        Some(EntryStatus::Invalidated)
    );

    let refetched = artists.detail("a1").await.unwrap().unwrap();
    assert_eq!(refetched.name, "KANARIA");
    assert_eq!(backend.count("GET", "/artists/a1"), 2);
}

#[tokio::test]
async fn test_create_leaves_details_alone() {
    let (backend, console) = setup().await;
    backend.on("GET", "/artists/a1", 200, envelope(artist("a1", "Kanaria")));
    backend.on("GET", "/artists", 200, envelope(paginated(vec![])));
    backend.on("POST", "/artists", 200, envelope(artist("a2", "Ado")));

    let artists = console.artists();
    artists.detail("a1").await.unwrap();
    artists.list(None).await.unwrap();
    artists.create(&json!({"name": "Ado"})).await.unwrap();

    let cache = console.cache();
    assert_eq!(cache.status(&keys::detail(keys::ARTISTS, "a1")), Some(EntryStatus::Fresh));
    assert_eq!(
        cache.status(&keys::list(keys::ARTISTS, None::<&PaginationParams>)),
        Some(EntryStatus::Invalidated)
    );
}

#[tokio::test]
async fn test_failed_mutation_keeps_cache_and_is_not_retried() {
    let (backend, console) = setup().await;
    backend.on("GET", "/albums", 200, envelope(paginated(vec![])));
    backend.on("POST", "/albums", 422, json!({"message": "title is required"}));

    let albums = console.albums();
    albums.list(None).await.unwrap();
    let err = albums.create(&json!({"title": ""})).await.unwrap_err();

    assert_eq!(err.code, 422);
    assert_eq!(backend.count("POST", "/albums"), 1);
    assert_eq!(
        console
            .cache()
            .status(&keys::list(keys::ALBUMS, None::<&PaginationParams>)),
        Some(EntryStatus::Fresh)
    );
}

#[tokio::test]
async fn test_transient_read_failure_is_retried() {
    let (backend, console) = setup().await;
    backend.on_sequence(
        "GET",
        "/playlists",
        vec![
            (503, json!({"message": "warming up"})),
            (200, envelope(paginated(vec![playlist("p1", "Favourites")]))),
        ],
    );

    let listing = console.playlists().list(None).await.unwrap();
    assert_eq!(listing.items[0].name, "Favourites");
    assert_eq!(backend.count("GET", "/playlists"), 2);
}

#[tokio::test]
async fn test_undecodable_detail_fails_without_retry() {
    let (backend, console) = setup().await;
    backend.on("GET", "/artists/a1", 200, envelope(json!({"unexpected": true})));

    let err = console.artists().detail("a1").await.unwrap_err();
    assert!(err.message.starts_with("invalid response body"));
    assert_eq!(backend.count("GET", "/artists/a1"), 1);
}

#[tokio::test]
async fn test_empty_id_disables_read() {
    let (backend, console) = setup().await;

    assert!(console.artists().detail("").await.unwrap().is_none());
    assert!(console.artists().albums("").await.unwrap().is_none());
    assert!(console.playlists().tracks("").await.unwrap().is_none());
    assert!(console.search().search("", None).await.unwrap().is_none());

    assert!(backend.requests().is_empty());
    assert!(console.cache().is_empty());
}

#[tokio::test]
async fn test_search_sends_query_and_type() {
    let (backend, console) = setup().await;
    backend.on(
        "GET",
        "/search",
        200,
        envelope(json!({"artists": [artist("a1", "Kanaria")], "albums": [], "tracks": []})),
    );

    let results = console
        .search()
        .search("kana", Some(SearchType::Artist))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(results.artists.len(), 1);

    let request = &backend.requests_to("GET", "/search")[0];
    assert_eq!(request.query.get("query").map(String::as_str), Some("kana"));
    assert_eq!(request.query.get("type").map(String::as_str), Some("artist"));
}

#[tokio::test]
async fn test_playlist_membership_invalidates_nested_tracks() {
    let (backend, console) = setup().await;
    backend.on("GET", "/playlists/p1", 200, envelope(playlist("p1", "Favourites")));
    backend.on("GET", "/playlists/p1/tracks", 200, envelope(json!([])));
    backend.on("POST", "/playlists/p1/tracks", 200, envelope(Value::Null));
    backend.on("DELETE", "/playlists/p1/tracks/t1", 200, envelope(Value::Null));

    let playlists = console.playlists();
    playlists.detail("p1").await.unwrap();
    playlists.tracks("p1").await.unwrap();

    playlists.add_track("p1", "t1").await.unwrap();
    let post = &backend.requests_to("POST", "/playlists/p1/tracks")[0];
    assert_eq!(post.body, Some(json!({"trackId": "t1"})));

    let cache = console.cache();
    assert_eq!(cache.status(&keys::playlist_tracks("p1")), Some(EntryStatus::Invalidated));
    assert_eq!(
        cache.status(&keys::detail(keys::PLAYLISTS, "p1")),
        Some(EntryStatus::Invalidated)
    );

    playlists.tracks("p1").await.unwrap();
    assert_eq!(cache.status(&keys::playlist_tracks("p1")), Some(EntryStatus::Fresh));
    playlists.remove_track("p1", "t1").await.unwrap();
    assert_eq!(cache.status(&keys::playlist_tracks("p1")), Some(EntryStatus::Invalidated));
}

#[tokio::test]
async fn test_login_seeds_current_user() {
    let (backend, console) = setup().await;
    let mut events = console.subscribe();
    backend.on(
        "POST",
        "/auth/login",
        200,
        envelope(auth_response("tok-1", user("u1", "miku"))),
    );

    let request = LoginRequest {
        email: "miku@example.com".to_string(),
        password: "secret".to_string(),
    };
    let response = console.auth().login(&request).await.unwrap();
    assert_eq!(response.token, "tok-1");
    assert_eq!(console.session().token().as_deref(), Some("tok-1"));

    let me = console.auth().current_user().await.unwrap();
    assert_eq!(me.username, "miku");
    assert_eq!(backend.count("GET", "/auth/me"), 0);
    assert!(matches!(
        events.try_recv(),
        Ok(ClientEvent::SignedIn { username }) if username == "miku"
    ));
}

#[tokio::test]
async fn test_logout_clears_token_then_cache() {
    let (backend, console) = setup().await;
    console.session().set_token("tok-1");
    let mut events = console.subscribe();
    backend.on("GET", "/artists", 200, envelope(paginated(vec![artist("a1", "Kanaria")])));
    backend.on("POST", "/auth/logout", 200, envelope(Value::Null));

    console.artists().list(None).await.unwrap();
    assert!(!console.cache().is_empty());

    console.logout().await.unwrap();

    let logout = &backend.requests_to("POST", "/auth/logout")[0];
    assert_eq!(logout.authorization.as_deref(), Some("Bearer tok-1"));
    assert!(console.session().token().is_none());
    assert!(console.cache().is_empty());
    assert!(matches!(events.try_recv(), Ok(ClientEvent::SignedOut)));

    console.artists().list(None).await.unwrap();
    assert_eq!(backend.count("GET", "/artists"), 2);
    assert!(backend.requests_to("GET", "/artists")[1].authorization.is_none());
}

#[tokio::test]
async fn test_failed_logout_keeps_session() {
    let (backend, console) = setup().await;
    console.session().set_token("tok-1");
    backend.on("POST", "/auth/logout", 200, failure(50000, "logout failed"));

    let err = console.logout().await.unwrap_err();
    assert_eq!(err.code, 50000);
    assert_eq!(console.session().token().as_deref(), Some("tok-1"));
}

#[tokio::test]
async fn test_events_grouped_by_year() {
    let (backend, console) = setup().await;
    backend.on(
        "GET",
        "/v1/events",
        200,
        envelope(json!([
            event(1, "M3", "2024-04-28"),
            event(2, "Comiket", "2023-12-30"),
            event(3, "M3", "2024-10-27T10:00:00Z"),
            event(4, "Reitaisai", "sometime"),
        ])),
    );

    let groups = console.events().by_year(None).await.unwrap();
    let labels: Vec<_> = groups.iter().map(|g| g.year).collect();
    assert_eq!(
        labels,
        vec![YearBucket::Year(2024), YearBucket::Year(2023), YearBucket::Undated]
    );
    let ids: Vec<i64> = groups[0].events.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![3, 1]);

    let by_type = console.events().by_type(None).await.unwrap();
    let m3 = by_type.iter().find(|g| g.event_type == "M3").unwrap();
    assert_eq!(m3.events.len(), 2);
    assert_eq!(backend.count("GET", "/v1/events"), 1);
}

#[tokio::test]
async fn test_unauthorized_read_signals_login_and_notifies() {
    let (backend, console) = setup().await;
    console.session().set_token("stale");
    let mut events = console.subscribe();
    backend.on("GET", "/auth/me", 401, json!({"message": "token expired"}));

    let err = console.auth().current_user().await.unwrap_err();
    assert!(err.is_auth());
    assert_eq!(backend.count("GET", "/auth/me"), 1);
    assert!(matches!(events.try_recv(), Ok(ClientEvent::LoginRequired)));

    let err = console.errors().handle(err);
    assert_eq!(err.code, 401);
    match events.try_recv() {
        Ok(ClientEvent::Notify(notification)) => {
            assert_eq!(notification.level, NotificationLevel::Error);
        }
        other => panic!("expected a notification, got {:?}", other),
    }
}
