//! Tunedeck Test Utilities
//!
//! Shared test infrastructure for the Tunedeck workspace:
//! - Proptest generators for events and query keys
//! - Record fixtures in the backend's wire format
//! - An in-process mock backend that records every request

pub use tunedeck_core::{
    keys, Album, ApiError, Artist, Event, PaginatedData, Playlist, QueryKey, Track, User,
    UserRole,
};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    use super::*;

    const STAMP: &str = "2024-01-01T00:00:00Z";

    /// Wrap `data` in a success envelope.
    pub fn envelope(data: Value) -> Value {
        json!({ "code": 0, "message": "success", "data": data, "timestamp": 1_700_000_000_000i64 })
    }

    /// A business failure envelope.
    pub fn failure(code: i64, message: &str) -> Value {
        json!({ "code": code, "message": message, "data": null })
    }

    pub fn paginated(items: Vec<Value>) -> Value {
        let total = items.len();
        json!({
            "items": items,
            "total": total,
            "page": 1,
            "pageSize": 10,
            "totalPages": 1,
        })
    }

    pub fn user(id: &str, username: &str) -> Value {
        json!({
            "id": id,
            "username": username,
            "email": format!("{}@example.com", username),
            "role": "admin",
            "createdAt": STAMP,
            "updatedAt": STAMP,
        })
    }

    pub fn artist(id: &str, name: &str) -> Value {
        json!({
            "id": id,
            "name": name,
            "country": "JP",
            "genres": ["j-pop"],
            "createdAt": STAMP,
            "updatedAt": STAMP,
        })
    }

    pub fn album(id: &str, title: &str, artist_id: &str) -> Value {
        json!({
            "id": id,
            "title": title,
            "releaseDate": "2024-04-28",
            "artistId": artist_id,
            "trackCount": 10,
            "createdAt": STAMP,
            "updatedAt": STAMP,
        })
    }

    pub fn track(id: &str, title: &str, album_id: &str) -> Value {
        json!({
            "id": id,
            "title": title,
            "duration": 241.5,
            "trackNumber": 1,
            "albumId": album_id,
            "artistId": "a1",
            "createdAt": STAMP,
            "updatedAt": STAMP,
        })
    }

    pub fn playlist(id: &str, name: &str) -> Value {
        json!({
            "id": id,
            "name": name,
            "userId": "u1",
            "trackCount": 0,
            "isPublic": true,
            "createdAt": STAMP,
            "updatedAt": STAMP,
        })
    }

    pub fn auth_response(token: &str, user: Value) -> Value {
        json!({ "user": user, "token": token, "refreshToken": format!("{}-refresh", token) })
    }

    /// An event record in the backend's snake_case format.
    pub fn event(id: i64, event_type: &str, start_date: &str) -> Value {
        json!({
            "id": id,
            "name": format!("Event {}", id),
            "slug": format!("event-{}", id),
            "main_visual_url": null,
            "type": event_type,
            "start_date": start_date,
            "end_date": null,
            "venue": "Tokyo Big Sight",
            "location": "Tokyo",
            "website": null,
            "key_visuals": null,
            "total_works": 0,
            "total_participants": 0,
            "meta": null,
            "created_at": STAMP,
            "updated_at": STAMP,
        })
    }

    /// A typed [`Event`] with only the fields grouping cares about set.
    pub fn event_record(id: i64, event_type: &str, start_date: &str) -> Event {
        Event {
            id,
            name: format!("Event {}", id),
            slug: format!("event-{}", id),
            main_visual_url: None,
            event_type: event_type.to_string(),
            start_date: start_date.to_string(),
            end_date: None,
            venue: None,
            location: None,
            website: None,
            translations: None,
            key_visuals: None,
            total_works: 0,
            total_participants: 0,
            meta: None,
            created_at: STAMP.to_string(),
            updated_at: STAMP.to_string(),
        }
    }
}

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    pub fn arb_calendar_date() -> impl Strategy<Value = NaiveDate> {
        (1990i32..2035, 1u32..=12, 1u32..=28)
            .prop_filter_map("valid date", |(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
    }

    /// A start date in one of the accepted syntaxes, or an unparseable one.
    pub fn arb_start_date() -> impl Strategy<Value = String> {
        prop_oneof![
            6 => arb_calendar_date().prop_map(|d| d.format("%Y-%m-%d").to_string()),
            2 => (arb_calendar_date(), 0u32..24)
                .prop_map(|(d, h)| format!("{}T{:02}:30:00Z", d.format("%Y-%m-%d"), h)),
            1 => arb_calendar_date().prop_map(|d| format!("{} 12:00:00", d.format("%Y-%m-%d"))),
            1 => Just("not-a-date".to_string()),
            1 => Just(String::new()),
        ]
    }

    pub fn arb_event_type() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["M3", "Comiket", "Reitaisai", "VOCALO"]).prop_map(String::from)
    }

    /// A list of events with unique ids.
    pub fn arb_events(max: usize) -> impl Strategy<Value = Vec<Event>> {
        prop::collection::vec((arb_start_date(), arb_event_type()), 0..max).prop_map(|entries| {
            entries
                .into_iter()
                .enumerate()
                .map(|(i, (start, kind))| fixtures::event_record(i as i64, &kind, &start))
                .collect()
        })
    }

    pub fn arb_domain() -> impl Strategy<Value = &'static str> {
        prop::sample::select(vec![
            keys::ARTISTS,
            keys::ALBUMS,
            keys::TRACKS,
            keys::PLAYLISTS,
            keys::EVENTS,
        ])
    }

    pub fn arb_record_id() -> impl Strategy<Value = String> {
        "[a-z0-9]{1,8}"
    }

    /// Any key the accessors build.
    pub fn arb_query_key() -> impl Strategy<Value = QueryKey> {
        prop_oneof![
            arb_domain().prop_map(keys::all),
            arb_domain().prop_map(keys::lists),
            (arb_domain(), 1u32..5, 1u32..50).prop_map(|(domain, page, size)| {
                keys::list(domain, Some(&json!({ "page": page, "pageSize": size })))
            }),
            (arb_domain(), arb_record_id()).prop_map(|(domain, id)| keys::detail(domain, &id)),
            arb_record_id().prop_map(|id| keys::artist_albums(&id)),
            arb_record_id().prop_map(|id| keys::playlist_tracks(&id)),
        ]
    }
}

// ============================================================================
// MOCK BACKEND
// ============================================================================

/// A request as seen by the mock backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    /// Parsed JSON body, when the request carried one.
    pub body: Option<Value>,
    pub body_len: usize,
}

#[derive(Debug, Clone)]
struct Reply {
    status: u16,
    body: Value,
}

#[derive(Default)]
struct MockState {
    /// Replies per `(METHOD, path)`. The last reply repeats once the queue drains.
    routes: HashMap<(String, String), VecDeque<Reply>>,
    requests: Vec<RecordedRequest>,
    delay: Option<Duration>,
}

type SharedState = Arc<Mutex<MockState>>;

/// An HTTP backend on an ephemeral local port with scripted replies.
#[derive(Clone)]
pub struct MockBackend {
    addr: SocketAddr,
    state: SharedState,
}

impl MockBackend {
    /// Bind to `127.0.0.1:0` and serve in a background task.
    pub async fn start() -> std::io::Result<Self> {
        let state = SharedState::default();
        let app = Router::new().fallback(handle).with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app).await {
                eprintln!("mock backend stopped: {}", err);
            }
        });
        Ok(Self { addr, state })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Always answer `method path` with `status` and `body`.
    pub fn on(&self, method: &str, path: &str, status: u16, body: Value) -> &Self {
        self.on_sequence(method, path, vec![(status, body)])
    }

    /// Answer successive calls with successive replies, repeating the last.
    pub fn on_sequence(&self, method: &str, path: &str, replies: Vec<(u16, Value)>) -> &Self {
        let queue = replies
            .into_iter()
            .map(|(status, body)| Reply { status, body })
            .collect();
        self.lock()
            .routes
            .insert((method.to_uppercase(), path.to_string()), queue);
        self
    }

    /// Hold every reply for `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    pub fn requests_to(&self, method: &str, path: &str) -> Vec<RecordedRequest> {
        let method = method.to_uppercase();
        self.lock()
            .requests
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .cloned()
            .collect()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.requests_to(method, path).len()
    }
}

impl std::fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBackend").field("addr", &self.addr).finish()
    }
}

async fn handle(
    State(state): State<SharedState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let recorded = RecordedRequest {
        method: method.as_str().to_string(),
        path: uri.path().to_string(),
        query: parse_query(uri.query().unwrap_or_default()),
        authorization: header_value(header::AUTHORIZATION),
        content_type: header_value(header::CONTENT_TYPE),
        body: serde_json::from_slice(&body).ok(),
        body_len: body.len(),
    };

    let (reply, delay) = {
        let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (recorded.method.clone(), recorded.path.clone());
        state.requests.push(recorded);
        let reply = state.routes.get_mut(&key).and_then(|queue| {
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        });
        (reply, state.delay)
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let reply = reply.unwrap_or_else(|| Reply {
        status: 404,
        body: json!({ "message": format!("no mock for {} {}", method, uri.path()) }),
    });
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if reply.body.is_null() {
        return status.into_response();
    }
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        reply.body.to_string(),
    )
        .into_response()
}

fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}
