use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use anisearch_backend::{
    config::{AppConfig, LogConfig, OtelConfig, UpstreamConfig},
    routes::{self, AppState},
};
use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{
        HeaderMap, HeaderName, Request, StatusCode,
        header::{ACCEPT, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
    routing::post,
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

/// Scripted answer for one upstream page, indexed by the requested page number.
#[derive(Clone)]
pub enum StubReply {
    Page {
        media: Vec<Value>,
        has_next_page: bool,
    },
    Status(StatusCode, Value),
    Raw(StatusCode, &'static str),
    /// Drop the connection without answering.
    Hangup,
}

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub content_type: Option<String>,
    pub accept: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct StubState {
    replies: Arc<Vec<StubReply>>,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// Minimal AniList GraphQL stand-in listening on a random local port.
pub struct StubAniList {
    addr: SocketAddr,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StubAniList {
    pub async fn start(replies: Vec<StubReply>) -> Self {
        let recorded = Arc::new(Mutex::new(Vec::new()));
        let state = StubState {
            replies: Arc::new(replies),
            recorded: recorded.clone(),
        };
        let router = Router::new()
            .route("/", post(graphql))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub upstream");
        let addr = listener.local_addr().expect("stub address");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("stub upstream");
        });

        Self { addr, recorded }
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.recorded.lock().unwrap().clone()
    }

    pub fn requested_pages(&self) -> Vec<u64> {
        self.requests()
            .iter()
            .map(|request| request.body["variables"]["page"].as_u64().expect("page"))
            .collect()
    }
}

async fn graphql(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let header = |name: HeaderName| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    let page = body["variables"]["page"].as_u64().unwrap_or(0) as usize;
    state.recorded.lock().unwrap().push(RecordedRequest {
        content_type: header(CONTENT_TYPE),
        accept: header(ACCEPT),
        body,
    });

    let Some(reply) = page.checked_sub(1).and_then(|index| state.replies.get(index)) else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "errors": [{ "message": format!("unscripted page {page}") }] })),
        )
            .into_response();
    };

    match reply.clone() {
        StubReply::Page {
            media,
            has_next_page,
        } => Json(page_payload(page, media, has_next_page)).into_response(),
        StubReply::Status(status, payload) => (status, Json(payload)).into_response(),
        StubReply::Raw(status, text) => (status, text).into_response(),
        // unwinding the connection task closes the socket mid-request
        StubReply::Hangup => panic!("stub upstream hanging up on page {page}"),
    }
}

fn page_payload(page: usize, media: Vec<Value>, has_next_page: bool) -> Value {
    json!({
        "data": {
            "Page": {
                "pageInfo": {
                    "total": media.len(),
                    "currentPage": page,
                    "lastPage": if has_next_page { page + 1 } else { page },
                    "hasNextPage": has_next_page
                },
                "media": media
            }
        }
    })
}

pub fn media(id: i64, is_adult: bool) -> Value {
    json!({
        "id": id,
        "title": {
            "romaji": format!("Sakuhin {id}"),
            "english": format!("Work {id}"),
            "native": format!("作品{id}")
        },
        "description": "A stub description.",
        "episodes": 12,
        "genres": ["Action", "Drama"],
        "coverImage": {
            "extraLarge": format!("https://img.example/{id}/xl.jpg"),
            "large": format!("https://img.example/{id}/l.jpg"),
            "medium": format!("https://img.example/{id}/m.jpg"),
            "color": "#e4a15d"
        },
        "isAdult": is_adult
    })
}

pub fn media_range(ids: std::ops::Range<i64>) -> Vec<Value> {
    ids.map(|id| media(id, false)).collect()
}

pub fn search_app(endpoint: &str, max_pages: u32) -> Router {
    let config = AppConfig {
        listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        upstream: UpstreamConfig::new(endpoint, 50, max_pages).expect("upstream config"),
        environment: "test".into(),
        otel: OtelConfig {
            endpoint: None,
            service_name: "test-backend".into(),
            disable_traces: true,
            disable_logs: true,
        },
        log: LogConfig {
            level: "info".into(),
        },
        cors_allowed_origins: Vec::new(),
        frontend_dist_dir: None,
    };
    routes::router(AppState::new(Arc::new(config)).expect("app state"))
}

pub async fn search(app: &Router, uri: &str) -> Response {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request");
    app.clone()
        .oneshot(request)
        .await
        .expect("router to respond")
}

pub async fn response_json(response: Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body bytes")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("valid json payload")
}

pub fn ids(payload: &Value) -> Vec<i64> {
    payload["media"]
        .as_array()
        .expect("media array")
        .iter()
        .map(|item| item["id"].as_i64().expect("id"))
        .collect()
}
