#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use muni_core::{ApiClient, ClientConfig, Route, RouteCell, SessionCell, SnapshotStore};
use muni_schema::{RegionInfo, TokenPair};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const PASSWORD: &str = "Saxophone#1";
pub const SLOW: Duration = Duration::from_millis(300);

/// In-process stand-in for the backend API. Counts calls per endpoint.
pub struct Backend {
    pub access: Mutex<String>,
    pub issued: AtomicUsize,
    pub refresh_ok: AtomicBool,
    pub always_unauthorized: AtomicBool,
    pub pair_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub user_calls: AtomicUsize,
    pub finance_calls: AtomicUsize,
    pub register_calls: AtomicUsize,
}

impl Default for Backend {
    fn default() -> Self {
        Self {
            access: Mutex::new("access-0".into()),
            issued: AtomicUsize::new(0),
            refresh_ok: AtomicBool::new(true),
            always_unauthorized: AtomicBool::new(false),
            pair_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            user_calls: AtomicUsize::new(0),
            finance_calls: AtomicUsize::new(0),
            register_calls: AtomicUsize::new(0),
        }
    }
}

impl Backend {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        if self.always_unauthorized.load(Ordering::SeqCst) {
            return false;
        }
        let expected = format!("Bearer {}", self.access.lock().expect("lock"));
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == expected)
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"detail": "Given token not valid for any token type"})),
    )
        .into_response()
}

pub fn user_json() -> Value {
    json!({
        "id": 7,
        "email": "clerk@springfield.gov",
        "first_name": "Lisa",
        "last_name": "Simpson",
        "organization": "Springfield",
        "subscription_tier": "free",
        "credits": 3
    })
}

async fn token_pair(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> Response {
    backend.pair_calls.fetch_add(1, Ordering::SeqCst);
    if body.get("password").and_then(Value::as_str) != Some(PASSWORD) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "No active account found with the given credentials"})),
        )
            .into_response();
    }
    let access = backend.access.lock().expect("lock").clone();
    Json(json!({"access": access, "refresh": "refresh-0", "user": user_json()})).into_response()
}

async fn token_refresh(State(backend): State<Arc<Backend>>) -> Response {
    backend.refresh_calls.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(50)).await;
    if !backend.refresh_ok.load(Ordering::SeqCst) {
        return unauthorized();
    }
    let n = backend.issued.fetch_add(1, Ordering::SeqCst) + 1;
    let access = format!("access-{n}");
    *backend.access.lock().expect("lock") = access.clone();
    Json(json!({"access": access, "refresh": format!("refresh-{n}")})).into_response()
}

async fn user(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    backend.user_calls.fetch_add(1, Ordering::SeqCst);
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    Json(user_json()).into_response()
}

async fn register(State(backend): State<Arc<Backend>>) -> Response {
    backend.register_calls.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({
            "detail": [
                {"loc": ["body", "payload", "email"], "msg": "User with this email already exists", "type": "value_error"}
            ]
        })),
    )
        .into_response()
}

fn states() -> Value {
    json!({
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "id": 42, "properties": {"name": "Pennsylvania", "stusps": "PA", "statefp": "42"}, "geometry": null},
            {"type": "Feature", "id": 36, "properties": {"name": "New York", "stusps": "NY", "statefp": "36"}, "geometry": null},
            {"type": "Feature", "id": 99, "properties": {"name": "Slowland", "stusps": "SLOW", "statefp": "99"}, "geometry": null}
        ]
    })
}

async fn gis_states(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    // The real endpoint returns the collection as a JSON-encoded string.
    Json(Value::String(states().to_string())).into_response()
}

fn feature(id: i64, name: &str, county: &str, mid: &str) -> Value {
    json!({
        "type": "Feature",
        "id": id,
        "properties": {
            "municipal_name": name,
            "county_name": county,
            "fips_code": format!("{id:05}"),
            "sq_mi": "21.5",
            "pop_2020": 120000,
            "mid": mid
        },
        "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]}
    })
}

async fn gis_municipalities(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    let features = match params.get("state").map(String::as_str) {
        Some("PA") => vec![
            feature(2, "Scranton", "Lackawanna", "m-scranton"),
            feature(1, "Allentown", "Lehigh", "m-allentown"),
        ],
        Some("NY") => vec![feature(10, "Albany", "Albany", "m-albany")],
        Some("SLOW") => {
            tokio::time::sleep(SLOW).await;
            vec![feature(50, "Tortoise", "Shell", "m-tortoise")]
        }
        _ => Vec::new(),
    };
    Json(json!({"type": "FeatureCollection", "features": features})).into_response()
}

/// Five years, out of order, with decimals encoded as strings.
pub fn scranton_records() -> Value {
    let row = |year: i32, assets: &str, liabilities: &str| {
        json!({
            "mid": "m-scranton",
            "name": "Scranton",
            "year": year,
            "current_assets": assets,
            "liabilities": liabilities,
            "deferred_inflows": null,
            "total_revenues": "50000000000.00",
            "interest_charges": "1000000000.00",
            "principal_employers": "Geisinger + University of Scranton"
        })
    };
    json!([
        row(2021, "90000000000.00", "96000000000.00"),
        row(2019, "80000000000.00", "100000000000.00"),
        row(2023, "100000000000.00", "92000000000.00"),
        row(2020, "85000000000.00", "98000000000.00"),
        row(2022, "95000000000.00", "94000000000.00"),
    ])
}

async fn finances(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    backend.finance_calls.fetch_add(1, Ordering::SeqCst);
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    match params.get("mid").map(String::as_str) {
        Some("m-missing") => (
            StatusCode::NOT_FOUND,
            Json(json!({"detail": "Not Found"})),
        )
            .into_response(),
        Some("m-single") => Json(json!({"mid": "m-single", "year": 2024, "debt": "12.5"})).into_response(),
        Some("m-slow") => {
            tokio::time::sleep(SLOW).await;
            Json(json!([{"mid": "m-slow", "year": 2020}])).into_response()
        }
        _ => Json(scranton_records()).into_response(),
    }
}

async fn sample_data(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    Json(json!({"message": "Sample data already present"})).into_response()
}

async fn templates() -> Response {
    Json(json!({"templates": [{"id": 1, "name": "Complete street", "description": "Bike lanes both sides"}]}))
        .into_response()
}

async fn generate(Query(params): Query<HashMap<String, String>>) -> Response {
    let sections: Vec<Value> = params
        .get("sections")
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default();
    if sections.is_empty() || params.get("units").map(String::as_str) != Some("metric") {
        return (StatusCode::BAD_REQUEST, Json(json!({"message": "bad sections"}))).into_response();
    }
    Json(json!({"image": {"id": 31, "imageUrl": "https://cdn.example/31.png", "isSaved": false}}))
        .into_response()
}

async fn save_image(Path(id): Path<i64>) -> Response {
    Json(json!({"id": id, "isSaved": true})).into_response()
}

pub fn router(backend: Arc<Backend>) -> Router {
    Router::new()
        .route("/api/token/pair", post(token_pair))
        .route("/api/token/refresh", post(token_refresh))
        .route("/api/user", get(user))
        .route("/api/register", post(register))
        .route("/api/financial/gis/states", get(gis_states))
        .route("/api/financial/gis/municipalities", get(gis_municipalities))
        .route("/api/financial/municipality/finances", get(finances))
        .route("/api/financial/init-sample-data", post(sample_data))
        .route("/api/design/templates", get(templates))
        .route("/api/design/cross-section/generate", get(generate))
        .route("/api/design/cross-section/:id/save", post(save_image))
        .with_state(backend)
}

pub async fn spawn(backend: Arc<Backend>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub backend");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router(backend)).await.expect("serve");
    });
    format!("http://{addr}/api")
}

pub fn temp_snapshots(name: &str) -> SnapshotStore {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    SnapshotStore::open(format!("/tmp/muni-tests/{name}-{nanos}.db")).expect("open snapshots")
}

pub struct Harness {
    pub backend: Arc<Backend>,
    pub config: ClientConfig,
    pub client: ApiClient,
    pub routes: Arc<RouteCell>,
    pub snapshots: SnapshotStore,
}

pub async fn harness(name: &str) -> Harness {
    let backend = Arc::new(Backend::default());
    let base_url = spawn(backend.clone()).await;
    let config = ClientConfig::default().with_base_url(base_url);
    let snapshots = temp_snapshots(name);
    let routes = Arc::new(RouteCell::new(Route::Home));
    let session = Arc::new(SessionCell::new(Some(snapshots.clone()), routes.clone()));
    let client = ApiClient::new(&config, session).expect("client");
    Harness {
        backend,
        config,
        client,
        routes,
        snapshots,
    }
}

impl Harness {
    /// Session holding an access token the backend no longer accepts.
    pub fn with_expired_access(&self) {
        self.client.session().set_tokens(TokenPair {
            access: "expired".into(),
            refresh: "refresh-0".into(),
        });
    }

    /// Session holding the token the backend currently accepts.
    pub fn with_valid_access(&self) {
        let access = self.backend.access.lock().expect("lock").clone();
        self.client.session().set_tokens(TokenPair {
            access,
            refresh: "refresh-0".into(),
        });
    }
}

pub fn region(name: &str, abbr: &str, code: &str) -> RegionInfo {
    RegionInfo {
        name: name.into(),
        abbr: abbr.into(),
        code: code.into(),
    }
}
