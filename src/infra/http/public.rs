use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{
        HeaderMap, HeaderValue, StatusCode, Uri,
        header::{CACHE_CONTROL, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get},
};
use metrics::counter;
use serde::Serialize;

use crate::{
    application::{
        error::HttpError,
        render::{RenderService, Rendered},
    },
    cache::SaltCache,
    request::{
        PAGE_MOUNT_POINT, PREVIEW_MOUNT_POINT, PageRequestParser, PlanetRequest, QueryParams,
        RawRequest,
    },
};

use super::middleware::trace_requests;

/// Header a fronting proxy uses to pass the authenticated user.
pub const REMOTE_USER_HEADER: &str = "x-remote-user";
/// `HIT`, `MISS` or `BYPASS` depending on how the render cache answered.
pub const CACHE_STATUS_HEADER: &str = "x-roller-cache";

const PLANET_MOUNT_POINT: &str = "/planet";
const SALT_ROUTE: &str = "/roller-ui/authoring/salt";

#[derive(Clone)]
pub struct HttpState {
    pub pages: Arc<PageRequestParser>,
    pub previews: Arc<PageRequestParser>,
    pub render: Arc<RenderService>,
    pub salts: Arc<SaltCache>,
}

pub fn build_router(state: HttpState) -> Router {
    // rendering routes are matched on the raw URI so the classifier sees
    // path info exactly as sent
    Router::new()
        .route(PAGE_MOUNT_POINT, get(weblog_page))
        .route(&format!("{PAGE_MOUNT_POINT}/{{*path}}"), get(weblog_page))
        .route(PREVIEW_MOUNT_POINT, get(preview_page))
        .route(&format!("{PREVIEW_MOUNT_POINT}/{{*path}}"), get(preview_page))
        .route(&format!("{PLANET_MOUNT_POINT}/{{*path}}"), get(planet_page))
        .route(SALT_ROUTE, get(issue_salt))
        .route(&format!("{SALT_ROUTE}/{{salt}}"), delete(consume_salt))
        .route("/_health", get(health))
        .with_state(state)
        .layer(middleware::from_fn(trace_requests))
}

async fn weblog_page(State(state): State<HttpState>, uri: Uri, headers: HeaderMap) -> Response {
    render_weblog_page(&state, &state.pages, &uri, &headers)
}

async fn preview_page(State(state): State<HttpState>, uri: Uri, headers: HeaderMap) -> Response {
    render_weblog_page(&state, &state.previews, &uri, &headers)
}

async fn planet_page(State(state): State<HttpState>, uri: Uri, headers: HeaderMap) -> Response {
    let path = uri
        .path()
        .strip_prefix(PLANET_MOUNT_POINT)
        .unwrap_or_default();
    let query = QueryParams::parse(uri.query().unwrap_or(""));

    let Some(request) = PlanetRequest::from_parts(path, &query, remote_user(&headers)) else {
        counter!("roller_requests_rejected_total", "profile" => "planet").increment(1);
        return HttpError::new(
            "infra::http::planet_page",
            StatusCode::NOT_FOUND,
            "Page not found",
            format!("not a planet request, `{}`", uri.path()),
        )
        .into_response();
    };

    match state.render.render_planet(&request) {
        Ok(rendered) => rendered_response(rendered, false),
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Serialize)]
struct SaltView {
    salt: String,
}

/// Hand an authenticated author a one-time form salt.
async fn issue_salt(State(state): State<HttpState>, headers: HeaderMap) -> Response {
    let Some(user) = remote_user(&headers) else {
        return anonymous_author("infra::http::issue_salt");
    };
    let salt = state.salts.issue(user);
    (StatusCode::OK, Json(SaltView { salt })).into_response()
}

/// Validate and spend a salt; it must belong to the calling author.
async fn consume_salt(
    State(state): State<HttpState>,
    Path(salt): Path<String>,
    headers: HeaderMap,
) -> Response {
    let Some(user) = remote_user(&headers) else {
        return anonymous_author("infra::http::consume_salt");
    };

    if state.salts.spend(&salt, user) {
        return StatusCode::NO_CONTENT.into_response();
    }

    HttpError::new(
        "infra::http::consume_salt",
        StatusCode::FORBIDDEN,
        "Invalid salt",
        format!("salt is unknown, expired, spent or not issued to `{user}`"),
    )
    .into_response()
}

fn anonymous_author(source: &'static str) -> Response {
    HttpError::new(
        source,
        StatusCode::UNAUTHORIZED,
        "Authentication required",
        format!("missing `{REMOTE_USER_HEADER}` header"),
    )
    .into_response()
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

fn render_weblog_page(
    state: &HttpState,
    parser: &PageRequestParser,
    uri: &Uri,
    headers: &HeaderMap,
) -> Response {
    let profile = parser.profile();
    let label = if profile.preview { "preview" } else { "page" };

    let path_info = uri
        .path()
        .strip_prefix(profile.mount_point)
        .filter(|rest| !rest.is_empty());
    let mut raw = RawRequest::new(profile.mount_point, path_info)
        .with_query(QueryParams::parse(uri.query().unwrap_or("")));
    if let Some(user) = remote_user(headers) {
        raw = raw.with_principal(user);
    }

    let request = match parser.classify(&raw) {
        Ok(request) => request,
        Err(err) => {
            counter!("roller_requests_rejected_total", "profile" => label).increment(1);
            return HttpError::from(err).into_response();
        }
    };
    counter!("roller_requests_classified_total", "profile" => label).increment(1);

    match state.render.render_page(&request) {
        Ok(rendered) => rendered_response(rendered, profile.preview),
        Err(err) => err.into_response(),
    }
}

fn remote_user(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(REMOTE_USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|user| !user.is_empty())
}

fn rendered_response(rendered: Rendered, no_store: bool) -> Response {
    let cache_status = match (&rendered.cache_key, rendered.cache_hit) {
        (None, _) => "BYPASS",
        (Some(_), true) => "HIT",
        (Some(_), false) => "MISS",
    };

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, rendered.page.content_type.as_str())
        .header(CACHE_STATUS_HEADER, cache_status);
    if no_store {
        builder = builder.header(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    }

    builder
        .body(Body::from(rendered.page.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
