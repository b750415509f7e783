use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use crate::console::UserCommand;
use crate::state::AppState;
use crate::types::{EntityOperation, FlagId, ListId, Resource};
use crate::view::ViewModel;
use crate::web;

type S = Arc<AppState>;
type ApiResult = Result<Json<serde_json::Value>, (StatusCode, String)>;

pub fn build_router(state: S) -> Router {
    Router::new()
        .route("/", get(serve_ui))
        .route("/api/view", get(get_view))
        .route("/api/config", get(get_config))
        .route("/api/flags/{flag}", post(post_flag))
        .route("/api/lists/{list}/filter", post(post_filter))
        .route("/api/lists/{list}/filter/clear", post(post_filter_clear))
        .route("/api/lists/{list}/rows/{key}/toggle", post(post_toggle_row))
        .route("/api/lists/{list}/rows/{key}/{operation}", post(post_entity_operation))
        .route("/api/poll-period", post(post_poll_period))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── UI ──────────────────────────────────────────────────────────────────────

async fn serve_ui() -> axum::response::Html<&'static str> {
    axum::response::Html(web::INDEX_HTML)
}

// ── View ────────────────────────────────────────────────────────────────────

async fn get_view(State(state): State<S>) -> Json<ViewModel> {
    Json(state.view())
}

async fn get_config(State(state): State<S>) -> Json<serde_json::Value> {
    let config = &state.config;
    Json(serde_json::json!({
        "remote_base_url": config.remote_base_url,
        "flags": config.flags,
        "flag_surfaces": config.flag_surfaces,
        "lists": config.lists,
        "poll_periods_ms": state.scheduler.periods(),
        "override_grace_ms": config.override_grace_ms,
        "effective_grace_ms": state.grace().as_millis() as u64,
        "filter_debounce_ms": config.filter_debounce_ms,
        "request_timeout_ms": config.request_timeout_ms,
    }))
}

// ── Commands ────────────────────────────────────────────────────────────────

async fn dispatch(state: &AppState, cmd: UserCommand) -> ApiResult {
    if !state.command(cmd).await {
        return Err((StatusCode::SERVICE_UNAVAILABLE, "console stopped".into()));
    }
    Ok(Json(serde_json::json!({"ok": true})))
}

#[derive(Deserialize)]
struct FlagRequest {
    value: bool,
}

async fn post_flag(
    State(state): State<S>,
    Path(flag): Path<String>,
    Json(body): Json<FlagRequest>,
) -> ApiResult {
    let flag = FlagId(flag);
    if !state.config.flags.contains(&flag) {
        return Err((StatusCode::NOT_FOUND, format!("unknown flag {flag}")));
    }
    dispatch(&state, UserCommand::SetFlag { flag, value: body.value }).await
}

#[derive(Deserialize)]
struct FilterRequest {
    term: String,
}

async fn post_filter(
    State(state): State<S>,
    Path(list): Path<String>,
    Json(body): Json<FilterRequest>,
) -> ApiResult {
    let list = known_list(&state, list)?;
    dispatch(&state, UserCommand::FilterInput { list, term: body.term }).await
}

async fn post_filter_clear(State(state): State<S>, Path(list): Path<String>) -> ApiResult {
    let list = known_list(&state, list)?;
    dispatch(&state, UserCommand::ClearFilter { list }).await
}

async fn post_toggle_row(
    State(state): State<S>,
    Path((list, key)): Path<(String, String)>,
) -> ApiResult {
    let list = known_list(&state, list)?;
    dispatch(&state, UserCommand::ToggleDetail { list, key }).await
}

async fn post_entity_operation(
    State(state): State<S>,
    Path((list, key, operation)): Path<(String, String, String)>,
) -> ApiResult {
    let list = known_list(&state, list)?;
    let operation = EntityOperation::parse(&operation)
        .ok_or_else(|| (StatusCode::BAD_REQUEST, format!("unknown operation: {operation}")))?;
    dispatch(&state, UserCommand::MutateEntity { list, key, operation }).await
}

fn known_list(state: &AppState, list: String) -> Result<ListId, (StatusCode, String)> {
    let list = ListId(list);
    if !state.config.lists.contains(&list) {
        return Err((StatusCode::NOT_FOUND, format!("unknown list {list}")));
    }
    Ok(list)
}

// ── Poll period ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum LoopGroup {
    Flags,
    Lists,
}

#[derive(Deserialize)]
struct PollPeriodRequest {
    #[serde(rename = "loop")]
    group: LoopGroup,
    period_ms: u64,
}

async fn post_poll_period(State(state): State<S>, Json(body): Json<PollPeriodRequest>) -> ApiResult {
    if body.period_ms == 0 {
        return Err((StatusCode::BAD_REQUEST, "period must be > 0".into()));
    }
    let period = Duration::from_millis(body.period_ms);

    let targets: Vec<Resource> = state
        .scheduler
        .resources()
        .filter(|r| match body.group {
            LoopGroup::Flags => matches!(r, Resource::Flag(_)),
            LoopGroup::Lists => matches!(r, Resource::List(_)),
        })
        .cloned()
        .collect();

    for resource in &targets {
        state.scheduler.set_period(resource, period);
    }

    if matches!(body.group, LoopGroup::Flags) {
        if !state.flag_period_changed(period).await {
            return Err((StatusCode::SERVICE_UNAVAILABLE, "console stopped".into()));
        }
    }

    Ok(Json(serde_json::json!({"ok": true, "updated": targets.len()})))
}
