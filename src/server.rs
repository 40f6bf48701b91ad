use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    extract::{
        rejection::JsonRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{debug, info, warn};

use crate::{
    broadcaster::{Broadcaster, Subscription},
    catalog::Catalog,
    client_api::LocalClient,
    config::CompanionConfig,
    events::UiEvent,
    import::{import_items, import_runes, ImportError, ItemImportRequest, RuneImportRequest},
    selection::select_build,
    state::CompanionState,
    stats::{Queue, Role, StatsProvider},
    tierlist::build_tier_list,
};

const SAMPLE_CHAMPION_ID: u32 = 126;

/// Shared handles behind every route.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<CompanionConfig>,
    pub state: Arc<CompanionState>,
    pub broadcaster: Arc<Broadcaster>,
    pub catalog: Arc<Catalog>,
    pub stats: Arc<dyn StatsProvider>,
}

/// Builds the UI router. Static files are left out in debug mode, where the
/// UI runs from its own dev server.
pub fn build_router(app: AppState, debug: bool) -> Router {
    let mut router = Router::new()
        .route("/lcu", get(ws_handler))
        .route("/sample-build", get(sample_build))
        .route("/current-build", get(current_build))
        .route("/tier-list", get(tier_list))
        .route("/import-runes", post(import_runes_handler))
        .route("/import-items", post(import_items_handler))
        .route("/health", get(|| async { "ok" }));

    if !debug {
        router = router
            .route("/", get(|| async { Redirect::permanent("/public/") }))
            .nest_service("/public", ServeDir::new(&app.config.static_dir));
    }

    router
        .with_state(app)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(app: AppState, bind: &str, debug: bool) -> Result<()> {
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid ui bind address: {bind}"))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed binding ui listener on {addr}"))?;

    info!("ui socket listening on ws://{addr}/lcu");
    if !debug {
        info!("ui available at http://{addr}/public/");
    }
    axum::serve(listener, build_router(app, debug))
        .await
        .context("axum serve failed")?;
    Ok(())
}

async fn ws_handler(ws: WebSocketUpgrade, State(app): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, app))
}

/// Events a freshly connected UI should see before anything new.
fn greeting(state: &CompanionState) -> Vec<UiEvent> {
    let mut events = Vec::new();
    let session = state.session();
    if !session.username.is_empty() {
        events.push(UiEvent::UserInfo(session.user_info()));
    }
    if let Some(recommendation) = state.latest_recommendation() {
        events.push(UiEvent::ChampionChange(recommendation));
    }
    events
}

async fn handle_socket(socket: WebSocket, app: AppState) {
    let Subscription { id, mut mailbox } = app
        .broadcaster
        .subscribe_with(|| greeting(&app.state));
    let (mut outbound, mut inbound) = socket.split();

    loop {
        tokio::select! {
            queued = mailbox.recv() => match queued {
                Some(text) => {
                    if outbound.send(Message::Text(text.to_string().into())).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            received = inbound.next() => match received {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!(?err, subscriber = id, "ui socket receive error");
                    break;
                }
            },
        }
    }

    app.broadcaster.unsubscribe(id);
}

async fn sample_build(State(app): State<AppState>) -> Response {
    match select_build(
        app.stats.as_ref(),
        &app.catalog,
        SAMPLE_CHAMPION_ID,
        Some(Role::Mid),
        Queue::RankedSolo,
    )
    .await
    {
        Ok(recommendation) => Json(UiEvent::ChampionChange(Arc::new(recommendation))).into_response(),
        Err(err) => {
            warn!(%err, "sample build failed");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

async fn current_build(State(app): State<AppState>) -> Response {
    match app.state.latest_recommendation() {
        Some(recommendation) => Json(UiEvent::ChampionChange(recommendation)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn tier_list(State(app): State<AppState>) -> Response {
    match app.stats.tier_list_stats().await {
        Ok(stats) => Json(build_tier_list(&stats, &app.catalog)).into_response(),
        Err(err) => {
            warn!(%err, "tier list fetch failed");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

fn connected_client(app: &AppState) -> Result<LocalClient, ImportError> {
    let credentials = app.state.credentials().ok_or(ImportError::NotConnected)?;
    Ok(LocalClient::new(
        credentials,
        Duration::from_secs(app.config.http_timeout_secs),
    )?)
}

fn import_status(result: Result<(), ImportError>) -> StatusCode {
    match result {
        Ok(()) => StatusCode::OK,
        Err(ImportError::Invalid(reason)) => {
            warn!(%reason, "rejected import request");
            StatusCode::BAD_REQUEST
        }
        Err(ImportError::NotConnected) => StatusCode::SERVICE_UNAVAILABLE,
        Err(ImportError::Client(err)) => {
            warn!(%err, "client rejected import");
            StatusCode::BAD_GATEWAY
        }
    }
}

async fn import_runes_handler(
    State(app): State<AppState>,
    payload: Result<Json<RuneImportRequest>, JsonRejection>,
) -> StatusCode {
    let Ok(Json(request)) = payload else {
        return StatusCode::BAD_REQUEST;
    };
    let result = match connected_client(&app) {
        Ok(client) => {
            import_runes(
                &client,
                &app.catalog,
                &app.config.import_title_prefix,
                &request,
            )
            .await
        }
        Err(err) => Err(err),
    };
    import_status(result)
}

async fn import_items_handler(
    State(app): State<AppState>,
    payload: Result<Json<ItemImportRequest>, JsonRejection>,
) -> StatusCode {
    let Ok(Json(request)) = payload else {
        return StatusCode::BAD_REQUEST;
    };
    let result = match connected_client(&app) {
        Ok(client) => {
            import_items(
                &client,
                app.state.summoner_id(),
                &app.catalog,
                &app.config.import_title_prefix,
                &request,
            )
            .await
        }
        Err(err) => Err(err),
    };
    import_status(result)
}
