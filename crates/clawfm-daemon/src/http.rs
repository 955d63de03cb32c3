use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use clawfm_engine::StationHandle;
use clawfm_proto::protocol::{Command, LogEntry, StationSnapshot};
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

#[derive(Deserialize)]
struct LogsQuery {
    #[serde(default)]
    since: usize,
}

#[derive(Deserialize)]
struct MessageBody {
    text: String,
}

pub fn router(station: StationHandle) -> Router {
    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/logs", get(get_logs))
        .route("/api/play-pause", post(play_pause))
        .route("/api/next", post(next_track))
        .route("/api/mute", post(toggle_mute))
        .route("/api/reload", post(reload))
        .route("/api/message", post(submit_message))
        .layer(CorsLayer::permissive())
        .with_state(station)
}

pub fn start_server(
    bind_address: String,
    port: u16,
    station: StationHandle,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("HTTP API server listening on http://{}", addr);

        if let Err(e) = axum::serve(listener, router(station)).await {
            error!("HTTP server error: {}", e);
        }
    })
}

async fn forward(station: &StationHandle, cmd: Command) -> StatusCode {
    info!("HTTP API: {:?}", cmd);
    match station.send(cmd).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            error!("Failed to forward command: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn get_state(State(station): State<StationHandle>) -> Json<StationSnapshot> {
    Json(station.snapshot().await)
}

async fn get_logs(
    State(station): State<StationHandle>,
    Query(q): Query<LogsQuery>,
) -> Json<Vec<LogEntry>> {
    Json(station.logs_since(q.since).await)
}

async fn play_pause(State(station): State<StationHandle>) -> StatusCode {
    forward(&station, Command::PlayPause).await
}

async fn next_track(State(station): State<StationHandle>) -> StatusCode {
    forward(&station, Command::SkipNext).await
}

async fn toggle_mute(State(station): State<StationHandle>) -> StatusCode {
    forward(&station, Command::ToggleMute).await
}

async fn reload(State(station): State<StationHandle>) -> StatusCode {
    forward(&station, Command::Reload).await
}

async fn submit_message(
    State(station): State<StationHandle>,
    Json(body): Json<MessageBody>,
) -> StatusCode {
    forward(&station, Command::SubmitMessage { text: body.text }).await
}
