mod aiming;
mod config;
mod debounce;
mod error;
mod fixture_io;
mod ingress;
mod navigator;
mod pan_resolver;
mod predictor;
mod registry;
mod state;

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{error, info};

use aiming::AimingService;
use config::Config;
use debounce::run_debouncer;
use error::SpotlightError;
use fixture_io::{FixtureController, FixtureIo};
use navigator::Navigator;
use registry::FixtureRegistry;
use state::IntensityStore;

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    registry: Arc<FixtureRegistry>,
    fixture: Arc<dyn FixtureController>,
    intensity: Arc<IntensityStore>,
    aiming: Arc<AimingService>,
    /// Channels with a Navigator run in flight — keeps a second request
    /// for the same channel from starting a concurrent run.
    calibrating: Arc<Mutex<HashSet<String>>>,
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AimRequest {
    x: f64,
    y: f64,
    stage_max_y: f64,
}

async fn aim(
    State(app): State<AppState>,
    Path(channel): Path<String>,
    Json(req): Json<AimRequest>,
) -> Result<Json<serde_json::Value>, SpotlightError> {
    let (pan, tilt) = app.aiming.aim(&channel, req.x, req.y, req.stage_max_y).await?;
    Ok(Json(json!({ "pan": pan, "tilt": tilt })))
}

async fn reload_fixtures(State(app): State<AppState>) -> Json<serde_json::Value> {
    app.registry.reload_fixtures().await;
    Json(json!({ "status": "reloaded" }))
}

async fn calibrate(
    State(app): State<AppState>,
    Path(channel): Path<String>,
) -> Result<Json<serde_json::Value>, SpotlightError> {
    {
        let mut running = app.calibrating.lock().await;
        if !running.insert(channel.clone()) {
            return Ok(Json(json!({ "status": "already-running", "channel": channel })));
        }
    }

    let mut navigator = Navigator::new(
        channel.clone(),
        app.fixture.clone(),
        app.intensity.clone(),
        app.registry.clone(),
        &app.config,
    )
    .await?;

    tokio::spawn(async move {
        loop {
            let status = navigator.tick().await;
            info!(
                "navigator[{}]: {} (pan={:.2}, tilt={:.2})",
                channel, status.phase, status.pan, status.tilt
            );
            if navigator.is_terminal() {
                if let Some(reason) = navigator.failure_reason() {
                    error!("navigator[{}]: calibration failed: {reason}", channel);
                }
                app.calibrating.lock().await.remove(&channel);
                break;
            }
        }
    });

    Ok(Json(json!({ "status": "started" })))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spotlight_backend=info".into()),
        )
        .init();

    let config = Arc::new(Config::default());
    info!("spotlight backend v{} starting", env!("CARGO_PKG_VERSION"));

    let registry = Arc::new(FixtureRegistry::load(config.fixtures_path.clone(), config.sensors_path.clone()).await);

    let fixture_concrete = Arc::new(
        FixtureIo::new(&config.fixture_ip, config.fixture_port)
            .context("fixture_io: failed to bind UDP socket")?,
    );
    let fixture: Arc<dyn FixtureController> = fixture_concrete;

    let intensity = Arc::new(IntensityStore::new(config.sensor_buffer_cap));
    let aiming = Arc::new(AimingService::new(fixture.clone(), registry.clone()));

    tokio::spawn(run_debouncer(intensity.clone(), config.debounce_interval_ms));

    let app_state = AppState {
        config: config.clone(),
        registry,
        fixture,
        intensity: intensity.clone(),
        aiming,
        calibrating: Arc::new(Mutex::new(HashSet::new())),
    };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/fixtures/:channel/aim", post(aim))
        .route("/fixtures/:channel/calibrate", post(calibrate))
        .route("/fixtures/reload", post(reload_fixtures))
        .with_state(app_state)
        .merge(ingress::router(intensity));

    let addr = format!("0.0.0.0:{}", config.sensor_ws_port);
    info!("listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await.context("failed to bind sensor listener")?;
    axum::serve(listener, app).await.context("server exited with error")?;
    Ok(())
}
