//! WallStreetSim backend entry point: wires persistence, matching, the
//! action processor, the tick pipeline/scheduler, the event bus/socket
//! server, and the REST surface together, then serves HTTP until shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{middleware as axum_mw, routing::post, Router};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wallstreetsim_backend::actions::ActionProcessor;
use wallstreetsim_backend::api::{self, AppState};
use wallstreetsim_backend::auth::{api as auth_api, auth_middleware, AuthLayerState, AuthState, CredentialStore, JwtHandler};
use wallstreetsim_backend::config::Config;
use wallstreetsim_backend::domain::NullNewsSource;
use wallstreetsim_backend::matching::MatchingEngine;
use wallstreetsim_backend::middleware::{rate_limit_middleware, request_logging, RateLimitConfig, RateLimitLayer};
use wallstreetsim_backend::persistence::sqlite::SqliteGateway;
use wallstreetsim_backend::persistence::PersistenceGateway;
use wallstreetsim_backend::realtime::{upgrade, EventBus, SocketState};
use wallstreetsim_backend::secrets::RedactingLayer;
use wallstreetsim_backend::tick::{SchedulerMode, TickPipeline, TickScheduler};
use wallstreetsim_backend::webhook::WebhookDispatcher;
use wallstreetsim_backend::world::DefaultRegimePolicy;

/// Exit code for a fatal startup failure (config/secrets).
const EXIT_FATAL_INIT: i32 = 1;
/// Exit code for a persistence layer that could not be opened at boot.
const EXIT_PERSISTENCE_UNAVAILABLE: i32 = 2;

#[tokio::main]
async fn main() {
    init_tracing();

    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(err) => {
            error!(error = %err, "fatal: invalid configuration");
            std::process::exit(EXIT_FATAL_INIT);
        }
    };

    match run(config).await {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            error!(error = %err, "fatal: server exited with error");
            std::process::exit(EXIT_PERSISTENCE_UNAVAILABLE);
        }
    }
}

async fn run(config: Arc<Config>) -> Result<()> {
    let gateway: Arc<dyn PersistenceGateway> = Arc::new(
        SqliteGateway::open(&config.database_url).context("failed to open persistence database")?,
    );

    let credentials_db_path = format!("{}.credentials", config.database_url);
    let credentials = Arc::new(
        CredentialStore::new(&credentials_db_path).context("failed to open credential store")?,
    );
    let jwt_handler = Arc::new(JwtHandler::new(config.jwt_secret.clone()));

    let engine = MatchingEngine::new();
    let symbols: Vec<String> = gateway
        .list_companies()
        .context("failed to load companies at startup")?
        .into_iter()
        .map(|company| company.symbol)
        .collect();
    engine.initialize(&symbols);

    let bus = EventBus::new();
    let pending_fills = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let action_processor = Arc::new(ActionProcessor::new(gateway.clone(), engine.clone(), pending_fills.clone()));

    let webhooks = Arc::new(WebhookDispatcher::new(config.webhook_concurrency));
    let webhooks_for_api = webhooks.clone();
    let regime_policy: Arc<dyn wallstreetsim_backend::world::RegimePolicy> = Arc::new(DefaultRegimePolicy);
    let news_source: Arc<dyn wallstreetsim_backend::domain::NewsSource> = Arc::new(NullNewsSource);

    let pipeline = Arc::new(TickPipeline::new(
        gateway.clone(),
        engine.clone(),
        bus.clone(),
        pending_fills,
        regime_policy,
        webhooks,
        news_source,
        config.clone(),
    ));
    let scheduler = Arc::new(TickScheduler::new(pipeline, SchedulerMode::Driven));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let scheduler_for_loop = scheduler.clone();
    let tick_interval = config.tick_interval();
    let scheduler_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = scheduler_for_loop.run(tick_interval) => {}
            _ = wait_for_shutdown(scheduler_shutdown) => {
                info!("tick scheduler stopping on shutdown signal");
            }
        }
    });

    let auth_state = AuthState::new(credentials.clone(), gateway.clone(), config.starting_cash, config.max_leverage);
    let auth_layer_state = AuthLayerState { credentials: credentials.clone(), jwt_handler: jwt_handler.clone() };
    let socket_state = SocketState { bus: bus.clone(), credentials: credentials.clone(), gateway: gateway.clone() };
    let app_state = AppState { gateway: gateway.clone(), engine: engine.clone(), action_processor, webhooks: webhooks_for_api };

    let auth_router = Router::new()
        .route("/auth/register", post(auth_api::register))
        .route("/auth/verify", post(auth_api::verify))
        .with_state(auth_state);

    let ws_router = Router::new().route("/ws", axum::routing::get(upgrade)).with_state(socket_state);

    let protected_router = api::router(app_state).route_layer(axum_mw::from_fn_with_state(auth_layer_state, auth_middleware));

    let rate_limiter = RateLimitLayer::new(RateLimitConfig::default());

    let app = Router::new()
        .merge(auth_router)
        .merge(ws_router)
        .merge(protected_router)
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn(request_logging))
        .layer(axum_mw::from_fn_with_state(rate_limiter, rate_limit_middleware));

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>())
        .with_graceful_shutdown(async move {
            wait_for_shutdown_signal(&shutdown_tx).await;
        })
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

async fn wait_for_shutdown(mut shutdown_rx: tokio::sync::watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow() {
            return;
        }
        if shutdown_rx.changed().await.is_err() {
            return;
        }
    }
}

async fn wait_for_shutdown_signal(shutdown_tx: &tokio::sync::watch::Sender<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    warn!("shutdown signal received, draining in-flight work");
    let _ = shutdown_tx.send(true);
    tokio::time::sleep(Duration::from_millis(250)).await;
}

/// Uses `RedactingLayer` in place of a bare `fmt::layer()` (spec.md §7:
/// secrets must never appear in logs) so a field named like a secret is
/// masked at the point a line is written, not left to call-site discipline.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "wallstreetsim_backend=info,tower_http=info".into()))
        .with(RedactingLayer)
        .init();
}
